/*
 *  display/renderer.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared renderer: level mapping, bar smoothing and peaks for every sink
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::time::Instant;

use log::{debug, warn};

use crate::control::{config_channel, ConfigInbox, ConfigPort};
use crate::display::color::PixelColor;
use crate::display::configuration::{ConfigUpdate, DisplayConfiguration, DisplayType, UpdateOutcome};
use crate::display::traits::{DisplayRenderer, DisplaySink, Frame};
use crate::levels::{map_to_levels, Band};
use crate::peak::PeakTracker;
use crate::spectrum::smooth;

/// Mutable per-renderer state, touched only by the render thread
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub current_levels: Vec<f64>,
    pub peaks: Vec<PeakTracker>,
}

impl RenderState {
    pub fn new(cols: usize) -> Self {
        Self { current_levels: vec![0.0; cols], peaks: vec![PeakTracker::new(); cols] }
    }
}

/// Produce one frame from a configuration snapshot and the column state.
pub fn render_frame(cfg: &DisplayConfiguration, state: &mut RenderState, bands: &[Band], now_ms: i64) -> Frame {
    let levels = map_to_levels(bands, cfg.amplification_factor.value, cfg.rows);
    let timing = cfg.peak_timing();

    let mut cells = Vec::with_capacity(cfg.cols);
    let mut peaks = Vec::with_capacity(cfg.cols);

    for x in 0..cfg.cols {
        let target = levels.get(x).map_or(0.0, |l| l.level as f64);
        let cur = smooth(state.current_levels[x], target, cfg.transition_speed.value);
        state.current_levels[x] = cur;

        let column_colors = cfg.pixel_colors.get(x);
        let mut column: Vec<PixelColor> = (0..cfg.rows)
            .map(|y| {
                if (y as f64) < cur {
                    column_colors.and_then(|c| c.get(y)).copied().unwrap_or(PixelColor::BLACK)
                } else {
                    PixelColor::BLACK
                }
            })
            .collect();

        let peak = if cfg.show_peaks {
            state.peaks[x].advance(cur as usize, now_ms, &timing)
        } else {
            None
        };
        if let Some(row) = peak.filter(|r| *r < cfg.rows) {
            column[row] = cfg.peak_color;
        }

        cells.push(column);
        peaks.push(peak);
    }

    Frame { levels, current: state.current_levels.clone(), cells, peaks }
}

/// A display backend: shared rendering composed with one sink
pub struct SpectrumDisplay<S: DisplaySink> {
    config: DisplayConfiguration,
    state: RenderState,
    sink: S,
    inbox: Option<ConfigInbox>,
    epoch: Instant,
}

impl<S: DisplaySink> SpectrumDisplay<S> {
    pub fn new(config: DisplayConfiguration, sink: S) -> Self {
        let state = RenderState::new(config.cols);
        Self { config, state, sink, inbox: None, epoch: Instant::now() }
    }

    /// Open the control channel; updates sent to the port apply at the
    /// start of the next frame.
    pub fn control_port(&mut self) -> ConfigPort {
        let (port, inbox) = config_channel(&self.config);
        self.inbox = Some(inbox);
        port
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Render with an explicit clock, in milliseconds
    pub fn display_as_levels_at(&mut self, bands: &[Band], now_ms: i64) -> Frame {
        self.apply_pending();
        let frame = render_frame(&self.config, &mut self.state, bands, now_ms);
        if let Err(e) = self.sink.present(&frame, &self.config) {
            warn!("{} display: frame not shown: {}", self.config.display_type, e);
        }
        frame
    }

    fn apply_pending(&mut self) {
        let pending = match self.inbox.as_mut() {
            Some(inbox) => inbox.drain(),
            None => return,
        };
        for update in pending {
            self.update_configuration(&update);
        }
    }
}

impl<S: DisplaySink> DisplayRenderer for SpectrumDisplay<S> {
    fn display_type(&self) -> DisplayType {
        self.config.display_type
    }

    fn clear(&mut self) {
        if let Err(e) = self.sink.clear() {
            warn!("{} display: clear failed: {}", self.config.display_type, e);
        }
    }

    fn configuration(&self) -> DisplayConfiguration {
        self.config.clone()
    }

    fn update_configuration(&mut self, update: &ConfigUpdate) -> UpdateOutcome {
        let outcome = self.config.apply(update);
        if outcome.changed() {
            debug!("{} display: updated {:?}", self.config.display_type, outcome.applied);
            if let Some(inbox) = self.inbox.as_ref() {
                inbox.publish(&self.config);
            }
            if let Err(e) = self.sink.configuration_changed(&self.config) {
                warn!("{} display: change notice failed: {}", self.config.display_type, e);
            }
        }
        outcome
    }

    fn display_as_levels(&mut self, bands: &[Band]) {
        let now_ms = self.epoch.elapsed().as_millis() as i64;
        self.display_as_levels_at(bands, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SpectrumError};

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Frame>,
        clears: usize,
        changes: usize,
        fail: bool,
    }

    impl DisplaySink for RecordingSink {
        fn present(&mut self, frame: &Frame, _config: &DisplayConfiguration) -> Result<()> {
            if self.fail {
                return Err(SpectrumError::Sink("gone".into()));
            }
            self.frames.push(frame.clone());
            Ok(())
        }

        fn clear(&mut self) -> Result<()> {
            self.clears += 1;
            Ok(())
        }

        fn configuration_changed(&mut self, _config: &DisplayConfiguration) -> Result<()> {
            self.changes += 1;
            Ok(())
        }
    }

    fn loud(cols: usize) -> Vec<Band> {
        (0..cols).map(|i| Band::new(1000 * (i as u32 + 1), 1.0)).collect()
    }

    fn quiet(cols: usize) -> Vec<Band> {
        (0..cols).map(|i| Band::new(1000 * (i as u32 + 1), 0.0)).collect()
    }

    #[test]
    fn test_bars_rise_instantly_and_fall_by_transition_speed() {
        let cfg = DisplayConfiguration::led(10, 2);
        let mut state = RenderState::new(2);

        let frame = render_frame(&cfg, &mut state, &loud(2), 0);
        assert_eq!(frame.current, vec![10.0, 10.0]);
        assert_eq!(frame.lit(0), 10);

        let frame = render_frame(&cfg, &mut state, &quiet(2), 16);
        assert_eq!(frame.current, vec![8.5, 8.5]);
        // rows 0..=8 lit by the bar, row 9 by the held peak
        assert_eq!(frame.cell(0, 8), cfg.pixel_colors[0][8]);
        assert_eq!(frame.cell(0, 9), cfg.peak_color);
    }

    #[test]
    fn test_peaks_hidden_when_disabled() {
        let mut cfg = DisplayConfiguration::console(16, 3);
        cfg.show_peaks = false;
        let mut state = RenderState::new(3);
        let frame = render_frame(&cfg, &mut state, &quiet(3), 0);
        assert!(frame.peaks.iter().all(|p| p.is_none()));
        assert_eq!(frame.lit(1), 0);
    }

    #[test]
    fn test_silent_peak_drawn_at_baseline() {
        let cfg = DisplayConfiguration::web(15, 1);
        let mut state = RenderState::new(1);
        let frame = render_frame(&cfg, &mut state, &quiet(1), 0);
        assert_eq!(frame.peaks, vec![Some(0)]);
        assert_eq!(frame.cell(0, 0), cfg.peak_color);
    }

    #[test]
    fn test_missing_bands_render_as_silence() {
        let cfg = DisplayConfiguration::led(10, 4);
        let mut state = RenderState::new(4);
        let frame = render_frame(&cfg, &mut state, &loud(2), 0);
        assert_eq!(frame.current, vec![10.0, 10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sink_failure_is_not_fatal() {
        let sink = RecordingSink { fail: true, ..Default::default() };
        let mut display = SpectrumDisplay::new(DisplayConfiguration::led(10, 2), sink);
        let frame = display.display_as_levels_at(&loud(2), 0);
        assert_eq!(frame.current, vec![10.0, 10.0]);
        assert_eq!(display.state().current_levels, vec![10.0, 10.0]);
    }

    #[test]
    fn test_updates_apply_at_frame_start() {
        let mut display = SpectrumDisplay::new(DisplayConfiguration::led(10, 2), RecordingSink::default());
        let port = display.control_port();

        port.submit(ConfigUpdate { transition_speed: Some(5.0), ..Default::default() }).unwrap();
        // nothing applied until a frame runs
        assert_eq!(display.configuration().transition_speed.value, 1.5);

        display.display_as_levels_at(&loud(2), 0);
        let frame = display.display_as_levels_at(&quiet(2), 10);
        assert_eq!(frame.current, vec![5.0, 5.0]);
        assert_eq!(port.configuration().transition_speed.value, 5.0);
        assert_eq!(display.sink().changes, 1);
    }

    #[test]
    fn test_wrong_type_update_changes_nothing() {
        let mut display = SpectrumDisplay::new(DisplayConfiguration::console(16, 2), RecordingSink::default());
        let before = display.configuration();
        let outcome = display.update_configuration(&ConfigUpdate {
            peak_wait: Some(100),
            ..ConfigUpdate::for_display(DisplayType::Led)
        });
        assert!(!outcome.changed());
        assert_eq!(display.configuration(), before);
        assert_eq!(display.sink().changes, 0);
    }
}
