/*
 *  display/configuration.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-renderer tunables and partial updates
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

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::display::color::{
    color_map, console_gradient, generate_gradient, hue_ramp, ConsoleColor, PixelColor,
};
use crate::error::SpectrumError;
use crate::peak::PeakTiming;

/// Which backend a configuration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayType {
    #[serde(rename = "LED")]
    Led,
    #[serde(rename = "CONSOLE")]
    Console,
    #[serde(rename = "WEB")]
    Web,
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayType::Led => write!(f, "LED"),
            DisplayType::Console => write!(f, "CONSOLE"),
            DisplayType::Web => write!(f, "WEB"),
        }
    }
}

/// A tunable travelling with its legal range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounded<T> {
    pub min: T,
    pub value: T,
    pub max: T,
}

impl<T: PartialOrd + Copy + Default> Bounded<T> {
    pub fn new(min: T, value: T, max: T) -> Self {
        Self { min, value, max }
    }

    /// Accepts strictly positive values inside `min..=max`; anything else is
    /// left out, never clamped.
    pub fn accepts(&self, v: T) -> bool {
        v > T::default() && v >= self.min && v <= self.max
    }
}

pub const DEFAULT_AMPLIFICATION: Bounded<f64> = Bounded { min: 1000.0, value: 5000.0, max: 10000.0 };

/// Snapshot of every tunable of one renderer.
///
/// `pixel_colors` is indexed `[col][row]`, row 0 at the bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfiguration {
    pub display_type: DisplayType,
    pub rows: usize,
    pub cols: usize,
    pub brightness: Bounded<u32>,
    pub transition_speed: Bounded<f64>,
    pub peak_wait: Bounded<i64>,
    pub peak_wait_count_down: Bounded<i64>,
    pub amplification_factor: Bounded<f64>,
    pub show_peaks: bool,
    pub show_peaks_when_silent: bool,
    pub is_brightness_supported: bool,
    pub peak_color: PixelColor,
    pub pixel_colors: Vec<Vec<PixelColor>>,
    pub gradient_start_color: PixelColor,
    pub gradient_end_color: PixelColor,
}

fn transition_bounds(rows: usize, value: f64) -> Bounded<f64> {
    let max = ((rows / 2) as f64).max(value);
    Bounded::new(1.0, value, max)
}

impl DisplayConfiguration {
    pub fn for_type(display_type: DisplayType, rows: usize, cols: usize) -> Self {
        match display_type {
            DisplayType::Led => Self::led(rows, cols),
            DisplayType::Console => Self::console(rows, cols),
            DisplayType::Web => Self::web(rows, cols),
        }
    }

    pub fn led(rows: usize, cols: usize) -> Self {
        let start = PixelColor::new(100, 255, 0);
        let end = PixelColor::new(255, 100, 0);
        Self {
            display_type: DisplayType::Led,
            rows,
            cols,
            brightness: Bounded::new(1, 2, 50),
            transition_speed: transition_bounds(rows, 1.5),
            peak_wait: Bounded::new(1, 500, 5000),
            peak_wait_count_down: Bounded::new(1, 100, 1000),
            amplification_factor: DEFAULT_AMPLIFICATION,
            show_peaks: true,
            show_peaks_when_silent: true,
            is_brightness_supported: true,
            peak_color: PixelColor::RED,
            pixel_colors: color_map(cols, &generate_gradient(start, end, rows)),
            gradient_start_color: start,
            gradient_end_color: end,
        }
    }

    pub fn console(rows: usize, cols: usize) -> Self {
        Self {
            display_type: DisplayType::Console,
            rows,
            cols,
            brightness: Bounded::new(1, 100, 100),
            transition_speed: transition_bounds(rows, 1.0),
            peak_wait: Bounded::new(1, 2000, 5000),
            peak_wait_count_down: Bounded::new(1, 20, 1000),
            amplification_factor: DEFAULT_AMPLIFICATION,
            show_peaks: true,
            show_peaks_when_silent: true,
            is_brightness_supported: false,
            peak_color: ConsoleColor::DarkRed.to_pixel(),
            pixel_colors: color_map(cols, &console_gradient(rows)),
            gradient_start_color: ConsoleColor::DarkGreen.to_pixel(),
            gradient_end_color: ConsoleColor::DarkRed.to_pixel(),
        }
    }

    pub fn web(rows: usize, cols: usize) -> Self {
        Self {
            display_type: DisplayType::Web,
            rows,
            cols,
            brightness: Bounded::new(1, 100, 100),
            transition_speed: transition_bounds(rows, 2.0),
            peak_wait: Bounded::new(1, 500, 5000),
            peak_wait_count_down: Bounded::new(1, 20, 1000),
            amplification_factor: DEFAULT_AMPLIFICATION,
            show_peaks: true,
            show_peaks_when_silent: true,
            is_brightness_supported: false,
            peak_color: PixelColor::from_hsv(0.0, 1.0, 1.0),
            pixel_colors: color_map(cols, &hue_ramp(rows, 120.0, 1.0)),
            gradient_start_color: PixelColor::from_hsv(120.0, 1.0, 1.0),
            gradient_end_color: PixelColor::from_hsv(1.0, 1.0, 1.0),
        }
    }

    pub fn peak_timing(&self) -> PeakTiming {
        PeakTiming {
            peak_wait_ms: self.peak_wait.value,
            countdown_ms: self.peak_wait_count_down.value,
            top_row: self.rows.saturating_sub(1),
            show_when_silent: self.show_peaks_when_silent,
        }
    }

    /// Brightness percentage a sink should scale colors by
    pub fn effective_brightness(&self) -> f64 {
        if self.is_brightness_supported { self.brightness.value as f64 } else { 100.0 }
    }

    /// Rebuild the color map from the gradient ends. Console colors are
    /// snapped to the terminal palette.
    pub fn regenerate_colors(&mut self) {
        let mut column = generate_gradient(self.gradient_start_color, self.gradient_end_color, self.rows);
        if self.display_type == DisplayType::Console {
            column.iter_mut().for_each(|c| *c = ConsoleColor::from_pixel(*c).to_pixel());
        }
        self.pixel_colors = color_map(self.cols, &column);
    }

    /// Apply whatever fields of `update` are present and valid.
    ///
    /// An update tagged for another display, or untagged, changes nothing.
    pub fn apply(&mut self, update: &ConfigUpdate) -> UpdateOutcome {
        let mut out = UpdateOutcome::default();

        if update.display_type != Some(self.display_type) {
            let tag = update.display_type.map(|t| t.to_string()).unwrap_or_else(|| "none".into());
            out.reject(self.display_type, SpectrumError::rejected(
                "displayType",
                format!("update for {tag} ignored by {} display", self.display_type),
            ));
            return out;
        }

        apply_bounded(&mut self.transition_speed, update.transition_speed, "transitionSpeed", self.display_type, &mut out);
        apply_bounded(&mut self.peak_wait, update.peak_wait, "peakWait", self.display_type, &mut out);
        apply_bounded(&mut self.peak_wait_count_down, update.peak_wait_count_down, "peakWaitCountDown", self.display_type, &mut out);
        apply_bounded(&mut self.amplification_factor, update.amplification_factor, "amplificationFactor", self.display_type, &mut out);

        if let Some(b) = update.brightness {
            if self.is_brightness_supported {
                apply_bounded(&mut self.brightness, Some(b), "brightness", self.display_type, &mut out);
            } else {
                out.reject(self.display_type, SpectrumError::rejected("brightness", "not supported by this display"));
            }
        }

        if let Some(v) = update.show_peaks {
            self.show_peaks = v;
            out.applied.push("showPeaks");
        }
        if let Some(v) = update.show_peaks_when_silent {
            self.show_peaks_when_silent = v;
            out.applied.push("showPeaksWhenSilent");
        }
        if let Some(c) = update.peak_color {
            self.peak_color = c;
            out.applied.push("peakColor");
        }

        let mut gradient_changed = false;
        if let Some(c) = update.gradient_start_color {
            gradient_changed |= c != self.gradient_start_color;
            self.gradient_start_color = c;
            out.applied.push("gradientStartColor");
        }
        if let Some(c) = update.gradient_end_color {
            gradient_changed |= c != self.gradient_end_color;
            self.gradient_end_color = c;
            out.applied.push("gradientEndColor");
        }

        match update.pixel_colors.as_ref() {
            Some(colors) if colors.len() == self.cols && colors.iter().all(|c| c.len() == self.rows) => {
                self.pixel_colors = colors.clone();
                out.applied.push("pixelColors");
            }
            Some(colors) => {
                out.reject(self.display_type, SpectrumError::rejected(
                    "pixelColors",
                    format!("expected {} columns of {} rows, got {} columns", self.cols, self.rows, colors.len()),
                ));
            }
            None if gradient_changed => self.regenerate_colors(),
            None => {}
        }

        out
    }
}

fn apply_bounded<T>(
    target: &mut Bounded<T>,
    incoming: Option<T>,
    field: &'static str,
    display: DisplayType,
    out: &mut UpdateOutcome,
) where
    T: PartialOrd + Copy + Default + fmt::Display,
{
    let Some(v) = incoming else { return };
    if target.accepts(v) {
        target.value = v;
        out.applied.push(field);
    } else {
        out.reject(display, SpectrumError::rejected(
            field,
            format!("{v} outside {}..={} or not positive", target.min, target.max),
        ));
    }
}

/// Partial configuration; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub display_type: Option<DisplayType>,
    pub brightness: Option<u32>,
    pub transition_speed: Option<f64>,
    pub peak_wait: Option<i64>,
    pub peak_wait_count_down: Option<i64>,
    pub amplification_factor: Option<f64>,
    pub show_peaks: Option<bool>,
    pub show_peaks_when_silent: Option<bool>,
    pub peak_color: Option<PixelColor>,
    pub pixel_colors: Option<Vec<Vec<PixelColor>>>,
    pub gradient_start_color: Option<PixelColor>,
    pub gradient_end_color: Option<PixelColor>,
}

impl ConfigUpdate {
    pub fn for_display(display_type: DisplayType) -> Self {
        Self { display_type: Some(display_type), ..Default::default() }
    }
}

/// What an update actually changed
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub applied: Vec<&'static str>,
    pub rejected: Vec<SpectrumError>,
}

impl UpdateOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }

    fn reject(&mut self, display: DisplayType, err: SpectrumError) {
        warn!("{display} display: {err}");
        self.rejected.push(err);
    }
}
