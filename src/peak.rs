/*
 *  peak.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-column peak hold with accelerating fall
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

/// Timing knobs shared by every tracker of one renderer, taken from its
/// configuration snapshot each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakTiming {
    /// hold before the first fall
    pub peak_wait_ms: i64,
    /// shaved off the wait every frame, and the floor it never drops under
    pub countdown_ms: i64,
    pub top_row: usize,
    pub show_when_silent: bool,
}

impl PeakTiming {
    pub fn threshold_row(&self) -> usize {
        if self.show_when_silent { 0 } else { 1 }
    }
}

/// One column's peak marker.
///
/// The whole state is `(row, current_wait_ms, last_fall_ms)`; there is no
/// separate hold/fall mode. `advance` must run every frame, input changed or
/// not, since falling is driven by elapsed time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeakTracker {
    row: usize,
    current_wait_ms: i64,
    last_fall_ms: i64,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self) -> usize { self.row }
    pub fn current_wait_ms(&self) -> i64 { self.current_wait_ms }
    pub fn last_fall_ms(&self) -> i64 { self.last_fall_ms }

    /// Run one frame for the column's rendered level `value` at `now_ms`.
    ///
    /// Returns the row to draw the marker on, or `None` when it sits below
    /// the visibility threshold. The reported row is the one held this frame,
    /// before any fall is applied.
    pub fn advance(&mut self, value: usize, now_ms: i64, timing: &PeakTiming) -> Option<usize> {
        if value > self.row {
            self.row = value.min(timing.top_row);
            self.last_fall_ms = now_ms;
            self.current_wait_ms = timing.peak_wait_ms;
        }

        let shown = (self.row >= timing.threshold_row()).then_some(self.row);

        if now_ms - self.last_fall_ms >= self.current_wait_ms && self.row > 0 {
            self.row -= 1;
            self.last_fall_ms = now_ms;
        }

        self.current_wait_ms -= timing.countdown_ms;
        if self.current_wait_ms < timing.countdown_ms {
            self.current_wait_ms = timing.countdown_ms;
        }

        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(show_when_silent: bool) -> PeakTiming {
        PeakTiming { peak_wait_ms: 500, countdown_ms: 100, top_row: 9, show_when_silent }
    }

    #[test]
    fn test_silence_is_idempotent() {
        let t = timing(false);
        let mut p = PeakTracker::new();
        for frame in 0..200 {
            assert_eq!(p.advance(0, frame * 7, &t), None);
            assert_eq!(p.row(), 0);
        }
    }

    #[test]
    fn test_silent_peak_visible_when_enabled() {
        let mut p = PeakTracker::new();
        assert_eq!(p.advance(0, 0, &timing(true)), Some(0));
    }

    #[test]
    fn test_rearm_clamps_to_top_row() {
        let t = timing(false);
        let mut p = PeakTracker::new();
        assert_eq!(p.advance(t.top_row + 5, 1_000, &t), Some(9));
        assert_eq!(p.row(), 9);
        assert_eq!(p.last_fall_ms(), 1_000);
    }

    #[test]
    fn test_fall_accelerates() {
        let t = timing(false);
        let mut p = PeakTracker::new();
        p.advance(5, 0, &t);
        assert_eq!(p.current_wait_ms(), 400);

        p.advance(0, 100, &t); // 100 < 400
        p.advance(0, 200, &t); // 200 < 300
        assert_eq!(p.row(), 5);

        p.advance(0, 300, &t); // 300 >= 200, first fall
        assert_eq!(p.row(), 4);
        assert_eq!(p.last_fall_ms(), 300);

        p.advance(0, 350, &t); // 50 < 100
        assert_eq!(p.row(), 4);
        p.advance(0, 400, &t); // 100 >= 100, already at the floor
        assert_eq!(p.row(), 3);
    }

    #[test]
    fn test_wait_never_below_countdown() {
        let t = timing(true);
        let mut p = PeakTracker::new();
        for frame in 0..1_000i64 {
            let value = if frame % 97 == 0 { 9 } else { 0 };
            p.advance(value, frame * 3, &t);
            assert!(p.current_wait_ms() >= t.countdown_ms);
        }
    }

    #[test]
    fn test_reported_row_is_pre_fall() {
        let t = PeakTiming { peak_wait_ms: 1, countdown_ms: 1, top_row: 9, show_when_silent: false };
        let mut p = PeakTracker::new();
        p.advance(3, 0, &t);
        // wait elapsed: the frame still reports row 3, then drops
        assert_eq!(p.advance(0, 10, &t), Some(3));
        assert_eq!(p.row(), 2);
    }
}
