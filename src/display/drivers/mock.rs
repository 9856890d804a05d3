/*
 *  display/drivers/mock.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  In-memory LED strip for testing without hardware
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

use std::sync::{Arc, Mutex, MutexGuard};

use crate::display::color::PixelColor;
use crate::display::drivers::led::LedStrip;
use crate::error::{Result, SpectrumError};

/// LED strip that keeps its pixels in memory
///
/// Clones share state, so a test can hand the strip to a sink and still
/// inspect what was latched through [`MemoryStrip::state`].
#[derive(Debug, Clone)]
pub struct MemoryStrip {
    len: usize,
    pending: Vec<PixelColor>,
    state: Arc<Mutex<MemoryStripState>>,
}

/// What the strip has shown so far
#[derive(Debug, Default)]
pub struct MemoryStripState {
    /// colors as of the last show()
    pub pixels: Vec<PixelColor>,

    /// Number of times show() succeeded
    pub show_count: usize,

    /// Simulate a dead strip
    pub simulate_show_failure: bool,
}

impl MemoryStrip {
    pub fn new(len: usize) -> Self {
        let state = MemoryStripState { pixels: vec![PixelColor::BLACK; len], ..Default::default() };
        Self { len, pending: vec![PixelColor::BLACK; len], state: Arc::new(Mutex::new(state)) }
    }

    pub fn state(&self) -> Arc<Mutex<MemoryStripState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStripState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count LEDs currently lit
    pub fn lit_count(&self) -> usize {
        self.lock().pixels.iter().filter(|p| !p.is_black()).count()
    }
}

impl LedStrip for MemoryStrip {
    fn len(&self) -> usize {
        self.len
    }

    fn set(&mut self, index: usize, color: PixelColor) {
        if let Some(p) = self.pending.get_mut(index) {
            *p = color;
        }
    }

    fn show(&mut self) -> Result<()> {
        let mut state = self.lock();
        if state.simulate_show_failure {
            return Err(SpectrumError::Sink("Simulated show failure".into()));
        }
        state.pixels.clone_from(&self.pending);
        state.show_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_latches_pending() {
        let mut strip = MemoryStrip::new(3);
        strip.set(1, PixelColor::RED);
        strip.set(7, PixelColor::RED);
        assert_eq!(strip.lit_count(), 0);

        strip.show().unwrap();
        assert_eq!(strip.lit_count(), 1);
        assert_eq!(strip.state().lock().unwrap().show_count, 1);
    }

    #[test]
    fn test_simulated_failure() {
        let mut strip = MemoryStrip::new(1);
        strip.state().lock().unwrap().simulate_show_failure = true;
        assert!(matches!(strip.show(), Err(SpectrumError::Sink(_))));
    }
}
