/*
 *  display/traits.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for renderers and their pixel sinks
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

use crate::display::color::PixelColor;
use crate::display::configuration::{ConfigUpdate, DisplayConfiguration, DisplayType, UpdateOutcome};
use crate::error::Result;
use crate::levels::{Band, Level};

/// One rendered frame, independent of the backend that will show it
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// target levels straight from the level mapper
    pub levels: Vec<Level>,

    /// smoothed level actually drawn per column
    pub current: Vec<f64>,

    /// `[col][row]` colors, row 0 at the bottom; black means off
    pub cells: Vec<Vec<PixelColor>>,

    /// visible peak row per column
    pub peaks: Vec<Option<usize>>,
}

impl Frame {
    pub fn cols(&self) -> usize {
        self.cells.len()
    }

    pub fn rows(&self) -> usize {
        self.cells.first().map_or(0, |c| c.len())
    }

    pub fn cell(&self, col: usize, row: usize) -> PixelColor {
        self.cells
            .get(col)
            .and_then(|c| c.get(row))
            .copied()
            .unwrap_or(PixelColor::BLACK)
    }

    /// Number of lit rows in a column, peak marker included
    pub fn lit(&self, col: usize) -> usize {
        self.cells.get(col).map_or(0, |c| c.iter().filter(|p| !p.is_black()).count())
    }
}

/// Backend-specific output: LED strip, terminal, or web transport.
///
/// Writes are fire-and-forget from the renderer's point of view; an error
/// is logged and the frame counts as rendered.
pub trait DisplaySink: Send {
    /// Push a frame to the device
    fn present(&mut self, frame: &Frame, config: &DisplayConfiguration) -> Result<()>;

    /// Blank the device
    fn clear(&mut self) -> Result<()>;

    /// Called after an update changed the configuration
    fn configuration_changed(&mut self, _config: &DisplayConfiguration) -> Result<()> {
        Ok(())
    }
}

/// The contract every display backend fulfils
pub trait DisplayRenderer: Send {
    fn display_type(&self) -> DisplayType;

    fn clear(&mut self);

    /// A copy of the configuration in effect
    fn configuration(&self) -> DisplayConfiguration;

    /// Partial update; see [`DisplayConfiguration::apply`]
    fn update_configuration(&mut self, update: &ConfigUpdate) -> UpdateOutcome;

    /// Render one frame of band magnitudes
    fn display_as_levels(&mut self, bands: &[Band]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_geometry() {
        let frame = Frame {
            levels: Vec::new(),
            current: vec![1.0, 0.0],
            cells: vec![
                vec![PixelColor::RED, PixelColor::BLACK, PixelColor::BLACK],
                vec![PixelColor::BLACK; 3],
            ],
            peaks: vec![None, None],
        };
        assert_eq!(frame.cols(), 2);
        assert_eq!(frame.rows(), 3);
        assert_eq!(frame.lit(0), 1);
        assert_eq!(frame.cell(0, 0), PixelColor::RED);
        assert_eq!(frame.cell(5, 5), PixelColor::BLACK);
    }
}
