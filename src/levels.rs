/*
 *  levels.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Band magnitudes to integer display levels
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

use serde::{Deserialize, Serialize};

/// Accumulated magnitude for one entry of the band table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub center_or_upper_hz: u32,
    pub magnitude: f64,
}

impl Band {
    pub fn new(center_or_upper_hz: u32, magnitude: f64) -> Self {
        Self { center_or_upper_hz, magnitude }
    }
}

/// A band quantized to a display's row count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub band: u32,
    pub level: usize,
}

/// amplify -> normalize -> to_levels, always in that order
pub trait LevelMapper {
    fn amplify(&self, factor: f64) -> Vec<Band>;
    fn normalize(&self) -> Vec<Band>;
    fn to_levels(&self, max_level: usize) -> Vec<Level>;
}

impl LevelMapper for [Band] {
    fn amplify(&self, factor: f64) -> Vec<Band> {
        self.iter().map(|b| Band::new(b.center_or_upper_hz, b.magnitude * factor)).collect()
    }

    fn normalize(&self) -> Vec<Band> {
        self.iter().map(|b| Band::new(b.center_or_upper_hz, b.magnitude.clamp(0.0, 1.0))).collect()
    }

    /// Round half to even; negative products floor at zero.
    fn to_levels(&self, max_level: usize) -> Vec<Level> {
        self.iter()
            .map(|b| Level {
                band: b.center_or_upper_hz,
                level: (b.magnitude * max_level as f64).round_ties_even() as usize,
            })
            .collect()
    }
}

/// The full mapping a renderer applies to every frame.
pub fn map_to_levels(bands: &[Band], factor: f64, rows: usize) -> Vec<Level> {
    bands.amplify(factor).normalize().to_levels(rows)
}
