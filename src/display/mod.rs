/*
 *  display/mod.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem: one renderer contract, three sinks
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

// Core trait definitions
pub mod traits;
pub mod color;
pub mod configuration;
pub mod renderer;

// Backend sinks
pub mod drivers;

pub use color::PixelColor;
pub use configuration::{ConfigUpdate, DisplayConfiguration, DisplayType, UpdateOutcome};
pub use renderer::{render_frame, RenderState, SpectrumDisplay};
pub use traits::{DisplayRenderer, DisplaySink, Frame};
