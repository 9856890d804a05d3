/*
 *  display/drivers/mod.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Pixel sinks, one per backend
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

// LED matrix over SPI
pub mod led;

// ANSI terminal
pub mod terminal;

// browser clients via a broadcast transport
pub mod web;

// In-memory strip for tests without hardware
pub mod mock;

pub use led::{LedMatrixSink, LedStrip, LedWiring, SpiStrip};
pub use mock::MemoryStrip;
pub use terminal::TerminalSink;
pub use web::{BroadcastTransport, Transport, WebSink};
