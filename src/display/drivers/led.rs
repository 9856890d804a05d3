/*
 *  display/drivers/led.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  WS2812 LED matrix sink, strip wiring and SPI transport
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

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::SpidevDevice;
use log::info;
use serde::{Deserialize, Serialize};

use crate::display::color::PixelColor;
use crate::display::configuration::DisplayConfiguration;
use crate::display::traits::{DisplaySink, Frame};
use crate::error::{Result, SpectrumError};
use crate::vframebuf::VarFrameBuf;

/// 2.4 MHz gives three SPI bits per WS2812 data bit
pub const WS2812_SPI_HZ: u32 = 2_400_000;

/// >50us low at 2.4 MHz latches the strip
const WS2812_RESET_BYTES: usize = 32;

pub const DEFAULT_SPI_DEVICE: &str = "/dev/spidev0.0";

/// How the strip snakes through the matrix, one column after another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedWiring {
    /// every column runs bottom to top
    #[default]
    ZigZag,
    /// odd columns run top to bottom
    Serpentine,
}

impl LedWiring {
    /// Strip position of `(row, col)`, row 0 at the bottom
    pub fn index(self, row: usize, col: usize, rows: usize) -> usize {
        match self {
            LedWiring::ZigZag => col * rows + row,
            LedWiring::Serpentine if col % 2 == 1 => col * rows + (rows - 1 - row),
            LedWiring::Serpentine => col * rows + row,
        }
    }
}

/// A chain of addressable LEDs
pub trait LedStrip: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set(&mut self, index: usize, color: PixelColor);

    /// Latch the buffered colors onto the LEDs
    fn show(&mut self) -> Result<()>;
}

/// Renders frames onto an LED matrix through a strip
pub struct LedMatrixSink<L: LedStrip> {
    strip: L,
    image: VarFrameBuf<Rgb888>,
    wiring: LedWiring,
    rows: usize,
    cols: usize,
}

impl<L: LedStrip> LedMatrixSink<L> {
    pub fn new(strip: L, rows: usize, cols: usize, wiring: LedWiring) -> Result<Self> {
        if strip.len() < rows * cols {
            return Err(SpectrumError::unavailable(
                "led strip",
                format!("{} LEDs cannot hold a {cols}x{rows} matrix", strip.len()),
            ));
        }
        Ok(Self { strip, image: VarFrameBuf::new(cols, rows, Rgb888::BLACK), wiring, rows, cols })
    }

    /// The last image drawn, top row first
    pub fn image(&self) -> &VarFrameBuf<Rgb888> {
        &self.image
    }

    pub fn strip(&self) -> &L {
        &self.strip
    }

    fn push_image(&mut self) -> Result<()> {
        for (x, y, c) in self.image.pixels() {
            let row = self.rows - 1 - y;
            self.strip.set(self.wiring.index(row, x, self.rows), c.into());
        }
        self.strip.show()
    }
}

impl<L: LedStrip> DisplaySink for LedMatrixSink<L> {
    fn present(&mut self, frame: &Frame, config: &DisplayConfiguration) -> Result<()> {
        let brightness = config.effective_brightness();
        let (rows, cols) = (self.rows, self.cols);
        let pixels = (0..cols).flat_map(|x| {
            (0..rows).map(move |y| {
                let color = frame.cell(x, y).with_brightness(brightness);
                Pixel(Point::new(x as i32, (rows - 1 - y) as i32), Rgb888::from(color))
            })
        });
        let Ok(()) = self.image.draw_iter(pixels);
        self.push_image()
    }

    fn clear(&mut self) -> Result<()> {
        self.image.fill(Rgb888::BLACK);
        self.push_image()
    }
}

/// Expand GRB bytes into the WS2812 SPI bit pattern: 1 -> 110, 0 -> 100.
pub fn encode_ws2812(pixels: &[PixelColor]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 9 + WS2812_RESET_BYTES);
    for p in pixels {
        for byte in [p.g, p.r, p.b] {
            let mut bits: u32 = 0;
            for i in (0..8).rev() {
                bits = (bits << 3) | if byte & (1 << i) != 0 { 0b110 } else { 0b100 };
            }
            out.extend_from_slice(&bits.to_be_bytes()[1..]);
        }
    }
    out.resize(out.len() + WS2812_RESET_BYTES, 0);
    out
}

/// WS2812 strip driven from the SPI MOSI line
pub struct SpiStrip {
    dev: SpidevDevice,
    pixels: Vec<PixelColor>,
}

impl SpiStrip {
    pub fn open(path: &str, len: usize) -> Result<Self> {
        let mut dev = SpidevDevice::open(path).map_err(|e| SpectrumError::unavailable(path, format!("{e:?}")))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(WS2812_SPI_HZ)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        dev.0.configure(&options).map_err(|e| SpectrumError::unavailable(path, e))?;
        info!("LED strip of {len} pixels on {path}");
        Ok(Self { dev, pixels: vec![PixelColor::BLACK; len] })
    }
}

impl LedStrip for SpiStrip {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set(&mut self, index: usize, color: PixelColor) {
        if let Some(p) = self.pixels.get_mut(index) {
            *p = color;
        }
    }

    fn show(&mut self) -> Result<()> {
        let bytes = encode_ws2812(&self.pixels);
        SpiDevice::write(&mut self.dev, &bytes).map_err(|e| SpectrumError::Sink(format!("spi write: {e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::MemoryStrip;

    #[test]
    fn test_wiring_index() {
        assert_eq!(LedWiring::ZigZag.index(0, 0, 10), 0);
        assert_eq!(LedWiring::ZigZag.index(9, 1, 10), 19);
        assert_eq!(LedWiring::Serpentine.index(0, 1, 10), 19);
        assert_eq!(LedWiring::Serpentine.index(9, 1, 10), 10);
        assert_eq!(LedWiring::Serpentine.index(3, 2, 10), 23);
    }

    #[test]
    fn test_ws2812_bit_pattern() {
        let bytes = encode_ws2812(&[PixelColor::new(0x00, 0xFF, 0x00)]);
        // green first: 0xFF
        assert_eq!(&bytes[0..3], &[0xDB, 0x6D, 0xB6]);
        // red: 0x00
        assert_eq!(&bytes[3..6], &[0x92, 0x49, 0x24]);
        assert_eq!(bytes.len(), 9 + WS2812_RESET_BYTES);
        assert!(bytes[9..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_present_scales_brightness_and_maps_rows() {
        let strip = MemoryStrip::new(4);
        let state = strip.state();
        let mut sink = LedMatrixSink::new(strip, 2, 2, LedWiring::ZigZag).unwrap();

        let mut cfg = DisplayConfiguration::led(2, 2);
        cfg.brightness.value = 50;
        let frame = Frame {
            levels: Vec::new(),
            current: vec![1.0, 0.0],
            cells: vec![
                vec![PixelColor::new(200, 100, 0), PixelColor::BLACK],
                vec![PixelColor::BLACK, PixelColor::RED],
            ],
            peaks: vec![None, Some(1)],
        };
        sink.present(&frame, &cfg).unwrap();

        let s = state.lock().unwrap();
        assert_eq!(s.show_count, 1);
        assert_eq!(s.pixels[0], PixelColor::new(100, 50, 0));
        assert_eq!(s.pixels[1], PixelColor::BLACK);
        assert_eq!(s.pixels[3], PixelColor::new(127, 0, 0));
        // bottom-left lands at the bottom of the image
        assert_eq!(sink.image().get(0, 1), Some(Rgb888::new(100, 50, 0)));
    }

    #[test]
    fn test_short_strip_is_unavailable() {
        let err = LedMatrixSink::new(MemoryStrip::new(3), 2, 2, LedWiring::ZigZag).err().unwrap();
        assert!(matches!(err, SpectrumError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_missing_spi_device() {
        let err = SpiStrip::open("/dev/does-not-exist-spidev9.9", 100).err().unwrap();
        assert!(matches!(err, SpectrumError::DeviceUnavailable { .. }));
    }
}
