/*
 *  display/color.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  RGB pixel colors, gradients and the console palette
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
use serde::{Deserialize, Serialize};

/// 24-bit RGB value, the color currency of every renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees (0..360), saturation and lightness in 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl PixelColor {
    pub const BLACK: PixelColor = PixelColor::new(0, 0, 0);
    pub const WHITE: PixelColor = PixelColor::new(255, 255, 255);
    pub const RED: PixelColor = PixelColor::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == PixelColor::BLACK
    }

    /// Scale every channel by `brightness` percent, truncating.
    pub fn with_brightness(self, brightness: f64) -> PixelColor {
        let scale = |c: u8| (c as f64 * brightness / 100.0).clamp(0.0, 255.0) as u8;
        PixelColor::new(scale(self.r), scale(self.g), scale(self.b))
    }

    pub fn to_hsl(self) -> Hsl {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let l = (max + min) / 2.0;

        if delta == 0.0 {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let s = if l < 0.5 { delta / (max + min) } else { delta / (2.0 - max - min) };
        let h = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        Hsl { h: h * 60.0, s, l }
    }

    pub fn from_hsl(hsl: Hsl) -> PixelColor {
        let c = (1.0 - (2.0 * hsl.l - 1.0).abs()) * hsl.s;
        from_chroma(hsl.h, c, hsl.l - c / 2.0)
    }

    /// HSV with saturation and value in 0..=1
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> PixelColor {
        let c = value * saturation;
        from_chroma(hue, c, value - c)
    }
}

fn from_chroma(hue: f64, c: f64, m: f64) -> PixelColor {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    PixelColor::new(channel(r), channel(g), channel(b))
}

impl From<PixelColor> for Rgb888 {
    fn from(c: PixelColor) -> Self {
        Rgb888::new(c.r, c.g, c.b)
    }
}

impl From<Rgb888> for PixelColor {
    fn from(c: Rgb888) -> Self {
        PixelColor::new(c.r(), c.g(), c.b())
    }
}

/// Linear gradient of `count` colors from `start` to `end`, both endpoints included.
pub fn generate_gradient(start: PixelColor, end: PixelColor, count: usize) -> Vec<PixelColor> {
    if count == 1 {
        return vec![start];
    }
    let lerp = |a: u8, b: u8, ratio: f64| (a as f64 + (b as f64 - a as f64) * ratio) as u8;
    (0..count)
        .map(|i| {
            let ratio = i as f64 / (count - 1) as f64;
            PixelColor::new(
                lerp(start.r, end.r, ratio),
                lerp(start.g, end.g, ratio),
                lerp(start.b, end.b, ratio),
            )
        })
        .collect()
}

/// Hue ramp from `from_hue` at the bottom row towards `to_hue`, full saturation and value.
pub fn hue_ramp(rows: usize, from_hue: f64, to_hue: f64) -> Vec<PixelColor> {
    (0..rows)
        .map(|y| {
            let hue = from_hue + y as f64 * (to_hue - from_hue) / rows as f64;
            PixelColor::from_hsv(hue, 1.0, 1.0)
        })
        .collect()
}

/// Repeat one column of colors across `cols` columns, giving a `[col][row]` map.
pub fn color_map(cols: usize, column: &[PixelColor]) -> Vec<Vec<PixelColor>> {
    vec![column.to_vec(); cols]
}

/// The sixteen-color terminal palette, restricted to what the renderer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleColor {
    Black,
    DarkRed,
    Red,
    DarkYellow,
    Yellow,
    Green,
    DarkGreen,
    Cyan,
    DarkCyan,
    Blue,
    DarkBlue,
    Magenta,
    DarkMagenta,
    White,
}

/// Hue-ordered console colors and the RGB value each stands for.
pub const CONSOLE_HUES: [(ConsoleColor, PixelColor); 12] = [
    (ConsoleColor::DarkRed, PixelColor::new(128, 0, 0)),
    (ConsoleColor::Red, PixelColor::new(255, 0, 0)),
    (ConsoleColor::DarkYellow, PixelColor::new(128, 128, 0)),
    (ConsoleColor::Yellow, PixelColor::new(255, 255, 0)),
    (ConsoleColor::Green, PixelColor::new(0, 255, 0)),
    (ConsoleColor::DarkGreen, PixelColor::new(0, 128, 0)),
    (ConsoleColor::Cyan, PixelColor::new(0, 255, 255)),
    (ConsoleColor::DarkCyan, PixelColor::new(0, 128, 128)),
    (ConsoleColor::Blue, PixelColor::new(0, 0, 255)),
    (ConsoleColor::DarkBlue, PixelColor::new(0, 0, 128)),
    (ConsoleColor::Magenta, PixelColor::new(255, 0, 255)),
    (ConsoleColor::DarkMagenta, PixelColor::new(128, 0, 128)),
];

const DARK_GREEN_INDEX: i64 = 5;

/// Integer linear map, truncating like the palette index math expects
fn map_index(value: i64, from_min: i64, from_max: i64, to_min: i64, to_max: i64) -> i64 {
    to_min + (value - from_min) * (to_max - to_min) / (from_max - from_min)
}

impl ConsoleColor {
    pub fn to_pixel(self) -> PixelColor {
        match self {
            ConsoleColor::Black => PixelColor::BLACK,
            ConsoleColor::White => PixelColor::WHITE,
            hue => CONSOLE_HUES
                .iter()
                .find(|(c, _)| *c == hue)
                .map(|(_, p)| *p)
                .unwrap_or(PixelColor::BLACK),
        }
    }

    /// Nearest palette entry by hue; very light colors become White.
    pub fn from_pixel(color: PixelColor) -> ConsoleColor {
        if color.is_black() {
            return ConsoleColor::Black;
        }
        let hsl = color.to_hsl();
        if hsl.l > 0.75 {
            return ConsoleColor::White;
        }
        let max = CONSOLE_HUES.len() as i64 - 1;
        let idx = map_index(hsl.h as i64, 0, 300, 0, max).clamp(0, max);
        CONSOLE_HUES[idx as usize].0
    }
}

/// Default console column: dark green at the bottom, dark red at the top.
pub fn console_gradient(rows: usize) -> Vec<PixelColor> {
    (0..rows)
        .map(|y| {
            let idx = if rows > 1 {
                map_index(y as i64, 0, rows as i64 - 1, DARK_GREEN_INDEX, 0)
            } else {
                DARK_GREEN_INDEX
            };
            CONSOLE_HUES[idx as usize].1
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        let c0 = PixelColor::new(100, 255, 0);
        let c1 = PixelColor::new(255, 100, 0);
        let g = generate_gradient(c0, c1, 10);
        assert_eq!(g.len(), 10);
        assert_eq!(g[0], c0);
        assert_eq!(g[9], c1);
    }

    #[test]
    fn test_gradient_monotonic_channels() {
        let g = generate_gradient(PixelColor::new(100, 255, 7), PixelColor::new(255, 100, 7), 16);
        for w in g.windows(2) {
            assert!(w[1].r >= w[0].r);
            assert!(w[1].g <= w[0].g);
            assert_eq!(w[1].b, 7);
        }
    }

    #[test]
    fn test_gradient_single_and_empty() {
        let c = PixelColor::new(1, 2, 3);
        assert_eq!(generate_gradient(c, PixelColor::WHITE, 1), vec![c]);
        assert!(generate_gradient(c, PixelColor::WHITE, 0).is_empty());
    }

    #[test]
    fn test_brightness_scaling() {
        let c = PixelColor::new(200, 100, 51).with_brightness(50.0);
        assert_eq!(c, PixelColor::new(100, 50, 25));
        assert_eq!(PixelColor::WHITE.with_brightness(100.0), PixelColor::WHITE);
    }

    #[test]
    fn test_hsl_round_trip_primaries() {
        for c in [PixelColor::RED, PixelColor::new(0, 255, 0), PixelColor::new(0, 128, 128)] {
            assert_eq!(PixelColor::from_hsl(c.to_hsl()), c);
        }
        let hsl = PixelColor::new(0, 0, 255).to_hsl();
        assert_eq!(hsl.h, 240.0);
        assert_eq!(hsl.s, 1.0);
    }

    #[test]
    fn test_hsv_red_and_green() {
        assert_eq!(PixelColor::from_hsv(0.0, 1.0, 1.0), PixelColor::RED);
        assert_eq!(PixelColor::from_hsv(120.0, 1.0, 1.0), PixelColor::new(0, 255, 0));
    }

    #[test]
    fn test_console_mapping() {
        assert_eq!(ConsoleColor::from_pixel(PixelColor::RED), ConsoleColor::DarkRed);
        assert_eq!(ConsoleColor::from_pixel(PixelColor::new(0, 255, 0)), ConsoleColor::Green);
        assert_eq!(ConsoleColor::from_pixel(PixelColor::WHITE), ConsoleColor::White);
        assert_eq!(ConsoleColor::from_pixel(PixelColor::BLACK), ConsoleColor::Black);
        assert_eq!(ConsoleColor::DarkRed.to_pixel(), PixelColor::new(128, 0, 0));
    }

    #[test]
    fn test_console_gradient_runs_green_to_red() {
        let g = console_gradient(16);
        assert_eq!(g[0], ConsoleColor::DarkGreen.to_pixel());
        assert_eq!(g[15], ConsoleColor::DarkRed.to_pixel());
    }

    #[test]
    fn test_hue_ramp_starts_green() {
        let ramp = hue_ramp(15, 120.0, 1.0);
        assert_eq!(ramp.len(), 15);
        assert_eq!(ramp[0], PixelColor::new(0, 255, 0));
        assert!(ramp[14].r == 255);
    }
}
