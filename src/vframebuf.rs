/*
 *  vframebuf.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime-sized embedded-graphics image for the LED matrix
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::PixelColor;
use embedded_graphics::prelude::*;

/// A framebuffer whose size is only known once the band table is loaded.
/// Origin is top-left, as embedded-graphics expects.
#[derive(Debug, Clone, PartialEq)]
pub struct VarFrameBuf<C: PixelColor> {
    buf: Vec<C>,
    w: usize,
    h: usize,
}

impl<C: PixelColor> VarFrameBuf<C> {
    pub fn new(width: usize, height: usize, fill: C) -> Self {
        Self { buf: vec![fill; width * height], w: width, h: height }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    pub fn fill(&mut self, color: C) {
        self.buf.fill(color);
    }

    pub fn get(&self, x: usize, y: usize) -> Option<C> {
        (x < self.w && y < self.h).then(|| self.buf[y * self.w + x])
    }

    /// Every pixel with its coordinates, row by row from the top
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, C)> + '_ {
        self.buf.iter().enumerate().map(move |(i, c)| (i % self.w, i / self.w, *c))
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        let (x, y) = (usize::try_from(p.x).ok()?, usize::try_from(p.y).ok()?);
        (x < self.w && y < self.h).then_some(y * self.w + x)
    }
}

impl<C: PixelColor> OriginDimensions for VarFrameBuf<C> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<C: PixelColor> DrawTarget for VarFrameBuf<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::Rgb888;

    #[test]
    fn test_draw_and_read_back() {
        let mut fb = VarFrameBuf::new(3, 2, Rgb888::BLACK);
        fb.draw_iter([Pixel(Point::new(2, 1), Rgb888::RED), Pixel(Point::new(-1, 0), Rgb888::GREEN)]).unwrap();
        assert_eq!(fb.get(2, 1), Some(Rgb888::RED));
        assert_eq!(fb.get(3, 0), None);
        assert_eq!(fb.pixels().filter(|(_, _, c)| *c != Rgb888::BLACK).count(), 1);
        assert_eq!(fb.size(), Size::new(3, 2));
    }
}
