/*
 *  display/drivers/terminal.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Colored bar graph drawn with terminal escape sequences
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

use std::io::{self, Stdout, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::display::color::ConsoleColor;
use crate::display::configuration::DisplayConfiguration;
use crate::display::traits::{DisplaySink, Frame};
use crate::error::Result;

const CELL: &str = "===";
/// a cell plus an equally wide gap
const COLUMN_STRIDE: usize = CELL.len() * 2;

impl From<ConsoleColor> for Color {
    fn from(c: ConsoleColor) -> Self {
        match c {
            ConsoleColor::Black => Color::Black,
            ConsoleColor::DarkRed => Color::DarkRed,
            ConsoleColor::Red => Color::Red,
            ConsoleColor::DarkYellow => Color::DarkYellow,
            ConsoleColor::Yellow => Color::Yellow,
            ConsoleColor::Green => Color::Green,
            ConsoleColor::DarkGreen => Color::DarkGreen,
            ConsoleColor::Cyan => Color::Cyan,
            ConsoleColor::DarkCyan => Color::DarkCyan,
            ConsoleColor::Blue => Color::Blue,
            ConsoleColor::DarkBlue => Color::DarkBlue,
            ConsoleColor::Magenta => Color::Magenta,
            ConsoleColor::DarkMagenta => Color::DarkMagenta,
            ConsoleColor::White => Color::White,
        }
    }
}

/// Column caption: plain Hz below 1000, whole kHz with a K above.
pub fn band_label(hz: u32) -> String {
    if hz >= 1000 { format!("{}K", hz / 1000) } else { hz.to_string() }
}

/// Draws frames as rows of `===` cells, one column per band
pub struct TerminalSink<W: Write + Send> {
    out: W,
}

impl TerminalSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }
}

fn pos(v: usize) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn present(&mut self, frame: &Frame, _config: &DisplayConfiguration) -> Result<()> {
        let rows = frame.rows();
        queue!(self.out, Hide)?;
        for x in 0..frame.cols() {
            let x_pos = pos(x * COLUMN_STRIDE);
            if let Some(level) = frame.levels.get(x) {
                queue!(
                    self.out,
                    MoveTo(x_pos, pos(rows + 1)),
                    SetForegroundColor(Color::White),
                    Print(band_label(level.band))
                )?;
            }
            for y in 0..rows {
                let color = ConsoleColor::from_pixel(frame.cell(x, y));
                queue!(
                    self.out,
                    MoveTo(x_pos, pos(rows - y)),
                    SetForegroundColor(color.into()),
                    Print(CELL)
                )?;
            }
        }
        queue!(self.out, ResetColor)?;
        self.out.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        queue!(self.out, ResetColor, Clear(ClearType::All), MoveTo(0, 0), Show)?;
        self.out.flush()?;
        Ok(())
    }
}
