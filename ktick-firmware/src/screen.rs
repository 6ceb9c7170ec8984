//! Monochrome bitmap and drawing primitives for the status display.

use core::convert::Infallible;

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
};

use crate::device::DeviceError;

pub mod font;
pub mod ssd1306;

pub const COLUMNS: usize = 128;
pub const MAX_ROWS: usize = 64;
pub const BUFFER_SIZE: usize = COLUMNS * MAX_ROWS / 8;
/// Number of layer indicator cells along the top of the panel.
pub const MAX_LAYERS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelRows {
    R32,
    R64,
}

impl PanelRows {
    pub fn from_rows(rows: u32) -> Result<Self, DeviceError> {
        match rows {
            32 => Ok(PanelRows::R32),
            64 => Ok(PanelRows::R64),
            _ => Err(DeviceError::InvalidConfig),
        }
    }

    pub const fn rows(self) -> usize {
        match self {
            PanelRows::R32 => 32,
            PanelRows::R64 => 64,
        }
    }

    pub const fn pages(self) -> usize {
        self.rows() / 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrawMode {
    Add,
    Subtract,
    Invert,
}

impl DrawMode {
    /// Apply this mode to the bits of `mask` within `byte`.
    pub const fn combine(self, byte: u8, mask: u8) -> u8 {
        match self {
            DrawMode::Add => byte | mask,
            DrawMode::Subtract => byte & !mask,
            DrawMode::Invert => byte ^ mask,
        }
    }
}

/// A fixed-width glyph blob: `[width, height, glyphs...]`.
///
/// Glyphs cover printable ASCII starting at space. Each glyph is `width` columns of
/// `ceil(height / 8)` bytes, top byte first, least significant bit at the top.
#[derive(Clone, Copy)]
pub struct Font<'a> {
    data: &'a [u8],
}

impl<'a> Font<'a> {
    pub const FIRST_CHAR: u8 = b' ';
    pub const LAST_CHAR: u8 = b'~';

    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.first().copied().unwrap_or(0) as usize
    }

    pub fn height(&self) -> usize {
        self.data.get(1).copied().unwrap_or(0) as usize
    }

    /// Bytes per glyph column.
    pub fn pages(&self) -> usize {
        self.height().div_ceil(8)
    }

    pub fn glyph(&self, ch: char) -> Option<&'a [u8]> {
        let c = u8::try_from(ch).ok()?;
        if !(Self::FIRST_CHAR..=Self::LAST_CHAR).contains(&c) {
            return None;
        }
        let stride = self.width() * self.pages();
        let start = 2 + (c - Self::FIRST_CHAR) as usize * stride;
        self.data.get(start..start + stride)
    }
}

/// Panel contents in controller page order: `buf[page * COLUMNS + col]`, bit `row % 8`.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    rows: PanelRows,
    buf: [u8; BUFFER_SIZE],
    active_layers: u16,
}

impl Bitmap {
    pub const fn new(rows: PanelRows) -> Self {
        Self {
            rows,
            buf: [0; BUFFER_SIZE],
            active_layers: 0,
        }
    }

    pub fn rows(&self) -> PanelRows {
        self.rows
    }

    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.active_layers = 0;
    }

    /// The bytes sent to the panel.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.rows.pages() * COLUMNS]
    }

    pub fn pixel(&self, row: i32, col: i32) -> bool {
        match self.index(row, col) {
            Some((i, mask)) => self.buf[i] & mask != 0,
            None => false,
        }
    }

    /// Pixels outside the panel are ignored.
    pub fn set_pixel(&mut self, row: i32, col: i32, mode: DrawMode) {
        if let Some((i, mask)) = self.index(row, col) {
            self.buf[i] = mode.combine(self.buf[i], mask);
        }
    }

    pub fn draw_line(&mut self, row0: i32, col0: i32, row1: i32, col1: i32, mode: DrawMode) {
        let line = Line::new(Point::new(col0, row0), Point::new(col1, row1));
        let _ = line
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut Painter { bitmap: self, mode });
    }

    /// Corners may be given in any order; both are inclusive.
    pub fn draw_rect(
        &mut self,
        row0: i32,
        col0: i32,
        row1: i32,
        col1: i32,
        fill: bool,
        mode: DrawMode,
    ) {
        let rect = Rectangle::with_corners(Point::new(col0, row0), Point::new(col1, row1));
        let mut painter = Painter { bitmap: self, mode };
        if fill {
            let _ = painter.fill_solid(&rect, BinaryColor::On);
        } else {
            let style = PrimitiveStyleBuilder::new()
                .stroke_color(BinaryColor::On)
                .stroke_width(1)
                .stroke_alignment(StrokeAlignment::Inside)
                .build();
            let _ = rect.into_styled(style).draw(&mut painter);
        }
    }

    pub fn draw_char(&mut self, row: i32, col: i32, ch: char, font: &Font<'_>, mode: DrawMode) {
        let Some(glyph) = font.glyph(ch) else {
            return;
        };
        let (height, pages) = (font.height(), font.pages());
        for (i, bits) in glyph.iter().enumerate() {
            let (x, top) = (i / pages, (i % pages) * 8);
            for bit in 0..8.min(height - top) {
                if bits & (1 << bit) != 0 {
                    self.set_pixel(row + (top + bit) as i32, col + x as i32, mode);
                }
            }
        }
    }

    /// Draw `text` left to right from (`row`, `col`), advancing by the font width. Text running
    /// off the right edge is dropped. Returns the column after the last character.
    pub fn draw_text(
        &mut self,
        row: i32,
        col: i32,
        text: &str,
        font: &Font<'_>,
        mode: DrawMode,
    ) -> i32 {
        let width = font.width() as i32;
        let mut col = col;
        for ch in text.chars() {
            if col >= COLUMNS as i32 || width == 0 {
                break;
            }
            self.draw_char(row, col, ch, font, mode);
            col += width;
        }
        col
    }

    /// Light the indicator cell of every active layer and clear the rest.
    pub fn set_active_layers(&mut self, layers: &[bool]) {
        for (i, on) in layers.iter().take(MAX_LAYERS).enumerate() {
            let left = (i * 8) as i32;
            let mode = if *on {
                self.active_layers |= 1 << i;
                DrawMode::Add
            } else {
                self.active_layers &= !(1 << i);
                DrawMode::Subtract
            };
            self.draw_rect(1, left + 1, 7, left + 7, true, mode);
        }
    }

    pub fn active_layers(&self) -> u16 {
        self.active_layers
    }

    fn index(&self, row: i32, col: i32) -> Option<(usize, u8)> {
        if row < 0 || col < 0 || row as usize >= self.rows.rows() || col as usize >= COLUMNS {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        Some(((row / 8) * COLUMNS + col, 1 << (row % 8)))
    }
}

struct Painter<'b> {
    bitmap: &'b mut Bitmap,
    mode: DrawMode,
}

impl OriginDimensions for Painter<'_> {
    fn size(&self) -> Size {
        Size::new(COLUMNS as u32, self.bitmap.rows.rows() as u32)
    }
}

impl DrawTarget for Painter<'_> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, color) in pixels {
            if color.is_on() {
                self.bitmap.set_pixel(p.y, p.x, self.mode);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "screen_test.rs"]
mod test;
