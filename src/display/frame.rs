//! 128x64 monochrome frame in controller page layout.

#![allow(missing_docs)]

use std::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Point, Size};

pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 64;
pub const PAGES: usize = HEIGHT / 8;

/// One byte per 8-pixel column slice; byte `page * WIDTH + x`, bit `y % 8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    buffer: [u8; WIDTH * PAGES],
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; WIDTH * PAGES],
        }
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.buffer.iter().all(|b| *b == 0)
    }

    /// Raw bytes of one 8-row page, as sent to the controller.
    #[must_use]
    pub fn page(&self, page: usize) -> &[u8] {
        let start = page.min(PAGES - 1) * WIDTH;
        &self.buffer[start..start + WIDTH]
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= WIDTH || y >= HEIGHT {
            return false;
        }
        self.buffer[(y / 8) * WIDTH + x] & (1 << (y % 8)) != 0
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }
        let idx = (y / 8) * WIDTH + x;
        let mask = 1 << (y % 8);
        if on {
            self.buffer[idx] |= mask;
        } else {
            self.buffer[idx] &= !mask;
        }
    }

    /// Number of lit pixels inside a rectangle (clipped to the frame).
    #[must_use]
    pub fn lit_in(&self, x: usize, y: usize, w: usize, h: usize) -> usize {
        (y..(y + h).min(HEIGHT))
            .flat_map(|row| (x..(x + w).min(WIDTH)).map(move |col| (col, row)))
            .filter(|(col, row)| self.pixel(*col, *row))
            .count()
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) {
                self.set_pixel(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn pixels_land_in_page_layout() {
        let mut frame = Frame::new();
        frame.set_pixel(3, 9, true);
        assert!(frame.pixel(3, 9));
        assert_eq!(frame.page(1)[3], 0b0000_0010);
        frame.set_pixel(3, 9, false);
        assert!(frame.is_blank());
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut frame = Frame::new();
        frame.set_pixel(WIDTH, 0, true);
        frame.set_pixel(0, HEIGHT, true);
        assert!(frame.is_blank());
        assert!(!frame.pixel(500, 500));
    }

    #[test]
    fn draw_target_clips_negative_points() {
        let mut frame = Frame::new();
        Rectangle::new(Point::new(-4, -4), Size::new(8, 8))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.lit_in(0, 0, WIDTH, HEIGHT), 16);
    }

    #[test]
    fn size_is_128_by_64() {
        assert_eq!(Frame::new().size(), Size::new(128, 64));
    }
}
