use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{Dimensions, DrawTarget, Point, Size},
    primitives::Rectangle,
    Pixel,
};

use crate::Error;

/// Computes the number of bytes needed to pack a frame of the given size, rounding each row up to
/// a whole byte.
pub const fn binary_buffer_length(size: Size) -> usize {
    bytes_per_row(size.width) * size.height as usize
}

const fn bytes_per_row(width: u32) -> usize {
    (width as usize + 7) / 8
}

/// Splits a 16-bit value into its low and high bytes.
pub(crate) fn split_low_and_high(value: u16) -> (u8, u8) {
    let low = (value & 0xFF) as u8;
    let high = ((value >> 8) & 0xFF) as u8;
    (low, high)
}

/// Widens a window horizontally so that it starts and ends on byte boundaries.
///
/// SSD16xx controllers address RAM in whole bytes along the x-axis, so any partial window has to
/// be expanded before it can be written.
pub fn byte_aligned(window: Rectangle) -> Rectangle {
    let x_start = window.top_left.x & !7;
    let x_end = (window.top_left.x + window.size.width as i32 + 7) & !7;
    Rectangle::new(
        Point::new(x_start, window.top_left.y),
        Size::new((x_end - x_start) as u32, window.size.height),
    )
}

/// A compact, heap-allocated buffer for binary coloured display data.
///
/// Each byte holds 8 pixels, most significant bit first. A set bit is `BinaryColor::On` (white).
/// The storage lives on the heap so that the frame can follow the panel's resolution.
pub struct BinaryBuffer {
    size: Size,
    bytes_per_row: usize,
    data: Vec<u8>,
}

impl BinaryBuffer {
    /// Creates a buffer of the given size with every pixel set to `fill`.
    ///
    /// Fails instead of panicking if the storage can't be allocated.
    pub fn new(size: Size, fill: BinaryColor) -> Result<Self, Error> {
        let mut buffer = Self {
            size: Size::zero(),
            bytes_per_row: 0,
            data: Vec::new(),
        };
        buffer.resize(size, fill)?;
        Ok(buffer)
    }

    /// Reallocates the buffer for a new size, filling every pixel with `fill`.
    ///
    /// The previous storage is released before the new storage is requested, so a failed resize
    /// leaves an empty buffer rather than a partially resized one.
    pub fn resize(&mut self, size: Size, fill: BinaryColor) -> Result<(), Error> {
        self.data = Vec::new();
        self.size = Size::zero();
        self.bytes_per_row = 0;

        let length = binary_buffer_length(size);
        self.data
            .try_reserve_exact(length)
            .map_err(|_| Error::AllocationFailed { bytes: length })?;
        self.data.resize(length, fill_byte(fill));
        self.size = size;
        self.bytes_per_row = bytes_per_row(size.width);
        Ok(())
    }

    /// The size of the frame in pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Access the packed buffer data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the colour at `point`, or `None` if it lies outside the buffer.
    pub fn pixel(&self, point: Point) -> Option<BinaryColor> {
        let (byte_index, mask) = self.locate(point)?;
        Some(BinaryColor::from(self.data[byte_index] & mask != 0))
    }

    /// Sets a single pixel. Out-of-bounds points are ignored.
    pub fn set_pixel(&mut self, point: Point, color: BinaryColor) {
        if let Some((byte_index, mask)) = self.locate(point) {
            if color.is_on() {
                self.data[byte_index] |= mask;
            } else {
                self.data[byte_index] &= !mask;
            }
        }
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: BinaryColor) {
        self.data.fill(fill_byte(color));
    }

    /// Copies the packed rows of a byte-aligned window into `out`, replacing its contents.
    ///
    /// The window is clipped to the buffer. See [byte_aligned].
    pub fn window_bytes(&self, window: Rectangle, out: &mut Vec<u8>) -> Result<(), Error> {
        crate::log::debug_assert!(
            window.top_left.x % 8 == 0 && window.size.width % 8 == 0,
            "window must be byte aligned"
        );
        out.clear();
        let window = self.bounding_box().intersection(&window);
        if window.is_zero_sized() {
            return Ok(());
        }

        let first_byte = window.top_left.x as usize / 8;
        let row_bytes = bytes_per_row(window.size.width);
        let length = row_bytes * window.size.height as usize;
        out.try_reserve_exact(length)
            .map_err(|_| Error::AllocationFailed { bytes: length })?;
        for y in window.rows() {
            let start = y as usize * self.bytes_per_row + first_byte;
            out.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Ok(())
    }

    fn locate(&self, point: Point) -> Option<(usize, u8)> {
        if point.x < 0
            || point.x >= self.size.width as i32
            || point.y < 0
            || point.y >= self.size.height as i32
        {
            return None;
        }
        let byte_index = (point.x as usize) / 8 + (point.y as usize * self.bytes_per_row);
        let bit_index = (point.x as usize) % 8;
        Some((byte_index, 0x80 >> bit_index))
    }
}

fn fill_byte(color: BinaryColor) -> u8 {
    if color.is_on() {
        0xFF
    } else {
        0x00
    }
}

impl Dimensions for BinaryBuffer {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), self.size)
    }
}

impl DrawTarget for BinaryBuffer {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels.into_iter() {
            self.set_pixel(point, color);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = self.bounding_box().intersection(area);
        if area.is_zero_sized() {
            return Ok(()); // Nothing to fill
        }

        let x_start = area.top_left.x;
        let x_end = x_start + area.size.width as i32;
        let byte = fill_byte(color);
        for y in area.rows() {
            let row_start = y as usize * self.bytes_per_row;
            let mut x = x_start;
            while x < x_end {
                if x % 8 == 0 && x + 8 <= x_end {
                    // Whole byte is covered.
                    self.data[row_start + x as usize / 8] = byte;
                    x += 8;
                } else {
                    self.set_pixel(Point::new(x, y), color);
                    x += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_buffer(size: Size) -> BinaryBuffer {
        BinaryBuffer::new(size, BinaryColor::Off).unwrap()
    }

    #[test]
    fn test_buffer_length_rounds_rows_up() {
        assert_eq!(binary_buffer_length(Size::new(200, 200)), 5000);
        assert_eq!(binary_buffer_length(Size::new(9, 2)), 4);
        assert_eq!(binary_buffer_length(Size::new(0, 2)), 0);
    }

    #[test]
    fn test_new_fills_with_color() {
        let buffer = BinaryBuffer::new(Size::new(16, 2), BinaryColor::On).unwrap();
        assert_eq!(buffer.data(), &[0xFF; 4]);
        assert_eq!(buffer.pixel(Point::new(15, 1)), Some(BinaryColor::On));
        assert_eq!(buffer.pixel(Point::new(16, 1)), None);
    }

    #[test]
    fn test_draw_iter_sets_msb_first() {
        let mut buffer = new_buffer(Size::new(16, 4));
        buffer
            .draw_iter([
                Pixel(Point::new(0, 0), BinaryColor::On),
                Pixel(Point::new(10, 2), BinaryColor::On),
                Pixel(Point::new(15, 3), BinaryColor::On),
            ])
            .unwrap();
        assert_eq!(buffer.data()[0], 0b1000_0000);
        assert_eq!(buffer.data()[5], 0b0010_0000);
        assert_eq!(buffer.data()[7], 0b0000_0001);

        buffer
            .draw_iter([Pixel(Point::new(0, 0), BinaryColor::Off)])
            .unwrap();
        assert_eq!(buffer.data()[0], 0);
    }

    #[test]
    fn test_draw_iter_ignores_out_of_bounds() {
        let mut buffer = new_buffer(Size::new(16, 4));
        buffer
            .draw_iter([
                Pixel(Point::new(-1, 0), BinaryColor::On),
                Pixel(Point::new(0, -1), BinaryColor::On),
                Pixel(Point::new(16, 0), BinaryColor::On),
                Pixel(Point::new(0, 4), BinaryColor::On),
            ])
            .unwrap();
        assert!(buffer.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_solid_clips_and_packs() {
        let mut buffer = new_buffer(Size::new(24, 4));
        buffer
            .fill_solid(&Rectangle::new(Point::new(4, 1), Size::new(14, 2)), BinaryColor::On)
            .unwrap();
        buffer
            .fill_solid(&Rectangle::new(Point::new(20, 3), Size::new(10, 10)), BinaryColor::On)
            .unwrap();

        #[rustfmt::skip]
        let expected: [u8; 12] = [
            0b0000_0000, 0b0000_0000, 0b0000_0000,
            0b0000_1111, 0b1111_1111, 0b1100_0000,
            0b0000_1111, 0b1111_1111, 0b1100_0000,
            0b0000_0000, 0b0000_0000, 0b0000_1111,
        ];
        assert_eq!(buffer.data(), &expected);
    }

    #[test]
    fn test_resize_refills() {
        let mut buffer = new_buffer(Size::new(8, 1));
        buffer.set_pixel(Point::new(3, 0), BinaryColor::On);
        buffer.resize(Size::new(16, 2), BinaryColor::On).unwrap();
        assert_eq!(buffer.size(), Size::new(16, 2));
        assert_eq!(buffer.data(), &[0xFF; 4]);

        buffer.fill(BinaryColor::Off);
        assert_eq!(buffer.data(), &[0x00; 4]);
    }

    #[test]
    fn test_byte_aligned_window() {
        let window = byte_aligned(Rectangle::new(Point::new(10, 3), Size::new(2, 2)));
        assert_eq!(window, Rectangle::new(Point::new(8, 3), Size::new(8, 2)));

        let window = byte_aligned(Rectangle::new(Point::new(7, 0), Size::new(2, 1)));
        assert_eq!(window, Rectangle::new(Point::new(0, 0), Size::new(16, 1)));

        let window = byte_aligned(Rectangle::new(Point::new(16, 0), Size::new(8, 1)));
        assert_eq!(window, Rectangle::new(Point::new(16, 0), Size::new(8, 1)));
    }

    #[test]
    fn test_window_bytes() {
        let mut buffer = new_buffer(Size::new(24, 3));
        buffer
            .fill_solid(&Rectangle::new(Point::new(8, 1), Size::new(8, 2)), BinaryColor::On)
            .unwrap();
        buffer.set_pixel(Point::new(17, 2), BinaryColor::On);

        let mut out = Vec::new();
        buffer
            .window_bytes(Rectangle::new(Point::new(8, 1), Size::new(16, 2)), &mut out)
            .unwrap();
        assert_eq!(out, [0xFF, 0x00, 0xFF, 0b0100_0000]);
    }

    #[test]
    fn test_split_low_and_high() {
        assert_eq!(split_low_and_high(0x01C7), (0xC7, 0x01));
        assert_eq!(split_low_and_high(199), (199, 0));
    }
}
