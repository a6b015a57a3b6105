//! A full-screen grayscale drawing surface that remembers which area has been drawn since the
//! last flush.

use alloc::vec::Vec;
use core::{convert::Infallible, marker::PhantomData};

use embedded_graphics::{
    pixelcolor::PixelColor,
    prelude::{Dimensions, DrawTarget, Point, Size},
    primitives::Rectangle,
    Pixel,
};

use crate::{gray::Brightness, region::PixelRegion, Error};

/// Stores one brightness sample per pixel for any colour that implements [Brightness].
///
/// ```
/// use embedded_graphics::{
///     pixelcolor::Gray8,
///     prelude::*,
///     primitives::{PrimitiveStyle, Rectangle},
/// };
/// use watchy_epd::canvas::Canvas;
///
/// let mut canvas = Canvas::<Gray8>::new(Size::new(200, 200), Gray8::WHITE).unwrap();
/// // The initial background covers the whole canvas.
/// assert_eq!(canvas.take_dirty().unwrap().area().size, Size::new(200, 200));
///
/// Rectangle::new(Point::new(10, 10), Size::new(4, 2))
///     .into_styled(PrimitiveStyle::with_fill(Gray8::BLACK))
///     .draw(&mut canvas)
///     .unwrap();
///
/// let region = canvas.take_dirty().unwrap();
/// assert_eq!(region.area(), Rectangle::new(Point::new(10, 10), Size::new(4, 2)));
/// assert!(region.samples().iter().all(|&s| s == 0));
/// assert!(canvas.take_dirty().is_none());
/// ```
pub struct Canvas<C> {
    size: Size,
    samples: Vec<u8>,
    staging: Vec<u8>,
    dirty: Option<Rectangle>,
    _color: PhantomData<C>,
}

impl<C> Canvas<C>
where
    C: PixelColor + Brightness,
{
    /// Creates a canvas filled with `background`. The whole canvas starts out dirty.
    pub fn new(size: Size, background: C) -> Result<Self, Error> {
        let mut canvas = Self {
            size: Size::zero(),
            samples: Vec::new(),
            staging: Vec::new(),
            dirty: None,
            _color: PhantomData,
        };
        canvas.resize(size, background)?;
        Ok(canvas)
    }

    /// Reallocates the canvas for a new size and fills it with `background`.
    ///
    /// Both buffers are sized up front, so that [Canvas::take_dirty] never allocates.
    pub fn resize(&mut self, size: Size, background: C) -> Result<(), Error> {
        self.samples = Vec::new();
        self.staging = Vec::new();
        self.size = Size::zero();
        self.dirty = None;

        let length = size.width as usize * size.height as usize;
        for buffer in [&mut self.samples, &mut self.staging] {
            buffer
                .try_reserve_exact(length)
                .map_err(|_| Error::AllocationFailed { bytes: length })?;
        }
        self.samples.resize(length, background.brightness());
        self.size = size;
        self.mark_dirty(self.bounding_box());
        Ok(())
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// The brightness sample at `point`.
    pub fn sample(&self, point: Point) -> Option<u8> {
        self.index(point).map(|i| self.samples[i])
    }

    /// The area drawn since the last call to [Canvas::take_dirty], if any.
    pub fn dirty(&self) -> Option<Rectangle> {
        self.dirty
    }

    /// Copies the dirty area into the staging buffer and returns it, ready to flush.
    ///
    /// The canvas is clean afterwards.
    pub fn take_dirty(&mut self) -> Option<PixelRegion<'_>> {
        let area = self.dirty.take()?;
        let width = self.size.width as usize;
        let x = area.top_left.x as usize;

        self.staging.clear();
        for y in area.rows() {
            let start = y as usize * width + x;
            self.staging
                .extend_from_slice(&self.samples[start..start + area.size.width as usize]);
        }
        Some(PixelRegion::new(area, &self.staging))
    }

    fn mark_dirty(&mut self, area: Rectangle) {
        if area.is_zero_sized() {
            return;
        }
        self.dirty = Some(match self.dirty {
            None => area,
            Some(dirty) => union(dirty, area),
        });
    }

    fn index(&self, point: Point) -> Option<usize> {
        if point.x < 0
            || point.y < 0
            || point.x >= self.size.width as i32
            || point.y >= self.size.height as i32
        {
            return None;
        }
        Some(point.y as usize * self.size.width as usize + point.x as usize)
    }
}

/// The smallest rectangle containing both (non-empty) rectangles.
fn union(a: Rectangle, b: Rectangle) -> Rectangle {
    let a_end = a.top_left + a.size;
    let b_end = b.top_left + b.size;
    let top_left = a.top_left.component_min(b.top_left);
    let end = a_end.component_max(b_end);
    Rectangle::new(
        top_left,
        Size::new((end.x - top_left.x) as u32, (end.y - top_left.y) as u32),
    )
}

impl<C> Dimensions for Canvas<C> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), self.size)
    }
}

impl<C> DrawTarget for Canvas<C>
where
    C: PixelColor + Brightness,
{
    type Color = C;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels.into_iter() {
            if let Some(i) = self.index(point) {
                self.samples[i] = color.brightness();
                self.mark_dirty(Rectangle::new(point, Size::new(1, 1)));
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = self.bounding_box().intersection(area);
        if area.is_zero_sized() {
            return Ok(());
        }

        let sample = color.brightness();
        let width = self.size.width as usize;
        let x = area.top_left.x as usize;
        for y in area.rows() {
            let start = y as usize * width + x;
            self.samples[start..start + area.size.width as usize].fill(sample);
        }
        self.mark_dirty(area);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use embedded_graphics::pixelcolor::{BinaryColor, Gray8, GrayColor};

    use super::*;

    fn clean_canvas() -> Canvas<Gray8> {
        let mut canvas = Canvas::new(Size::new(20, 10), Gray8::WHITE).unwrap();
        assert!(canvas.take_dirty().is_some());
        canvas
    }

    #[test]
    fn test_new_canvas_is_dirty_and_filled() {
        let mut canvas = Canvas::new(Size::new(4, 3), BinaryColor::Off).unwrap();
        assert_eq!(canvas.dirty(), Some(Rectangle::new(Point::zero(), Size::new(4, 3))));

        let region = canvas.take_dirty().unwrap();
        assert_eq!(region.samples(), &[0; 12]);
        assert_eq!(canvas.dirty(), None);
    }

    #[test]
    fn test_pixels_grow_the_dirty_area() {
        let mut canvas = clean_canvas();
        canvas
            .draw_iter([
                Pixel(Point::new(3, 2), Gray8::new(10)),
                Pixel(Point::new(6, 4), Gray8::new(20)),
                Pixel(Point::new(50, 50), Gray8::new(30)),
            ])
            .unwrap();

        let region = canvas.take_dirty().unwrap();
        assert_eq!(region.area(), Rectangle::new(Point::new(3, 2), Size::new(4, 3)));
        assert_eq!(region.row(0), &[10, 255, 255, 255]);
        assert_eq!(region.row(2), &[255, 255, 255, 20]);
    }

    #[test]
    fn test_fill_solid_is_clipped() {
        let mut canvas = clean_canvas();
        canvas
            .fill_solid(&Rectangle::new(Point::new(18, 8), Size::new(5, 5)), Gray8::new(64))
            .unwrap();

        assert_eq!(
            canvas.dirty(),
            Some(Rectangle::new(Point::new(18, 8), Size::new(2, 2)))
        );
        assert_eq!(canvas.sample(Point::new(19, 9)), Some(64));
        assert_eq!(canvas.sample(Point::new(17, 9)), Some(255));
    }

    #[test]
    fn test_off_canvas_drawing_stays_clean() {
        let mut canvas = clean_canvas();
        canvas
            .fill_solid(&Rectangle::new(Point::new(-5, -5), Size::new(3, 3)), Gray8::BLACK)
            .unwrap();
        canvas
            .draw_iter([Pixel(Point::new(20, 0), Gray8::BLACK)])
            .unwrap();
        assert!(canvas.take_dirty().is_none());
    }

    #[test]
    fn test_resize_marks_everything_dirty() {
        let mut canvas = clean_canvas();
        canvas.resize(Size::new(8, 8), Gray8::BLACK).unwrap();
        assert_eq!(canvas.size(), Size::new(8, 8));
        assert_eq!(canvas.dirty(), Some(Rectangle::new(Point::zero(), Size::new(8, 8))));
        assert_eq!(canvas.sample(Point::new(7, 7)), Some(0));
    }

    #[test]
    fn test_union() {
        let a = Rectangle::new(Point::new(0, 5), Size::new(2, 2));
        let b = Rectangle::new(Point::new(4, 1), Size::new(1, 1));
        assert_eq!(union(a, b), Rectangle::new(Point::new(0, 1), Size::new(5, 6)));
    }
}
