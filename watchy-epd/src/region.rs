use embedded_graphics::{
    prelude::{Point, Size},
    primitives::Rectangle,
};

use crate::Error;

/// A rectangle of row-major grayscale samples, handed to the renderer for a single flush.
///
/// The region only borrows its samples: the renderer copies what it needs and never keeps the
/// slice beyond the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion<'a> {
    area: Rectangle,
    samples: &'a [u8],
}

impl<'a> PixelRegion<'a> {
    /// Creates a region covering `area`, with one sample per pixel (0 = black, 255 = white).
    pub fn new(area: Rectangle, samples: &'a [u8]) -> Self {
        Self { area, samples }
    }

    /// The panel coordinates covered by this region.
    pub fn area(&self) -> Rectangle {
        self.area
    }

    pub fn samples(&self) -> &'a [u8] {
        self.samples
    }

    /// True if the region has zero width or height.
    pub fn is_empty(&self) -> bool {
        self.area.size.width == 0 || self.area.size.height == 0
    }

    /// The number of samples the area requires.
    pub fn expected_len(&self) -> usize {
        self.area.size.width as usize * self.area.size.height as usize
    }

    /// Checks that the samples cover exactly the area, and that the area lies on a panel of the
    /// given size.
    pub fn validate(&self, panel: Size) -> Result<(), Error> {
        let expected = self.expected_len();
        if self.samples.len() != expected {
            return Err(Error::RegionMismatch {
                expected,
                actual: self.samples.len(),
            });
        }
        if self.is_empty() {
            return Ok(());
        }
        let panel_area = Rectangle::new(Point::zero(), panel);
        if panel_area.intersection(&self.area) != self.area {
            return Err(Error::OutOfBounds);
        }
        Ok(())
    }

    /// Returns the row of samples at `y`, relative to the top of the region.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let width = self.area.size.width as usize;
        let start = y as usize * width;
        &self.samples[start..start + width]
    }
}
