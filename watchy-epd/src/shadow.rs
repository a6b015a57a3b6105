//! Tracks the last binarised state of every panel pixel, so that flushes which don't change
//! anything can skip the (slow) e-paper refresh.

use alloc::vec::Vec;

use embedded_graphics::{
    prelude::{Point, Size},
    primitives::Rectangle,
};

use crate::{log::debug, Error};

/// Stored for pixels whose panel state is unknown. Binarised samples are only ever black or
/// white, so this never compares equal.
const UNKNOWN: u8 = 0x80;

/// A summary of the pixels that changed during one diff.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    /// Whether the panel needs to be redrawn for this rectangle.
    ///
    /// This is also true for the first diff after the shadow buffer was (re)allocated or
    /// invalidated, even if no pixel differed from the blank fill.
    pub has_changes: bool,
    /// The number of pixels whose value differed from the shadow buffer.
    pub changed: usize,
    /// The smallest rectangle containing every changed pixel.
    pub bounds: Option<Rectangle>,
}

impl ChangeSet {
    fn record(&mut self, point: Point) {
        self.has_changes = true;
        self.changed += 1;
        self.bounds = Some(match self.bounds {
            None => Rectangle::new(point, Size::new(1, 1)),
            Some(bounds) => {
                let bottom_right = bounds.bottom_right().unwrap_or(bounds.top_left);
                Rectangle::with_corners(
                    bounds.top_left.component_min(point),
                    bottom_right.component_max(point),
                )
            }
        });
    }
}

/// One byte per panel pixel, holding the value last sent to the panel.
pub struct ShadowBuffer {
    size: Size,
    blank: u8,
    data: Option<Vec<u8>>,
    /// Forces `has_changes` on the first diff after (re)allocation or [ShadowBuffer::invalidate].
    fresh: bool,
}

impl ShadowBuffer {
    /// Creates an unallocated shadow buffer. Storage is allocated by [ShadowBuffer::ensure_size].
    pub const fn new(blank: u8) -> Self {
        Self {
            size: Size::zero(),
            blank,
            data: None,
            fresh: true,
        }
    }

    /// The size the buffer is currently allocated for, or zero if it isn't allocated.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// Makes sure the buffer matches the panel size, reallocating and blanking it if not.
    ///
    /// Returns whether a reallocation happened. The old storage is freed before the new storage
    /// is requested; if that request fails the buffer is left unallocated.
    pub fn ensure_size(&mut self, size: Size) -> Result<bool, Error> {
        if self.data.is_some() && self.size == size {
            return Ok(false);
        }

        debug!("Allocating shadow buffer for {}x{}", size.width, size.height);
        self.data = None;
        self.size = Size::zero();
        self.fresh = true;

        let length = size.width as usize * size.height as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(length)
            .map_err(|_| Error::AllocationFailed { bytes: length })?;
        data.resize(length, self.blank);

        self.data = Some(data);
        self.size = size;
        Ok(true)
    }

    /// Forces the next diff to report changes, e.g. after the panel was fully refreshed
    /// behind the renderer's back.
    pub fn invalidate(&mut self) {
        self.fresh = true;
    }

    /// Marks every pixel of `area` as unknown, so that the next diff covering any of them reports
    /// them as changed whatever their value.
    ///
    /// The area is clipped to the buffer. Does nothing if the buffer isn't allocated.
    pub fn forget(&mut self, area: Rectangle) {
        let stride = self.size.width as usize;
        let area = Rectangle::new(Point::zero(), self.size).intersection(&area);
        let Some(data) = self.data.as_mut() else {
            return;
        };
        if area.is_zero_sized() {
            return;
        }

        let width = area.size.width as usize;
        for y in area.rows() {
            let start = y as usize * stride + area.top_left.x as usize;
            data[start..start + width].fill(UNKNOWN);
        }
    }

    /// Returns the stored value at `point`.
    pub fn get(&self, point: Point) -> Option<u8> {
        let data = self.data.as_ref()?;
        if point.x < 0
            || point.y < 0
            || point.x >= self.size.width as i32
            || point.y >= self.size.height as i32
        {
            return None;
        }
        Some(data[point.y as usize * self.size.width as usize + point.x as usize])
    }

    /// Compares a binarised rectangle with the stored state and stores it.
    pub fn diff_and_store(&mut self, area: Rectangle, binarized: &[u8]) -> Result<ChangeSet, Error> {
        self.diff_and_store_with(area, binarized, |_| {})
    }

    /// Like [ShadowBuffer::diff_and_store], but also calls `visit` with the panel coordinates of
    /// every changed pixel.
    pub fn diff_and_store_with<F>(
        &mut self,
        area: Rectangle,
        binarized: &[u8],
        mut visit: F,
    ) -> Result<ChangeSet, Error>
    where
        F: FnMut(Point),
    {
        let Some(data) = self.data.as_mut() else {
            return Err(Error::OutOfBounds);
        };

        let width = area.size.width as usize;
        let expected = width * area.size.height as usize;
        if binarized.len() != expected {
            return Err(Error::RegionMismatch {
                expected,
                actual: binarized.len(),
            });
        }
        if expected == 0 {
            return Ok(ChangeSet::default());
        }
        if Rectangle::new(Point::zero(), self.size).intersection(&area) != area {
            return Err(Error::OutOfBounds);
        }

        let stride = self.size.width as usize;
        let mut changes = ChangeSet::default();
        for (row, y) in area.rows().enumerate() {
            let start = y as usize * stride + area.top_left.x as usize;
            let cells = &mut data[start..start + width];
            let samples = &binarized[row * width..(row + 1) * width];
            for (column, (cell, &sample)) in cells.iter_mut().zip(samples).enumerate() {
                // Compare against the old value before overwriting it.
                if *cell != sample {
                    let point = Point::new(area.top_left.x + column as i32, y);
                    changes.record(point);
                    visit(point);
                    *cell = sample;
                }
            }
        }

        if self.fresh {
            changes.has_changes = true;
            self.fresh = false;
        }
        Ok(changes)
    }
}
