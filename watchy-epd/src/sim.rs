//! An in-memory [Panel] for desktop emulation and tests.

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{Point, Size},
    primitives::Rectangle,
};
use thiserror::Error as ThisError;

use crate::{buffer::BinaryBuffer, log::trace, Error, Panel};

const WHITE_ARGB: u32 = 0x00FF_FFFF;
const BLACK_ARGB: u32 = 0x0000_0000;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum SimError {
    #[error("simulated refresh failure")]
    RefreshFailed,
}

/// Counters for everything the simulated panel has been asked to do.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimStats {
    /// Partial windows started.
    pub windows: u32,
    /// Pixels drawn, counting every page.
    pub pixels: u32,
    /// Pages ended, including failed ones.
    pub pages: u32,
    /// Refreshes that completed.
    pub refreshes: u32,
    /// Calls to [Panel::flush_complete].
    pub completions: u32,
}

/// A panel that keeps its frame in memory. Pixels show up in the frame as soon as they are drawn.
pub struct SimPanel {
    frame: BinaryBuffer,
    pages_per_window: u32,
    page: u32,
    window: Option<Rectangle>,
    fail_next: bool,
    stats: SimStats,
}

impl SimPanel {
    /// Creates a white panel of the given size.
    pub fn new(size: Size) -> Result<Self, Error> {
        Ok(Self {
            frame: BinaryBuffer::new(size, BinaryColor::On)?,
            pages_per_window: 1,
            page: 0,
            window: None,
            fail_next: false,
            stats: SimStats::default(),
        })
    }

    /// Makes every window take `pages` pages to draw, like a driver with a small page buffer.
    pub fn with_pages(self, pages: u32) -> Self {
        Self {
            pages_per_window: pages.max(1),
            ..self
        }
    }

    /// Changes the resolution, e.g. when the emulator window is resized. The frame is cleared
    /// to white.
    pub fn set_size(&mut self, size: Size) -> Result<(), Error> {
        self.frame.resize(size, BinaryColor::On)
    }

    /// Makes the next [Panel::end_page] fail.
    pub fn fail_next_refresh(&mut self) {
        self.fail_next = true;
    }

    pub fn frame(&self) -> &BinaryBuffer {
        &self.frame
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// The most recent partial window.
    pub fn last_window(&self) -> Option<Rectangle> {
        self.window
    }

    /// Renders the frame into `out` as `0RGB` pixels, row by row. Extra output pixels are left
    /// untouched.
    pub fn to_argb(&self, out: &mut [u32]) {
        let size = self.frame.size();
        let points = (0..size.height as i32)
            .flat_map(|y| (0..size.width as i32).map(move |x| Point::new(x, y)));
        for (pixel, point) in out.iter_mut().zip(points) {
            *pixel = match self.frame.pixel(point) {
                Some(BinaryColor::On) => WHITE_ARGB,
                _ => BLACK_ARGB,
            };
        }
    }
}

impl Panel for SimPanel {
    type Error = SimError;

    fn size(&self) -> Size {
        self.frame.size()
    }

    fn begin_partial_window(&mut self, window: Rectangle) {
        trace!("Sim window {:?}", window);
        self.window = Some(window);
        self.page = 0;
        self.stats.windows += 1;
    }

    fn draw_pixel(&mut self, point: Point, color: BinaryColor) {
        self.stats.pixels += 1;
        self.frame.set_pixel(point, color);
    }

    async fn end_page(&mut self) -> Result<bool, SimError> {
        self.stats.pages += 1;
        if self.fail_next {
            self.fail_next = false;
            return Err(SimError::RefreshFailed);
        }

        self.page = self.page.saturating_add(1);
        if self.page < self.pages_per_window {
            return Ok(true);
        }
        self.stats.refreshes += 1;
        Ok(false)
    }

    fn flush_complete(&mut self) {
        self.stats.completions += 1;
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;

    #[test]
    fn test_new_panel_is_white() {
        let panel = SimPanel::new(Size::new(4, 2)).unwrap();
        assert_eq!(panel.size(), Size::new(4, 2));
        let mut argb = [0; 8];
        panel.to_argb(&mut argb);
        assert_eq!(argb, [WHITE_ARGB; 8]);
        assert_eq!(panel.stats(), SimStats::default());
    }

    #[test]
    fn test_draw_and_refresh() {
        let mut panel = SimPanel::new(Size::new(4, 2)).unwrap();
        panel.begin_partial_window(Rectangle::new(Point::new(1, 1), Size::new(1, 1)));
        panel.draw_pixel(Point::new(1, 1), BinaryColor::Off);
        assert_eq!(block_on(panel.end_page()), Ok(false));
        panel.flush_complete();

        let mut argb = [0; 8];
        panel.to_argb(&mut argb);
        assert_eq!(argb[5], BLACK_ARGB);
        assert_eq!(argb.iter().filter(|&&p| p == BLACK_ARGB).count(), 1);
        assert_eq!(
            panel.stats(),
            SimStats {
                windows: 1,
                pixels: 1,
                pages: 1,
                refreshes: 1,
                completions: 1,
            }
        );
    }

    #[test]
    fn test_pages() {
        let mut panel = SimPanel::new(Size::new(4, 2)).unwrap().with_pages(2);
        panel.begin_partial_window(Rectangle::new(Point::zero(), Size::new(1, 1)));
        assert_eq!(block_on(panel.end_page()), Ok(true));
        assert_eq!(block_on(panel.end_page()), Ok(false));
        assert_eq!(panel.stats().refreshes, 1);

        // Paging restarts with each window.
        panel.begin_partial_window(Rectangle::new(Point::zero(), Size::new(1, 1)));
        assert_eq!(block_on(panel.end_page()), Ok(true));
    }

    #[test]
    fn test_injected_failure_happens_once() {
        let mut panel = SimPanel::new(Size::new(4, 2)).unwrap();
        panel.fail_next_refresh();
        assert_eq!(block_on(panel.end_page()), Err(SimError::RefreshFailed));
        assert_eq!(block_on(panel.end_page()), Ok(false));
        assert_eq!(panel.stats().refreshes, 1);
    }

    #[test]
    fn test_resize_clears() {
        let mut panel = SimPanel::new(Size::new(4, 2)).unwrap();
        panel.draw_pixel(Point::zero(), BinaryColor::Off);
        panel.set_size(Size::new(3, 3)).unwrap();
        assert_eq!(panel.size(), Size::new(3, 3));
        let mut argb = [0; 9];
        panel.to_argb(&mut argb);
        assert_eq!(argb, [WHITE_ARGB; 9]);
    }
}
