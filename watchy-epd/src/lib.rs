//! This crate turns rendered grayscale rectangles into partial refreshes of the Watchy's 1.54"
//! e-paper display, skipping refreshes that would not change anything on screen.
//!
//! It is built on top of `embedded-hal-async` and `embedded-graphics`.
//!
//! ## Pipeline
//!
//! A UI layer draws into a grayscale [canvas::Canvas] (or any other source of samples) and hands
//! the dirty rectangle to a [renderer::FrameDiffRenderer] as a [region::PixelRegion]. The
//! renderer binarises it, either by dithering or by thresholding and diffing against a
//! [shadow::ShadowBuffer] of everything it has drawn so far, and then draws the rectangle on a
//! [Panel] with a single partial window. The panel is always told when the flush is complete,
//! whether or not anything was drawn.
//!
//! ## Panels
//!
//! - [gdeh0154d67]: the GDEH0154D67 (SSD1681) panel fitted to the Watchy, driven through the
//!   [hw] traits. You need to implement these for your chosen peripherals.
//! - [sim]: an in-memory panel for desktop emulation and tests.
//!
//! Additionally, [battery] provides the battery voltage monitor used by the [face::WatchFace].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{Point, Size},
    primitives::Rectangle,
};

pub mod battery;
pub mod buffer;
pub mod canvas;
pub mod config;
pub mod dither;
pub mod face;
pub mod gdeh0154d67;
pub mod gray;
pub mod hw;
pub mod region;
pub mod renderer;
pub mod shadow;
pub mod sim;

mod error;
mod log;
#[cfg(test)]
mod mock;

pub use error::Error;

/// The panel side of a flush: a partial window that is drawn pixel by pixel, then refreshed.
///
/// Drivers may split the refresh into several pages. The renderer redraws the whole window for
/// each page until [Panel::end_page] returns `false`.
#[allow(async_fn_in_trait)]
pub trait Panel {
    type Error;

    /// The current panel resolution. This may change between flushes on emulated panels.
    fn size(&self) -> Size;

    /// Starts a partial update covering `window`.
    fn begin_partial_window(&mut self, window: Rectangle);

    /// Draws a single pixel within the current window. `BinaryColor::Off` is black.
    fn draw_pixel(&mut self, point: Point, color: BinaryColor);

    /// Finishes the current page, refreshing the panel if this was the last one.
    ///
    /// Returns whether another page is needed.
    async fn end_page(&mut self) -> Result<bool, Self::Error>;

    /// Called exactly once at the end of every flush, whether or not anything was drawn.
    fn flush_complete(&mut self);
}
