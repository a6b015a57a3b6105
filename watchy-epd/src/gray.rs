//! Reduces panel colours to a single 0-255 brightness sample.
//!
//! The result only needs a consistent ordering for thresholding, so RGB colours use a cheap
//! integer luma rather than an exact grayscale conversion.

use embedded_graphics::pixelcolor::{
    BinaryColor, Gray2, Gray4, Gray8, GrayColor, Rgb565, Rgb888, RgbColor,
};

/// The sample value for a black pixel.
pub const BLACK: u8 = 0;
/// The sample value for a white pixel. This is also the blank value of a freshly cleared panel.
pub const WHITE: u8 = 255;

/// Converts a colour into a brightness sample, where 0 is black and 255 is white.
pub trait Brightness: Copy {
    fn brightness(self) -> u8;
}

/// Scales a channel value in `0..=max` to `0..=255`.
const fn scale(value: u8, max: u8) -> u8 {
    ((value as u16 * 255) / max as u16) as u8
}

/// Integer luma using the same weights as LVGL's `lv_color_brightness`. The weights sum to 256,
/// so white maps to exactly 255.
const fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 * 77 + g as u16 * 151 + b as u16 * 28) >> 8) as u8
}

impl Brightness for BinaryColor {
    /// `Off` is black and `On` is white, matching the panel drivers.
    fn brightness(self) -> u8 {
        match self {
            BinaryColor::Off => BLACK,
            BinaryColor::On => WHITE,
        }
    }
}

impl Brightness for Gray2 {
    fn brightness(self) -> u8 {
        scale(self.luma(), 3)
    }
}

impl Brightness for Gray4 {
    fn brightness(self) -> u8 {
        scale(self.luma(), 15)
    }
}

impl Brightness for Gray8 {
    fn brightness(self) -> u8 {
        self.luma()
    }
}

impl Brightness for Rgb565 {
    fn brightness(self) -> u8 {
        luma(
            scale(self.r(), Self::MAX_R),
            scale(self.g(), Self::MAX_G),
            scale(self.b(), Self::MAX_B),
        )
    }
}

impl Brightness for Rgb888 {
    fn brightness(self) -> u8 {
        luma(self.r(), self.g(), self.b())
    }
}
