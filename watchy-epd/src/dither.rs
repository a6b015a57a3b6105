//! Binarisation of grayscale rectangles, either with Floyd-Steinberg error diffusion or a flat
//! threshold.
//!
//! Error diffusion is confined to the rectangle being flushed. Neighbouring rectangles (including
//! ones that were flushed earlier) never receive error from this one, so the seams between
//! partial updates can differ slightly from dithering the whole frame at once.

use embedded_graphics::prelude::Size;

use crate::gray::{BLACK, WHITE};

/// Samples below this value become black, everything else becomes white.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Error diffusion weights, in sixteenths: right, lower-left, lower, lower-right.
const WEIGHT_RIGHT: i32 = 7;
const WEIGHT_LOWER_LEFT: i32 = 3;
const WEIGHT_LOWER: i32 = 5;
const WEIGHT_LOWER_RIGHT: i32 = 1;

/// Maps a single sample to pure black or white.
#[inline]
pub fn binarize(sample: u8, threshold: u8) -> u8 {
    if sample < threshold {
        BLACK
    } else {
        WHITE
    }
}

/// Binarises every sample in place without diffusing any error.
pub fn threshold(samples: &mut [u8], threshold: u8) {
    for sample in samples.iter_mut() {
        *sample = binarize(*sample, threshold);
    }
}

/// Dithers a row-major rectangle of `size` samples in place, leaving only 0 and 255.
///
/// Arithmetic matches the classic integer implementation: the error for each neighbour is
/// `error * weight / 16` truncated towards zero, and each neighbour is clamped to `0..=255` after
/// the error is added. A zero-sized rectangle is left untouched.
pub fn floyd_steinberg(samples: &mut [u8], size: Size, threshold: u8) {
    let width = size.width as usize;
    if width == 0 || size.height == 0 {
        return;
    }
    // Never index past the samples we were given, even if the caller's size is too large.
    let height = (size.height as usize).min(samples.len() / width);

    for y in 0..height {
        let has_next_row = y + 1 < height;
        for x in 0..width {
            let index = y * width + x;
            let old = samples[index];
            let new = binarize(old, threshold);
            samples[index] = new;

            let error = old as i32 - new as i32;
            if error == 0 {
                continue;
            }

            let has_right = x + 1 < width;
            if has_right {
                diffuse(&mut samples[index + 1], error, WEIGHT_RIGHT);
            }
            if has_next_row {
                let below = index + width;
                if x > 0 {
                    diffuse(&mut samples[below - 1], error, WEIGHT_LOWER_LEFT);
                }
                diffuse(&mut samples[below], error, WEIGHT_LOWER);
                if has_right {
                    diffuse(&mut samples[below + 1], error, WEIGHT_LOWER_RIGHT);
                }
            }
        }
    }
}

#[inline]
fn diffuse(sample: &mut u8, error: i32, weight: i32) {
    let value = *sample as i32 + error * weight / 16;
    *sample = value.clamp(BLACK as i32, WHITE as i32) as u8;
}
