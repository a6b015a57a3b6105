//! Renderer configuration.

use crate::{dither::DEFAULT_THRESHOLD, gray::WHITE};

/// How a grayscale rectangle is turned into black and white pixels.
///
/// This is chosen once, when the renderer is built.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Floyd-Steinberg error diffusion within each rectangle. Every flush redraws the panel.
    Dither,
    /// A flat threshold, diffed against the shadow buffer. Flushes that don't change any pixel
    /// skip the panel refresh entirely.
    #[default]
    ThresholdDiff,
}

/// Configuration for [crate::renderer::FrameDiffRenderer].
///
/// ```
/// use watchy_epd::config::{RendererConfig, Strategy};
///
/// let config = RendererConfig::default()
///     .with_strategy(Strategy::Dither)
///     .with_threshold(100);
/// assert_eq!(config.blank, 255);
/// ```
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    pub strategy: Strategy,
    /// Samples below this are black.
    pub threshold: u8,
    /// The value of a blank (never drawn) pixel. E-paper panels start out white.
    pub blank: u8,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            threshold: DEFAULT_THRESHOLD,
            blank: WHITE,
        }
    }
}

impl RendererConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_blank(mut self, blank: u8) -> Self {
        self.blank = blank;
        self
    }
}
