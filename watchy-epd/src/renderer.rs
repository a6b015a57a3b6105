//! Flushes grayscale regions to a [Panel], using the configured [Strategy] to binarise them.

use alloc::vec::Vec;

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{Point, Size},
    primitives::Rectangle,
};

use crate::{
    config::{RendererConfig, Strategy},
    dither::{floyd_steinberg, threshold},
    gray::BLACK,
    log::{debug, trace, warn_log},
    region::PixelRegion,
    shadow::{ChangeSet, ShadowBuffer},
    Error, Panel,
};

/// Where the renderer is within a flush.
///
/// Every flush moves `Idle → Rendering → {Drawing | Skipped} → Done` and then returns to `Idle`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    /// The region is being copied and binarised.
    Rendering,
    /// The panel is drawing the region.
    Drawing,
    /// Nothing changed, so the panel is left alone.
    Skipped,
    Done,
}

/// What happened to the panel during a flush.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The region was drawn and refreshed.
    Drawn,
    /// Nothing needed drawing: the region was empty or matched the shadow buffer.
    Skipped,
    /// The flush completed without updating the panel.
    Dropped(Error),
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub outcome: FlushOutcome,
    /// Diagnostics from the diff. With [Strategy::Dither] every pixel counts as changed.
    pub changes: ChangeSet,
}

/// Owns the shadow buffer and scratch space, and turns each flushed region into at most one
/// partial refresh.
///
/// ```
/// # embassy_futures::block_on(async {
/// use embedded_graphics::{prelude::*, primitives::Rectangle};
/// use watchy_epd::{
///     config::RendererConfig,
///     region::PixelRegion,
///     renderer::{FlushOutcome, FrameDiffRenderer},
///     sim::SimPanel,
/// };
///
/// let mut panel = SimPanel::new(Size::new(200, 200)).unwrap();
/// let mut renderer = FrameDiffRenderer::new(RendererConfig::default());
///
/// let area = Rectangle::new(Point::new(10, 10), Size::new(2, 2));
/// let samples = [0, 255, 255, 0];
/// let report = renderer.flush(&mut panel, PixelRegion::new(area, &samples)).await;
/// assert_eq!(report.outcome, FlushOutcome::Drawn);
///
/// // The panel already shows this, so the second flush skips the refresh.
/// let report = renderer.flush(&mut panel, PixelRegion::new(area, &samples)).await;
/// assert_eq!(report.outcome, FlushOutcome::Skipped);
/// # });
/// ```
pub struct FrameDiffRenderer {
    config: RendererConfig,
    shadow: ShadowBuffer,
    scratch: Vec<u8>,
    state: FlushState,
}

impl FrameDiffRenderer {
    /// Creates a renderer. No memory is allocated until the first flush.
    pub fn new(config: RendererConfig) -> Self {
        Self {
            shadow: ShadowBuffer::new(config.blank),
            config,
            scratch: Vec::new(),
            state: FlushState::Idle,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn shadow(&self) -> &ShadowBuffer {
        &self.shadow
    }

    /// Forces the next flush to redraw, e.g. after a full refresh of the panel.
    pub fn invalidate(&mut self) {
        self.shadow.invalidate();
    }

    /// Binarises `region` and draws it on `panel` if anything changed.
    ///
    /// This never fails: every error is reported in the returned [FlushReport], and
    /// [Panel::flush_complete] is called exactly once before returning.
    pub async fn flush<P: Panel>(&mut self, panel: &mut P, region: PixelRegion<'_>) -> FlushReport {
        self.state = FlushState::Rendering;
        trace!("Flushing {:?}", region.area());

        let report = match self.render(panel.size(), region) {
            Ok(changes) if changes.has_changes => {
                self.state = FlushState::Drawing;
                let outcome = match self.draw(panel, region.area()).await {
                    Ok(()) => FlushOutcome::Drawn,
                    Err(e) => {
                        warn_log!("Panel failed to draw {:?}", region.area());
                        // The shadow now holds pixels the panel never showed.
                        self.shadow.forget(region.area());
                        FlushOutcome::Dropped(e)
                    }
                };
                FlushReport { outcome, changes }
            }
            Ok(changes) => {
                self.state = FlushState::Skipped;
                trace!("No changes in {:?}", region.area());
                FlushReport {
                    outcome: FlushOutcome::Skipped,
                    changes,
                }
            }
            Err(e) => {
                warn_log!("Dropping flush of {:?}: {:?}", region.area(), e);
                FlushReport {
                    outcome: FlushOutcome::Dropped(e),
                    changes: ChangeSet::default(),
                }
            }
        };

        self.state = FlushState::Done;
        panel.flush_complete();
        self.state = FlushState::Idle;
        report
    }

    /// Copies the region into scratch space and binarises it there.
    fn render(&mut self, panel_size: Size, region: PixelRegion<'_>) -> Result<ChangeSet, Error> {
        if region.is_empty() {
            return Ok(ChangeSet::default());
        }
        region.validate(panel_size)?;
        self.load_scratch(region.samples())?;

        let area = region.area();
        match self.config.strategy {
            Strategy::Dither => {
                floyd_steinberg(&mut self.scratch, area.size, self.config.threshold);
                Ok(ChangeSet {
                    has_changes: true,
                    changed: self.scratch.len(),
                    bounds: Some(area),
                })
            }
            Strategy::ThresholdDiff => {
                threshold(&mut self.scratch, self.config.threshold);
                if self.shadow.ensure_size(panel_size)? {
                    debug!(
                        "Shadow buffer reallocated for {}x{}",
                        panel_size.width, panel_size.height
                    );
                }
                self.shadow.diff_and_store(area, &self.scratch)
            }
        }
    }

    fn load_scratch(&mut self, samples: &[u8]) -> Result<(), Error> {
        self.scratch.clear();
        self.scratch
            .try_reserve_exact(samples.len())
            .map_err(|_| Error::AllocationFailed {
                bytes: samples.len(),
            })?;
        self.scratch.extend_from_slice(samples);
        Ok(())
    }

    /// Draws the binarised scratch buffer as one partial window, page by page.
    async fn draw<P: Panel>(&self, panel: &mut P, area: Rectangle) -> Result<(), Error> {
        let width = area.size.width as usize;
        // Each page covers at least one row, so a well-behaved driver never needs more pages
        // than the panel has rows.
        let max_pages = panel.size().height.max(1);

        panel.begin_partial_window(area);
        for _ in 0..max_pages {
            for (row, y) in area.rows().enumerate() {
                let samples = &self.scratch[row * width..(row + 1) * width];
                for (x, &sample) in area.columns().zip(samples) {
                    panel.draw_pixel(Point::new(x, y), BinaryColor::from(sample != BLACK));
                }
            }
            if !panel.end_page().await.map_err(|_| Error::Panel)? {
                return Ok(());
            }
        }

        warn_log!("Panel still paging after {} pages", max_pages);
        Ok(())
    }
}
