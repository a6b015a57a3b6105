use thiserror::Error as ThisError;

/// Reasons a flush can finish without updating the panel.
///
/// None of these escape [crate::renderer::FrameDiffRenderer::flush]; they are reported through
/// [crate::renderer::FlushOutcome::Dropped] so the caller's pump never stalls.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The shadow, scratch or frame storage could not be grown.
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },
    /// The number of samples does not match the region's area.
    #[error("region holds {actual} samples, but its area needs {expected}")]
    RegionMismatch { expected: usize, actual: usize },
    /// The region is not fully contained by the panel.
    #[error("region lies outside the panel")]
    OutOfBounds,
    /// The panel driver reported an error while drawing.
    #[error("panel failed to draw")]
    Panel,
}
