//! Error taxonomy for the density core.
//!
//! Every variant names the offending parameter or record so the caller can
//! report it verbatim. The I/O layer and batch driver wrap these in
//! `anyhow` with file context.

/// Failures of the aggregation / smoothing core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DensityError {
    /// Bucket width was zero, negative or not finite.
    #[error("invalid bucket width: {width} (must be a finite number > 0)")]
    InvalidWidth { width: f64 },

    /// Smoothing sigma was not finite, not positive, or wider than the
    /// kernel can hold.
    #[error("invalid smoothing sigma: {sigma} (must be a finite number in (0, 250000])")]
    InvalidSigma { sigma: f64 },

    /// Aligned bucketing would need more slots than we are willing to allocate.
    #[error("bucket width {width} too small for the span: {slots} aligned buckets (limit {limit})")]
    TooManyBuckets { width: f64, slots: f64, limit: usize },

    /// A chat record with a non-finite or decreasing timestamp.
    #[error("malformed record #{index} (time_in_seconds={timestamp}): {reason}")]
    MalformedRecord {
        index: usize,
        timestamp: f64,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, DensityError>;

/// Largest accepted sigma; the kernel then has `2 * 1_000_000 + 1` taps.
pub const MAX_SIGMA: f64 = 250_000.0;

/// Reject widths that are not finite and strictly positive.
pub(crate) fn check_width(width: f64) -> Result<()> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(DensityError::InvalidWidth { width })
    }
}

pub(crate) fn check_sigma(sigma: f64) -> Result<()> {
    if sigma.is_finite() && sigma > 0.0 && sigma <= MAX_SIGMA {
        Ok(())
    } else {
        Err(DensityError::InvalidSigma { sigma })
    }
}
