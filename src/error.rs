use std::error::Error;

use thiserror::Error;

pub type DynError = Box<dyn Error + Send + Sync>;

/// Precondition violations raised by the correlation core.
///
/// A spike-rejected window is not an error; it is reported through
/// [`crate::estimator::Outcome::SpikeRejected`].
#[derive(Error, Debug)]
pub enum CorrelationError {
    #[error("segment is empty")]
    EmptySegment,

    #[error("segment lengths differ: source {source_len}, receiver {receiver_len}")]
    LengthMismatch {
        source_len: usize,
        receiver_len: usize,
    },

    #[error("{side} segment has a non-finite sample at index {index}")]
    NonFinite { side: &'static str, index: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("lag window of {requested} samples does not fit a padded record of {padded} samples")]
    LagWindowTooLong { requested: usize, padded: usize },

    #[error("smoothing window {stab} is too wide for a spectrum of {len} bins")]
    SmoothingWindowTooWide { stab: usize, len: usize },

    #[error("smoothed denominator vanishes at bin {bin}")]
    SingularDenominator { bin: usize },

    #[error("record of {len} samples does not split evenly into {windows} windows")]
    UnevenSplit { len: usize, windows: usize },

    #[error("spectrum has {actual} bins, expected {expected}")]
    SpectrumLength { expected: usize, actual: usize },

    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),
}
