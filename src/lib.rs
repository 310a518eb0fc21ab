//! Ambient-noise interferometry between two continuous seismic records.
//!
//! Each record pair is cut into windows, screened for spikes, and turned
//! into a lag-domain similarity waveform by one of four estimators
//! (one-bit correlation, raw correlation, deconvolution, coherency). The
//! per-window waveforms are stacked, band-passed and plotted.

pub mod error;
pub mod estimator;
pub mod filter;
pub mod plot;
pub mod quality;
pub mod sac;
pub mod spectral;
pub mod stack;

pub use error::{CorrelationError, DynError};
pub use estimator::{CorrelationParams, Correlator, Estimate, Estimator, Method, Outcome, SegmentPair};
pub use filter::BandPass;
pub use quality::{QualityGate, QualityVerdict};
pub use sac::{read_sac, SacTrace};
pub use stack::{StackResult, WindowStacker};
