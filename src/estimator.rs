use std::borrow::Cow;
use std::fmt;

use clap::ValueEnum;
use num_complex::Complex;

use crate::error::CorrelationError;
use crate::quality::{QualityGate, QualityVerdict, SegmentStats};
use crate::spectral::{extract_lag_window, recentre, smooth, SpectralTransform};

pub const DEFAULT_SAMPLING_HZ: usize = 4;
pub const DEFAULT_MAX_LAG_S: usize = 100;
pub const DEFAULT_STD_CONTROL: f64 = 10.0;
pub const DEFAULT_STAB: usize = 10;

/// Scalar parameters shared by every estimator call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrelationParams {
    /// Samples per second of both records (`1 / dt`).
    pub sampling_hz: usize,
    /// Half-width of the returned lag window, in seconds (`tpm`).
    pub max_lag_s: usize,
    /// Spike threshold in standard deviations.
    pub std_control: f64,
    /// Half-width of the denominator smoothing window, in bins.
    pub stab: usize,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            sampling_hz: DEFAULT_SAMPLING_HZ,
            max_lag_s: DEFAULT_MAX_LAG_S,
            std_control: DEFAULT_STD_CONTROL,
            stab: DEFAULT_STAB,
        }
    }
}

impl CorrelationParams {
    /// Number of samples on each side of zero lag (`tpm * delta`).
    pub fn half_window(&self) -> usize {
        self.max_lag_s * self.sampling_hz
    }

    pub fn waveform_len(&self) -> usize {
        2 * self.half_window()
    }

    pub fn validate(&self) -> Result<(), CorrelationError> {
        if self.sampling_hz == 0 {
            return Err(CorrelationError::InvalidParameter(
                "sampling rate must be at least 1 Hz".into(),
            ));
        }
        if self.max_lag_s == 0 {
            return Err(CorrelationError::InvalidParameter(
                "maximum lag must be at least 1 s".into(),
            ));
        }
        if self.stab == 0 {
            return Err(CorrelationError::InvalidParameter(
                "smoothing window must be at least 1 bin".into(),
            ));
        }
        if self
            .max_lag_s
            .checked_mul(self.sampling_hz)
            .and_then(|half| half.checked_mul(2))
            .is_none()
        {
            return Err(CorrelationError::InvalidParameter(format!(
                "lag window of {} s at {} Hz overflows the sample index range",
                self.max_lag_s, self.sampling_hz
            )));
        }
        QualityGate::new(self.std_control)?;
        Ok(())
    }
}

/// Estimators, listed in their default plotting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Method {
    OneBit,
    CrossCorrelation,
    Coherency,
    Deconvolution,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::OneBit,
        Method::CrossCorrelation,
        Method::Coherency,
        Method::Deconvolution,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Method::OneBit => "1-bit cross-corr",
            Method::CrossCorrelation => "Cross-correlation",
            Method::Coherency => "Coherency",
            Method::Deconvolution => "Deconvolution",
        }
    }

    pub fn estimator(self) -> &'static dyn Estimator {
        match self {
            Method::OneBit => &OneBitCorrelator,
            Method::CrossCorrelation => &RawCorrelator,
            Method::Coherency => &Coherency,
            Method::Deconvolution => &Deconvolver,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Borrowed source/receiver segments of equal, non-zero length with finite samples.
#[derive(Clone, Copy, Debug)]
pub struct SegmentPair<'a> {
    source: &'a [f64],
    receiver: &'a [f64],
}

impl<'a> SegmentPair<'a> {
    pub fn new(source: &'a [f64], receiver: &'a [f64]) -> Result<Self, CorrelationError> {
        if source.is_empty() || receiver.is_empty() {
            return Err(CorrelationError::EmptySegment);
        }
        if source.len() != receiver.len() {
            return Err(CorrelationError::LengthMismatch {
                source_len: source.len(),
                receiver_len: receiver.len(),
            });
        }
        for (side, samples) in [("source", source), ("receiver", receiver)] {
            if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
                return Err(CorrelationError::NonFinite { side, index });
            }
        }
        Ok(Self { source, receiver })
    }

    pub fn source(&self) -> &'a [f64] {
        self.source
    }

    pub fn receiver(&self) -> &'a [f64] {
        self.receiver
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// Lag-indexed output of one estimator call, `[-max_lag_s, max_lag_s)` seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityWaveform {
    samples: Vec<f64>,
}

impl SimilarityWaveform {
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Lag axis `[-half, half)` samples expressed in seconds.
pub fn lag_axis(half_window: usize, sampling_hz: usize) -> Vec<f64> {
    let dt = 1.0 / sampling_hz as f64;
    (0..2 * half_window)
        .map(|idx| (idx as f64 - half_window as f64) * dt)
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Computed(SimilarityWaveform),
    SpikeRejected {
        source: SegmentStats,
        receiver: SegmentStats,
    },
}

impl Outcome {
    /// 0 when a waveform was computed, 1 when the window was rejected.
    pub fn nodata(&self) -> u8 {
        match self {
            Outcome::Computed(_) => 0,
            Outcome::SpikeRejected { .. } => 1,
        }
    }

    pub fn waveform(&self) -> Option<&SimilarityWaveform> {
        match self {
            Outcome::Computed(waveform) => Some(waveform),
            Outcome::SpikeRejected { .. } => None,
        }
    }

    pub fn into_waveform(self) -> Option<SimilarityWaveform> {
        match self {
            Outcome::Computed(waveform) => Some(waveform),
            Outcome::SpikeRejected { .. } => None,
        }
    }
}

/// Result of one call: the outcome plus the caller's accepted-window count,
/// incremented only when a waveform was computed.
#[derive(Clone, Debug, PartialEq)]
pub struct Estimate {
    pub outcome: Outcome,
    pub count: usize,
}

impl Estimate {
    pub fn nodata(&self) -> u8 {
        self.outcome.nodata()
    }
}

/// One similarity estimator: optional time-domain preparation of each segment
/// and the combination of the two padded spectra.
pub trait Estimator: Send + Sync {
    fn method(&self) -> Method;

    fn prepare<'a>(&self, samples: &'a [f64]) -> Cow<'a, [f64]> {
        Cow::Borrowed(samples)
    }

    fn combine(
        &self,
        source: &[Complex<f64>],
        receiver: &[Complex<f64>],
        stab: usize,
    ) -> Result<Vec<Complex<f64>>, CorrelationError>;
}

/// Sign-only copy of `samples`: +1 for positive, -1 for negative, 0 stays 0.
pub fn sign_quantize(samples: &[f64]) -> Vec<f64> {
    samples
        .iter()
        .map(|&value| {
            if value > 0.0 {
                1.0
            } else if value < 0.0 {
                -1.0
            } else {
                value
            }
        })
        .collect()
}

fn cross_spectrum(source: &[Complex<f64>], receiver: &[Complex<f64>]) -> Vec<Complex<f64>> {
    receiver
        .iter()
        .zip(source.iter())
        .map(|(r, s)| r * s.conj())
        .collect()
}

/// Smoothed `|spectrum|`, refusing bins that would be divided by zero.
fn smoothed_magnitude(spectrum: &[Complex<f64>], stab: usize) -> Result<Vec<f64>, CorrelationError> {
    let magnitude: Vec<f64> = spectrum.iter().map(|bin| bin.norm()).collect();
    let smoothed = smooth(&magnitude, stab)?;
    if let Some(bin) = smoothed.iter().position(|&v| v <= 0.0 || !v.is_finite()) {
        return Err(CorrelationError::SingularDenominator { bin });
    }
    Ok(smoothed)
}

pub struct OneBitCorrelator;

impl Estimator for OneBitCorrelator {
    fn method(&self) -> Method {
        Method::OneBit
    }

    fn prepare<'a>(&self, samples: &'a [f64]) -> Cow<'a, [f64]> {
        Cow::Owned(sign_quantize(samples))
    }

    fn combine(
        &self,
        source: &[Complex<f64>],
        receiver: &[Complex<f64>],
        _stab: usize,
    ) -> Result<Vec<Complex<f64>>, CorrelationError> {
        Ok(cross_spectrum(source, receiver))
    }
}

pub struct RawCorrelator;

impl Estimator for RawCorrelator {
    fn method(&self) -> Method {
        Method::CrossCorrelation
    }

    fn combine(
        &self,
        source: &[Complex<f64>],
        receiver: &[Complex<f64>],
        _stab: usize,
    ) -> Result<Vec<Complex<f64>>, CorrelationError> {
        Ok(cross_spectrum(source, receiver))
    }
}

/// Receiver deconvolved by the smoothed source amplitude spectrum.
pub struct Deconvolver;

impl Estimator for Deconvolver {
    fn method(&self) -> Method {
        Method::Deconvolution
    }

    fn combine(
        &self,
        source: &[Complex<f64>],
        receiver: &[Complex<f64>],
        stab: usize,
    ) -> Result<Vec<Complex<f64>>, CorrelationError> {
        let sj = smoothed_magnitude(source, stab)?;
        let mut spectrum = cross_spectrum(source, receiver);
        for (bin, s) in spectrum.iter_mut().zip(sj.iter()) {
            *bin /= s * s;
        }
        Ok(spectrum)
    }
}

/// Cross spectrum normalised by both smoothed amplitude spectra.
pub struct Coherency;

impl Estimator for Coherency {
    fn method(&self) -> Method {
        Method::Coherency
    }

    fn combine(
        &self,
        source: &[Complex<f64>],
        receiver: &[Complex<f64>],
        stab: usize,
    ) -> Result<Vec<Complex<f64>>, CorrelationError> {
        let sj = smoothed_magnitude(source, stab)?;
        let si = smoothed_magnitude(receiver, stab)?;
        let mut spectrum = cross_spectrum(source, receiver);
        for ((bin, i), j) in spectrum.iter_mut().zip(si.iter()).zip(sj.iter()) {
            *bin /= i * j;
        }
        Ok(spectrum)
    }
}

/// FFT plans, quality gate and parameters for one segment length.
///
/// Shared read-only between workers; every call is independent.
pub struct Correlator {
    transform: SpectralTransform,
    gate: QualityGate,
    params: CorrelationParams,
}

impl Correlator {
    pub fn new(segment_len: usize, params: CorrelationParams) -> Result<Self, CorrelationError> {
        params.validate()?;
        let gate = QualityGate::new(params.std_control)?;
        let transform = SpectralTransform::new(segment_len)?;
        let padded = transform.padded_len();
        if params.half_window() > padded / 2 {
            return Err(CorrelationError::LagWindowTooLong {
                requested: params.waveform_len(),
                padded,
            });
        }
        if padded <= 2 * params.stab {
            return Err(CorrelationError::SmoothingWindowTooWide {
                stab: params.stab,
                len: padded,
            });
        }
        Ok(Self {
            transform,
            gate,
            params,
        })
    }

    pub fn params(&self) -> &CorrelationParams {
        &self.params
    }

    pub fn segment_len(&self) -> usize {
        self.transform.segment_len()
    }

    pub fn compute(
        &self,
        estimator: &dyn Estimator,
        pair: &SegmentPair<'_>,
        count: usize,
    ) -> Result<Estimate, CorrelationError> {
        if pair.len() != self.transform.segment_len() {
            return Err(CorrelationError::LengthMismatch {
                source_len: self.transform.segment_len(),
                receiver_len: pair.len(),
            });
        }

        if let QualityVerdict::Reject { source, receiver } =
            self.gate.check(pair.source(), pair.receiver())
        {
            return Ok(Estimate {
                outcome: Outcome::SpikeRejected { source, receiver },
                count,
            });
        }

        let source = estimator.prepare(pair.source());
        let receiver = estimator.prepare(pair.receiver());
        let spec_s = self.transform.forward(&source)?;
        let spec_r = self.transform.forward(&receiver)?;
        let combined = estimator.combine(&spec_s, &spec_r, self.params.stab)?;
        let circular = self.transform.inverse_real(combined)?;
        let samples = extract_lag_window(&recentre(&circular), self.params.half_window())?;

        Ok(Estimate {
            outcome: Outcome::Computed(SimilarityWaveform { samples }),
            count: count + 1,
        })
    }

    pub fn compute_method(
        &self,
        method: Method,
        pair: &SegmentPair<'_>,
        count: usize,
    ) -> Result<Estimate, CorrelationError> {
        self.compute(method.estimator(), pair, count)
    }
}
