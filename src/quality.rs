//! Spike screening applied to every segment pair before an estimator runs.

use crate::error::CorrelationError;

/// Standard deviation and peak absolute amplitude of one segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentStats {
    pub std: f64,
    pub peak: f64,
}

impl SegmentStats {
    /// Population standard deviation (divide by `n`) and `max |x|`.
    pub fn of(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self { std: 0.0, peak: 0.0 };
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|value| {
                let diff = value - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        let peak = samples.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        Self {
            std: variance.sqrt(),
            peak,
        }
    }

    /// True when the peak stays strictly below `std_control` standard deviations.
    pub fn passes(&self, std_control: f64) -> bool {
        self.peak < std_control * self.std
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QualityVerdict {
    Accept,
    Reject {
        source: SegmentStats,
        receiver: SegmentStats,
    },
}

impl QualityVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, QualityVerdict::Accept)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityGate {
    std_control: f64,
}

impl QualityGate {
    pub fn new(std_control: f64) -> Result<Self, CorrelationError> {
        if !std_control.is_finite() || std_control <= 0.0 {
            return Err(CorrelationError::InvalidParameter(format!(
                "std_control must be positive and finite, got {std_control}"
            )));
        }
        Ok(Self { std_control })
    }

    pub fn check(&self, source: &[f64], receiver: &[f64]) -> QualityVerdict {
        let source_stats = SegmentStats::of(source);
        let receiver_stats = SegmentStats::of(receiver);
        if source_stats.passes(self.std_control) && receiver_stats.passes(self.std_control) {
            QualityVerdict::Accept
        } else {
            QualityVerdict::Reject {
                source: source_stats,
                receiver: receiver_stats,
            }
        }
    }
}
