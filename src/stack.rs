use log::{debug, info};
use rayon::prelude::*;

use crate::error::CorrelationError;
use crate::estimator::{CorrelationParams, Correlator, Estimate, Method, Outcome, SegmentPair};

pub const DEFAULT_WINDOWS: usize = 48;

/// Linear stack of one estimator over all windows of a record pair.
#[derive(Clone, Debug, PartialEq)]
pub struct StackResult {
    pub method: Method,
    pub stack: Vec<f64>,
    pub accepted: usize,
    pub rejected: usize,
}

/// Split a record into `windows` consecutive windows of equal length.
pub fn split_windows(samples: &[f64], windows: usize) -> Result<Vec<&[f64]>, CorrelationError> {
    if windows == 0 {
        return Err(CorrelationError::InvalidParameter(
            "window count must be at least 1".into(),
        ));
    }
    if samples.is_empty() || samples.len() % windows != 0 {
        return Err(CorrelationError::UnevenSplit {
            len: samples.len(),
            windows,
        });
    }
    Ok(samples.chunks_exact(samples.len() / windows).collect())
}

/// Virtual-source and receiver records cut into matching windows, with one
/// [`Correlator`] sized for the window length.
pub struct WindowStacker<'a> {
    source: Vec<&'a [f64]>,
    receiver: Vec<&'a [f64]>,
    correlator: Correlator,
}

impl<'a> WindowStacker<'a> {
    pub fn new(
        source: &'a [f64],
        receiver: &'a [f64],
        windows: usize,
        params: CorrelationParams,
    ) -> Result<Self, CorrelationError> {
        if source.len() != receiver.len() {
            return Err(CorrelationError::LengthMismatch {
                source_len: source.len(),
                receiver_len: receiver.len(),
            });
        }
        let source = split_windows(source, windows)?;
        let receiver = split_windows(receiver, windows)?;
        let correlator = Correlator::new(source[0].len(), params)?;
        Ok(Self {
            source,
            receiver,
            correlator,
        })
    }

    pub fn windows(&self) -> usize {
        self.source.len()
    }

    pub fn window_len(&self) -> usize {
        self.correlator.segment_len()
    }

    pub fn params(&self) -> &CorrelationParams {
        self.correlator.params()
    }

    fn estimate_window(
        &self,
        method: Method,
        idx: usize,
        count: usize,
    ) -> Result<Estimate, CorrelationError> {
        let pair = SegmentPair::new(self.source[idx], self.receiver[idx])?;
        let estimate = self.correlator.compute_method(method, &pair, count)?;
        if let Outcome::SpikeRejected { source, receiver } = &estimate.outcome {
            debug!(
                "{method}: window {idx} rejected (source peak {:.3e} / std {:.3e}, receiver peak {:.3e} / std {:.3e})",
                source.peak, source.std, receiver.peak, receiver.std
            );
        }
        Ok(estimate)
    }

    /// Stack `method` over every window. Rejected windows never enter the sum.
    ///
    /// With `parallel`, windows are estimated on the rayon pool and summed in
    /// window order afterwards, so both paths give bit-identical stacks.
    pub fn stack(&self, method: Method, parallel: bool) -> Result<StackResult, CorrelationError> {
        let mut stack = vec![0.0; self.params().waveform_len()];
        let mut count = 0usize;

        let mut accumulate = |outcome: Outcome| {
            if let Some(waveform) = outcome.into_waveform() {
                for (acc, value) in stack.iter_mut().zip(waveform.samples()) {
                    *acc += value;
                }
            }
        };

        if parallel {
            let estimates = (0..self.windows())
                .into_par_iter()
                .map(|idx| self.estimate_window(method, idx, 0))
                .collect::<Result<Vec<_>, _>>()?;
            for estimate in estimates {
                count += estimate.count;
                accumulate(estimate.outcome);
            }
        } else {
            for idx in 0..self.windows() {
                let estimate = self.estimate_window(method, idx, count)?;
                count = estimate.count;
                accumulate(estimate.outcome);
            }
        }

        let rejected = self.windows() - count;
        info!(
            "{method}: stacked {count} of {} windows ({rejected} rejected)",
            self.windows()
        );
        Ok(StackResult {
            method,
            stack,
            accepted: count,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    fn params() -> CorrelationParams {
        CorrelationParams {
            max_lag_s: 10,
            ..Default::default()
        }
    }

    #[test]
    fn split_requires_even_division() {
        let record: Vec<f64> = (0..12).map(f64::from).collect();
        let windows = split_windows(&record, 3).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1], &[4.0, 5.0, 6.0, 7.0]);
        assert!(matches!(
            split_windows(&record, 5),
            Err(CorrelationError::UnevenSplit { len: 12, windows: 5 })
        ));
        assert!(split_windows(&record, 0).is_err());
    }

    #[test]
    fn stacks_every_clean_window() {
        let source = noise(8 * 400, 17);
        let receiver = noise(8 * 400, 23);
        let stacker = WindowStacker::new(&source, &receiver, 8, params()).unwrap();
        assert_eq!(stacker.window_len(), 400);
        for method in Method::ALL {
            let result = stacker.stack(method, false).unwrap();
            assert_eq!(result.accepted, 8, "{method}");
            assert_eq!(result.rejected, 0, "{method}");
            assert_eq!(result.stack.len(), 80);
        }
    }

    #[test]
    fn spiky_window_is_left_out_of_the_stack() {
        let source = noise(4 * 400, 5);
        let mut receiver = noise(4 * 400, 6);
        receiver[2 * 400 + 17] = 500.0;

        let stacker = WindowStacker::new(&source, &receiver, 4, params()).unwrap();
        let stacked = stacker.stack(Method::CrossCorrelation, false).unwrap();
        assert_eq!(stacked.accepted, 3);
        assert_eq!(stacked.rejected, 1);

        // Same sum as stacking the three clean windows by hand.
        let correlator = Correlator::new(400, params()).unwrap();
        let mut expected = vec![0.0; 80];
        for idx in [0usize, 1, 3] {
            let range = idx * 400..(idx + 1) * 400;
            let pair = SegmentPair::new(&source[range.clone()], &receiver[range]).unwrap();
            let estimate = correlator
                .compute_method(Method::CrossCorrelation, &pair, 0)
                .unwrap();
            for (acc, value) in expected
                .iter_mut()
                .zip(estimate.outcome.waveform().unwrap().samples())
            {
                *acc += value;
            }
        }
        assert_eq!(stacked.stack, expected);
    }

    #[test]
    fn parallel_stack_matches_sequential_bit_for_bit() {
        let source = noise(6 * 500, 101);
        let mut receiver = noise(6 * 500, 202);
        receiver[4 * 500] = -900.0;
        let stacker = WindowStacker::new(&source, &receiver, 6, params()).unwrap();
        for method in Method::ALL {
            let sequential = stacker.stack(method, false).unwrap();
            let parallel = stacker.stack(method, true).unwrap();
            assert_eq!(sequential, parallel, "{method}");
            assert_eq!(parallel.rejected, 1);
        }
    }

    #[test]
    fn stacking_a_shared_sine_builds_zero_lag_peak() {
        let record: Vec<f64> = (0..48 * 400)
            .map(|i| (2.0 * PI * i as f64 / 36.0).sin())
            .collect();
        let stacker = WindowStacker::new(&record, &record, 48, params()).unwrap();
        let result = stacker.stack(Method::CrossCorrelation, true).unwrap();
        assert_eq!(result.accepted, 48);
        let peak = result
            .stack
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        assert_eq!(peak, 40);
    }

    #[test]
    fn mismatched_records_are_rejected() {
        let source = noise(800, 1);
        let receiver = noise(400, 2);
        assert!(matches!(
            WindowStacker::new(&source, &receiver, 2, params()),
            Err(CorrelationError::LengthMismatch { .. })
        ));
    }
}
