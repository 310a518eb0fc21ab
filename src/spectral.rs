use std::sync::Arc;

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};

use crate::error::CorrelationError;

/// Zero-pad factor applied to every segment before the forward transform.
pub const PAD_FACTOR: usize = 5;

/// Forward/inverse DFT pair for segments of one fixed length.
///
/// The forward path runs a real-to-complex FFT over the zero-padded segment and
/// mirrors the half spectrum into the full `PAD_FACTOR * n` bins, so the
/// estimators can smooth and divide over the whole spectrum. The inverse path
/// is complex-to-complex because a smoothed denominator is not Hermitian in
/// general; only the real part of the result is kept.
pub struct SpectralTransform {
    segment_len: usize,
    padded_len: usize,
    forward_r2c: Arc<dyn RealToComplex<f64>>,
    inverse_c2c: Arc<dyn Fft<f64>>,
}

impl SpectralTransform {
    pub fn new(segment_len: usize) -> Result<Self, CorrelationError> {
        if segment_len == 0 {
            return Err(CorrelationError::EmptySegment);
        }
        let padded_len = segment_len * PAD_FACTOR;

        let mut planner_r2c = RealFftPlanner::<f64>::new();
        let mut planner_c2c = FftPlanner::<f64>::new();
        let forward_r2c = planner_r2c.plan_fft_forward(padded_len);
        let inverse_c2c = planner_c2c.plan_fft_inverse(padded_len);

        Ok(Self {
            segment_len,
            padded_len,
            forward_r2c,
            inverse_c2c,
        })
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    /// Full-length spectrum of `samples` padded with trailing zeros.
    pub fn forward(&self, samples: &[f64]) -> Result<Vec<Complex<f64>>, CorrelationError> {
        if samples.len() != self.segment_len {
            return Err(CorrelationError::LengthMismatch {
                source_len: self.segment_len,
                receiver_len: samples.len(),
            });
        }
        let mut padded = vec![0.0; self.padded_len];
        padded[..self.segment_len].copy_from_slice(samples);

        let half_spec_len = self.padded_len / 2 + 1;
        let mut half = vec![Complex::new(0.0, 0.0); half_spec_len];
        self.forward_r2c.process(&mut padded, &mut half)?;

        let fft_len = self.padded_len;
        let mut full = vec![Complex::new(0.0, 0.0); fft_len];
        full[..half_spec_len].copy_from_slice(&half);
        if fft_len > 1 {
            let mirror_limit = if fft_len % 2 == 0 {
                half_spec_len - 1
            } else {
                half_spec_len
            };
            for mirrored in 1..mirror_limit {
                full[fft_len - mirrored] = half[mirrored].conj();
            }
        }
        Ok(full)
    }

    /// Real part of the normalised inverse DFT. The imaginary residue is dropped.
    pub fn inverse_real(
        &self,
        mut spectrum: Vec<Complex<f64>>,
    ) -> Result<Vec<f64>, CorrelationError> {
        if spectrum.len() != self.padded_len {
            return Err(CorrelationError::SpectrumLength {
                expected: self.padded_len,
                actual: spectrum.len(),
            });
        }
        self.inverse_c2c.process(&mut spectrum);
        let scale = 1.0 / self.padded_len as f64;
        Ok(spectrum.iter().map(|value| value.re * scale).collect())
    }
}

/// Swap the two halves of a circular correlation (second half first).
///
/// For an even length, zero lag lands on `len / 2`. For an odd length it lands
/// one sample past `len / 2`.
pub fn recentre(circular: &[f64]) -> Vec<f64> {
    let shift = circular.len() / 2;
    circular
        .iter()
        .cycle()
        .skip(shift)
        .take(circular.len())
        .copied()
        .collect()
}

/// Slice `[mid - half_len, mid + half_len)` out of a recentred correlation.
pub fn extract_lag_window(centred: &[f64], half_len: usize) -> Result<Vec<f64>, CorrelationError> {
    let mid = centred.len() / 2;
    if half_len > mid || mid + half_len > centred.len() {
        return Err(CorrelationError::LagWindowTooLong {
            requested: 2 * half_len,
            padded: centred.len(),
        });
    }
    Ok(centred[mid - half_len..mid + half_len].to_vec())
}

/// Centred running mean used to stabilise spectral denominators.
///
/// Output `i` is the mean of the `stab` values on each side of `i`, centre
/// excluded, with the input extended by repeating its first and last value.
/// The first and last `stab` outputs are then set to the value of their
/// nearest interior neighbour. `stab == 0` returns the input unchanged.
pub fn smooth(values: &[f64], stab: usize) -> Result<Vec<f64>, CorrelationError> {
    if stab == 0 {
        return Ok(values.to_vec());
    }
    let len = values.len();
    if len <= 2 * stab {
        return Err(CorrelationError::SmoothingWindowTooWide { stab, len });
    }

    let at = |idx: isize| -> f64 {
        if idx < 0 {
            values[0]
        } else if idx as usize >= len {
            values[len - 1]
        } else {
            values[idx as usize]
        }
    };
    let stab_i = stab as isize;
    let norm = 1.0 / (2 * stab) as f64;

    // Each bin sums its own 2 * stab neighbours.
    let mut out: Vec<f64> = (0..len as isize)
        .map(|i| (1..=stab_i).map(|d| at(i - d) + at(i + d)).sum::<f64>() * norm)
        .collect();

    let head = out[stab];
    out[..stab].fill(head);
    let tail = out[len - stab - 1];
    out[len - stab..].fill(tail);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn naive_dft(samples: &[f64], len: usize) -> Vec<Complex<f64>> {
        (0..len)
            .map(|k| {
                samples
                    .iter()
                    .enumerate()
                    .map(|(n, &x)| {
                        Complex::from_polar(x, -2.0 * PI * (k * n) as f64 / len as f64)
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn forward_matches_padded_dft_for_odd_and_even_lengths() {
        for samples in [vec![1.0, -2.0, 0.5, 3.0], vec![0.25, 1.0, -1.0]] {
            let transform = SpectralTransform::new(samples.len()).unwrap();
            let spectrum = transform.forward(&samples).unwrap();
            let expected = naive_dft(&samples, samples.len() * PAD_FACTOR);
            assert_eq!(spectrum.len(), expected.len());
            for (got, want) in spectrum.iter().zip(expected.iter()) {
                assert!((got - want).norm() < 1e-9, "got {got}, want {want}");
            }
        }
    }

    #[test]
    fn inverse_recovers_padded_segment() {
        let samples = [0.5, -1.0, 2.0, 0.0, 1.5, -0.25];
        let transform = SpectralTransform::new(samples.len()).unwrap();
        let spectrum = transform.forward(&samples).unwrap();
        let back = transform.inverse_real(spectrum).unwrap();
        assert_eq!(back.len(), samples.len() * PAD_FACTOR);
        for (idx, value) in back.iter().enumerate() {
            let want = samples.get(idx).copied().unwrap_or(0.0);
            assert!((value - want).abs() < 1e-12);
        }
    }

    #[test]
    fn forward_rejects_wrong_length() {
        let transform = SpectralTransform::new(8).unwrap();
        assert!(matches!(
            transform.forward(&[1.0; 7]),
            Err(CorrelationError::LengthMismatch { .. })
        ));
        assert!(matches!(
            SpectralTransform::new(0),
            Err(CorrelationError::EmptySegment)
        ));
    }

    #[test]
    fn recentre_swaps_halves() {
        assert_eq!(recentre(&[0.0, 1.0, 2.0, 3.0]), vec![2.0, 3.0, 0.0, 1.0]);
        assert_eq!(recentre(&[0.0, 1.0, 2.0, 3.0, 4.0]), vec![2.0, 3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn lag_window_is_centred_on_midpoint() {
        let centred: Vec<f64> = (0..10).map(f64::from).collect();
        assert_eq!(extract_lag_window(&centred, 2).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(extract_lag_window(&centred, 5).unwrap().len(), 10);
        assert!(matches!(
            extract_lag_window(&centred, 6),
            Err(CorrelationError::LagWindowTooLong { requested: 12, padded: 10 })
        ));
    }

    #[test]
    fn smooth_keeps_constant_spectrum() {
        let flat = vec![3.0; 32];
        let smoothed = smooth(&flat, 4).unwrap();
        assert!(smoothed.iter().all(|&v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn smooth_excludes_centre_and_flattens_edges() {
        let ramp: Vec<f64> = (0..8).map(f64::from).collect();
        let smoothed = smooth(&ramp, 1).unwrap();
        // Interior: mean of the two neighbours.
        assert_eq!(&smoothed[1..7], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(smoothed[0], smoothed[1]);
        assert_eq!(smoothed[7], smoothed[6]);

        let spike = [0.0, 0.0, 0.0, 8.0, 0.0, 0.0, 0.0];
        let smoothed = smooth(&spike, 1).unwrap();
        assert_eq!(smoothed[3], 0.0);
        assert_eq!(smoothed[2], 4.0);
        assert_eq!(smoothed[4], 4.0);
    }

    #[test]
    fn smooth_window_must_fit() {
        assert!(matches!(
            smooth(&[1.0; 4], 2),
            Err(CorrelationError::SmoothingWindowTooWide { stab: 2, len: 4 })
        ));
        assert_eq!(smooth(&[1.0, 2.0], 0).unwrap(), vec![1.0, 2.0]);
    }
}
