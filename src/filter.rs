//! Zero-phase Butterworth band-pass applied to the stacked waveform.

use std::f64::consts::PI;

use num_complex::Complex;

use crate::error::CorrelationError;

pub const DEFAULT_FREQ_MIN_HZ: f64 = 0.1;
pub const DEFAULT_FREQ_MAX_HZ: f64 = 0.5;
pub const DEFAULT_CORNERS: usize = 4;
const MAX_CORNERS: usize = 8;

/// Second-order section `(b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Section {
    b: [f64; 3],
    a: [f64; 2],
}

impl Section {
    /// Direct Form II transposed, zero initial state.
    fn run(&self, data: &mut [f64]) {
        let mut state = [0.0_f64; 2];
        for sample in data.iter_mut() {
            let input = *sample;
            let output = self.b[0] * input + state[0];
            state[0] = self.b[1] * input - self.a[0] * output + state[1];
            state[1] = self.b[2] * input - self.a[1] * output;
            *sample = output;
        }
    }

    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = Complex::new(1.0, 0.0) + z_inv * self.a[0] + z_inv2 * self.a[1];
        num / den
    }
}

/// Butterworth band-pass designed as analog prototype → band-pass → bilinear,
/// stored as second-order sections.
#[derive(Clone, Debug)]
pub struct BandPass {
    sections: Vec<Section>,
    freq_min: f64,
    freq_max: f64,
    sampling_hz: f64,
    corners: usize,
}

impl BandPass {
    pub fn butterworth(
        freq_min: f64,
        freq_max: f64,
        sampling_hz: f64,
        corners: usize,
    ) -> Result<Self, CorrelationError> {
        if corners == 0 || corners > MAX_CORNERS {
            return Err(CorrelationError::InvalidParameter(format!(
                "corners must be between 1 and {MAX_CORNERS}, got {corners}"
            )));
        }
        if sampling_hz <= 0.0 || !sampling_hz.is_finite() {
            return Err(CorrelationError::InvalidParameter(format!(
                "sampling rate must be positive, got {sampling_hz}"
            )));
        }
        let nyquist = sampling_hz / 2.0;
        if !(freq_min > 0.0 && freq_min < freq_max && freq_max < nyquist) {
            return Err(CorrelationError::InvalidParameter(format!(
                "band {freq_min}-{freq_max} Hz must satisfy 0 < min < max < Nyquist ({nyquist} Hz)"
            )));
        }

        let k = 2.0 * sampling_hz;
        let wl = prewarp(freq_min, sampling_hz);
        let wh = prewarp(freq_max, sampling_hz);
        let bw = wh - wl;
        let wo2 = wl * wh;

        // Low-pass prototype to band-pass: every prototype pole splits in two,
        // and `corners` zeros land at s = 0.
        let mut analog_poles = Vec::with_capacity(2 * corners);
        for p in butterworth_poles(corners) {
            let scaled = p * (bw / 2.0);
            let disc = (scaled * scaled - wo2).sqrt();
            analog_poles.push(scaled + disc);
            analog_poles.push(scaled - disc);
        }

        // Bilinear transform. Zeros at s = 0 map to z = 1, the excess zeros to z = -1.
        let digital_poles: Vec<Complex<f64>> = analog_poles
            .iter()
            .map(|&p| (k + p) / (k - p))
            .collect();
        let denominator: Complex<f64> = analog_poles.iter().map(|&p| k - p).product();
        let gain = (Complex::new((bw * k).powi(corners as i32), 0.0) / denominator).re;

        let mut sections = Vec::with_capacity(corners);
        let mut real_poles = Vec::new();
        for p in digital_poles {
            if p.im > 1e-12 {
                sections.push(Section {
                    b: [1.0, 0.0, -1.0],
                    a: [-2.0 * p.re, p.norm_sqr()],
                });
            } else if p.im.abs() <= 1e-12 {
                real_poles.push(p.re);
            }
        }
        for pair in real_poles.chunks(2) {
            let (p1, p2) = (pair[0], pair.get(1).copied().unwrap_or(0.0));
            sections.push(Section {
                b: [1.0, 0.0, -1.0],
                a: [-(p1 + p2), p1 * p2],
            });
        }
        if let Some(first) = sections.first_mut() {
            for coeff in first.b.iter_mut() {
                *coeff *= gain;
            }
        }

        Ok(Self {
            sections,
            freq_min,
            freq_max,
            sampling_hz,
            corners,
        })
    }

    pub fn freq_min(&self) -> f64 {
        self.freq_min
    }

    pub fn freq_max(&self) -> f64 {
        self.freq_max
    }

    pub fn corners(&self) -> usize {
        self.corners
    }

    /// Single causal pass.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        let mut out = data.to_vec();
        for section in &self.sections {
            section.run(&mut out);
        }
        out
    }

    /// Forward pass, then a pass over the reversed output, reversed back.
    pub fn apply_zero_phase(&self, data: &[f64]) -> Vec<f64> {
        let mut out = self.apply(data);
        out.reverse();
        let mut out = self.apply(&out);
        out.reverse();
        out
    }

    /// Magnitude of the single-pass response at `freq_hz`.
    pub fn gain_at(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sampling_hz;
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .map(|section| section.response(z_inv))
            .product::<Complex<f64>>()
            .norm()
    }
}

fn prewarp(freq_hz: f64, sample_rate: f64) -> f64 {
    2.0 * sample_rate * (PI * freq_hz / sample_rate).tan()
}

fn butterworth_poles(order: usize) -> Vec<Complex<f64>> {
    (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex::new(theta.cos(), theta.sin())
        })
        .collect()
}
