use noise_interferometry::estimator::lag_axis;
use noise_interferometry::{BandPass, CorrelationParams, Method, WindowStacker};

const WINDOW: usize = 1200;
const WINDOWS: usize = 8;
const DELAY: usize = 20;

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

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

/// Receiver sees the source wavefield `DELAY` samples later.
fn delayed_pair() -> (Vec<f64>, Vec<f64>) {
    let wavefield = noise(WINDOWS * WINDOW + DELAY, 2024);
    let source = wavefield[DELAY..].to_vec();
    let receiver = wavefield[..WINDOWS * WINDOW].to_vec();
    (source, receiver)
}

fn params() -> CorrelationParams {
    CorrelationParams {
        sampling_hz: 4,
        max_lag_s: 60,
        ..Default::default()
    }
}

#[test]
fn every_method_recovers_the_travel_time() {
    let (source, receiver) = delayed_pair();
    let stacker = WindowStacker::new(&source, &receiver, WINDOWS, params()).unwrap();
    let zero_lag = params().half_window();
    for method in Method::ALL {
        let result = stacker.stack(method, false).unwrap();
        assert_eq!(result.accepted, WINDOWS, "{method}");
        assert_eq!(result.stack.len(), 2 * zero_lag);
        assert_eq!(argmax(&result.stack), zero_lag + DELAY, "{method}");
    }

    let lags = lag_axis(zero_lag, 4);
    assert_eq!(lags[zero_lag + DELAY], DELAY as f64 / 4.0);
}

#[test]
fn spiky_window_is_dropped_and_filtered_peak_survives() {
    let (source, mut receiver) = delayed_pair();
    receiver[3 * WINDOW + 100] = 1.0e4;

    let stacker = WindowStacker::new(&source, &receiver, WINDOWS, params()).unwrap();
    let band = BandPass::butterworth(0.1, 0.5, 4.0, 4).unwrap();
    let zero_lag = params().half_window();

    let sequential = stacker.stack(Method::CrossCorrelation, false).unwrap();
    let parallel = stacker.stack(Method::CrossCorrelation, true).unwrap();
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.accepted, WINDOWS - 1);
    assert_eq!(sequential.rejected, 1);

    let filtered = band.apply_zero_phase(&sequential.stack);
    assert_eq!(filtered.len(), sequential.stack.len());
    let peak = argmax(&filtered);
    assert!(
        peak.abs_diff(zero_lag + DELAY) <= 2,
        "filtered peak at {peak}, expected near {}",
        zero_lag + DELAY
    );
}

#[test]
fn uncorrelated_records_show_no_dominant_lag() {
    let source = noise(WINDOWS * WINDOW, 1);
    let receiver = noise(WINDOWS * WINDOW, 2);
    let stacker = WindowStacker::new(&source, &receiver, WINDOWS, params()).unwrap();
    let (_, correlated) = delayed_pair();
    let reference = WindowStacker::new(&correlated[..], &correlated[..], WINDOWS, params())
        .unwrap()
        .stack(Method::CrossCorrelation, false)
        .unwrap();
    let result = stacker.stack(Method::CrossCorrelation, false).unwrap();

    let peak = |values: &[f64]| values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    assert!(peak(&result.stack) < 0.2 * peak(&reference.stack));
}
