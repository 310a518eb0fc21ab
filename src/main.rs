mod args;

use std::collections::HashSet;
use std::fs;
use std::time::Instant;

use clap::Parser;
use log::{debug, warn};

use noise_interferometry::estimator::lag_axis;
use noise_interferometry::plot::{plot_stacked_panels, Panel};
use noise_interferometry::{
    read_sac, BandPass, CorrelationParams, DynError, Method, SacTrace, StackResult, WindowStacker,
};

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// `NET.STA.CHN`, skipping undefined header fields.
fn station_label(trace: &SacTrace) -> String {
    let parts: Vec<&str> = [&trace.network, &trace.station, &trace.channel]
        .into_iter()
        .map(String::as_str)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        "(unnamed)".to_string()
    } else {
        parts.join(".")
    }
}

/// Both records must share sampling interval and length before windowing.
fn check_record_pair(source: &SacTrace, receiver: &SacTrace) -> Result<usize, DynError> {
    if (source.delta - receiver.delta).abs() > 1e-9 * source.delta.abs() {
        return Err(format!(
            "Sampling intervals differ: source {} s, receiver {} s",
            source.delta, receiver.delta
        )
        .into());
    }
    if source.samples.len() != receiver.samples.len() {
        return Err(format!(
            "Record lengths differ: source {} samples, receiver {} samples",
            source.samples.len(),
            receiver.samples.len()
        )
        .into());
    }
    source.sampling_hz()
}

fn unique_methods(requested: &[Method]) -> Vec<Method> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|method| {
            let first = seen.insert(*method);
            if !first {
                warn!("{method} requested more than once; plotting it once");
            }
            first
        })
        .collect()
}

fn main() -> Result<(), DynError> {
    let args = args::Args::parse();
    init_logging(args.debug);

    if args.cpu == 0 {
        return Err("--cpu must be at least 1".into());
    }
    let available_cores = std::thread::available_parallelism()?.get();
    if args.cpu > available_cores {
        return Err(format!(
            "--cpu value ({}) exceeds the number of available cores ({})",
            args.cpu, available_cores
        )
        .into());
    }
    let methods = unique_methods(&args.methods);
    if methods.is_empty() {
        return Err("--methods must name at least one estimator".into());
    }

    let source = read_sac(&args.source)?;
    let receiver = read_sac(&args.receiver)?;
    let sampling_hz = check_record_pair(&source, &receiver)?;

    let params = CorrelationParams {
        sampling_hz,
        max_lag_s: args.lag,
        std_control: args.std_control,
        stab: args.stab,
    };
    params.validate()?;
    let band = BandPass::butterworth(args.freq_min, args.freq_max, sampling_hz as f64, args.corners)?;

    let parallel = args.cpu > 1;
    if parallel {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.cpu)
            .build_global()
            .map_err(|_| "Failed to initialise rayon thread pool")?;
    }

    let stacker = WindowStacker::new(&source.samples, &receiver.samples, args.windows, params)?;
    let record_seconds = source.samples.len() as f64 * source.delta;

    println!("Starting ambient-noise interferometry with the following arguments:");
    println!("--------------------------------------------------");
    println!(
        "  source:     {} ({}, {} samples, {:.1} s)",
        args.source.display(),
        station_label(&source),
        source.samples.len(),
        record_seconds
    );
    println!(
        "  receiver:   {} ({}, {} samples)",
        args.receiver.display(),
        station_label(&receiver),
        receiver.samples.len()
    );
    println!("  sampling:   {} Hz", sampling_hz);
    println!(
        "  windows:    {} x {} samples ({:.1} s each)",
        stacker.windows(),
        stacker.window_len(),
        stacker.window_len() as f64 / sampling_hz as f64
    );
    println!("  lag:        +/-{} s ({} samples)", args.lag, params.half_window());
    println!("  std_ctrl:   {}", args.std_control);
    println!("  stab:       {} bins", args.stab);
    println!(
        "  band-pass:  {}-{} Hz, {} corners, zero phase",
        band.freq_min(),
        band.freq_max(),
        band.corners()
    );
    println!(
        "  methods:    {}",
        methods
            .iter()
            .map(|method| method.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  cpu:        {}", args.cpu);
    println!("  output:     {}", args.output.display());
    println!("--------------------------------------------------");

    let started = Instant::now();
    let mut results: Vec<StackResult> = Vec::with_capacity(methods.len());
    for &method in &methods {
        println!("[info] Stacking {}...", method.label());
        let mut result = stacker.stack(method, parallel)?;
        if result.accepted == 0 {
            println!("[warn] {}: every window was rejected; panel will be flat.", method.label());
        }
        result.stack = band.apply_zero_phase(&result.stack);
        results.push(result);
    }
    debug!("stacking finished in {:.2?}", started.elapsed());

    let lags_s = lag_axis(params.half_window(), sampling_hz);
    let panels: Vec<Panel<'_>> = results
        .iter()
        .map(|result| Panel {
            caption: result.method.label(),
            data: &result.stack,
        })
        .collect();
    let title = format!(
        "Band-pass filter: {}-{} Hz",
        band.freq_min(),
        band.freq_max()
    );

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    plot_stacked_panels(&lags_s, &panels, &title, &args.output)?;

    println!("--------------------------------------------------");
    for result in &results {
        println!(
            "  {:<18} accepted {:>3} / rejected {:>3}",
            result.method.label(),
            result.accepted,
            result.rejected
        );
    }
    println!("--------------------------------------------------");
    println!("Figure saved as {}", args.output.display());
    Ok(())
}
