use std::path::PathBuf;

use clap::Parser;

use noise_interferometry::estimator::{
    Method, DEFAULT_MAX_LAG_S, DEFAULT_STAB, DEFAULT_STD_CONTROL,
};
use noise_interferometry::filter::{DEFAULT_CORNERS, DEFAULT_FREQ_MAX_HZ, DEFAULT_FREQ_MIN_HZ};
use noise_interferometry::stack::DEFAULT_WINDOWS;

pub const DEFAULT_OUTPUT: &str = "figures/interferometry.png";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Ambient-noise interferometry between a virtual source and a receiver",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  noise_interferometry --source data/ST01.BHZ.sac --receiver data/ST02.BHZ.sac\n  noise_interferometry --virt ST01.sac --rec ST02.sac --methods coherency,deconvolution --lag 60\n  noise_interferometry --source ST01.sac --receiver ST02.sac --windows 24 --freq-min 0.05 --freq-max 0.3 --cpu 8\n"
)]
pub struct Args {
    /// SAC record of the virtual source station
    #[arg(long, visible_alias = "virt")]
    pub source: PathBuf,

    /// SAC record of the receiver station
    #[arg(long, visible_alias = "rec")]
    pub receiver: PathBuf,

    /// Comma-separated estimators to stack (one panel each)
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = Method::ALL
    )]
    pub methods: Vec<Method>,

    /// Maximum lag kept on each side of zero (seconds)
    #[arg(long, default_value_t = DEFAULT_MAX_LAG_S)]
    pub lag: usize,

    /// Number of equal windows each record is cut into
    #[arg(long, default_value_t = DEFAULT_WINDOWS)]
    pub windows: usize,

    /// Reject a window whose peak reaches this many standard deviations
    #[arg(long = "std-control", default_value_t = DEFAULT_STD_CONTROL)]
    pub std_control: f64,

    /// Half-width (bins) of the spectral smoother used by deconvolution and coherency
    #[arg(long, default_value_t = DEFAULT_STAB)]
    pub stab: usize,

    /// Lower corner of the display band-pass (Hz)
    #[arg(long = "freq-min", default_value_t = DEFAULT_FREQ_MIN_HZ)]
    pub freq_min: f64,

    /// Upper corner of the display band-pass (Hz)
    #[arg(long = "freq-max", default_value_t = DEFAULT_FREQ_MAX_HZ)]
    pub freq_max: f64,

    /// Butterworth order of the display band-pass
    #[arg(long, default_value_t = DEFAULT_CORNERS)]
    pub corners: usize,

    /// Output PNG path
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Worker threads for per-window estimation (1 runs sequentially)
    #[arg(long, default_value_t = 1)]
    pub cpu: usize,

    /// Log every rejected window
    #[arg(long)]
    pub debug: bool,
}
