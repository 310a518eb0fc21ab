use std::fs;
use std::path::Path;

use crate::error::DynError;

const HEADER_LEN: usize = 632;
const FLOAT_HEADER_LEN: usize = 70 * 4;
const INT_HEADER_OFFSET: usize = FLOAT_HEADER_LEN;
const CHAR_HEADER_OFFSET: usize = FLOAT_HEADER_LEN + 40 * 4;
const SAC_UNDEFINED: i32 = -12345;
const SAC_VERSION: i32 = 6;

// Word indices inside the float and integer header blocks.
const DELTA: usize = 0;
const NVHDR: usize = 6;
const NPTS: usize = 9;
const LEVEN: usize = 35;

// Byte offsets of the 8-character fields inside the character block.
const KSTNM: usize = 0;
const KCMPNM: usize = 160;
const KNETWK: usize = 168;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn word(bytes: &[u8], offset: usize) -> [u8; 4] {
        [
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]
    }

    fn f32_at(self, bytes: &[u8], offset: usize) -> f32 {
        let word = Self::word(bytes, offset);
        match self {
            ByteOrder::Little => f32::from_le_bytes(word),
            ByteOrder::Big => f32::from_be_bytes(word),
        }
    }

    fn i32_at(self, bytes: &[u8], offset: usize) -> i32 {
        let word = Self::word(bytes, offset);
        match self {
            ByteOrder::Little => i32::from_le_bytes(word),
            ByteOrder::Big => i32::from_be_bytes(word),
        }
    }
}

/// One evenly sampled SAC trace.
#[derive(Clone, Debug, PartialEq)]
pub struct SacTrace {
    pub station: String,
    pub network: String,
    pub channel: String,
    /// Sampling interval in seconds.
    pub delta: f64,
    pub samples: Vec<f64>,
}

impl SacTrace {
    /// Integer sampling rate `1 / delta`.
    pub fn sampling_hz(&self) -> Result<usize, DynError> {
        if self.delta <= 0.0 || !self.delta.is_finite() {
            return Err(format!("SAC delta must be positive, got {}", self.delta).into());
        }
        let rate = 1.0 / self.delta;
        let rounded = rate.round();
        if (rate - rounded).abs() > 1e-6 * rounded.max(1.0) || rounded < 1.0 {
            return Err(format!(
                "sampling rate {rate} Hz (delta {}) is not a whole number of Hz",
                self.delta
            )
            .into());
        }
        Ok(rounded as usize)
    }
}

pub fn read_sac(path: &Path) -> Result<SacTrace, DynError> {
    let bytes = fs::read(path)
        .map_err(|e| format!("Failed to read SAC file {}: {e}", path.display()))?;
    parse_sac(&bytes).map_err(|e| format!("{}: {e}", path.display()).into())
}

pub fn parse_sac(bytes: &[u8]) -> Result<SacTrace, DynError> {
    if bytes.len() < HEADER_LEN {
        return Err(format!(
            "SAC header needs {HEADER_LEN} bytes, file has {}",
            bytes.len()
        )
        .into());
    }

    let version_offset = INT_HEADER_OFFSET + NVHDR * 4;
    let order = if ByteOrder::Little.i32_at(bytes, version_offset) == SAC_VERSION {
        ByteOrder::Little
    } else if ByteOrder::Big.i32_at(bytes, version_offset) == SAC_VERSION {
        ByteOrder::Big
    } else {
        return Err("Not a SAC version 6 file (header version mismatch)".into());
    };

    let npts = order.i32_at(bytes, INT_HEADER_OFFSET + NPTS * 4);
    if npts < 0 {
        return Err(format!("SAC header declares a negative sample count ({npts})").into());
    }
    let npts = npts as usize;
    if order.i32_at(bytes, INT_HEADER_OFFSET + LEVEN * 4) == 0 {
        return Err("Unevenly sampled SAC files are not supported".into());
    }
    let delta = order.f32_at(bytes, DELTA * 4) as f64;

    let expected_len = HEADER_LEN + npts * 4;
    if bytes.len() < expected_len {
        return Err(format!(
            "SAC file truncated: header declares {npts} samples ({expected_len} bytes), found {} bytes",
            bytes.len()
        )
        .into());
    }

    let samples = (0..npts)
        .map(|idx| order.f32_at(bytes, HEADER_LEN + idx * 4) as f64)
        .collect();

    Ok(SacTrace {
        station: char_field(bytes, KSTNM),
        network: char_field(bytes, KNETWK),
        channel: char_field(bytes, KCMPNM),
        delta,
        samples,
    })
}

fn char_field(bytes: &[u8], offset: usize) -> String {
    let start = CHAR_HEADER_OFFSET + offset;
    let text = String::from_utf8_lossy(&bytes[start..start + 8]);
    let text = text.trim_end_matches('\0').trim();
    if text == SAC_UNDEFINED.to_string() {
        String::new()
    } else {
        text.to_string()
    }
}
