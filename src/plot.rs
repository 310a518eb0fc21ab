use std::path::Path;

use plotters::prelude::*;

use crate::error::DynError;

const PLOT_FONT_SCALE: f64 = 1.2;
const PANEL_WIDTH: u32 = 900;
const PANEL_HEIGHT: u32 = 260;

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

/// One stacked waveform to draw in its own panel.
pub struct Panel<'a> {
    pub caption: &'a str,
    pub data: &'a [f64],
}

/// Symmetric y range around the largest absolute value, padded by 10 %.
fn symmetric_range(data: &[f64]) -> (f64, f64) {
    let peak = data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if peak > 0.0 && peak.is_finite() {
        (-1.1 * peak, 1.1 * peak)
    } else {
        (-1.0, 1.0)
    }
}

/// Draw every panel against the shared lag axis, stacked vertically in one PNG.
pub fn plot_stacked_panels(
    lags_s: &[f64],
    panels: &[Panel<'_>],
    title: &str,
    filename: &Path,
) -> Result<(), DynError> {
    if panels.is_empty() {
        return Err("No panels provided to plot".into());
    }
    if lags_s.is_empty() {
        return Err("No data points to plot".into());
    }
    for panel in panels {
        if panel.data.len() != lags_s.len() {
            return Err(format!(
                "Panel '{}' has {} samples but the lag axis has {}",
                panel.caption,
                panel.data.len(),
                lags_s.len()
            )
            .into());
        }
    }

    let height = PANEL_HEIGHT * panels.len() as u32 + 60;
    let root = BitMapBackend::new(filename, (PANEL_WIDTH, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", scaled_font_size(24)).into_font())?;

    let x_min = lags_s[0];
    let x_max = lags_s[lags_s.len() - 1];
    let areas = root.split_evenly((panels.len(), 1));

    for (area, panel) in areas.iter().zip(panels) {
        let (min_val, max_val) = symmetric_range(panel.data);
        let mut chart = ChartBuilder::on(area)
            .caption(panel.caption, ("sans-serif", scaled_font_size(18)).into_font())
            .margin(8)
            .x_label_area_size(scaled_area_size(30))
            .y_label_area_size(scaled_area_size(60))
            .build_cartesian_2d(x_min..x_max, min_val..max_val)?;

        chart
            .configure_mesh()
            .x_desc("Lag (s)")
            .y_desc("Amplitude")
            .label_style(("sans-serif", scaled_font_size(12)).into_font())
            .axis_desc_style(("sans-serif", scaled_font_size(14)).into_font())
            .light_line_style(WHITE.mix(0.0))
            .draw()?;

        chart.draw_series(LineSeries::new(
            lags_s.iter().zip(panel.data.iter()).map(|(x, y)| (*x, *y)),
            &BLUE,
        ))?;
    }

    root.present()?;
    Ok(())
}
