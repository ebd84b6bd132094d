use crate::viewer::{
    logs::PALETTE,
    plot::{Figure, LineStyle, Panel, X_LABEL},
};
use color_eyre::{Result, eyre::WrapErr};
use log::info;
use plotters::{
    coord::Shift,
    prelude::{
        BLACK, BitMapBackend, ChartBuilder, Color, DrawingArea, IntoDrawingArea, IntoFont,
        LineSeries, PathElement, RGBColor, SeriesLabelPosition, ShapeStyle, WHITE,
    },
    series::DashedLineSeries,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const IMAGE_SIZE: (u32, u32) = (800, 600);
pub const DEFAULT_EXTENSION: &str = ".png";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("Enter filename.")]
    EmptyName,
    #[error("Nothing to save, plot some metrics first.")]
    NothingRendered,
}

/// Splits a file name into base and extension (with its dot). A leading
/// dot does not start an extension; the extension defaults to `.png`.
pub fn split_file_name(name: &str) -> Result<(String, String), ExportError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ExportError::EmptyName);
    }
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            let base = &name[..name.len() - ext.len() - 1];
            Ok((base.to_string(), format!(".{ext}")))
        }
        None => Ok((name.to_string(), DEFAULT_EXTENSION.to_string())),
    }
}

/// `<dir>/<figure title>_<base><ext>` for each figure, in tab order.
pub fn export_paths(figures: &[Figure], dir: &Path, name: &str) -> Result<Vec<PathBuf>, ExportError> {
    let (base, ext) = split_file_name(name)?;
    if figures.is_empty() {
        return Err(ExportError::NothingRendered);
    }
    Ok(figures
        .iter()
        .map(|figure| dir.join(format!("{}_{base}{ext}", figure.title)))
        .collect())
}

/// Writes one image per figure and returns the written paths.
pub fn save_figures(figures: &[Figure], dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
    let paths = export_paths(figures, dir, name)?;
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create export directory {}", dir.display()))?;

    for (figure, path) in figures.iter().zip(&paths) {
        draw_figure(figure, path)
            .wrap_err_with(|| format!("failed to export {}", path.display()))?;
        info!("Saved {}", path.display());
    }
    Ok(paths)
}

fn draw_figure(figure: &Figure, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, IMAGE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(&figure.title, ("sans-serif", 24).into_font())?;

    let areas = root.split_evenly((1, figure.panels.len().max(1)));
    for (panel, area) in figure.panels.iter().zip(&areas) {
        draw_panel(panel, area)?;
    }
    root.present()?;
    Ok(())
}

fn draw_panel(
    panel: &Panel,
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
) -> Result<()> {
    let (x_range, y_range) = panel.bounds().unwrap_or(([0.0, 1.0], [0.0, 1.0]));
    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 18).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range[0]..x_range[1], y_range[0]..y_range[1])?;

    let mut mesh = chart.configure_mesh();
    if !panel.grid {
        mesh.disable_mesh();
    }
    mesh.x_desc(X_LABEL).draw()?;

    let mut labelled = false;
    for series in &panel.series {
        let (r, g, b) = PALETTE[series.color % PALETTE.len()];
        let color = RGBColor(r, g, b);
        let style = ShapeStyle::from(&color).stroke_width(2);

        for (idx, points) in series.segments().into_iter().enumerate() {
            let anno = match series.style {
                LineStyle::Solid => chart.draw_series(LineSeries::new(points, style))?,
                LineStyle::Dashed => chart.draw_series(DashedLineSeries::new(points, 8, 5, style))?,
                LineStyle::Dotted => chart.draw_series(DashedLineSeries::new(points, 2, 4, style))?,
                // plotters has no dash-dot pattern; long dashes with short gaps.
                LineStyle::DashDot => {
                    chart.draw_series(DashedLineSeries::new(points, 12, 3, style))?
                }
            };
            if idx == 0 {
                labelled = true;
                anno.label(series.label.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}
