//! Turns loaded logs and a metric selection into figures.
//!
//! Nothing here draws; `ui` renders figures in the terminal and `export`
//! writes them to image files.

use crate::viewer::logs::{LogEntry, Metrics, Variant};
use thiserror::Error;

pub const X_LABEL: &str = "Iterations";
pub const SIDE_BY_SIDE_TITLE: &str = "Side by Side";
pub const LOSS_TITLE: &str = "Loss";
pub const ACCURACY_TITLE: &str = "Accuracy";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

/// Style of a log's train series, indexed by log position.
pub const LOG_STYLES: [LineStyle; 4] = [
    LineStyle::Solid,
    LineStyle::Dashed,
    LineStyle::Dotted,
    LineStyle::DashDot,
];

#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub label: String,
    /// Index into `logs::PALETTE`.
    pub color: usize,
    pub style: LineStyle,
    /// y-values; x is the position.
    pub values: Vec<f64>,
}

impl Series {
    /// Runs of consecutive finite points. A NaN breaks the line.
    pub fn segments(&self) -> Vec<Vec<(f64, f64)>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for (x, &y) in self.values.iter().enumerate() {
            if y.is_finite() {
                current.push((x as f64, y));
            } else if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    pub title: String,
    pub series: Vec<Series>,
    pub grid: bool,
}

impl Panel {
    /// x and y ranges over all finite points, padded when degenerate.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for series in &self.series {
            for (x, &y) in series.values.iter().enumerate() {
                if y.is_finite() {
                    x_max = x_max.max(x as f64);
                    y_min = y_min.min(y);
                    y_max = y_max.max(y);
                }
            }
        }
        if !y_min.is_finite() {
            return None;
        }
        if y_max - y_min < f64::EPSILON {
            let pad = (y_min.abs() * 0.05).max(0.5);
            y_min -= pad;
            y_max += pad;
        }
        Some(([0.0, x_max.max(1.0)], [y_min, y_max]))
    }
}

/// One tab: a title and its panels, laid out horizontally.
#[derive(Clone, Debug, PartialEq)]
pub struct Figure {
    pub title: String,
    pub panels: Vec<Panel>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutOptions {
    pub separate_tabs: bool,
    pub grid: bool,
    pub side_by_side: bool,
    pub connect: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlotError {
    #[error("Load logs first.")]
    NoLogs,
    #[error("Select metrics.")]
    NoSelection,
}

pub fn build_figures(
    logs: &[LogEntry],
    metrics: &Metrics,
    selected: &[String],
    options: LayoutOptions,
) -> Result<Vec<Figure>, PlotError> {
    if logs.is_empty() {
        return Err(PlotError::NoLogs);
    }
    if selected.is_empty() {
        return Err(PlotError::NoSelection);
    }

    let connect = options.connect && logs.len() >= 2;
    let panel = |title: &str, group: &[&String]| Panel {
        title: title.to_string(),
        series: group
            .iter()
            .flat_map(|metric| metric_series(logs, metrics, metric, connect))
            .collect(),
        grid: options.grid,
    };
    let all: Vec<&String> = selected.iter().collect();

    let figures = if options.side_by_side {
        vec![Figure {
            title: SIDE_BY_SIDE_TITLE.to_string(),
            panels: all
                .iter()
                .map(|metric| panel(metric.as_str(), &[*metric]))
                .collect(),
        }]
    } else if options.separate_tabs {
        all.iter()
            .map(|metric| Figure {
                title: metric.to_string(),
                panels: vec![panel(metric.as_str(), &[*metric])],
            })
            .collect()
    } else {
        let (accuracy, loss): (Vec<&String>, Vec<&String>) = all
            .into_iter()
            .partition(|metric| metric.to_lowercase().contains("acc"));
        [(LOSS_TITLE, loss), (ACCURACY_TITLE, accuracy)]
            .into_iter()
            .filter(|(_, group)| !group.is_empty())
            .map(|(title, group)| Figure {
                title: title.to_string(),
                panels: vec![panel(title, group.as_slice())],
            })
            .collect()
    };
    Ok(figures)
}

fn metric_series(logs: &[LogEntry], metrics: &Metrics, metric: &str, connect: bool) -> Vec<Series> {
    let color = metrics.color_index(metric).unwrap_or(0);
    if connect {
        connected_series(logs, metric, color)
    } else {
        logs.iter()
            .enumerate()
            .flat_map(|(idx, log)| log_series(log, idx, metric, color))
            .collect()
    }
}

fn log_series(log: &LogEntry, idx: usize, metric: &str, color: usize) -> Vec<Series> {
    let series = |variant: Variant, style: LineStyle| {
        log.table.variant(variant, metric).map(|values| Series {
            label: format!("{}:{}", log.name, variant.column_name(metric)),
            color,
            style,
            values: values.to_vec(),
        })
    };

    let split: Vec<Series> = [
        series(Variant::Train, LOG_STYLES[idx % LOG_STYLES.len()]),
        series(Variant::Val, LineStyle::Dashed),
    ]
    .into_iter()
    .flatten()
    .collect();
    if split.is_empty() {
        series(Variant::Bare, LineStyle::Solid).into_iter().collect()
    } else {
        split
    }
}

fn connected_series(logs: &[LogEntry], metric: &str, color: usize) -> Vec<Series> {
    let concat = |variant: Variant, style: LineStyle| {
        let mut found = false;
        let mut values = Vec::new();
        for log in logs {
            if let Some(column) = log.table.variant(variant, metric) {
                found = true;
                values.extend_from_slice(column);
            }
        }
        found.then(|| Series {
            label: variant.column_name(metric),
            color,
            style,
            values,
        })
    };

    let split: Vec<Series> = [
        concat(Variant::Train, LineStyle::Solid),
        concat(Variant::Val, LineStyle::Dashed),
    ]
    .into_iter()
    .flatten()
    .collect();
    if split.is_empty() {
        concat(Variant::Bare, LineStyle::Solid).into_iter().collect()
    } else {
        split
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::logs::LogTable;
    use std::path::PathBuf;

    fn entry(name: &str, csv: &str) -> LogEntry {
        LogEntry {
            path: PathBuf::from(format!("{name}.csv")),
            name: name.to_string(),
            table: LogTable::from_reader(csv.as_bytes()).unwrap(),
        }
    }

    fn two_logs() -> Vec<LogEntry> {
        vec![
            entry("a", "epoch,train_loss,val_loss,train_acc\n0,1.0,1.2,0.1\n1,0.5,0.9,0.3\n"),
            entry("b", "epoch,train_loss,val_acc\n0,0.4,0.6\n"),
        ]
    }

    fn titles(figures: &[Figure]) -> Vec<&str> {
        figures.iter().map(|fig| fig.title.as_str()).collect()
    }

    fn labels(panel: &Panel) -> Vec<&str> {
        panel.series.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn nothing_loaded_or_selected_is_rejected() {
        let logs = two_logs();
        let metrics = Metrics::detect(&logs);
        let opts = LayoutOptions::default();
        assert_eq!(
            build_figures(&[], &metrics, &["loss".into()], opts),
            Err(PlotError::NoLogs)
        );
        assert_eq!(build_figures(&logs, &metrics, &[], opts), Err(PlotError::NoSelection));
        assert_eq!(PlotError::NoSelection.to_string(), "Select metrics.");
    }

    #[test]
    fn default_layout_splits_loss_and_accuracy() {
        let logs = two_logs();
        let metrics = Metrics::detect(&logs);
        let figures =
            build_figures(&logs, &metrics, metrics.names(), LayoutOptions::default()).unwrap();

        assert_eq!(titles(&figures), ["Loss", "Accuracy"]);
        assert_eq!(
            labels(&figures[0].panels[0]),
            ["a:train_loss", "a:val_loss", "b:train_loss"]
        );
        assert_eq!(labels(&figures[1].panels[0]), ["a:train_acc", "b:val_acc"]);
    }

    #[test]
    fn empty_default_figure_is_omitted() {
        let logs = two_logs();
        let metrics = Metrics::detect(&logs);
        let figures =
            build_figures(&logs, &metrics, &["loss".into()], LayoutOptions::default()).unwrap();
        assert_eq!(titles(&figures), ["Loss"]);
    }

    #[test]
    fn side_by_side_takes_precedence_over_tabs() {
        let logs = two_logs();
        let metrics = Metrics::detect(&logs);
        let opts = LayoutOptions {
            side_by_side: true,
            separate_tabs: true,
            grid: true,
            ..Default::default()
        };
        let figures = build_figures(&logs, &metrics, metrics.names(), opts).unwrap();

        assert_eq!(titles(&figures), ["Side by Side"]);
        let panels: Vec<&str> = figures[0].panels.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(panels, ["acc", "loss"]);
        assert!(figures[0].panels.iter().all(|p| p.grid));
    }

    #[test]
    fn separate_tabs_give_one_figure_per_metric() {
        let logs = two_logs();
        let metrics = Metrics::detect(&logs);
        let opts = LayoutOptions {
            separate_tabs: true,
            ..Default::default()
        };
        let figures = build_figures(&logs, &metrics, metrics.names(), opts).unwrap();
        assert_eq!(titles(&figures), ["acc", "loss"]);
    }

    #[test]
    fn every_metric_is_drawn_once_per_layout() {
        let logs = two_logs();
        let metrics = Metrics::detect(&logs);
        for (side_by_side, separate_tabs) in [(false, false), (true, false), (false, true)] {
            let opts = LayoutOptions {
                side_by_side,
                separate_tabs,
                ..Default::default()
            };
            let figures = build_figures(&logs, &metrics, metrics.names(), opts).unwrap();
            let loss_series = figures
                .iter()
                .flat_map(|fig| &fig.panels)
                .flat_map(|panel| &panel.series)
                .filter(|s| s.label == "a:train_loss")
                .count();
            assert_eq!(loss_series, 1);
        }
    }

    #[test]
    fn connect_concatenates_in_log_order() {
        let logs = vec![
            entry("a", "train_loss\n1.0\n0.5\n"),
            entry("b", "train_loss\n0.4\n"),
        ];
        let metrics = Metrics::detect(&logs);
        let opts = LayoutOptions {
            connect: true,
            ..Default::default()
        };
        let figures = build_figures(&logs, &metrics, &["loss".into()], opts).unwrap();

        let series = &figures[0].panels[0].series;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "train_loss");
        assert_eq!(series[0].style, LineStyle::Solid);
        assert_eq!(
            series[0].segments(),
            vec![vec![(0.0, 1.0), (1.0, 0.5), (2.0, 0.4)]]
        );
    }

    #[test]
    fn connect_needs_two_logs() {
        let logs = vec![entry("a", "train_loss\n1.0\n")];
        let metrics = Metrics::detect(&logs);
        let opts = LayoutOptions {
            connect: true,
            ..Default::default()
        };
        let figures = build_figures(&logs, &metrics, &["loss".into()], opts).unwrap();
        assert_eq!(figures[0].panels[0].series[0].label, "a:train_loss");
    }

    #[test]
    fn bare_columns_only_when_no_variant_exists() {
        let logs = vec![
            entry("a", "lr,train_lr\n0.1,0.2\n"),
            entry("b", "lr\n0.3\n"),
        ];
        let metrics = Metrics::detect(&logs);
        let figures =
            build_figures(&logs, &metrics, &["lr".into()], LayoutOptions::default()).unwrap();
        assert_eq!(labels(&figures[0].panels[0]), ["a:train_lr", "b:lr"]);

        let connected = build_figures(
            &logs,
            &metrics,
            &["lr".into()],
            LayoutOptions {
                connect: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(labels(&connected[0].panels[0]), ["train_lr"]);
    }

    #[test]
    fn train_style_cycles_with_log_index() {
        let logs: Vec<LogEntry> = (0..5)
            .map(|i| entry(&format!("run{i}"), "train_loss,val_loss\n1,2\n"))
            .collect();
        let metrics = Metrics::detect(&logs);
        let figures =
            build_figures(&logs, &metrics, &["loss".into()], LayoutOptions::default()).unwrap();
        let styles: Vec<LineStyle> = figures[0].panels[0]
            .series
            .iter()
            .filter(|s| s.label.ends_with("train_loss"))
            .map(|s| s.style)
            .collect();
        assert_eq!(
            styles,
            [
                LineStyle::Solid,
                LineStyle::Dashed,
                LineStyle::Dotted,
                LineStyle::DashDot,
                LineStyle::Solid
            ]
        );
        assert!(figures[0].panels[0]
            .series
            .iter()
            .filter(|s| s.label.ends_with("val_loss"))
            .all(|s| s.style == LineStyle::Dashed));
    }

    #[test]
    fn nan_breaks_segments_and_bounds_skip_it() {
        let series = Series {
            label: "x".into(),
            color: 0,
            style: LineStyle::Solid,
            values: vec![1.0, f64::NAN, 3.0, 2.0],
        };
        assert_eq!(series.segments(), vec![vec![(0.0, 1.0)], vec![(2.0, 3.0), (3.0, 2.0)]]);

        let panel = Panel {
            title: "x".into(),
            series: vec![series],
            grid: false,
        };
        assert_eq!(panel.bounds(), Some(([0.0, 3.0], [1.0, 3.0])));
    }

    #[test]
    fn flat_series_bounds_are_padded() {
        let panel = Panel {
            title: "x".into(),
            series: vec![Series {
                label: "x".into(),
                color: 0,
                style: LineStyle::Solid,
                values: vec![2.0],
            }],
            grid: false,
        };
        assert_eq!(panel.bounds(), Some(([0.0, 1.0], [1.5, 2.5])));
    }
}
