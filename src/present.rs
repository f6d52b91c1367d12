//! # Series Presenter
//! Builds the inert [`RenderRequest`] payload handed to the chart renderer.
//!
//! Nothing here touches the filesystem; sinks decide where payloads go.
//! Display formatting (`H:MM:SS` ticks) lives in separate fields so numeric
//! x/y values stay exactly what the aggregator produced.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aggregate::Bucket;
use crate::smooth::{Boundary, SmoothedPoint};

pub const DEFAULT_X_LABEL: &str = "Time(s)";
pub const DEFAULT_Y_LABEL: &str = "Number of comments";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    #[default]
    Line,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChartKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            other => anyhow::bail!("unknown chart kind: {other} (expected bar|line)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl Labels {
    /// Standard titles used for the exported chart set.
    ///
    /// `sigma` is only mentioned for line charts, where smoothing applies.
    pub fn for_dataset(
        kind: ChartKind,
        dataset: &str,
        width_seconds: f64,
        sigma: Option<f64>,
    ) -> Self {
        let title = match (kind, sigma) {
            (ChartKind::Bar, _) => format!(
                "Bar graph of number of comments per [{width_seconds}s] for [{dataset}]"
            ),
            (ChartKind::Line, Some(sigma)) => format!(
                "Line graph (smoothened, sigma={sigma}) of number of comments per [{width_seconds}s] for [{dataset}]"
            ),
            (ChartKind::Line, None) => format!(
                "Line graph of number of comments per [{width_seconds}s] for [{dataset}]"
            ),
        };
        Self {
            title,
            x_label: DEFAULT_X_LABEL.to_string(),
            y_label: DEFAULT_Y_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Smoothing {
    pub sigma: f64,
    pub boundary: Boundary,
}

/// A chartable series plus the aggregation facts the renderer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub width_seconds: f64,
    pub smoothing: Option<Smoothing>,
}

impl Series {
    pub fn from_buckets(buckets: &[Bucket], width_seconds: f64) -> Self {
        Self {
            x: buckets.iter().map(|b| b.start_seconds).collect(),
            y: buckets.iter().map(|b| b.count as f64).collect(),
            width_seconds,
            smoothing: None,
        }
    }

    pub fn from_smoothed(points: &[SmoothedPoint], width_seconds: f64, sigma: f64) -> Self {
        Self {
            x: points.iter().map(|p| p.start_seconds).collect(),
            y: points.iter().map(|p| p.value).collect(),
            width_seconds,
            smoothing: Some(Smoothing {
                sigma,
                boundary: Boundary::Reflect,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentWarning {
    /// Nothing to draw; the request is still valid.
    EmptySeries,
}

/// Everything an external charting tool needs to draw one figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Display-only tick text for `x` (line charts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_tick_labels: Option<Vec<String>>,
    /// Bar width in x units (bar charts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar_width: Option<f64>,
    pub width_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoothing: Option<Smoothing>,
    #[serde(default)]
    pub warnings: Vec<PresentWarning>,
}

pub fn present(series: &Series, kind: ChartKind, labels: Labels) -> RenderRequest {
    let mut warnings = Vec::new();
    if series.is_empty() {
        tracing::warn!(
            target: "present",
            title = %labels.title,
            "empty series; emitting empty chart"
        );
        warnings.push(PresentWarning::EmptySeries);
    }

    let (x_tick_labels, bar_width) = match kind {
        ChartKind::Bar => (None, Some(series.width_seconds)),
        ChartKind::Line => (
            Some(series.x.iter().map(|&s| format_hms(s)).collect()),
            None,
        ),
    };

    RenderRequest {
        kind,
        title: labels.title,
        x_label: labels.x_label,
        y_label: labels.y_label,
        x: series.x.clone(),
        y: series.y.clone(),
        x_tick_labels,
        bar_width,
        width_seconds: series.width_seconds,
        smoothing: series.smoothing,
        warnings,
    }
}

/// `H:MM:SS` with unpadded hours; fractional seconds are truncated and
/// negative offsets keep a leading `-`.
pub fn format_hms(seconds: f64) -> String {
    if !seconds.is_finite() {
        return seconds.to_string();
    }
    let sign = if seconds < 0.0 { "-" } else { "" };
    let Some(d) = chrono::Duration::try_seconds(seconds.abs().trunc() as i64) else {
        return seconds.to_string();
    };
    format!(
        "{sign}{}:{:02}:{:02}",
        d.num_hours(),
        d.num_minutes() % 60,
        d.num_seconds() % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets() -> Vec<Bucket> {
        vec![
            Bucket {
                start_seconds: 0.0,
                count: 1,
            },
            Bucket {
                start_seconds: 3725.0,
                count: 9,
            },
        ]
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0.0), "0:00:00");
        assert_eq!(format_hms(59.9), "0:00:59");
        assert_eq!(format_hms(3725.0), "1:02:05");
        assert_eq!(format_hms(36_000.0), "10:00:00");
        assert_eq!(format_hms(-65.0), "-0:01:05");
    }

    #[test]
    fn bar_uses_width_and_keeps_numbers() {
        let s = Series::from_buckets(&buckets(), 60.0);
        let labels = Labels::for_dataset(ChartKind::Bar, "stream", 60.0, None);
        let req = present(&s, ChartKind::Bar, labels);
        assert_eq!(req.bar_width, Some(60.0));
        assert!(req.x_tick_labels.is_none());
        assert_eq!(req.x, vec![0.0, 3725.0]);
        assert_eq!(req.y, vec![1.0, 9.0]);
        assert_eq!(
            req.title,
            "Bar graph of number of comments per [60s] for [stream]"
        );
        assert!(req.warnings.is_empty());
    }

    #[test]
    fn line_adds_display_ticks_only() {
        let s = Series::from_buckets(&buckets(), 30.0);
        let labels = Labels::for_dataset(ChartKind::Line, "x", 30.0, Some(2.0));
        let req = present(&s, ChartKind::Line, labels);
        assert_eq!(req.x, vec![0.0, 3725.0]);
        assert_eq!(
            req.x_tick_labels,
            Some(vec!["0:00:00".to_string(), "1:02:05".to_string()])
        );
        assert!(req.bar_width.is_none());
        assert_eq!(
            req.title,
            "Line graph (smoothened, sigma=2) of number of comments per [30s] for [x]"
        );
    }

    #[test]
    fn empty_series_is_a_warning_not_an_error() {
        let s = Series::from_buckets(&[], 60.0);
        let labels = Labels::for_dataset(ChartKind::Line, "quiet", 60.0, None);
        let req = present(&s, ChartKind::Line, labels);
        assert!(req.x.is_empty() && req.y.is_empty());
        assert_eq!(req.x_tick_labels, Some(vec![]));
        assert_eq!(req.warnings, vec![PresentWarning::EmptySeries]);
    }

    #[test]
    fn smoothing_metadata_travels_with_the_request() {
        let pts = [SmoothedPoint {
            start_seconds: 10.0,
            value: 1.25,
        }];
        let s = Series::from_smoothed(&pts, 60.0, 2.0);
        let labels = Labels::for_dataset(ChartKind::Line, "d", 60.0, Some(2.0));
        let req = present(&s, ChartKind::Line, labels);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["smoothing"]["sigma"], 2.0);
        assert_eq!(json["smoothing"]["boundary"], "reflect");
        assert_eq!(json["kind"], "line");
        assert_eq!(json["y"][0], 1.25);
    }

    #[test]
    fn chart_kind_parsing() {
        assert_eq!("Bar".parse::<ChartKind>().unwrap(), ChartKind::Bar);
        assert_eq!(" line ".parse::<ChartKind>().unwrap(), ChartKind::Line);
        assert!("pie".parse::<ChartKind>().is_err());
    }
}
