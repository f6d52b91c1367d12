//! # Batch pipeline
//! Chat dataset → buckets → (smoothed) series → RenderRequest, for every
//! configured width, then into a [`SeriesSink`].
//!
//! [`analyze_dataset`] is pure and synchronous. [`run_batch`] fans datasets
//! out onto blocking threads (bounded by `concurrency`); a failing dataset is
//! logged and counted, the rest keep going. Datasets the sink would store
//! under the same name are all failed up front.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aggregate::{aggregate_with, Bucket};
use crate::config::AnalysisConfig;
use crate::error::DensityError;
use crate::ingest::types::{ChatMessage, ChatSource};
use crate::metrics::{
    ensure_metrics_described, BUCKETS_TOTAL, DATASETS_FAILED_TOTAL, MESSAGES_TOTAL,
};
use crate::present::{present, ChartKind, Labels, RenderRequest, Series};
use crate::sink::SeriesSink;
use crate::smooth::smooth_buckets;
use crate::timing::timed;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidthReport {
    pub width_seconds: f64,
    pub buckets: Vec<Bucket>,
    pub request: RenderRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub messages: usize,
    pub widths: Vec<WidthReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: Vec<String>,
    /// `(dataset, error chain)`
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub fn analyze_dataset(
    dataset: &str,
    events: &[ChatMessage],
    cfg: &AnalysisConfig,
) -> Result<DatasetReport, DensityError> {
    let mut widths = Vec::with_capacity(cfg.widths_seconds.len());

    for &width in &cfg.widths_seconds {
        let buckets = timed("aggregate", || aggregate_with(events, width, cfg.mode))?;

        let smoothing = cfg.chart_kind == ChartKind::Line && cfg.smooth;
        let series = if smoothing {
            let points = timed("smooth", || smooth_buckets(&buckets, cfg.sigma))?;
            Series::from_smoothed(&points, width, cfg.sigma)
        } else {
            Series::from_buckets(&buckets, width)
        };

        let labels = Labels::for_dataset(
            cfg.chart_kind,
            dataset,
            width,
            smoothing.then_some(cfg.sigma),
        );
        let request = timed("present", || present(&series, cfg.chart_kind, labels));

        widths.push(WidthReport {
            width_seconds: width,
            buckets,
            request,
        });
    }

    Ok(DatasetReport {
        dataset: dataset.to_string(),
        messages: events.len(),
        widths,
    })
}

async fn process_one(
    dataset: String,
    cfg: Arc<AnalysisConfig>,
    source: Arc<dyn ChatSource>,
    sink: Arc<dyn SeriesSink>,
) -> anyhow::Result<()> {
    let events = source.load(&dataset).await?;
    counter!(MESSAGES_TOTAL).increment(events.len() as u64);

    let name = dataset.clone();
    let report =
        tokio::task::spawn_blocking(move || analyze_dataset(&name, &events, &cfg)).await??;

    let buckets: usize = report.widths.iter().map(|w| w.buckets.len()).sum();
    counter!(BUCKETS_TOTAL).increment(buckets as u64);

    sink.store(&report).await
}

/// Split off datasets whose sink output key is shared with another dataset.
/// Returns `(runnable, rejected)`; rejected entries carry the reason.
fn split_output_collisions(
    datasets: Vec<String>,
    sink: &dyn SeriesSink,
) -> (Vec<String>, Vec<(String, String)>) {
    let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut unkeyed = Vec::new();
    for dataset in datasets {
        match sink.output_key(&dataset) {
            Some(key) => by_key.entry(key).or_default().push(dataset),
            None => unkeyed.push(dataset),
        }
    }

    let mut runnable = unkeyed;
    let mut rejected = Vec::new();
    for (key, names) in by_key {
        if names.len() == 1 {
            runnable.extend(names);
            continue;
        }
        let reason = format!(
            "output name `{key}` is shared by datasets {names:?}; rename one of them"
        );
        for name in names {
            rejected.push((name, reason.clone()));
        }
    }
    (runnable, rejected)
}

pub async fn run_batch(
    cfg: AnalysisConfig,
    mut datasets: Vec<String>,
    source: Arc<dyn ChatSource>,
    sink: Arc<dyn SeriesSink>,
) -> BatchSummary {
    ensure_metrics_described();
    let started_at = Utc::now();
    datasets.sort();
    datasets.dedup();
    let total = datasets.len();
    let limit = Arc::new(Semaphore::new(cfg.concurrency.max(1)));
    let cfg = Arc::new(cfg);

    tracing::info!(target: "pipeline", total, source = source.name(), "batch started");

    let (datasets, mut failed) = split_output_collisions(datasets, sink.as_ref());
    for (dataset, reason) in &failed {
        tracing::warn!(
            target: "pipeline",
            dataset = %dataset,
            reason = %reason,
            "dataset skipped"
        );
        counter!(DATASETS_FAILED_TOTAL).increment(1);
    }

    let mut set = JoinSet::new();
    let mut names = HashMap::with_capacity(datasets.len());
    for dataset in datasets {
        let limit = limit.clone();
        let cfg = cfg.clone();
        let source = source.clone();
        let sink = sink.clone();
        let name = dataset.clone();
        let handle = set.spawn(async move {
            // the semaphore is never closed
            let _permit = limit.acquire_owned().await;
            process_one(dataset, cfg, source, sink).await
        });
        names.insert(handle.id(), name);
    }

    let mut processed = Vec::new();
    while let Some(joined) = set.join_next_with_id().await {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let dataset = names
            .remove(&id)
            .unwrap_or_else(|| format!("<task {id}>"));
        match joined {
            Ok((_, Ok(()))) => {
                processed.push(dataset.clone());
                tracing::info!(
                    target: "pipeline",
                    dataset = %dataset,
                    done = processed.len() + failed.len(),
                    total,
                    "dataset done"
                );
            }
            Ok((_, Err(e))) => {
                tracing::warn!(
                    target: "pipeline",
                    dataset = %dataset,
                    error = ?e,
                    "dataset failed"
                );
                counter!(DATASETS_FAILED_TOTAL).increment(1);
                failed.push((dataset, format!("{e:#}")));
            }
            Err(e) => {
                tracing::warn!(
                    target: "pipeline",
                    dataset = %dataset,
                    error = %e,
                    "dataset task panicked"
                );
                counter!(DATASETS_FAILED_TOTAL).increment(1);
                failed.push((dataset, e.to_string()));
            }
        }
    }

    processed.sort();
    failed.sort();
    let summary = BatchSummary {
        started_at,
        finished_at: Utc::now(),
        processed,
        failed,
    };
    tracing::info!(
        target: "pipeline",
        processed = summary.processed.len(),
        failed = summary.failed.len(),
        "batch finished"
    );
    summary
}
