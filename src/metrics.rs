use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::timing::OPERATION_SECONDS;

pub const MESSAGES_TOTAL: &str = "chat_density_messages_total";
pub const BUCKETS_TOTAL: &str = "chat_density_buckets_total";
pub const DATASETS_FAILED_TOTAL: &str = "chat_density_datasets_failed_total";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// One-time metric descriptions (so series carry HELP lines).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(MESSAGES_TOTAL, "Chat messages read from datasets.");
        describe_counter!(BUCKETS_TOTAL, "Buckets emitted by the aggregator.");
        describe_counter!(
            DATASETS_FAILED_TOTAL,
            "Datasets skipped because loading, analysis or storing failed."
        );
        describe_histogram!(
            OPERATION_SECONDS,
            Unit::Seconds,
            "Wall time of aggregate/smooth/present operations."
        );
    });
}
