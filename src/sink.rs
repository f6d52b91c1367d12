// src/sink.rs
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::ingest::write_buckets;
use crate::pipeline::DatasetReport;

#[async_trait::async_trait]
pub trait SeriesSink: Send + Sync {
    /// Persist every width's counts and chart payload for one dataset.
    async fn store(&self, report: &DatasetReport) -> Result<()>;

    /// Where `dataset` lands, for sinks that can map two names onto one
    /// location. The batch driver refuses to run datasets that share a key.
    fn output_key(&self, _dataset: &str) -> Option<String> {
        None
    }
}

/// Writes `<dataset>_<w>s.csv` and `<dataset>_<kind>_<w>s.json` per width.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w.\-]+").unwrap());

/// Squash characters that are awkward in file names (spaces, slashes, quotes).
pub fn file_stem_for(dataset: &str) -> String {
    let s = RE_UNSAFE.replace_all(dataset.trim(), "_");
    let s = s.trim_matches('_');
    if s.is_empty() {
        "dataset".to_string()
    } else {
        s.to_string()
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Best-effort cleanup after a failed store.
async fn discard<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for p in paths {
        if let Err(e) = tokio::fs::remove_file(p).await {
            tracing::debug!(target: "sink", path = %p.display(), error = %e, "cleanup skipped");
        }
    }
}

#[async_trait::async_trait]
impl SeriesSink for FileSink {
    async fn store(&self, report: &DatasetReport) -> Result<()> {
        // Render everything first so a serialization failure writes nothing.
        let stem = file_stem_for(&report.dataset);
        let mut files: Vec<(PathBuf, Vec<u8>)> = Vec::with_capacity(report.widths.len() * 2);
        for w in &report.widths {
            let mut csv = Vec::new();
            write_buckets(&mut csv, &w.buckets)?;
            files.push((
                self.dir.join(format!("{stem}_{}s.csv", w.width_seconds)),
                csv,
            ));

            let json = serde_json::to_vec_pretty(&w.request)?;
            files.push((
                self.dir.join(format!(
                    "{stem}_{}_{}s.json",
                    w.request.kind, w.width_seconds
                )),
                json,
            ));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating output dir {}", self.dir.display()))?;

        // Stage under hidden names, then rename; any failure removes this
        // dataset's files so a CSV never appears without its JSON.
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
        for (path, bytes) in files {
            let tmp = staging_path(&path);
            if let Err(e) = tokio::fs::write(&tmp, bytes).await {
                discard(staged.iter().map(|(t, _)| t).chain([&tmp]).collect::<Vec<_>>()).await;
                return Err(e).with_context(|| format!("writing {}", path.display()));
            }
            staged.push((tmp, path));
        }

        for (i, (tmp, path)) in staged.iter().enumerate() {
            if let Err(e) = tokio::fs::rename(tmp, path).await {
                discard(staged[..i].iter().map(|(_, p)| p).collect::<Vec<_>>()).await;
                discard(staged[i..].iter().map(|(t, _)| t).collect::<Vec<_>>()).await;
                return Err(e).with_context(|| format!("writing {}", path.display()));
            }
        }
        Ok(())
    }

    fn output_key(&self, dataset: &str) -> Option<String> {
        Some(file_stem_for(dataset))
    }
}

// --- Test helper ---
pub struct MockSink {
    pub calls: std::sync::Mutex<Vec<DatasetReport>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn datasets(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|r| r.dataset.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SeriesSink for MockSink {
    async fn store(&self, report: &DatasetReport) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("mock sink mutex poisoned"))?
            .push(report.clone());
        Ok(())
    }
}
