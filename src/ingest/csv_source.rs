// src/ingest/csv_source.rs
use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::ingest::{discover_datasets, read_events};
use crate::ingest::types::{ChatMessage, ChatSource};

/// Loads `<dir>/<dataset>.csv` as written by the chat downloader. The
/// extension is matched case-insensitively, the same way discovery does.
#[derive(Debug, Clone)]
pub struct CsvChatSource {
    dir: PathBuf,
}

impl CsvChatSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, dataset: &str) -> PathBuf {
        let exact = self.dir.join(format!("{dataset}.csv"));
        if exact.is_file() {
            return exact;
        }
        discover_datasets(&self.dir)
            .ok()
            .and_then(|found| {
                found
                    .into_iter()
                    .find(|(name, _)| name == dataset)
                    .map(|(_, path)| path)
            })
            .unwrap_or(exact)
    }
}

#[async_trait::async_trait]
impl ChatSource for CsvChatSource {
    async fn load(&self, dataset: &str) -> Result<Vec<ChatMessage>> {
        let path = self.path_for(dataset);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading chat dataset {}", path.display()))?;
        read_events(bytes.as_slice())
            .with_context(|| format!("parsing chat dataset {}", path.display()))
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_by_dataset_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stream_a.csv"),
            "time_in_seconds,message\n0,hi\n5,yo\n",
        )
        .unwrap();

        let src = CsvChatSource::new(dir.path());
        let evs = src.load("stream_a").await.unwrap();
        assert_eq!(evs.len(), 2);
        assert_eq!(evs[1], ChatMessage::new(5.0, "yo"));

        let err = src.load("missing").await.unwrap_err();
        assert!(format!("{err:#}").contains("missing.csv"));
    }

    #[tokio::test]
    async fn upper_case_extension_is_found_under_its_discovered_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Stream.CSV"),
            "time_in_seconds,message\n0,hi\n",
        )
        .unwrap();

        let names: Vec<String> = discover_datasets(dir.path())
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Stream".to_string()]);

        let src = CsvChatSource::new(dir.path());
        assert_eq!(src.path_for("Stream"), dir.path().join("Stream.CSV"));
        assert_eq!(src.load("Stream").await.unwrap().len(), 1);
    }
}
