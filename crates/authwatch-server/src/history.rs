use anyhow::Context;
use async_trait::async_trait;
use authwatch_common::types::AlertRecord;
use authwatch_notify::AlertHistorySink;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends fired alerts to a JSON-lines file, one record per line.
pub struct JsonlHistorySink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Reads back every record. A missing file is an empty history; lines
    /// that fail to parse are skipped with a warning.
    pub async fn load(&self) -> anyhow::Result<Vec<AlertRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AlertRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(line = idx + 1, error = %e, "Skipping malformed history line");
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AlertHistorySink for JsonlHistorySink {
    async fn record(&self, alert: &AlertRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(alert)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authwatch_common::types::{Severity, ThresholdRule};
    use chrono::{TimeZone, Utc};

    fn record(metric_id: &str, value: f64) -> AlertRecord {
        let rule = ThresholdRule::new(metric_id, 5.0, 300, Severity::Critical, "brute force");
        let fired_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        AlertRecord::from_rule(&rule, value, fired_at)
    }

    #[tokio::test]
    async fn records_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlHistorySink::new(dir.path().join("nested/history.jsonl"));

        sink.record(&record("login_failures_per_user", 6.0)).await.unwrap();
        sink.record(&record("login_failures_per_user", 9.0)).await.unwrap();

        let records = sink.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, 6.0);
        assert_eq!(records[1].value, 9.0);
        assert_ne!(records[0].id, records[1].id);
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlHistorySink::new(dir.path().join("absent.jsonl"));
        assert!(sink.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record("x", 1.0)).unwrap();
        tokio::fs::write(&path, format!("{good}\nnot json\n\n"))
            .await
            .unwrap();

        let records = JsonlHistorySink::new(&path).load().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric_id, "x");
    }
}
