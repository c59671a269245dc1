//! Per-run structured records.
//!
//! One recorder per run, owning two files under the configured logs
//! directory: `run_{id}.jsonl` gets one record appended per chunk event as it
//! happens (a crash still leaves a usable trail), `run_summary_{id}.json` is
//! written once at completion. Content previews are stripped unless the
//! debug flag is set; the log surface is lower-trust than the document path,
//! so the default is metadata only.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::pipeline::orchestrator::ChunkStatus;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("cannot prepare logs directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write run record: {0}")]
    Write(#[from] std::io::Error),

    #[error("cannot encode run record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One line of the per-chunk log.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub status: ChunkStatus,
    pub char_length: usize,
    pub output_char_length: usize,
    pub char_delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_ratio: Option<f64>,
    pub token_length: usize,
    pub duration_seconds: f64,
    pub retries_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
}

#[derive(Serialize)]
struct Timestamped<'a, T: Serialize> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    record: &'a T,
}

/// Owns the log and summary files for exactly one run id. Concurrent runs
/// must use distinct run ids and therefore never share a file.
pub struct RunRecorder {
    run_id: String,
    log_path: PathBuf,
    summary_path: PathBuf,
    debug_content: bool,
}

impl RunRecorder {
    pub fn create(
        logs_dir: &Path,
        run_id: &str,
        debug_content: bool,
    ) -> Result<Self, RecorderError> {
        fs::create_dir_all(logs_dir).map_err(|source| RecorderError::CreateDir {
            path: logs_dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            run_id: run_id.to_string(),
            log_path: logs_dir.join(format!("run_{run_id}.jsonl")),
            summary_path: logs_dir.join(format!("run_summary_{run_id}.json")),
            debug_content,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    /// Append one chunk record, flushed immediately. Previews are dropped
    /// here unless the debug flag permits content in the logs.
    pub fn record_chunk(&self, record: &ChunkRecord) -> Result<(), RecorderError> {
        let mut record = record.clone();
        if !self.debug_content {
            record.input_preview = None;
            record.output_preview = None;
        }

        let line = serde_json::to_string(&Timestamped {
            timestamp: Utc::now(),
            record: &record,
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Write the run summary. Called exactly once, for every outcome.
    pub fn finalize<T: Serialize>(&self, summary: &T) -> Result<(), RecorderError> {
        let body = serde_json::to_string_pretty(&Timestamped {
            timestamp: Utc::now(),
            record: summary,
        })?;
        fs::write(&self.summary_path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(index: usize) -> ChunkRecord {
        ChunkRecord {
            chunk_index: index,
            total_chunks: 3,
            status: ChunkStatus::Success,
            char_length: 120,
            output_char_length: 118,
            char_delta: -2,
            length_ratio: Some(0.9833),
            token_length: 40,
            duration_seconds: 1.25,
            retries_used: 0,
            error_detail: None,
            input_preview: Some("El Sr. [NOMBRE APELLIDO]...".into()),
            output_preview: Some("El Sr. [NOMBRE APELLIDO]...".into()),
        }
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RunRecorder::create(dir.path(), "20260807_120000", false).unwrap();

        recorder.record_chunk(&sample_record(0)).unwrap();
        recorder.record_chunk(&sample_record(1)).unwrap();

        let content = fs::read_to_string(recorder.log_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["timestamp"].is_string());
            assert!(value["chunk_index"].is_number());
        }
    }

    #[test]
    fn previews_stripped_without_debug_flag() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RunRecorder::create(dir.path(), "run1", false).unwrap();
        recorder.record_chunk(&sample_record(0)).unwrap();

        let content = fs::read_to_string(recorder.log_path()).unwrap();
        assert!(!content.contains("input_preview"));
        assert!(!content.contains("output_preview"));
    }

    #[test]
    fn previews_kept_with_debug_flag() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RunRecorder::create(dir.path(), "run2", true).unwrap();
        recorder.record_chunk(&sample_record(0)).unwrap();

        let content = fs::read_to_string(recorder.log_path()).unwrap();
        assert!(content.contains("input_preview"));
    }

    #[test]
    fn finalize_writes_summary_with_timestamp() {
        #[derive(Serialize)]
        struct Summary {
            status: &'static str,
        }

        let dir = tempfile::tempdir().unwrap();
        let recorder = RunRecorder::create(dir.path(), "run3", false).unwrap();
        recorder.finalize(&Summary { status: "success" }).unwrap();

        let content = fs::read_to_string(recorder.summary_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["status"], "success");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn distinct_run_ids_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = RunRecorder::create(dir.path(), "a", false).unwrap();
        let b = RunRecorder::create(dir.path(), "b", false).unwrap();
        assert_ne!(a.log_path(), b.log_path());
        assert_ne!(a.summary_path(), b.summary_path());
    }

    #[test]
    fn creates_missing_logs_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("deep");
        let recorder = RunRecorder::create(&nested, "run4", false).unwrap();
        recorder.record_chunk(&sample_record(0)).unwrap();
        assert!(recorder.log_path().exists());
    }
}
