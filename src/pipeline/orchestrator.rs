//! Per-chunk model orchestration.
//!
//! Drives chunks strictly in index order, one inference call in flight:
//! the abort-on-failure policy and the overlap stitch both need chunk i
//! resolved before chunk i+1 is dispatched. Every completion passes the
//! post-scan before it is accepted; a rejected or failed chunk never
//! contributes raw model output downstream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;

use super::chunking::Chunk;
use super::inference::{ChatCompletion, InferenceError};
use super::postscan::post_scan;
use super::premask::{MaskMap, PatternProfile};
use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::recorder::{ChunkRecord, RunRecorder};

const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Success,
    Failed,
}

/// Validation policy for chunk failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Any post-scan finding or inference failure aborts the whole run.
    Strict,
    /// Failures degrade to the sentinel marker; the run continues but is
    /// reported as errored.
    Lax,
}

/// Outcome of one chunk. `output` is present only for validated successes.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkResult {
    pub chunk_index: usize,
    pub status: ChunkStatus,
    #[serde(skip_serializing)]
    pub output: Option<String>,
    pub retries_used: u32,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ChunkResult {
    pub fn is_failed(&self) -> bool {
        self.status == ChunkStatus::Failed
    }
}

/// How the chunk loop ended. Results are always in index order and cover a
/// prefix of the chunk list.
#[derive(Debug)]
pub enum OrchestratorOutcome {
    Completed(Vec<ChunkResult>),
    /// Strict policy hit a failure; the failing chunk is the last result.
    Aborted(Vec<ChunkResult>),
    /// Cooperative cancellation between chunks.
    Cancelled(Vec<ChunkResult>),
}

/// Process all chunks sequentially. Each chunk event is appended to the
/// recorder as it completes; `progress` receives (completed, total, message)
/// after every chunk.
#[allow(clippy::too_many_arguments)]
pub fn process_chunks(
    chunks: &[Chunk],
    mask_map: &MaskMap,
    profiles: &[PatternProfile],
    client: &dyn ChatCompletion,
    recorder: &RunRecorder,
    policy: Policy,
    cancel: &AtomicBool,
    mut progress: impl FnMut(usize, usize, &str),
) -> OrchestratorOutcome {
    let total = chunks.len();
    let mut results: Vec<ChunkResult> = Vec::with_capacity(total);

    for chunk in chunks {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!(
                next_chunk = chunk.index,
                "Cancellation requested, stopping between chunks"
            );
            return OrchestratorOutcome::Cancelled(results);
        }

        tracing::info!(
            chunk = chunk.index + 1,
            total,
            chars = chunk.text.len(),
            tokens = chunk.token_len(),
            "Processing chunk"
        );

        let started = Instant::now();
        let mut output_preview = None;

        let result = match client.generate(SYSTEM_PROMPT, build_user_prompt(chunk)) {
            Ok(generation) => {
                let findings = post_scan(&chunk.text, &generation.text, mask_map, profiles);
                if findings.is_empty() {
                    output_preview = Some(preview_of(&generation.text));
                    ChunkResult {
                        chunk_index: chunk.index,
                        status: ChunkStatus::Success,
                        output: Some(generation.text),
                        retries_used: generation.retries_used,
                        duration_seconds: started.elapsed().as_secs_f64(),
                        error_detail: None,
                    }
                } else {
                    let detail = findings
                        .iter()
                        .map(|f| f.detail.as_str())
                        .collect::<Vec<_>>()
                        .join("; ");
                    tracing::warn!(
                        chunk = chunk.index,
                        findings = findings.len(),
                        detail = %detail,
                        "Post-scan rejected chunk output"
                    );
                    ChunkResult {
                        chunk_index: chunk.index,
                        status: ChunkStatus::Failed,
                        output: None,
                        retries_used: generation.retries_used,
                        duration_seconds: started.elapsed().as_secs_f64(),
                        error_detail: Some(detail),
                    }
                }
            }
            Err(e) => {
                tracing::error!(chunk = chunk.index, error = %e, "Inference failed for chunk");
                ChunkResult {
                    chunk_index: chunk.index,
                    status: ChunkStatus::Failed,
                    output: None,
                    retries_used: retries_from_error(&e),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    error_detail: Some(e.to_string()),
                }
            }
        };

        let record = chunk_record(chunk, &result, total, output_preview);
        if let Err(e) = recorder.record_chunk(&record) {
            tracing::warn!(chunk = chunk.index, error = %e, "Failed to append chunk record");
        }

        let failed = result.is_failed();
        results.push(result);
        progress(
            chunk.index + 1,
            total,
            &format!("Chunk {}/{} procesado", chunk.index + 1, total),
        );

        if failed && policy == Policy::Strict {
            return OrchestratorOutcome::Aborted(results);
        }
    }

    OrchestratorOutcome::Completed(results)
}

fn retries_from_error(e: &InferenceError) -> u32 {
    match e {
        InferenceError::RetriesExhausted { attempts, .. } => attempts.saturating_sub(1),
        _ => 0,
    }
}

fn preview_of(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let mut preview: String = flat.chars().take(PREVIEW_CHARS).collect();
    preview = preview.trim().to_string();
    if flat.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn chunk_record(
    chunk: &Chunk,
    result: &ChunkResult,
    total: usize,
    output_preview: Option<String>,
) -> ChunkRecord {
    let output_len = result.output.as_deref().map(str::len).unwrap_or(0);
    ChunkRecord {
        chunk_index: chunk.index,
        total_chunks: total,
        status: result.status,
        char_length: chunk.text.len(),
        output_char_length: output_len,
        char_delta: output_len as i64 - chunk.text.len() as i64,
        length_ratio: if chunk.text.is_empty() {
            None
        } else {
            Some(output_len as f64 / chunk.text.len() as f64)
        },
        token_length: chunk.token_len(),
        duration_seconds: result.duration_seconds,
        retries_used: result.retries_used,
        error_detail: result.error_detail.clone(),
        input_preview: Some(chunk.preview(PREVIEW_CHARS)),
        output_preview,
    }
}
