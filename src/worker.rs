//! Per-document run driver.
//!
//! `run_document` walks the whole pipeline for one file: health probe,
//! extraction, pre-masking, chunking, the sequential chunk loop, merge,
//! validation and artifacts, always finishing with a written summary no
//! matter how the run ends. `spawn_run` puts that on a background thread
//! with a one-way event channel out and a cancellation flag in, so a long
//! multi-chunk job never blocks the front-end and the pipeline stays
//! testable without any UI attached.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::extract::{DocumentFormat, ExtractError, TextExtractor};
use crate::pipeline::chunking::{build_chunks, ChunkingError};
use crate::pipeline::inference::{ChatCompletion, InferenceError};
use crate::pipeline::merge::merge_chunks;
use crate::pipeline::orchestrator::{
    process_chunks, ChunkResult, ChunkStatus, OrchestratorOutcome, Policy,
};
use crate::pipeline::premask::{pre_mask, DEFAULT_PROFILES};
use crate::pipeline::tokenize::tokenize_with_spans;
use crate::pipeline::validate::{render_html_diff, validate_output, ValidationReport};
use crate::recorder::RunRecorder;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Run-level failures. Everything here is fatal for the run; per-chunk
/// trouble is data in the chunk results, not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(InferenceError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("run aborted: chunk {failed_index} of {total} failed validation")]
    Aborted { failed_index: usize, total: usize },

    #[error("cannot write output document: {0}")]
    WriteOutput(std::io::Error),
}

// ---------------------------------------------------------------------------
// Events and control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Health,
    Extraction,
    Premask,
    Chunking,
    Inference,
    Merge,
    Validation,
    Artifacts,
}

/// Events streamed to whatever observes the run (GUI or HTTP handler).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: String,
        source_file: String,
    },
    Progress {
        stage: Stage,
        completed: usize,
        total: usize,
        message: String,
    },
    Log {
        level: String,
        message: String,
    },
    Completed {
        summary: RunSummary,
    },
}

/// Cooperative cancellation, checked between chunks only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn as_atomic(&self) -> &AtomicBool {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
    Cancelled,
}

/// Final record of a run; serialized verbatim as the summary file.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub source_file: String,
    pub status: RunStatus,
    pub output_file: Option<String>,
    pub diff_report_file: Option<String>,
    pub total_chunks: usize,
    pub failed_chunks: Vec<usize>,
    pub masked_items: usize,
    pub processing_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub chunks: Vec<ChunkResult>,
    pub config: Config,
}

/// Timestamp plus a random tail so concurrent runs never share an id (and
/// therefore never share recorder files).
pub fn new_run_id() -> String {
    let now = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let tail = uuid::Uuid::new_v4().simple().to_string();
    format!("{now}_{}", &tail[..8])
}

fn emit(events: &Sender<RunEvent>, event: RunEvent) {
    // The observer may be gone; the run does not care.
    let _ = events.send(event);
}

fn progress(events: &Sender<RunEvent>, stage: Stage, completed: usize, total: usize, message: &str) {
    emit(
        events,
        RunEvent::Progress {
            stage,
            completed,
            total,
            message: message.to_string(),
        },
    );
}

fn log_event(events: &Sender<RunEvent>, level: &str, message: String) {
    emit(
        events,
        RunEvent::Log {
            level: level.to_string(),
            message,
        },
    );
}

fn output_path(source: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    source.with_file_name(format!("{stem}_anonimizado.txt"))
}

fn diff_report_path(source: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    source.with_file_name(format!("{stem}_comparacion.html"))
}

// ---------------------------------------------------------------------------
// Run driver
// ---------------------------------------------------------------------------

/// Run the full pipeline for one document. Always returns a summary and
/// always finalizes the recorder, whatever the outcome.
#[allow(clippy::too_many_arguments)]
pub fn run_document(
    config: &Config,
    run_id: &str,
    source: &Path,
    format: DocumentFormat,
    extractor: &dyn TextExtractor,
    client: &dyn ChatCompletion,
    events: &Sender<RunEvent>,
    cancel: &CancelFlag,
) -> RunSummary {
    let started = Instant::now();
    tracing::info!(run_id, source = %source.display(), "Anonymization run starting");

    emit(
        events,
        RunEvent::Started {
            run_id: run_id.to_string(),
            source_file: source.display().to_string(),
        },
    );

    let mut summary = RunSummary {
        run_id: run_id.to_string(),
        source_file: source.display().to_string(),
        status: RunStatus::Error,
        output_file: None,
        diff_report_file: None,
        total_chunks: 0,
        failed_chunks: Vec::new(),
        masked_items: 0,
        processing_seconds: 0.0,
        error_message: None,
        validation: None,
        chunks: Vec::new(),
        config: config.clone(),
    };

    let recorder = match RunRecorder::create(
        &config.runtime.logs_dir,
        run_id,
        config.runtime.debug_content_logging,
    ) {
        Ok(recorder) => recorder,
        Err(e) => {
            // Nothing can be persisted; report through the channel only.
            tracing::error!(run_id, error = %e, "Cannot create run recorder");
            summary.error_message = Some(e.to_string());
            summary.processing_seconds = started.elapsed().as_secs_f64();
            emit(
                events,
                RunEvent::Completed {
                    summary: summary.clone(),
                },
            );
            return summary;
        }
    };

    if let Err(e) = execute(
        config, source, format, extractor, client, &recorder, events, cancel, &mut summary,
    ) {
        tracing::error!(run_id, error = %e, "Run failed");
        summary.status = RunStatus::Error;
        summary.error_message = Some(e.to_string());
    }

    summary.processing_seconds = started.elapsed().as_secs_f64();

    if let Err(e) = recorder.finalize(&summary) {
        tracing::error!(run_id, error = %e, "Cannot write run summary");
    }

    tracing::info!(
        run_id,
        status = ?summary.status,
        chunks = summary.total_chunks,
        failed = summary.failed_chunks.len(),
        seconds = summary.processing_seconds,
        "Anonymization run finished"
    );

    emit(
        events,
        RunEvent::Completed {
            summary: summary.clone(),
        },
    );
    summary
}

/// The fallible part of the run. Mutates `summary` as stages complete so a
/// partial summary is still meaningful on error or cancellation.
#[allow(clippy::too_many_arguments)]
fn execute(
    config: &Config,
    source: &Path,
    format: DocumentFormat,
    extractor: &dyn TextExtractor,
    client: &dyn ChatCompletion,
    recorder: &RunRecorder,
    events: &Sender<RunEvent>,
    cancel: &CancelFlag,
    summary: &mut RunSummary,
) -> Result<(), PipelineError> {
    config.validate()?;

    progress(events, Stage::Health, 0, 1, "Verificando el servidor de inferencia");
    client
        .check_health()
        .map_err(PipelineError::BackendUnavailable)?;
    progress(events, Stage::Health, 1, 1, "Servidor de inferencia disponible");

    progress(events, Stage::Extraction, 0, 1, "Extrayendo texto del documento");
    let text = extractor.extract(source, format)?;
    if text.trim().is_empty() {
        return Err(ExtractError::NoExtractableText.into());
    }
    tracing::info!(chars = text.len(), "Text extracted");
    log_event(events, "INFO", format!("Caracteres extraídos: {}", text.len()));

    progress(events, Stage::Premask, 0, 1, "Aplicando enmascarado determinista");
    let (masked, mask_map) = pre_mask(&text);
    summary.masked_items = mask_map.len();
    tracing::info!(masked_items = mask_map.len(), "Deterministic pre-masking applied");
    log_event(
        events,
        "INFO",
        format!("Datos enmascarados de forma determinista: {}", mask_map.len()),
    );

    let tokens = tokenize_with_spans(&masked);
    let chunks = build_chunks(
        &masked,
        &tokens,
        config.chunking.max_context_tokens,
        config.chunking.safety_factor,
        config.chunking.overlap_tokens,
    )?;
    summary.total_chunks = chunks.len();
    progress(
        events,
        Stage::Chunking,
        1,
        1,
        &format!("Documento dividido en {} chunks", chunks.len()),
    );

    let policy = if config.runtime.strict_mode {
        Policy::Strict
    } else {
        Policy::Lax
    };

    let outcome = process_chunks(
        &chunks,
        &mask_map,
        &DEFAULT_PROFILES,
        client,
        recorder,
        policy,
        cancel.as_atomic(),
        |completed, total, message| progress(events, Stage::Inference, completed, total, message),
    );

    let (results, aborted) = match outcome {
        OrchestratorOutcome::Completed(results) => (results, false),
        OrchestratorOutcome::Aborted(results) => (results, true),
        OrchestratorOutcome::Cancelled(results) => {
            summary.failed_chunks = failed_indices(&results);
            summary.chunks = results;
            summary.status = RunStatus::Cancelled;
            tracing::info!("Run cancelled; partial summary will be flushed");
            return Ok(());
        }
    };

    summary.failed_chunks = failed_indices(&results);
    summary.chunks = results.clone();

    if aborted && !config.runtime.emit_partial_on_abort {
        return Err(PipelineError::Aborted {
            failed_index: results.last().map(|r| r.chunk_index).unwrap_or(0),
            total: chunks.len(),
        });
    }

    // Pad unprocessed chunks (strict abort with partial emission) so the
    // merger substitutes the sentinel for them.
    let mut merge_input = results;
    for chunk in chunks.iter().skip(merge_input.len()) {
        merge_input.push(ChunkResult {
            chunk_index: chunk.index,
            status: ChunkStatus::Failed,
            output: None,
            retries_used: 0,
            duration_seconds: 0.0,
            error_detail: Some("not processed: run aborted earlier".into()),
        });
    }

    progress(events, Stage::Merge, 0, 1, "Unificando chunks procesados");
    let merged = merge_chunks(
        &chunks,
        &merge_input,
        config.chunking.overlap_tokens,
        config.chunking.merge_strategy,
    );

    let out_path = output_path(source);
    std::fs::write(&out_path, &merged).map_err(PipelineError::WriteOutput)?;
    summary.output_file = Some(out_path.display().to_string());
    tracing::info!(output = %out_path.display(), chars = merged.len(), "Anonymized document written");
    log_event(
        events,
        "INFO",
        format!("Documento anonimizado guardado en: {}", out_path.display()),
    );

    progress(events, Stage::Validation, 0, 1, "Validando el documento final");
    let report = validate_output(&text, &merged, config.runtime.debug_content_logging);
    if !report.suspicious_edits.is_empty() {
        tracing::warn!(
            edits = report.suspicious_edits.len(),
            "Validation found unexpected differences"
        );
        log_event(
            events,
            "WARN",
            format!(
                "Validación automática: {} diferencias no esperadas",
                report.suspicious_edits.len()
            ),
        );
    }
    summary.validation = Some(report);

    // The HTML diff reproduces original text; both flags must allow it.
    if config.runtime.diff_enabled && config.runtime.debug_content_logging {
        progress(events, Stage::Artifacts, 0, 1, "Generando reporte de comparación");
        let path = diff_report_path(source);
        match std::fs::write(&path, render_html_diff(&text, &merged)) {
            Ok(()) => summary.diff_report_file = Some(path.display().to_string()),
            Err(e) => tracing::warn!(error = %e, "Cannot write diff report"),
        }
    }

    if aborted {
        return Err(PipelineError::Aborted {
            failed_index: summary.failed_chunks.last().copied().unwrap_or(0),
            total: chunks.len(),
        });
    }

    if summary.failed_chunks.is_empty() {
        summary.status = RunStatus::Success;
    } else {
        summary.status = RunStatus::Error;
        summary.error_message = Some(format!(
            "{} de {} chunks fueron reemplazados por el marcador de fallo",
            summary.failed_chunks.len(),
            chunks.len()
        ));
    }
    Ok(())
}

fn failed_indices(results: &[ChunkResult]) -> Vec<usize> {
    results
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.chunk_index)
        .collect()
}

// ---------------------------------------------------------------------------
// Background worker
// ---------------------------------------------------------------------------

/// Handle for a run on its background thread: event stream out, cancel flag
/// in, and a join for the final summary.
pub struct RunHandle {
    pub run_id: String,
    pub events: Receiver<RunEvent>,
    cancel: CancelFlag,
    handle: Option<JoinHandle<RunSummary>>,
}

impl RunHandle {
    /// Request cooperative cancellation; takes effect between chunks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run and return its summary.
    pub fn join(mut self) -> Option<RunSummary> {
        self.handle.take().and_then(|h| h.join().ok())
    }
}

/// Run a document on a background thread, isolated from the caller.
pub fn spawn_run(
    config: Config,
    source: PathBuf,
    format: DocumentFormat,
    extractor: Box<dyn TextExtractor + Send>,
    client: Box<dyn ChatCompletion + Send>,
) -> RunHandle {
    let (tx, rx) = mpsc::channel();
    let cancel = CancelFlag::new();
    let run_id = new_run_id();

    let thread_cancel = cancel.clone();
    let thread_run_id = run_id.clone();
    let handle = std::thread::spawn(move || {
        run_document(
            &config,
            &thread_run_id,
            &source,
            format,
            extractor.as_ref(),
            client.as_ref(),
            &tx,
            &thread_cancel,
        )
    });

    RunHandle {
        run_id,
        events: rx,
        cancel,
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PlainTextExtractor;
    use crate::pipeline::inference::MockChatClient;
    use crate::pipeline::merge::FAILED_CHUNK_SENTINEL;

    struct TestRun {
        _dir: tempfile::TempDir,
        config: Config,
        source: PathBuf,
    }

    fn setup(text: &str) -> TestRun {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("escrito.txt");
        std::fs::write(&source, text).unwrap();

        let mut config = Config::default();
        config.runtime.logs_dir = dir.path().join("logs");
        config.runtime.retry_backoff_seconds = 0.0;
        TestRun {
            _dir: dir,
            config,
            source,
        }
    }

    fn run(test: &TestRun, client: &dyn ChatCompletion) -> (RunSummary, Vec<RunEvent>) {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelFlag::new();
        let summary = run_document(
            &test.config,
            &new_run_id(),
            &test.source,
            DocumentFormat::PlainText,
            &PlainTextExtractor,
            client,
            &tx,
            &cancel,
        );
        drop(tx);
        let events: Vec<RunEvent> = rx.iter().collect();
        (summary, events)
    }

    fn read_output(summary: &RunSummary) -> String {
        std::fs::read_to_string(summary.output_file.as_ref().unwrap()).unwrap()
    }

    #[test]
    fn identity_stub_reproduces_clean_text_byte_for_byte() {
        let text = "El tribunal dispuso el archivo de las actuaciones sin más trámite.";
        let test = setup(text);
        let client = MockChatClient::echo();

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Success);
        assert!(summary.failed_chunks.is_empty());
        assert_eq!(read_output(&summary), text);
    }

    #[test]
    fn party_names_and_document_ids_are_redacted() {
        let text =
            "Expediente 1234. El Sr. Juan Pérez, DNI 12.345.678, declaró ante el tribunal.";
        let test = setup(text);
        let client = MockChatClient::with(|_, user| Ok(user.replace("Juan Pérez", "[ACTOR]")));

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.total_chunks, 1);
        assert!(summary.failed_chunks.is_empty());
        assert_eq!(summary.masked_items, 1);

        let output = read_output(&summary);
        assert!(output.contains("Expediente 1234."));
        assert!(output.contains("declaró ante el tribunal."));
        assert!(output.contains("[ACTOR]"));
        assert!(output.contains("[DOCUMENTO_0]"));
        assert!(!output.contains("Juan Pérez"));
        assert!(!output.contains("12.345.678"));
    }

    #[test]
    fn timeout_under_lax_policy_yields_sentinel_document() {
        let test = setup("texto que el modelo nunca procesará");
        let client = MockChatClient::always_timing_out(3);

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.failed_chunks, vec![0]);
        assert_eq!(read_output(&summary), FAILED_CHUNK_SENTINEL);
    }

    #[test]
    fn timeout_under_strict_policy_emits_no_document() {
        let mut test = setup("texto que el modelo nunca procesará");
        test.config.runtime.strict_mode = true;
        let client = MockChatClient::always_timing_out(3);

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Error);
        assert!(summary.output_file.is_none());
        assert!(!output_path(&test.source).exists());
        assert!(summary.error_message.as_deref().unwrap().contains("aborted"));
    }

    #[test]
    fn strict_abort_can_emit_partial_document_when_configured() {
        let mut test = setup("texto que el modelo nunca procesará");
        test.config.runtime.strict_mode = true;
        test.config.runtime.emit_partial_on_abort = true;
        let client = MockChatClient::always_timing_out(3);

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Error);
        assert!(summary.output_file.is_some());
        assert_eq!(read_output(&summary), FAILED_CHUNK_SENTINEL);
    }

    #[test]
    fn failed_health_probe_aborts_before_any_chunk() {
        let test = setup("nunca llega a procesarse");
        let client = MockChatClient::unreachable();

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.total_chunks, 0);
        assert!(summary.chunks.is_empty());
        assert_eq!(client.calls(), 0);

        // One fatal summary, zero chunk records
        let logs = &test.config.runtime.logs_dir;
        let summary_files: Vec<_> = std::fs::read_dir(logs)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(summary_files.iter().any(|f| f.starts_with("run_summary_")));
        assert!(!summary_files.iter().any(|f| f.ends_with(".jsonl")));
    }

    #[test]
    fn cancelled_run_flushes_partial_summary() {
        let test = setup("texto de un documento cualquiera");
        let client = MockChatClient::echo();
        let (tx, _rx) = mpsc::channel();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let summary = run_document(
            &test.config,
            &new_run_id(),
            &test.source,
            DocumentFormat::PlainText,
            &PlainTextExtractor,
            &client,
            &tx,
            &cancel,
        );

        assert_eq!(summary.status, RunStatus::Cancelled);
        assert!(summary.output_file.is_none());
        assert_eq!(client.calls(), 0);

        let logs = &test.config.runtime.logs_dir;
        let has_summary = std::fs::read_dir(logs)
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().starts_with("run_summary_"));
        assert!(has_summary, "cancelled run must still flush a summary");
    }

    #[test]
    fn empty_document_fails_before_inference() {
        let test = setup("   \n  ");
        let client = MockChatClient::echo();

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(client.calls(), 0);
        assert!(summary
            .error_message
            .as_deref()
            .unwrap()
            .contains("no extractable text"));
    }

    #[test]
    fn invalid_config_combination_stops_the_run() {
        let mut test = setup("texto válido");
        test.config.chunking.overlap_tokens = 10;
        let client = MockChatClient::echo();

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Error);
        assert!(summary
            .error_message
            .as_deref()
            .unwrap()
            .contains("stitch_left"));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn events_bracket_the_run() {
        let test = setup("un documento breve para observar eventos");
        let client = MockChatClient::echo();

        let (_, events) = run(&test, &client);

        assert!(matches!(events.first(), Some(RunEvent::Started { .. })));
        assert!(matches!(events.last(), Some(RunEvent::Completed { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Progress {
                stage: Stage::Inference,
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(e, RunEvent::Log { .. })));
    }

    #[test]
    fn diff_artifact_requires_both_flags() {
        let text = "El Sr. Juan Pérez declaró.";
        let mut test = setup(text);
        test.config.runtime.diff_enabled = true;
        test.config.runtime.debug_content_logging = false;
        let client = MockChatClient::with(|_, user| Ok(user.replace("Juan Pérez", "[ACTOR]")));

        let (summary, _) = run(&test, &client);
        assert!(summary.diff_report_file.is_none());

        test.config.runtime.debug_content_logging = true;
        let (summary, _) = run(&test, &client);
        let diff = summary.diff_report_file.expect("diff artifact expected");
        assert!(std::fs::read_to_string(diff).unwrap().contains("Anonimizado"));
    }

    #[test]
    fn overlap_run_with_identity_stub_reproduces_text() {
        let words: Vec<String> = (0..120).map(|i| format!("palabra{i}")).collect();
        let text = words.join(" ");
        let mut test = setup(&text);
        test.config.chunking.max_context_tokens = 40;
        test.config.chunking.safety_factor = 1.0;
        test.config.chunking.overlap_tokens = 6;
        test.config.chunking.merge_strategy = crate::config::MergeStrategy::StitchLeft;
        let client = MockChatClient::echo();

        let (summary, _) = run(&test, &client);

        assert_eq!(summary.status, RunStatus::Success);
        assert!(summary.total_chunks > 2);
        assert_eq!(read_output(&summary), text);
    }

    #[test]
    fn spawned_run_reports_through_handle() {
        let test = setup("documento procesado en segundo plano");
        let handle = spawn_run(
            test.config.clone(),
            test.source.clone(),
            DocumentFormat::PlainText,
            Box::new(PlainTextExtractor),
            Box::new(MockChatClient::echo()),
        );

        assert!(!handle.run_id.is_empty());
        let run_id = handle.run_id.clone();
        let summary = handle.join().expect("worker thread result");
        assert_eq!(summary.run_id, run_id);
        assert_eq!(summary.status, RunStatus::Success);
    }

    #[test]
    fn concurrent_runs_use_distinct_recorder_files() {
        let test_a = setup("primer documento en paralelo");
        let test_b = setup("segundo documento en paralelo");

        let handle_a = spawn_run(
            test_a.config.clone(),
            test_a.source.clone(),
            DocumentFormat::PlainText,
            Box::new(PlainTextExtractor),
            Box::new(MockChatClient::echo()),
        );
        let handle_b = spawn_run(
            test_b.config.clone(),
            test_b.source.clone(),
            DocumentFormat::PlainText,
            Box::new(PlainTextExtractor),
            Box::new(MockChatClient::echo()),
        );

        assert_ne!(handle_a.run_id, handle_b.run_id);
        let a = handle_a.join().unwrap();
        let b = handle_b.join().unwrap();
        assert_eq!(a.status, RunStatus::Success);
        assert_eq!(b.status, RunStatus::Success);
    }
}
