//! Expurgo — anonymization core for legal filings.
//!
//! Redacts personally identifiable information from court documents before
//! they can be shared. Deterministically maskable categories (document
//! numbers, phones, emails, bank identifiers, addresses) never reach the
//! model at all; the rest is redacted by a local chat-completion model and
//! re-validated by a post-scan before anything enters the final document.
//! The reconciliation layer guarantees the output contains either validated
//! model text or an explicit sentinel, never silently leaked content, while
//! non-sensitive text is preserved exactly.
//!
//! # Pipeline
//!
//! raw text → pre-mask → tokenize → chunk → per-chunk inference + post-scan
//! → merge → validate, with an append-only run log and a final summary for
//! every run. See [`worker::spawn_run`] for the front-end boundary: events
//! out over a channel, a cancellation flag in.

pub mod config;
pub mod extract;
pub mod pipeline;
pub mod recorder;
pub mod worker;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration harnesses embedding the
/// core. Library callers with their own subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
