//! Acceptance gate over model output.
//!
//! Runs before any completion is allowed into the merged document. Three
//! checks: the model introduced no placeholder outside its vocabulary, every
//! pre-mask placeholder present in the chunk survived unaltered, and no raw
//! PII pattern reappears. Findings never carry the sensitive value itself:
//! they end up in logs, which are a lower-trust surface than the document
//! path.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::premask::{scan_raw_pii, MaskMap, PatternProfile};
use super::prompt::ALLOWED_PLACEHOLDERS;

/// Any bracketed token short enough to be a placeholder.
static BRACKETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]\n]{1,40}\]").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    DisallowedPlaceholder,
    AlteredMaskPlaceholder,
    RawPiiLeak,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanFinding {
    pub kind: FindingKind,
    pub detail: String,
}

/// Scan a chunk's completion against leakage and placeholder policy.
/// Empty result means the output is accepted.
pub fn post_scan(
    chunk_input: &str,
    output: &str,
    mask_map: &MaskMap,
    profiles: &[PatternProfile],
) -> Vec<ScanFinding> {
    let mut findings = Vec::new();

    // (a) Placeholder vocabulary: bracketed tokens must be either allowed
    // model placeholders or text that already appeared in the input (mask
    // placeholders, or bracketed text native to the document, e.g. "[sic]").
    for m in BRACKETED_RE.find_iter(output) {
        let token = m.as_str();
        if ALLOWED_PLACEHOLDERS.contains(&token) || chunk_input.contains(token) {
            continue;
        }
        findings.push(ScanFinding {
            kind: FindingKind::DisallowedPlaceholder,
            detail: format!("unexpected placeholder {token}"),
        });
    }

    // (b) Every mask placeholder in this chunk must survive unaltered.
    for entry in mask_map.entries_in(chunk_input) {
        if !output.contains(&entry.placeholder) {
            findings.push(ScanFinding {
                kind: FindingKind::AlteredMaskPlaceholder,
                detail: format!("placeholder {} missing from output", entry.placeholder),
            });
        }
    }

    // (c) No deterministic PII pattern may reappear. The input was masked, so
    // any match here is either an un-masking or model-introduced PII-shaped
    // text. The finding reports category and position, never the value.
    for leak in scan_raw_pii(output, profiles) {
        findings.push(ScanFinding {
            kind: FindingKind::RawPiiLeak,
            detail: format!(
                "{} pattern at byte {} of the output",
                leak.category.label(),
                leak.start
            ),
        });
    }

    findings
}
