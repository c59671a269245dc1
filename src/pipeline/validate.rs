//! Post-merge validation of the final document.
//!
//! Computes length metrics and a token-level diff against the original,
//! surfacing the largest edits that are NOT plain placeholder substitutions.
//! Purely advisory: findings annotate the run summary, they never block it.
//! Edit content is included only on request (debug flag), since the segments are
//! original document text and the summary is a lower-trust surface.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::merge::FAILED_CHUNK_SENTINEL;
use super::prompt::ALLOWED_PLACEHOLDERS;
use super::textdiff::{diff_tokens, token_span, OpTag};
use super::tokenize::tokenize_with_spans;

/// Cap on reported suspicious edits; only the largest survive.
pub const MAX_SUSPICIOUS_EDITS: usize = 10;

const EDIT_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize)]
pub struct LengthMetrics {
    pub original_length: usize,
    pub anonymized_length: usize,
    pub delta: i64,
    pub ratio: Option<f64>,
}

pub fn length_metrics(original: &str, anonymized: &str) -> LengthMetrics {
    let original_length = original.len();
    let anonymized_length = anonymized.len();
    LengthMetrics {
        original_length,
        anonymized_length,
        delta: anonymized_length as i64 - original_length as i64,
        ratio: if original_length == 0 {
            None
        } else {
            Some(anonymized_length as f64 / original_length as f64)
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Replace,
    Delete,
    Insert,
}

/// An edit the model made that placeholder substitution does not explain.
#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousEdit {
    pub kind: EditKind,
    pub original_chars: usize,
    pub replacement_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warn,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub metrics: LengthMetrics,
    pub suspicious_edits: Vec<SuspiciousEdit>,
}

/// Compare original and anonymized text; annotate, never block.
pub fn validate_output(original: &str, anonymized: &str, include_content: bool) -> ValidationReport {
    let suspicious_edits = detect_suspicious_edits(original, anonymized, include_content);
    ValidationReport {
        status: if suspicious_edits.is_empty() {
            ValidationStatus::Ok
        } else {
            ValidationStatus::Warn
        },
        metrics: length_metrics(original, anonymized),
        suspicious_edits,
    }
}

static ANY_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[A-Z_ÁÉÍÓÚÑ ]+(?:_\d+)?\]").expect("valid regex"));

/// Remove every placeholder form (model vocabulary, pre-mask ids, sentinel)
/// so a pure substitution leaves nothing behind.
fn without_placeholders(text: &str) -> String {
    let mut cleaned = text.replace(FAILED_CHUNK_SENTINEL, "");
    for placeholder in ALLOWED_PLACEHOLDERS {
        cleaned = cleaned.replace(placeholder, "");
    }
    ANY_PLACEHOLDER_RE.replace_all(&cleaned, "").into_owned()
}

fn contains_placeholder(text: &str) -> bool {
    text.contains(FAILED_CHUNK_SENTINEL)
        || ALLOWED_PLACEHOLDERS.iter().any(|p| text.contains(p))
        || ANY_PLACEHOLDER_RE.is_match(text)
}

/// Token-level diff restricted to non-placeholder content, largest edits
/// first, capped at [`MAX_SUSPICIOUS_EDITS`].
pub fn detect_suspicious_edits(
    original: &str,
    anonymized: &str,
    include_content: bool,
) -> Vec<SuspiciousEdit> {
    let a_tokens = tokenize_with_spans(original);
    let b_tokens = tokenize_with_spans(anonymized);
    let ops = diff_tokens(&a_tokens, &b_tokens);

    let mut edits = Vec::new();

    for op in &ops {
        if op.tag == OpTag::Equal {
            continue;
        }
        let (a_lo, a_hi) = token_span(&a_tokens, op.a_start, op.a_end);
        let (b_lo, b_hi) = token_span(&b_tokens, op.b_start, op.b_end);
        let a_seg = &original[a_lo..a_hi];
        let b_seg = &anonymized[b_lo..b_hi];

        if a_seg.trim().is_empty() && b_seg.trim().is_empty() {
            continue;
        }

        match op.tag {
            OpTag::Replace | OpTag::Insert => {
                // A replacement that is placeholders plus text already in the
                // original segment (attached punctuation, mostly) is the
                // expected redaction, not a suspicious edit.
                if contains_placeholder(b_seg) {
                    let residue = without_placeholders(b_seg);
                    if a_seg.contains(residue.trim()) {
                        continue;
                    }
                }
            }
            OpTag::Delete => {
                if a_seg.trim().is_empty() {
                    continue;
                }
            }
            OpTag::Equal => unreachable!(),
        }

        let kind = match op.tag {
            OpTag::Replace => EditKind::Replace,
            OpTag::Delete => EditKind::Delete,
            OpTag::Insert => EditKind::Insert,
            OpTag::Equal => unreachable!(),
        };

        edits.push(SuspiciousEdit {
            kind,
            original_chars: a_seg.len(),
            replacement_chars: b_seg.len(),
            original: include_content.then(|| preview(a_seg)),
            replacement: include_content.then(|| preview(b_seg)),
        });
    }

    edits.sort_by_key(|e| std::cmp::Reverse(e.original_chars.max(e.replacement_chars)));
    edits.truncate(MAX_SUSPICIOUS_EDITS);
    edits
}

fn preview(segment: &str) -> String {
    let trimmed = segment.trim();
    let mut out: String = trimmed.chars().take(EDIT_PREVIEW_CHARS).collect();
    if trimmed.chars().count() > EDIT_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

/// Side-by-side HTML diff of both documents. Reproduces original text, so
/// the caller gates it behind the privacy flag.
pub fn render_html_diff(original: &str, anonymized: &str) -> String {
    let left: Vec<&str> = original.lines().collect();
    let right: Vec<&str> = anonymized.lines().collect();
    let rows = left.len().max(right.len());

    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <title>Comparación</title>\n<style>\n\
         table { border-collapse: collapse; width: 100%; font-family: monospace; }\n\
         td { border: 1px solid #ccc; padding: 2px 6px; vertical-align: top; width: 50%; }\n\
         tr.changed td { background: #fff3cd; }\n\
         th { background: #eee; }\n\
         </style></head><body>\n\
         <table>\n<tr><th>Original</th><th>Anonimizado</th></tr>\n",
    );

    for i in 0..rows {
        let l = left.get(i).copied().unwrap_or("");
        let r = right.get(i).copied().unwrap_or("");
        let class = if l == r { "" } else { " class=\"changed\"" };
        html.push_str(&format!(
            "<tr{class}><td>{}</td><td>{}</td></tr>\n",
            escape_html(l),
            escape_html(r)
        ));
    }

    html.push_str("</table>\n</body></html>\n");
    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
