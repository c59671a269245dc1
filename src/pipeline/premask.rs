//! Deterministic PII pre-masking.
//!
//! Every category that can be caught by a regex is substituted before any
//! text reaches the model, so deterministic categories never depend on model
//! accuracy. Placeholders carry a numeric suffix (`[DOCUMENTO_0]`) which keeps
//! them lexically distinct from the model's redaction vocabulary
//! (`[DOCUMENTO]`), and the original values are kept in a `MaskMap` used only
//! for internal verification, never to restore sensitive text into output.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// PII categories caught deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiCategory {
    Email,
    Documento,
    Telefono,
    CuentaBancaria,
    Domicilio,
}

impl PiiCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Documento => "DOCUMENTO",
            Self::Telefono => "TELEFONO",
            Self::CuentaBancaria => "CUENTA_BANCARIA",
            Self::Domicilio => "DOMICILIO",
        }
    }
}

/// A named regex profile. Profiles are applied in declaration order;
/// earlier profiles win on overlap.
pub struct PatternProfile {
    pub category: PiiCategory,
    pub pattern: Regex,
}

/// Conservative patterns for Argentine legal filings. Deliberately eager:
/// a false positive costs readability, a false negative leaks PII.
pub static DEFAULT_PROFILES: LazyLock<Vec<PatternProfile>> = LazyLock::new(|| {
    vec![
        PatternProfile {
            category: PiiCategory::Email,
            pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("valid regex"),
        },
        // Bank identifiers before the broader digit patterns, or the phone
        // profile would consume bare CBU/IBAN digit runs.
        PatternProfile {
            category: PiiCategory::CuentaBancaria,
            pattern: Regex::new(r"\b[A-Z]{2}[0-9]{2}[A-Z0-9]{10,30}\b").expect("valid regex"),
        },
        PatternProfile {
            category: PiiCategory::CuentaBancaria,
            // CBU: exactly 22 digits
            pattern: Regex::new(r"\b[0-9]{22}\b").expect("valid regex"),
        },
        PatternProfile {
            category: PiiCategory::Documento,
            // DNI with or without thousands dots, CUIL/CUIT-style digit runs
            pattern: Regex::new(r"\b\d{2}\.?\d{3}\.?\d{3}\b|\b\d{7,9}\b").expect("valid regex"),
        },
        PatternProfile {
            category: PiiCategory::Telefono,
            pattern: Regex::new(r"\+?\d[\d\s\-\(\)]{6,}\d").expect("valid regex"),
        },
        PatternProfile {
            category: PiiCategory::Domicilio,
            pattern: Regex::new(r"(?i)\b(?:calle|av\.?|avenida|callejon|pasaje|ruta)\b[^\n]{0,80}")
                .expect("valid regex"),
        },
    ]
});

/// Shape of a mask placeholder: `[LABEL_n]`.
static MASK_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[A-Z_]+_\d+\]").expect("valid regex"));

/// One deterministic substitution: placeholder, category, original value and
/// its byte span in the source text.
#[derive(Debug, Clone)]
pub struct MaskEntry {
    pub placeholder: String,
    pub category: PiiCategory,
    pub original: String,
    pub start: usize,
    pub end: usize,
}

/// Ordered record of all substitutions made by [`pre_mask`].
#[derive(Debug, Clone, Default)]
pub struct MaskMap {
    entries: Vec<MaskEntry>,
}

impl MaskMap {
    pub fn entries(&self) -> &[MaskEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose placeholder occurs in `text`. Placeholders never contain
    /// whitespace, so they cannot straddle a chunk boundary.
    pub fn entries_in(&self, text: &str) -> Vec<&MaskEntry> {
        self.entries
            .iter()
            .filter(|e| text.contains(&e.placeholder))
            .collect()
    }

    /// Restore original values. Internal verification only: the result must
    /// never be written to an output the model contributed to.
    pub fn unmask(&self, masked: &str) -> String {
        let mut restored = masked.to_string();
        for entry in &self.entries {
            restored = restored.replace(&entry.placeholder, &entry.original);
        }
        restored
    }
}

/// Is `candidate` shaped like a mask placeholder?
pub fn is_mask_placeholder(candidate: &str) -> bool {
    MASK_PLACEHOLDER_RE
        .find(candidate)
        .is_some_and(|m| m.start() == 0 && m.end() == candidate.len())
}

/// Mask all profile matches in `text`, left to right, earlier profiles
/// winning on overlap. Returns the masked text and the substitution record.
///
/// Guarantees: accepted spans never overlap; existing placeholders are left
/// untouched, so masking is idempotent; placeholder ids follow document
/// order.
pub fn pre_mask(text: &str) -> (String, MaskMap) {
    pre_mask_with(text, &DEFAULT_PROFILES)
}

pub fn pre_mask_with(text: &str, profiles: &[PatternProfile]) -> (String, MaskMap) {
    // Spans already claimed: placeholders from a previous pass, then
    // accepted matches as we go.
    let mut occupied: Vec<(usize, usize)> = MASK_PLACEHOLDER_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut accepted: Vec<(usize, usize, PiiCategory)> = Vec::new();

    for profile in profiles {
        for m in profile.pattern.find_iter(text) {
            if overlaps_any(&occupied, m.start(), m.end()) {
                continue;
            }
            occupied.push((m.start(), m.end()));
            accepted.push((m.start(), m.end(), profile.category));
        }
    }

    accepted.sort_by_key(|&(start, _, _)| start);

    let mut masked = String::with_capacity(text.len());
    let mut entries = Vec::with_capacity(accepted.len());
    let mut cursor = 0;

    for (idx, &(start, end, category)) in accepted.iter().enumerate() {
        let placeholder = format!("[{}_{}]", category.label(), idx);
        masked.push_str(&text[cursor..start]);
        masked.push_str(&placeholder);
        entries.push(MaskEntry {
            placeholder,
            category,
            original: text[start..end].to_string(),
            start,
            end,
        });
        cursor = end;
    }
    masked.push_str(&text[cursor..]);

    (masked, MaskMap { entries })
}

/// A raw PII pattern occurrence found outside any placeholder.
#[derive(Debug, Clone, Serialize)]
pub struct RawPiiFinding {
    pub category: PiiCategory,
    pub value: String,
    pub start: usize,
}

/// Re-scan `text` for raw profile matches, ignoring placeholder spans.
/// Used by the post-scan: masked input must produce zero findings, so any
/// finding in model output is a leak or model-introduced PII-shaped text.
pub fn scan_raw_pii(text: &str, profiles: &[PatternProfile]) -> Vec<RawPiiFinding> {
    let occupied: Vec<(usize, usize)> = MASK_PLACEHOLDER_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut findings = Vec::new();
    for profile in profiles {
        for m in profile.pattern.find_iter(text) {
            if overlaps_any(&occupied, m.start(), m.end()) {
                continue;
            }
            findings.push(RawPiiFinding {
                category: profile.category,
                value: m.as_str().to_string(),
                start: m.start(),
            });
        }
    }
    findings.sort_by_key(|f| f.start);
    findings
}

fn overlaps_any(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| start < e && s < end)
}
