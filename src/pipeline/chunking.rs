//! Token-budgeted chunk construction.
//!
//! Partitions a tokenized document into bounded chunks whose boundaries fall
//! only on token boundaries. Consecutive chunks are exactly adjacent
//! (overlap 0) or share exactly `overlap` tokens. A separate validation pass
//! re-walks the produced list and fails fast on any coverage defect; these
//! are fatal configuration errors, never retried.

use thiserror::Error;

use super::tokenize::Token;

/// A contiguous, token-bounded slice of the (masked) document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub token_start: usize,
    pub token_end: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
}

impl Chunk {
    pub fn token_len(&self) -> usize {
        self.token_end - self.token_start
    }

    /// Single-line preview for progress messages and debug records.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.text.replace('\n', " ");
        let mut preview: String = flat.chars().take(max_chars).collect();
        preview = preview.trim().to_string();
        if flat.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("document produced no tokens to chunk")]
    EmptyDocument,

    #[error("effective token budget is zero (max_context_tokens {max}, safety_factor {safety})")]
    BudgetTooSmall { max: usize, safety: f64 },

    #[error("overlap of {overlap} tokens does not fit the effective budget of {budget}")]
    OverlapTooLarge { overlap: usize, budget: usize },

    #[error("first chunk does not start at the beginning of the document")]
    BadStart,

    #[error("chunk sequence covers tokens up to {end} of {total}")]
    IncompleteCoverage { end: usize, total: usize },

    #[error("chunks {left} and {right} misaligned: expected shared overlap of {overlap} tokens")]
    Misaligned {
        left: usize,
        right: usize,
        overlap: usize,
    },

    #[error("chunk {index} holds {len} tokens, over the effective budget of {budget}")]
    Oversized {
        index: usize,
        len: usize,
        budget: usize,
    },

    #[error("chunk {index} char range does not match its token range")]
    OffsetMismatch { index: usize },
}

/// Effective per-chunk token budget after reserving headroom for the fixed
/// system instruction and model output.
pub fn effective_budget(max_context_tokens: usize, safety_factor: f64) -> usize {
    (max_context_tokens as f64 * safety_factor).floor() as usize
}

/// Partition `tokens` (over `text`) into chunks of at most
/// `effective_budget(max_context_tokens, safety_factor)` tokens, consecutive
/// chunks sharing exactly `overlap` tokens.
pub fn build_chunks(
    text: &str,
    tokens: &[Token],
    max_context_tokens: usize,
    safety_factor: f64,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    let budget = effective_budget(max_context_tokens, safety_factor);
    if budget == 0 {
        return Err(ChunkingError::BudgetTooSmall {
            max: max_context_tokens,
            safety: safety_factor,
        });
    }
    if overlap >= budget {
        return Err(ChunkingError::OverlapTooLarge { overlap, budget });
    }
    if tokens.is_empty() {
        return Err(ChunkingError::EmptyDocument);
    }

    let total = tokens.len();
    let mut chunks = Vec::new();
    let mut token_start = 0;

    loop {
        let token_end = (token_start + budget).min(total);
        let char_start = tokens[token_start].start;
        let char_end = tokens[token_end - 1].end;

        chunks.push(Chunk {
            index: chunks.len(),
            token_start,
            token_end,
            char_start,
            char_end,
            text: text[char_start..char_end].to_string(),
        });

        if token_end >= total {
            break;
        }
        token_start = token_end - overlap;
    }

    validate_chunk_sequence(&chunks, tokens, budget, overlap)?;
    Ok(chunks)
}

/// Re-walk a chunk list and verify full, gapless coverage with the exact
/// overlap arithmetic. Defects here mean the construction or configuration
/// is broken; the run must not proceed.
pub fn validate_chunk_sequence(
    chunks: &[Chunk],
    tokens: &[Token],
    budget: usize,
    overlap: usize,
) -> Result<(), ChunkingError> {
    let total = tokens.len();

    let first = chunks.first().ok_or(ChunkingError::EmptyDocument)?;
    if first.token_start != 0 {
        return Err(ChunkingError::BadStart);
    }

    let last = chunks.last().expect("non-empty checked above");
    if last.token_end != total {
        return Err(ChunkingError::IncompleteCoverage {
            end: last.token_end,
            total,
        });
    }

    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.index != i {
            return Err(ChunkingError::Misaligned {
                left: i,
                right: chunk.index,
                overlap,
            });
        }
        if chunk.token_len() > budget {
            return Err(ChunkingError::Oversized {
                index: chunk.index,
                len: chunk.token_len(),
                budget,
            });
        }
        if chunk.char_start != tokens[chunk.token_start].start
            || chunk.char_end != tokens[chunk.token_end - 1].end
        {
            return Err(ChunkingError::OffsetMismatch { index: chunk.index });
        }
    }

    for pair in chunks.windows(2) {
        let expected = pair[0].token_end - overlap;
        if pair[1].token_start != expected {
            return Err(ChunkingError::Misaligned {
                left: pair[0].index,
                right: pair[1].index,
                overlap,
            });
        }
    }

    Ok(())
}
