//! Token-level diff between two texts.
//!
//! Longest-matching-block recursion over token sequences, yielding
//! equal/replace/delete/insert opcodes with token ranges on both sides.
//! Two consumers: the validator's suspicious-edit report, and the merger's
//! overlap stitch, which needs to translate an input offset into the
//! corresponding offset of the model's output.

use std::collections::HashMap;

use super::tokenize::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// One edit operation, as half-open token ranges into both sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

/// Byte span covered by `tokens[start..end]`; empty ranges collapse to the
/// boundary position.
pub fn token_span(tokens: &[Token], start: usize, end: usize) -> (usize, usize) {
    if start < end {
        (tokens[start].start, tokens[end - 1].end)
    } else {
        let at = tokens
            .get(start)
            .map(|t| t.start)
            .unwrap_or_else(|| tokens.last().map(|t| t.end).unwrap_or(0));
        (at, at)
    }
}

fn longest_match(
    a: &[&str],
    b2j: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0usize);
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, token) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_j2len = HashMap::new();
        if let Some(positions) = b2j.get(token) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let len = j2len.get(&j.wrapping_sub(1)).copied().unwrap_or(0) + 1;
                next_j2len.insert(j, len);
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        j2len = next_j2len;
    }
    best
}

fn matching_blocks(a: &[&str], b: &[&str]) -> Vec<(usize, usize, usize)> {
    let mut b2j: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, token) in b.iter().enumerate() {
        b2j.entry(*token).or_default().push(j);
    }

    let mut queue = vec![(0, a.len(), 0, b.len())];
    let mut raw = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k > 0 {
            raw.push((i, j, k));
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    raw.sort_unstable();

    // Coalesce adjacent blocks, then terminate with a zero-length sentinel.
    let mut blocks: Vec<(usize, usize, usize)> = Vec::new();
    for (i, j, k) in raw {
        match blocks.last_mut() {
            Some(last) if last.0 + last.2 == i && last.1 + last.2 == j => last.2 += k,
            _ => blocks.push((i, j, k)),
        }
    }
    blocks.push((a.len(), b.len(), 0));
    blocks
}

/// Diff two token sequences into ordered opcodes covering both completely.
pub fn diff_tokens(a: &[Token], b: &[Token]) -> Vec<Opcode> {
    let a_texts: Vec<&str> = a.iter().map(|t| t.text.as_str()).collect();
    let b_texts: Vec<&str> = b.iter().map(|t| t.text.as_str()).collect();

    let mut ops = Vec::new();
    let (mut ia, mut ib) = (0, 0);

    for (ai, bj, size) in matching_blocks(&a_texts, &b_texts) {
        let tag = match (ia < ai, ib < bj) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            ops.push(Opcode {
                tag,
                a_start: ia,
                a_end: ai,
                b_start: ib,
                b_end: bj,
            });
        }
        if size > 0 {
            ops.push(Opcode {
                tag: OpTag::Equal,
                a_start: ai,
                a_end: ai + size,
                b_start: bj,
                b_end: bj + size,
            });
        }
        ia = ai + size;
        ib = bj + size;
    }
    ops
}

/// Translate a byte offset in the `a` text (a token boundary) into the
/// corresponding byte offset in the `b` text, through the opcode alignment.
/// Identical sequences map every boundary to itself.
pub fn map_offset(a: &[Token], b: &[Token], ops: &[Opcode], a_offset: usize) -> usize {
    let b_len = b.last().map(|t| t.end).unwrap_or(0);

    let Some(token_idx) = a.iter().position(|t| t.start >= a_offset) else {
        return b_len;
    };

    for op in ops {
        if op.a_start <= token_idx && token_idx < op.a_end {
            return match op.tag {
                OpTag::Equal => b[op.b_start + (token_idx - op.a_start)].start,
                _ => token_span(b, op.b_start, op.b_end).0,
            };
        }
    }
    b_len
}
