//! Recomposition of processed chunks into the final document.
//!
//! With no overlap, chunk boundaries are exact and outputs concatenate in
//! index order. With overlap, the left chunk's output is authoritative for
//! the shared token region: the right chunk contributes only from the first
//! character of its non-overlapped region, located in its output through the
//! token alignment. Overlap exists to give the model context, never to
//! duplicate output. Failed chunks contribute the fixed sentinel in place of
//! their span, never raw or partially validated model output.

use super::chunking::Chunk;
use super::orchestrator::ChunkResult;
use super::textdiff::{diff_tokens, map_offset};
use super::tokenize::tokenize_with_spans;
use crate::config::MergeStrategy;

/// Marker substituted for any chunk whose processing could not be validated.
pub const FAILED_CHUNK_SENTINEL: &str = "[FRAGMENTO NO PROCESADO]";

/// Merge chunk results in index order. `results` must cover all `chunks`;
/// the worker pads unprocessed chunks as failed when emitting a partial
/// document.
pub fn merge_chunks(
    chunks: &[Chunk],
    results: &[ChunkResult],
    overlap: usize,
    strategy: MergeStrategy,
) -> String {
    debug_assert_eq!(chunks.len(), results.len());

    let mut merged = String::new();

    for (chunk, result) in chunks.iter().zip(results) {
        debug_assert_eq!(chunk.index, result.chunk_index);

        match strategy {
            MergeStrategy::Exact => match result.output.as_deref() {
                Some(output) => merged.push_str(output),
                None => merged.push_str(FAILED_CHUNK_SENTINEL),
            },
            MergeStrategy::StitchLeft => {
                let shared = if chunk.index == 0 { 0 } else { overlap };
                match result.output.as_deref() {
                    Some(output) => merged.push_str(past_overlap(chunk, output, shared)),
                    None => merged.push_str(FAILED_CHUNK_SENTINEL),
                }
            }
        }
    }

    merged
}

/// Slice of `output` owned by this chunk: everything past the `shared`
/// leading tokens, located through the input/output token alignment.
fn past_overlap<'a>(chunk: &Chunk, output: &'a str, shared: usize) -> &'a str {
    if shared == 0 {
        return output;
    }

    let input_tokens = tokenize_with_spans(&chunk.text);
    // Chunk construction guarantees more than `overlap` tokens per chunk.
    let stitch = input_tokens[shared].start;

    let output_tokens = tokenize_with_spans(output);
    let ops = diff_tokens(&input_tokens, &output_tokens);
    let cut = map_offset(&input_tokens, &output_tokens, &ops, stitch);
    &output[cut..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chunking::build_chunks;
    use crate::pipeline::orchestrator::ChunkStatus;
    use crate::pipeline::tokenize::tokenize_with_spans;

    fn ok(index: usize, output: &str) -> ChunkResult {
        ChunkResult {
            chunk_index: index,
            status: ChunkStatus::Success,
            output: Some(output.to_string()),
            retries_used: 0,
            duration_seconds: 0.0,
            error_detail: None,
        }
    }

    fn failed(index: usize) -> ChunkResult {
        ChunkResult {
            chunk_index: index,
            status: ChunkStatus::Failed,
            output: None,
            retries_used: 0,
            duration_seconds: 0.0,
            error_detail: Some("rechazado".into()),
        }
    }

    fn chunks_for(text: &str, max: usize, overlap: usize) -> Vec<Chunk> {
        let tokens = tokenize_with_spans(text);
        build_chunks(text, &tokens, max, 1.0, overlap).unwrap()
    }

    #[test]
    fn exact_merge_of_echoed_chunks_reproduces_input() {
        let text = "el tribunal dispuso el archivo de las actuaciones sin más trámite";
        let chunks = chunks_for(text, 4, 0);
        assert!(chunks.len() > 1);
        let results: Vec<ChunkResult> =
            chunks.iter().map(|c| ok(c.index, &c.text)).collect();

        let merged = merge_chunks(&chunks, &results, 0, MergeStrategy::Exact);
        assert_eq!(merged, text);
    }

    #[test]
    fn exact_merge_substitutes_sentinel_for_failed_chunk() {
        let text = "uno dos tres cuatro cinco seis";
        let chunks = chunks_for(text, 4, 0);
        assert_eq!(chunks.len(), 3);
        let results = vec![
            ok(0, &chunks[0].text),
            failed(1),
            ok(2, &chunks[2].text),
        ];

        let merged = merge_chunks(&chunks, &results, 0, MergeStrategy::Exact);
        assert_eq!(
            merged,
            format!(
                "{}{}{}",
                chunks[0].text, FAILED_CHUNK_SENTINEL, chunks[2].text
            )
        );
        assert!(!merged.contains("tres cuatro"));
    }

    #[test]
    fn stitch_merge_of_echoed_chunks_reproduces_input() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez once doce";
        let overlap = 3;
        let chunks = chunks_for(text, 8, overlap);
        assert!(chunks.len() > 1);
        let results: Vec<ChunkResult> =
            chunks.iter().map(|c| ok(c.index, &c.text)).collect();

        let merged = merge_chunks(&chunks, &results, overlap, MergeStrategy::StitchLeft);
        assert_eq!(merged, text);
    }

    #[test]
    fn stitch_does_not_duplicate_shared_region() {
        let text = "alfa beta gamma delta epsilon zeta eta theta";
        let overlap = 2;
        let chunks = chunks_for(text, 6, overlap);
        assert!(chunks.len() >= 2);
        let results: Vec<ChunkResult> =
            chunks.iter().map(|c| ok(c.index, &c.text)).collect();

        let merged = merge_chunks(&chunks, &results, overlap, MergeStrategy::StitchLeft);
        for word in ["alfa", "beta", "gamma", "delta", "epsilon", "zeta"] {
            assert_eq!(merged.matches(word).count(), 1, "{word} duplicated");
        }
    }

    #[test]
    fn stitch_left_output_wins_in_shared_region() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez once doce";
        let overlap = 3;
        let chunks = chunks_for(text, 8, overlap);
        assert!(chunks.len() >= 2);

        // Left chunk replaced a word inside the shared region; right chunk
        // echoes. The left version must be the one that survives.
        let shared_word = {
            let tokens = tokenize_with_spans(text);
            // First word token inside the shared region
            tokens[chunks[1].token_start..]
                .iter()
                .find(|t| !t.text.trim().is_empty())
                .unwrap()
                .text
                .clone()
        };
        let left_out = chunks[0].text.replace(&shared_word, "[ACTOR]");
        let mut results = vec![ok(0, &left_out)];
        for c in &chunks[1..] {
            results.push(ok(c.index, &c.text));
        }

        let merged = merge_chunks(&chunks, &results, overlap, MergeStrategy::StitchLeft);
        assert_eq!(merged.matches("[ACTOR]").count(), 1);
        assert_eq!(merged.matches(&shared_word).count(), 0);
    }

    #[test]
    fn stitch_tracks_length_change_in_right_chunk() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez once doce";
        let overlap = 3;
        let chunks = chunks_for(text, 8, overlap);
        assert!(chunks.len() >= 2);

        // Right chunk collapses two words of its non-overlap region into a
        // placeholder; the stitch must still find the right cut.
        let right = chunks
            .iter()
            .find(|c| c.text.contains("ocho nueve"))
            .expect("some chunk holds the target words");
        let right_out = right.text.replacen("ocho nueve", "[ACTOR]", 1);
        let mut results: Vec<ChunkResult> =
            chunks.iter().map(|c| ok(c.index, &c.text)).collect();
        results[right.index] = ok(right.index, &right_out);

        let merged = merge_chunks(&chunks, &results, overlap, MergeStrategy::StitchLeft);
        assert_eq!(merged.matches("[ACTOR]").count(), 1);
        assert_eq!(merged.matches("siete").count(), 1);
        assert!(!merged.contains("ocho nueve"));
    }

    #[test]
    fn stitch_failed_right_chunk_contributes_sentinel_only() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez once doce";
        let overlap = 3;
        let chunks = chunks_for(text, 13, overlap);
        assert_eq!(chunks.len(), 2);

        let results = vec![ok(0, &chunks[0].text), failed(1)];
        let merged = merge_chunks(&chunks, &results, overlap, MergeStrategy::StitchLeft);

        assert!(merged.starts_with(&chunks[0].text));
        assert!(merged.ends_with(FAILED_CHUNK_SENTINEL));
        assert!(!merged.contains("doce"));
    }

    #[test]
    fn single_chunk_document_is_the_output_itself() {
        let text = "expediente breve";
        let chunks = chunks_for(text, 100, 0);
        let results = vec![ok(0, "[ACTOR] breve")];
        let merged = merge_chunks(&chunks, &results, 0, MergeStrategy::Exact);
        assert_eq!(merged, "[ACTOR] breve");
    }
}
