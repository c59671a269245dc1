//! Offset-tracked whitespace tokenization.
//!
//! Splits text into alternating word and whitespace tokens whose byte spans
//! cover the source exactly, so any slice of the token sequence can be mapped
//! back to the original text without loss. Chunk boundaries and the overlap
//! stitch both rely on this invariant.

use serde::Serialize;

/// Token kind: a run of non-whitespace or a run of whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Whitespace,
}

/// A single token with its byte span in the source text.
///
/// `start`/`end` are byte offsets, always on char boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `text` into word/whitespace runs with byte spans.
///
/// Concatenating the token texts in order reproduces `text` exactly.
/// Empty input yields an empty sequence; there is no failure mode.
pub fn tokenize_with_spans(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run_start = 0;
    let mut run_kind: Option<TokenKind> = None;

    for (idx, ch) in text.char_indices() {
        let kind = if ch.is_whitespace() {
            TokenKind::Whitespace
        } else {
            TokenKind::Word
        };

        match run_kind {
            Some(current) if current == kind => {}
            Some(current) => {
                tokens.push(Token {
                    text: text[run_start..idx].to_string(),
                    kind: current,
                    start: run_start,
                    end: idx,
                });
                run_start = idx;
                run_kind = Some(kind);
            }
            None => {
                run_kind = Some(kind);
            }
        }
    }

    if let Some(kind) = run_kind {
        tokens.push(Token {
            text: text[run_start..].to_string(),
            kind,
            start: run_start,
            end: text.len(),
        });
    }

    tokens
}

/// Token count of `text` under the same splitting rules.
pub fn count_tokens(text: &str) -> usize {
    tokenize_with_spans(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize_with_spans("").is_empty());
    }

    #[test]
    fn spans_reconstruct_source_exactly() {
        let samples = [
            "El Sr. Juan Pérez declaró ante el tribunal.",
            "  leading and trailing  ",
            "línea uno\n\n\tlínea dos",
            "única",
            " \n\t ",
        ];
        for text in samples {
            let tokens = tokenize_with_spans(text);
            assert_eq!(reconstruct(&tokens), text);
            // Spans are gapless and ordered
            let mut cursor = 0;
            for token in &tokens {
                assert_eq!(token.start, cursor);
                assert_eq!(&text[token.start..token.end], token.text);
                cursor = token.end;
            }
            assert_eq!(cursor, text.len());
        }
    }

    #[test]
    fn alternates_word_and_whitespace_runs() {
        let tokens = tokenize_with_spans("uno  dos\ntres");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word,
                TokenKind::Whitespace,
                TokenKind::Word,
                TokenKind::Whitespace,
                TokenKind::Word,
            ]
        );
        assert_eq!(tokens[1].text, "  ");
        assert_eq!(tokens[3].text, "\n");
    }

    #[test]
    fn leading_whitespace_is_its_own_token() {
        let tokens = tokenize_with_spans("  hola");
        assert_eq!(tokens[0].kind, TokenKind::Whitespace);
        assert_eq!(tokens[0].text, "  ");
        assert_eq!(tokens[1].text, "hola");
    }

    #[test]
    fn multibyte_text_keeps_valid_boundaries() {
        let text = "señoría declaró: «así»";
        let tokens = tokenize_with_spans(text);
        assert_eq!(reconstruct(&tokens), text);
        for token in &tokens {
            // Slicing at these offsets must not panic
            let _ = &text[token.start..token.end];
        }
    }

    #[test]
    fn count_matches_tokenization() {
        let text = "tres tokens aquí";
        assert_eq!(count_tokens(text), tokenize_with_spans(text).len());
        assert_eq!(count_tokens(text), 5); // 3 words + 2 whitespace runs
    }
}
