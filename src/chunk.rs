//! Splits normalized page text into bounded, overlapping chunks for
//! embedding.
//!
//! Chunking works in two stages: the text is first segmented into
//! consecutive, non-overlapping spans (losslessly: concatenating the spans
//! reproduces the input), then each chunk is assembled as the previous
//! span's trailing overlap plus its own span. A cosmetic post-pass cleans
//! whitespace per chunk; the lossless property holds for the spans, not the
//! cleaned text.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::types::Chunk;

static HEADING_INDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+#").unwrap());
static WHITESPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Configuration for [`Chunker`]: 1000-character chunks with a
/// 200-character overlap by default.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Upper bound on chunk length, in characters.
    pub max_chars: usize,
    /// Characters shared between consecutive chunks. Must be smaller than
    /// `max_chars`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap: 200,
        }
    }
}

/// Character-bounded chunker preferring paragraph and sentence boundaries.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl Chunker {
    /// Creates a chunker, clamping a degenerate overlap so the packing
    /// stride stays positive.
    pub fn new(config: ChunkerConfig) -> Self {
        let overlap = config.overlap.min(config.max_chars.saturating_sub(1));
        Self {
            config: ChunkerConfig {
                max_chars: config.max_chars.max(1),
                overlap,
            },
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkerConfig::default())
    }

    /// Splits `text` into ordered chunks for `source`. Empty input yields
    /// zero chunks.
    pub fn split(&self, source: &Url, text: &str) -> Vec<Chunk> {
        let spans = self.segment(text);
        let mut chunks = Vec::with_capacity(spans.len());
        for (sequence, span) in spans.iter().enumerate() {
            let mut body = String::new();
            if sequence > 0 {
                body.push_str(char_tail(&spans[sequence - 1], self.config.overlap));
            }
            body.push_str(span);
            chunks.push(Chunk {
                source: source.clone(),
                text: clean_chunk(&body),
                sequence,
            });
        }
        chunks
    }

    /// Segments text into consecutive spans of at most `max_chars - overlap`
    /// characters each. Lossless: the spans concatenate back to `text`.
    fn segment(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let stride = self.config.max_chars - self.config.overlap;

        let mut spans = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0usize;

        for unit in units(text, stride) {
            let unit_chars = unit.chars().count();
            if current_chars + unit_chars > stride && !current.is_empty() {
                spans.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            current.push_str(&unit);
            current_chars += unit_chars;
        }
        if !current.is_empty() {
            spans.push(current);
        }
        spans
    }
}

/// Breaks text into packable units no longer than `stride` characters:
/// paragraphs first, sentences for oversized paragraphs, hard character
/// cuts for sentences that still exceed the bound.
fn units(text: &str, stride: usize) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split_inclusive("\n\n") {
        if paragraph.chars().count() <= stride {
            out.push(paragraph.to_string());
            continue;
        }
        for sentence in sentence_units(paragraph) {
            if sentence.chars().count() <= stride {
                out.push(sentence.to_string());
            } else {
                out.extend(hard_cut(sentence, stride));
            }
        }
    }
    out
}

/// Lossless sentence segmentation: breaks after `.`, `!` or `?` followed by
/// whitespace, keeping the terminator and the whitespace with the sentence.
fn sentence_units(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_was_terminator = false;

    for (idx, ch) in text.char_indices() {
        if prev_was_terminator && ch.is_whitespace() {
            let end = idx + ch.len_utf8();
            out.push(&text[start..end]);
            start = end;
            prev_was_terminator = false;
            continue;
        }
        prev_was_terminator = matches!(ch, '.' | '!' | '?');
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn hard_cut(text: &str, stride: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut piece = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        piece.push(ch);
        count += 1;
        if count == stride {
            out.push(std::mem::take(&mut piece));
            count = 0;
        }
    }
    if !piece.is_empty() {
        out.push(piece);
    }
    out
}

fn char_tail(text: &str, chars: usize) -> &str {
    let total = text.chars().count();
    if total <= chars {
        return text;
    }
    let skip = total - chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Per-chunk cosmetic pass: left-trim heading-marker lines, then collapse
/// runs of 2+ whitespace characters to a single space.
fn clean_chunk(text: &str) -> String {
    let text = HEADING_INDENT_RE.replace_all(text, "#");
    WHITESPACE_RUN_RE.replace_all(&text, " ").trim().to_string()
}
