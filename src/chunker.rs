//! Heading-aware text chunker.
//!
//! Splits raw document text into bounded-size, overlapping segments suitable
//! for embedding-model input. Pure function over its input: the same text and
//! options always yield the same chunk sequence.

use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_MAX_SIZE: usize = 1400;
pub const DEFAULT_OVERLAP: usize = 200;

/// Per-call chunking options (both sizes are `char` counts).
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Target upper bound for a chunk. A chunk seeded with overlap carry may
    /// exceed it by up to `overlap` characters, and a single sentence longer
    /// than `max_size` is never split further.
    pub max_size: usize,
    /// Trailing characters of a closed chunk carried into the next one on a
    /// forced split. Character-based, so it may cut mid-word.
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("valid heading regex"));

// Short capitalized phrase, optionally with a trailing colon. Heuristic: it
// will also catch short capitalized sentences without terminal punctuation.
static SHORT_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9 ,:'&/()-]*:?$").expect("valid phrase regex"));

fn is_heading(line: &str) -> bool {
    if MD_HEADING.is_match(line) {
        return true;
    }
    line.chars().count() < 80 && SHORT_PHRASE.is_match(line)
}

/// Splits `text` into an ordered sequence of non-empty chunks.
///
/// Lines are grouped into blocks at heading boundaries, blocks are split into
/// sentences, and sentences are greedily packed up to `max_size` characters.
/// Overlap is carried across forced splits within a block, never across a
/// heading boundary.
pub fn split(text: &str, opts: &ChunkOptions) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    for block in group_blocks(trimmed) {
        pack_block(&block, opts, &mut chunks);
    }
    chunks
}

/// Groups non-empty lines into blocks; a heading line flushes the current
/// block and starts the next one.
fn group_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_heading(line) && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(line);
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Splits a line into sentences at `.`, `!` or `?` followed by whitespace.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminator = false;

    for (i, ch) in line.char_indices() {
        if after_terminator && ch.is_whitespace() {
            let sentence = line[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i;
        }
        after_terminator = matches!(ch, '.' | '!' | '?');
    }

    let tail = line[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Greedily packs one block's sentences into chunks, carrying `overlap`
/// trailing characters across forced splits.
fn pack_block(lines: &[&str], opts: &ChunkOptions, out: &mut Vec<String>) {
    let mut current = String::new();

    for sentence in lines.iter().flat_map(|line| split_sentences(line)) {
        if current.is_empty() {
            current.push_str(sentence);
            continue;
        }

        let next_len = current.chars().count() + 1 + sentence.chars().count();
        if next_len <= opts.max_size {
            current.push(' ');
            current.push_str(sentence);
        } else {
            let carry = flush(&current, opts.overlap, out);
            current = carry;
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
    }

    flush(&current, 0, out);
}

/// Pushes the trimmed chunk (if non-empty) and returns its overlap tail.
fn flush(current: &str, overlap: usize, out: &mut Vec<String>) -> String {
    let closed = current.trim();
    if closed.is_empty() {
        return String::new();
    }
    let carry = overlap_tail(closed, overlap);
    out.push(closed.to_string());
    carry
}

fn overlap_tail(s: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(overlap);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(max_size: usize, overlap: usize) -> ChunkOptions {
        ChunkOptions { max_size, overlap }
    }

    #[test]
    fn test_empty_input() {
        assert!(split("", &ChunkOptions::default()).is_empty());
        assert!(split("   \n\n \r\n ", &ChunkOptions::default()).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split("just one short sentence.", &ChunkOptions::default());
        assert_eq!(chunks, vec!["just one short sentence.".to_string()]);
    }

    #[test]
    fn test_deterministic() {
        let text = "alpha beta gamma. delta epsilon zeta. eta theta iota kappa.";
        let a = split(text, &opts(30, 10));
        let b = split(text, &opts(30, 10));
        assert_eq!(a, b, "same input and options must give identical chunks");
    }

    #[test]
    fn test_size_bound_with_overlap_slack() {
        let text = "one two three four. five six seven eight. nine ten eleven twelve. more words follow here.";
        let chunks = split(text, &opts(30, 10));
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            // max_size plus overlap carry plus the joining space
            assert!(
                chunk.chars().count() <= 30 + 10 + 1,
                "chunk too large: {chunk:?}"
            );
        }
    }

    #[test]
    fn test_oversized_sentence_not_split() {
        // A single sentence longer than max_size passes through unsplit.
        let long = "word ".repeat(20).trim_end().to_string() + ".";
        let chunks = split(&long, &opts(20, 5));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chars().count() > 20);
    }

    #[test]
    fn test_overlap_carried_on_forced_split() {
        let text = "aaaa bbbb cccc. dddd eeee ffff. gggg hhhh iiii. jjjj kkkk llll.";
        let overlap = 10;
        let chunks = split(text, &opts(30, overlap));
        assert!(chunks.len() >= 2);

        for pair in chunks.windows(2) {
            let tail = overlap_tail(&pair[0], overlap);
            assert!(
                pair[1].starts_with(tail.trim_start()),
                "chunk {:?} should start with tail {:?} of {:?}",
                pair[1],
                tail,
                pair[0]
            );
        }
    }

    #[test]
    fn test_markdown_heading_starts_new_block() {
        let text = "# Intro\nfirst part sentence.\n## Details\nsecond part sentence.";
        let chunks = split(text, &opts(200, 20));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("# Intro"));
        assert!(chunks[1].starts_with("## Details"));
    }

    #[test]
    fn test_short_phrase_detected_as_heading() {
        let text = "Quarterly Report\nrevenue held steady this quarter.\nOutlook\nwe expect growth to continue.";
        let chunks = split(text, &opts(200, 20));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("Quarterly Report"));
        assert!(chunks[1].starts_with("Outlook"));
    }

    #[test]
    fn test_no_overlap_across_heading_boundary() {
        let text = "Alpha Section\nthe first body text sits here entirely.\nBeta Section\nthe second body text sits here.";
        let chunks = split(text, &opts(60, 15));
        let beta = chunks
            .iter()
            .find(|c| c.contains("Beta Section"))
            .expect("beta chunk");
        assert!(
            beta.starts_with("Beta Section"),
            "heading boundary must not be seeded with overlap: {beta:?}"
        );
    }

    #[test]
    fn test_crlf_normalized() {
        let unix = split("line one ends.\nline two ends.", &opts(200, 10));
        let dos = split("line one ends.\r\nline two ends.", &opts(200, 10));
        assert_eq!(unix, dos);
    }

    #[test]
    fn test_revenue_scenario() {
        let text = "Title: Revenue\nRevenue grew 20%. Costs fell 5%.";
        let chunks = split(text, &opts(20, 5));
        assert!(chunks.len() >= 2, "expected multiple chunks, got {chunks:?}");
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 20 + 5 + 1,
                "chunk exceeds max plus overlap slack: {chunk:?}"
            );
        }
        assert!(chunks.iter().any(|c| c.contains("Costs fell 5%.")));
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second one! Third one? tail without end");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third one?", "tail without end"]
        );
    }
}
