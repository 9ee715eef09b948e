use crate::error::ChunkingError;
use crate::models::{Document, TextChunk};
use std::collections::VecDeque;

/// Roughly 500 tokens at three characters per token.
pub const DEFAULT_CHUNK_CHARS: usize = 1_500;

const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    /// Budget with the standard 20% overlap.
    pub fn with_budget(max_chars: usize) -> Self {
        Self {
            max_chars,
            overlap_chars: max_chars / 5,
        }
    }

    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.max_chars == 0 {
            return Err(ChunkingError::InvalidConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(ChunkingError::InvalidConfig(format!(
                "overlap {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::with_budget(DEFAULT_CHUNK_CHARS)
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `text` into windows of at most `max_chars` characters, cutting at
/// paragraph, line, sentence and word boundaries before falling back to
/// single characters. Consecutive windows share up to `overlap_chars`.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_recursive(text, &SEPARATORS, config)
}

pub fn chunk_documents(
    documents: &[Document],
    config: ChunkingConfig,
) -> Result<Vec<TextChunk>, ChunkingError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        for text in split_text(&document.labelled_text(), config) {
            chunks.push(TextChunk {
                text,
                source_url: document.source_url.clone(),
                index: chunks.len(),
            });
        }
    }
    Ok(chunks)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (position, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (separator, &separators[position + 1..]);
        }
    }
    ("", &[])
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let (separator, finer) = pick_separator(text, separators);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split_inclusive(separator).map(str::to_string).collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.max_chars {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, config));
            fitting.clear();
        }

        if finer.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, finer, config));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, config));
    }

    chunks
}

fn merge_pieces(pieces: &[String], config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let length = char_len(piece);

        if total + length > config.max_chars {
            if !window.is_empty() {
                push_window(&mut chunks, &window);
            }
            // Keep only the tail that fits the overlap and leaves room for `piece`.
            while total > config.overlap_chars || (total > 0 && total + length > config.max_chars)
            {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += length;
    }

    if !window.is_empty() {
        push_window(&mut chunks, &window);
    }

    chunks
}

fn push_window(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|index| format!("word{index:03}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof\u{a0}  spacing";
        let normalized = normalize_whitespace(input);
        assert_eq!(normalized, "A lot of spacing");
    }

    #[test]
    fn chunks_respect_the_character_budget() {
        let config = ChunkingConfig::with_budget(100);
        let chunks = split_text(&numbered_words(300), config);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let config = ChunkingConfig::with_budget(100);
        let chunks = split_text(&numbered_words(300), config);

        for pair in chunks.windows(2) {
            let first_word_of_next = pair[1]
                .split_whitespace()
                .next()
                .expect("chunk should not be empty");
            assert!(
                pair[0].split_whitespace().any(|word| word == first_word_of_next),
                "{first_word_of_next} should repeat from the previous chunk"
            );
        }
    }

    #[test]
    fn paragraph_boundaries_are_preferred() {
        let first = "a".repeat(30) + " first paragraph ends here.";
        let second = "b".repeat(30) + " second paragraph ends here.";
        let text = format!("{first}\n\n{second}");

        let chunks = split_text(&text, ChunkingConfig::with_budget(70));
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let text = "x".repeat(250);
        let chunks = split_text(&text, ChunkingConfig::with_budget(100));

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 100));
    }

    #[test]
    fn zero_documents_yield_zero_chunks() {
        let chunks = chunk_documents(&[], ChunkingConfig::default()).expect("valid config");
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunks_keep_their_source_and_global_index() {
        let documents = vec![
            Document::new("https://a.io", numbered_words(40)),
            Document::new("https://a.io/docs", numbered_words(40)),
        ];
        let chunks =
            chunk_documents(&documents, ChunkingConfig::with_budget(120)).expect("valid config");

        assert!(chunks.iter().any(|chunk| chunk.source_url == "https://a.io/docs"));
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
        }
        assert!(chunks[0].text.starts_with("The following text is from https://a.io:"));
    }

    #[test]
    fn overlap_must_be_smaller_than_budget() {
        let config = ChunkingConfig {
            max_chars: 10,
            overlap_chars: 10,
        };
        assert!(chunk_documents(&[], config).is_err());
    }
}
