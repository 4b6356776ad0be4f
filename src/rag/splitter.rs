//! Recursive character splitting.
//!
//! Text is split on the coarsest separator that occurs in it (paragraph,
//! line, word, character), pieces that are still too long are split again
//! with the finer separators, and small pieces are merged back into chunks
//! of at most `chunk_size` characters that overlap by up to
//! `chunk_overlap` characters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Document;

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitterError {
    #[error("chunk_size must be positive")]
    ZeroChunkSize,
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// A slice of one catalog record, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"<row>-<chunk_index>"`, stable for a given catalog and settings.
    pub id: String,
    pub text: String,
    pub source: String,
    pub row: usize,
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Splits every document; each chunk inherits its document's source and row.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            for (chunk_index, text) in self.split_text(&doc.page_content).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: format!("{}-{}", doc.metadata.row, chunk_index),
                    text,
                    source: doc.metadata.source.clone(),
                    row: doc.metadata.row,
                    chunk_index,
                });
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (idx, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[idx + 1..];
                break;
            }
        }

        // Separators stay attached to the piece that follows them, so
        // pieces are merged back without inserting anything.
        let splits = split_on(text, separator);

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits, ""));
                good_splits.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits, ""));
        }

        final_chunks
    }

    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);
            let joined_len = |current_len: usize| if current_len > 0 { separator_len } else { 0 };

            if total + len + joined_len(current.len()) > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_pieces(current.iter().copied(), separator) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap
                        || (total + len + joined_len(current.len()) > self.chunk_size && total > 0)
                    {
                        let Some(front) = current.pop_front() else {
                            break;
                        };
                        let sep = if current.is_empty() { 0 } else { separator_len };
                        total = total.saturating_sub(char_len(front) + sep);
                    }
                }
            }

            current.push_back(piece);
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(doc) = join_pieces(current.iter().copied(), separator) {
            docs.push(doc);
        }
        docs
    }
}

fn split_on(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut pieces = text.split(separator);
    let mut splits = Vec::new();
    if let Some(first) = pieces.next() {
        splits.push(first.to_string());
    }
    splits.extend(pieces.map(|piece| format!("{}{}", separator, piece)));

    splits.retain(|s| !s.is_empty());
    splits
}

fn join_pieces<'a>(pieces: impl Iterator<Item = &'a str>, separator: &str) -> Option<String> {
    let joined = pieces.collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DiseaseRecord;

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert_eq!(
            TextSplitter::new(50, 50).unwrap_err(),
            SplitterError::OverlapTooLarge { size: 50, overlap: 50 }
        );
        assert_eq!(TextSplitter::new(0, 0).unwrap_err(), SplitterError::ZeroChunkSize);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(100, 50).unwrap();
        assert_eq!(splitter.split_text("  Gout is painful.  "), vec!["Gout is painful."]);
        assert!(splitter.split_text("   ").is_empty());
    }

    #[test]
    fn chunks_respect_size_and_overlap_neighbours() {
        let splitter = TextSplitter::new(20, 10).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";

        let chunks = splitter.split_text(text);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "chunk too long: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "{:?} does not overlap {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn paragraphs_are_preferred_over_words() {
        let splitter = TextSplitter::new(30, 5).unwrap();
        let text = "first paragraph here\n\nsecond paragraph here";

        let chunks = splitter.split_text(text);

        assert_eq!(chunks, vec!["first paragraph here", "second paragraph here"]);
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text(&"x".repeat(25));

        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn split_documents_carries_source_and_row() {
        let record = DiseaseRecord {
            row: 7,
            name: "Diabetes mellitus".to_string(),
            document: "Impaired insulin secretion and variable degrees of peripheral insulin \
                resistance leading to hyperglycemia."
                .to_string(),
            source: "https://msd/diabetes".to_string(),
        };
        let splitter = TextSplitter::new(100, 50).unwrap();

        let chunks = splitter.split_documents(&[record.to_document()]);

        assert!(chunks.len() >= 2);
        for (idx, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source, "https://msd/diabetes");
            assert_eq!(chunk.row, 7);
            assert_eq!(chunk.chunk_index, idx);
            assert_eq!(chunk.id, format!("7-{}", idx));
            assert!(chunk.text.chars().count() <= 100);
        }
    }
}
