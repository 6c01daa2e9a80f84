use std::collections::VecDeque;
use std::str::Split;

use crate::config::{CHUNK_OVERLAP_CHARS, CHUNK_SIZE_CHARS};

/// Marker separating top-level sections in a markdown document.
const SECTION_BOUNDARY: &str = "\n## ";

/// Prefix re-attached to every section after the first.
const SECTION_PREFIX: &str = "## ";

/// Characters per word assumed when converting the overlap budget to words.
const CHARS_PER_WORD: usize = 5;

/// Splits documents into bounded, overlap-aware retrieval units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    /// Maximum chunk length in characters.
    chunk_size: usize,
    /// Overlap budget in characters, carried over as `overlap / 5` words.
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(CHUNK_SIZE_CHARS, CHUNK_OVERLAP_CHARS)
    }
}

impl Chunker {
    pub const fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of trailing words that seed the next sub-chunk of a split section.
    pub const fn overlap_words(&self) -> usize {
        self.overlap / CHARS_PER_WORD
    }

    /// Lazily chunk `text`.
    ///
    /// The returned iterator is finite and `Clone`; calling `chunks` again
    /// restarts from the beginning of the document.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            config: *self,
            sections: text.split(SECTION_BOUNDARY),
            section_index: 0,
            split: None,
        }
    }
}

/// Iterator over the chunks of one document. See [`Chunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    config: Chunker,
    sections: Split<'a, &'static str>,
    section_index: usize,
    /// Word-window state while an oversized section is being split.
    split: Option<SectionSplit>,
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(split) = &mut self.split {
                if let Some(chunk) = split.next_chunk(&self.config) {
                    return Some(chunk);
                }
                self.split = None;
            }

            let raw = self.sections.next()?;
            let section = if self.section_index == 0 {
                raw.to_string()
            } else {
                format!("{SECTION_PREFIX}{raw}")
            };
            self.section_index += 1;

            if char_len(&section) <= self.config.chunk_size {
                let trimmed = section.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                continue;
            }

            self.split = Some(SectionSplit::new(&section));
        }
    }
}

/// Splits one oversized section into word windows.
#[derive(Debug, Clone)]
struct SectionSplit {
    words: VecDeque<String>,
    current: Vec<String>,
    /// Sum of `word_len + 1` over `current`.
    current_len: usize,
}

impl SectionSplit {
    fn new(section: &str) -> Self {
        Self {
            words: section.split_whitespace().map(str::to_string).collect(),
            current: Vec::new(),
            current_len: 0,
        }
    }

    fn next_chunk(&mut self, config: &Chunker) -> Option<String> {
        while let Some(word) = self.words.pop_front() {
            let word_len = char_len(&word) + 1;
            if self.current_len + word_len > config.chunk_size && !self.current.is_empty() {
                let emitted = self.current.join(" ");

                let keep = config.overlap_words().min(self.current.len());
                self.current.drain(..self.current.len() - keep);
                self.current_len = self.current.iter().map(|w| char_len(w) + 1).sum();

                self.current.push(word);
                self.current_len += word_len;
                return Some(emitted);
            }
            self.current.push(word);
            self.current_len += word_len;
        }

        if self.current.is_empty() {
            return None;
        }
        self.current_len = 0;
        Some(std::mem::take(&mut self.current).join(" "))
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
