//! Reference query service
//!
//! Similarity search over a plain-text clinical reference that is split into
//! overlapping chunks at startup. Scoring is idf-weighted term overlap, which
//! is enough to pick the few sections worth handing to the model.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::core::config::DataConfig;
use crate::core::{CarelinkError, Result};

/// Citation tag for answers grounded in the internal reference
pub const REFERENCE_CITATION: &str = "[Source: Internal Nephrology Reference]";

const NO_MATCH_TEXT: &str = "No relevant context found in the local nephrology reference. Please try rephrasing or allow web search.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "with", "have", "this", "that",
    "was", "were", "what", "when", "which", "who", "how", "why", "can", "should", "does", "from",
    "about", "into", "there", "their", "they", "them", "its", "also", "any", "all", "may", "might",
];

/// Result of a reference query
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
    Passages {
        /// Sections joined with separators, each already truncated
        content: String,
        /// Source attribution appended to the content
        source_tag: String,
        sections: usize,
    },
    NoMatch,
}

impl ReferenceOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, ReferenceOutcome::Passages { .. })
    }

    /// Render the outcome as text for the language model
    pub fn render(&self) -> String {
        match self {
            ReferenceOutcome::Passages {
                content,
                source_tag,
                ..
            } => format!("{}\n\n{}", content, source_tag),
            ReferenceOutcome::NoMatch => NO_MATCH_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    term_counts: HashMap<String, usize>,
    length: usize,
}

/// In-memory chunk index over the reference text
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    chunks: Vec<Chunk>,
    document_frequency: HashMap<String, usize>,
    top_k: usize,
    max_passage_chars: usize,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Position just past the last good break point in `window`, if it sits in
/// the back half of the window.
fn break_point(window: &[char]) -> Option<usize> {
    let half = window.len() / 2;
    for separator in ["\n\n", "\n", ". ", " "] {
        let sep: Vec<char> = separator.chars().collect();
        let found = window
            .windows(sep.len())
            .rposition(|w| w == sep.as_slice())
            .map(|pos| pos + sep.len());
        if let Some(pos) = found.filter(|&pos| pos > half) {
            return Some(pos);
        }
    }
    None
}

/// Split text into chunks of at most `size` characters, consecutive chunks
/// sharing up to `overlap` characters.
pub fn split_chunks(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            break_point(&chars[start..hard_end])
                .map(|b| start + b)
                .unwrap_or(hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        // resume on a word boundary inside the overlap
        let mut next = end.saturating_sub(overlap);
        if let Some(ws) = chars[next..end].iter().position(|c| c.is_whitespace()) {
            next += ws + 1;
        }
        start = if next > start && next < end { next } else { end };
    }

    chunks
}

impl ReferenceIndex {
    /// An index with no content; every query reports no match
    pub fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            document_frequency: HashMap::new(),
            top_k: 3,
            max_passage_chars: 2000,
        }
    }

    /// Build an index from raw reference text
    pub fn from_text(text: &str, config: &DataConfig) -> Self {
        let chunks: Vec<Chunk> = split_chunks(text, config.chunk_size, config.chunk_overlap)
            .into_iter()
            .map(|text| {
                let terms = tokenize(&text);
                let length = terms.len();
                let mut term_counts = HashMap::new();
                for term in terms {
                    *term_counts.entry(term).or_insert(0) += 1;
                }
                Chunk {
                    text,
                    term_counts,
                    length,
                }
            })
            .collect();

        let mut document_frequency = HashMap::new();
        for chunk in &chunks {
            for term in chunk.term_counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        Self {
            chunks,
            document_frequency,
            top_k: config.top_k.max(1),
            max_passage_chars: config.max_passage_chars,
        }
    }

    /// Load and index a reference file
    pub fn load(path: &Path, config: &DataConfig) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CarelinkError::data(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::from_text(&text, config))
    }

    /// Load the reference, degrading to an empty index on failure
    pub fn load_or_empty(path: &Path, config: &DataConfig) -> Self {
        match Self::load(path, config) {
            Ok(index) => {
                tracing::info!(chunks = index.len(), path = %path.display(), "reference index built");
                index
            }
            Err(e) => {
                tracing::warn!(error = %e, "reference not initialized, clinical answers will fall back to web search");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn score(&self, chunk: &Chunk, query_terms: &HashSet<String>) -> f64 {
        let total = self.chunks.len() as f64;
        let overlap: f64 = query_terms
            .iter()
            .filter_map(|term| {
                let tf = *chunk.term_counts.get(term)? as f64;
                let df = *self.document_frequency.get(term).unwrap_or(&1) as f64;
                let idf = (1.0 + total / df).ln();
                Some((1.0 + tf.ln()) * idf)
            })
            .sum();
        overlap / (chunk.length.max(1) as f64).sqrt()
    }

    /// Return the top passages for a free-text query
    pub fn query(&self, text: &str) -> ReferenceOutcome {
        let query_terms: HashSet<String> = tokenize(text).into_iter().collect();
        if query_terms.is_empty() || self.chunks.is_empty() {
            tracing::info!(query = text, "reference query returned no match");
            return ReferenceOutcome::NoMatch;
        }

        let mut scored: Vec<(usize, f64)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, self.score(chunk, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            tracing::info!(query = text, "reference query returned no match");
            return ReferenceOutcome::NoMatch;
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.top_k);

        let content = scored
            .iter()
            .enumerate()
            .map(|(n, (i, _))| {
                let passage: String = self.chunks[*i]
                    .text
                    .chars()
                    .take(self.max_passage_chars)
                    .collect();
                format!("[Section {}]\n{}", n + 1, passage)
            })
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);

        let sections = scored.len();
        tracing::info!(query = text, sections, "reference passages retrieved");

        ReferenceOutcome::Passages {
            content,
            source_tag: format!(
                "[Source: Internal Nephrology Reference - {} section(s) retrieved]",
                sections
            ),
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "Chronic kidney disease is staged by eGFR. Stage 3a covers an eGFR of 45 to 59.\n\n\
Edema and swelling of the ankles are common when the kidneys retain sodium and fluid. Loop diuretics such as furosemide reduce swelling.\n\n\
Hyperkalemia means high potassium. Patients should limit bananas, oranges and potatoes.\n\n\
Kidney stones cause severe flank pain. High fluid intake prevents recurrence.";

    fn small_config() -> DataConfig {
        DataConfig {
            chunk_size: 120,
            chunk_overlap: 20,
            top_k: 2,
            max_passage_chars: 2000,
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_split_chunks_respects_size_and_overlap() {
        let text = "word ".repeat(500);
        let chunks = split_chunks(&text, 100, 10);
        assert!(chunks.len() > 20);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_split_chunks_prefers_paragraphs() {
        let chunks = split_chunks(REFERENCE, 120, 0);
        assert!(chunks[0].ends_with("59."));
    }

    #[test]
    fn test_split_chunks_multibyte() {
        let text = "ödem ".repeat(100);
        let chunks = split_chunks(&text, 37, 5);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_query_ranks_relevant_section_first() {
        let index = ReferenceIndex::from_text(REFERENCE, &small_config());
        match index.query("Which diuretics reduce swelling?") {
            ReferenceOutcome::Passages {
                content,
                source_tag,
                sections,
            } => {
                let first = content.split(SECTION_SEPARATOR).next().unwrap();
                assert!(first.starts_with("[Section 1]\n"));
                assert!(first.contains("furosemide"));
                assert!(sections <= 2);
                assert!(source_tag.starts_with("[Source: Internal Nephrology Reference"));
            }
            ReferenceOutcome::NoMatch => panic!("expected passages"),
        }
    }

    #[test]
    fn test_passages_are_truncated() {
        let config = DataConfig {
            max_passage_chars: 20,
            ..small_config()
        };
        let index = ReferenceIndex::from_text(REFERENCE, &config);
        let outcome = index.query("potassium bananas");
        if let ReferenceOutcome::Passages { content, .. } = outcome {
            let first = content.split(SECTION_SEPARATOR).next().unwrap();
            assert_eq!(first.trim_start_matches("[Section 1]\n").chars().count(), 20);
        } else {
            panic!("expected passages");
        }
    }

    #[test]
    fn test_no_match_is_explicit() {
        let index = ReferenceIndex::from_text(REFERENCE, &small_config());
        let outcome = index.query("quantum chromodynamics");
        assert_eq!(outcome, ReferenceOutcome::NoMatch);
        assert!(outcome.render().contains("No relevant context found"));

        assert_eq!(ReferenceIndex::empty().query("swelling"), ReferenceOutcome::NoMatch);
    }
}
