// ============================================================
// Layer 3 — Core Domain Types
// ============================================================
// A labeled example ties one tokenised document to its ordered
// hierarchy-label tuple (level 0 = coarsest). Everything further
// down the pipeline (indexing, packaging, training) works in
// terms of these rows.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One document: its tokens plus its hierarchy labels.
///
/// `labels[0]` is the coarsest level. Tuples may have different
/// depths across a corpus — the label indexer tolerates that —
/// but every example carries at least one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledExample {
    pub tokens: Vec<String>,
    pub labels: Vec<i64>,
}

impl LabeledExample {
    pub fn new(tokens: Vec<String>, labels: Vec<i64>) -> Self {
        Self { tokens, labels }
    }

    /// Depth of this example's label tuple (number of levels).
    pub fn depth(&self) -> usize {
        self.labels.len()
    }
}

/// The two raw corpus layouts the preprocessor understands.
///
/// Selection is always explicit — the format is never inferred
/// from the files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum CorpusSchema {
    /// Directory with `X.txt` (one document per line) plus
    /// `YL1.txt` / `YL2.txt` / `Y.txt` (one integer label per
    /// line per hierarchy level).
    #[value(name = "plaintext")]
    PlainText,

    /// A CSV file with columns `l1,l2,l3,text`; label columns are
    /// strings that get dense ids assigned per column on the fly.
    Tabular,
}

impl std::fmt::Display for CorpusSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorpusSchema::PlainText => write!(f, "plaintext"),
            CorpusSchema::Tabular => write!(f, "tabular"),
        }
    }
}

/// Tokenization policy. Chosen by explicit parameter, and part of
/// the preprocessing cache key since it changes the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Tokenization {
    /// Word-level: splits on whitespace and breaks punctuation
    /// into separate tokens.
    Word,

    /// Plain whitespace split, no further segmentation.
    Whitespace,
}

impl std::fmt::Display for Tokenization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tokenization::Word => write!(f, "word"),
            Tokenization::Whitespace => write!(f, "whitespace"),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth() {
        let ex = LabeledExample::new(vec!["a".into()], vec![0, 3, 7]);
        assert_eq!(ex.depth(), 3);
    }

    #[test]
    fn test_cache_key_fragments() {
        assert_eq!(CorpusSchema::PlainText.to_string(), "plaintext");
        assert_eq!(Tokenization::Whitespace.to_string(), "whitespace");
    }
}
