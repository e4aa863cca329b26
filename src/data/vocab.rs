// ============================================================
// Layer 4 — Vocabulary Builder
// ============================================================
// Assigns stable integer ids to tokens. Special tokens always
// take the lowest ids, in the order supplied, so the padding
// logic in the batch packager can rely on `<pad>` being id 0.
//
// Non-special tokens get ids in first-occurrence order of the
// token stream. A fixed corpus read in a fixed order therefore
// always produces the same ids — important because the cached
// embedding matrix is indexed by these ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Padding token — always first in the special-token list.
pub const PAD_WORD: &str = "<pad>";
/// Stand-in for tokens missing from the vocabulary.
pub const UNK_WORD: &str = "<unk>";

/// Bidirectional token ↔ id mapping with dense ids from 0.
///
/// Invariant: `word2id` and `id2word` are a perfect bijection;
/// `id2word[id]` is the token that maps back to `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    word2id: HashMap<String, u32>,
    id2word: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from a token stream and an ordered list
    /// of special tokens.
    ///
    /// Duplicates in the stream are ignored after their first
    /// occurrence. An empty stream yields a vocabulary containing
    /// only the special tokens.
    pub fn build<I, S>(tokens: I, special_tokens: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self {
            word2id: HashMap::new(),
            id2word: Vec::new(),
        };
        for tok in special_tokens {
            vocab.insert(tok);
        }
        for tok in tokens {
            vocab.insert(tok.as_ref());
        }
        vocab
    }

    /// Standard vocabulary with `<pad>` and `<unk>` up front.
    pub fn with_default_specials<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(tokens, &[PAD_WORD, UNK_WORD])
    }

    fn insert(&mut self, token: &str) {
        if !self.word2id.contains_key(token) {
            let id = self.id2word.len() as u32;
            self.word2id.insert(token.to_string(), id);
            self.id2word.push(token.to_string());
        }
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.word2id.get(token).copied()
    }

    pub fn token_of(&self, id: u32) -> Option<&str> {
        self.id2word.get(id as usize).map(|s| s.as_str())
    }

    /// Id used for padding (`<pad>`).
    pub fn pad_id(&self) -> u32 {
        self.id_of(PAD_WORD).unwrap_or(0)
    }

    /// Id substituted for out-of-vocabulary tokens (`<unk>`).
    pub fn unk_id(&self) -> u32 {
        self.id_of(UNK_WORD).unwrap_or(0)
    }

    /// Map a token to its id, falling back to `<unk>` — this is
    /// the only lookup the packager uses, and it never fails.
    pub fn id_or_unk(&self, token: &str) -> u32 {
        self.id_of(token).unwrap_or_else(|| self.unk_id())
    }

    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    /// Iterate `(token, id)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.id2word
            .iter()
            .enumerate()
            .map(|(id, w)| (w.as_str(), id as u32))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specials_occupy_first_ids_in_order() {
        let v = Vocabulary::with_default_specials(["alpha", "beta"]);
        assert_eq!(v.id_of(PAD_WORD), Some(0));
        assert_eq!(v.id_of(UNK_WORD), Some(1));
        assert_eq!(v.pad_id(), 0);
        assert_eq!(v.unk_id(), 1);
    }

    #[test]
    fn test_dense_contiguous_ids() {
        let tokens = ["the", "cat", "sat", "on", "the", "mat"];
        let v = Vocabulary::with_default_specials(tokens);
        // 5 distinct words + 2 specials
        assert_eq!(v.len(), 7);
        for id in 0..v.len() as u32 {
            let word = v.token_of(id).expect("dense range");
            assert_eq!(v.id_of(word), Some(id));
        }
    }

    #[test]
    fn test_first_occurrence_order() {
        let v = Vocabulary::with_default_specials(["b", "a", "b", "c"]);
        assert_eq!(v.id_of("b"), Some(2));
        assert_eq!(v.id_of("a"), Some(3));
        assert_eq!(v.id_of("c"), Some(4));
    }

    #[test]
    fn test_empty_stream_keeps_only_specials() {
        let v = Vocabulary::with_default_specials(Vec::<String>::new());
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_unknown_token_falls_back_to_unk() {
        let v = Vocabulary::with_default_specials(["known"]);
        assert_eq!(v.id_or_unk("known"), 2);
        assert_eq!(v.id_or_unk("missing"), v.unk_id());
    }

    #[test]
    fn test_roundtrips_through_json() {
        let v = Vocabulary::with_default_specials(["x", "y"]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), v.len());
        assert_eq!(back.id_of("y"), v.id_of("y"));
    }
}
