// ============================================================
// Layer 4 — Batch Packager
// ============================================================
// Converts a slice of `(tokens, target)` rows into the fixed
// shape tensors the model consumes:
//
//   Input:  N rows with sequences of varying length
//   Output: data    [seq_len, N]  Int  (sequence-length-major)
//           targets [N]           Int
//
// Padding is batch-local: seq_len is the longest sequence in
// THIS batch, capped at `max_len`, so different batches may have
// different widths. Longer sequences are truncated from the
// tail; shorter ones are right-padded with `<pad>`. Tokens
// missing from the vocabulary become `<unk>` — never an error.
//
// Packaging never reorders rows: shuffling, if wanted, happens
// before slicing the batch.

use burn::prelude::*;

use crate::data::vocab::Vocabulary;

/// Default ceiling on tokens per example, bounding the compute
/// and memory of one forward pass.
pub const DEFAULT_MAX_TOKENS: usize = 500;

/// One row handed to the packager: a borrowed token sequence
/// plus its numeric target.
pub type Row<'a> = (&'a [String], i64);

#[derive(Debug, Clone)]
pub struct BatchPackager<B: Backend> {
    vocab: Vocabulary,
    max_len: usize,
    device: B::Device,
}

impl<B: Backend> BatchPackager<B> {
    pub fn new(vocab: Vocabulary, device: B::Device) -> Self {
        Self {
            vocab,
            max_len: DEFAULT_MAX_TOKENS,
            device,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Package one batch. Deterministic: the same rows always
    /// produce identical tensors.
    pub fn package(&self, rows: &[Row<'_>]) -> (Tensor<B, 2, Int>, Tensor<B, 1, Int>) {
        let batch_size = rows.len();

        // Batch-local width, capped.
        let longest = rows.iter().map(|(toks, _)| toks.len()).max().unwrap_or(0);
        let seq_len = longest.min(self.max_len).max(1);

        // Map to ids, truncate, right-pad — flattened batch-major
        // first, transposed to [seq, batch] at the end.
        let pad = self.vocab.pad_id() as i32;
        let mut flat: Vec<i32> = Vec::with_capacity(batch_size * seq_len);
        for (tokens, _) in rows {
            for tok in tokens.iter().take(seq_len) {
                flat.push(self.vocab.id_or_unk(tok) as i32);
            }
            for _ in tokens.len().min(seq_len)..seq_len {
                flat.push(pad);
            }
        }

        let targets: Vec<i32> = rows.iter().map(|(_, y)| *y as i32).collect();

        let data = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
            .swap_dims(0, 1);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        (data, targets)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray;

    fn packager(max_len: usize) -> BatchPackager<B> {
        let vocab = Vocabulary::with_default_specials(["red", "green", "blue"]);
        BatchPackager::new(vocab, Default::default()).with_max_len(max_len)
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shape_is_sequence_major() {
        let p = packager(500);
        let a = words(&["red", "green", "blue"]);
        let b = words(&["blue"]);
        let rows = vec![(a.as_slice(), 0), (b.as_slice(), 1)];
        let (data, targets) = p.package(&rows);
        assert_eq!(data.dims(), [3, 2]);
        assert_eq!(targets.dims(), [2]);
    }

    #[test]
    fn test_padding_and_unk_substitution() {
        let p = packager(500);
        let a = words(&["red", "mystery"]);
        let b = words(&["green"]);
        let rows = vec![(a.as_slice(), 3), (b.as_slice(), 4)];
        let (data, targets) = p.package(&rows);

        // [seq=2, batch=2] transposed back for easy reading
        let ids: Vec<i64> = data.swap_dims(0, 1).reshape([4]).into_data().to_vec().unwrap();
        let vocab = Vocabulary::with_default_specials(["red", "green", "blue"]);
        assert_eq!(
            ids,
            vec![
                vocab.id_of("red").unwrap() as i64,
                vocab.unk_id() as i64,
                vocab.id_of("green").unwrap() as i64,
                vocab.pad_id() as i64,
            ]
        );
        let t: Vec<i64> = targets.into_data().to_vec().unwrap();
        assert_eq!(t, vec![3, 4]);
    }

    #[test]
    fn test_truncation_keeps_prefix() {
        let long: Vec<String> = (0..9).map(|i| format!("w{}", i)).collect();
        let vocab = Vocabulary::with_default_specials(long.iter());
        let p = BatchPackager::<B>::new(vocab.clone(), Default::default()).with_max_len(5);

        let rows = vec![(long.as_slice(), 0)];
        let (data, _) = p.package(&rows);
        assert_eq!(data.dims(), [5, 1]);
        let ids: Vec<i64> = data.reshape([5]).into_data().to_vec().unwrap();
        let expected: Vec<i64> = long[..5]
            .iter()
            .map(|w| vocab.id_of(w).unwrap() as i64)
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_packaging_is_idempotent() {
        let p = packager(500);
        let a = words(&["blue", "red"]);
        let b = words(&["green", "green", "red"]);
        let rows = vec![(a.as_slice(), 1), (b.as_slice(), 2)];

        let (d1, t1) = p.package(&rows);
        let (d2, t2) = p.package(&rows);
        assert_eq!(d1.into_data(), d2.into_data());
        assert_eq!(t1.into_data(), t2.into_data());
    }
}
