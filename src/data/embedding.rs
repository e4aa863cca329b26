// ============================================================
// Layer 4 — Embedding Loader
// ============================================================
// Builds a (vocab_size × dim) matrix aligned row-for-row with
// the vocabulary ids:
//
//   1. Every entry starts as a draw from N(0, 1), so words the
//      pretrained file never mentions still get a usable row.
//   2. The pretrained file is streamed once, line by line; each
//      line whose word is in the vocabulary overwrites that
//      word's row with the parsed vector, exactly.
//   3. The finished matrix is cached as JSON keyed by the
//      experiment, and a cache hit short-circuits everything —
//      the cached matrix is returned verbatim, with no
//      validation against the current vocabulary (caller's
//      responsibility).
//
// Some pretrained formats carry a `count dim` summary as the
// first line; a two-field first line is skipped. Every other
// line must hold exactly `dim + 1` fields — anything else means
// row alignment can no longer be trusted, so the load aborts.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use burn::prelude::*;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::data::vocab::Vocabulary;

/// Dense row-major matrix: `data[row * dim .. (row + 1) * dim]`
/// is the vector for vocabulary id `row`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    pub rows: usize,
    pub dim: usize,
    pub data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    /// Move the matrix onto a device for model construction.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data(
            TensorData::new(self.data.clone(), [self.rows, self.dim]),
            device,
        )
    }
}

/// Load the cached matrix at `cache_path`, or build it from
/// `pretrained_file` and cache it.
pub fn load_embedding(
    pretrained_file: Option<&Path>,
    cache_path: &Path,
    dim: usize,
    vocab: &Vocabulary,
) -> Result<EmbeddingMatrix> {
    if cache_path.is_file() {
        tracing::info!("Loading cached embedding matrix '{}'", cache_path.display());
        let file = File::open(cache_path)
            .with_context(|| format!("cannot open embedding cache '{}'", cache_path.display()))?;
        return serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed embedding cache '{}'", cache_path.display()));
    }

    let Some(pretrained_file) = pretrained_file else {
        bail!("tried to load embeddings with no embedding file and no cache");
    };

    let mut matrix = random_matrix(vocab.len(), dim);
    let matched = fill_from_pretrained(&mut matrix, pretrained_file, vocab)?;
    tracing::info!(
        "Embedding matrix built: {}/{} vocabulary words matched pretrained vectors",
        matched,
        vocab.len(),
    );

    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create '{}'", parent.display()))?;
    }
    let out = File::create(cache_path)
        .with_context(|| format!("cannot write embedding cache '{}'", cache_path.display()))?;
    serde_json::to_writer(out, &matrix)?;

    Ok(matrix)
}

fn random_matrix(rows: usize, dim: usize) -> EmbeddingMatrix {
    let mut rng = rand::thread_rng();
    let data = (0..rows * dim)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();
    EmbeddingMatrix { rows, dim, data }
}

// Single streaming pass over the pretrained file. Returns the
// number of vocabulary rows overwritten.
fn fill_from_pretrained(
    matrix: &mut EmbeddingMatrix,
    path: &Path,
    vocab: &Vocabulary,
) -> Result<usize> {
    let file = File::open(path)
        .with_context(|| format!("cannot open pretrained vectors '{}'", path.display()))?;
    let dim = matrix.dim;
    let mut matched = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if line_no == 0 && fields.len() == 2 {
            // `count dim` summary header
            continue;
        }
        ensure!(
            fields.len() == dim + 1,
            "'{}' line {}: expected {} fields (word + {} floats), found {}",
            path.display(),
            line_no + 1,
            dim + 1,
            dim,
            fields.len()
        );
        let Some(id) = vocab.id_of(fields[0]) else {
            continue;
        };
        let row_start = id as usize * dim;
        for (k, field) in fields[1..].iter().enumerate() {
            matrix.data[row_start + k] = field.parse::<f32>().with_context(|| {
                format!("'{}' line {}: bad float '{}'", path.display(), line_no + 1, field)
            })?;
        }
        matched += 1;
    }
    Ok(matched)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toy_vocab() -> Vocabulary {
        Vocabulary::with_default_specials(["apple", "banana"])
    }

    #[test]
    fn test_shape_and_exact_row_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let vec_path = dir.path().join("vectors.txt");
        let cache = dir.path().join("emb.json");
        let mut f = File::create(&vec_path).unwrap();
        writeln!(f, "apple 0.5 -1.25 3.0").unwrap();
        writeln!(f, "unlisted 9.0 9.0 9.0").unwrap();
        drop(f);

        let vocab = toy_vocab();
        let m = load_embedding(Some(&vec_path), &cache, 3, &vocab).unwrap();
        assert_eq!(m.rows, vocab.len());
        assert_eq!(m.dim, 3);
        let apple = vocab.id_of("apple").unwrap() as usize;
        assert_eq!(m.row(apple), &[0.5, -1.25, 3.0]);
    }

    #[test]
    fn test_header_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let vec_path = dir.path().join("vectors.txt");
        let mut f = File::create(&vec_path).unwrap();
        writeln!(f, "2 2").unwrap();
        writeln!(f, "banana 1.0 2.0").unwrap();
        drop(f);

        let vocab = toy_vocab();
        let m = load_embedding(Some(&vec_path), &dir.path().join("c.json"), 2, &vocab).unwrap();
        let banana = vocab.id_of("banana").unwrap() as usize;
        assert_eq!(m.row(banana), &[1.0, 2.0]);
    }

    #[test]
    fn test_wrong_field_count_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let vec_path = dir.path().join("vectors.txt");
        let mut f = File::create(&vec_path).unwrap();
        writeln!(f, "apple 1.0 2.0 3.0").unwrap();
        writeln!(f, "banana 1.0").unwrap();
        drop(f);

        let err =
            load_embedding(Some(&vec_path), &dir.path().join("c.json"), 3, &toy_vocab())
                .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_missing_file_without_cache_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_embedding(None, &dir.path().join("c.json"), 4, &toy_vocab()).unwrap_err();
        assert!(err.to_string().contains("no embedding file"));
    }

    #[test]
    fn test_cache_hit_returns_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("emb.json");
        let canned = EmbeddingMatrix {
            rows: 2,
            dim: 2,
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        serde_json::to_writer(File::create(&cache).unwrap(), &canned).unwrap();

        // No pretrained file needed, and no vocabulary check.
        let m = load_embedding(None, &cache, 2, &toy_vocab()).unwrap();
        assert_eq!(m.data, canned.data);
    }

    #[test]
    fn test_unmatched_rows_are_standard_normal_ish() {
        let dir = tempfile::tempdir().unwrap();
        let vec_path = dir.path().join("vectors.txt");
        File::create(&vec_path).unwrap();

        let m = load_embedding(Some(&vec_path), &dir.path().join("c.json"), 50, &toy_vocab())
            .unwrap();
        // 4 rows × 50 dims of N(0,1) draws: the mean should sit
        // near zero and values should not all be equal.
        let mean: f32 = m.data.iter().sum::<f32>() / m.data.len() as f32;
        assert!(mean.abs() < 0.5);
        assert!(m.data.iter().any(|&v| (v - m.data[0]).abs() > 1e-6));
    }
}
