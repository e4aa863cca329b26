// ============================================================
// Layer 4 — Dataset Store
// ============================================================
// Owns the unified on-disk representation of a corpus:
//
//   {save_dir}/{schema}_processed_{tokenization}.json
//     dict_m — vocabulary + dynamic hierarchy + label metadata
//     data_m — tokenised examples + label tuples (+ tabular
//              label→id maps)
//
// `DataStore::load` uses the cache when it exists and only falls
// back to a full re-preprocess when it is absent. The train/test
// index split lives here too: one seeded shuffle at load time,
// immutable afterwards unless the ratio changes.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::corpus::{self, RawCorpus};
use crate::data::hierarchy::{index_labels, DecoderLabels, DynaEntry, DynamicDict, LabelMeta};
use crate::data::vocab::Vocabulary;
use crate::domain::{CorpusSchema, Tokenization};

/// Everything needed to open (or build) a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory for the preprocessing cache, usually
    /// `{save_root}/{experiment_name}`.
    pub save_dir: PathBuf,
    /// Fraction of examples assigned to the train split.
    pub split_ratio: f64,
    /// Also build decoder-ready label sequences.
    pub decoder_ready: bool,
    /// Seed for the split shuffle.
    pub seed: u64,
}

// ─── Cache document ───────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub(crate) struct DictSection {
    vocab: Vocabulary,
    dyna_dict: Vec<DynaEntry>,
    label_meta: LabelMeta,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct DataSection {
    examples: Vec<Vec<String>>,
    label_tuples: Vec<Vec<i64>>,
    class_maps: Option<Vec<HashMap<String, i64>>>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct CacheDoc {
    dict_m: DictSection,
    data_m: DataSection,
}

// ─── DataStore ────────────────────────────────────────────────────────────────

/// Preprocessed corpus plus its dictionaries and split. Built
/// once, single-threaded, then treated as read-only by training.
pub struct DataStore {
    pub vocab: Vocabulary,
    pub dyna_dict: DynamicDict,
    pub label_meta: LabelMeta,
    pub examples: Vec<Vec<String>>,
    pub label_tuples: Vec<Vec<i64>>,
    /// Tabular schema only: per-level label-string → id maps.
    pub class_maps: Option<Vec<HashMap<String, i64>>>,
    /// Present when the store was opened with `decoder_ready`.
    pub decoder_labels: Option<DecoderLabels>,

    train_indices: Vec<usize>,
    test_indices: Vec<usize>,
    split_ratio: f64,
    seed: u64,
}

impl DataStore {
    /// Open the cached representation for `(schema, tokenization)`
    /// or preprocess `source` from scratch and cache the result.
    pub fn load(
        schema: CorpusSchema,
        source: &Path,
        tokenization: Tokenization,
        opts: &StoreOptions,
    ) -> Result<Self> {
        let cache = cache_path(&opts.save_dir, schema, tokenization);
        let doc = if cache.exists() {
            tracing::info!("Loading previously preprocessed data from '{}'", cache.display());
            read_cache(&cache)?
        } else {
            tracing::info!("No cache at '{}', preprocessing...", cache.display());
            preprocess(schema, source, tokenization, &opts.save_dir)?
        };

        let decoder_labels = opts
            .decoder_ready
            .then(|| DecoderLabels::build(&doc.data_m.label_tuples));

        let mut store = Self {
            vocab: doc.dict_m.vocab,
            dyna_dict: DynamicDict::from_entries(doc.dict_m.dyna_dict),
            label_meta: doc.dict_m.label_meta,
            examples: doc.data_m.examples,
            label_tuples: doc.data_m.label_tuples,
            class_maps: doc.data_m.class_maps,
            decoder_labels,
            train_indices: Vec::new(),
            test_indices: Vec::new(),
            split_ratio: opts.split_ratio,
            seed: opts.seed,
        };
        store.split_indices();
        Ok(store)
    }

    /// Number of examples in the corpus.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    pub fn test_indices(&self) -> &[usize] {
        &self.test_indices
    }

    /// Tokens and full label tuple for one example.
    pub fn row(&self, index: usize) -> (&[String], &[i64]) {
        (&self.examples[index], &self.label_tuples[index])
    }

    /// Classification target for `index` at `level`, clamped to
    /// the example's deepest level for shallow tuples.
    pub fn target_at(&self, index: usize, level: usize) -> i64 {
        let tuple = &self.label_tuples[index];
        tuple[level.min(tuple.len() - 1)]
    }

    /// Change the split ratio. Triggers a fresh shuffle; the old
    /// partition is discarded.
    pub fn set_split_ratio(&mut self, ratio: f64) {
        self.split_ratio = ratio;
        self.split_indices();
    }

    // One seeded shuffle of all indices, then a floor cut. The
    // two sides are disjoint and cover the whole corpus.
    fn split_indices(&mut self) {
        let mut indices: Vec<usize> = (0..self.examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);
        let num_train = ((indices.len() as f64) * self.split_ratio).floor() as usize;
        let num_train = num_train.min(indices.len());
        self.test_indices = indices.split_off(num_train);
        self.train_indices = indices;
        tracing::debug!(
            "Split {} examples into {} train / {} test",
            self.examples.len(),
            self.train_indices.len(),
            self.test_indices.len(),
        );
    }
}

pub fn cache_path(save_dir: &Path, schema: CorpusSchema, tokenization: Tokenization) -> PathBuf {
    save_dir.join(format!("{schema}_processed_{tokenization}.json"))
}

fn read_cache(path: &Path) -> Result<CacheDoc> {
    let file = File::open(path)
        .with_context(|| format!("cannot open preprocessing cache '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("malformed preprocessing cache '{}'", path.display()))
}

/// Full preprocessing pass: read the raw schema, build the
/// vocabulary and hierarchy dictionaries, persist the cache
/// document, and return it.
pub(crate) fn preprocess(
    schema: CorpusSchema,
    source: &Path,
    tokenization: Tokenization,
    save_dir: &Path,
) -> Result<CacheDoc> {
    let RawCorpus { examples, class_maps } = match schema {
        CorpusSchema::PlainText => corpus::read_plain_text(source, tokenization)?,
        CorpusSchema::Tabular => corpus::read_tabular(source, tokenization)?,
    };

    // A labelless example is broken input, not something to
    // recover from.
    ensure!(
        examples.iter().all(|e| e.depth() > 0),
        "corpus is inconsistent: found an example with no labels"
    );

    let (documents, label_tuples): (Vec<_>, Vec<_>) = examples
        .into_iter()
        .map(|e| (e.tokens, e.labels))
        .unzip();

    let vocab = Vocabulary::with_default_specials(documents.iter().flatten());
    let (dyna_dict, label_meta) = index_labels(&label_tuples);
    tracing::info!(
        "Preprocessed {} examples: vocab={} tokens, {} hierarchy nodes, {} levels",
        documents.len(),
        vocab.len(),
        dyna_dict.node_count(),
        label_meta.num_levels(),
    );

    let doc = CacheDoc {
        dict_m: DictSection {
            vocab,
            dyna_dict: dyna_dict.to_entries(),
            label_meta,
        },
        data_m: DataSection {
            examples: documents,
            label_tuples,
            class_maps,
        },
    };

    fs::create_dir_all(save_dir)
        .with_context(|| format!("cannot create save dir '{}'", save_dir.display()))?;
    let path = cache_path(save_dir, schema, tokenization);
    let file = File::create(&path)
        .with_context(|| format!("cannot write preprocessing cache '{}'", path.display()))?;
    serde_json::to_writer(file, &doc)?;
    tracing::info!("Wrote preprocessing cache '{}'", path.display());

    Ok(doc)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_plain_corpus(dir: &Path, n: usize) {
        let mut x = String::new();
        let mut y1 = String::new();
        let mut y2 = String::new();
        let mut y3 = String::new();
        for i in 0..n {
            x.push_str(&format!("document number {} with shared words\n", i));
            y1.push_str(&format!("{}\n", i % 2));
            y2.push_str(&format!("{}\n", i % 3));
            y3.push_str(&format!("{}\n", i % 4));
        }
        std::fs::write(dir.join("X.txt"), x).unwrap();
        std::fs::write(dir.join("YL1.txt"), y1).unwrap();
        std::fs::write(dir.join("YL2.txt"), y2).unwrap();
        std::fs::write(dir.join("Y.txt"), y3).unwrap();
    }

    fn options(save_dir: &Path) -> StoreOptions {
        StoreOptions {
            save_dir: save_dir.to_path_buf(),
            split_ratio: 0.8,
            decoder_ready: false,
            seed: 13,
        }
    }

    #[test]
    fn test_preprocess_then_cached_load_agree() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        write_plain_corpus(data_dir.path(), 10);
        let opts = options(save_dir.path());

        let first = DataStore::load(
            CorpusSchema::PlainText,
            data_dir.path(),
            Tokenization::Whitespace,
            &opts,
        )
        .unwrap();
        assert!(cache_path(save_dir.path(), CorpusSchema::PlainText, Tokenization::Whitespace)
            .exists());

        // Second load must come from the cache; wiping the raw
        // corpus proves it is never re-read.
        std::fs::remove_file(data_dir.path().join("X.txt")).unwrap();
        let second = DataStore::load(
            CorpusSchema::PlainText,
            data_dir.path(),
            Tokenization::Whitespace,
            &opts,
        )
        .unwrap();
        assert_eq!(second.len(), first.len());
        assert_eq!(second.vocab.len(), first.vocab.len());
        assert_eq!(second.label_tuples, first.label_tuples);
    }

    #[test]
    fn test_split_is_disjoint_and_floored() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        write_plain_corpus(data_dir.path(), 10);

        let store = DataStore::load(
            CorpusSchema::PlainText,
            data_dir.path(),
            Tokenization::Whitespace,
            &options(save_dir.path()),
        )
        .unwrap();
        assert_eq!(store.train_indices().len(), 8);
        assert_eq!(store.test_indices().len(), 2);
        let mut all: Vec<usize> = store
            .train_indices()
            .iter()
            .chain(store.test_indices())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_ratio_change_reshuffles() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        write_plain_corpus(data_dir.path(), 10);

        let mut store = DataStore::load(
            CorpusSchema::PlainText,
            data_dir.path(),
            Tokenization::Whitespace,
            &options(save_dir.path()),
        )
        .unwrap();
        store.set_split_ratio(0.5);
        assert_eq!(store.train_indices().len(), 5);
        assert_eq!(store.test_indices().len(), 5);
    }

    #[test]
    fn test_decoder_ready_mode_builds_sequences() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        write_plain_corpus(data_dir.path(), 6);
        let mut opts = options(save_dir.path());
        opts.decoder_ready = true;

        let store = DataStore::load(
            CorpusSchema::PlainText,
            data_dir.path(),
            Tokenization::Whitespace,
            &opts,
        )
        .unwrap();
        let dec = store.decoder_labels.expect("decoder labels requested");
        assert_eq!(dec.sequences.len(), 6);
        assert!(dec.sequences.iter().all(|s| s[0] == 0));
    }

    #[test]
    fn test_target_level_clamped_for_shallow_tuples() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        write_plain_corpus(data_dir.path(), 4);

        let store = DataStore::load(
            CorpusSchema::PlainText,
            data_dir.path(),
            Tokenization::Whitespace,
            &options(save_dir.path()),
        )
        .unwrap();
        assert_eq!(store.target_at(1, 2), store.label_tuples[1][2]);
        assert_eq!(store.target_at(1, 99), store.label_tuples[1][2]);
    }

    #[test]
    fn test_tabular_cache_keeps_class_maps() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        let csv_path = data_dir.path().join("docs.csv");
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "l1,l2,l3,text").unwrap();
        writeln!(f, "a,b,c,hello there").unwrap();
        writeln!(f, "a,d,e,general kenobi").unwrap();
        drop(f);

        let store = DataStore::load(
            CorpusSchema::Tabular,
            &csv_path,
            Tokenization::Word,
            &options(save_dir.path()),
        )
        .unwrap();
        let maps = store.class_maps.as_ref().unwrap();
        assert_eq!(maps[0].len(), 1);
        assert_eq!(maps[1].len(), 2);
    }
}
