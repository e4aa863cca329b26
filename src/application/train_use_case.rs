// ============================================================
// Layer 2 — Train Use Case
// ============================================================
// Wires a full run together: open (or build) the data store,
// optionally pull in pretrained word vectors, size the model
// from the label metadata, then hand everything to the training
// loop. The cancel flag is injected by the caller; this layer
// never installs signal handlers so runs stay scriptable.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{load_embedding, DataStore, StoreOptions, DEFAULT_MAX_TOKENS};
use crate::domain::{CorpusSchema, Tokenization};
use crate::infra::{CheckpointManager, MetricsLogger};
use crate::ml::model::{AttnClassifierConfig, PoolingMode};
use crate::ml::trainer::{run_training, TrainBackend};

/// Everything one run needs, persisted alongside its
/// checkpoints so an experiment can be reproduced later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    // ─── Data ───
    pub data_dir: PathBuf,
    pub schema: CorpusSchema,
    pub tokenization: Tokenization,
    pub exp_name: String,
    pub save_root: PathBuf,
    pub split_ratio: f64,
    pub seed: u64,
    pub decoder_ready: bool,
    /// Which level of the label tuple to classify against.
    pub target_level: usize,
    pub max_tokens: usize,

    // ─── Optimization ───
    pub epochs: usize,
    pub batch_size: usize,
    pub lr: f64,
    pub clip: f32,
    pub penalty_coeff: f64,
    pub log_interval: usize,
    pub optimizer: String,

    // ─── Model ───
    pub input_embedding_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub attention_unit_size: usize,
    pub attention_hops: usize,
    pub fc_size: usize,
    pub dropout: f64,
    pub pooling_mode: PoolingMode,
    /// Optional word2vec-style text file of pretrained vectors.
    pub word_vector: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            schema: CorpusSchema::PlainText,
            tokenization: Tokenization::Word,
            exp_name: "default".to_string(),
            save_root: PathBuf::from("saved"),
            split_ratio: 0.8,
            seed: 1111,
            decoder_ready: false,
            target_level: 2,
            max_tokens: DEFAULT_MAX_TOKENS,
            epochs: 10,
            batch_size: 32,
            lr: 0.001,
            clip: 0.5,
            penalty_coeff: 1.0,
            log_interval: 10,
            optimizer: "adam".to_string(),
            input_embedding_size: 128,
            hidden_size: 128,
            num_layers: 1,
            attention_unit_size: 64,
            attention_hops: 4,
            fc_size: 256,
            dropout: 0.5,
            pooling_mode: PoolingMode::Attention,
            word_vector: None,
        }
    }
}

impl TrainConfig {
    /// `{save_root}/{exp_name}` — cache, checkpoints and metrics
    /// all live under here.
    pub fn experiment_dir(&self) -> PathBuf {
        self.save_root.join(&self.exp_name)
    }
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, cancel: Arc<AtomicBool>) -> Result<()> {
        let cfg = &self.config;
        ensure!(cfg.epochs > 0, "epochs must be at least 1");
        ensure!(cfg.batch_size > 0, "batch size must be at least 1");

        let exp_dir = cfg.experiment_dir();
        let store = open_store(cfg)?;
        tracing::info!(
            "corpus ready: {} examples, vocab {} words, {} label levels",
            store.len(),
            store.vocab.len(),
            store.label_meta.num_levels(),
        );

        ensure!(
            cfg.target_level < store.label_meta.num_levels(),
            "target level {} out of range (corpus has {} levels)",
            cfg.target_level,
            store.label_meta.num_levels(),
        );
        let num_classes = store.label_meta.num_classes(cfg.target_level);

        let pretrained = match &cfg.word_vector {
            Some(path) => Some(load_embedding(
                Some(path.as_path()),
                &exp_dir.join("embeddings.json"),
                cfg.input_embedding_size,
                &store.vocab,
            )?),
            None => None,
        };

        let device = Default::default();
        let model = AttnClassifierConfig::new(store.vocab.len(), num_classes)
            .with_input_embedding_size(cfg.input_embedding_size)
            .with_hidden_size(cfg.hidden_size)
            .with_num_layers(cfg.num_layers)
            .with_attention_unit_size(cfg.attention_unit_size)
            .with_attention_hops(cfg.attention_hops)
            .with_fc_size(cfg.fc_size)
            .with_dropout(cfg.dropout)
            .with_pooling_mode(cfg.pooling_mode)
            .init::<TrainBackend>(&device, pretrained.as_ref());

        let ckpt = CheckpointManager::new(exp_dir.join("checkpoints"))?;
        ckpt.save_config(cfg)?;
        let metrics = MetricsLogger::new(exp_dir.join("metrics.csv"))?;

        run_training(cfg, &store, model, &ckpt, &metrics, cancel)
    }
}

fn open_store(cfg: &TrainConfig) -> Result<DataStore> {
    let opts = StoreOptions {
        save_dir: cfg.experiment_dir(),
        split_ratio: cfg.split_ratio,
        decoder_ready: cfg.decoder_ready,
        seed: cfg.seed,
    };
    DataStore::load(cfg.schema, source_path(cfg), cfg.tokenization, &opts)
        .with_context(|| format!("failed to open corpus under '{}'", cfg.data_dir.display()))
}

/// Plain-text corpora are a directory of aligned files; tabular
/// ones are a single CSV inside the data directory.
fn source_path(cfg: &TrainConfig) -> &Path {
    &cfg.data_dir
}
