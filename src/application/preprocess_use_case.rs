// ============================================================
// Layer 2 — Preprocess Use Case
// ============================================================
// Runs the corpus pipeline on its own and reports what was
// built. Training triggers the same work lazily on a cache
// miss; this use case exists so the expensive pass can be done
// up front (or redone after the raw data changes).

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::data::{DataStore, StoreOptions};
use crate::domain::{CorpusSchema, Tokenization};

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub data_dir: PathBuf,
    pub schema: CorpusSchema,
    pub tokenization: Tokenization,
    pub exp_name: String,
    pub save_root: PathBuf,
    pub split_ratio: f64,
    pub seed: u64,
    pub decoder_ready: bool,
    /// Rebuild even when a cache already exists.
    pub force: bool,
}

pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<DataStore> {
        let cfg = &self.config;
        let save_dir = cfg.save_root.join(&cfg.exp_name);

        if cfg.force {
            let cache = crate::data::store::cache_path(&save_dir, cfg.schema, cfg.tokenization);
            if cache.exists() {
                std::fs::remove_file(&cache)
                    .with_context(|| format!("failed to remove stale cache '{}'", cache.display()))?;
                tracing::info!("Removed stale cache '{}'", cache.display());
            }
        }

        let opts = StoreOptions {
            save_dir,
            split_ratio: cfg.split_ratio,
            decoder_ready: cfg.decoder_ready,
            seed: cfg.seed,
        };
        let store = DataStore::load(cfg.schema, &cfg.data_dir, cfg.tokenization, &opts)
            .with_context(|| format!("failed to preprocess '{}'", cfg.data_dir.display()))?;

        tracing::info!(
            "preprocessing done: {} examples ({} train / {} test), vocab {} words, {} label levels",
            store.len(),
            store.train_indices().len(),
            store.test_indices().len(),
            store.vocab.len(),
            store.label_meta.num_levels(),
        );
        Ok(store)
    }
}
