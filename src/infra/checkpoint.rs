// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists model snapshots and the run configuration under one
// experiment directory. Three snapshot roles exist side by side:
//
//   model_best_loss   — lowest validation loss so far
//   model_best_acc    — highest validation accuracy so far
//   model_epoch_{n}   — unconditional end-of-epoch snapshot
//
// Snapshots go through burn's CompactRecorder (the recorder
// owns the on-disk extension); the config and the latest-epoch
// marker are plain JSON next to them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use burn::{
    module::Module,
    record::CompactRecorder,
    tensor::backend::Backend,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const CONFIG_FILE: &str = "train_config.json";
const LATEST_FILE: &str = "latest_epoch.json";

/// Which role a snapshot plays within the experiment directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTag {
    BestLoss,
    BestAcc,
    Epoch(usize),
}

impl CheckpointTag {
    /// Filename without the recorder's extension.
    pub fn file_stem(&self) -> String {
        match self {
            CheckpointTag::BestLoss => "model_best_loss".to_string(),
            CheckpointTag::BestAcc => "model_best_acc".to_string(),
            CheckpointTag::Epoch(n) => format!("model_epoch_{n}"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestMarker {
    epoch: usize,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create checkpoint dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save<B: Backend, M: Module<B>>(&self, model: &M, tag: CheckpointTag) -> Result<()> {
        let path = self.dir.join(tag.file_stem());
        model
            .clone()
            .save_file(path, &CompactRecorder::new())
            .map_err(|e| anyhow!("failed to save checkpoint {}: {e}", tag.file_stem()))?;

        if let CheckpointTag::Epoch(epoch) = tag {
            let marker = serde_json::to_string(&LatestMarker { epoch })?;
            fs::write(self.dir.join(LATEST_FILE), marker)
                .context("failed to write latest-epoch marker")?;
        }
        Ok(())
    }

    pub fn load<B: Backend, M: Module<B>>(
        &self,
        model: M,
        tag: CheckpointTag,
        device: &B::Device,
    ) -> Result<M> {
        let path = self.dir.join(tag.file_stem());
        model
            .load_file(path, &CompactRecorder::new(), device)
            .map_err(|e| anyhow!("failed to load checkpoint {}: {e}", tag.file_stem()))
    }

    /// Restores the most recent end-of-epoch snapshot, if one was
    /// ever written. Returns the epoch it belonged to.
    pub fn load_latest<B: Backend, M: Module<B>>(
        &self,
        model: M,
        device: &B::Device,
    ) -> Result<Option<(M, usize)>> {
        let marker_path = self.dir.join(LATEST_FILE);
        if !marker_path.exists() {
            return Ok(None);
        }
        let marker: LatestMarker = serde_json::from_str(
            &fs::read_to_string(&marker_path).context("failed to read latest-epoch marker")?,
        )?;
        let model = self.load(model, CheckpointTag::Epoch(marker.epoch), device)?;
        Ok(Some((model, marker.epoch)))
    }

    pub fn save_config<T: Serialize>(&self, config: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        fs::write(self.dir.join(CONFIG_FILE), json).context("failed to write run config")
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read run config {}", path.display()))?;
        serde_json::from_str(&json).context("failed to parse run config")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::LinearConfig;

    type B = burn::backend::NdArray;

    #[test]
    fn test_tag_file_stems() {
        assert_eq!(CheckpointTag::BestLoss.file_stem(), "model_best_loss");
        assert_eq!(CheckpointTag::BestAcc.file_stem(), "model_best_acc");
        assert_eq!(CheckpointTag::Epoch(7).file_stem(), "model_epoch_7");
    }

    #[test]
    fn test_save_writes_snapshot_and_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path().join("ckpt")).unwrap();
        let device = Default::default();
        let model = LinearConfig::new(2, 2).init::<B>(&device);

        manager.save(&model, CheckpointTag::Epoch(0)).unwrap();

        let names: Vec<String> = fs::read_dir(manager.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("model_epoch_0")));
        assert!(names.iter().any(|n| n == LATEST_FILE));
    }

    #[test]
    fn test_load_latest_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();
        let model = LinearConfig::new(3, 3).init::<B>(&device);

        manager.save(&model, CheckpointTag::Epoch(4)).unwrap();

        let fresh = LinearConfig::new(3, 3).init::<B>(&device);
        let (_restored, epoch) = manager
            .load_latest(fresh, &device)
            .unwrap()
            .unwrap();
        assert_eq!(epoch, 4);
    }

    #[test]
    fn test_load_latest_empty_dir_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();
        let model = LinearConfig::new(2, 2).init::<B>(&device);
        assert!(manager.load_latest(model, &device).unwrap().is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Toy {
            lr: f64,
            name: String,
        }
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path()).unwrap();
        let original = Toy {
            lr: 0.001,
            name: "run-1".into(),
        };
        manager.save_config(&original).unwrap();
        let loaded: Toy = manager.load_config().unwrap();
        assert_eq!(loaded, original);
    }
}
