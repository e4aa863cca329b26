// ============================================================
// Layer 5 — Machine Learning
// ============================================================
// The self-attentive classifier and the training loop that
// drives it. Everything tensor-shaped lives here; the layers
// above only see configs, checkpoints, and metric rows.

pub mod model;
pub mod trainer;

pub use model::{AttnClassifier, AttnClassifierConfig, PoolingMode};
pub use trainer::{attention_penalty, run_training, EpochPolicy, EvalBackend, TrainBackend};
