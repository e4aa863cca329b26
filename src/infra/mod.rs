// ============================================================
// Layer 6 — Infrastructure
// ============================================================
// Filesystem-facing services shared by the use cases: model
// snapshots and the per-epoch metrics file.

pub mod checkpoint;
pub mod metrics;

pub use checkpoint::{CheckpointManager, CheckpointTag};
pub use metrics::{EpochMetrics, MetricsLogger};
