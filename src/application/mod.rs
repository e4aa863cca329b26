// ============================================================
// Layer 2 — Application
// ============================================================
// One use case per top-level command. Use cases own the
// orchestration (data store → model → training loop) and stay
// free of argument parsing and signal handling, so tests can
// drive them directly.

pub mod preprocess_use_case;
pub mod train_use_case;

pub use preprocess_use_case::{PreprocessConfig, PreprocessUseCase};
pub use train_use_case::{TrainConfig, TrainUseCase};
