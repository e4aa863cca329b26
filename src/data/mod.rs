// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw corpus on disk and the tensors the
// training loop consumes:
//
//   raw corpus (plain-text dir / tabular csv)
//       │
//       ▼
//   corpus readers    → tokenised docs + label tuples
//       │
//       ▼
//   Vocabulary        → stable token ids, specials first
//   index_labels      → dynamic hierarchy dict + level metadata
//       │
//       ▼
//   DataStore         → JSON cache + seeded train/test split
//       │
//       ▼
//   BatchPackager     → [seq, batch] Int tensors + targets
//
//   load_embedding    → pretrained matrix aligned to vocab ids
//                       (consumed at model construction time)
//
// Each module owns exactly one step and is testable on its own.

/// Raw schema readers and tokenization policies
pub mod corpus;

/// Pretrained word-embedding matrix, cached per experiment
pub mod embedding;

/// Dynamic parent→child label dictionary and decoder remap
pub mod hierarchy;

/// Padded, sequence-major tensor batches
pub mod packager;

/// Unified preprocessed representation, cache, and split
pub mod store;

/// Token ↔ id bijection with deterministic placement
pub mod vocab;

pub use embedding::{load_embedding, EmbeddingMatrix};
pub use hierarchy::{DecoderLabels, DynamicDict, LabelMeta, NodeKey};
pub use packager::{BatchPackager, DEFAULT_MAX_TOKENS};
pub use store::{DataStore, StoreOptions};
pub use vocab::Vocabulary;
