// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types shared by the rest of the pipeline: no Burn
// types, no file I/O, no ML code. This layer defines what a
// labeled example IS; the data and ml layers define how it
// flows.
//
// Reference: Rust Book §5 (Structs)

// A tokenised document with its hierarchy-label tuple
pub mod example;

pub use example::{CorpusSchema, LabeledExample, Tokenization};
