//! Self-attentive text classification over hierarchically
//! labeled corpora.
//!
//! The crate turns a raw corpus (aligned plain-text files or a
//! labeled CSV) into an indexed, cached dataset with per-level
//! label dictionaries, then trains an LSTM classifier with
//! multi-hop self-attention on it, regularized by an
//! attention-diversity penalty. Layers, top to bottom:
//!
//!   cli         → argument parsing, signal handling
//!   application → one use case per command
//!   domain      → corpus-shape types shared by all layers
//!   data        → tokenization, vocab, label hierarchy, batching
//!   ml          → the model and the training loop
//!   infra       → checkpoints and metrics on disk

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
