// ============================================================
// Layer 1 — CLI
// ============================================================

pub mod commands;

pub use commands::Cli;
