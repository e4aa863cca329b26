// ============================================================
// Layer 1 — Command-Line Interface
// ============================================================
// Flags map one-to-one onto the use-case configs; defaults here
// mirror `TrainConfig::default()` so a config written next to a
// checkpoint matches what the flags would have produced. Ctrl-C
// is wired up here and nowhere else — the use cases only ever
// see the shared flag.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{PreprocessConfig, PreprocessUseCase, TrainConfig, TrainUseCase};
use crate::domain::{CorpusSchema, Tokenization};
use crate::ml::model::PoolingMode;

#[derive(Parser, Debug)]
#[command(
    name = "hier-attn",
    about = "Self-attentive text classification over hierarchically labeled corpora",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the tokenized/indexed corpus cache without training
    Preprocess {
        /// Corpus location: a directory of aligned text files
        /// (plaintext schema) or a CSV file (tabular schema)
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = CorpusSchema::PlainText)]
        schema: CorpusSchema,
        #[arg(long, value_enum, default_value_t = Tokenization::Word)]
        tokenization: Tokenization,
        /// Experiment name; outputs land in {save-root}/{exp-name}
        #[arg(long, default_value = "default")]
        exp_name: String,
        #[arg(long, default_value = "saved")]
        save_root: PathBuf,
        #[arg(long, default_value_t = 0.8)]
        split_ratio: f64,
        #[arg(long, default_value_t = 1111)]
        seed: u64,
        /// Also build start-prefixed label id sequences for
        /// sequence decoders
        #[arg(long)]
        decoder_ready: bool,
        /// Rebuild even if a cache is already present
        #[arg(long)]
        force: bool,
    },
    /// Train the classifier (preprocesses first on a cache miss)
    Train {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = CorpusSchema::PlainText)]
        schema: CorpusSchema,
        #[arg(long, value_enum, default_value_t = Tokenization::Word)]
        tokenization: Tokenization,
        #[arg(long, default_value = "default")]
        exp_name: String,
        #[arg(long, default_value = "saved")]
        save_root: PathBuf,
        #[arg(long, default_value_t = 0.8)]
        split_ratio: f64,
        #[arg(long, default_value_t = 1111)]
        seed: u64,
        #[arg(long)]
        decoder_ready: bool,
        /// Label level to classify (0 = coarsest)
        #[arg(long, default_value_t = 2)]
        target_level: usize,
        /// Documents longer than this many tokens are truncated
        #[arg(long, default_value_t = 500)]
        max_tokens: usize,

        #[arg(long, default_value_t = 10)]
        epochs: usize,
        #[arg(long, default_value_t = 32)]
        batch_size: usize,
        #[arg(long, default_value_t = 0.001)]
        lr: f64,
        /// Gradient-norm clipping threshold
        #[arg(long, default_value_t = 0.5)]
        clip: f32,
        /// Coefficient on the attention-diversity penalty
        #[arg(long, default_value_t = 1.0)]
        penalty_coeff: f64,
        /// Batches between training-progress log lines
        #[arg(long, default_value_t = 10)]
        log_interval: usize,
        /// adam or sgd
        #[arg(long, default_value = "adam")]
        optimizer: String,

        #[arg(long, default_value_t = 128)]
        emsize: usize,
        #[arg(long, default_value_t = 128)]
        nhid: usize,
        #[arg(long, default_value_t = 1)]
        nlayers: usize,
        #[arg(long, default_value_t = 64)]
        attention_unit: usize,
        #[arg(long, default_value_t = 4)]
        attention_hops: usize,
        #[arg(long, default_value_t = 256)]
        fc_size: usize,
        #[arg(long, default_value_t = 0.5)]
        dropout: f64,
        #[arg(long, value_enum, default_value_t = PoolingMode::Attention)]
        pooling: PoolingMode,
        /// Pretrained word vectors (word2vec text format)
        #[arg(long)]
        word_vector: Option<PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess {
                data_dir,
                schema,
                tokenization,
                exp_name,
                save_root,
                split_ratio,
                seed,
                decoder_ready,
                force,
            } => {
                let use_case = PreprocessUseCase::new(PreprocessConfig {
                    data_dir,
                    schema,
                    tokenization,
                    exp_name,
                    save_root,
                    split_ratio,
                    seed,
                    decoder_ready,
                    force,
                });
                use_case.execute().map(|_| ())
            }
            Commands::Train {
                data_dir,
                schema,
                tokenization,
                exp_name,
                save_root,
                split_ratio,
                seed,
                decoder_ready,
                target_level,
                max_tokens,
                epochs,
                batch_size,
                lr,
                clip,
                penalty_coeff,
                log_interval,
                optimizer,
                emsize,
                nhid,
                nlayers,
                attention_unit,
                attention_hops,
                fc_size,
                dropout,
                pooling,
                word_vector,
            } => {
                let config = TrainConfig {
                    data_dir,
                    schema,
                    tokenization,
                    exp_name,
                    save_root,
                    split_ratio,
                    seed,
                    decoder_ready,
                    target_level,
                    max_tokens,
                    epochs,
                    batch_size,
                    lr,
                    clip,
                    penalty_coeff,
                    log_interval,
                    optimizer,
                    input_embedding_size: emsize,
                    hidden_size: nhid,
                    num_layers: nlayers,
                    attention_unit_size: attention_unit,
                    attention_hops,
                    fc_size,
                    dropout,
                    pooling_mode: pooling,
                    word_vector,
                };
                run_train(config)
            }
        }
    }
}

fn run_train(config: TrainConfig) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, finishing current batch...");
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("failed to install interrupt handler")?;

    TrainUseCase::new(config).execute(cancel)
}
