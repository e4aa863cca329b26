// ============================================================
// Layer 5 — Self-Attentive Sentence Classifier
// ============================================================
// The model collaborator the training loop drives. Built from a
// plain configuration record so the loop itself never needs to
// know the architecture:
//
//   tokens [seq, batch]
//       │ embed (+ dropout)
//       ▼
//   stacked LSTM → H [batch, seq, hidden]
//       │
//       ├─ Attention pooling: A = softmax(ws2·tanh(ws1·H)) over
//       │   the sequence, one distribution per hop;
//       │   M = A·H stacks one weighted summary per hop
//       ├─ Mean / Max pooling: collapse the sequence directly
//       ▼
//   fc → tanh → class logits [batch, num_classes]
//
// `forward` returns the attention tensor only in attention mode;
// the `None` case is what lets the training loop skip the
// diversity penalty for penalty-free pooling variants.
//
// Reference: Lin et al. (2017) A Structured Self-Attentive
//            Sentence Embedding

use burn::{
    module::{Ignored, Param},
    nn::{
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig, Lstm,
        LstmConfig, LstmState,
    },
    prelude::*,
    tensor::activation::{softmax, tanh},
};
use serde::{Deserialize, Serialize};

use crate::data::EmbeddingMatrix;

/// How the per-token LSTM states are collapsed into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum PoolingMode {
    /// Multi-hop self-attention (produces an attention tensor).
    Attention,
    /// Mean over the sequence; no attention tensor.
    Mean,
    /// Element-wise max over the sequence; no attention tensor.
    Max,
}

impl std::fmt::Display for PoolingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolingMode::Attention => write!(f, "attention"),
            PoolingMode::Mean => write!(f, "mean"),
            PoolingMode::Max => write!(f, "max"),
        }
    }
}

/// The model configuration record. Field names follow the
/// training config one-to-one.
#[derive(Config, Debug)]
pub struct AttnClassifierConfig {
    pub vocab_size: usize,
    pub num_classes: usize,
    #[config(default = 128)]
    pub input_embedding_size: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = 64)]
    pub attention_unit_size: usize,
    #[config(default = 4)]
    pub attention_hops: usize,
    #[config(default = 256)]
    pub fc_size: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
    #[config(default = "PoolingMode::Attention")]
    pub pooling_mode: PoolingMode,
}

impl AttnClassifierConfig {
    /// Build the model. When a pretrained embedding matrix is
    /// given its rows (aligned to vocabulary ids) replace the
    /// random embedding table.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
        pretrained: Option<&EmbeddingMatrix>,
    ) -> AttnClassifier<B> {
        let mut embedding =
            EmbeddingConfig::new(self.vocab_size, self.input_embedding_size).init(device);
        if let Some(matrix) = pretrained {
            embedding.weight = Param::from_tensor(matrix.to_tensor::<B>(device));
        }

        let lstm_layers: Vec<Lstm<B>> = (0..self.num_layers)
            .map(|layer| {
                let d_input = if layer == 0 {
                    self.input_embedding_size
                } else {
                    self.hidden_size
                };
                LstmConfig::new(d_input, self.hidden_size, true).init(device)
            })
            .collect();

        // The fc layer sees one summary vector per hop in
        // attention mode, a single pooled vector otherwise.
        let pooled_size = match self.pooling_mode {
            PoolingMode::Attention => self.hidden_size * self.attention_hops,
            PoolingMode::Mean | PoolingMode::Max => self.hidden_size,
        };

        AttnClassifier {
            embedding,
            lstm_layers,
            ws1: LinearConfig::new(self.hidden_size, self.attention_unit_size)
                .with_bias(false)
                .init(device),
            ws2: LinearConfig::new(self.attention_unit_size, self.attention_hops)
                .with_bias(false)
                .init(device),
            fc: LinearConfig::new(pooled_size, self.fc_size).init(device),
            out: LinearConfig::new(self.fc_size, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            hidden_size: self.hidden_size,
            pooling: Ignored(self.pooling_mode),
        }
    }
}

#[derive(Module, Debug)]
pub struct AttnClassifier<B: Backend> {
    embedding: Embedding<B>,
    lstm_layers: Vec<Lstm<B>>,
    ws1: Linear<B>,
    ws2: Linear<B>,
    fc: Linear<B>,
    out: Linear<B>,
    dropout: Dropout,
    hidden_size: usize,
    pooling: Ignored<PoolingMode>,
}

impl<B: Backend> AttnClassifier<B> {
    /// Fresh zeroed LSTM state per layer for a batch.
    pub fn init_hidden(&self, batch_size: usize, device: &B::Device) -> Vec<LstmState<B, 2>> {
        self.lstm_layers
            .iter()
            .map(|_| {
                LstmState::new(
                    Tensor::zeros([batch_size, self.hidden_size], device),
                    Tensor::zeros([batch_size, self.hidden_size], device),
                )
            })
            .collect()
    }

    /// Forward pass.
    ///
    /// `batch` is sequence-length-major, `[seq_len, batch]`, as
    /// produced by the packager. Returns class logits
    /// `[batch, num_classes]` and, in attention mode, the hop
    /// attention `[batch, hops, seq_len]`.
    pub fn forward(
        &self,
        batch: Tensor<B, 2, Int>,
        hidden: Vec<LstmState<B, 2>>,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 3>>) {
        let tokens = batch.swap_dims(0, 1); // [batch, seq]
        let [batch_size, _seq_len] = tokens.dims();

        let mut h = self.dropout.forward(self.embedding.forward(tokens));
        for (layer, state) in self.lstm_layers.iter().zip(hidden) {
            let (out, _) = layer.forward(h, Some(state));
            h = out; // [batch, seq, hidden]
        }

        let (pooled, attention) = match self.pooling.0 {
            PoolingMode::Attention => {
                // One softmax over the sequence per hop.
                let scores = self.ws2.forward(tanh(self.ws1.forward(h.clone())));
                let a = softmax(scores, 1).swap_dims(1, 2); // [batch, hops, seq]
                let m = a.clone().matmul(h); // [batch, hops, hidden]
                let [_, hops, hidden] = m.dims();
                (m.reshape([batch_size, hops * hidden]), Some(a))
            }
            PoolingMode::Mean => (h.mean_dim(1).squeeze::<2>(1), None),
            PoolingMode::Max => (h.max_dim(1).squeeze::<2>(1), None),
        };

        let fc = tanh(self.fc.forward(self.dropout.forward(pooled)));
        let logits = self.out.forward(self.dropout.forward(fc));
        (logits, attention)
    }
}
