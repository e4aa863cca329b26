// ============================================================
// Layer 5 — Training Loop / Evaluator
// ============================================================
// Drives the whole session: batch scheduling, composite loss,
// per-epoch evaluation, and the checkpoint / learning-rate
// policy. All mutable training state (model, optimizer moments,
// best-so-far trackers) lives in the session object created at
// the start of a run and dropped at the end — nothing global.
//
// Loss per batch:
//   cross-entropy(logits, targets)
//     + penalty_coeff · mean_b ‖A_b·A_bᵀ − I‖_F   (attention only)
//
// The Frobenius term pushes the attention hops apart: if two
// hops collapse onto the same distribution, an off-diagonal
// entry of A·Aᵀ approaches 1 and the penalty grows.
//
// Gradient-norm clipping is configured on the optimizer itself
// (burn applies it inside `step`), and the learning rate is
// whatever the policy currently holds — burn takes lr per step,
// so decay is just a multiplication.
//
// Training runs on the Autodiff backend; evaluation drops to the
// inner backend via model.valid().

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{momentum::MomentumConfig, AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{BatchPackager, DataStore};
use crate::infra::checkpoint::{CheckpointManager, CheckpointTag};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::AttnClassifier;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
pub type EvalBackend = burn::backend::NdArray;
type Device = burn::backend::ndarray::NdArrayDevice;

/// Multiplicative learning-rate decay applied when validation
/// loss fails to improve.
pub const LR_DECAY: f64 = 0.2;

// ─── Frobenius penalty ────────────────────────────────────────────────────────

/// Attention-diversity penalty for one batch.
///
/// `attention` is `[batch, hops, seq]`; the result is the mean
/// over the batch of `‖A·Aᵀ − I‖_F`. Zero (up to the epsilon
/// inside the root) when every example's hop rows are mutually
/// orthonormal — e.g. identity attention matrices.
pub fn attention_penalty<B: Backend>(attention: Tensor<B, 3>) -> Tensor<B, 1> {
    let [batch, hops, _] = attention.dims();
    let gram = attention.clone().matmul(attention.swap_dims(1, 2)); // [batch, hops, hops]
    let eye = Tensor::<B, 2>::eye(hops, &gram.device()).unsqueeze::<3>();
    let diff = gram - eye;
    diff.powf_scalar(2.0)
        .sum_dim(2)
        .sum_dim(1)
        .reshape([batch])
        .add_scalar(1e-10)
        .sqrt()
        .mean()
}

// ─── Checkpoint / decay policy ────────────────────────────────────────────────

/// What to do after one epoch's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochOutcome {
    pub new_best_loss: bool,
    pub decayed: bool,
    pub new_best_acc: bool,
}

/// End-of-epoch policy, evaluated strictly in order:
///   1. better (or first) val loss → best-loss snapshot,
///      otherwise decay the learning rate;
///   2. better (or first) accuracy → best-acc snapshot;
///   3. the per-epoch snapshot is unconditional (caller's job).
///
/// Kept free of tensors so the decay arithmetic is testable on
/// its own.
#[derive(Debug, Clone)]
pub struct EpochPolicy {
    lr: f64,
    decay: f64,
    best_val_loss: Option<f64>,
    best_acc: Option<f64>,
}

impl EpochPolicy {
    pub fn new(initial_lr: f64, decay: f64) -> Self {
        Self {
            lr: initial_lr,
            decay,
            best_val_loss: None,
            best_acc: None,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn observe(&mut self, val_loss: f64, acc: f64) -> EpochOutcome {
        let new_best_loss = self.best_val_loss.map_or(true, |best| val_loss < best);
        if new_best_loss {
            self.best_val_loss = Some(val_loss);
        } else {
            self.lr *= self.decay;
        }

        let new_best_acc = self.best_acc.map_or(true, |best| acc > best);
        if new_best_acc {
            self.best_acc = Some(acc);
        }

        EpochOutcome {
            new_best_loss,
            decayed: !new_best_loss,
            new_best_acc,
        }
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

/// Entry point: picks the optimizer named in the config and runs
/// the full session with it. Unknown optimizer names abort.
pub fn run_training(
    cfg: &TrainConfig,
    store: &DataStore,
    model: AttnClassifier<TrainBackend>,
    ckpt: &CheckpointManager,
    metrics: &MetricsLogger,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let clipping = Some(GradientClippingConfig::Norm(cfg.clip));
    match cfg.optimizer.as_str() {
        "adam" => {
            let optim = AdamConfig::new()
                .with_epsilon(1e-8)
                .with_grad_clipping(clipping)
                .init();
            TrainSession::new(cfg, store, ckpt, metrics, cancel, optim).run(model)
        }
        "sgd" => {
            let optim = SgdConfig::new()
                .with_momentum(Some(MomentumConfig::new()))
                .with_gradient_clipping(clipping)
                .init();
            TrainSession::new(cfg, store, ckpt, metrics, cancel, optim).run(model)
        }
        other => bail!("unsupported optimizer '{other}' (supported: adam, sgd)"),
    }
}

/// All state owned by one training run. Created at session
/// start, dropped at session end.
struct TrainSession<'a, O> {
    cfg: &'a TrainConfig,
    store: &'a DataStore,
    ckpt: &'a CheckpointManager,
    metrics: &'a MetricsLogger,
    cancel: Arc<AtomicBool>,
    optim: O,
    policy: EpochPolicy,
    device: Device,
    packager: BatchPackager<TrainBackend>,
    eval_packager: BatchPackager<EvalBackend>,
}

impl<'a, O> TrainSession<'a, O>
where
    O: Optimizer<AttnClassifier<TrainBackend>, TrainBackend>,
{
    fn new(
        cfg: &'a TrainConfig,
        store: &'a DataStore,
        ckpt: &'a CheckpointManager,
        metrics: &'a MetricsLogger,
        cancel: Arc<AtomicBool>,
        optim: O,
    ) -> Self {
        let device = Device::default();
        Self {
            cfg,
            store,
            ckpt,
            metrics,
            cancel,
            optim,
            policy: EpochPolicy::new(cfg.lr, LR_DECAY),
            packager: BatchPackager::new(store.vocab.clone(), device)
                .with_max_len(cfg.max_tokens),
            eval_packager: BatchPackager::new(store.vocab.clone(), device)
                .with_max_len(cfg.max_tokens),
            device,
        }
    }

    fn run(mut self, mut model: AttnClassifier<TrainBackend>) -> Result<()> {
        let mut interrupted = false;

        for epoch in 0..self.cfg.epochs {
            let (trained, train_loss, completed) = self.train_epoch(model, epoch)?;
            model = trained;
            if !completed {
                tracing::info!("Exit from training early.");
                interrupted = true;
                break;
            }

            let started = Instant::now();
            let (val_loss, val_acc) =
                self.evaluate(&model.valid(), self.store.test_indices());
            tracing::info!(
                "epoch {:3} | evaluation {:5.2}s | valid loss {:5.4} | acc {:8.4}",
                epoch,
                started.elapsed().as_secs_f64(),
                val_loss,
                val_acc,
            );

            let outcome = self.policy.observe(val_loss, val_acc);
            if outcome.new_best_loss {
                self.ckpt.save(&model, CheckpointTag::BestLoss)?;
            } else {
                tracing::info!("validation loss did not improve, lr -> {:.6}", self.policy.lr());
            }
            if outcome.new_best_acc {
                self.ckpt.save(&model, CheckpointTag::BestAcc)?;
            }
            self.ckpt.save(&model, CheckpointTag::Epoch(epoch))?;

            self.metrics.log(&EpochMetrics {
                epoch,
                train_loss,
                val_loss,
                val_acc,
                lr: self.policy.lr(),
            })?;
        }

        // Final report over the test split — the graceful-shutdown
        // path as well as the normal one.
        let (test_loss, test_acc) = self.evaluate(&model.valid(), self.store.test_indices());
        if interrupted {
            tracing::info!(
                "test (after early exit) | loss {:5.4} | acc {:8.4}",
                test_loss,
                test_acc
            );
        } else {
            tracing::info!("test | loss {:5.4} | acc {:8.4}", test_loss, test_acc);
        }
        println!("Test set: loss {:.4}, accuracy {:.4}", test_loss, test_acc);

        Ok(())
    }

    /// One pass over the train split. Returns the updated model,
    /// the mean total loss, and whether the epoch ran to the end
    /// (false when the cancel flag was raised between batches).
    fn train_epoch(
        &mut self,
        mut model: AttnClassifier<TrainBackend>,
        epoch: usize,
    ) -> Result<(AttnClassifier<TrainBackend>, f64, bool)> {
        let criterion = CrossEntropyLossConfig::new().init(&self.device);
        let num_batches = self.store.train_indices().len().div_ceil(self.cfg.batch_size);

        let mut epoch_loss_sum = 0.0;
        let mut window_loss = 0.0;
        let mut window_pure_loss = 0.0;
        let mut window_start = Instant::now();

        for (batch_no, chunk) in self
            .store
            .train_indices()
            .chunks(self.cfg.batch_size)
            .enumerate()
        {
            // Cancellation is only observed here, between batch
            // iterations, so a finished checkpoint is never torn.
            if self.cancel.load(Ordering::Relaxed) {
                return Ok((model, epoch_loss_sum / (batch_no.max(1)) as f64, false));
            }

            let rows: Vec<(&[String], i64)> = chunk
                .iter()
                .map(|&i| {
                    let (tokens, _) = self.store.row(i);
                    (tokens, self.store.target_at(i, self.cfg.target_level))
                })
                .collect();
            let (data, targets) = self.packager.package(&rows);

            let hidden = model.init_hidden(chunk.len(), &self.device);
            let (logits, attention) = model.forward(data, hidden);

            let loss = criterion.forward(logits, targets);
            let pure_loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

            let loss = match attention {
                Some(a) => loss + attention_penalty(a).mul_scalar(self.cfg.penalty_coeff),
                None => loss,
            };
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = self.optim.step(self.policy.lr(), model, grads);

            epoch_loss_sum += loss_val;
            window_loss += loss_val;
            window_pure_loss += pure_loss_val;

            if batch_no % self.cfg.log_interval == 0 && batch_no > 0 {
                let interval = self.cfg.log_interval as f64;
                tracing::info!(
                    "epoch {:3} | {:5}/{:5} batches | ms/batch {:5.2} | loss {:5.4} | pure loss {:5.4}",
                    epoch,
                    batch_no,
                    num_batches,
                    window_start.elapsed().as_millis() as f64 / interval,
                    window_loss / interval,
                    window_pure_loss / interval,
                );
                window_loss = 0.0;
                window_pure_loss = 0.0;
                window_start = Instant::now();
            }
        }

        let mean_loss = epoch_loss_sum / num_batches.max(1) as f64;
        Ok((model, mean_loss, true))
    }

    /// Pure classification loss and top-1 accuracy over a split,
    /// with the model in inference mode (no penalty, no grads).
    fn evaluate(&self, model: &AttnClassifier<EvalBackend>, indices: &[usize]) -> (f64, f64) {
        if indices.is_empty() {
            return (f64::NAN, 0.0);
        }
        let criterion = CrossEntropyLossConfig::new().init(&self.device);

        let mut loss_sum = 0.0;
        let mut num_batches = 0usize;
        let mut correct = 0usize;

        for chunk in indices.chunks(self.cfg.batch_size) {
            let rows: Vec<(&[String], i64)> = chunk
                .iter()
                .map(|&i| {
                    let (tokens, _) = self.store.row(i);
                    (tokens, self.store.target_at(i, self.cfg.target_level))
                })
                .collect();
            let (data, targets) = self.eval_packager.package(&rows);

            let hidden = model.init_hidden(chunk.len(), &self.device);
            let (logits, _) = model.forward(data, hidden);

            loss_sum += criterion
                .forward(logits.clone(), targets.clone())
                .into_scalar()
                .elem::<f64>();
            num_batches += 1;

            // argmax keeps the reduced dim: [batch, 1] → [batch]
            let predictions = logits.argmax(1).flatten::<1>(0, 1);
            let batch_correct: i64 = predictions
                .equal(targets)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            correct += batch_correct as usize;
        }

        (
            loss_sum / num_batches as f64,
            correct as f64 / indices.len() as f64,
        )
    }
}
