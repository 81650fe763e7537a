//! Trainer: hosts the schedule inside a candle optimisation loop.
//!
//! The caller owns the compute graph (forward + loss); the trainer owns the
//! optimisation step (scheduled LR, backward, gradient clipping, AdamW,
//! schedule advance) and checkpointing of weights plus schedule state.

use std::path::{Path, PathBuf};

use anyhow::Context;
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};

use sexagesimal_common::{ScheduleConfig, ScheduleState};

use crate::scheduler::SexagesimalWarmRestart;

// ── Config ──────────────────────────────────────────────────────────────────

/// Optimiser hyper-parameters plus the schedule they are driven by.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Peak learning rate; the schedule multiplies it by alpha every step.
    pub base_lr: f64,
    pub weight_decay: f64,
    pub grad_clip_max_norm: f64,
    pub log_every: usize,
    pub output_dir: PathBuf,
    pub schedule: ScheduleConfig,
}

/// Metrics returned after each training step.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    /// 1-based step just taken.
    pub step: usize,
    /// Segment the step belonged to (`None` past the end of the schedule).
    pub segment: Option<usize>,
    pub loss: f32,
    pub alpha: f64,
    pub lr: f64,
    pub grad_norm: Option<f64>,
}

/// Files written by [`Trainer::save_checkpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub weights: PathBuf,
    pub state: PathBuf,
}

impl Checkpoint {
    /// Paths for the checkpoint taken after `step` completed steps.
    pub fn at(dir: &Path, step: usize) -> Self {
        Self {
            weights: dir.join(format!("checkpoint-{step}.safetensors")),
            state: dir.join(format!("schedule-{step}.json")),
        }
    }

    /// The checkpoint with the highest step in `dir` that has both files.
    pub fn latest(dir: &Path) -> anyhow::Result<Option<Self>> {
        if !dir.exists() {
            return Ok(None);
        }
        let mut best: Option<usize> = None;
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("listing checkpoints in {}", dir.display()))?
        {
            let name = entry?.file_name();
            let Some(step) = name
                .to_str()
                .and_then(|n| n.strip_prefix("schedule-"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<usize>().ok())
            else {
                continue;
            };
            if Self::at(dir, step).weights.exists() && best.map_or(true, |b| step > b) {
                best = Some(step);
            }
        }
        Ok(best.map(|step| Self::at(dir, step)))
    }
}

// ── Trainer ─────────────────────────────────────────────────────────────────

/// The training engine. Owns the parameters, optimiser and schedule.
pub struct Trainer {
    pub varmap: VarMap,
    vars: Vec<Var>,
    optimizer: AdamW,
    schedule: SexagesimalWarmRestart,
    pub config: TrainerConfig,
}

impl Trainer {
    /// Start a run over every variable already registered in `varmap`.
    pub fn new(varmap: VarMap, config: TrainerConfig) -> anyhow::Result<Self> {
        let schedule = SexagesimalWarmRestart::from_config(&config.schedule)?;
        Self::with_schedule(varmap, config, schedule)
    }

    /// Continue a run: load weights into `varmap` and restore the schedule
    /// counter. Optimiser moments start fresh.
    pub fn resume(
        mut varmap: VarMap,
        config: TrainerConfig,
        checkpoint: &Checkpoint,
    ) -> anyhow::Result<Self> {
        varmap
            .load(&checkpoint.weights)
            .with_context(|| format!("loading weights from {}", checkpoint.weights.display()))?;
        let state = ScheduleState::load(&checkpoint.state)?;
        let schedule = SexagesimalWarmRestart::from_state(state, &config.schedule)?;
        Self::with_schedule(varmap, config, schedule)
    }

    fn with_schedule(
        varmap: VarMap,
        config: TrainerConfig,
        schedule: SexagesimalWarmRestart,
    ) -> anyhow::Result<Self> {
        let vars = varmap.all_vars();
        if vars.is_empty() {
            anyhow::bail!("VarMap has no variables to optimise");
        }

        let optimizer = AdamW::new(
            vars.clone(),
            ParamsAdamW {
                lr: schedule.current_lr(config.base_lr)?,
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )?;

        tracing::info!(
            params = vars.iter().map(|v| v.elem_count()).sum::<usize>(),
            total_steps = schedule.total_steps(),
            start_step = schedule.current_step(),
            segments = schedule.table().num_segments(),
            "Trainer ready"
        );

        Ok(Self {
            varmap,
            vars,
            optimizer,
            schedule,
            config,
        })
    }

    /// One optimiser step on `loss`, which must depend on the trainer's variables.
    pub fn step(&mut self, loss: &Tensor) -> anyhow::Result<StepMetrics> {
        let step = self.schedule.current_step();
        let segment = self.schedule.current_segment().map(|s| s.index);
        let alpha = self.schedule.current_alpha()?;
        let lr = self.config.base_lr * alpha;
        self.optimizer.set_learning_rate(lr);

        let loss_val = loss.to_dtype(candle_core::DType::F32)?.to_scalar::<f32>()?;
        let mut grads = loss.backward()?;

        let grad_norm = if self.config.grad_clip_max_norm > 0.0 {
            Some(clip_grad_norm(
                &mut grads,
                &self.vars,
                self.config.grad_clip_max_norm,
            )?)
        } else {
            None
        };

        self.optimizer.step(&grads)?;
        self.schedule.advance();

        if self.config.log_every > 0 && step % self.config.log_every == 0 {
            tracing::info!(
                step,
                segment,
                loss = format!("{loss_val:.6}"),
                lr = format!("{lr:.3e}"),
                "train step"
            );
        }

        Ok(StepMetrics {
            step,
            segment,
            loss: loss_val,
            alpha,
            lr,
            grad_norm,
        })
    }

    /// Save weights and the schedule's two-integer state.
    pub fn save_checkpoint(&self) -> anyhow::Result<Checkpoint> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let checkpoint = Checkpoint::at(&self.config.output_dir, self.schedule.step());
        self.varmap.save(&checkpoint.weights)?;
        self.schedule.state().save(&checkpoint.state)?;
        tracing::info!(
            step = self.schedule.step(),
            path = %checkpoint.weights.display(),
            "Saved checkpoint"
        );
        Ok(checkpoint)
    }

    pub fn schedule(&self) -> &SexagesimalWarmRestart {
        &self.schedule
    }

    /// Completed optimiser steps.
    pub fn global_step(&self) -> usize {
        self.schedule.step()
    }
}

// ── Gradient utilities ──────────────────────────────────────────────────────

/// Clip gradients so their global L2 norm is at most `max_norm`; returns the
/// norm before clipping.
fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> anyhow::Result<f64> {
    let mut total = 0.0f64;
    for var in vars {
        if let Some(g) = grads.get(var.as_tensor()) {
            total += g.sqr()?.sum_all()?.to_dtype(candle_core::DType::F64)?.to_scalar::<f64>()?;
        }
    }
    let norm = total.sqrt().max(1e-12);
    if norm <= max_norm {
        return Ok(norm);
    }
    let scale = max_norm / norm;
    for var in vars {
        if let Some(g) = grads.remove(var.as_tensor()) {
            grads.insert(var.as_tensor(), g.affine(scale, 0.0)?);
        }
    }
    Ok(norm)
}

// ── Tests ───────────────────────────────────────────────────────────────────
