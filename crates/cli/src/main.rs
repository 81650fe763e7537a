use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{loss, Init, VarBuilder, VarMap};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sexagesimal_common::ScheduleConfig;
use sexagesimal_core::{OutOfRangePolicy, SegmentLadder};
use sexagesimal_train::{Checkpoint, SexagesimalWarmRestart, Trainer, TrainerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "sexagesimal",
    about = "Sexagesimal warm-restart learning-rate schedule"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the boundary table for a step budget.
    Boundaries(ScheduleArgs),
    /// Print the multiplier at a single step.
    Eval(EvalArgs),
    /// Write a CSV of step, segment, alpha and scheduled LRs.
    Trace(TraceArgs),
    /// Write a default schedule config.
    InitConfig(InitConfigArgs),
    /// Fit a toy linear regression with AdamW driven by the schedule.
    Fit(FitArgs),
}

// ── Shared schedule flags ───────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
struct ScheduleArgs {
    /// JSON schedule config; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    total_steps: Option<usize>,
    /// Comma-separated segment proportions (default: AO 6456 ladder).
    #[arg(long, value_delimiter = ',')]
    ladder: Option<Vec<usize>>,
    #[arg(long, value_parser = ["clamp", "fail"])]
    out_of_range: Option<String>,
}

impl ScheduleArgs {
    fn resolve(&self) -> Result<ScheduleConfig> {
        let mut config = match (&self.config, self.total_steps) {
            (Some(path), _) => ScheduleConfig::load(path)?,
            (None, Some(total)) => ScheduleConfig::new(total),
            (None, None) => anyhow::bail!("either --config or --total-steps is required"),
        };
        if let Some(total) = self.total_steps {
            config.total_steps = total;
        }
        if let Some(ref proportions) = self.ladder {
            config.ladder = SegmentLadder::new(proportions.clone())?;
        }
        if let Some(ref policy) = self.out_of_range {
            config.out_of_range = OutOfRangePolicy::from_str(policy)
                .ok_or_else(|| anyhow::anyhow!("unknown out-of-range policy {policy:?}"))?;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct EvalArgs {
    #[command(flatten)]
    schedule: ScheduleArgs,
    /// 1-based step (at least 1).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    step: u64,
    #[arg(long, default_value_t = 1.0)]
    base_lr: f64,
}

#[derive(Args, Debug)]
struct TraceArgs {
    #[command(flatten)]
    schedule: ScheduleArgs,
    /// Base LR per parameter group (repeat or comma-separate).
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    base_lr: Vec<f64>,
    /// Output CSV (stdout when omitted).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    #[arg(long, default_value = "schedule.json")]
    output: PathBuf,
    #[arg(long, default_value = "10000")]
    total_steps: usize,
}

#[derive(Args, Debug)]
struct FitArgs {
    #[command(flatten)]
    schedule: ScheduleArgs,
    #[arg(long, default_value = "checkpoints")]
    output_dir: PathBuf,
    #[arg(long, default_value = "5e-2")]
    base_lr: f64,
    #[arg(long, default_value = "0.0")]
    weight_decay: f64,
    #[arg(long, default_value = "1.0")]
    grad_clip_max_norm: f64,
    #[arg(long, default_value = "256")]
    samples: usize,
    #[arg(long, default_value = "100")]
    log_every: usize,
    #[arg(long, default_value = "500")]
    save_every: usize,
    /// Continue from the latest checkpoint in --output-dir.
    #[arg(long)]
    resume: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so CSV output on stdout stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Boundaries(args) => cmd_boundaries(args),
        Command::Eval(args) => cmd_eval(args),
        Command::Trace(args) => cmd_trace(args),
        Command::InitConfig(args) => cmd_init_config(args),
        Command::Fit(args) => cmd_fit(args),
    }
}

// ── Command implementations ────────────────────────────────────────────────────

fn cmd_boundaries(args: ScheduleArgs) -> Result<()> {
    let config = args.resolve()?;
    let table = config.build_table()?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "segment,start,end,len")?;
    for seg in table.segments() {
        writeln!(out, "{},{},{},{}", seg.index, seg.start, seg.end, seg.len())?;
    }
    info!(
        segments = table.num_segments(),
        total_steps = table.total_steps(),
        degenerate = table.degenerate_count(),
        "Printed boundary table"
    );
    Ok(())
}

fn cmd_eval(args: EvalArgs) -> Result<()> {
    let mut config = args.schedule.resolve()?;
    config.resume_step = usize::try_from(args.step - 1)?;
    let sched = SexagesimalWarmRestart::from_config(&config)?;
    let lr = sched.current_lr(args.base_lr)?;
    match sched.current_segment() {
        Some(seg) => println!(
            "step {} segment {} ({}, {}] lr {lr:.6e}",
            sched.current_step(),
            seg.index,
            seg.start,
            seg.end
        ),
        None => println!("step {} past end lr {lr:.6e}", sched.current_step()),
    }
    Ok(())
}

fn cmd_trace(args: TraceArgs) -> Result<()> {
    let config = args.schedule.resolve()?;
    let mut sched = SexagesimalWarmRestart::from_config(&config)?;
    match args.output {
        Some(ref path) => {
            let file = std::fs::File::create(path)?;
            let mut w = std::io::BufWriter::new(file);
            write_trace(&mut w, &mut sched, &args.base_lr)?;
            w.flush()?;
            info!(path = %path.display(), steps = config.total_steps, "Wrote trace");
        }
        None => write_trace(&mut std::io::stdout().lock(), &mut sched, &args.base_lr)?,
    }
    Ok(())
}

/// Walk the schedule from its current step to the end, one CSV row per step.
fn write_trace<W: Write>(
    w: &mut W,
    sched: &mut SexagesimalWarmRestart,
    base_lrs: &[f64],
) -> Result<()> {
    write!(w, "step,segment,alpha")?;
    for i in 0..base_lrs.len() {
        write!(w, ",lr_{i}")?;
    }
    writeln!(w)?;

    while !sched.is_finished() {
        let segment = sched.current_segment().map_or(0, |s| s.index);
        write!(
            w,
            "{},{},{:.8}",
            sched.current_step(),
            segment,
            sched.current_alpha()?
        )?;
        for lr in sched.current_multipliers(base_lrs)? {
            write!(w, ",{lr:.8e}")?;
        }
        writeln!(w)?;
        sched.advance();
    }
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> Result<()> {
    let config = ScheduleConfig::new(args.total_steps);
    config.validate()?;
    config.save(&args.output)?;
    info!(path = %args.output.display(), total_steps = args.total_steps, "Created default config");
    Ok(())
}

fn cmd_fit(args: FitArgs) -> Result<()> {
    let schedule = args.schedule.resolve()?;
    let device = Device::cuda_if_available(0)?;

    // y = 3x - 2 on a fixed grid in [-1, 1).
    let n = args.samples.max(1);
    let x = Tensor::arange(0u32, n as u32, &device)?
        .to_dtype(DType::F32)?
        .affine(2.0 / n as f64, -1.0)?
        .reshape((n, 1))?;
    let y = x.affine(3.0, -2.0)?;

    let varmap = VarMap::new();
    let (w, b) = linear_params(&varmap, &device)?;

    let trainer_config = TrainerConfig {
        base_lr: args.base_lr,
        weight_decay: args.weight_decay,
        grad_clip_max_norm: args.grad_clip_max_norm,
        log_every: args.log_every,
        output_dir: args.output_dir.clone(),
        schedule,
    };
    let mut trainer = open_trainer(varmap, trainer_config, &args.output_dir, args.resume)?;

    let pb = ProgressBar::new(trainer.schedule().total_steps() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} steps {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_position(trainer.global_step() as u64);

    while !trainer.schedule().is_finished() {
        let pred = x.matmul(&w)?.broadcast_add(&b)?;
        let l = loss::mse(&pred, &y)?;
        let m = trainer.step(&l)?;
        pb.inc(1);
        pb.set_message(format!("loss {:.5} lr {:.2e}", m.loss, m.lr));
        if args.save_every > 0 && m.step % args.save_every == 0 {
            trainer.save_checkpoint()?;
        }
    }
    pb.finish_with_message("done");

    let checkpoint = trainer.save_checkpoint()?;
    let w_val = w.flatten_all()?.to_vec1::<f32>()?[0];
    let b_val = b.to_vec1::<f32>()?[0];
    info!(
        w = w_val,
        b = b_val,
        checkpoint = %checkpoint.weights.display(),
        "Fitted y = w*x + b (target 3x - 2)"
    );
    Ok(())
}

fn linear_params(varmap: &VarMap, device: &Device) -> Result<(Tensor, Tensor)> {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
    let w = vb.get_with_hints((1, 1), "w", Init::Const(0.0))?;
    let b = vb.get_with_hints(1, "b", Init::Const(0.0))?;
    Ok((w, b))
}

fn open_trainer(
    varmap: VarMap,
    config: TrainerConfig,
    output_dir: &Path,
    resume: bool,
) -> Result<Trainer> {
    if resume {
        if let Some(checkpoint) = Checkpoint::latest(output_dir)? {
            info!(state = %checkpoint.state.display(), "Resuming from checkpoint");
            return Trainer::resume(varmap, config, &checkpoint);
        }
        info!(dir = %output_dir.display(), "No checkpoint found; starting fresh");
    }
    Trainer::new(varmap, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule_args(total: Option<usize>) -> ScheduleArgs {
        ScheduleArgs {
            config: None,
            total_steps: total,
            ladder: None,
            out_of_range: None,
        }
    }

    #[test]
    fn cli_parses_trace() {
        let cli = Cli::try_parse_from([
            "sexagesimal",
            "trace",
            "--total-steps",
            "12",
            "--ladder",
            "6,3,2,1",
            "--base-lr",
            "0.1,0.01",
        ])
        .unwrap();
        match cli.command {
            Command::Trace(args) => {
                assert_eq!(args.base_lr, vec![0.1, 0.01]);
                let config = args.schedule.resolve().unwrap();
                assert_eq!(config.ladder.proportions(), &[6, 3, 2, 1]);
            }
            other => panic!("expected trace, got {other:?}"),
        }
    }

    #[test]
    fn eval_rejects_step_zero() {
        let parse = |step: &str| {
            Cli::try_parse_from(["sexagesimal", "eval", "--total-steps", "10", "--step", step])
        };
        assert!(parse("0").is_err());
        match parse("1").unwrap().command {
            Command::Eval(args) => assert_eq!(args.step, 1),
            other => panic!("expected eval, got {other:?}"),
        }
    }

    #[test]
    fn resolve_requires_a_budget() {
        assert!(schedule_args(None).resolve().is_err());
        assert!(schedule_args(Some(0)).resolve().is_err());
        assert_eq!(schedule_args(Some(7)).resolve().unwrap().total_steps, 7);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        ScheduleConfig::new(100).save(&path).unwrap();

        let mut args = schedule_args(Some(50));
        args.config = Some(path);
        args.out_of_range = Some("fail".to_string());
        let config = args.resolve().unwrap();
        assert_eq!(config.total_steps, 50);
        assert_eq!(config.out_of_range, OutOfRangePolicy::Fail);
    }

    #[test]
    fn trace_has_one_row_per_step() {
        let ladder = SegmentLadder::new(vec![2, 1]).unwrap();
        let mut sched =
            SexagesimalWarmRestart::with_ladder(3, 0, ladder, OutOfRangePolicy::Clamp).unwrap();
        let mut buf = Vec::new();
        write_trace(&mut buf, &mut sched, &[1.0]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "step,segment,alpha,lr_0");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1,1,0.50000000,"));
        assert!(lines[2].starts_with("2,1,0.00000000,"));
        assert!(lines[3].starts_with("3,2,0.00000000,"));
    }
}
