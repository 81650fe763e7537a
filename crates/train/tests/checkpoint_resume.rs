//! End-to-end: run, checkpoint, resume, and compare against an uninterrupted run.

use candle_core::{DType, Device, Tensor};
use candle_nn::{Init, Optimizer, VarBuilder, VarMap, SGD};

use sexagesimal_common::ScheduleConfig;
use sexagesimal_train::{Checkpoint, SexagesimalWarmRestart, Trainer, TrainerConfig};

fn params(varmap: &VarMap) -> Tensor {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
    vb.get_with_hints(4, "w", Init::Const(2.0)).unwrap()
}

fn trainer_config(dir: &std::path::Path) -> TrainerConfig {
    TrainerConfig {
        base_lr: 0.05,
        weight_decay: 0.0,
        grad_clip_max_norm: 1.0,
        log_every: 10,
        output_dir: dir.to_path_buf(),
        schedule: ScheduleConfig::new(120),
    }
}

#[test]
fn resume_continues_the_ladder() {
    let dir = tempfile::tempdir().unwrap();

    let varmap = VarMap::new();
    let w = params(&varmap);
    let mut trainer = Trainer::new(varmap, trainer_config(dir.path())).unwrap();
    for _ in 0..45 {
        let loss = w.sqr().unwrap().sum_all().unwrap();
        trainer.step(&loss).unwrap();
    }
    let checkpoint = trainer.save_checkpoint().unwrap();
    assert_eq!(checkpoint, Checkpoint::at(dir.path(), 45));
    assert_eq!(Checkpoint::latest(dir.path()).unwrap(), Some(checkpoint.clone()));
    let saved: Vec<f32> = w.to_vec1().unwrap();

    // Fresh process: rebuild the parameters, then restore.
    let varmap = VarMap::new();
    let w2 = params(&varmap);
    let resumed = Trainer::resume(varmap, trainer_config(dir.path()), &checkpoint).unwrap();
    assert_eq!(w2.to_vec1::<f32>().unwrap(), saved);
    assert_eq!(resumed.global_step(), 45);
    assert_eq!(resumed.schedule().current_step(), 46);
    assert_eq!(
        resumed.schedule().current_alpha().unwrap(),
        trainer.schedule().current_alpha().unwrap()
    );
}

#[test]
fn host_optimizer_follows_the_schedule() {
    let varmap = VarMap::new();
    let w = params(&varmap);
    let mut opt = SGD::new(varmap.all_vars(), 0.0).unwrap();
    let mut sched = SexagesimalWarmRestart::new(203, 0).unwrap();

    let mut restarts = 0;
    let mut prev_lr = f64::INFINITY;
    while !sched.is_finished() {
        let lr = sched.apply(&mut opt, 0.01).unwrap();
        if lr > prev_lr {
            restarts += 1;
        }
        prev_lr = lr;

        let loss = w.sqr().unwrap().sum_all().unwrap();
        opt.backward_step(&loss).unwrap();
        sched.advance();
    }

    // Unit segments evaluate to 0 on their only step, so only the 15
    // multi-step segments after the first produce a visible restart.
    assert_eq!(restarts, 15);
    assert_eq!(sched.current_alpha().unwrap(), 0.0);
}
