//! Sexagesimal warm-restart learning-rate scheduler.

use candle_nn::Optimizer;

use sexagesimal_common::{ScheduleConfig, ScheduleState};
use sexagesimal_core::{
    evaluate_with, BoundaryTable, OutOfRangePolicy, Result, ScheduleError, Segment, SegmentLadder,
};

// ── LR Scheduler ────────────────────────────────────────────────────────────

/// Cosine decay inside sexagesimal ladder restarts.
///
/// Holds the immutable boundary table and the number of completed steps. Step
/// numbering is 1-based: with `step` steps completed, queries evaluate step
/// `step + 1`. The host calls [`current_multipliers`](Self::current_multipliers)
/// (or [`apply`](Self::apply)) before the optimiser step and
/// [`advance`](Self::advance) after it.
#[derive(Debug, Clone)]
pub struct SexagesimalWarmRestart {
    table: BoundaryTable,
    ladder: SegmentLadder,
    policy: OutOfRangePolicy,
    step: usize,
}

impl SexagesimalWarmRestart {
    /// Schedule over `total_steps` with the tablet ladder.
    ///
    /// * `resume_step` — steps already completed by a previous run (0 for a fresh run).
    pub fn new(total_steps: usize, resume_step: usize) -> Result<Self> {
        Self::with_ladder(
            total_steps,
            resume_step,
            SegmentLadder::default(),
            OutOfRangePolicy::default(),
        )
    }

    /// Schedule over `total_steps` with an explicit ladder and out-of-range policy.
    pub fn with_ladder(
        total_steps: usize,
        resume_step: usize,
        ladder: SegmentLadder,
        policy: OutOfRangePolicy,
    ) -> Result<Self> {
        let table = BoundaryTable::build(total_steps, &ladder)?;
        if policy == OutOfRangePolicy::Fail && resume_step > total_steps {
            return Err(ScheduleError::out_of_range(resume_step + 1, total_steps));
        }
        if resume_step > 0 {
            tracing::info!(
                total_steps,
                resume_step,
                segment = table.locate(resume_step + 1).map(|s| s.index),
                "Resuming sexagesimal schedule"
            );
        }
        Ok(Self {
            table,
            ladder,
            policy,
            step: resume_step,
        })
    }

    pub fn from_config(config: &ScheduleConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self::with_ladder(
            config.total_steps,
            config.resume_step,
            config.ladder.clone(),
            config.out_of_range,
        )?)
    }

    /// Rebuild a schedule from checkpointed state. The ladder and policy come
    /// from `config`; its `total_steps` and `resume_step` are ignored.
    pub fn from_state(state: ScheduleState, config: &ScheduleConfig) -> Result<Self> {
        Self::with_ladder(
            state.total_steps,
            state.step,
            config.ladder.clone(),
            config.out_of_range,
        )
    }

    /// The two integers a checkpoint needs.
    pub fn state(&self) -> ScheduleState {
        ScheduleState {
            total_steps: self.total_steps(),
            step: self.step,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.table.total_steps()
    }

    /// Completed steps.
    pub fn step(&self) -> usize {
        self.step
    }

    /// 1-based step the next query evaluates.
    pub fn current_step(&self) -> usize {
        self.step + 1
    }

    pub fn table(&self) -> &BoundaryTable {
        &self.table
    }

    pub fn ladder(&self) -> &SegmentLadder {
        &self.ladder
    }

    pub fn policy(&self) -> OutOfRangePolicy {
        self.policy
    }

    /// Segment owning the current step, `None` once past the end.
    pub fn current_segment(&self) -> Option<Segment> {
        self.table.locate(self.current_step())
    }

    /// Whether every scheduled step has been taken.
    pub fn is_finished(&self) -> bool {
        self.step >= self.total_steps()
    }

    /// Multiplier at the current step.
    pub fn current_alpha(&self) -> Result<f64> {
        evaluate_with(self.current_step(), &self.table, 1.0, self.policy)
    }

    /// Scheduled learning rate for a single base rate.
    pub fn current_lr(&self, base_lr: f64) -> Result<f64> {
        Ok(base_lr * self.current_alpha()?)
    }

    /// One scaled rate per parameter-group base rate, all sharing the same alpha.
    pub fn current_multipliers(&self, base_rates: &[f64]) -> Result<Vec<f64>> {
        let alpha = self.current_alpha()?;
        Ok(base_rates.iter().map(|&lr| lr * alpha).collect())
    }

    /// Set `optimizer`'s learning rate to the scheduled value and return it.
    pub fn apply<O: Optimizer>(&self, optimizer: &mut O, base_lr: f64) -> Result<f64> {
        let lr = self.current_lr(base_lr)?;
        optimizer.set_learning_rate(lr);
        Ok(lr)
    }

    pub fn advance(&mut self) {
        self.step += 1;
    }

    /// Jump to `step` completed steps.
    pub fn set_step(&mut self, step: usize) {
        self.step = step;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Var};
    use candle_nn::SGD;

    fn natural() -> SexagesimalWarmRestart {
        SexagesimalWarmRestart::new(SegmentLadder::default().total(), 0).unwrap()
    }

    #[test]
    fn starts_at_step_one() {
        let sched = natural();
        assert_eq!(sched.step(), 0);
        assert_eq!(sched.current_step(), 1);
        let expected = 0.5 * (1.0 + (std::f64::consts::PI / 60.0).cos());
        assert!((sched.current_alpha().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn restart_after_first_segment() {
        let mut sched = natural();
        for _ in 0..59 {
            sched.advance();
        }
        assert_eq!(sched.current_step(), 60);
        assert_eq!(sched.current_alpha().unwrap(), 0.0);

        sched.advance();
        assert_eq!(sched.current_segment().unwrap().index, 2);
        assert!((sched.current_alpha().unwrap() - 0.99726).abs() < 1e-5);
    }

    #[test]
    fn multipliers_share_one_alpha() {
        let mut sched = natural();
        sched.set_step(10);
        let alpha = sched.current_alpha().unwrap();
        let lrs = sched.current_multipliers(&[1e-3, 5e-4, 0.0]).unwrap();
        assert_eq!(lrs.len(), 3);
        assert!((lrs[0] - 1e-3 * alpha).abs() < 1e-15);
        assert!((lrs[1] - 5e-4 * alpha).abs() < 1e-15);
        assert_eq!(lrs[2], 0.0);
        assert!(sched.current_multipliers(&[]).unwrap().is_empty());
    }

    #[test]
    fn resume_matches_a_continuous_run() {
        let mut continuous = SexagesimalWarmRestart::new(1000, 0).unwrap();
        for _ in 0..437 {
            continuous.advance();
        }
        let resumed = SexagesimalWarmRestart::new(1000, 437).unwrap();
        assert_eq!(resumed.current_step(), continuous.current_step());
        assert_eq!(
            resumed.current_alpha().unwrap(),
            continuous.current_alpha().unwrap()
        );
        assert_eq!(resumed.state(), continuous.state());
    }

    #[test]
    fn state_round_trip_keeps_ladder() {
        let mut config = ScheduleConfig::new(24);
        config.ladder = SegmentLadder::new(vec![12, 6, 3, 2, 1]).unwrap();
        let mut sched = SexagesimalWarmRestart::from_config(&config).unwrap();
        for _ in 0..13 {
            sched.advance();
        }

        let restored = SexagesimalWarmRestart::from_state(sched.state(), &config).unwrap();
        assert_eq!(restored.table(), sched.table());
        assert_eq!(restored.current_step(), 14);
        assert_eq!(restored.current_segment().unwrap().index, 2);
    }

    #[test]
    fn zero_total_steps_is_invalid() {
        assert!(matches!(
            SexagesimalWarmRestart::new(0, 0),
            Err(ScheduleError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn past_the_end_clamps_by_default() {
        let mut sched = SexagesimalWarmRestart::new(10, 10).unwrap();
        assert!(sched.is_finished());
        assert!(sched.current_segment().is_none());
        assert_eq!(sched.current_alpha().unwrap(), 0.0);
        sched.advance();
        assert_eq!(sched.current_lr(0.1).unwrap(), 0.0);
    }

    #[test]
    fn past_the_end_fails_when_asked() {
        let ladder = SegmentLadder::default();
        let mut sched =
            SexagesimalWarmRestart::with_ladder(10, 9, ladder.clone(), OutOfRangePolicy::Fail)
                .unwrap();
        assert_eq!(sched.current_alpha().unwrap(), 0.0);
        sched.advance();
        assert_eq!(
            sched.current_alpha().unwrap_err(),
            ScheduleError::out_of_range(11, 10)
        );

        assert!(
            SexagesimalWarmRestart::with_ladder(10, 11, ladder, OutOfRangePolicy::Fail).is_err()
        );
    }

    #[test]
    fn apply_sets_optimizer_lr() {
        let var = Var::new(&[1f32], &Device::Cpu).unwrap();
        let mut opt = SGD::new(vec![var], 0.5).unwrap();
        let mut sched = natural();
        sched.set_step(30);

        let lr = sched.apply(&mut opt, 0.5).unwrap();
        assert!((opt.learning_rate() - lr).abs() < 1e-15);
        assert!((lr - 0.5 * sched.current_alpha().unwrap()).abs() < 1e-15);
    }
}
