// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! State-vector infidelity against per-condition targets.
//!
//!   C = α·(1 − Σ_i |⟨τ_i|ψ_i⟩|² / N)
//!
//! With [`Schedule::EveryStep`] the value is divided by the step count T
//! and evaluated after every step, so the pass total is the time average
//! and early convergence is rewarded.

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;

use super::observer::{default_observer, CostObserver};
use super::{
    check_alpha, check_batch, check_references, check_state_kind, Cost, ProblemLayout, Schedule,
    DEFAULT_ALPHA,
};
use crate::error::{Error, Result};
use crate::evolution::StateKind;

/// ⟨a|b⟩ for two d × 1 columns.
fn overlap(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

#[derive(Debug, Clone)]
pub struct TargetStateInfidelity {
    targets: Vec<Array2<Complex64>>,
    alpha: f64,
    schedule: Schedule,
    observer: Arc<dyn CostObserver>,
}

impl TargetStateInfidelity {
    pub const NAME: &'static str = "target_state_infidelity";
    pub const TIME_NAME: &'static str = "target_state_infidelity_time";

    /// Final-step infidelity, one target per initial condition.
    pub fn new(targets: Vec<Array2<Complex64>>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "target_state_infidelity needs at least one target state".into(),
            ));
        }
        Ok(Self {
            targets,
            alpha: DEFAULT_ALPHA,
            schedule: Schedule::FinalStep,
            observer: default_observer(),
        })
    }

    /// Infidelity averaged over every step.
    pub fn time_averaged(targets: Vec<Array2<Complex64>>) -> Result<Self> {
        Ok(Self::new(targets)?.with_schedule(Schedule::EveryStep))
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CostObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Unweighted infidelity 1 − Σ|⟨τ_i|ψ_i⟩|²/N.
    pub fn infidelity(&self, states: &[Array2<Complex64>]) -> Result<f64> {
        check_batch(self.name(), self.targets.len(), states)?;
        let n = self.targets.len() as f64;
        let fidelity: f64 = self
            .targets
            .iter()
            .zip(states)
            .map(|(t, s)| overlap(t, s).norm_sqr())
            .sum::<f64>()
            / n;
        Ok(1.0 - fidelity)
    }

    /// 1 for a final-step cost, T for a time-averaged one.
    fn normalizer(&self, params: &Array2<f64>) -> f64 {
        match self.schedule {
            Schedule::FinalStep => 1.0,
            Schedule::EveryStep => params.nrows().max(1) as f64,
        }
    }
}

impl Cost for TargetStateInfidelity {
    fn name(&self) -> &str {
        match self.schedule {
            Schedule::FinalStep => Self::NAME,
            Schedule::EveryStep => Self::TIME_NAME,
        }
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        self.schedule == Schedule::EveryStep
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(self.name(), self.alpha)?;
        check_state_kind(self.name(), StateKind::Ket, layout)?;
        check_references(self.name(), &self.targets, layout)
    }

    fn evaluate(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        step: usize,
    ) -> Result<f64> {
        let infidelity = self.infidelity(states)?;
        self.observer.observe(self.name(), step, infidelity);
        Ok(self.alpha * infidelity / self.normalizer(params))
    }

    fn gradient_wrt_states(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        _step: usize,
    ) -> Result<Vec<Array2<Complex64>>> {
        check_batch(self.name(), self.targets.len(), states)?;
        let n = self.targets.len() as f64;
        let scale = -2.0 * self.alpha / (n * self.normalizer(params));
        Ok(self
            .targets
            .iter()
            .zip(states)
            .map(|(t, s)| t * (overlap(t, s) * scale))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::tests::ket_layout;
    use crate::costs::RecordingObserver;
    use crate::operators::ket;
    use crate::test_utils::plus_state;
    use approx::assert_relative_eq;

    fn params() -> Array2<f64> {
        Array2::zeros((4, 2))
    }

    #[test]
    fn test_matched_states_give_zero() {
        let targets = vec![ket(0, 2).unwrap(), ket(1, 2).unwrap()];
        let cost = TargetStateInfidelity::new(targets.clone()).unwrap();
        let value = cost.evaluate(&params(), &targets, 3).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_no_targets_rejected() {
        let result = TargetStateInfidelity::new(vec![]);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_empty_batch_rejected_at_evaluation() {
        let cost = TargetStateInfidelity::new(vec![ket(0, 2).unwrap()]).unwrap();
        let result = cost.evaluate(&params(), &[], 0);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_half_overlap() {
        let cost = TargetStateInfidelity::new(vec![ket(0, 2).unwrap()])
            .unwrap()
            .with_alpha(3.0);
        let value = cost.evaluate(&params(), &[plus_state()], 3).unwrap();
        assert_relative_eq!(value, 1.5, epsilon = 1e-14);
    }

    #[test]
    fn test_time_averaged_divides_by_steps() {
        let cost = TargetStateInfidelity::time_averaged(vec![ket(0, 2).unwrap()]).unwrap();
        assert!(cost.requires_step_evaluation());
        assert_eq!(cost.name(), TargetStateInfidelity::TIME_NAME);
        let value = cost.evaluate(&params(), &[ket(1, 2).unwrap()], 0).unwrap();
        assert_relative_eq!(value, 0.25, epsilon = 1e-14);
    }

    #[test]
    fn test_gradient_shapes() {
        let cost = TargetStateInfidelity::new(vec![ket(0, 2).unwrap(), plus_state()]).unwrap();
        let states = vec![plus_state(), ket(1, 2).unwrap()];
        let gp = cost.gradient_wrt_parameters(&params(), &states, 3).unwrap();
        assert_eq!(gp.dim(), (4, 2));
        assert!(gp.iter().all(|v| *v == 0.0));

        let gs = cost.gradient_wrt_states(&params(), &states, 3).unwrap();
        assert_eq!(gs.len(), 2);
        assert!(gs.iter().all(|g| g.dim() == (2, 1)));
    }

    #[test]
    fn test_state_gradient_matches_difference() {
        let cost = TargetStateInfidelity::new(vec![plus_state()]).unwrap();
        let mut psi = Array2::zeros((2, 1));
        psi[[0, 0]] = Complex64::new(0.6, 0.1);
        psi[[1, 0]] = Complex64::new(-0.2, 0.7);
        let grad = cost.gradient_wrt_states(&params(), &[psi.clone()], 3).unwrap();

        let eps = 1e-7;
        for (idx, dz) in [(0, Complex64::new(eps, 0.0)), (1, Complex64::new(0.0, eps))] {
            let mut plus = psi.clone();
            let mut minus = psi.clone();
            plus[[idx, 0]] += dz;
            minus[[idx, 0]] -= dz;
            let fd = (cost.evaluate(&params(), &[plus], 3).unwrap()
                - cost.evaluate(&params(), &[minus], 3).unwrap())
                / (2.0 * eps);
            let g = grad[0][[idx, 0]];
            let analytic = if dz.re != 0.0 { g.re } else { g.im };
            assert_relative_eq!(analytic, fd, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_observer_sees_unweighted_infidelity() {
        let observer = RecordingObserver::new();
        let cost = TargetStateInfidelity::new(vec![ket(0, 2).unwrap()])
            .unwrap()
            .with_alpha(10.0)
            .with_observer(observer.clone());
        cost.evaluate(&params(), &[ket(1, 2).unwrap()], 2).unwrap();

        let seen = observer.observations();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].cost, TargetStateInfidelity::NAME);
        assert_eq!(seen[0].step, 2);
        assert_relative_eq!(seen[0].value, 1.0);
    }

    #[test]
    fn test_validate_against_layout() {
        let cost = TargetStateInfidelity::new(vec![ket(0, 2).unwrap()]).unwrap();
        assert!(cost.validate(&ket_layout(1)).is_ok());
        assert!(matches!(
            cost.validate(&ket_layout(2)),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
