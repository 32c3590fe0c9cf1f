// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Density-matrix infidelity using the trace overlap.
//!
//!   C = α·(1 − Σ_i Re Tr(σ_i† ρ_i) / N)
//!
//! For a pure target σ = |τ⟩⟨τ| this is ⟨τ|ρ|τ⟩, so it reduces to the
//! state-vector form on pure states.

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
use crate::linalg::real_inner;

#[derive(Debug, Clone)]
pub struct TargetDensityInfidelity {
    targets: Vec<Array2<Complex64>>,
    alpha: f64,
    schedule: Schedule,
    observer: Arc<dyn CostObserver>,
}

impl TargetDensityInfidelity {
    pub const NAME: &'static str = "target_density_infidelity";
    pub const TIME_NAME: &'static str = "target_density_infidelity_time";

    pub fn new(targets: Vec<Array2<Complex64>>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "target_density_infidelity needs at least one target density".into(),
            ));
        }
        Ok(Self {
            targets,
            alpha: DEFAULT_ALPHA,
            schedule: Schedule::FinalStep,
            observer: default_observer(),
        })
    }

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

    pub fn infidelity(&self, states: &[Array2<Complex64>]) -> Result<f64> {
        check_batch(self.name(), self.targets.len(), states)?;
        let n = self.targets.len() as f64;
        let fidelity: f64 = self
            .targets
            .iter()
            .zip(states)
            .map(|(t, rho)| real_inner(t, rho))
            .sum::<f64>()
            / n;
        Ok(1.0 - fidelity)
    }

    fn normalizer(&self, params: &Array2<f64>) -> f64 {
        match self.schedule {
            Schedule::FinalStep => 1.0,
            Schedule::EveryStep => params.nrows().max(1) as f64,
        }
    }
}

impl Cost for TargetDensityInfidelity {
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
        check_state_kind(self.name(), StateKind::Density, layout)?;
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
        let scale = Complex64::new(-self.alpha / (n * self.normalizer(params)), 0.0);
        Ok(self.targets.iter().map(|t| t * scale).collect())
    }
}
