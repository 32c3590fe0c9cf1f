// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Penalties on population of forbidden states, evaluated after every step.
//!
//!   C = α·Σ_i (Σ_j |⟨φ_ij|ψ_i⟩|² / n_i) / (N·T)
//!
//! `φ_ij` are the forbidden states of condition `i` and `n_i` their count.
//! A condition with no forbidden states contributes nothing. The density
//! form replaces the overlap with Re Tr(φ_ij† ρ_i).

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;

use super::observer::{default_observer, CostObserver};
use super::{
    check_alpha, check_batch, check_references, check_state_kind, Cost, ProblemLayout,
    DEFAULT_ALPHA,
};
use crate::error::{Error, Result};
use crate::evolution::StateKind;
use crate::linalg::real_inner;

fn overlap(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

fn check_forbidden(
    name: &str,
    forbidden: &[Vec<Array2<Complex64>>],
    layout: &ProblemLayout,
) -> Result<()> {
    if forbidden.len() != layout.batch_size {
        return Err(Error::shape(
            name,
            format!("{} forbidden-state lists", layout.batch_size),
            forbidden.len(),
        ));
    }
    for list in forbidden {
        if !list.is_empty() {
            // Each list is checked as if it were a batch of the problem's states.
            let per_list = ProblemLayout {
                batch_size: list.len(),
                ..*layout
            };
            check_references(name, list, &per_list)?;
        }
    }
    Ok(())
}

fn require_conditions(name: &str, forbidden: &[Vec<Array2<Complex64>>]) -> Result<()> {
    if forbidden.is_empty() {
        return Err(Error::InvalidConfiguration(format!(
            "{} needs one forbidden-state list per initial state",
            name
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ForbidStates {
    forbidden: Vec<Vec<Array2<Complex64>>>,
    alpha: f64,
    observer: Arc<dyn CostObserver>,
}

impl ForbidStates {
    pub const NAME: &'static str = "forbid_states";

    /// One list of forbidden kets per initial condition.
    pub fn new(forbidden: Vec<Vec<Array2<Complex64>>>) -> Result<Self> {
        require_conditions(Self::NAME, &forbidden)?;
        Ok(Self {
            forbidden,
            alpha: DEFAULT_ALPHA,
            observer: default_observer(),
        })
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CostObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn scale(&self, params: &Array2<f64>) -> f64 {
        self.alpha / (self.forbidden.len() as f64 * params.nrows().max(1) as f64)
    }
}

impl Cost for ForbidStates {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        true
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(Self::NAME, self.alpha)?;
        check_state_kind(Self::NAME, StateKind::Ket, layout)?;
        check_forbidden(Self::NAME, &self.forbidden, layout)
    }

    fn evaluate(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        step: usize,
    ) -> Result<f64> {
        check_batch(Self::NAME, self.forbidden.len(), states)?;
        let population: f64 = self
            .forbidden
            .iter()
            .zip(states)
            .filter(|(list, _)| !list.is_empty())
            .map(|(list, psi)| {
                list.iter().map(|phi| overlap(phi, psi).norm_sqr()).sum::<f64>() / list.len() as f64
            })
            .sum();
        self.observer
            .observe(Self::NAME, step, population / self.forbidden.len() as f64);
        Ok(population * self.scale(params))
    }

    fn gradient_wrt_states(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        _step: usize,
    ) -> Result<Vec<Array2<Complex64>>> {
        check_batch(Self::NAME, self.forbidden.len(), states)?;
        let scale = self.scale(params);
        Ok(self
            .forbidden
            .iter()
            .zip(states)
            .map(|(list, psi)| {
                let mut grad = Array2::zeros(psi.raw_dim());
                let weight = 2.0 * scale / list.len().max(1) as f64;
                for phi in list {
                    grad.scaled_add(overlap(phi, psi) * weight, phi);
                }
                grad
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct ForbidDensities {
    forbidden: Vec<Vec<Array2<Complex64>>>,
    alpha: f64,
    observer: Arc<dyn CostObserver>,
}

impl ForbidDensities {
    pub const NAME: &'static str = "forbid_densities";

    /// One list of forbidden density matrices per initial condition.
    pub fn new(forbidden: Vec<Vec<Array2<Complex64>>>) -> Result<Self> {
        require_conditions(Self::NAME, &forbidden)?;
        Ok(Self {
            forbidden,
            alpha: DEFAULT_ALPHA,
            observer: default_observer(),
        })
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CostObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn scale(&self, params: &Array2<f64>) -> f64 {
        self.alpha / (self.forbidden.len() as f64 * params.nrows().max(1) as f64)
    }
}

impl Cost for ForbidDensities {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        true
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(Self::NAME, self.alpha)?;
        check_state_kind(Self::NAME, StateKind::Density, layout)?;
        check_forbidden(Self::NAME, &self.forbidden, layout)
    }

    fn evaluate(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        step: usize,
    ) -> Result<f64> {
        check_batch(Self::NAME, self.forbidden.len(), states)?;
        let population: f64 = self
            .forbidden
            .iter()
            .zip(states)
            .filter(|(list, _)| !list.is_empty())
            .map(|(list, rho)| {
                list.iter().map(|phi| real_inner(phi, rho)).sum::<f64>() / list.len() as f64
            })
            .sum();
        self.observer
            .observe(Self::NAME, step, population / self.forbidden.len() as f64);
        Ok(population * self.scale(params))
    }

    fn gradient_wrt_states(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        _step: usize,
    ) -> Result<Vec<Array2<Complex64>>> {
        check_batch(Self::NAME, self.forbidden.len(), states)?;
        let scale = self.scale(params);
        Ok(self
            .forbidden
            .iter()
            .zip(states)
            .map(|(list, rho)| {
                let mut grad = Array2::zeros(rho.raw_dim());
                let weight = Complex64::new(scale / list.len().max(1) as f64, 0.0);
                for phi in list {
                    grad.scaled_add(weight, phi);
                }
                grad
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{density, ket};
    use crate::test_utils::plus_state;
    use approx::assert_relative_eq;

    fn params() -> Array2<f64> {
        Array2::zeros((2, 1))
    }

    #[test]
    fn test_forbid_states_value() {
        let cost = ForbidStates::new(vec![vec![ket(1, 2).unwrap()], vec![]]).unwrap();
        assert!(cost.requires_step_evaluation());
        let states = vec![plus_state(), ket(1, 2).unwrap()];
        // Condition 0 has half its population forbidden, condition 1 none listed
        let value = cost.evaluate(&params(), &states, 0).unwrap();
        assert_relative_eq!(value, 0.5 / (2.0 * 2.0), epsilon = 1e-14);
    }

    #[test]
    fn test_forbid_states_gradient_matches_difference() {
        let cost = ForbidStates::new(vec![vec![ket(1, 2).unwrap(), plus_state()]]).unwrap();
        let mut psi = Array2::zeros((2, 1));
        psi[[0, 0]] = Complex64::new(0.3, -0.4);
        psi[[1, 0]] = Complex64::new(0.5, 0.2);
        let grad = cost.gradient_wrt_states(&params(), &[psi.clone()], 0).unwrap();
        assert_eq!(grad[0].dim(), (2, 1));

        let eps = 1e-7;
        let mut plus = psi.clone();
        let mut minus = psi.clone();
        plus[[1, 0]] += Complex64::new(0.0, eps);
        minus[[1, 0]] -= Complex64::new(0.0, eps);
        let fd = (cost.evaluate(&params(), &[plus], 0).unwrap()
            - cost.evaluate(&params(), &[minus], 0).unwrap())
            / (2.0 * eps);
        assert_relative_eq!(grad[0][[1, 0]].im, fd, epsilon = 1e-7);
    }

    #[test]
    fn test_forbid_densities_value_and_gradient() {
        let forbidden = density(&ket(1, 2).unwrap());
        let cost = ForbidDensities::new(vec![vec![forbidden.clone()]])
            .unwrap()
            .with_alpha(2.0);
        let states = vec![density(&plus_state())];
        let value = cost.evaluate(&params(), &states, 1).unwrap();
        assert_relative_eq!(value, 2.0 * 0.5 / 2.0, epsilon = 1e-14);

        let grad = cost.gradient_wrt_states(&params(), &states, 1).unwrap();
        assert_relative_eq!(grad[0][[1, 1]].re, 1.0, epsilon = 1e-14);
        assert_relative_eq!(grad[0][[0, 0]].re, 0.0);
    }

    #[test]
    fn test_empty_condition_list_rejected() {
        assert!(matches!(
            ForbidStates::new(vec![]),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ForbidDensities::new(vec![]),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_checks_list_count() {
        let cost = ForbidStates::new(vec![vec![ket(1, 2).unwrap()]]).unwrap();
        let layout = ProblemLayout {
            state_kind: StateKind::Ket,
            batch_size: 2,
            dim: 2,
            step_count: 3,
            control_count: 1,
            dt: 0.1,
        };
        assert!(matches!(
            cost.validate(&layout),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
