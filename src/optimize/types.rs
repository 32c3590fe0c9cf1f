// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Optimization settings and result types.

use ndarray::Array2;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::evolution::CostTerm;

/// Convergence criteria for the optimization loop.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    /// Maximum number of engine evaluations.
    pub max_iterations: usize,
    /// Stop once the total cost is at or below this value.
    pub cost_target: f64,
    /// Stop once the gradient's Euclidean norm falls below this value.
    pub gradient_tolerance: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            cost_target: 1e-4,
            gradient_tolerance: 1e-10,
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfiguration(
                "max_iterations must be > 0".into(),
            ));
        }
        if self.cost_target.is_nan() {
            return Err(Error::InvalidConfiguration("cost_target must not be NaN".into()));
        }
        if !(self.gradient_tolerance >= 0.0) {
            return Err(Error::InvalidConfiguration(
                "gradient_tolerance must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Why the optimization loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    CostTarget,
    GradientTolerance,
    MaxIterations,
}

/// Result of an optimization run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Optimizer that produced the result.
    pub optimizer: String,
    /// Best control parameters seen (T × K).
    #[serde(serialize_with = "serialize_rows")]
    pub controls: Array2<f64>,
    /// Total cost at `controls`.
    pub cost: f64,
    /// Per-cost breakdown at `controls`.
    pub terms: Vec<CostTerm>,
    /// Number of engine evaluations.
    pub iterations: usize,
    pub termination: Termination,
    /// Total cost per iteration.
    pub cost_history: Vec<f64>,
}

impl OptimizationResult {
    /// Whether a convergence criterion, rather than the iteration cap, ended the run.
    pub fn converged(&self) -> bool {
        self.termination != Termination::MaxIterations
    }
}

/// Serialize a T × K array as a list of time-step rows.
fn serialize_rows<S: Serializer>(controls: &Array2<f64>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let rows: Vec<Vec<f64>> = controls.rows().into_iter().map(|r| r.to_vec()).collect();
    rows.serialize(serializer)
}
