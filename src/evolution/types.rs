// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Evolution configuration, state batches and pass results.

use ndarray::Array2;
use num_complex::Complex64;
use serde::Serialize;

use crate::error::{Error, Result};

/// Whether a batch holds state vectors or density matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// d × 1 columns evolved as ψ → Uψ.
    Ket,
    /// d × d matrices evolved as ρ → UρU† (or the Lindblad map).
    Density,
}

/// Ordered initial conditions, one per independent trajectory.
#[derive(Debug, Clone)]
pub struct StateBatch {
    kind: StateKind,
    states: Vec<Array2<Complex64>>,
}

impl StateBatch {
    /// A batch of state vectors. Every entry must be `d × 1` with the same `d`.
    pub fn kets(states: Vec<Array2<Complex64>>) -> Result<Self> {
        Self::build(StateKind::Ket, states)
    }

    /// A batch of density matrices. Every entry must be `d × d` with the same `d`.
    pub fn densities(states: Vec<Array2<Complex64>>) -> Result<Self> {
        Self::build(StateKind::Density, states)
    }

    fn build(kind: StateKind, states: Vec<Array2<Complex64>>) -> Result<Self> {
        let first = states.first().ok_or_else(|| {
            Error::InvalidConfiguration("state batch must contain at least one state".into())
        })?;
        let d = first.nrows();
        if d == 0 {
            return Err(Error::InvalidConfiguration(
                "states must have a nonzero dimension".into(),
            ));
        }
        let expected = match kind {
            StateKind::Ket => (d, 1),
            StateKind::Density => (d, d),
        };
        for (i, s) in states.iter().enumerate() {
            if s.dim() != expected {
                return Err(Error::shape(
                    format!("initial state {}", i),
                    format!("{} × {}", expected.0, expected.1),
                    format!("{} × {}", s.nrows(), s.ncols()),
                ));
            }
        }
        Ok(Self { kind, states })
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Hilbert-space dimension d.
    pub fn dim(&self) -> usize {
        self.states[0].nrows()
    }

    pub fn states(&self) -> &[Array2<Complex64>] {
        &self.states
    }

    pub fn into_states(self) -> Vec<Array2<Complex64>> {
        self.states
    }
}

/// Time discretization of one evolution pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionConfig {
    /// Number of piecewise-constant steps T.
    pub num_time_steps: usize,
    /// Total evolution time, in the inverse units of the Hamiltonian.
    pub duration: f64,
}

impl EvolutionConfig {
    pub fn new(num_time_steps: usize, duration: f64) -> Result<Self> {
        let config = Self {
            num_time_steps,
            duration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Duration of a single step.
    pub fn dt(&self) -> f64 {
        self.duration / self.num_time_steps as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_time_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "num_time_steps must be > 0".into(),
            ));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "duration must be finite and > 0, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

/// Contribution of one registered cost to a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostTerm {
    pub name: String,
    /// Weighted value summed over all evaluations.
    pub value: f64,
    /// How many times the cost was evaluated during the pass.
    pub evaluations: usize,
}

/// Result of a forward and backward pass.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Total weighted cost.
    pub cost: f64,
    /// dCost/du, shaped like the control parameters (T × K).
    pub gradient: Array2<f64>,
    /// Per-cost breakdown in registration order.
    pub terms: Vec<CostTerm>,
    /// States after the last step.
    pub final_states: Vec<Array2<Complex64>>,
}

/// States at every time point of a forward pass.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub kind: StateKind,
    /// `states[t][i]` is condition `i` after `t` steps; `states[0]` is the
    /// initial batch, so there are T + 1 entries.
    pub states: Vec<Vec<Array2<Complex64>>>,
}

impl Trajectory {
    pub fn final_states(&self) -> &[Array2<Complex64>] {
        self.states.last().map(Vec::as_slice).unwrap_or(&[])
    }
}
