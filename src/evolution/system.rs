// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Controlled Hamiltonian H(t) = H₀ + Σ_k u[t, k]·H_k.

use ndarray::{Array2, ArrayView1};
use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::lindblad::CollapseOperator;
use crate::validation::validate_hermitian;

/// Tolerance for the Hermiticity check on drift and control operators.
const HERMITIAN_TOL: f64 = 1e-10;

/// Drift plus control operators, and optional dissipation channels.
#[derive(Debug, Clone)]
pub struct ControlSystem {
    drift: Array2<Complex64>,
    controls: Vec<Array2<Complex64>>,
    collapse_ops: Vec<CollapseOperator>,
}

impl ControlSystem {
    /// Build a closed system. Drift and every control operator must be
    /// Hermitian and share one dimension.
    pub fn new(drift: Array2<Complex64>, controls: Vec<Array2<Complex64>>) -> Result<Self> {
        let d = drift.nrows();
        check_operator("drift", &drift, d)?;
        for (k, h) in controls.iter().enumerate() {
            check_operator(&format!("control operator {}", k), h, d)?;
        }
        Ok(Self {
            drift,
            controls,
            collapse_ops: Vec::new(),
        })
    }

    /// Attach Lindblad collapse operators.
    pub fn with_collapse_operators(mut self, ops: Vec<CollapseOperator>) -> Result<Self> {
        let d = self.dim();
        for op in &ops {
            op.validate()?;
            if op.matrix.nrows() != d {
                return Err(Error::shape(
                    format!("collapse operator '{}'", op.label),
                    format!("{} × {}", d, d),
                    format!("{} × {}", op.matrix.nrows(), op.matrix.ncols()),
                ));
            }
        }
        self.collapse_ops = ops;
        Ok(self)
    }

    pub fn dim(&self) -> usize {
        self.drift.nrows()
    }

    /// Number of control channels K.
    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    pub fn drift(&self) -> &Array2<Complex64> {
        &self.drift
    }

    pub fn controls(&self) -> &[Array2<Complex64>] {
        &self.controls
    }

    pub fn collapse_operators(&self) -> &[CollapseOperator] {
        &self.collapse_ops
    }

    pub fn is_open(&self) -> bool {
        !self.collapse_ops.is_empty()
    }

    /// Hamiltonian for one time step, given that step's control row.
    pub fn hamiltonian(&self, amplitudes: ArrayView1<'_, f64>) -> Result<Array2<Complex64>> {
        if amplitudes.len() != self.controls.len() {
            return Err(Error::shape(
                "control amplitudes",
                format!("{} channels", self.controls.len()),
                format!("{} channels", amplitudes.len()),
            ));
        }
        let mut h = self.drift.clone();
        for (op, &u) in self.controls.iter().zip(amplitudes.iter()) {
            h.scaled_add(Complex64::new(u, 0.0), op);
        }
        Ok(h)
    }
}

fn check_operator(what: &str, m: &Array2<Complex64>, dim: usize) -> Result<()> {
    validate_hermitian(what, m, dim, HERMITIAN_TOL)
}
