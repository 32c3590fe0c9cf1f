// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collapse operators for open-system evolution.
//!
//! Ref: Lindblad (1976), Commun. Math. Phys. 48, 119.
//! Ref: Gorini, Kossakowski, Sudarshan (1976), J. Math. Phys. 17, 821.

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::operators::{sigma_minus, sigma_z};

/// A Lindblad collapse (jump) operator with its rate.
///
/// Represents a single dissipation channel:
///   D[L](ρ) = γ (L ρ L† − ½{L†L, ρ})
///
/// Rates are in inverse units of the step duration used by the engine.
#[derive(Debug, Clone)]
pub struct CollapseOperator {
    /// Operator matrix (d × d).
    pub matrix: Array2<Complex64>,
    /// Decay rate γ ≥ 0.
    pub rate: f64,
    /// Human-readable label (e.g., "T1_q0", "Tphi_q1").
    pub label: String,
}

impl CollapseOperator {
    /// Create a collapse operator from an arbitrary matrix.
    pub fn new(matrix: Array2<Complex64>, rate: f64, label: impl Into<String>) -> Result<Self> {
        let op = Self {
            matrix,
            rate,
            label: label.into(),
        };
        op.validate()?;
        Ok(op)
    }

    /// Qubit amplitude damping: L = σ⁻, γ = `rate`.
    pub fn amplitude_damping(rate: f64, qubit_label: &str) -> Result<Self> {
        Self::new(sigma_minus(), rate, format!("T1_{qubit_label}"))
    }

    /// Qubit pure dephasing: L = σz/2, γ = `rate`.
    pub fn dephasing(rate: f64, qubit_label: &str) -> Result<Self> {
        Self::new(
            sigma_z() * Complex64::new(0.5, 0.0),
            rate,
            format!("Tphi_{qubit_label}"),
        )
    }

    /// Create both T1 and T_φ collapse operators for a single qubit.
    ///
    /// 1/T_φ = 1/T2 − 1/(2·T1), which requires T2 ≤ 2·T1.
    pub fn from_t1_t2(t1: f64, t2: f64, qubit_label: &str) -> Result<Vec<Self>> {
        if t1 <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "T1 must be positive, got {t1}"
            )));
        }
        if t2 <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "T2 must be positive, got {t2}"
            )));
        }
        if t2 > 2.0 * t1 {
            return Err(Error::InvalidConfiguration(format!(
                "T2 ({t2}) must be ≤ 2*T1 ({})",
                2.0 * t1
            )));
        }

        let gamma_phi = (1.0 / t2 - 1.0 / (2.0 * t1)).max(0.0);
        Ok(vec![
            Self::amplitude_damping(1.0 / t1, qubit_label)?,
            Self::dephasing(gamma_phi, qubit_label)?,
        ])
    }

    /// Check rate sign and operator shape.
    pub fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "Collapse operator '{}' has invalid rate {:.2e}",
                self.label, self.rate
            )));
        }
        if self.matrix.nrows() != self.matrix.ncols() {
            return Err(Error::shape(
                format!("collapse operator '{}'", self.label),
                "square matrix",
                format!("{} × {}", self.matrix.nrows(), self.matrix.ncols()),
            ));
        }
        Ok(())
    }
}
