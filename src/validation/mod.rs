// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for problem files and control envelopes.

use ndarray::Array2;
use num_complex::Complex64;

use crate::config::ResourceLimits;
use crate::error::{Error, Result};
use crate::evolution::EvolutionEngine;
use crate::linalg::is_hermitian;

/// Validate that `m` is a non-empty `dim × dim` matrix.
pub fn validate_square(what: &str, m: &Array2<Complex64>, dim: usize) -> Result<()> {
    if m.nrows() != m.ncols() || m.nrows() != dim {
        return Err(Error::shape(
            what,
            format!("{} × {}", dim, dim),
            format!("{} × {}", m.nrows(), m.ncols()),
        ));
    }
    if dim == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "{} has zero dimension",
            what
        )));
    }
    Ok(())
}

/// Validate that `m` is a `dim × dim` Hermitian matrix.
pub fn validate_hermitian(what: &str, m: &Array2<Complex64>, dim: usize, tol: f64) -> Result<()> {
    validate_square(what, m, dim)?;
    if !is_hermitian(m, tol) {
        return Err(Error::InvalidConfiguration(format!(
            "{} is not Hermitian",
            what
        )));
    }
    Ok(())
}

/// Validate problem size against resource limits.
pub fn validate_problem_size(
    hilbert_dim: usize,
    num_time_steps: usize,
    batch_size: usize,
    limits: &ResourceLimits,
) -> Result<()> {
    if hilbert_dim > limits.max_hilbert_dim {
        return Err(limit_error(
            "hilbert_dim",
            limits.max_hilbert_dim,
            hilbert_dim,
        ));
    }

    if num_time_steps > limits.max_time_steps {
        return Err(limit_error(
            "num_time_steps",
            limits.max_time_steps,
            num_time_steps,
        ));
    }

    validate_batch_size(batch_size, limits)
}

/// Validate a built engine against resource limits.
pub fn validate_engine(engine: &EvolutionEngine, limits: &ResourceLimits) -> Result<()> {
    let layout = engine.layout();
    validate_problem_size(layout.dim, layout.step_count, layout.batch_size, limits)
}

/// Validate the number of initial states.
pub fn validate_batch_size(batch_size: usize, limits: &ResourceLimits) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::InvalidConfiguration(
            "initial state batch cannot be empty".into(),
        ));
    }

    if batch_size > limits.max_batch_size {
        return Err(limit_error("batch_size", limits.max_batch_size, batch_size));
    }

    Ok(())
}

/// Validate a control envelope: shape, finiteness and optional amplitude bound.
pub fn validate_control_envelope(
    controls: &Array2<f64>,
    expected_shape: (usize, usize),
    max_amplitude: Option<f64>,
) -> Result<()> {
    if controls.dim() != expected_shape {
        return Err(Error::shape(
            "control envelope",
            format!("{} × {}", expected_shape.0, expected_shape.1),
            format!("{} × {}", controls.nrows(), controls.ncols()),
        ));
    }

    for ((t, k), val) in controls.indexed_iter() {
        if val.is_nan() {
            return Err(Error::InvalidConfiguration(format!(
                "control envelope contains NaN at step {}, channel {}",
                t, k
            )));
        }
        if val.is_infinite() {
            return Err(Error::InvalidConfiguration(format!(
                "control envelope contains Inf at step {}, channel {}",
                t, k
            )));
        }
        if let Some(max) = max_amplitude {
            if val.abs() > max {
                return Err(Error::InvalidConfiguration(format!(
                    "amplitude {} at step {}, channel {} exceeds max {}",
                    val, t, k, max
                )));
            }
        }
    }

    Ok(())
}

fn limit_error(resource: &str, limit: usize, requested: usize) -> Error {
    Error::ResourceLimit {
        resource: resource.into(),
        limit: limit as u64,
        requested: requested as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{sigma_minus, sigma_x};

    #[test]
    fn test_validate_square() {
        assert!(validate_square("drift", &sigma_x(), 2).is_ok());
        assert!(matches!(
            validate_square("drift", &sigma_x(), 3),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            validate_square("drift", &Array2::zeros((0, 0)), 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_hermitian() {
        assert!(validate_hermitian("control", &sigma_x(), 2, 1e-10).is_ok());
        let msg = validate_hermitian("control 0", &sigma_minus(), 2, 1e-10)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("control 0 is not Hermitian"));
    }

    #[test]
    fn test_validate_problem_size() {
        let limits = ResourceLimits::default();

        // Valid problem
        assert!(validate_problem_size(4, 100, 2, &limits).is_ok());

        // Too large a Hilbert space
        let err = validate_problem_size(128, 100, 2, &limits).unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimit { ref resource, limit: 64, requested: 128 } if resource == "hilbert_dim"
        ));

        // Too many steps
        assert!(validate_problem_size(4, 20_000, 2, &limits).is_err());
    }

    #[test]
    fn test_validate_batch_size() {
        let limits = ResourceLimits::default();
        assert!(validate_batch_size(1, &limits).is_ok());
        assert!(matches!(
            validate_batch_size(0, &limits),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            validate_batch_size(101, &limits),
            Err(Error::ResourceLimit { .. })
        ));
    }

    #[test]
    fn test_validate_control_envelope() {
        let controls = Array2::<f64>::zeros((10, 2));

        // Valid envelope
        assert!(validate_control_envelope(&controls, (10, 2), Some(1.0)).is_ok());

        // Wrong shape
        assert!(matches!(
            validate_control_envelope(&controls, (5, 2), None),
            Err(Error::ShapeMismatch { .. })
        ));

        // Contains NaN
        let mut bad = controls.clone();
        bad[[4, 1]] = f64::NAN;
        let msg = validate_control_envelope(&bad, (10, 2), None)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("step 4, channel 1"));

        // Exceeds the amplitude bound
        let mut big = controls;
        big[[0, 0]] = 2.0;
        assert!(validate_control_envelope(&big, (10, 2), Some(1.0)).is_err());
        assert!(validate_control_envelope(&big, (10, 2), None).is_ok());
    }
}
