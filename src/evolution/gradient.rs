// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gradient aggregation.
//!
//! The analytic gradient is the adjoint-state method on the discretized
//! dynamics: a costate λ_t = ∂C/∂s_t is carried backward through the
//! pullback of every step map, picking up the state gradients of the
//! costs evaluated at that step, and each control entry receives
//!
//!   ∂C/∂u[t, k] = Σ_i ⟨λ_{t+1,i}, (∂M_t/∂u_k)·s_{t,i}⟩ + cost parameter terms
//!
//! with ∂M_t/∂u_k the exact Fréchet derivative of the step exponential.
//! [`central_difference_gradient`] is the cross-check.

use ndarray::Array2;
use num_complex::Complex64;

use super::propagate::Dynamics;
use super::system::ControlSystem;
use crate::error::{Error, Result};

/// Default step for [`central_difference_gradient`].
///
/// The truncation error of the central difference is O(h²) and the
/// rounding error O(ε/h); 1e-6 keeps both near 1e-10 for costs of order one.
pub const DEFAULT_FD_STEP: f64 = 1e-6;

/// Running sum of control-parameter gradient contributions for one pass.
#[derive(Debug, Clone)]
pub struct GradientAccumulator {
    gradient: Array2<f64>,
}

impl GradientAccumulator {
    /// Zero gradient for T steps and K channels.
    pub fn zeros(steps: usize, channels: usize) -> Self {
        Self {
            gradient: Array2::zeros((steps, channels)),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.gradient.dim()
    }

    /// Add a full T × K contribution.
    pub fn add(&mut self, contribution: &Array2<f64>) -> Result<()> {
        if contribution.dim() != self.gradient.dim() {
            let (t, k) = self.gradient.dim();
            return Err(Error::shape(
                "parameter gradient",
                format!("{} × {}", t, k),
                format!("{} × {}", contribution.nrows(), contribution.ncols()),
            ));
        }
        if contribution.iter().any(|v| !v.is_finite()) {
            return Err(Error::NumericalInstability(
                "non-finite parameter gradient contribution".into(),
            ));
        }
        self.gradient += contribution;
        Ok(())
    }

    /// Add to a single entry.
    pub fn add_at(&mut self, step: usize, channel: usize, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::NumericalInstability(format!(
                "non-finite gradient at step {}, channel {}",
                step, channel
            )));
        }
        let (steps, channels) = self.gradient.dim();
        let slot = self.gradient.get_mut([step, channel]).ok_or_else(|| {
            Error::shape(
                "parameter gradient index",
                format!("an index below ({}, {})", steps, channels),
                format!("({}, {})", step, channel),
            )
        })?;
        *slot += value;
        Ok(())
    }

    /// Read-only result, shaped like the control parameters.
    pub fn finalize(self) -> Array2<f64> {
        self.gradient
    }
}

/// Stored forward pass needed by [`backward_pass`].
pub(crate) struct Tape<'a> {
    pub dynamics: &'a Dynamics,
    pub system: &'a ControlSystem,
    pub dt: f64,
    /// T + 1 batches; `states[t]` is the batch before step t.
    pub states: &'a [Vec<Array2<Complex64>>],
    pub hamiltonians: &'a [Array2<Complex64>],
    pub maps: &'a [Array2<Complex64>],
    /// `seeds[t]`: summed cost state gradients on the batch after step t.
    pub seeds: &'a [Option<Vec<Array2<Complex64>>>],
}

/// Propagate costates backward and add the dynamics' contribution to `acc`.
pub(crate) fn backward_pass(tape: &Tape<'_>, acc: &mut GradientAccumulator) -> Result<()> {
    let steps = tape.maps.len();
    let Some(last) = steps.checked_sub(1) else {
        return Ok(());
    };
    let mut costate = match &tape.seeds[last] {
        Some(seed) => seed.clone(),
        None => tape.states[steps]
            .iter()
            .map(|s| Array2::zeros(s.raw_dim()))
            .collect(),
    };

    for t in (0..steps).rev() {
        let before = &tape.states[t];
        let map = &tape.maps[t];
        for (k, h_k) in tape.system.controls().iter().enumerate() {
            let dm = tape
                .dynamics
                .step_map_derivative(&tape.hamiltonians[t], h_k, tape.dt)?;
            let g: f64 = costate
                .iter()
                .zip(before)
                .map(|(lambda, s)| tape.dynamics.sensitivity(map, &dm, lambda, s))
                .sum();
            acc.add_at(t, k, g)?;
        }

        if t > 0 {
            let mut previous = tape.dynamics.pullback_batch(map, &costate)?;
            if let Some(seed) = &tape.seeds[t - 1] {
                for (p, s) in previous.iter_mut().zip(seed) {
                    *p += s;
                }
            }
            costate = previous;
        }
    }
    Ok(())
}

/// Central finite-difference gradient of `f` at `params`:
///
///   ∂f/∂u[t, k] ≈ (f(u + h·e_tk) − f(u − h·e_tk)) / 2h
///
/// Costs 2·T·K evaluations of `f`.
pub fn central_difference_gradient<F>(mut f: F, params: &Array2<f64>, step: f64) -> Result<Array2<f64>>
where
    F: FnMut(&Array2<f64>) -> Result<f64>,
{
    if !step.is_finite() || step <= 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "finite-difference step must be finite and > 0, got {}",
            step
        )));
    }
    let mut gradient = Array2::zeros(params.raw_dim());
    let mut probe = params.clone();
    for ((t, k), g) in gradient.indexed_iter_mut() {
        let original = probe[[t, k]];
        probe[[t, k]] = original + step;
        let plus = f(&probe)?;
        probe[[t, k]] = original - step;
        let minus = f(&probe)?;
        probe[[t, k]] = original;
        *g = (plus - minus) / (2.0 * step);
    }
    Ok(gradient)
}

/// Largest deviation between two gradients, relative to the largest entry
/// of `reference` (floored at 1e-12 so a vanishing reference stays defined).
pub fn max_relative_deviation(actual: &Array2<f64>, reference: &Array2<f64>) -> Result<f64> {
    if actual.dim() != reference.dim() {
        return Err(Error::shape(
            "gradient comparison",
            format!("{} × {}", reference.nrows(), reference.ncols()),
            format!("{} × {}", actual.nrows(), actual.ncols()),
        ));
    }
    let scale = reference.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-12);
    Ok(actual
        .iter()
        .zip(reference.iter())
        .map(|(a, r)| (a - r).abs() / scale)
        .fold(0.0, f64::max))
}
