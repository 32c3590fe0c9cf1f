// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cost functions.
//!
//! A cost is a weighted, differentiable scalar of the control parameters
//! and the state batch at one time step. Each cost declares whether it is
//! evaluated after every step or once after the last one; the engine
//! iterates a uniform `Vec<Box<dyn Cost>>` and never looks at concrete
//! types.
//!
//! State gradients use the real-gradient convention: for a real `f` of a
//! complex entry `z`, the gradient entry is ∂f/∂Re z + i·∂f/∂Im z, so that
//! `df = Re Σ conj(g)·dz`. Both gradient methods always return arrays
//! shaped like their inputs, zero-filled where the cost does not depend on
//! them.
//!
//! | Cost                          | Schedule   | Acts on         |
//! |-------------------------------|------------|-----------------|
//! | [`TargetStateInfidelity`]     | either     | kets            |
//! | [`TargetDensityInfidelity`]   | either     | density matrices|
//! | [`ForbidStates`]              | every step | kets            |
//! | [`ForbidDensities`]           | every step | density matrices|
//! | [`ControlNorm`]               | final      | controls        |
//! | [`ControlArea`]               | final      | controls        |
//! | [`ControlVariation`]          | final      | controls        |
//! | [`ControlBandwidthMax`]       | final      | controls        |

use std::fmt;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evolution::StateKind;

pub mod control;
pub mod density;
pub mod forbid;
pub mod observer;
pub mod target;

pub use control::{ControlArea, ControlBandwidthMax, ControlNorm, ControlVariation};
pub use density::TargetDensityInfidelity;
pub use forbid::{ForbidDensities, ForbidStates};
pub use observer::{CostObserver, Observation, RecordingObserver, TracingObserver};
pub use target::TargetStateInfidelity;

/// Default weight of every cost.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// When a cost is evaluated during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Once, on the states after the last step.
    #[default]
    FinalStep,
    /// After every step; the contribution is averaged over the steps.
    EveryStep,
}

/// Shape facts about the problem a cost is registered with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProblemLayout {
    pub state_kind: StateKind,
    /// Number of initial conditions N.
    pub batch_size: usize,
    /// Hilbert-space dimension d.
    pub dim: usize,
    /// Number of time steps T.
    pub step_count: usize,
    /// Number of control channels K.
    pub control_count: usize,
    /// Step duration.
    pub dt: f64,
}

/// A weighted term of the objective.
pub trait Cost: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Weight applied to the value and both gradients.
    fn alpha(&self) -> f64;

    /// `true` if evaluated after every step, `false` if only after the last.
    fn requires_step_evaluation(&self) -> bool;

    /// Check the cost against the problem before any stepping.
    fn validate(&self, layout: &ProblemLayout) -> Result<()>;

    /// Weighted contribution for `step`, given the full T × K control
    /// parameters and the batch after that step.
    fn evaluate(
        &self,
        params: &Array2<f64>,
        states: &[Array2<Complex64>],
        step: usize,
    ) -> Result<f64>;

    /// ∂/∂params of [`Cost::evaluate`], shaped like `params`.
    fn gradient_wrt_parameters(
        &self,
        params: &Array2<f64>,
        _states: &[Array2<Complex64>],
        _step: usize,
    ) -> Result<Array2<f64>> {
        Ok(Array2::zeros(params.raw_dim()))
    }

    /// ∂/∂states of [`Cost::evaluate`], one array per state, each shaped
    /// like that state.
    fn gradient_wrt_states(
        &self,
        _params: &Array2<f64>,
        states: &[Array2<Complex64>],
        _step: usize,
    ) -> Result<Vec<Array2<Complex64>>> {
        Ok(zero_state_gradient(states))
    }
}

pub(crate) fn zero_state_gradient(states: &[Array2<Complex64>]) -> Vec<Array2<Complex64>> {
    states.iter().map(|s| Array2::zeros(s.raw_dim())).collect()
}

pub(crate) fn check_alpha(name: &str, alpha: f64) -> Result<()> {
    if !alpha.is_finite() {
        return Err(Error::InvalidConfiguration(format!(
            "{}: alpha must be finite, got {}",
            name, alpha
        )));
    }
    Ok(())
}

pub(crate) fn check_state_kind(name: &str, expected: StateKind, layout: &ProblemLayout) -> Result<()> {
    if layout.state_kind != expected {
        return Err(Error::InvalidConfiguration(format!(
            "{} needs {:?} states, problem has {:?}",
            name, expected, layout.state_kind
        )));
    }
    Ok(())
}

/// Check one reference list per initial condition, each entry with the
/// shape of a problem state.
pub(crate) fn check_references(
    name: &str,
    references: &[Array2<Complex64>],
    layout: &ProblemLayout,
) -> Result<()> {
    if references.len() != layout.batch_size {
        return Err(Error::shape(
            name,
            format!("{} references (one per initial state)", layout.batch_size),
            references.len(),
        ));
    }
    let expected = match layout.state_kind {
        StateKind::Ket => (layout.dim, 1),
        StateKind::Density => (layout.dim, layout.dim),
    };
    for (i, r) in references.iter().enumerate() {
        if r.dim() != expected {
            return Err(Error::shape(
                format!("{} reference {}", name, i),
                format!("{} × {}", expected.0, expected.1),
                format!("{} × {}", r.nrows(), r.ncols()),
            ));
        }
    }
    Ok(())
}

/// Check the evaluated batch lines up with the references.
pub(crate) fn check_batch(name: &str, references: usize, states: &[Array2<Complex64>]) -> Result<()> {
    if states.is_empty() {
        return Err(Error::InvalidConfiguration(format!(
            "{} is undefined for an empty state batch",
            name
        )));
    }
    if states.len() != references {
        return Err(Error::shape(
            name,
            format!("{} states", references),
            states.len(),
        ));
    }
    Ok(())
}

/// Per-channel limit vector check shared by the control costs.
pub(crate) fn check_channel_limits(name: &str, limits: &[f64], layout: &ProblemLayout) -> Result<()> {
    if limits.len() != layout.control_count {
        return Err(Error::shape(
            name,
            format!("{} channel limits", layout.control_count),
            limits.len(),
        ));
    }
    if let Some(bad) = limits.iter().find(|m| !m.is_finite() || **m <= 0.0) {
        return Err(Error::InvalidConfiguration(format!(
            "{}: channel limits must be finite and > 0, got {}",
            name, bad
        )));
    }
    Ok(())
}
