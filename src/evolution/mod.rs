// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! State evolution and exact gradients.
//!
//! The engine advances a batch of kets or density matrices through T
//! piecewise-constant steps under
//!
//!   H(t) = H₀ + Σ_k u[t, k]·H_k
//!
//! evaluating the registered costs as it goes, then runs the adjoint pass
//! to produce ∂C/∂u with the same T × K shape as the controls.
//!
//! - [`ControlSystem`]: drift, control operators, collapse operators
//! - [`Dynamics`]: step maps for Schrödinger, von Neumann and Lindblad evolution
//! - [`EvolutionEngine`]: forward pass, cost evaluation and backward pass
//! - [`GradientAccumulator`]: per-pass gradient sum
//!
//! # References
//!
//! - Khaneja et al. (2005), "Optimal control of coupled spin dynamics",
//!   J. Magn. Reson. 172, 296. doi:10.1016/j.jmr.2004.11.004
//! - Leung et al. (2017), "Speedup for quantum optimal control from automatic
//!   differentiation based on graphics processing units", Phys. Rev. A 95, 042318.

pub mod engine;
pub mod gradient;
pub mod propagate;
pub mod system;
pub mod types;

pub use engine::{EvolutionEngine, PassPhase};
pub use gradient::{
    central_difference_gradient, max_relative_deviation, GradientAccumulator, DEFAULT_FD_STEP,
};
pub use propagate::Dynamics;
pub use system::ControlSystem;
pub use types::{CostTerm, Evaluation, EvolutionConfig, StateBatch, StateKind, Trajectory};
