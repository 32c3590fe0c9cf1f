// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gradient-based optimization of control parameters.
//!
//! The engine only answers `evaluate(params) -> (cost, gradient)`; update
//! rules and convergence criteria live here:
//!
//! - [`Optimizer`]: update-rule trait, with [`Sgd`], [`Adam`] and [`Lbfgs`]
//! - [`optimize`]: the loop, with iteration cap, cost target, gradient
//!   tolerance and best-parameter tracking
//! - [`initial_controls`]: deterministic starting pulses

pub mod driver;
pub mod optimizer;
pub mod types;

pub use driver::optimize;
pub use optimizer::{initial_controls, Adam, Lbfgs, Objective, Optimizer, Sgd};
pub use types::{OptimizationResult, OptimizerSettings, Termination};
