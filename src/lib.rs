// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS Pulse: quantum optimal control engine
//!
//! This crate evolves quantum states under a piecewise-constant controlled
//! Hamiltonian, evaluates pluggable costs along the trajectory and returns
//! the exact gradient of the total cost with respect to every control
//! amplitude.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        CLI / problem files (YAML)        │
//! ├─────────────────────────────────────────┤
//! │     Optimization loop (Adam, SGD)        │
//! ├─────────────────────────────────────────┤
//! │  Evolution engine: forward + adjoint     │
//! ├──────────────────┬──────────────────────┤
//! │   Cost registry  │  Step maps           │
//! │   (dyn Cost)     │  (ket, ρ, Lindblad)  │
//! ├──────────────────┴──────────────────────┤
//! │   Linear algebra: expm, Fréchet, kron    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`evolution`]: Forward propagation and adjoint gradients
//! - [`costs`]: Cost trait and implementations
//! - [`optimize`]: Update rules and optimization loop
//! - [`lindblad`]: Collapse operators and Liouvillian superoperators
//! - [`linalg`]: Matrix exponential and its Fréchet derivative
//! - [`operators`]: Standard operators and basis states
//! - [`problem`]: YAML problem descriptions
//! - [`config`]: Configuration management
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types

pub mod config;
pub mod costs;
pub mod error;
pub mod evolution;
pub mod linalg;
pub mod lindblad;
pub mod operators;
pub mod optimize;
pub mod problem;
pub mod validation;

pub use config::Config;
pub use costs::{Cost, CostObserver, ProblemLayout, Schedule};
pub use error::{Error, Result};
pub use evolution::{
    ControlSystem, Evaluation, EvolutionConfig, EvolutionEngine, StateBatch, StateKind,
};
pub use lindblad::CollapseOperator;

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
