// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Open-system dynamics under the Lindblad master equation.
//!
//!   dρ/dt = -i[H(t), ρ] + Σ_k γ_k (L_k ρ L_k† − ½{L_k†L_k, ρ})
//!
//! This module provides:
//! - Collapse operators for amplitude damping and dephasing
//! - The vectorized Hamiltonian and dissipator superoperators the
//!   evolution engine exponentiates for exact piecewise-constant steps
//!
//! # References
//!
//! - Lindblad, G. (1976). Commun. Math. Phys. 48, 119.
//!   DOI: 10.1007/BF01608499
//! - Gorini, V., Kossakowski, A., & Sudarshan, E. C. G. (1976). J. Math. Phys. 17, 821.
//!   DOI: 10.1063/1.522979
//! - Breuer, H.-P. & Petruccione, F. (2002). "The Theory of Open Quantum Systems." Oxford.

#[cfg(test)]
mod dissipator;
pub mod superoperator;
pub mod types;

pub use superoperator::{
    dissipator_superoperator, hamiltonian_superoperator, total_dissipator, unvectorize, vectorize,
};
pub use types::CollapseOperator;
