// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Linear-algebra kernel.
//!
//! Stateless functions over dense complex matrices:
//!
//! - [`matrix_exp`]: Matrix exponential via scaling-and-squaring + Padé(13)
//! - [`propagator`]: Step propagator exp(-i·H·dt)
//! - [`expm_frechet`]: Exact Fréchet derivative of the exponential
//! - [`conjugate_transpose`], [`commutator`], [`krons`], [`matmuls`],
//!   [`rms_norm`] and friends

pub mod expm;
pub mod ops;

pub use expm::{expm_frechet, matrix_exp, propagator};
pub use ops::{
    all_finite, column_vector_list_to_matrix, commutator, conjugate_transpose, is_hermitian,
    krons, matmuls, matrix_to_column_vector_list, real_inner, rms_norm, trace,
};
