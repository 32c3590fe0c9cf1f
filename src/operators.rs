// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Standard operators and basis states.
//!
//! These are fixed, immutable inputs used to assemble Hamiltonians and
//! targets. The engine treats them as opaque matrices.

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{Error, Result};

const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Pauli X.
pub fn sigma_x() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = ONE;
    m[[1, 0]] = ONE;
    m
}

/// Pauli Y.
pub fn sigma_y() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = Complex64::new(0.0, -1.0);
    m[[1, 0]] = Complex64::new(0.0, 1.0);
    m
}

/// Pauli Z.
pub fn sigma_z() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 0]] = ONE;
    m[[1, 1]] = -ONE;
    m
}

/// σ⁺ = |1⟩⟨0|
pub fn sigma_plus() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[1, 0]] = ONE;
    m
}

/// σ⁻ = |0⟩⟨1|
pub fn sigma_minus() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = ONE;
    m
}

pub fn identity(dim: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(dim, ONE)
}

/// Truncated bosonic lowering operator a, with a|n⟩ = √n |n−1⟩.
pub fn annihilation(dim: usize) -> Array2<Complex64> {
    let mut m = Array2::zeros((dim, dim));
    for n in 1..dim {
        m[[n - 1, n]] = Complex64::new((n as f64).sqrt(), 0.0);
    }
    m
}

/// Truncated bosonic raising operator a†.
pub fn creation(dim: usize) -> Array2<Complex64> {
    annihilation(dim).t().mapv(|z| z.conj())
}

/// Number operator a†a.
pub fn number(dim: usize) -> Array2<Complex64> {
    let mut m = Array2::zeros((dim, dim));
    for n in 0..dim {
        m[[n, n]] = Complex64::new(n as f64, 0.0);
    }
    m
}

/// Matrix unit |i⟩⟨j| in a `dim`-level space.
pub fn eij(i: usize, j: usize, dim: usize) -> Result<Array2<Complex64>> {
    if i >= dim || j >= dim {
        return Err(Error::InvalidConfiguration(format!(
            "matrix unit ({}, {}) outside a {}-level space",
            i, j, dim
        )));
    }
    let mut m = Array2::zeros((dim, dim));
    m[[i, j]] = ONE;
    Ok(m)
}

/// Basis ket |index⟩ as a `dim` × 1 column.
pub fn ket(index: usize, dim: usize) -> Result<Array2<Complex64>> {
    if index >= dim {
        return Err(Error::InvalidConfiguration(format!(
            "basis state {} outside a {}-level space",
            index, dim
        )));
    }
    let mut psi = Array2::zeros((dim, 1));
    psi[[index, 0]] = ONE;
    Ok(psi)
}

/// Pure-state density matrix |ψ⟩⟨ψ|.
pub fn density(ket: &Array2<Complex64>) -> Array2<Complex64> {
    ket.dot(&ket.t().mapv(|z| z.conj()))
}
