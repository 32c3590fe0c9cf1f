// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities.

use ndarray::Array2;
use num_complex::Complex64;

pub use crate::operators::{ket, sigma_x as pauli_x, sigma_y as pauli_y, sigma_z as pauli_z};

/// Assert two complex matrices agree elementwise within `tol`.
pub fn assert_matrix_close(a: &Array2<Complex64>, b: &Array2<Complex64>, tol: f64) {
    assert_eq!(a.shape(), b.shape());
    for ((i, j), val) in a.indexed_iter() {
        let diff = (val - b[[i, j]]).norm();
        assert!(
            diff <= tol,
            "Mismatch at ({}, {}): {:?} vs {:?} (diff={})",
            i,
            j,
            val,
            b[[i, j]],
            diff
        );
    }
}

/// |+⟩ = (|0⟩ + |1⟩)/√2
pub fn plus_state() -> Array2<Complex64> {
    let h = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
    let mut psi = Array2::zeros((2, 1));
    psi[[0, 0]] = h;
    psi[[1, 0]] = h;
    psi
}

/// Largest relative deviation between two gradients, measured against the
/// largest entry of `reference`.
pub fn max_relative_error(actual: &Array2<f64>, reference: &Array2<f64>) -> f64 {
    crate::evolution::max_relative_deviation(actual, reference).unwrap()
}
