// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vectorized (Liouville-space) form of the Lindblad generator.
//!
//! Uses column stacking, vec(ρ)[j·d + i] = ρ[i, j], under which
//! vec(A X B) = (Bᵀ ⊗ A) vec(X). A step of open-system evolution is then
//! vec(ρ') = exp(dt·𝓛) vec(ρ), which shares the exponential and Fréchet
//! machinery with the closed-system propagators.

use ndarray::linalg::kron;
use ndarray::Array2;
use num_complex::Complex64;

use super::types::CollapseOperator;
use crate::error::{Error, Result};
use crate::linalg::conjugate_transpose;
use crate::operators::identity;

/// Column-stack a d × d matrix into a d² × 1 column.
pub fn vectorize(rho: &Array2<Complex64>) -> Array2<Complex64> {
    let d = rho.nrows();
    let mut v = Array2::zeros((d * rho.ncols(), 1));
    for ((i, j), z) in rho.indexed_iter() {
        v[[j * d + i, 0]] = *z;
    }
    v
}

/// Inverse of [`vectorize`] for a `dim` × `dim` matrix.
pub fn unvectorize(v: &Array2<Complex64>, dim: usize) -> Result<Array2<Complex64>> {
    if v.dim() != (dim * dim, 1) {
        return Err(Error::shape(
            "unvectorize",
            format!("{} × 1", dim * dim),
            format!("{} × {}", v.nrows(), v.ncols()),
        ));
    }
    Ok(Array2::from_shape_fn((dim, dim), |(i, j)| v[[j * dim + i, 0]]))
}

/// Superoperator of ρ ↦ −i[H, ρ]: −i(I ⊗ H − Hᵀ ⊗ I).
pub fn hamiltonian_superoperator(h: &Array2<Complex64>) -> Array2<Complex64> {
    let id = identity(h.nrows());
    let left = kron(&id, h);
    let right = kron(&h.t().to_owned(), &id);
    (left - right) * Complex64::new(0.0, -1.0)
}

/// Superoperator of ρ ↦ D[L](ρ):
/// γ (L̄ ⊗ L − ½ I ⊗ L†L − ½ (L†L)ᵀ ⊗ I).
pub fn dissipator_superoperator(op: &CollapseOperator) -> Array2<Complex64> {
    let l = &op.matrix;
    let d = l.nrows();
    if op.rate == 0.0 {
        return Array2::zeros((d * d, d * d));
    }
    let id = identity(d);
    let l_dag_l = conjugate_transpose(l).dot(l);
    let jump = kron(&l.mapv(|z| z.conj()), l);
    let anti = kron(&id, &l_dag_l) + kron(&l_dag_l.t().to_owned(), &id);
    (jump - anti * Complex64::new(0.5, 0.0)) * Complex64::new(op.rate, 0.0)
}

/// Summed dissipator superoperator for a set of collapse operators.
///
/// All operators must be `dim` × `dim`.
pub fn total_dissipator(collapse_ops: &[CollapseOperator], dim: usize) -> Result<Array2<Complex64>> {
    let mut total = Array2::zeros((dim * dim, dim * dim));
    for op in collapse_ops {
        op.validate()?;
        if op.matrix.nrows() != dim {
            return Err(Error::shape(
                format!("collapse operator '{}'", op.label),
                format!("{} × {}", dim, dim),
                format!("{} × {}", op.matrix.nrows(), op.matrix.ncols()),
            ));
        }
        total = total + dissipator_superoperator(op);
    }
    Ok(total)
}
