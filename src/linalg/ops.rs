// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense complex matrix helpers.

use ndarray::{s, Array2, ArrayBase, Data, Dimension};
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Conjugate transpose (dagger) of a matrix.
pub fn conjugate_transpose(m: &Array2<Complex64>) -> Array2<Complex64> {
    m.t().mapv(|z| z.conj())
}

/// Commutator [A, B] = AB − BA.
pub fn commutator(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    if a.dim() != b.dim() || a.nrows() != a.ncols() {
        return Err(Error::shape(
            "commutator",
            format!("two square matrices of {} × {}", a.nrows(), a.ncols()),
            format!("{} × {}", b.nrows(), b.ncols()),
        ));
    }
    Ok(a.dot(b) - b.dot(a))
}

/// Kronecker product of a list of matrices, left to right:
/// krons([A, B, C]) = A ⊗ B ⊗ C.
pub fn krons(matrices: &[Array2<Complex64>]) -> Result<Array2<Complex64>> {
    let (first, rest) = matrices
        .split_first()
        .ok_or_else(|| Error::InvalidConfiguration("krons requires at least one matrix".into()))?;
    Ok(rest
        .iter()
        .fold(first.clone(), |acc, m| ndarray::linalg::kron(&acc, m)))
}

/// Matrix product of a list of matrices, left to right:
/// matmuls([A, B, C]) = A·B·C.
pub fn matmuls(matrices: &[Array2<Complex64>]) -> Result<Array2<Complex64>> {
    let (first, rest) = matrices
        .split_first()
        .ok_or_else(|| Error::InvalidConfiguration("matmuls requires at least one matrix".into()))?;
    let mut acc = first.clone();
    for (i, m) in rest.iter().enumerate() {
        if acc.ncols() != m.nrows() {
            return Err(Error::shape(
                format!("matmuls operand {}", i + 1),
                format!("{} rows", acc.ncols()),
                format!("{} rows", m.nrows()),
            ));
        }
        acc = acc.dot(m);
    }
    Ok(acc)
}

/// Root-mean-square of the entries: sqrt(mean(|x|²)).
///
/// Returns 0 for an empty array.
pub fn rms_norm<S, D>(x: &ArrayBase<S, D>) -> f64
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if x.is_empty() {
        return 0.0;
    }
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

/// Trace of a square matrix.
pub fn trace(m: &Array2<Complex64>) -> Complex64 {
    m.diag().iter().sum()
}

/// Real part of the Frobenius inner product, Re Σ conj(a_ij)·b_ij.
///
/// This is the pairing between a real-cost gradient `a` and a state
/// perturbation `b`.
pub fn real_inner(a: &Array2<Complex64>, b: &Array2<Complex64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x.conj() * y).re).sum()
}

/// Check A = A† within `tol`.
pub fn is_hermitian(m: &Array2<Complex64>, tol: f64) -> bool {
    m.nrows() == m.ncols()
        && m
            .indexed_iter()
            .all(|((i, j), z)| (z - m[[j, i]].conj()).norm() <= tol)
}

/// Stack d × 1 column vectors side by side into a d × n matrix.
pub fn column_vector_list_to_matrix(columns: &[Array2<Complex64>]) -> Result<Array2<Complex64>> {
    let first = columns.first().ok_or_else(|| {
        Error::InvalidConfiguration("column_vector_list_to_matrix requires a column".into())
    })?;
    let d = first.nrows();
    let mut out = Array2::zeros((d, columns.len()));
    for (j, col) in columns.iter().enumerate() {
        if col.dim() != (d, 1) {
            return Err(Error::shape(
                format!("column {}", j),
                format!("{} × 1", d),
                format!("{} × {}", col.nrows(), col.ncols()),
            ));
        }
        out.slice_mut(s![.., j..j + 1]).assign(col);
    }
    Ok(out)
}

/// Split a d × n matrix into n column vectors of shape d × 1.
pub fn matrix_to_column_vector_list(m: &Array2<Complex64>) -> Vec<Array2<Complex64>> {
    (0..m.ncols())
        .map(|j| m.slice(s![.., j..j + 1]).to_owned())
        .collect()
}

/// Whether every entry is finite.
pub fn all_finite(m: &Array2<Complex64>) -> bool {
    m.iter().all(|z| z.re.is_finite() && z.im.is_finite())
}
