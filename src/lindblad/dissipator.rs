// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Matrix-form Lindblad generator, the reference the vectorized
//! superoperators in [`super::superoperator`] are checked against.
//!
//! Ref: Breuer & Petruccione, "The Theory of Open Quantum Systems" (2002), Ch. 3.

use ndarray::Array2;
use num_complex::Complex64;

use super::types::CollapseOperator;
use crate::linalg::conjugate_transpose;

/// D[L](ρ) = γ (L ρ L† − ½{L†L, ρ})
pub fn dissipator(op: &CollapseOperator, rho: &Array2<Complex64>) -> Array2<Complex64> {
    let l_dag = conjugate_transpose(&op.matrix);
    let number = l_dag.dot(&op.matrix);
    let jump = op.matrix.dot(rho).dot(&l_dag);
    let anticommutator = number.dot(rho) + rho.dot(&number);
    (jump - anticommutator * Complex64::new(0.5, 0.0)) * Complex64::new(op.rate, 0.0)
}

/// dρ/dt = −i[H, ρ] + Σ_k D[L_k](ρ)
pub fn lindblad_rhs(
    h: &Array2<Complex64>,
    collapse_ops: &[CollapseOperator],
    rho: &Array2<Complex64>,
) -> Array2<Complex64> {
    let unitary = (h.dot(rho) - rho.dot(h)) * Complex64::new(0.0, -1.0);
    collapse_ops
        .iter()
        .map(|op| dissipator(op, rho))
        .fold(unitary, |acc, d| acc + d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{density, ket, sigma_minus};
    use crate::test_utils::{plus_state, pauli_z};
    use approx::assert_relative_eq;

    fn populated(level: usize) -> Array2<Complex64> {
        density(&ket(level, 2).unwrap())
    }

    fn decay(rate: f64) -> CollapseOperator {
        CollapseOperator::new(sigma_minus(), rate, "decay").unwrap()
    }

    #[test]
    fn test_dissipator_ground_state_is_fixed_point() {
        // σ⁻|0⟩ = 0
        let d = dissipator(&decay(3.0), &populated(0));
        for elem in d.iter() {
            assert_relative_eq!(elem.norm(), 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_dissipator_excited_state_decays() {
        let gamma = 0.25;
        let d = dissipator(&decay(gamma), &populated(1));
        // Population flows from |1⟩ to |0⟩
        assert_relative_eq!(d[[0, 0]].re, gamma, epsilon = 1e-15);
        assert_relative_eq!(d[[1, 1]].re, -gamma, epsilon = 1e-15);
    }

    #[test]
    fn test_dissipator_preserves_trace() {
        let rho = density(&plus_state());
        let d = dissipator(&decay(2.0), &rho);
        let trace = d[[0, 0]] + d[[1, 1]];
        assert_relative_eq!(trace.norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_dephasing_kills_coherences() {
        let op = CollapseOperator::dephasing(1.0, "q0").unwrap();
        let rho = density(&plus_state());
        let d = dissipator(&op, &rho);

        // Populations untouched, coherences decay at γ/2
        assert_relative_eq!(d[[0, 0]].re, 0.0, epsilon = 1e-14);
        assert_relative_eq!(d[[1, 1]].re, 0.0, epsilon = 1e-14);
        assert_relative_eq!(d[[0, 1]].re, -0.25, epsilon = 1e-14);
        assert_relative_eq!(d[[1, 0]].re, -0.25, epsilon = 1e-14);
    }

    #[test]
    fn test_zero_rate_gives_zero_dissipator() {
        let d = dissipator(&decay(0.0), &populated(1));
        assert!(d.iter().all(|z| z.norm() == 0.0));
    }

    #[test]
    fn test_lindblad_rhs_unitary_only() {
        // [σz, |1⟩⟨1|] = 0
        let drho = lindblad_rhs(&pauli_z(), &[], &populated(1));
        for elem in drho.iter() {
            assert_relative_eq!(elem.norm(), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_lindblad_rhs_with_both_channels() {
        let rho = density(&plus_state());
        let h = Array2::zeros((2, 2));
        let ops = CollapseOperator::from_t1_t2(50.0, 30.0, "q0").unwrap();

        let drho = lindblad_rhs(&h, &ops, &rho);
        let norm: f64 = drho.iter().map(|z| z.norm_sqr()).sum();
        assert!(norm > 0.0, "RHS should be nonzero for mixed evolution");
    }
}
