// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Step maps for the three kinds of dynamics and their adjoints.
//!
//! Every step is an exact exponential of a piecewise-constant generator:
//!
//! | Dynamics     | Step map M            | State update           |
//! |--------------|-----------------------|------------------------|
//! | Schrödinger  | exp(−i·H·dt)          | ψ → Mψ                 |
//! | von Neumann  | exp(−i·H·dt)          | ρ → MρM†               |
//! | Lindblad     | exp(dt·𝓛)             | vec(ρ) → M·vec(ρ)      |
//!
//! The backward pass needs the adjoint of each update (the pullback of a
//! costate) and the first-order change of the updated state when the step
//! map moves by dM (the sensitivity).

use ndarray::Array2;
use num_complex::Complex64;

use super::system::ControlSystem;
use super::types::StateKind;
use crate::error::{Error, Result};
use crate::lindblad::{hamiltonian_superoperator, total_dissipator, unvectorize, vectorize};
use crate::linalg::{conjugate_transpose, expm_frechet, matrix_exp, real_inner};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How a state batch is advanced through one step.
#[derive(Debug, Clone)]
pub enum Dynamics {
    Schrodinger,
    VonNeumann,
    Lindblad {
        /// Control-independent dissipator superoperator Σ_k D[L_k].
        dissipator: Array2<Complex64>,
        dim: usize,
    },
}

impl Dynamics {
    /// Pick the dynamics for a batch kind and system.
    ///
    /// Collapse operators require density matrices.
    pub fn for_problem(kind: StateKind, system: &ControlSystem) -> Result<Self> {
        match (kind, system.is_open()) {
            (StateKind::Ket, false) => Ok(Dynamics::Schrodinger),
            (StateKind::Density, false) => Ok(Dynamics::VonNeumann),
            (StateKind::Density, true) => Ok(Dynamics::Lindblad {
                dissipator: total_dissipator(system.collapse_operators(), system.dim())?,
                dim: system.dim(),
            }),
            (StateKind::Ket, true) => Err(Error::InvalidConfiguration(
                "collapse operators require density-matrix initial states".into(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dynamics::Schrodinger => "schrodinger",
            Dynamics::VonNeumann => "von_neumann",
            Dynamics::Lindblad { .. } => "lindblad",
        }
    }

    /// Exponent G with step map M = exp(G).
    pub fn generator(&self, h: &Array2<Complex64>, dt: f64) -> Array2<Complex64> {
        match self {
            Dynamics::Schrodinger | Dynamics::VonNeumann => h * Complex64::new(0.0, -dt),
            Dynamics::Lindblad { dissipator, .. } => {
                (hamiltonian_superoperator(h) + dissipator) * Complex64::new(dt, 0.0)
            }
        }
    }

    /// ∂G/∂u_k for a control operator H_k.
    pub fn direction(&self, h_k: &Array2<Complex64>, dt: f64) -> Array2<Complex64> {
        match self {
            Dynamics::Schrodinger | Dynamics::VonNeumann => h_k * Complex64::new(0.0, -dt),
            Dynamics::Lindblad { .. } => hamiltonian_superoperator(h_k) * Complex64::new(dt, 0.0),
        }
    }

    /// Step map for Hamiltonian `h`.
    pub fn step_map(&self, h: &Array2<Complex64>, dt: f64) -> Result<Array2<Complex64>> {
        matrix_exp(&self.generator(h, dt))
    }

    /// ∂M/∂u_k at Hamiltonian `h`, via the exact Fréchet derivative.
    pub fn step_map_derivative(
        &self,
        h: &Array2<Complex64>,
        h_k: &Array2<Complex64>,
        dt: f64,
    ) -> Result<Array2<Complex64>> {
        let (_, derivative) = expm_frechet(&self.generator(h, dt), &self.direction(h_k, dt))?;
        Ok(derivative)
    }

    /// Advance one state through step map `m`.
    pub fn apply(&self, m: &Array2<Complex64>, state: &Array2<Complex64>) -> Result<Array2<Complex64>> {
        match self {
            Dynamics::Schrodinger => Ok(m.dot(state)),
            Dynamics::VonNeumann => Ok(m.dot(state).dot(&conjugate_transpose(m))),
            Dynamics::Lindblad { dim, .. } => unvectorize(&m.dot(&vectorize(state)), *dim),
        }
    }

    /// Adjoint of [`Dynamics::apply`]: carries a costate at step t+1 back to t.
    pub fn pullback(
        &self,
        m: &Array2<Complex64>,
        costate: &Array2<Complex64>,
    ) -> Result<Array2<Complex64>> {
        let m_dag = conjugate_transpose(m);
        match self {
            Dynamics::Schrodinger => Ok(m_dag.dot(costate)),
            Dynamics::VonNeumann => Ok(m_dag.dot(costate).dot(m)),
            Dynamics::Lindblad { dim, .. } => unvectorize(&m_dag.dot(&vectorize(costate)), *dim),
        }
    }

    /// First-order change of the real pairing ⟨costate, apply(m, state)⟩
    /// when the step map moves by `dm`.
    pub fn sensitivity(
        &self,
        m: &Array2<Complex64>,
        dm: &Array2<Complex64>,
        costate: &Array2<Complex64>,
        state: &Array2<Complex64>,
    ) -> f64 {
        match self {
            Dynamics::Schrodinger => real_inner(costate, &dm.dot(state)),
            Dynamics::VonNeumann => {
                let change = dm.dot(state).dot(&conjugate_transpose(m))
                    + m.dot(state).dot(&conjugate_transpose(dm));
                real_inner(costate, &change)
            }
            Dynamics::Lindblad { .. } => {
                real_inner(&vectorize(costate), &dm.dot(&vectorize(state)))
            }
        }
    }

    /// Advance every state in a batch. Conditions are independent, so the
    /// `parallel` feature spreads them over the rayon pool.
    pub fn apply_batch(
        &self,
        m: &Array2<Complex64>,
        states: &[Array2<Complex64>],
    ) -> Result<Vec<Array2<Complex64>>> {
        #[cfg(feature = "parallel")]
        {
            states.par_iter().map(|s| self.apply(m, s)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            states.iter().map(|s| self.apply(m, s)).collect()
        }
    }

    /// Pull back every costate in a batch.
    pub fn pullback_batch(
        &self,
        m: &Array2<Complex64>,
        costates: &[Array2<Complex64>],
    ) -> Result<Vec<Array2<Complex64>>> {
        #[cfg(feature = "parallel")]
        {
            costates.par_iter().map(|c| self.pullback(m, c)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            costates.iter().map(|c| self.pullback(m, c)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lindblad::CollapseOperator;
    use crate::operators::{density, ket};
    use crate::test_utils::{assert_matrix_close, pauli_x, pauli_z, plus_state};
    use approx::assert_relative_eq;

    fn closed_system() -> ControlSystem {
        ControlSystem::new(pauli_z(), vec![pauli_x()]).unwrap()
    }

    fn open_system() -> ControlSystem {
        closed_system()
            .with_collapse_operators(vec![CollapseOperator::amplitude_damping(0.3, "q0").unwrap()])
            .unwrap()
    }

    fn mixed_density() -> Array2<Complex64> {
        let mut rho = density(&plus_state()) * Complex64::new(0.8, 0.0);
        rho[[0, 0]] += Complex64::new(0.2, 0.0);
        rho
    }

    #[test]
    fn test_dynamics_selection() {
        assert!(matches!(
            Dynamics::for_problem(StateKind::Ket, &closed_system()).unwrap(),
            Dynamics::Schrodinger
        ));
        assert!(matches!(
            Dynamics::for_problem(StateKind::Density, &closed_system()).unwrap(),
            Dynamics::VonNeumann
        ));
        assert!(matches!(
            Dynamics::for_problem(StateKind::Density, &open_system()).unwrap(),
            Dynamics::Lindblad { .. }
        ));
        assert!(matches!(
            Dynamics::for_problem(StateKind::Ket, &open_system()),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_von_neumann_matches_ket_evolution() {
        let h = pauli_x() * Complex64::new(0.7, 0.0);
        let psi = plus_state();
        let m = Dynamics::Schrodinger.step_map(&h, 0.3).unwrap();
        let evolved_ket = Dynamics::Schrodinger.apply(&m, &psi).unwrap();
        let evolved_rho = Dynamics::VonNeumann.apply(&m, &density(&psi)).unwrap();
        assert_matrix_close(&evolved_rho, &density(&evolved_ket), 1e-14);
    }

    #[test]
    fn test_lindblad_without_dissipation_matches_von_neumann() {
        let h = pauli_x() + pauli_z() * Complex64::new(0.4, 0.0);
        let lindblad = Dynamics::Lindblad {
            dissipator: Array2::zeros((4, 4)),
            dim: 2,
        };
        let rho = mixed_density();

        let m_open = lindblad.step_map(&h, 0.25).unwrap();
        let m_closed = Dynamics::VonNeumann.step_map(&h, 0.25).unwrap();
        assert_matrix_close(
            &lindblad.apply(&m_open, &rho).unwrap(),
            &Dynamics::VonNeumann.apply(&m_closed, &rho).unwrap(),
            1e-12,
        );
    }

    #[test]
    fn test_pullback_is_adjoint() {
        // ⟨λ, apply(m, s)⟩ = ⟨pullback(m, λ), s⟩ for every dynamics
        let h = pauli_x() * Complex64::new(0.9, 0.0) + pauli_z();
        let lindblad = Dynamics::for_problem(StateKind::Density, &open_system()).unwrap();
        let rho = mixed_density();
        let mut lambda = Array2::zeros((2, 2));
        lambda[[0, 1]] = Complex64::new(0.3, -1.2);
        lambda[[1, 1]] = Complex64::new(-0.5, 0.0);

        for dynamics in [Dynamics::VonNeumann, lindblad] {
            let m = dynamics.step_map(&h, 0.2).unwrap();
            let lhs = real_inner(&lambda, &dynamics.apply(&m, &rho).unwrap());
            let rhs = real_inner(&dynamics.pullback(&m, &lambda).unwrap(), &rho);
            assert_relative_eq!(lhs, rhs, epsilon = 1e-13);
        }

        let psi = ket(1, 2).unwrap();
        let mut lam = Array2::zeros((2, 1));
        lam[[0, 0]] = Complex64::new(0.4, 0.8);
        let m = Dynamics::Schrodinger.step_map(&h, 0.2).unwrap();
        let lhs = real_inner(&lam, &Dynamics::Schrodinger.apply(&m, &psi).unwrap());
        let rhs = real_inner(&Dynamics::Schrodinger.pullback(&m, &lam).unwrap(), &psi);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-13);
    }

    #[test]
    fn test_step_map_derivative_matches_difference() {
        let h = pauli_z() + pauli_x() * Complex64::new(0.5, 0.0);
        let h_k = pauli_x();
        let eps = 1e-6;
        let lindblad = Dynamics::for_problem(StateKind::Density, &open_system()).unwrap();

        for dynamics in [Dynamics::Schrodinger, lindblad] {
            let dm = dynamics.step_map_derivative(&h, &h_k, 0.1).unwrap();
            let plus = dynamics
                .step_map(&(&h + &(&h_k * Complex64::new(eps, 0.0))), 0.1)
                .unwrap();
            let minus = dynamics
                .step_map(&(&h - &(&h_k * Complex64::new(eps, 0.0))), 0.1)
                .unwrap();
            let fd = (plus - minus) / Complex64::new(2.0 * eps, 0.0);
            assert_matrix_close(&dm, &fd, 1e-8);
        }
    }

    #[test]
    fn test_apply_batch_preserves_order() {
        let m = Dynamics::Schrodinger.step_map(&pauli_x(), 0.4).unwrap();
        let states = vec![ket(0, 2).unwrap(), ket(1, 2).unwrap()];
        let out = Dynamics::Schrodinger.apply_batch(&m, &states).unwrap();
        assert_matrix_close(&out[0], &m.dot(&states[0]), 1e-15);
        assert_matrix_close(&out[1], &m.dot(&states[1]), 1e-15);
    }
}
