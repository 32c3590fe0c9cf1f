// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The evolution engine: forward propagation, cost evaluation and the
//! backward pass, driven by the optimizer through [`EvolutionEngine::evaluate`].

use ndarray::Array2;
use num_complex::Complex64;
use tracing::{debug, warn};

use super::gradient::{
    backward_pass, central_difference_gradient, max_relative_deviation, GradientAccumulator, Tape,
};
use super::propagate::Dynamics;
use super::system::ControlSystem;
use super::types::{CostTerm, Evaluation, EvolutionConfig, StateBatch, Trajectory};
use crate::costs::{Cost, ProblemLayout};
use crate::error::{Error, Result};
use crate::linalg::all_finite;

/// Phase of a forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    /// Initial batch loaded, no step taken.
    Initialized,
    /// `step` has just been applied.
    Stepping { step: usize },
    /// Last step applied and final-step costs evaluated.
    Finalized,
}

/// What a forward pass records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    /// Costs only.
    Cost,
    /// States only, no costs.
    Trajectory,
    /// Costs plus everything the backward pass needs.
    Gradient,
}

impl PassMode {
    fn evaluates_costs(self) -> bool {
        self != PassMode::Trajectory
    }

    fn records_states(self) -> bool {
        self != PassMode::Cost
    }
}

/// Quantum optimal control engine for one problem.
///
/// Immutable once built: every pass allocates its own states, costates and
/// gradient accumulator, so a single engine can serve any number of
/// optimizer iterations.
#[derive(Debug)]
pub struct EvolutionEngine {
    config: EvolutionConfig,
    system: ControlSystem,
    initial: StateBatch,
    costs: Vec<Box<dyn Cost>>,
    dynamics: Dynamics,
}

impl EvolutionEngine {
    /// Validate the problem and build the engine.
    ///
    /// # Errors
    /// * [`Error::ShapeMismatch`] if the initial states do not match the
    ///   system dimension, or a cost's references do not match the batch.
    /// * [`Error::InvalidConfiguration`] for bad time discretization, a cost
    ///   that cannot act on the batch kind, or collapse operators on kets.
    pub fn new(
        config: EvolutionConfig,
        system: ControlSystem,
        initial: StateBatch,
        costs: Vec<Box<dyn Cost>>,
    ) -> Result<Self> {
        config.validate()?;
        if initial.dim() != system.dim() {
            return Err(Error::shape(
                "initial states",
                format!("dimension {}", system.dim()),
                format!("dimension {}", initial.dim()),
            ));
        }
        let dynamics = Dynamics::for_problem(initial.kind(), &system)?;

        let engine = Self {
            config,
            system,
            initial,
            costs,
            dynamics,
        };
        let layout = engine.layout();
        for cost in &engine.costs {
            cost.validate(&layout)?;
        }
        if engine.costs.is_empty() {
            warn!("evolution engine built without costs; every pass evaluates to zero");
        }
        debug!(
            dynamics = engine.dynamics.name(),
            dim = layout.dim,
            batch = layout.batch_size,
            steps = layout.step_count,
            channels = layout.control_count,
            costs = engine.costs.len(),
            "evolution engine ready"
        );
        Ok(engine)
    }

    pub fn layout(&self) -> ProblemLayout {
        ProblemLayout {
            state_kind: self.initial.kind(),
            batch_size: self.initial.len(),
            dim: self.system.dim(),
            step_count: self.config.num_time_steps,
            control_count: self.system.control_count(),
            dt: self.config.dt(),
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn system(&self) -> &ControlSystem {
        &self.system
    }

    pub fn initial_states(&self) -> &StateBatch {
        &self.initial
    }

    pub fn costs(&self) -> &[Box<dyn Cost>] {
        &self.costs
    }

    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    /// Shape of the control parameters, (T, K).
    pub fn parameter_shape(&self) -> (usize, usize) {
        (self.config.num_time_steps, self.system.control_count())
    }

    /// Total cost and its exact gradient.
    pub fn evaluate(&self, params: &Array2<f64>) -> Result<Evaluation> {
        let mut pass = ForwardPass::new(self, params, PassMode::Gradient)?;
        pass.run()?;

        let mut acc = pass.accumulator;
        let tape = Tape {
            dynamics: &self.dynamics,
            system: &self.system,
            dt: self.config.dt(),
            states: &pass.trajectory,
            hamiltonians: &pass.hamiltonians,
            maps: &pass.maps,
            seeds: &pass.seeds,
        };
        backward_pass(&tape, &mut acc)?;

        let gradient = acc.finalize();
        debug!(
            cost = pass.total,
            gradient_norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt(),
            "evaluation pass complete"
        );
        Ok(Evaluation {
            cost: pass.total,
            gradient,
            terms: pass.terms,
            final_states: pass.current,
        })
    }

    /// Total cost without gradients.
    pub fn evaluate_cost(&self, params: &Array2<f64>) -> Result<f64> {
        let mut pass = ForwardPass::new(self, params, PassMode::Cost)?;
        pass.run()?;
        Ok(pass.total)
    }

    /// Per-cost breakdown without gradients.
    pub fn evaluate_terms(&self, params: &Array2<f64>) -> Result<(f64, Vec<CostTerm>)> {
        let mut pass = ForwardPass::new(self, params, PassMode::Cost)?;
        pass.run()?;
        Ok((pass.total, pass.terms))
    }

    /// States at every time point, without evaluating costs.
    pub fn evolve(&self, params: &Array2<f64>) -> Result<Trajectory> {
        let mut pass = ForwardPass::new(self, params, PassMode::Trajectory)?;
        pass.run()?;
        Ok(Trajectory {
            kind: self.initial.kind(),
            states: pass.trajectory,
        })
    }

    /// Central finite-difference gradient of the total cost, with step `h`.
    pub fn finite_difference_gradient(&self, params: &Array2<f64>, h: f64) -> Result<Array2<f64>> {
        self.check_params(params)?;
        central_difference_gradient(|u| self.evaluate_cost(u), params, h)
    }

    /// Compare the adjoint gradient at `params` with central differences of
    /// step `h`; returns their largest relative deviation.
    pub fn check_gradient(&self, params: &Array2<f64>, h: f64) -> Result<f64> {
        let analytic = self.evaluate(params)?.gradient;
        let numeric = self.finite_difference_gradient(params, h)?;
        let deviation = max_relative_deviation(&analytic, &numeric)?;
        debug!(step = h, deviation, "gradient check");
        Ok(deviation)
    }

    /// Check that `params` is T × K and finite.
    pub fn check_params(&self, params: &Array2<f64>) -> Result<()> {
        let (t, k) = self.parameter_shape();
        if params.dim() != (t, k) {
            return Err(Error::shape(
                "control parameters",
                format!("{} × {}", t, k),
                format!("{} × {}", params.nrows(), params.ncols()),
            ));
        }
        if params.iter().any(|v| !v.is_finite()) {
            return Err(Error::NumericalInstability(
                "control parameters contain non-finite values".into(),
            ));
        }
        Ok(())
    }
}

/// One forward pass over T steps.
struct ForwardPass<'a> {
    engine: &'a EvolutionEngine,
    params: &'a Array2<f64>,
    mode: PassMode,
    phase: PassPhase,
    current: Vec<Array2<Complex64>>,
    trajectory: Vec<Vec<Array2<Complex64>>>,
    hamiltonians: Vec<Array2<Complex64>>,
    maps: Vec<Array2<Complex64>>,
    seeds: Vec<Option<Vec<Array2<Complex64>>>>,
    accumulator: GradientAccumulator,
    terms: Vec<CostTerm>,
    total: f64,
}

impl<'a> ForwardPass<'a> {
    fn new(engine: &'a EvolutionEngine, params: &'a Array2<f64>, mode: PassMode) -> Result<Self> {
        engine.check_params(params)?;
        let (steps, channels) = engine.parameter_shape();
        let current = engine.initial.states().to_vec();
        let trajectory = if mode.records_states() {
            let mut t = Vec::with_capacity(steps + 1);
            t.push(current.clone());
            t
        } else {
            Vec::new()
        };
        let seeds = if mode == PassMode::Gradient {
            vec![None; steps]
        } else {
            Vec::new()
        };
        let terms = engine
            .costs
            .iter()
            .map(|c| CostTerm {
                name: c.name().to_string(),
                value: 0.0,
                evaluations: 0,
            })
            .collect();

        Ok(Self {
            engine,
            params,
            mode,
            phase: PassPhase::Initialized,
            current,
            trajectory,
            hamiltonians: Vec::new(),
            maps: Vec::new(),
            seeds,
            accumulator: GradientAccumulator::zeros(steps, channels),
            terms,
            total: 0.0,
        })
    }

    fn run(&mut self) -> Result<()> {
        while self.phase != PassPhase::Finalized {
            self.phase = self.advance()?;
        }
        Ok(())
    }

    /// Apply the next step and evaluate the costs due after it.
    fn advance(&mut self) -> Result<PassPhase> {
        let step = match self.phase {
            PassPhase::Initialized => 0,
            PassPhase::Stepping { step } => step + 1,
            PassPhase::Finalized => return Ok(PassPhase::Finalized),
        };
        let engine = self.engine;
        let dt = engine.config.dt();

        let h = engine.system.hamiltonian(self.params.row(step))?;
        let map = engine.dynamics.step_map(&h, dt).map_err(|e| match e {
            Error::NumericalInstability(msg) => {
                Error::NumericalInstability(format!("step {}: {}", step, msg))
            }
            other => other,
        })?;
        let next = engine.dynamics.apply_batch(&map, &self.current)?;
        if !next.iter().all(all_finite) {
            return Err(Error::NumericalInstability(format!(
                "non-finite state after step {}",
                step
            )));
        }
        self.current = next;

        if self.mode.records_states() {
            self.trajectory.push(self.current.clone());
        }
        if self.mode == PassMode::Gradient {
            self.hamiltonians.push(h);
            self.maps.push(map);
        }

        let last = step + 1 == engine.config.num_time_steps;
        if self.mode.evaluates_costs() {
            for index in 0..engine.costs.len() {
                let cost = &engine.costs[index];
                if cost.requires_step_evaluation() {
                    self.apply_cost(index, step)?;
                }
            }
            if last {
                for index in 0..engine.costs.len() {
                    if !engine.costs[index].requires_step_evaluation() {
                        self.apply_cost(index, step)?;
                    }
                }
            }
        }

        Ok(if last {
            PassPhase::Finalized
        } else {
            PassPhase::Stepping { step }
        })
    }

    /// Evaluate one cost on the current batch and fold in its gradients.
    fn apply_cost(&mut self, index: usize, step: usize) -> Result<()> {
        let engine = self.engine;
        let cost = &engine.costs[index];
        let value = cost.evaluate(self.params, &self.current, step)?;
        if !value.is_finite() {
            return Err(Error::NumericalInstability(format!(
                "cost '{}' is {} at step {}",
                cost.name(),
                value,
                step
            )));
        }
        let term = &mut self.terms[index];
        term.value += value;
        term.evaluations += 1;
        self.total += value;

        if self.mode != PassMode::Gradient {
            return Ok(());
        }

        let param_grad = cost.gradient_wrt_parameters(self.params, &self.current, step)?;
        self.accumulator.add(&param_grad)?;

        let state_grad = cost.gradient_wrt_states(self.params, &self.current, step)?;
        if state_grad.len() != self.current.len()
            || state_grad
                .iter()
                .zip(&self.current)
                .any(|(g, s)| g.dim() != s.dim())
        {
            return Err(Error::shape(
                format!("state gradient of '{}'", cost.name()),
                format!("{} arrays shaped like the states", self.current.len()),
                format!("{} arrays", state_grad.len()),
            ));
        }
        if !state_grad.iter().all(all_finite) {
            return Err(Error::NumericalInstability(format!(
                "non-finite state gradient from '{}' at step {}",
                cost.name(),
                step
            )));
        }
        match &mut self.seeds[step] {
            Some(seed) => {
                for (s, g) in seed.iter_mut().zip(&state_grad) {
                    *s += g;
                }
            }
            slot => *slot = Some(state_grad),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::costs::{
        ControlArea, ControlBandwidthMax, ControlNorm, ControlVariation, ForbidDensities,
        ForbidStates, TargetDensityInfidelity, TargetStateInfidelity,
    };
    use crate::lindblad::CollapseOperator;
    use crate::operators::{density, ket};
    use crate::test_utils::{
        assert_matrix_close, max_relative_error, pauli_x, pauli_y, pauli_z, plus_state,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    fn qubit_system() -> ControlSystem {
        ControlSystem::new(pauli_z() * Complex64::new(0.5, 0.0), vec![pauli_x(), pauli_y()])
            .unwrap()
    }

    fn sample_params(steps: usize) -> Array2<f64> {
        Array2::from_shape_fn((steps, 2), |(t, k)| {
            0.6 * ((t as f64 + 1.0) * 1.618_033_988_749_895 + k as f64).sin()
        })
    }

    fn ket_engine(costs: Vec<Box<dyn Cost>>, steps: usize) -> EvolutionEngine {
        EvolutionEngine::new(
            EvolutionConfig::new(steps, 1.2).unwrap(),
            qubit_system(),
            StateBatch::kets(vec![ket(0, 2).unwrap(), plus_state()]).unwrap(),
            costs,
        )
        .unwrap()
    }

    #[test]
    fn test_identity_propagation() {
        let system = ControlSystem::new(Array2::zeros((2, 2)), vec![pauli_x()]).unwrap();
        let targets = vec![ket(1, 2).unwrap(), plus_state()];
        let engine = EvolutionEngine::new(
            EvolutionConfig::new(5, 1.0).unwrap(),
            system,
            StateBatch::kets(targets.clone()).unwrap(),
            vec![Box::new(TargetStateInfidelity::new(targets.clone()).unwrap())],
        )
        .unwrap();

        let eval = engine.evaluate(&Array2::zeros((5, 1))).unwrap();
        for (out, initial) in eval.final_states.iter().zip(&targets) {
            assert_matrix_close(out, initial, 1e-14);
        }
        assert_relative_eq!(eval.cost, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_round_trip_with_negated_hamiltonian() {
        let psi = plus_state();
        let system = ControlSystem::new(pauli_z() * Complex64::new(0.3, 0.0), vec![pauli_x()])
            .unwrap();
        let engine = EvolutionEngine::new(
            EvolutionConfig::new(1, 0.8).unwrap(),
            system,
            StateBatch::kets(vec![psi.clone()]).unwrap(),
            vec![],
        )
        .unwrap();
        let forward = engine.evolve(&array![[1.7]]).unwrap();

        let reversed = ControlSystem::new(pauli_z() * Complex64::new(-0.3, 0.0), vec![pauli_x()])
            .unwrap();
        let back_engine = EvolutionEngine::new(
            EvolutionConfig::new(1, 0.8).unwrap(),
            reversed,
            StateBatch::kets(forward.final_states().to_vec()).unwrap(),
            vec![],
        )
        .unwrap();
        let back = back_engine.evolve(&array![[-1.7]]).unwrap();

        let max_err = back.final_states()[0]
            .iter()
            .zip(psi.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max);
        assert!(max_err < 1e-9, "round trip error {}", max_err);
    }

    #[test]
    fn test_per_step_cost_evaluated_every_step() {
        let targets = vec![ket(1, 2).unwrap(), ket(0, 2).unwrap()];
        let engine = ket_engine(
            vec![
                Box::new(TargetStateInfidelity::time_averaged(targets.clone()).unwrap()),
                Box::new(TargetStateInfidelity::new(targets).unwrap()),
            ],
            7,
        );
        let (_, terms) = engine.evaluate_terms(&sample_params(7)).unwrap();
        assert_eq!(terms[0].evaluations, 7);
        assert_eq!(terms[1].evaluations, 1);
    }

    #[test]
    fn test_per_step_cost_contributes_each_step() {
        // Nothing moves, so every step contributes the same infidelity 1
        let system = ControlSystem::new(Array2::zeros((2, 2)), vec![pauli_x()]).unwrap();
        let engine = EvolutionEngine::new(
            EvolutionConfig::new(4, 1.0).unwrap(),
            system,
            StateBatch::kets(vec![ket(0, 2).unwrap()]).unwrap(),
            vec![Box::new(
                TargetStateInfidelity::time_averaged(vec![ket(1, 2).unwrap()]).unwrap(),
            )],
        )
        .unwrap();
        let (total, terms) = engine.evaluate_terms(&Array2::zeros((4, 1))).unwrap();
        assert_relative_eq!(total, 1.0, epsilon = 1e-14);
        assert_eq!(terms[0].evaluations, 4);
    }

    #[test]
    fn test_gradient_matches_finite_difference_ket() {
        let targets = vec![ket(1, 2).unwrap(), ket(0, 2).unwrap()];
        let engine = ket_engine(
            vec![Box::new(TargetStateInfidelity::new(targets).unwrap())],
            3,
        );
        let params = sample_params(3);
        let eval = engine.evaluate(&params).unwrap();
        assert_eq!(eval.gradient.dim(), (3, 2));

        let fd = engine.finite_difference_gradient(&params, 1e-6).unwrap();
        let err = max_relative_error(&eval.gradient, &fd);
        assert!(err < 1e-5, "relative error {}", err);
    }

    #[test]
    fn test_gradient_matches_finite_difference_mixed_costs() {
        let targets = vec![plus_state(), ket(1, 2).unwrap()];
        let forbidden = vec![vec![ket(1, 2).unwrap()], vec![]];
        let engine = ket_engine(
            vec![
                Box::new(TargetStateInfidelity::time_averaged(targets).unwrap()),
                Box::new(ForbidStates::new(forbidden).unwrap().with_alpha(0.5)),
                Box::new(ControlNorm::new(vec![1.0, 2.0]).with_alpha(0.1)),
                Box::new(ControlVariation::new(vec![1.0, 1.0], 1).with_alpha(0.2)),
            ],
            4,
        );
        let params = sample_params(4);
        let eval = engine.evaluate(&params).unwrap();
        let fd = engine.finite_difference_gradient(&params, 1e-6).unwrap();
        let err = max_relative_error(&eval.gradient, &fd);
        assert!(err < 1e-5, "relative error {}", err);
        assert_relative_eq!(
            eval.cost,
            eval.terms.iter().map(|t| t.value).sum::<f64>(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_gradient_matches_finite_difference_area_and_bandwidth() {
        let targets = vec![ket(1, 2).unwrap(), ket(0, 2).unwrap()];
        let dt = EvolutionConfig::new(4, 1.2).unwrap().dt();
        let engine = ket_engine(
            vec![
                Box::new(TargetStateInfidelity::new(targets).unwrap()),
                Box::new(ControlArea::new(vec![1.0, 0.5]).with_alpha(0.3)),
                Box::new(ControlBandwidthMax::new(vec![0.5, 0.8], dt).with_alpha(0.4)),
            ],
            4,
        );
        let params = sample_params(4);
        let eval = engine.evaluate(&params).unwrap();
        assert_eq!(eval.terms.len(), 3);
        assert!(eval.terms.iter().all(|t| t.evaluations == 1));

        let fd = engine.finite_difference_gradient(&params, 1e-6).unwrap();
        let err = max_relative_error(&eval.gradient, &fd);
        assert!(err < 1e-5, "relative error {}", err);
    }

    #[test]
    fn test_check_gradient_with_configured_step() {
        let targets = vec![plus_state(), ket(1, 2).unwrap()];
        let engine = ket_engine(
            vec![
                Box::new(TargetStateInfidelity::time_averaged(targets).unwrap()),
                Box::new(ControlNorm::new(vec![1.0, 1.0]).with_alpha(0.2)),
            ],
            3,
        );
        let step = Config::default().engine.finite_difference_step;
        let deviation = engine.check_gradient(&sample_params(3), step).unwrap();
        assert!(deviation < 1e-5, "deviation {}", deviation);

        assert!(matches!(
            engine.check_gradient(&sample_params(3), 0.0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_gradient_matches_finite_difference_density() {
        let rho0 = density(&ket(0, 2).unwrap());
        let target = density(&plus_state());
        let engine = EvolutionEngine::new(
            EvolutionConfig::new(3, 1.0).unwrap(),
            qubit_system(),
            StateBatch::densities(vec![rho0]).unwrap(),
            vec![
                Box::new(TargetDensityInfidelity::new(vec![target]).unwrap()),
                Box::new(
                    ForbidDensities::new(vec![vec![density(&ket(1, 2).unwrap())]]).unwrap(),
                ),
            ],
        )
        .unwrap();
        let params = sample_params(3);
        let eval = engine.evaluate(&params).unwrap();
        let fd = engine.finite_difference_gradient(&params, 1e-6).unwrap();
        assert!(max_relative_error(&eval.gradient, &fd) < 1e-5);
    }

    #[test]
    fn test_gradient_matches_finite_difference_lindblad() {
        let system = qubit_system()
            .with_collapse_operators(CollapseOperator::from_t1_t2(5.0, 4.0, "q0").unwrap())
            .unwrap();
        let engine = EvolutionEngine::new(
            EvolutionConfig::new(3, 1.0).unwrap(),
            system,
            StateBatch::densities(vec![density(&ket(0, 2).unwrap())]).unwrap(),
            vec![Box::new(
                TargetDensityInfidelity::time_averaged(vec![density(&ket(1, 2).unwrap())])
                    .unwrap(),
            )],
        )
        .unwrap();
        assert!(matches!(engine.dynamics(), Dynamics::Lindblad { .. }));

        let params = sample_params(3);
        let eval = engine.evaluate(&params).unwrap();
        let fd = engine.finite_difference_gradient(&params, 1e-6).unwrap();
        assert!(max_relative_error(&eval.gradient, &fd) < 1e-5);
    }

    #[test]
    fn test_lindblad_pass_preserves_trace() {
        let system = qubit_system()
            .with_collapse_operators(vec![CollapseOperator::amplitude_damping(0.4, "q0").unwrap()])
            .unwrap();
        let engine = EvolutionEngine::new(
            EvolutionConfig::new(6, 2.0).unwrap(),
            system,
            StateBatch::densities(vec![density(&plus_state())]).unwrap(),
            vec![],
        )
        .unwrap();
        let trajectory = engine.evolve(&sample_params(6)).unwrap();
        assert_eq!(trajectory.states.len(), 7);
        let rho = &trajectory.final_states()[0];
        assert_relative_eq!((rho[[0, 0]] + rho[[1, 1]]).re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_cost_matches_evaluate() {
        let engine = ket_engine(
            vec![Box::new(
                TargetStateInfidelity::new(vec![ket(1, 2).unwrap(), ket(1, 2).unwrap()]).unwrap(),
            )],
            5,
        );
        let params = sample_params(5);
        assert_relative_eq!(
            engine.evaluate_cost(&params).unwrap(),
            engine.evaluate(&params).unwrap().cost,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_parameter_shape_checked() {
        let engine = ket_engine(vec![], 3);
        let result = engine.evaluate(&Array2::zeros((3, 1)));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_non_finite_parameters_rejected() {
        let engine = ket_engine(vec![], 2);
        let mut params = Array2::zeros((2, 2));
        params[[1, 0]] = f64::INFINITY;
        let err = engine.evaluate(&params).unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn test_exponential_overflow_surfaces_as_instability() {
        // Finite parameters that pass the precheck but overflow the step exponential
        let engine = ket_engine(
            vec![Box::new(
                TargetStateInfidelity::new(vec![ket(1, 2).unwrap(), ket(0, 2).unwrap()]).unwrap(),
            )],
            2,
        );
        let mut params = sample_params(2);
        params[[0, 0]] = 1e300;
        assert!(engine.check_params(&params).is_ok());

        let err = engine.evaluate(&params).unwrap_err();
        assert!(matches!(err, Error::NumericalInstability(_)), "got {}", err);
        assert!(engine.evaluate_cost(&params).unwrap_err().is_numerical());
        assert!(engine.evolve(&params).unwrap_err().is_numerical());
    }

    #[derive(Debug)]
    struct NanCost;

    impl Cost for NanCost {
        fn name(&self) -> &str {
            "nan"
        }
        fn alpha(&self) -> f64 {
            1.0
        }
        fn requires_step_evaluation(&self) -> bool {
            false
        }
        fn validate(&self, _: &ProblemLayout) -> Result<()> {
            Ok(())
        }
        fn evaluate(&self, _: &Array2<f64>, _: &[Array2<Complex64>], _: usize) -> Result<f64> {
            Ok(f64::NAN)
        }
    }

    #[test]
    fn test_non_finite_cost_aborts_pass() {
        let engine = ket_engine(vec![Box::new(NanCost)], 2);
        let err = engine.evaluate(&sample_params(2)).unwrap_err();
        assert!(err.is_numerical(), "got {}", err);
    }

    #[test]
    fn test_initial_dimension_mismatch() {
        let result = EvolutionEngine::new(
            EvolutionConfig::new(2, 1.0).unwrap(),
            qubit_system(),
            StateBatch::kets(vec![ket(0, 3).unwrap()]).unwrap(),
            vec![],
        );
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_cost_validated_at_construction() {
        let result = EvolutionEngine::new(
            EvolutionConfig::new(2, 1.0).unwrap(),
            qubit_system(),
            StateBatch::kets(vec![ket(0, 2).unwrap()]).unwrap(),
            vec![Box::new(
                TargetDensityInfidelity::new(vec![density(&ket(0, 2).unwrap())]).unwrap(),
            )],
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_collapse_operators_need_densities() {
        let system = qubit_system()
            .with_collapse_operators(vec![CollapseOperator::dephasing(0.1, "q0").unwrap()])
            .unwrap();
        let result = EvolutionEngine::new(
            EvolutionConfig::new(2, 1.0).unwrap(),
            system,
            StateBatch::kets(vec![ket(0, 2).unwrap()]).unwrap(),
            vec![],
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }
}
