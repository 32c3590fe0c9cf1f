// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parameter update rules.
//!
//! Optimizers minimize: they consume the gradient of the total cost and
//! step against it. Any state they keep (momenta, curvature pairs) lives
//! inside the optimizer, never in the engine.
//!
//! # References
//!
//! - Kingma & Ba (2015), "Adam: A Method for Stochastic Optimization",
//!   arXiv:1412.6980.
//! - Nocedal & Wright (2006), "Numerical Optimization", 2nd ed., Alg. 7.4
//!   (L-BFGS two-loop recursion) and §3.1 (Armijo backtracking).

use std::collections::VecDeque;
use std::fmt;

use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};

/// Cost-only evaluation of trial parameters, for rules that search along
/// a direction.
pub type Objective<'a> = dyn FnMut(&Array2<f64>) -> Result<f64> + 'a;

/// A gradient-based update rule.
pub trait Optimizer: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// New parameters after one step. `iteration` starts at 0.
    fn update(
        &mut self,
        params: &Array2<f64>,
        gradient: &Array2<f64>,
        iteration: usize,
    ) -> Result<Array2<f64>>;

    /// One step with access to the objective. `cost` is the total cost at
    /// `params`. Rules without a line search use [`Optimizer::update`].
    fn step(
        &mut self,
        params: &Array2<f64>,
        _cost: f64,
        gradient: &Array2<f64>,
        iteration: usize,
        _objective: &mut Objective<'_>,
    ) -> Result<Array2<f64>> {
        self.update(params, gradient, iteration)
    }

    /// Drop accumulated state before a fresh run.
    fn reset(&mut self) {}
}

fn check_shapes(params: &Array2<f64>, gradient: &Array2<f64>) -> Result<()> {
    if params.dim() != gradient.dim() {
        return Err(Error::shape(
            "optimizer gradient",
            format!("{} × {}", params.nrows(), params.ncols()),
            format!("{} × {}", gradient.nrows(), gradient.ncols()),
        ));
    }
    Ok(())
}

/// Plain gradient descent with exponential learning-rate decay:
/// lr_n = lr·decayⁿ.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    pub decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            decay: 0.999,
        }
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn learning_rate_at(&self, iteration: usize) -> f64 {
        self.learning_rate * self.decay.powi(iteration.min(i32::MAX as usize) as i32)
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &str {
        "sgd"
    }

    fn update(
        &mut self,
        params: &Array2<f64>,
        gradient: &Array2<f64>,
        iteration: usize,
    ) -> Result<Array2<f64>> {
        check_shapes(params, gradient)?;
        Ok(params - &(gradient * self.learning_rate_at(iteration)))
    }
}

/// Adam with bias-corrected first and second moments.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    m: Option<Array2<f64>>,
    v: Option<Array2<f64>>,
    steps: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: None,
            v: None,
            steps: 0,
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &str {
        "adam"
    }

    fn update(
        &mut self,
        params: &Array2<f64>,
        gradient: &Array2<f64>,
        _iteration: usize,
    ) -> Result<Array2<f64>> {
        check_shapes(params, gradient)?;
        if self.m.as_ref().is_some_and(|m| m.dim() != params.dim()) {
            self.reset();
        }
        let m = self
            .m
            .get_or_insert_with(|| Array2::zeros(params.raw_dim()));
        m.zip_mut_with(gradient, |m, g| *m = self.beta1 * *m + (1.0 - self.beta1) * g);
        let v = self
            .v
            .get_or_insert_with(|| Array2::zeros(params.raw_dim()));
        v.zip_mut_with(gradient, |v, g| *v = self.beta2 * *v + (1.0 - self.beta2) * g * g);

        self.steps = self.steps.saturating_add(1);
        let m_correction = 1.0 - self.beta1.powi(self.steps);
        let v_correction = 1.0 - self.beta2.powi(self.steps);

        let mut next = params.clone();
        ndarray::Zip::from(&mut next)
            .and(&*m)
            .and(&*v)
            .for_each(|p, &m, &v| {
                let m_hat = m / m_correction;
                let v_hat = v / v_correction;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            });
        Ok(next)
    }

    fn reset(&mut self) {
        self.m = None;
        self.v = None;
        self.steps = 0;
    }
}

fn dot(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Sufficient-decrease constant of the Armijo condition.
const ARMIJO_C1: f64 = 1e-4;
/// Step shrink factor per backtracking trial.
const BACKTRACK: f64 = 0.5;
/// Curvature pairs with s·y at or below this are discarded.
const MIN_CURVATURE: f64 = 1e-12;

/// Limited-memory BFGS with Armijo backtracking and optional box bounds.
///
/// The inverse Hessian is approximated from the last `memory` pairs
/// s = Δparams, y = Δgradient. With bounds set every trial point is
/// projected onto [lower, upper] before it is evaluated (projected L-BFGS),
/// so amplitudes never leave the box.
#[derive(Debug, Clone)]
pub struct Lbfgs {
    /// Step length tried first while no curvature is known yet.
    pub initial_step: f64,
    pub memory: usize,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub max_line_search: usize,
    pairs: VecDeque<(Array2<f64>, Array2<f64>, f64)>,
    previous: Option<(Array2<f64>, Array2<f64>)>,
}

impl Lbfgs {
    pub fn new(initial_step: f64) -> Self {
        Self {
            initial_step,
            memory: 10,
            lower: None,
            upper: None,
            max_line_search: 20,
            pairs: VecDeque::new(),
            previous: None,
        }
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory.max(1);
        self
    }

    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Clamp every entry into the box.
    pub fn project(&self, params: &Array2<f64>) -> Array2<f64> {
        params.mapv(|p| {
            let p = self.lower.map_or(p, |l| p.max(l));
            self.upper.map_or(p, |u| p.min(u))
        })
    }

    /// Number of curvature pairs currently stored.
    pub fn stored_pairs(&self) -> usize {
        self.pairs.len()
    }

    fn remember(&mut self, params: &Array2<f64>, gradient: &Array2<f64>) {
        if let Some((last_params, last_gradient)) = self.previous.take() {
            if last_params.dim() != params.dim() {
                self.pairs.clear();
            } else {
                let s = params - &last_params;
                let y = gradient - &last_gradient;
                let sy = dot(&s, &y);
                if sy > MIN_CURVATURE {
                    self.pairs.push_back((s, y, 1.0 / sy));
                    while self.pairs.len() > self.memory {
                        self.pairs.pop_front();
                    }
                }
            }
        }
        self.previous = Some((params.clone(), gradient.clone()));
    }

    /// Quasi-Newton direction −H·g by the two-loop recursion.
    pub fn direction(&self, gradient: &Array2<f64>) -> Array2<f64> {
        let mut q = gradient.clone();
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for (s, y, rho) in self.pairs.iter().rev() {
            let a = rho * dot(s, &q);
            q.scaled_add(-a, y);
            alphas.push(a);
        }
        let gamma = match self.pairs.back() {
            Some((s, y, _)) => dot(s, y) / dot(y, y),
            None => 1.0,
        };
        q.mapv_inplace(|v| v * gamma);
        for ((s, y, rho), a) in self.pairs.iter().zip(alphas.iter().rev()) {
            let b = rho * dot(y, &q);
            q.scaled_add(a - b, s);
        }
        q.mapv(|v| -v)
    }

    /// Descent direction and its directional derivative, falling back to
    /// steepest descent when the curvature model does not descend.
    fn descent(&mut self, gradient: &Array2<f64>) -> (Array2<f64>, f64) {
        let direction = self.direction(gradient);
        let slope = dot(gradient, &direction);
        if slope < 0.0 {
            return (direction, slope);
        }
        self.pairs.clear();
        (gradient.mapv(|g| -g), -dot(gradient, gradient))
    }

    fn first_step(&self) -> f64 {
        if self.pairs.is_empty() {
            self.initial_step
        } else {
            1.0
        }
    }
}

impl Optimizer for Lbfgs {
    fn name(&self) -> &str {
        "lbfgs"
    }

    /// Fixed-length step along the quasi-Newton direction, without a
    /// line search.
    fn update(
        &mut self,
        params: &Array2<f64>,
        gradient: &Array2<f64>,
        _iteration: usize,
    ) -> Result<Array2<f64>> {
        check_shapes(params, gradient)?;
        self.remember(params, gradient);
        let (direction, _) = self.descent(gradient);
        let alpha = self.first_step();
        Ok(self.project(&(params + &(direction * alpha))))
    }

    fn step(
        &mut self,
        params: &Array2<f64>,
        cost: f64,
        gradient: &Array2<f64>,
        _iteration: usize,
        objective: &mut Objective<'_>,
    ) -> Result<Array2<f64>> {
        check_shapes(params, gradient)?;
        self.remember(params, gradient);
        let (direction, slope) = self.descent(gradient);

        let mut alpha = self.first_step();
        let mut trial = params.clone();
        for _ in 0..self.max_line_search.max(1) {
            trial = self.project(&(params + &(&direction * alpha)));
            // Projected decrease; equals α·slope without bounds
            let predicted = dot(gradient, &(&trial - params));
            match objective(&trial) {
                Ok(value) if value.is_finite() && value <= cost + ARMIJO_C1 * predicted => {
                    return Ok(trial);
                }
                Ok(_) => {}
                Err(e) if e.is_numerical() => {}
                Err(e) => return Err(e),
            }
            alpha *= BACKTRACK;
        }

        debug!(alpha, slope, "line search exhausted; dropping curvature pairs");
        self.pairs.clear();
        Ok(trial)
    }

    fn reset(&mut self) {
        self.pairs.clear();
        self.previous = None;
    }
}

/// Deterministic starting controls: golden-ratio-spaced sinusoids, one
/// phase rate per channel, so no two channels or steps start equal.
pub fn initial_controls(steps: usize, channels: usize, amplitude: f64) -> Array2<f64> {
    let phi = 1.618_033_988_749_895;
    Array2::from_shape_fn((steps, channels), |(t, k)| {
        let phase = t as f64 * phi * 1.3_f64.powi(k as i32);
        if k % 2 == 0 {
            amplitude * phase.sin()
        } else {
            amplitude * phase.cos()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_sgd_step() {
        let mut sgd = Sgd::new(0.5).with_decay(1.0);
        let next = sgd
            .update(&array![[1.0, 2.0]], &array![[2.0, -2.0]], 0)
            .unwrap();
        assert_eq!(next, array![[0.0, 3.0]]);
    }

    #[test]
    fn test_sgd_learning_rate_decays() {
        let sgd = Sgd::new(1.0).with_decay(0.5);
        assert_relative_eq!(sgd.learning_rate_at(0), 1.0);
        assert_relative_eq!(sgd.learning_rate_at(3), 0.125);
    }

    #[test]
    fn test_adam_first_step_is_learning_rate() {
        // With bias correction the first step is lr·sign(g)
        let mut adam = Adam::new(0.1);
        let next = adam
            .update(&array![[0.0, 0.0]], &array![[3.0, -0.01]], 0)
            .unwrap();
        assert_relative_eq!(next[[0, 0]], -0.1, epsilon = 1e-6);
        assert_relative_eq!(next[[0, 1]], 0.1, epsilon = 1e-4);
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        let mut adam = Adam::new(0.05);
        let mut x = array![[2.0, -1.5]];
        for i in 0..2000 {
            let grad = &x * 2.0;
            x = adam.update(&x, &grad, i).unwrap();
        }
        assert!(x.iter().all(|v| v.abs() < 1e-2), "{:?}", x);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut sgd = Sgd::new(0.1);
        let result = sgd.update(&array![[1.0]], &array![[1.0, 2.0]], 0);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    fn quadratic(x: &Array2<f64>) -> f64 {
        x[[0, 0]].powi(2) + 10.0 * x[[0, 1]].powi(2)
    }

    fn quadratic_gradient(x: &Array2<f64>) -> Array2<f64> {
        array![[2.0 * x[[0, 0]], 20.0 * x[[0, 1]]]]
    }

    #[test]
    fn test_lbfgs_minimizes_ill_conditioned_quadratic() {
        let mut lbfgs = Lbfgs::new(0.05).with_memory(5);
        let mut x = array![[2.0, -1.5]];
        let mut objective = |p: &Array2<f64>| -> Result<f64> { Ok(quadratic(p)) };
        for i in 0..50 {
            let grad = quadratic_gradient(&x);
            x = lbfgs.step(&x, quadratic(&x), &grad, i, &mut objective).unwrap();
        }
        assert!(x.iter().all(|v| v.abs() < 1e-6), "{:?}", x);
        assert!(lbfgs.stored_pairs() <= 5);
    }

    #[test]
    fn test_lbfgs_direction_is_steepest_descent_without_pairs() {
        let lbfgs = Lbfgs::new(1.0);
        let d = lbfgs.direction(&array![[1.0, -2.0]]);
        assert_eq!(d, array![[-1.0, 2.0]]);
    }

    #[test]
    fn test_lbfgs_respects_upper_bound() {
        // Unconstrained minimum at 2, box ends at 1
        let mut lbfgs = Lbfgs::new(1.0).with_bounds(None, Some(1.0));
        let f = |p: &Array2<f64>| (p[[0, 0]] - 2.0).powi(2);
        let mut objective = |p: &Array2<f64>| -> Result<f64> { Ok(f(p)) };
        let mut x = array![[-1.0]];
        for i in 0..20 {
            let grad = array![[2.0 * (x[[0, 0]] - 2.0)]];
            x = lbfgs.step(&x, f(&x), &grad, i, &mut objective).unwrap();
            assert!(x[[0, 0]] <= 1.0);
        }
        assert_relative_eq!(x[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lbfgs_backtracks_past_unstable_trials() {
        let mut lbfgs = Lbfgs::new(4.0);
        let mut objective = |p: &Array2<f64>| -> Result<f64> {
            if p[[0, 0]].abs() > 1.0 {
                Err(Error::NumericalInstability("overflow".into()))
            } else {
                Ok(p[[0, 0]].powi(2))
            }
        };
        let x = array![[0.5]];
        let next = lbfgs.step(&x, 0.25, &array![[1.0]], 0, &mut objective).unwrap();
        assert!(next[[0, 0]].abs() < 0.5, "{:?}", next);
    }

    #[test]
    fn test_lbfgs_propagates_other_errors() {
        let mut lbfgs = Lbfgs::new(1.0);
        let mut objective =
            |_: &Array2<f64>| -> Result<f64> { Err(Error::InvalidConfiguration("bad".into())) };
        let result = lbfgs.step(&array![[0.5]], 0.25, &array![[1.0]], 0, &mut objective);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_default_step_delegates_to_update() {
        let mut sgd = Sgd::new(0.5).with_decay(1.0);
        let mut objective = |_: &Array2<f64>| -> Result<f64> { panic!("not evaluated") };
        let next = sgd
            .step(&array![[1.0]], 1.0, &array![[2.0]], 0, &mut objective)
            .unwrap();
        assert_eq!(next, array![[0.0]]);
    }

    #[test]
    fn test_initial_controls_are_distinct() {
        let u = initial_controls(10, 2, 0.25);
        assert_eq!(u.dim(), (10, 2));
        assert_relative_eq!(u[[0, 0]], 0.0);
        assert_relative_eq!(u[[0, 1]], 0.25);
        assert!(u.iter().all(|v| v.abs() <= 0.25));
    }
}
