// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Optimization loop around [`EvolutionEngine::evaluate`].

use ndarray::Array2;
use tracing::{debug, error, info};

use super::optimizer::Optimizer;
use super::types::{OptimizationResult, OptimizerSettings, Termination};
use crate::error::Result;
use crate::evolution::{CostTerm, EvolutionEngine};

/// Minimize the engine's total cost starting from `initial`.
///
/// Each iteration evaluates cost and gradient once, records the cost, then
/// either stops (cost target or gradient tolerance reached) or asks the
/// optimizer for new parameters. Line-searching optimizers may evaluate the
/// cost at extra trial points; those do not count as iterations. The best
/// parameters seen are returned.
///
/// # Errors
/// Any engine error aborts the run, including
/// [`crate::Error::NumericalInstability`]; no default gradient is
/// substituted.
pub fn optimize(
    engine: &EvolutionEngine,
    initial: Array2<f64>,
    optimizer: &mut dyn Optimizer,
    settings: &OptimizerSettings,
) -> Result<OptimizationResult> {
    settings.validate()?;
    engine.check_params(&initial)?;
    optimizer.reset();

    let mut params = initial;
    let mut history = Vec::with_capacity(settings.max_iterations);
    let mut best_params = params.clone();
    let mut best_cost = f64::INFINITY;
    let mut best_terms: Vec<CostTerm> = Vec::new();
    let mut termination = Termination::MaxIterations;

    for iteration in 0..settings.max_iterations {
        let evaluation = engine.evaluate(&params).map_err(|e| {
            error!(iteration, error = %e, "evaluation failed; aborting optimization");
            e
        })?;
        let cost = evaluation.cost;
        history.push(cost);

        if cost < best_cost {
            best_cost = cost;
            best_params = params.clone();
            best_terms = evaluation.terms;
        }

        let gradient_norm = evaluation.gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
        debug!(iteration, cost, gradient_norm, "optimizer iteration");

        if cost <= settings.cost_target {
            termination = Termination::CostTarget;
            break;
        }
        if gradient_norm < settings.gradient_tolerance {
            termination = Termination::GradientTolerance;
            break;
        }

        let mut objective = |trial: &Array2<f64>| engine.evaluate_cost(trial);
        params = optimizer.step(&params, cost, &evaluation.gradient, iteration, &mut objective)?;
    }

    info!(
        optimizer = optimizer.name(),
        iterations = history.len(),
        cost = best_cost,
        termination = ?termination,
        "optimization finished"
    );

    Ok(OptimizationResult {
        optimizer: optimizer.name().to_string(),
        controls: best_params,
        cost: best_cost,
        terms: best_terms,
        iterations: history.len(),
        termination,
        cost_history: history,
    })
}
