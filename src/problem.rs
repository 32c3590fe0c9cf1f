// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! YAML problem files.
//!
//! A problem file describes one control problem: the Hamiltonian, the
//! initial states, the costs and optionally a starting pulse.
//!
//! ```yaml
//! dim: 2
//! num_time_steps: 20
//! duration: 3.0
//! drift: { scale: 0.5, operator: sigma_z }
//! controls: [sigma_x, sigma_y]
//! initial_states: [0]
//! costs:
//!   - type: target_state_infidelity
//!     targets: [1]
//!   - type: control_norm
//!     max_norms: [2.0, 2.0]
//!     alpha: 0.01
//! ```
//!
//! Operators are given by name (`sigma_x`, `number`, ...), as a scaled or
//! summed combination, or as an explicit matrix of `[re, im]` pairs.
//! States are a basis index or a vector of `[re, im]` amplitudes.

use std::path::Path;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::costs::{
    ControlArea, ControlBandwidthMax, ControlNorm, ControlVariation, Cost, ForbidDensities,
    ForbidStates, Schedule, TargetDensityInfidelity, TargetStateInfidelity,
};
use crate::error::{Error, Result};
use crate::evolution::{ControlSystem, EvolutionConfig, EvolutionEngine, StateBatch};
use crate::lindblad::CollapseOperator;
use crate::operators;
use crate::optimize::initial_controls;
use crate::validation::{validate_control_envelope, validate_engine, validate_problem_size};

/// Top-level problem description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemFile {
    /// Hilbert-space dimension
    pub dim: usize,

    pub num_time_steps: usize,

    /// Total evolution time; dt = duration / num_time_steps
    pub duration: f64,

    /// Drift Hamiltonian, zero when omitted
    #[serde(default)]
    pub drift: Option<OperatorDef>,

    /// One control operator per channel
    pub controls: Vec<OperatorDef>,

    #[serde(default)]
    pub collapse_operators: Vec<CollapseDef>,

    /// Evolve density matrices instead of kets
    #[serde(default)]
    pub density: bool,

    pub initial_states: Vec<StateDef>,

    pub costs: Vec<CostDef>,

    /// Starting pulse as time-step rows, generated when omitted
    #[serde(default)]
    pub initial_controls: Option<Vec<Vec<f64>>>,

    /// Amplitude of the generated starting pulse
    #[serde(default)]
    pub initial_amplitude: Option<f64>,

    /// Reject starting pulses above this amplitude
    #[serde(default)]
    pub max_amplitude: Option<f64>,
}

/// An operator, by name, combination or explicit matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperatorDef {
    /// `sigma_x`, `sigma_y`, `sigma_z`, `sigma_plus`, `sigma_minus`,
    /// `identity`, `annihilation`, `creation`, `number` or `zero`
    Named(String),
    Scaled {
        scale: f64,
        operator: Box<OperatorDef>,
    },
    Sum {
        sum: Vec<OperatorDef>,
    },
    /// Rows of `[re, im]` entries
    Matrix(Vec<Vec<[f64; 2]>>),
}

impl OperatorDef {
    /// Materialize the operator in a `dim`-level space.
    pub fn build(&self, dim: usize) -> Result<Array2<Complex64>> {
        match self {
            OperatorDef::Named(name) => named_operator(name, dim),
            OperatorDef::Scaled { scale, operator } => {
                Ok(operator.build(dim)? * Complex64::new(*scale, 0.0))
            }
            OperatorDef::Sum { sum } => {
                let mut total = Array2::zeros((dim, dim));
                for (i, term) in sum.iter().enumerate() {
                    let m = term.build(dim)?;
                    if m.dim() != (dim, dim) {
                        return Err(Error::shape(
                            format!("sum term {}", i),
                            format!("{} × {}", dim, dim),
                            format!("{} × {}", m.nrows(), m.ncols()),
                        ));
                    }
                    total += &m;
                }
                Ok(total)
            }
            OperatorDef::Matrix(rows) => complex_matrix(rows),
        }
    }
}

fn named_operator(name: &str, dim: usize) -> Result<Array2<Complex64>> {
    let op = match name {
        "sigma_x" => operators::sigma_x(),
        "sigma_y" => operators::sigma_y(),
        "sigma_z" => operators::sigma_z(),
        "sigma_plus" => operators::sigma_plus(),
        "sigma_minus" => operators::sigma_minus(),
        "identity" => operators::identity(dim),
        "annihilation" => operators::annihilation(dim),
        "creation" => operators::creation(dim),
        "number" => operators::number(dim),
        "zero" => Array2::zeros((dim, dim)),
        other => {
            return Err(Error::InvalidConfiguration(format!(
                "unknown operator '{}'",
                other
            )))
        }
    };
    Ok(op)
}

fn complex_matrix(rows: &[Vec<[f64; 2]>]) -> Result<Array2<Complex64>> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    let mut m = Array2::zeros((nrows, ncols));
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(Error::shape(
                format!("matrix row {}", i),
                format!("{} entries", ncols),
                format!("{} entries", row.len()),
            ));
        }
        for (j, &[re, im]) in row.iter().enumerate() {
            m[[i, j]] = Complex64::new(re, im);
        }
    }
    Ok(m)
}

/// A pure state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateDef {
    /// Basis state |i⟩
    Basis(usize),
    /// `[re, im]` amplitudes
    Amplitudes(Vec<[f64; 2]>),
}

impl StateDef {
    /// Column ket in a `dim`-level space.
    pub fn ket(&self, dim: usize) -> Result<Array2<Complex64>> {
        match self {
            StateDef::Basis(index) => operators::ket(*index, dim),
            StateDef::Amplitudes(amplitudes) => {
                if amplitudes.len() != dim {
                    return Err(Error::shape(
                        "state amplitudes",
                        format!("{} entries", dim),
                        format!("{} entries", amplitudes.len()),
                    ));
                }
                Ok(Array2::from_shape_fn((dim, 1), |(i, _)| {
                    Complex64::new(amplitudes[i][0], amplitudes[i][1])
                }))
            }
        }
    }

    /// Pure-state density matrix in a `dim`-level space.
    pub fn density(&self, dim: usize) -> Result<Array2<Complex64>> {
        Ok(operators::density(&self.ket(dim)?))
    }
}

fn kets(states: &[StateDef], dim: usize) -> Result<Vec<Array2<Complex64>>> {
    states.iter().map(|s| s.ket(dim)).collect()
}

fn densities(states: &[StateDef], dim: usize) -> Result<Vec<Array2<Complex64>>> {
    states.iter().map(|s| s.density(dim)).collect()
}

/// A dissipation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollapseDef {
    /// Qubit relaxation and dephasing from T1/T2
    Relaxation {
        t1: f64,
        t2: f64,
        #[serde(default)]
        label: Option<String>,
    },
    Channel {
        operator: OperatorDef,
        rate: f64,
        #[serde(default)]
        label: Option<String>,
    },
}

impl CollapseDef {
    fn build(&self, index: usize, dim: usize) -> Result<Vec<CollapseOperator>> {
        match self {
            CollapseDef::Relaxation { t1, t2, label } => {
                let label = label.clone().unwrap_or_else(|| format!("q{}", index));
                CollapseOperator::from_t1_t2(*t1, *t2, &label)
            }
            CollapseDef::Channel {
                operator,
                rate,
                label,
            } => {
                let label = label
                    .clone()
                    .unwrap_or_else(|| format!("channel_{}", index));
                Ok(vec![CollapseOperator::new(operator.build(dim)?, *rate, label)?])
            }
        }
    }
}

/// A cost term, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum CostDef {
    TargetStateInfidelity {
        targets: Vec<StateDef>,
        #[serde(default)]
        alpha: Option<f64>,
        #[serde(default)]
        schedule: Schedule,
    },
    TargetDensityInfidelity {
        targets: Vec<StateDef>,
        #[serde(default)]
        alpha: Option<f64>,
        #[serde(default)]
        schedule: Schedule,
    },
    ForbidStates {
        forbidden: Vec<Vec<StateDef>>,
        #[serde(default)]
        alpha: Option<f64>,
    },
    ForbidDensities {
        forbidden: Vec<Vec<StateDef>>,
        #[serde(default)]
        alpha: Option<f64>,
    },
    ControlNorm {
        max_norms: Vec<f64>,
        #[serde(default)]
        alpha: Option<f64>,
    },
    ControlArea {
        max_areas: Vec<f64>,
        #[serde(default)]
        alpha: Option<f64>,
    },
    ControlVariation {
        max_norms: Vec<f64>,
        #[serde(default = "default_variation_order")]
        order: usize,
        #[serde(default)]
        alpha: Option<f64>,
    },
    ControlBandwidthMax {
        max_bandwidths: Vec<f64>,
        #[serde(default)]
        alpha: Option<f64>,
    },
}

fn default_variation_order() -> usize {
    1
}

impl CostDef {
    fn build(&self, dim: usize, dt: f64) -> Result<Box<dyn Cost>> {
        let cost: Box<dyn Cost> = match self {
            CostDef::TargetStateInfidelity {
                targets,
                alpha,
                schedule,
            } => {
                let mut cost =
                    TargetStateInfidelity::new(kets(targets, dim)?)?.with_schedule(*schedule);
                if let Some(alpha) = alpha {
                    cost = cost.with_alpha(*alpha);
                }
                Box::new(cost)
            }
            CostDef::TargetDensityInfidelity {
                targets,
                alpha,
                schedule,
            } => {
                let mut cost = TargetDensityInfidelity::new(densities(targets, dim)?)?
                    .with_schedule(*schedule);
                if let Some(alpha) = alpha {
                    cost = cost.with_alpha(*alpha);
                }
                Box::new(cost)
            }
            CostDef::ForbidStates { forbidden, alpha } => {
                let lists = forbidden
                    .iter()
                    .map(|list| kets(list, dim))
                    .collect::<Result<Vec<_>>>()?;
                let mut cost = ForbidStates::new(lists)?;
                if let Some(alpha) = alpha {
                    cost = cost.with_alpha(*alpha);
                }
                Box::new(cost)
            }
            CostDef::ForbidDensities { forbidden, alpha } => {
                let lists = forbidden
                    .iter()
                    .map(|list| densities(list, dim))
                    .collect::<Result<Vec<_>>>()?;
                let mut cost = ForbidDensities::new(lists)?;
                if let Some(alpha) = alpha {
                    cost = cost.with_alpha(*alpha);
                }
                Box::new(cost)
            }
            CostDef::ControlNorm { max_norms, alpha } => {
                let cost = ControlNorm::new(max_norms.clone());
                Box::new(match alpha {
                    Some(alpha) => cost.with_alpha(*alpha),
                    None => cost,
                })
            }
            CostDef::ControlArea { max_areas, alpha } => {
                let cost = ControlArea::new(max_areas.clone());
                Box::new(match alpha {
                    Some(alpha) => cost.with_alpha(*alpha),
                    None => cost,
                })
            }
            CostDef::ControlVariation {
                max_norms,
                order,
                alpha,
            } => {
                let cost = ControlVariation::new(max_norms.clone(), *order);
                Box::new(match alpha {
                    Some(alpha) => cost.with_alpha(*alpha),
                    None => cost,
                })
            }
            CostDef::ControlBandwidthMax {
                max_bandwidths,
                alpha,
            } => {
                let cost = ControlBandwidthMax::new(max_bandwidths.clone(), dt);
                Box::new(match alpha {
                    Some(alpha) => cost.with_alpha(*alpha),
                    None => cost,
                })
            }
        };
        Ok(cost)
    }
}

/// A built problem: the engine plus its starting pulse.
#[derive(Debug)]
pub struct Problem {
    pub engine: EvolutionEngine,
    pub initial_controls: Array2<f64>,
}

impl ProblemFile {
    /// Read a problem from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build the engine and starting pulse, enforcing `config.limits`.
    pub fn build(&self, config: &Config) -> Result<Problem> {
        validate_problem_size(
            self.dim,
            self.num_time_steps,
            self.initial_states.len(),
            &config.limits,
        )?;

        let evolution = EvolutionConfig::new(self.num_time_steps, self.duration)?;
        let d = self.dim;

        let drift = match &self.drift {
            Some(op) => op.build(d)?,
            None => Array2::zeros((d, d)),
        };
        let controls = self
            .controls
            .iter()
            .map(|op| op.build(d))
            .collect::<Result<Vec<_>>>()?;
        let mut system = ControlSystem::new(drift, controls)?;

        if !self.collapse_operators.is_empty() {
            let mut ops = Vec::new();
            for (i, channel) in self.collapse_operators.iter().enumerate() {
                ops.extend(channel.build(i, d)?);
            }
            system = system.with_collapse_operators(ops)?;
        }

        let initial = if self.density {
            StateBatch::densities(densities(&self.initial_states, d)?)?
        } else {
            StateBatch::kets(kets(&self.initial_states, d)?)?
        };

        let costs = self
            .costs
            .iter()
            .map(|c| c.build(d, evolution.dt()))
            .collect::<Result<Vec<_>>>()?;

        let engine = EvolutionEngine::new(evolution, system, initial, costs)?;
        validate_engine(&engine, &config.limits)?;

        let shape = engine.parameter_shape();
        let controls = match &self.initial_controls {
            Some(rows) => rows_to_controls(rows, shape.1)?,
            None => initial_controls(
                shape.0,
                shape.1,
                self.initial_amplitude
                    .unwrap_or(config.engine.initial_amplitude),
            ),
        };
        validate_control_envelope(&controls, shape, self.max_amplitude)?;

        debug!(
            dim = d,
            steps = shape.0,
            channels = shape.1,
            costs = self.costs.len(),
            "problem built"
        );

        Ok(Problem {
            engine,
            initial_controls: controls,
        })
    }
}

fn rows_to_controls(rows: &[Vec<f64>], channels: usize) -> Result<Array2<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * channels);
    for (t, row) in rows.iter().enumerate() {
        if row.len() != channels {
            return Err(Error::shape(
                format!("initial_controls row {}", t),
                format!("{} channels", channels),
                format!("{} channels", row.len()),
            ));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), channels), flat)
        .map_err(|e| Error::InvalidConfiguration(format!("initial_controls: {}", e)))
}
