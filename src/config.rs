// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. qubit-os-pulse.yaml file
//! 3. Environment variables (QUBITOS_PULSE_*)
//! 4. CLI arguments

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{Error, Result};
use crate::optimize::{Adam, Lbfgs, Optimizer, OptimizerSettings, Sgd};

/// Default configuration file names, searched in the working directory.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["qubit-os-pulse.yaml", "qubit-os-pulse.yml"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Evolution engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Resource limits
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        } else {
            for name in DEFAULT_CONFIG_FILES {
                let path = Path::new(name);
                if path.exists() {
                    config = Self::from_file(path)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("QUBITOS_PULSE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("QUBITOS_PULSE_LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("QUBITOS_PULSE_OPTIMIZER") {
            match val.parse() {
                Ok(method) => self.optimizer.method = method,
                Err(_) => tracing::warn!(value = %val, "ignoring unknown QUBITOS_PULSE_OPTIMIZER"),
            }
        }
        override_parsed("QUBITOS_PULSE_LEARNING_RATE", &mut self.optimizer.learning_rate);
        override_parsed("QUBITOS_PULSE_MAX_ITERATIONS", &mut self.optimizer.max_iterations);
        override_parsed("QUBITOS_PULSE_COST_TARGET", &mut self.optimizer.cost_target);
        override_parsed(
            "QUBITOS_PULSE_FD_STEP",
            &mut self.engine.finite_difference_step,
        );
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(Error::Config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(Error::Config(format!(
                "log format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            )));
        }
        if !(self.optimizer.learning_rate > 0.0) || !self.optimizer.learning_rate.is_finite() {
            return Err(Error::Config("learning_rate must be finite and > 0".into()));
        }
        if self.optimizer.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be > 0".into()));
        }
        if self.optimizer.max_iterations > self.limits.max_iterations {
            return Err(Error::Config(format!(
                "max_iterations {} exceeds the limit {}",
                self.optimizer.max_iterations, self.limits.max_iterations
            )));
        }
        if !(0.0..1.0).contains(&self.optimizer.beta1) || !(0.0..1.0).contains(&self.optimizer.beta2)
        {
            return Err(Error::Config("Adam betas must lie in [0, 1)".into()));
        }
        if !(self.optimizer.epsilon > 0.0) {
            return Err(Error::Config("Adam epsilon must be > 0".into()));
        }
        if !(self.optimizer.sgd_decay > 0.0 && self.optimizer.sgd_decay <= 1.0) {
            return Err(Error::Config("sgd_decay must lie in (0, 1]".into()));
        }
        if self.optimizer.lbfgs_memory == 0 {
            return Err(Error::Config("lbfgs_memory must be > 0".into()));
        }
        if let (Some(lower), Some(upper)) = (self.optimizer.lower_bound, self.optimizer.upper_bound) {
            if lower > upper {
                return Err(Error::Config(format!(
                    "lower_bound {} exceeds upper_bound {}",
                    lower, upper
                )));
            }
        }
        if [self.optimizer.lower_bound, self.optimizer.upper_bound]
            .iter()
            .flatten()
            .any(|b| b.is_nan())
        {
            return Err(Error::Config("amplitude bounds must not be NaN".into()));
        }
        if !(self.engine.finite_difference_step > 0.0) {
            return Err(Error::Config("finite_difference_step must be > 0".into()));
        }
        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, slot: &mut T) {
    if let Ok(val) = env::var(var) {
        match val.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!(var, value = %val, "ignoring unparsable override"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Update rule used by the `optimize` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerMethod {
    #[default]
    Adam,
    Sgd,
    /// L-BFGS, box-constrained when amplitude bounds are set
    Lbfgs,
}

impl std::str::FromStr for OptimizerMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "adam" => Ok(OptimizerMethod::Adam),
            "sgd" => Ok(OptimizerMethod::Sgd),
            "lbfgs" | "l-bfgs" | "lbfgsb" | "l-bfgs-b" => Ok(OptimizerMethod::Lbfgs),
            other => Err(Error::Config(format!(
                "unknown optimizer '{}', expected adam, sgd or lbfgs",
                other
            ))),
        }
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub method: OptimizerMethod,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Stop once the total cost reaches this value
    #[serde(default = "default_cost_target")]
    pub cost_target: f64,

    /// Stop once the gradient norm falls below this value
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,

    #[serde(default = "default_beta1")]
    pub beta1: f64,

    #[serde(default = "default_beta2")]
    pub beta2: f64,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Per-iteration learning-rate decay for SGD
    #[serde(default = "default_sgd_decay")]
    pub sgd_decay: f64,

    /// Curvature pairs kept by L-BFGS
    #[serde(default = "default_lbfgs_memory")]
    pub lbfgs_memory: usize,

    /// Lower amplitude bound for L-BFGS
    #[serde(default)]
    pub lower_bound: Option<f64>,

    /// Upper amplitude bound for L-BFGS
    #[serde(default)]
    pub upper_bound: Option<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: OptimizerMethod::default(),
            learning_rate: default_learning_rate(),
            max_iterations: default_max_iterations(),
            cost_target: default_cost_target(),
            gradient_tolerance: default_gradient_tolerance(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
            sgd_decay: default_sgd_decay(),
            lbfgs_memory: default_lbfgs_memory(),
            lower_bound: None,
            upper_bound: None,
        }
    }
}

impl OptimizerConfig {
    /// Convergence criteria for [`crate::optimize::optimize`].
    pub fn settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            max_iterations: self.max_iterations,
            cost_target: self.cost_target,
            gradient_tolerance: self.gradient_tolerance,
        }
    }

    /// Build the configured update rule.
    pub fn build(&self) -> Box<dyn Optimizer> {
        match self.method {
            OptimizerMethod::Adam => Box::new(
                Adam::new(self.learning_rate)
                    .with_betas(self.beta1, self.beta2)
                    .with_epsilon(self.epsilon),
            ),
            OptimizerMethod::Sgd => {
                Box::new(Sgd::new(self.learning_rate).with_decay(self.sgd_decay))
            }
            OptimizerMethod::Lbfgs => Box::new(
                Lbfgs::new(self.learning_rate)
                    .with_memory(self.lbfgs_memory)
                    .with_bounds(self.lower_bound, self.upper_bound),
            ),
        }
    }
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_max_iterations() -> usize {
    1000
}

fn default_cost_target() -> f64 {
    1e-4
}

fn default_gradient_tolerance() -> f64 {
    1e-10
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

fn default_sgd_decay() -> f64 {
    0.999
}

fn default_lbfgs_memory() -> usize {
    10
}

/// Evolution engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Step of the finite-difference gradient check run by `evaluate`
    #[serde(default = "default_fd_step")]
    pub finite_difference_step: f64,

    /// Amplitude of generated initial controls
    #[serde(default = "default_initial_amplitude")]
    pub initial_amplitude: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            finite_difference_step: default_fd_step(),
            initial_amplitude: default_initial_amplitude(),
        }
    }
}

fn default_fd_step() -> f64 {
    crate::evolution::DEFAULT_FD_STEP
}

fn default_initial_amplitude() -> f64 {
    0.1
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum Hilbert space dimension
    #[serde(default = "default_max_hilbert_dim")]
    pub max_hilbert_dim: usize,

    /// Maximum time steps
    #[serde(default = "default_max_time_steps")]
    pub max_time_steps: usize,

    /// Maximum number of initial states
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum optimizer iterations
    #[serde(default = "default_max_iterations_limit")]
    pub max_iterations: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_hilbert_dim: default_max_hilbert_dim(),
            max_time_steps: default_max_time_steps(),
            max_batch_size: default_max_batch_size(),
            max_iterations: default_max_iterations_limit(),
        }
    }
}

fn default_max_hilbert_dim() -> usize {
    64
}

fn default_max_time_steps() -> usize {
    10_000
}

fn default_max_batch_size() -> usize {
    100
}

fn default_max_iterations_limit() -> usize {
    10_000
}
