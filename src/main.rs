// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS Pulse CLI
//!
//! Optimizes and evaluates control pulses described by YAML problem files.
//!
//! # Usage
//!
//! ```bash
//! # Optimize a pulse and write the result as JSON
//! qubit-os-pulse optimize --problem x_gate.yaml --output x_gate.json
//!
//! # Cost, per-term breakdown, gradient norm and finite-difference check
//! qubit-os-pulse evaluate --problem x_gate.yaml
//!
//! # Check a problem file against the configured limits
//! qubit-os-pulse validate --problem x_gate.yaml
//!
//! # Show effective configuration
//! qubit-os-pulse config
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qubit_os_pulse::{
    config::{Config, OptimizerMethod},
    optimize::optimize,
    problem::ProblemFile,
    Result, VERSION,
};

/// QubitOS quantum optimal control engine
#[derive(Parser)]
#[command(name = "qubit-os-pulse")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Gradient-based optimal control of quantum systems")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize the controls of a problem
    Optimize {
        /// Problem file (YAML)
        #[arg(short, long)]
        problem: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Update rule (adam, sgd, lbfgs)
        #[arg(long, value_parser = parse_method)]
        method: Option<OptimizerMethod>,

        /// Learning rate
        #[arg(long, env = "QUBITOS_PULSE_LEARNING_RATE")]
        learning_rate: Option<f64>,

        /// Maximum optimizer iterations
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Evaluate cost and gradient at the starting controls, with a
    /// finite-difference check of the gradient
    Evaluate {
        /// Problem file (YAML)
        #[arg(short, long)]
        problem: PathBuf,
    },

    /// Validate configuration and, optionally, a problem file
    Validate {
        /// Problem file (YAML)
        #[arg(short, long)]
        problem: Option<PathBuf>,
    },

    /// Show effective configuration
    Config,
}

fn parse_method(s: &str) -> std::result::Result<OptimizerMethod, String> {
    s.parse().map_err(|e: qubit_os_pulse::Error| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Optimize {
            problem,
            output,
            method,
            learning_rate,
            max_iterations,
        } => {
            // Override config with CLI args
            if let Some(method) = method {
                config.optimizer.method = method;
            }
            if let Some(lr) = learning_rate {
                config.optimizer.learning_rate = lr;
            }
            if let Some(n) = max_iterations {
                config.optimizer.max_iterations = n;
            }
            config.validate()?;

            let built = ProblemFile::from_file(&problem)?.build(&config)?;
            let mut optimizer = config.optimizer.build();

            info!(
                version = VERSION,
                problem = %problem.display(),
                optimizer = optimizer.name(),
                max_iterations = config.optimizer.max_iterations,
                "Starting optimization"
            );

            let result = optimize(
                &built.engine,
                built.initial_controls,
                optimizer.as_mut(),
                &config.optimizer.settings(),
            )?;

            let json = serde_json::to_string_pretty(&result)?;
            write_output(output.as_deref(), &json)?;
        }

        Commands::Evaluate { problem } => {
            config.validate()?;
            let built = ProblemFile::from_file(&problem)?.build(&config)?;
            let evaluation = built.engine.evaluate(&built.initial_controls)?;
            let gradient_norm = evaluation
                .gradient
                .iter()
                .map(|g| g * g)
                .sum::<f64>()
                .sqrt();

            let fd_step = config.engine.finite_difference_step;
            let deviation = built
                .engine
                .check_gradient(&built.initial_controls, fd_step)?;

            let report = serde_json::json!({
                "cost": evaluation.cost,
                "terms": evaluation.terms,
                "gradient_norm": gradient_norm,
                "finite_difference": {
                    "step": fd_step,
                    "max_relative_deviation": deviation,
                },
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Validate { problem } => {
            let checked = config.validate().and_then(|()| match &problem {
                Some(path) => ProblemFile::from_file(path)?.build(&config).map(|_| ()),
                None => Ok(()),
            });
            match checked {
                Ok(()) => match problem {
                    Some(path) => println!("Problem {} is valid", path.display()),
                    None => println!("Configuration is valid"),
                },
                Err(e) => {
                    error!(error = %e, "validation failed");
                    eprintln!("Validation error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Config => {
            // Show effective configuration
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)?;
            info!(path = %path.display(), "result written");
        }
        None => println!("{}", content),
    }
    Ok(())
}
