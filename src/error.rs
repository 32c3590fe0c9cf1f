// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the pulse engine.

use std::fmt;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types.
#[derive(Debug)]
pub enum Error {
    /// Malformed problem setup (no initial states, bad cost parameters, ...)
    InvalidConfiguration(String),
    /// Parameter, operator or state dimensions disagree
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },
    /// Non-finite values during propagation or cost evaluation
    NumericalInstability(String),
    /// Problem exceeds a configured resource limit
    ResourceLimit {
        resource: String,
        limit: u64,
        requested: u64,
    },
    /// Configuration file / environment error
    Config(String),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl Error {
    /// Build a [`Error::ShapeMismatch`] from anything displayable.
    pub fn shape(
        context: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Whether the error invalidates only the current evaluation pass.
    ///
    /// Callers may retry a pass that failed this way with adjusted
    /// parameters; every other error is a setup problem.
    pub fn is_numerical(&self) -> bool {
        matches!(self, Error::NumericalInstability(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ShapeMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "Shape mismatch in {}: expected {}, got {}",
                context, expected, actual
            ),
            Error::NumericalInstability(msg) => write!(f, "Numerical instability: {}", msg),
            Error::ResourceLimit {
                resource,
                limit,
                requested,
            } => write!(
                f,
                "Resource limit exceeded for {}: requested {}, limit {}",
                resource, requested, limit
            ),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
