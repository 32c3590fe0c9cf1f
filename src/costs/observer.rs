// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic sinks for intermediate cost values.
//!
//! Observers see every evaluation but cannot influence it: they return
//! nothing and a failing evaluation never reaches them.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// Receives the value of a cost each time it is evaluated.
pub trait CostObserver: fmt::Debug + Send + Sync {
    fn observe(&self, cost: &str, step: usize, value: f64);
}

/// Forwards observations as `trace!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CostObserver for TracingObserver {
    fn observe(&self, cost: &str, step: usize, value: f64) {
        trace!(cost, step, value, "cost evaluated");
    }
}

/// One recorded evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub cost: String,
    pub step: usize,
    pub value: f64,
}

/// Keeps every observation in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.observations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.lock().is_empty()
    }

    pub fn clear(&self) {
        self.observations.lock().clear();
    }
}

impl CostObserver for RecordingObserver {
    fn observe(&self, cost: &str, step: usize, value: f64) {
        self.observations.lock().push(Observation {
            cost: cost.to_string(),
            step,
            value,
        });
    }
}

/// Observer used when none is injected.
pub fn default_observer() -> Arc<dyn CostObserver> {
    Arc::new(TracingObserver)
}
