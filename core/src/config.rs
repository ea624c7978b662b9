use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Documents strictly closer than this are neighbors.
pub const DEFAULT_THRESHOLD: f64 = 0.65;
/// Floor added to every distance total so ranks never divide by zero.
pub const DEFAULT_EPSILON: f64 = 1e-10;
/// Largest distance matrix the symmetric strategy may allocate (1 GiB).
pub const DEFAULT_MATRIX_BUDGET_BYTES: usize = 1 << 30;

/// How document pairs are visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStrategy {
    /// Each unordered pair once, cached in a triangular matrix. Falls back to
    /// `Exhaustive` when the matrix would not fit the memory budget.
    #[default]
    Symmetric,
    /// Every ordered pair evaluated independently.
    Exhaustive,
}

impl std::str::FromStr for PairStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "symmetric" => Ok(Self::Symmetric),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(format!(
                "unknown pair strategy {other:?} (expected symmetric or exhaustive)"
            )),
        }
    }
}

fn default_matrix_budget() -> usize { DEFAULT_MATRIX_BUDGET_BYTES }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub threshold: f64,
    pub epsilon: f64,
    #[serde(default)]
    pub strategy: PairStrategy,
    /// Worker threads; 0 uses rayon's default.
    #[serde(default)]
    pub threads: usize,
    /// Byte limit for the cached distance matrix.
    #[serde(default = "default_matrix_budget")]
    pub matrix_budget_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            epsilon: DEFAULT_EPSILON,
            strategy: PairStrategy::default(),
            threads: 0,
            matrix_budget_bytes: DEFAULT_MATRIX_BUDGET_BYTES,
        }
    }
}

impl EngineConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_strategy(mut self, strategy: PairStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_matrix_budget(mut self, bytes: usize) -> Self {
        self.matrix_budget_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(EngineError::invalid_config(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(EngineError::invalid_config(format!(
                "epsilon must be a positive finite number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}
