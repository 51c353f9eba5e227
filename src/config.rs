//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use serde_json::Value;

use crate::error::{BeliefResult, InterchangeError};
use crate::evaluator::DEFAULT_PARENT_GUIDELINE;
use crate::probability::Probability;

/// Probability given to facts that do not state one: `1 - epsilon`.
pub const DEFAULT_FACT_PROBABILITY: f64 = 0.99;

/// Engine configuration.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Probability for fact nodes that omit `prob` in an interchange document.
    pub fact_probability: Probability,
    /// Parent count above which evaluations carry a guideline diagnostic.
    pub parent_guideline: usize,
    /// Worker threads for parallel folding; 1 folds sequentially.
    pub workers: usize,
    /// Maximum queued jobs in the parallel folder.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fact_probability: Probability::from_unchecked(DEFAULT_FACT_PROBABILITY),
            parent_guideline: DEFAULT_PARENT_GUIDELINE,
            workers: 1,
            queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an interchange error for malformed JSON and
    /// `ProbabilityOutOfRange` for an out-of-range `fact_probability`.
    pub fn from_json_str(json: &str) -> BeliefResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(InterchangeError::from)?;
        if let Some(fact_probability) = value.get("fact_probability").and_then(Value::as_f64) {
            Probability::new(fact_probability)?;
        }
        Ok(serde_json::from_value(value).map_err(InterchangeError::from)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an interchange error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> BeliefResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InterchangeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
