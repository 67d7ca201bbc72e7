use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scoring::EnsembleStrategy;
use crate::target::ExecutionLimits;

/// Upper bound accepted for `execution.max_call_depth`.
pub const MAX_CALL_DEPTH_LIMIT: usize = 1000;

/// Root configuration structure for faultmap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultmapConfig {
    /// Limits applied while a test executes target code
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// How per-line scores are combined
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Wall-clock budget per test in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Nested target calls allowed before `RecursionError`
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    #[serde(default)]
    pub ensemble: EnsembleStrategy,
}

pub fn default_timeout_ms() -> u64 {
    5000
}

pub fn default_max_call_depth() -> usize {
    100
}

impl FaultmapConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.execution.timeout_ms == 0 {
            return Err("execution.timeout_ms must be greater than 0".to_string());
        }
        if !(1..=MAX_CALL_DEPTH_LIMIT).contains(&self.execution.max_call_depth) {
            return Err(format!(
                "execution.max_call_depth must be between 1 and {MAX_CALL_DEPTH_LIMIT}, got {}",
                self.execution.max_call_depth
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: Some(Duration::from_millis(self.execution.timeout_ms)),
            max_call_depth: self.execution.max_call_depth,
        }
    }
}
