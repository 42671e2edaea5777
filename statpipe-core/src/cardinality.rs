use hyperloglog::HyperLogLog;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardinalityEstimate {
    pub approximate_distinct: u64,
    pub error_rate: f64,
}

const ERROR_RATE: f64 = 0.00813; // ~0.8%

// Fixed sip keys: merge requires identical hash keys in both sketches, and
// partition sketches are constructed independently.
const HASH_SEED: u128 = 0x9e3779b97f4a7c15f39cc0605cedc834;

/// HLL sketch over record labels; constant memory, mergeable across
/// partitions.
pub struct LabelCardinality {
    hll: HyperLogLog,
}

impl LabelCardinality {
    pub fn new() -> Self {
        Self {
            hll: HyperLogLog::new_deterministic(ERROR_RATE, HASH_SEED),
        }
    }

    pub fn add(&mut self, label: &str) {
        self.hll.insert(&label);
    }

    pub fn merge(&mut self, other: &LabelCardinality) {
        self.hll.merge(&other.hll);
    }

    pub fn estimate(&self) -> CardinalityEstimate {
        CardinalityEstimate {
            approximate_distinct: self.hll.len().round() as u64,
            error_rate: ERROR_RATE,
        }
    }
}

impl Default for LabelCardinality {
    fn default() -> Self {
        Self::new()
    }
}
