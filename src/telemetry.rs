use crate::engine::scheduler::OutputEvent;
use serde::Serialize;

/// FNV-1a offset basis; the running output hash starts here.
pub const SEQUENCE_HASH_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Folds one output event into the running sequence hash. Two replays of the
/// same input stream agree on this value if and only if their emitted and
/// suppressed sequences are identical.
pub fn sequence_hash_update(hash: u64, event: &OutputEvent) -> u64 {
    let encoded = serde_json::to_string(event).unwrap_or_default();
    fnv1a(hash, encoded.as_bytes())
}

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Min/mean/max summary of per-cluster information loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct LossSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl LossSummary {
    /// Summarizes a loss distribution; all zeros when no clusters are live.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for value in values {
            min = min.min(*value);
            max = max.max(*value);
            sum += value;
        }
        Self {
            min,
            mean: sum / values.len() as f64,
            max,
        }
    }
}

/// Point-in-time observability snapshot for external tooling. Not part of the
/// anonymization contract; purely diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineTelemetry {
    pub tuples_ingested: u64,
    pub tuples_malformed: u64,
    pub records_emitted: u64,
    pub records_suppressed: u64,
    pub relaxed_diversity_records: u64,
    pub configured_beta: f64,
    pub emission_rate: f64,
    pub epsilon_upper_bound: f64,
    pub live_clusters: usize,
    pub queue_depth: usize,
    pub information_loss: LossSummary,
    pub sequence_hash: u64,
}

impl EngineTelemetry {
    /// Renders the snapshot as one JSON line.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
