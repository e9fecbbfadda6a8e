use crate::cluster::Cluster;
use crate::config::PrivacyConfig;

/// Constraint verdict for a cluster at one logical instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// size >= k and distinct sensitive values >= l; eligible for output.
    Ready,
    /// Constraints unmet but the oldest member is still within the delay bound.
    Aging,
    /// The oldest member has waited >= delta; progress must be forced.
    Expired,
}

/// Decides, per cluster, whether members may be released or must be forced
/// out. Purely a reader of cluster state; structural changes go through the
/// cluster manager. Driven by the arrival-indexed logical clock only, so
/// identical input streams yield identical verdict histories.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessEvaluator {
    k: usize,
    l: usize,
    delta: u64,
}

impl ReadinessEvaluator {
    pub fn new(config: &PrivacyConfig) -> Self {
        Self {
            k: config.k(),
            l: config.l(),
            delta: config.delta(),
        }
    }

    /// k-anonymity and l-diversity both satisfied.
    pub fn is_ready(&self, cluster: &Cluster) -> bool {
        cluster.size() >= self.k && cluster.distinct_sensitive() >= self.l
    }

    /// Whether a tuple enqueued at `enqueued_at` has exhausted the delay bound.
    pub fn is_expired(&self, enqueued_at: u64, now: u64) -> bool {
        now.saturating_sub(enqueued_at) >= self.delta
    }

    /// Full verdict given the oldest pending member's enqueue time.
    pub fn evaluate(&self, cluster: &Cluster, oldest_enqueued_at: u64, now: u64) -> ReadinessState {
        if self.is_ready(cluster) {
            ReadinessState::Ready
        } else if self.is_expired(oldest_enqueued_at, now) {
            ReadinessState::Expired
        } else {
            ReadinessState::Aging
        }
    }
}
