use crate::cluster::ClusterId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Category of an auditable engine decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    /// A delay-expired cluster was released without satisfying l-diversity.
    RelaxedDiversity,
    /// A structurally invalid tuple was skipped.
    MalformedTuple,
    /// A delay-expired cluster absorbed its nearest neighbor to make progress.
    ForcedMerge,
    /// An overgrown cluster was repartitioned.
    ForcedSplit,
}

impl AuditKind {
    /// Canonical uppercase name used in counters and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::RelaxedDiversity => "RELAXED_DIVERSITY",
            AuditKind::MalformedTuple => "MALFORMED_TUPLE",
            AuditKind::ForcedMerge => "FORCED_MERGE",
            AuditKind::ForcedSplit => "FORCED_SPLIT",
        }
    }
}

/// One recorded policy decision. Relaxations are decisions, not errors; they
/// are never silently absorbed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// Logical time at which the decision was taken.
    pub at: u64,
    pub kind: AuditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<ClusterId>,
    pub detail: String,
}

/// Append-only audit trail with per-kind counters.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    events: Vec<AuditEvent>,
    counters: HashMap<AuditKind, u64>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and bumps its kind counter.
    pub fn record(
        &mut self,
        at: u64,
        kind: AuditKind,
        cluster_id: Option<ClusterId>,
        detail: impl Into<String>,
    ) {
        *self.counters.entry(kind).or_insert(0) += 1;
        self.events.push(AuditEvent {
            at,
            kind,
            cluster_id,
            detail: detail.into(),
        });
    }

    /// Events in recording order.
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Cumulative per-kind counters under their canonical names.
    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|(kind, total)| (kind.as_str().to_string(), *total))
            .collect()
    }

    /// Count for a single kind.
    pub fn count(&self, kind: AuditKind) -> u64 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    /// Renders every event as one JSON line, in recording order.
    pub fn to_json_lines(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| serde_json::to_string(event).ok())
            .collect()
    }
}
