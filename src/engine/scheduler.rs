use crate::cluster::Cluster;
use crate::engine::sampler::{BernoulliSampler, SampleDecision};
use crate::generalize::GeneralizedRecord;
use crate::tuple::StreamTuple;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// What the downstream sink receives for one processed tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OutputEvent {
    /// The generalized record was released. `relaxed_diversity` marks the
    /// documented departure taken when the delay bound forced output before
    /// the cluster's constraints were satisfiable.
    Emitted {
        record: GeneralizedRecord,
        relaxed_diversity: bool,
    },
    /// The sampler suppressed the record; only the tuple id leaves the engine.
    Suppressed { tuple_id: u64 },
}

/// One tuple awaiting a ready cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEntry {
    pub tuple_id: u64,
    pub enqueued_at: u64,
}

/// Holds tuples awaiting release and enforces the flush order. Entries are
/// kept in enqueue order so the oldest is always checked first for delay
/// violations; cluster ownership is resolved through the arena index at flush
/// time, surviving merges and splits without queue rewrites.
#[derive(Debug, Clone, Default)]
pub struct OutputScheduler {
    queue: VecDeque<PendingEntry>,
}

impl OutputScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an ingested tuple as pending.
    pub fn enqueue(&mut self, tuple_id: u64, now: u64) {
        self.queue.push_back(PendingEntry {
            tuple_id,
            enqueued_at: now,
        });
    }

    /// Queue depth: the engine's backpressure signal to the ingestion side.
    pub fn depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The oldest pending entry, if any.
    pub fn oldest(&self) -> Option<PendingEntry> {
        self.queue.front().copied()
    }

    /// Discards and returns the oldest pending entry.
    pub fn pop_oldest(&mut self) -> Option<PendingEntry> {
        self.queue.pop_front()
    }

    /// Releases every pending member of `cluster` in enqueue order: each is
    /// generalized, handed to the sampler exactly once, and destroyed. The
    /// caller discards the (now empty) cluster afterwards.
    pub fn flush_cluster(
        &mut self,
        cluster: &Cluster,
        tuples: &mut BTreeMap<u64, StreamTuple>,
        sampler: &mut BernoulliSampler,
        relaxed_diversity: bool,
    ) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.queue.len());
        for entry in self.queue.drain(..) {
            if !cluster.members().contains(&entry.tuple_id) {
                remaining.push_back(entry);
                continue;
            }
            let Some(tuple) = tuples.remove(&entry.tuple_id) else {
                continue;
            };
            let record = cluster.record_for(&tuple);
            events.push(match sampler.sample() {
                SampleDecision::Emit => OutputEvent::Emitted {
                    record,
                    relaxed_diversity,
                },
                SampleDecision::Suppress => OutputEvent::Suppressed {
                    tuple_id: tuple.id(),
                },
            });
        }
        self.queue = remaining;
        events
    }
}
