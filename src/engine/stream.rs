use crate::audit::{AuditKind, AuditLog};
use crate::cluster::ClusterId;
use crate::config::PrivacyConfig;
use crate::engine::readiness::{ReadinessEvaluator, ReadinessState};
use crate::engine::sampler::{BernoulliSampler, PrivacyAccountant};
use crate::engine::scheduler::{OutputEvent, OutputScheduler};
use crate::manager::ClusterManager;
use crate::telemetry::{sequence_hash_update, EngineTelemetry, LossSummary, SEQUENCE_HASH_SEED};
use crate::tuple::{StreamTuple, TupleError};
use std::collections::BTreeMap;

/// Counters accumulated over the stream's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub ingested: u64,
    pub malformed: u64,
    pub emitted: u64,
    pub suppressed: u64,
    pub relaxed_diversity: u64,
}

/// The streaming anonymization engine: a synchronous function from (state,
/// next tuple) to (state, output events). Tuples are processed strictly in
/// arrival order; the logical clock is the arrival index itself, so replaying
/// an identical input sequence reproduces identical output byte for byte.
#[derive(Debug, Clone)]
pub struct CastleEngine {
    config: PrivacyConfig,
    manager: ClusterManager,
    scheduler: OutputScheduler,
    sampler: BernoulliSampler,
    evaluator: ReadinessEvaluator,
    audit: AuditLog,
    tuples: BTreeMap<u64, StreamTuple>,
    stats: StreamStats,
    now: u64,
    last_arrival: Option<u64>,
    finished: bool,
    sequence_hash: u64,
}

impl CastleEngine {
    /// Builds an engine from a validated configuration. Configuration is
    /// immutable for the engine's lifetime.
    pub fn new(config: PrivacyConfig) -> Self {
        Self {
            manager: ClusterManager::new(&config),
            scheduler: OutputScheduler::new(),
            sampler: BernoulliSampler::new(config.beta(), config.seed()),
            evaluator: ReadinessEvaluator::new(&config),
            audit: AuditLog::new(),
            tuples: BTreeMap::new(),
            stats: StreamStats::default(),
            now: 0,
            last_arrival: None,
            finished: false,
            sequence_hash: SEQUENCE_HASH_SEED,
            config,
        }
    }

    /// Processes one tuple and returns every output event it triggered.
    ///
    /// Malformed tuples are counted, audited, and skipped; the stream keeps
    /// going. Out-of-order arrivals are fatal: determinism cannot be restored
    /// by retrying, so the error is surfaced immediately.
    pub fn push(&mut self, tuple: StreamTuple) -> Result<Vec<OutputEvent>, TupleError> {
        if self.finished {
            return Err(TupleError::EngineFinished);
        }
        if let Some(last) = self.last_arrival {
            if tuple.arrival() <= last {
                return Err(TupleError::OutOfOrderArrival {
                    arrival: tuple.arrival(),
                    last_arrival: last,
                });
            }
        }
        self.last_arrival = Some(tuple.arrival());
        self.now = tuple.arrival();

        if let Err(error) = self.validate(&tuple) {
            self.stats.malformed += 1;
            self.audit
                .record(self.now, AuditKind::MalformedTuple, None, error.to_string());
            // The clock still advanced, so pending delay bounds must be checked.
            let events = self.tick();
            return Ok(events);
        }

        self.stats.ingested += 1;
        let cluster_id = self.manager.assign(&tuple, self.now);
        self.scheduler.enqueue(tuple.id(), self.now);
        self.tuples.insert(tuple.id(), tuple);
        self.maybe_split(cluster_id);

        let events = self.tick();
        Ok(events)
    }

    /// Force-flushes everything still pending through the expiry path and
    /// freezes the engine. No tuple is ever silently lost at shutdown.
    pub fn finish(&mut self) -> Vec<OutputEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut events = self.flush_ready();
        while let Some(entry) = self.scheduler.oldest() {
            match self.manager.clusters().owner_of(entry.tuple_id) {
                Some(cluster_id) => events.extend(self.force_flush(cluster_id)),
                None => {
                    self.scheduler.pop_oldest();
                }
            }
        }
        self.observe(&events);
        events
    }

    /// Queue depth, exposed so the ingestion side can throttle. The core
    /// itself never blocks.
    pub fn queue_depth(&self) -> usize {
        self.scheduler.depth()
    }

    /// The engine's immutable configuration.
    pub fn config(&self) -> &PrivacyConfig {
        &self.config
    }

    /// Lifetime counters.
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Audit trail of relaxations, forced merges/splits, and rejected tuples.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Sampler-side privacy accounting (configured beta, realized rate).
    pub fn privacy_account(&self) -> &PrivacyAccountant {
        self.sampler.account()
    }

    /// Full observability snapshot.
    pub fn telemetry(&self) -> EngineTelemetry {
        let account = self.sampler.account();
        EngineTelemetry {
            tuples_ingested: self.stats.ingested,
            tuples_malformed: self.stats.malformed,
            records_emitted: self.stats.emitted,
            records_suppressed: self.stats.suppressed,
            relaxed_diversity_records: self.stats.relaxed_diversity,
            configured_beta: account.beta(),
            emission_rate: account.emission_rate(),
            epsilon_upper_bound: account.epsilon_upper_bound(),
            live_clusters: self.manager.clusters().len(),
            queue_depth: self.scheduler.depth(),
            information_loss: LossSummary::from_values(&self.manager.loss_distribution()),
            sequence_hash: self.sequence_hash,
        }
    }

    fn validate(&self, tuple: &StreamTuple) -> Result<(), TupleError> {
        let malformed = |reason: String| TupleError::Malformed {
            tuple_id: tuple.id(),
            reason,
        };
        let attributes = self.config.attributes();
        if tuple.qi().len() != attributes.len() {
            return Err(malformed(format!(
                "expected {} quasi-identifiers, got {}",
                attributes.len(),
                tuple.qi().len()
            )));
        }
        for (value, spec) in tuple.qi().iter().zip(attributes) {
            if !spec.domain.admits(value) {
                return Err(malformed(format!(
                    "attribute '{}' ({} domain) rejects {} value '{}'",
                    spec.name,
                    spec.domain.kind(),
                    value.kind(),
                    value
                )));
            }
        }
        if tuple.sensitive().is_empty() {
            return Err(malformed("empty sensitive attribute".to_string()));
        }
        Ok(())
    }

    fn maybe_split(&mut self, cluster_id: ClusterId) {
        let overgrown = self.manager.clusters().get(cluster_id).map_or(false, |c| {
            c.size() > 2 * self.config.k() && !self.evaluator.is_ready(c)
        });
        if !overgrown {
            return;
        }
        let fragments = self.manager.split(cluster_id, &self.tuples, self.now);
        if fragments.len() > 1 {
            self.audit.record(
                self.now,
                AuditKind::ForcedSplit,
                Some(cluster_id),
                format!("repartitioned into {} fragments", fragments.len()),
            );
        }
        for (source, target) in self.manager.enforce_capacity(self.now) {
            self.audit.record(
                self.now,
                AuditKind::ForcedMerge,
                Some(target),
                format!("capacity merge absorbed {source}"),
            );
        }
    }

    /// One scheduling pass: release every ready cluster, then force progress
    /// on delay-expired entries, oldest first.
    fn tick(&mut self) -> Vec<OutputEvent> {
        let mut events = self.flush_ready();
        loop {
            let Some(entry) = self.scheduler.oldest() else {
                break;
            };
            let Some(cluster_id) = self.manager.clusters().owner_of(entry.tuple_id) else {
                self.scheduler.pop_oldest();
                continue;
            };
            let Some(cluster) = self.manager.clusters().get(cluster_id) else {
                self.scheduler.pop_oldest();
                continue;
            };
            match self.evaluator.evaluate(cluster, entry.enqueued_at, self.now) {
                ReadinessState::Ready => events.extend(self.flush(cluster_id, false)),
                ReadinessState::Expired => events.extend(self.force_flush(cluster_id)),
                ReadinessState::Aging => break,
            }
        }
        self.observe(&events);
        events
    }

    fn flush_ready(&mut self) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        for cluster_id in self.manager.clusters().ids() {
            let ready = self
                .manager
                .clusters()
                .get(cluster_id)
                .map_or(false, |c| self.evaluator.is_ready(c));
            if ready {
                events.extend(self.flush(cluster_id, false));
            }
        }
        events
    }

    /// Expired-path release: merge toward readiness first (size via nearest
    /// neighbor, then diversity via diversifying neighbors), and if the
    /// constraints remain unreachable, emit anyway with the relaxed flag.
    fn force_flush(&mut self, cluster_id: ClusterId) -> Vec<OutputEvent> {
        while self
            .manager
            .clusters()
            .get(cluster_id)
            .map_or(false, |c| c.size() < self.config.k())
        {
            let Some(source) = self.manager.find_nearest(cluster_id) else {
                break;
            };
            self.manager.merge(source, cluster_id, self.now);
            self.audit.record(
                self.now,
                AuditKind::ForcedMerge,
                Some(cluster_id),
                format!("delay-bound merge absorbed {source}"),
            );
        }
        while self
            .manager
            .clusters()
            .get(cluster_id)
            .map_or(false, |c| c.distinct_sensitive() < self.config.l())
        {
            let Some(source) = self.manager.find_nearest_diversifying(cluster_id) else {
                break;
            };
            self.manager.merge(source, cluster_id, self.now);
            self.audit.record(
                self.now,
                AuditKind::ForcedMerge,
                Some(cluster_id),
                format!("diversity merge absorbed {source}"),
            );
        }

        let relaxed = self
            .manager
            .clusters()
            .get(cluster_id)
            .map_or(false, |c| !self.evaluator.is_ready(c));
        if relaxed {
            let (size, distinct) = self
                .manager
                .clusters()
                .get(cluster_id)
                .map(|c| (c.size(), c.distinct_sensitive()))
                .unwrap_or((0, 0));
            self.audit.record(
                self.now,
                AuditKind::RelaxedDiversity,
                Some(cluster_id),
                format!(
                    "released at size {size} with {distinct} distinct sensitive values (k={}, l={})",
                    self.config.k(),
                    self.config.l()
                ),
            );
        }
        self.flush(cluster_id, relaxed)
    }

    fn flush(&mut self, cluster_id: ClusterId, relaxed: bool) -> Vec<OutputEvent> {
        let Some(cluster) = self.manager.release(cluster_id) else {
            return Vec::new();
        };
        self.scheduler
            .flush_cluster(&cluster, &mut self.tuples, &mut self.sampler, relaxed)
    }

    fn observe(&mut self, events: &[OutputEvent]) {
        for event in events {
            match event {
                OutputEvent::Emitted {
                    relaxed_diversity, ..
                } => {
                    self.stats.emitted += 1;
                    if *relaxed_diversity {
                        self.stats.relaxed_diversity += 1;
                    }
                }
                OutputEvent::Suppressed { .. } => self.stats.suppressed += 1,
            }
            self.sequence_hash = sequence_hash_update(self.sequence_hash, event);
        }
    }
}
