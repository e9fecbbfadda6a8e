//! CASTLEGUARD streaming anonymization engine.
//!
//! Anonymizes a continuous stream of tuples so that every released record
//! satisfies k-anonymity and l-diversity within a bounded per-tuple delay,
//! then hides individual membership behind Bernoulli output suppression.
//! The core is a single-threaded, deterministic function of the input stream;
//! ingestion, persistence, and CLI surfaces live outside this crate.

pub mod app;
pub mod audit;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod generalize;
pub mod manager;
pub mod telemetry;
pub mod tuple;

pub use audit::{AuditEvent, AuditKind, AuditLog};
pub use cluster::{Cluster, ClusterId, ClusterSet};
pub use config::{AttributeSpec, ConfigError, PrivacyConfig};
pub use engine::readiness::{ReadinessEvaluator, ReadinessState};
pub use engine::sampler::{BernoulliSampler, PrivacyAccountant, SampleDecision};
pub use engine::scheduler::{OutputEvent, OutputScheduler, PendingEntry};
pub use engine::stream::{CastleEngine, StreamStats};
pub use generalize::{
    enlargement_cost, weighted_loss, AttributeDomain, AttributeRange, GeneralizedRecord,
};
pub use manager::ClusterManager;
pub use telemetry::{EngineTelemetry, LossSummary};
pub use tuple::{AttributeValue, StreamTuple, TupleError};
