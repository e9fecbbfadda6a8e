use crate::generalize::AttributeDomain;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating engine configuration. All of these fail
/// fast at construction time, before any tuple is processed.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// k-anonymity requires at least one member per release group.
    #[error("k must be at least 1, got {k}")]
    InvalidK { k: usize },
    /// l-diversity requires at least one distinct sensitive value.
    #[error("l must be at least 1, got {l}")]
    InvalidL { l: usize },
    /// A zero delay bound would force every tuple out unconstrained.
    #[error("delta must be at least 1 logical-time unit, got {delta}")]
    InvalidDelta { delta: u64 },
    /// Bernoulli sampling probability outside the accepted range.
    #[error("beta must be a finite probability in [0.0, 1.0], got {beta}")]
    BetaOutOfRange { beta: f64 },
    /// The cluster-count bound must admit at least one k-sized cluster.
    #[error("mu must be at least k ({k}), got {mu}")]
    MuBelowK { mu: usize, k: usize },
    /// Attribute weights must be positive and finite.
    #[error("attribute '{name}' has non-positive weight {weight}")]
    NonPositiveWeight { name: String, weight: f64 },
    /// At least one quasi-identifier attribute is required.
    #[error("schema must declare at least one quasi-identifier attribute")]
    EmptySchema,
}

/// Declaration of one quasi-identifier attribute: its name, global domain,
/// and the weight it carries in generalization-cost computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub domain: AttributeDomain,
    pub weight: f64,
}

impl AttributeSpec {
    /// Creates a spec with the default weight of 1.0.
    pub fn new(name: impl Into<String>, domain: AttributeDomain) -> Self {
        Self {
            name: name.into(),
            domain,
            weight: 1.0,
        }
    }

    /// Overrides the attribute weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Immutable privacy parameters, fixed for the engine's lifetime. Constructed
/// once, validated once, and passed explicitly into the engine so independent
/// instances can coexist in tests. Deliberately not deserializable; every
/// instance goes through `new` so unvalidated parameters cannot sneak in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivacyConfig {
    k: usize,
    l: usize,
    delta: u64,
    beta: f64,
    mu: usize,
    seed: u64,
    attributes: Vec<AttributeSpec>,
}

impl PrivacyConfig {
    /// Validates and freezes the parameter set.
    ///
    /// `beta` accepts the closed interval `[0.0, 1.0]`: zero expresses
    /// suppress-everything operation, which the audit surface must still be
    /// able to report on.
    pub fn new(
        k: usize,
        l: usize,
        delta: u64,
        beta: f64,
        mu: usize,
        attributes: Vec<AttributeSpec>,
    ) -> Result<Self, ConfigError> {
        if k < 1 {
            return Err(ConfigError::InvalidK { k });
        }
        if l < 1 {
            return Err(ConfigError::InvalidL { l });
        }
        if delta < 1 {
            return Err(ConfigError::InvalidDelta { delta });
        }
        if !beta.is_finite() || !(0.0..=1.0).contains(&beta) {
            return Err(ConfigError::BetaOutOfRange { beta });
        }
        if mu < k {
            return Err(ConfigError::MuBelowK { mu, k });
        }
        if attributes.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        for spec in &attributes {
            if !spec.weight.is_finite() || spec.weight <= 0.0 {
                return Err(ConfigError::NonPositiveWeight {
                    name: spec.name.clone(),
                    weight: spec.weight,
                });
            }
        }
        Ok(Self {
            k,
            l,
            delta,
            beta,
            mu,
            seed: 0,
            attributes,
        })
    }

    /// Overrides the sampler seed (default 0, reproducible replays).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Minimum cluster size before members may be released.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Minimum distinct sensitive values per released cluster.
    pub fn l(&self) -> usize {
        self.l
    }

    /// Maximum logical-time units a tuple may wait before forced output.
    pub fn delta(&self) -> u64 {
        self.delta
    }

    /// Bernoulli emission probability.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Cluster-count bound steering new-cluster creation.
    pub fn mu(&self) -> usize {
        self.mu
    }

    /// Sampler seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Quasi-identifier schema in attribute order.
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Per-attribute domains in schema order.
    pub fn domains(&self) -> Vec<AttributeDomain> {
        self.attributes.iter().map(|a| a.domain.clone()).collect()
    }

    /// Per-attribute weights in schema order.
    pub fn weights(&self) -> Vec<f64> {
        self.attributes.iter().map(|a| a.weight).collect()
    }
}
