use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Outcome of one Bernoulli trial for a record about to leave the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// Release the generalized record unchanged.
    Emit,
    /// Permanently suppress the record. Suppression is never retried, since a
    /// retry would leak information about the tuple's existence.
    Suppress,
}

/// Running account of the sampler's privacy posture: the configured beta and
/// the realized emission rate are both auditable outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrivacyAccountant {
    beta: f64,
    emitted: u64,
    suppressed: u64,
}

impl PrivacyAccountant {
    fn new(beta: f64) -> Self {
        Self {
            beta,
            emitted: 0,
            suppressed: 0,
        }
    }

    fn record(&mut self, decision: SampleDecision) {
        match decision {
            SampleDecision::Emit => self.emitted += 1,
            SampleDecision::Suppress => self.suppressed += 1,
        }
    }

    /// Configured Bernoulli emission probability.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Fraction of sampled records that were released (0.0 before any trial).
    /// Over a long stream this converges to beta.
    pub fn emission_rate(&self) -> f64 {
        let trials = self.emitted + self.suppressed;
        if trials == 0 {
            return 0.0;
        }
        self.emitted as f64 / trials as f64
    }

    /// Upper bound on the membership-inference privacy loss implied by beta.
    /// beta = 1 releases everything (unbounded); beta = 0 releases nothing.
    /// The engine exposes this bound but never tunes beta adaptively.
    pub fn epsilon_upper_bound(&self) -> f64 {
        if self.beta >= 1.0 {
            f64::INFINITY
        } else if self.beta <= 0.0 {
            0.0
        } else {
            (self.beta / (1.0 - self.beta)).ln().max(0.0)
        }
    }
}

/// Seeded Bernoulli sampler applied to every record the scheduler releases.
/// One independent trial per record; the seed makes replays byte-identical.
#[derive(Debug, Clone)]
pub struct BernoulliSampler {
    rng: StdRng,
    account: PrivacyAccountant,
}

impl BernoulliSampler {
    /// Creates a sampler with the given emission probability and seed. The
    /// probability is validated upstream by `PrivacyConfig`.
    pub fn new(beta: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            account: PrivacyAccountant::new(beta),
        }
    }

    /// Draws one trial and records it.
    pub fn sample(&mut self) -> SampleDecision {
        let decision = if self.rng.gen_bool(self.account.beta()) {
            SampleDecision::Emit
        } else {
            SampleDecision::Suppress
        };
        self.account.record(decision);
        decision
    }

    /// Current privacy accounting snapshot.
    pub fn account(&self) -> &PrivacyAccountant {
        &self.account
    }
}
