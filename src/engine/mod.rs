//! The anonymization core: readiness evaluation, delay-bounded output
//! scheduling, Bernoulli sampling, and the stream orchestration loop.

pub mod readiness;
pub mod sampler;
pub mod scheduler;
pub mod stream;
