use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors surfaced while admitting tuples into the engine.
#[derive(Debug, Error, PartialEq)]
pub enum TupleError {
    /// The tuple is structurally invalid and was skipped (counted, not fatal).
    #[error("tuple {tuple_id} is malformed: {reason}")]
    Malformed {
        /// Identifier of the rejected tuple.
        tuple_id: u64,
        /// Human-readable rejection reason.
        reason: String,
    },
    /// Arrival indices must be strictly increasing; violating that breaks
    /// replay determinism and is fatal to the stream.
    #[error("arrival index {arrival} not after previous arrival {last_arrival}")]
    OutOfOrderArrival {
        /// Arrival index carried by the offending tuple.
        arrival: u64,
        /// Highest arrival index accepted so far.
        last_arrival: u64,
    },
    /// The engine was already drained via `finish` and accepts no more input.
    #[error("engine already finished; no further tuples accepted")]
    EngineFinished,
}

/// A single quasi-identifier attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Numeric(f64),
    Categorical(String),
}

impl AttributeValue {
    /// Creates a numeric attribute value.
    pub fn numeric(value: f64) -> Self {
        AttributeValue::Numeric(value)
    }

    /// Creates a categorical attribute value.
    pub fn categorical(value: impl Into<String>) -> Self {
        AttributeValue::Categorical(value.into())
    }

    /// Canonical kind name used in validation errors.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Numeric(_) => "numeric",
            AttributeValue::Categorical(_) => "categorical",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Numeric(value) => write!(f, "{value}"),
            AttributeValue::Categorical(value) => f.write_str(value),
        }
    }
}

/// One record of the input stream: quasi-identifiers plus a sensitive value,
/// stamped with a strictly increasing logical arrival index. Immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTuple {
    id: u64,
    arrival: u64,
    qi: Vec<AttributeValue>,
    sensitive: String,
}

impl StreamTuple {
    /// Builds a tuple from its parts.
    pub fn new(
        id: u64,
        arrival: u64,
        qi: Vec<AttributeValue>,
        sensitive: impl Into<String>,
    ) -> Self {
        Self {
            id,
            arrival,
            qi,
            sensitive: sensitive.into(),
        }
    }

    /// Unique tuple identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Logical arrival index (the engine's clock source).
    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    /// Quasi-identifier attribute values in schema order.
    pub fn qi(&self) -> &[AttributeValue] {
        &self.qi
    }

    /// The sensitive attribute value, emitted unchanged on output.
    pub fn sensitive(&self) -> &str {
        &self.sensitive
    }
}
