use crate::tuple::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Global domain of one quasi-identifier attribute, used to normalize range
/// widths so that costs are comparable across attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeDomain {
    /// Closed numeric interval covering every value the stream may carry.
    Numeric { min: f64, max: f64 },
    /// Universe of admissible category labels.
    Categorical { universe: BTreeSet<String> },
}

impl AttributeDomain {
    /// Creates a numeric domain spanning `[min, max]`.
    pub fn numeric(min: f64, max: f64) -> Self {
        AttributeDomain::Numeric { min, max }
    }

    /// Creates a categorical domain from the given labels.
    pub fn categorical<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeDomain::Categorical {
            universe: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Canonical kind name used in validation errors.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeDomain::Numeric { .. } => "numeric",
            AttributeDomain::Categorical { .. } => "categorical",
        }
    }

    /// Whether the value is of this domain's kind and lies inside it.
    pub fn admits(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (AttributeDomain::Numeric { min, max }, AttributeValue::Numeric(v)) => {
                v.is_finite() && *v >= *min && *v <= *max
            }
            (AttributeDomain::Categorical { universe }, AttributeValue::Categorical(v)) => {
                universe.contains(v)
            }
            _ => false,
        }
    }

    fn span(&self) -> f64 {
        match self {
            AttributeDomain::Numeric { min, max } => (max - min).max(0.0),
            AttributeDomain::Categorical { universe } => universe.len().saturating_sub(1) as f64,
        }
    }
}

/// Generalization range of one attribute within a cluster. Numeric attributes
/// widen to a min/max interval, categorical attributes to a value set; both
/// honor the same contract (containment, enlargement, normalized width).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeRange {
    Numeric { min: f64, max: f64 },
    Categorical { values: BTreeSet<String> },
}

impl AttributeRange {
    /// The tight range covering exactly one value.
    pub fn from_value(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Numeric(v) => AttributeRange::Numeric { min: *v, max: *v },
            AttributeValue::Categorical(v) => AttributeRange::Categorical {
                values: BTreeSet::from([v.clone()]),
            },
        }
    }

    /// Whether the range covers the given value. Kind mismatches are rejected
    /// during tuple validation, so they answer `false` here rather than panic.
    pub fn contains(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (AttributeRange::Numeric { min, max }, AttributeValue::Numeric(v)) => {
                *v >= *min && *v <= *max
            }
            (AttributeRange::Categorical { values }, AttributeValue::Categorical(v)) => {
                values.contains(v)
            }
            _ => false,
        }
    }

    /// Returns the range widened just enough to cover `value`.
    pub fn enlarged(&self, value: &AttributeValue) -> Self {
        let mut next = self.clone();
        next.enlarge(value);
        next
    }

    /// Widens the range in place to cover `value`.
    pub fn enlarge(&mut self, value: &AttributeValue) {
        match (self, value) {
            (AttributeRange::Numeric { min, max }, AttributeValue::Numeric(v)) => {
                if *v < *min {
                    *min = *v;
                }
                if *v > *max {
                    *max = *v;
                }
            }
            (AttributeRange::Categorical { values }, AttributeValue::Categorical(v)) => {
                values.insert(v.clone());
            }
            _ => {}
        }
    }

    /// Bounding union of two ranges of the same kind (cluster merge).
    pub fn merged(&self, other: &AttributeRange) -> Self {
        match (self, other) {
            (
                AttributeRange::Numeric { min: a_min, max: a_max },
                AttributeRange::Numeric { min: b_min, max: b_max },
            ) => AttributeRange::Numeric {
                min: a_min.min(*b_min),
                max: a_max.max(*b_max),
            },
            (
                AttributeRange::Categorical { values: a },
                AttributeRange::Categorical { values: b },
            ) => AttributeRange::Categorical {
                values: a.union(b).cloned().collect(),
            },
            // Mixed kinds cannot occur on a validated stream; keep the left side.
            (left, _) => left.clone(),
        }
    }

    /// Range width normalized against the attribute's global domain, in
    /// `[0, 1]`. A singleton range has width 0 for both kinds.
    pub fn normalized_width(&self, domain: &AttributeDomain) -> f64 {
        let span = domain.span();
        if span <= 0.0 {
            return 0.0;
        }
        match self {
            AttributeRange::Numeric { min, max } => ((max - min) / span).clamp(0.0, 1.0),
            AttributeRange::Categorical { values } => {
                (values.len().saturating_sub(1) as f64 / span).clamp(0.0, 1.0)
            }
        }
    }
}

/// Externally visible anonymized record: every member of a released cluster
/// emits the same generalized ranges alongside its untouched sensitive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralizedRecord {
    pub tuple_id: u64,
    pub ranges: Vec<AttributeRange>,
    pub sensitive: String,
}

/// Weighted mean of the normalized per-attribute widths. Used both as the
/// cluster's information loss and as the pairwise distance for merges.
pub fn weighted_loss(
    ranges: &[AttributeRange],
    domains: &[AttributeDomain],
    weights: &[f64],
) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    ranges
        .iter()
        .zip(domains)
        .zip(weights)
        .map(|((range, domain), weight)| range.normalized_width(domain) * weight)
        .sum::<f64>()
        / total
}

/// Normalized increase in weighted range width if `qi` joined the ranges.
/// Deterministic and side-effect free; lower is a better fit.
pub fn enlargement_cost(
    ranges: &[AttributeRange],
    qi: &[AttributeValue],
    domains: &[AttributeDomain],
    weights: &[f64],
) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    ranges
        .iter()
        .zip(qi)
        .zip(domains.iter().zip(weights))
        .map(|((range, value), (domain, weight))| {
            let grown = range.enlarged(value).normalized_width(domain);
            (grown - range.normalized_width(domain)).max(0.0) * weight
        })
        .sum::<f64>()
        / total
}
