use crate::cluster::{Cluster, ClusterId, ClusterSet};
use crate::config::PrivacyConfig;
use crate::generalize::{enlargement_cost, AttributeDomain, AttributeRange};
use crate::tuple::StreamTuple;
use std::collections::BTreeMap;

/// Owns the set of live clusters and performs all structural mutation:
/// assignment, splitting of overgrown clusters, and merging. No other
/// component mutates cluster state directly.
#[derive(Debug, Clone)]
pub struct ClusterManager {
    set: ClusterSet,
    domains: Vec<AttributeDomain>,
    weights: Vec<f64>,
    k: usize,
    mu: usize,
}

impl ClusterManager {
    /// Creates a manager for the given (already validated) configuration.
    pub fn new(config: &PrivacyConfig) -> Self {
        Self {
            set: ClusterSet::new(config.k()),
            domains: config.domains(),
            weights: config.weights(),
            k: config.k(),
            mu: config.mu(),
        }
    }

    /// Read-only view of the arena for readiness checks and output.
    pub fn clusters(&self) -> &ClusterSet {
        &self.set
    }

    /// Assigns a tuple to the cheapest existing cluster or creates a new
    /// singleton. The acceptable-cost threshold is `live_count / mu`: while
    /// the arena is nearly empty only near-perfect fits absorb a tuple, and as
    /// it fills toward `mu` any normalized cost becomes acceptable, so the
    /// arena favors specificity early and generalization later. Never fails
    /// for a well-formed tuple.
    pub fn assign(&mut self, tuple: &StreamTuple, now: u64) -> ClusterId {
        let mut best: Option<(f64, ClusterId)> = None;
        for cluster in self.set.iter() {
            let cost =
                enlargement_cost(cluster.ranges(), tuple.qi(), &self.domains, &self.weights);
            // Strict comparison keeps the lowest id on ties (iteration is in
            // ascending id order).
            if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                best = Some((cost, cluster.id()));
            }
        }

        let threshold = self.set.len() as f64 / self.mu as f64;
        if let Some((cost, id)) = best {
            if cost <= threshold || self.set.len() >= self.mu {
                self.set.insert_tuple(id, tuple, now);
                return id;
            }
        }

        let id = self.set.allocate_id();
        self.set.add(Cluster::singleton(id, tuple, now));
        id
    }

    /// Splits an overgrown cluster (size > 2k) by recursive bisection along
    /// the widest-range attribute. Fragments that cannot reach k members stay
    /// live in the small subset rather than being emitted directly. Returns
    /// the fragment ids, or an empty vec when no split happened.
    pub fn split(
        &mut self,
        id: ClusterId,
        tuples: &BTreeMap<u64, StreamTuple>,
        now: u64,
    ) -> Vec<ClusterId> {
        let splittable = self
            .set
            .get(id)
            .map_or(false, |cluster| cluster.size() > 2 * self.k);
        if !splittable {
            return Vec::new();
        }
        let Some(cluster) = self.set.remove(id) else {
            return Vec::new();
        };
        let members: Vec<&StreamTuple> = cluster
            .members()
            .iter()
            .filter_map(|tuple_id| tuples.get(tuple_id))
            .collect();

        let mut parts = Vec::new();
        self.bisect(members, &mut parts);

        let mut fragment_ids = Vec::new();
        for part in parts {
            let fragment_id = self.set.allocate_id();
            if let Some(fragment) =
                Cluster::from_members(fragment_id, part.into_iter(), now)
            {
                fragment_ids.push(fragment.id());
                self.set.add(fragment);
            }
        }
        fragment_ids
    }

    /// Transfers all tuples of `source` into `target` and destroys `source`.
    /// Ranges of `target` become the bounding union of both.
    pub fn merge(&mut self, source: ClusterId, target: ClusterId, now: u64) {
        self.set.absorb(source, target, now);
    }

    /// Destroys a cluster after its members have been flushed.
    pub fn release(&mut self, id: ClusterId) -> Option<Cluster> {
        self.set.remove(id)
    }

    /// The existing cluster (excluding `id`) whose merge with `id` yields the
    /// lowest combined information loss; ties resolve to the lowest id.
    pub fn find_nearest(&self, id: ClusterId) -> Option<ClusterId> {
        let cluster = self.set.get(id)?;
        let mut best: Option<(f64, ClusterId)> = None;
        for candidate in self.set.iter() {
            if candidate.id() == id {
                continue;
            }
            let loss = cluster.merged_loss(candidate, &self.domains, &self.weights);
            if best.map_or(true, |(best_loss, _)| loss < best_loss) {
                best = Some((loss, candidate.id()));
            }
        }
        best.map(|(_, candidate_id)| candidate_id)
    }

    /// Like `find_nearest`, restricted to clusters that would raise the
    /// distinct sensitive-value count of `id`. Used when a delay-expired
    /// cluster has reached k but still lacks l-diversity.
    pub fn find_nearest_diversifying(&self, id: ClusterId) -> Option<ClusterId> {
        let cluster = self.set.get(id)?;
        let mut best: Option<(f64, ClusterId)> = None;
        for candidate in self.set.iter() {
            if candidate.id() == id {
                continue;
            }
            let adds_diversity = candidate
                .sensitive_counts()
                .keys()
                .any(|value| !cluster.sensitive_counts().contains_key(value));
            if !adds_diversity {
                continue;
            }
            let loss = cluster.merged_loss(candidate, &self.domains, &self.weights);
            if best.map_or(true, |(best_loss, _)| loss < best_loss) {
                best = Some((loss, candidate.id()));
            }
        }
        best.map(|(_, candidate_id)| candidate_id)
    }

    /// Information loss of every live cluster, in id order.
    pub fn loss_distribution(&self) -> Vec<f64> {
        self.set
            .iter()
            .map(|cluster| cluster.information_loss(&self.domains, &self.weights))
            .collect()
    }

    /// Merges the two nearest small clusters while the arena exceeds `mu`
    /// (splitting can push it over). Returns the merges performed.
    pub fn enforce_capacity(&mut self, now: u64) -> Vec<(ClusterId, ClusterId)> {
        let mut merges = Vec::new();
        while self.set.len() > self.mu {
            let Some(source) = self.set.small().iter().copied().next() else {
                break;
            };
            let Some(target) = self.find_nearest(source) else {
                break;
            };
            self.merge(source, target, now);
            merges.push((source, target));
        }
        merges
    }

    fn bisect<'a>(&self, members: Vec<&'a StreamTuple>, parts: &mut Vec<Vec<&'a StreamTuple>>) {
        if members.len() <= 2 * self.k {
            parts.push(members);
            return;
        }
        let Some(widest) = self.widest_attribute(&members) else {
            parts.push(members);
            return;
        };
        let (left, right) = partition_by_attribute(&members, widest);
        if left.is_empty() || right.is_empty() {
            // All members share the widest attribute's value; no useful cut.
            parts.push(members);
            return;
        }
        self.bisect(left, parts);
        self.bisect(right, parts);
    }

    /// Index of the attribute with the widest normalized range over `members`.
    fn widest_attribute(&self, members: &[&StreamTuple]) -> Option<usize> {
        let first = members.first()?;
        let mut ranges: Vec<AttributeRange> =
            first.qi().iter().map(AttributeRange::from_value).collect();
        for tuple in &members[1..] {
            for (range, value) in ranges.iter_mut().zip(tuple.qi()) {
                range.enlarge(value);
            }
        }
        let mut best: Option<(f64, usize)> = None;
        for (index, (range, domain)) in ranges.iter().zip(&self.domains).enumerate() {
            let width = range.normalized_width(domain);
            if best.map_or(true, |(best_width, _)| width > best_width) {
                best = Some((width, index));
            }
        }
        best.map(|(_, index)| index)
    }
}

/// Splits members into the nearer half along one attribute: numeric values at
/// the interval midpoint, categorical values at the sorted-label midpoint.
fn partition_by_attribute<'a>(
    members: &[&'a StreamTuple],
    attribute: usize,
) -> (Vec<&'a StreamTuple>, Vec<&'a StreamTuple>) {
    use crate::tuple::AttributeValue;

    let mut numeric_bounds: Option<(f64, f64)> = None;
    let mut labels: Vec<&str> = Vec::new();
    for tuple in members {
        match &tuple.qi()[attribute] {
            AttributeValue::Numeric(v) => {
                numeric_bounds = Some(match numeric_bounds {
                    Some((min, max)) => (min.min(*v), max.max(*v)),
                    None => (*v, *v),
                });
            }
            AttributeValue::Categorical(v) => {
                if !labels.contains(&v.as_str()) {
                    labels.push(v.as_str());
                }
            }
        }
    }
    labels.sort_unstable();

    let mut left = Vec::new();
    let mut right = Vec::new();
    for tuple in members {
        let goes_left = match &tuple.qi()[attribute] {
            AttributeValue::Numeric(v) => {
                let (min, max) = numeric_bounds.unwrap_or((*v, *v));
                *v <= (min + max) / 2.0
            }
            AttributeValue::Categorical(v) => {
                let position = labels.iter().position(|l| *l == v.as_str()).unwrap_or(0);
                position < labels.len().div_ceil(2)
            }
        };
        if goes_left {
            left.push(*tuple);
        } else {
            right.push(*tuple);
        }
    }
    (left, right)
}
