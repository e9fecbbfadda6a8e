use crate::generalize::{weighted_loss, AttributeDomain, AttributeRange, GeneralizedRecord};
use crate::tuple::StreamTuple;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Arena index of a live cluster. Ids are allocated monotonically and never
/// reused, so ordering by id doubles as creation-order tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A mutable grouping of tuples sharing one generalization. Members are
/// referenced by tuple id; a tuple belongs to exactly one cluster at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    id: ClusterId,
    members: BTreeSet<u64>,
    ranges: Vec<AttributeRange>,
    sensitive_counts: BTreeMap<String, usize>,
    created_at: u64,
    modified_at: u64,
}

impl Cluster {
    /// Creates a singleton cluster around one tuple.
    pub fn singleton(id: ClusterId, tuple: &StreamTuple, now: u64) -> Self {
        Self {
            id,
            members: BTreeSet::from([tuple.id()]),
            ranges: tuple.qi().iter().map(AttributeRange::from_value).collect(),
            sensitive_counts: BTreeMap::from([(tuple.sensitive().to_string(), 1)]),
            created_at: now,
            modified_at: now,
        }
    }

    /// Full recompute from a member set (split and merge repartitions).
    /// The resulting ranges are the tight bound over the given tuples.
    pub fn from_members<'a, I>(id: ClusterId, tuples: I, now: u64) -> Option<Self>
    where
        I: IntoIterator<Item = &'a StreamTuple>,
    {
        let mut iter = tuples.into_iter();
        let first = iter.next()?;
        let mut cluster = Self::singleton(id, first, now);
        for tuple in iter {
            cluster.insert(tuple, now);
        }
        Some(cluster)
    }

    /// Adds a tuple, widening the ranges incrementally.
    pub fn insert(&mut self, tuple: &StreamTuple, now: u64) {
        self.members.insert(tuple.id());
        for (range, value) in self.ranges.iter_mut().zip(tuple.qi()) {
            range.enlarge(value);
        }
        *self
            .sensitive_counts
            .entry(tuple.sensitive().to_string())
            .or_insert(0) += 1;
        self.modified_at = now;
    }

    /// Absorbs every member of `other`; ranges become the bounding union.
    /// The caller discards `other` afterwards (ownership transfer is atomic
    /// from the arena's point of view).
    pub fn absorb(&mut self, other: &Cluster, now: u64) {
        self.members.extend(other.members.iter().copied());
        for (range, other_range) in self.ranges.iter_mut().zip(&other.ranges) {
            *range = range.merged(other_range);
        }
        for (value, count) in &other.sensitive_counts {
            *self.sensitive_counts.entry(value.clone()).or_insert(0) += count;
        }
        self.modified_at = now;
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Member tuple ids in ascending order.
    pub fn members(&self) -> &BTreeSet<u64> {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Number of distinct sensitive values among members (l-diversity input).
    pub fn distinct_sensitive(&self) -> usize {
        self.sensitive_counts.len()
    }

    /// Tight generalization ranges in schema order.
    pub fn ranges(&self) -> &[AttributeRange] {
        &self.ranges
    }

    /// Multiset of sensitive values over current members.
    pub fn sensitive_counts(&self) -> &BTreeMap<String, usize> {
        &self.sensitive_counts
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn modified_at(&self) -> u64 {
        self.modified_at
    }

    /// Scalar distortion of the current generalization.
    pub fn information_loss(&self, domains: &[AttributeDomain], weights: &[f64]) -> f64 {
        weighted_loss(&self.ranges, domains, weights)
    }

    /// Information loss the cluster would have after absorbing `other`.
    pub fn merged_loss(
        &self,
        other: &Cluster,
        domains: &[AttributeDomain],
        weights: &[f64],
    ) -> f64 {
        let union: Vec<AttributeRange> = self
            .ranges
            .iter()
            .zip(&other.ranges)
            .map(|(a, b)| a.merged(b))
            .collect();
        weighted_loss(&union, domains, weights)
    }

    /// The anonymized output record for one member tuple. Every member of the
    /// cluster receives identical ranges; only id and sensitive value differ.
    pub fn record_for(&self, tuple: &StreamTuple) -> GeneralizedRecord {
        GeneralizedRecord {
            tuple_id: tuple.id(),
            ranges: self.ranges.clone(),
            sensitive: tuple.sensitive().to_string(),
        }
    }
}

/// Arena of live clusters partitioned into big (size >= k) and small subsets,
/// with a tuple-to-cluster ownership index. Every mutation goes through this
/// type so the partition and the index stay consistent.
#[derive(Debug, Clone)]
pub struct ClusterSet {
    clusters: BTreeMap<ClusterId, Cluster>,
    big: BTreeSet<ClusterId>,
    small: BTreeSet<ClusterId>,
    owner: BTreeMap<u64, ClusterId>,
    next_id: u64,
    k: usize,
}

impl ClusterSet {
    /// Creates an empty arena partitioned at size `k`.
    pub fn new(k: usize) -> Self {
        Self {
            clusters: BTreeMap::new(),
            big: BTreeSet::new(),
            small: BTreeSet::new(),
            owner: BTreeMap::new(),
            next_id: 0,
            k,
        }
    }

    /// Allocates the next cluster id.
    pub fn allocate_id(&mut self) -> ClusterId {
        let id = ClusterId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Adds a fully built cluster (singleton creation or split fragment).
    pub fn add(&mut self, cluster: Cluster) {
        let id = cluster.id();
        for tuple_id in cluster.members() {
            self.owner.insert(*tuple_id, id);
        }
        self.partition(id, cluster.size());
        self.clusters.insert(id, cluster);
    }

    /// Inserts a tuple into an existing cluster, keeping partition and
    /// ownership index consistent.
    pub fn insert_tuple(&mut self, id: ClusterId, tuple: &StreamTuple, now: u64) {
        if let Some(cluster) = self.clusters.get_mut(&id) {
            cluster.insert(tuple, now);
            let size = cluster.size();
            self.owner.insert(tuple.id(), id);
            self.partition(id, size);
        }
    }

    /// Transfers all members of `source` into `target` and destroys `source`.
    pub fn absorb(&mut self, source: ClusterId, target: ClusterId, now: u64) {
        if source == target {
            return;
        }
        let Some(removed) = self.remove(source) else {
            return;
        };
        for tuple_id in removed.members() {
            self.owner.insert(*tuple_id, target);
        }
        if let Some(cluster) = self.clusters.get_mut(&target) {
            cluster.absorb(&removed, now);
            let size = cluster.size();
            self.partition(target, size);
        }
    }

    /// Removes a cluster from the arena, clearing its ownership entries.
    pub fn remove(&mut self, id: ClusterId) -> Option<Cluster> {
        let cluster = self.clusters.remove(&id)?;
        self.big.remove(&id);
        self.small.remove(&id);
        for tuple_id in cluster.members() {
            if self.owner.get(tuple_id) == Some(&id) {
                self.owner.remove(tuple_id);
            }
        }
        Some(cluster)
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(&id)
    }

    /// The cluster currently owning a tuple, if any.
    pub fn owner_of(&self, tuple_id: u64) -> Option<ClusterId> {
        self.owner.get(&tuple_id).copied()
    }

    /// Live clusters in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// Live cluster ids in ascending order.
    pub fn ids(&self) -> Vec<ClusterId> {
        self.clusters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Ids of clusters with size >= k.
    pub fn big(&self) -> &BTreeSet<ClusterId> {
        &self.big
    }

    /// Ids of clusters with size < k.
    pub fn small(&self) -> &BTreeSet<ClusterId> {
        &self.small
    }

    fn partition(&mut self, id: ClusterId, size: usize) {
        if size >= self.k {
            self.small.remove(&id);
            self.big.insert(id);
        } else {
            self.big.remove(&id);
            self.small.insert(id);
        }
    }
}
