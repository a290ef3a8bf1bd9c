//! Connected-component clustering of matching signatures.
//!
//! Two signatures are linked when their score reaches the threshold; clusters
//! are the connected components of that graph. Grouping is transitive: if
//! `a~b` and `b~c`, then `a`, `b` and `c` share a cluster even when `a` and `c`
//! do not match directly. Signatures without any link stay unclustered.
//!
//! Clusters hold identifiers only. Removing one member is a set update and never
//! touches the other members.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rayon::prelude::*;

use crate::matching::{compare, MatchEngine};
use crate::store::{SignatureId, SignatureStore};

/// Identifier of a cluster within one clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(usize);

impl ClusterId {
    /// Position of this cluster in the pass that created it.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster {}", self.0)
    }
}

/// A group of transitively similar signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    id: ClusterId,
    members: BTreeSet<SignatureId>,
}

impl Cluster {
    /// Identifier of this cluster.
    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Member identifiers in ascending order.
    pub fn members(&self) -> &BTreeSet<SignatureId> {
        &self.members
    }

    /// True if `id` belongs to this cluster.
    pub fn contains(&self, id: SignatureId) -> bool {
        self.members.contains(&id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if every member has been cleared.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Union-find with path compression and union by rank.
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Cluster membership for one clustering pass.
///
/// Each signature is either unassigned or assigned to exactly one cluster.
#[derive(Debug, Default)]
pub struct ClusterEngine {
    clusters: BTreeMap<ClusterId, Cluster>,
    membership: HashMap<SignatureId, ClusterId>,
}

impl ClusterEngine {
    /// Create an engine with no clusters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all clusters with the connected components of `signatures`
    /// linked at `score >= threshold`.
    ///
    /// Every unordered pair is scored; on the rayon pool when `parallel` is set.
    /// Unions run on this thread after scoring. Cluster identifiers follow the
    /// order of each cluster's smallest member. Duplicate identifiers in
    /// `signatures` are ignored.
    pub fn build_clusters(
        &mut self,
        store: &SignatureStore,
        signatures: &[SignatureId],
        threshold: u8,
        parallel: bool,
    ) -> Vec<Cluster> {
        self.clusters.clear();
        self.membership.clear();

        let ids: Vec<SignatureId> = signatures
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n = ids.len();

        let ids_ref = &ids;
        let linked = move |i: usize| {
            let a = &store[ids_ref[i]];
            (i + 1..n).filter_map(move |j| {
                (compare(a, &store[ids_ref[j]]) >= threshold).then_some((i, j))
            })
        };
        let edges: Vec<(usize, usize)> = if parallel {
            (0..n).into_par_iter().flat_map_iter(linked).collect()
        } else {
            (0..n).flat_map(linked).collect()
        };

        let mut sets = DisjointSet::new(n);
        for &(i, j) in &edges {
            sets.union(i, j);
        }

        let mut components: BTreeMap<usize, BTreeSet<SignatureId>> = BTreeMap::new();
        for &(i, j) in &edges {
            let root = sets.find(i);
            let members = components.entry(root).or_default();
            members.insert(ids[i]);
            members.insert(ids[j]);
        }

        let mut ordered: Vec<BTreeSet<SignatureId>> = components.into_values().collect();
        ordered.sort_unstable_by_key(|members| members.first().copied());
        for (k, members) in ordered.into_iter().enumerate() {
            let id = ClusterId(k);
            for &member in &members {
                self.membership.insert(member, id);
            }
            self.clusters.insert(id, Cluster { id, members });
        }

        tracing::debug!(
            signatures = n,
            links = edges.len(),
            clusters = self.clusters.len(),
            threshold,
            "clustering pass complete"
        );
        self.clusters.values().cloned().collect()
    }

    /// Cluster every signature known to `engine` at its configured threshold.
    pub fn build_from(&mut self, engine: &MatchEngine) -> Vec<Cluster> {
        let ids: Vec<SignatureId> = engine.store().ids().collect();
        let options = engine.options();
        self.build_clusters(engine.store(), &ids, options.threshold, options.parallel)
    }

    /// Cluster the signature `id` is assigned to, if any.
    pub fn cluster_of(&self, id: SignatureId) -> Option<ClusterId> {
        self.membership.get(&id).copied()
    }

    /// True if `id` is assigned to a cluster.
    pub fn has_cluster(&self, id: SignatureId) -> bool {
        self.membership.contains_key(&id)
    }

    /// Look up a cluster by identifier.
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(&id)
    }

    /// Current clusters in identifier order.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> + '_ {
        self.clusters.values()
    }

    /// Remove `id` from its cluster.
    ///
    /// Other members keep their cluster and identifier. A cluster whose last
    /// member is cleared is dropped. Returns `false` if `id` had no cluster.
    pub fn clear_cluster(&mut self, id: SignatureId) -> bool {
        let Some(cluster_id) = self.membership.remove(&id) else {
            return false;
        };
        if let Some(cluster) = self.clusters.get_mut(&cluster_id) {
            cluster.members.remove(&id);
            if cluster.members.is_empty() {
                self.clusters.remove(&cluster_id);
            }
        }
        true
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True if there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    const A: &str = "16:abcdefghijklmnop:x";
    const B: &str = "16:abcdefghijklWXYZ:x";
    const C: &str = "16:abcdefghSTUVWXYZ:x";
    const D: &str = "16:zzzzzzzzzzzzzzzz:x";

    fn store_of(lines: &[&str]) -> (SignatureStore, Vec<SignatureId>) {
        let mut store = SignatureStore::new();
        let ids = lines
            .iter()
            .enumerate()
            .map(|(i, l)| store.insert(Signature::parse(l, Some(&format!("f{i}")), None).unwrap()))
            .collect();
        (store, ids)
    }

    #[test]
    fn fixture_scores() {
        let (store, ids) = store_of(&[A, B, C]);
        assert_eq!(compare(&store[ids[0]], &store[ids[1]]), 75);
        assert_eq!(compare(&store[ids[1]], &store[ids[2]]), 75);
        assert_eq!(compare(&store[ids[0]], &store[ids[2]]), 50);
    }

    #[test]
    fn grouping_is_transitive() {
        let (store, ids) = store_of(&[A, B, C, D]);
        let mut engine = ClusterEngine::new();
        let clusters = engine.build_clusters(&store, &ids, 70, false);

        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.members().iter().copied().collect::<Vec<_>>(), ids[..3]);
        let cid = engine.cluster_of(ids[0]).unwrap();
        assert_eq!(engine.cluster_of(ids[1]), Some(cid));
        assert_eq!(engine.cluster_of(ids[2]), Some(cid));
    }

    #[test]
    fn singletons_are_not_clustered() {
        let (store, ids) = store_of(&[A, B, C, D]);
        let mut engine = ClusterEngine::new();
        engine.build_clusters(&store, &ids, 70, true);
        assert!(!engine.has_cluster(ids[3]));
        assert_eq!(engine.cluster_of(ids[3]), None);
    }

    #[test]
    fn higher_threshold_splits_clusters() {
        let (store, ids) = store_of(&[A, B, C]);
        let mut engine = ClusterEngine::new();
        assert_eq!(engine.build_clusters(&store, &ids, 76, false).len(), 0);
        assert_eq!(engine.build_clusters(&store, &ids, 50, false).len(), 1);
        assert!(engine.has_cluster(ids[0]));
        engine.build_clusters(&store, &ids, 100, false);
        assert!(engine.is_empty());
        assert!(!engine.has_cluster(ids[0]));
    }

    #[test]
    fn clear_cluster_leaves_siblings_intact() {
        let (store, ids) = store_of(&[A, B, C]);
        let mut engine = ClusterEngine::new();
        engine.build_clusters(&store, &ids, 70, false);
        let cid = engine.cluster_of(ids[1]).unwrap();

        assert!(engine.clear_cluster(ids[1]));
        assert!(!engine.has_cluster(ids[1]));
        assert_eq!(engine.cluster_of(ids[0]), Some(cid));
        assert_eq!(engine.cluster_of(ids[2]), Some(cid));
        let cluster = engine.cluster(cid).unwrap();
        assert_eq!(cluster.len(), 2);
        assert!(cluster.contains(ids[0]) && cluster.contains(ids[2]));
        assert!(!cluster.contains(ids[1]));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn clear_cluster_without_membership_is_noop() {
        let (store, ids) = store_of(&[A, D]);
        let mut engine = ClusterEngine::new();
        engine.build_clusters(&store, &ids, 70, false);
        assert!(!engine.clear_cluster(ids[1]));
        assert!(engine.is_empty());
    }

    #[test]
    fn clearing_every_member_drops_the_cluster() {
        let (store, ids) = store_of(&[A, B]);
        let mut engine = ClusterEngine::new();
        engine.build_clusters(&store, &ids, 70, false);
        let cid = engine.cluster_of(ids[0]).unwrap();
        engine.clear_cluster(ids[0]);
        assert_eq!(engine.cluster(cid).map(Cluster::len), Some(1));
        engine.clear_cluster(ids[1]);
        assert!(engine.cluster(cid).is_none());
    }

    #[test]
    fn cross_block_size_links_join_clusters() {
        let (store, ids) = store_of(&[
            "3:abcdefgh:qrstuvwx",
            "6:qrstuvwx:mmmm",
            "12:mmmm:nnnn",
            "3:zzzzzzzz:yyyyyyyy",
        ]);
        let mut engine = ClusterEngine::new();
        let clusters = engine.build_clusters(&store, &ids, 90, false);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
        assert!(!clusters[0].contains(ids[3]));
    }

    #[test]
    fn membership_does_not_depend_on_input_order() {
        let base = [
            "3:abcdefgh:x", "3:abcdefgX:x", "3:abcdeXgX:x",
            "3:qrstuvwx:x", "3:qrstuvwX:x", "3:mnmnmnmn:x",
            "6:ponmlkji:x", "6:ponmlkjX:x",
        ];
        let partition = |lines: &[&str]| {
            let (store, ids) = store_of(lines);
            let mut engine = ClusterEngine::new();
            let mut groups: Vec<Vec<String>> = engine
                .build_clusters(&store, &ids, 60, true)
                .iter()
                .map(|c| {
                    let mut g: Vec<String> = c
                        .members()
                        .iter()
                        .map(|&id| store[id].raw_signature().to_owned())
                        .collect();
                    g.sort();
                    g
                })
                .collect();
            groups.sort();
            groups
        };

        let expected = partition(&base);
        assert_eq!(expected.len(), 3);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let mut shuffled = base;
            shuffled.shuffle(&mut rng);
            assert_eq!(partition(&shuffled), expected);
        }
    }

    #[test]
    fn build_from_uses_engine_threshold() {
        let mut matcher = MatchEngine::new(crate::Options::default().with_threshold(70));
        for (i, line) in [A, B, C, D].iter().enumerate() {
            matcher.add(line, Some(&format!("f{i}")), None).unwrap();
        }
        let mut engine = ClusterEngine::new();
        let clusters = engine.build_from(&matcher);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
    }
}
