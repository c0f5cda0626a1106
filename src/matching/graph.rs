//! Per-group duplicate graph: accumulate records, link matching pairs, then
//! cluster and merge from a fixed edge snapshot.

use super::Matcher;
use super::union_find::UnionFind;
use crate::models::{AddressRecord, MergedRecord};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How linked records are grouped into clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Connected components: records linked through intermediaries merge.
    #[default]
    Connected,
    /// A record joins the earliest cluster whose every member it matches directly.
    Direct,
}

impl Linkage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Node indices in insertion order.
    pub members: Vec<usize>,
    /// At least one pair of members does not match directly.
    pub chained: bool,
}

fn edge(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Partition nodes `0..n` into clusters. `edges` decides connectivity;
/// `direct` answers whether two nodes of the same component match, since
/// pairs that never shared a group carry no edge either way.
pub fn cluster<F>(
    n: usize,
    edges: &HashSet<(usize, usize)>,
    linkage: Linkage,
    direct: F,
) -> Vec<Cluster>
where
    F: Fn(usize, usize) -> bool,
{
    let mut uf: UnionFind<usize> = UnionFind::new();
    for i in 0..n {
        uf.make_set(i);
    }
    for &(a, b) in edges {
        uf.union(&a, &b);
    }
    let linked = |a: usize, b: usize| edges.contains(&edge(a, b)) || direct(a, b);

    let mut clusters = Vec::new();
    for members in uf.groups() {
        match linkage {
            Linkage::Connected => {
                let chained = members
                    .iter()
                    .enumerate()
                    .any(|(x, &a)| members[x + 1..].iter().any(|&b| !linked(a, b)));
                clusters.push(Cluster { members, chained });
            }
            Linkage::Direct => {
                let mut split: Vec<Vec<usize>> = Vec::new();
                for &i in &members {
                    let home = split
                        .iter()
                        .position(|c| c.iter().all(|&j| linked(i, j)));
                    match home {
                        Some(ci) => split[ci].push(i),
                        None => split.push(vec![i]),
                    }
                }
                clusters.extend(split.into_iter().map(|members| Cluster {
                    members,
                    chained: false,
                }));
            }
        }
    }
    clusters.sort_by_key(|c| c.members[0]);
    clusters
}

/// Nodes are keyed by record hash; the first record seen for a hash wins.
#[derive(Debug, Default)]
pub struct DuplicateGraph {
    records: Vec<AddressRecord>,
    index: HashMap<String, usize>,
    edges: HashSet<(usize, usize)>,
    repeated: usize,
    linked: usize,
}

impl DuplicateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns its index and whether it was new.
    pub fn add(&mut self, record: AddressRecord) -> (usize, bool) {
        if let Some(&i) = self.index.get(&record.hash) {
            self.repeated += 1;
            return (i, false);
        }
        let i = self.records.len();
        self.index.insert(record.hash.clone(), i);
        self.records.push(record);
        (i, true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AddressRecord] {
        &self.records
    }

    /// Records dropped because their hash was already present.
    pub fn repeated_hashes(&self) -> usize {
        self.repeated
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn add_edge(&mut self, a: usize, b: usize) -> bool {
        if a == b || a >= self.records.len() || b >= self.records.len() {
            return false;
        }
        self.edges.insert(edge(a, b))
    }

    /// Evaluate the matcher on every pair of nodes not yet compared. Returns
    /// the number of new edges.
    pub fn link<M: Matcher + ?Sized>(&mut self, matcher: &M) -> usize {
        let before = self.edges.len();
        let n = self.records.len();
        for j in self.linked.max(1)..n {
            for i in 0..j {
                if matcher.matches(&self.records[i], &self.records[j]) {
                    self.edges.insert((i, j));
                }
            }
        }
        self.linked = n;
        self.edges.len() - before
    }

    /// Fold another graph in, mapping its nodes by hash and keeping its edges.
    /// Pairs already compared in either graph are not compared again.
    pub fn absorb(&mut self, other: DuplicateGraph) {
        let DuplicateGraph {
            records, edges, ..
        } = other;
        let mapped: Vec<usize> = records.into_iter().map(|r| self.add(r).0).collect();
        for (a, b) in edges {
            self.add_edge(mapped[a], mapped[b]);
        }
        self.linked = self.records.len();
    }

    /// Clusters from the edge snapshot. Pairs within a component that have
    /// no edge are checked with `matcher`.
    pub fn clusters<M: Matcher + ?Sized>(&self, linkage: Linkage, matcher: &M) -> Vec<Cluster> {
        cluster(self.records.len(), &self.edges, linkage, |a, b| {
            matcher.matches(&self.records[a], &self.records[b])
        })
    }

    /// One merged record per cluster, in order of each cluster's first member.
    pub fn merge<M: Matcher + ?Sized>(
        &self,
        linkage: Linkage,
        matcher: &M,
    ) -> Vec<MergedRecord> {
        self.clusters(linkage, matcher)
            .iter()
            .filter_map(|c| {
                let members: Vec<&AddressRecord> =
                    c.members.iter().map(|&i| &self.records[i]).collect();
                MergedRecord::from_members(&members, c.chained)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{AddressMatcher, FnMatcher};
    use crate::models::tests::rec;

    fn graph_of(records: Vec<AddressRecord>) -> DuplicateGraph {
        let mut g = DuplicateGraph::new();
        for r in records {
            g.add(r);
        }
        g
    }

    #[test]
    fn duplicate_hash_keeps_first_record() {
        let mut g = DuplicateGraph::new();
        assert!(g.add(rec("h", "1", "A St", "", 0.0, 0.0)).1);
        let (i, fresh) = g.add(rec("h", "9", "B St", "", 5.0, 5.0));
        assert!(!fresh);
        assert_eq!(i, 0);
        assert_eq!(g.len(), 1);
        assert_eq!(g.records()[0].number, "1");
        assert_eq!(g.repeated_hashes(), 1);
    }

    #[test]
    fn chained_records_form_one_component() {
        // A~B and B~C but not A~C.
        let pairs = [("a", "b"), ("b", "c")];
        let m = FnMatcher(move |x: &AddressRecord, y: &AddressRecord| {
            pairs
                .iter()
                .any(|&(p, q)| (x.hash == p && y.hash == q) || (x.hash == q && y.hash == p))
        });
        let mut g = graph_of(vec![
            rec("a", "1", "A St", "", 0.0, 0.0),
            rec("b", "1", "A St", "", 10.0, 0.0),
            rec("c", "1", "A St", "", 20.0, 0.0),
        ]);
        assert_eq!(g.link(&m), 2);
        let merged = g.merge(Linkage::Connected, &m);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].count, 3);
        assert!(merged[0].chained);

        let direct = g.merge(Linkage::Direct, &m);
        assert_eq!(direct.iter().map(|m| m.count).collect::<Vec<_>>(), vec![2, 1]);
        assert!(direct.iter().all(|m| !m.chained));
    }

    #[test]
    fn no_matches_gives_singletons() {
        let mut g = graph_of(vec![
            rec("a", "1", "A St", "", 0.0, 0.0),
            rec("b", "2", "A St", "", 0.0, 0.0),
            rec("c", "3", "A St", "", 0.0, 0.0),
            rec("d", "3", "B St", "", 0.0, 0.0),
        ]);
        assert_eq!(g.link(&AddressMatcher), 0);
        let merged = g.merge(Linkage::Connected, &AddressMatcher);
        assert_eq!(merged.len(), 4);
        assert!(merged.iter().all(|m| m.count == 1 && m.radius.is_none()));
    }

    #[test]
    fn matching_pair_is_merged_with_radius() {
        let mut g = graph_of(vec![
            rec("a", "7", "Oak Ave", "", 0.0, 0.0),
            rec("z", "8", "Oak Ave", "", 40.0, 0.0),
            rec("b", "7", "oak avenue", "", 100.0, 0.0),
        ]);
        g.link(&AddressMatcher);
        let merged = g.merge(Linkage::Connected, &AddressMatcher);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].number, "7");
        assert_eq!(merged[0].street, "Oak Ave");
        assert_eq!(merged[0].count, 2);
        assert_eq!((merged[0].x, merged[0].y), (50.0, 0.0));
        assert_eq!(merged[0].radius, Some(50.0));
        assert!(!merged[0].chained);
        assert_eq!(merged[1].count, 1);
    }

    #[test]
    fn empty_graph_emits_nothing() {
        let mut g = DuplicateGraph::new();
        assert_eq!(g.link(&AddressMatcher), 0);
        assert!(g.merge(Linkage::Connected, &AddressMatcher).is_empty());
    }

    #[test]
    fn absorb_unions_across_graphs() {
        let mut one = graph_of(vec![
            rec("a", "1", "A St", "", 0.0, 0.0),
            rec("b", "1", "A St", "", 10.0, 0.0),
        ]);
        one.link(&AddressMatcher);
        let mut two = graph_of(vec![
            rec("b", "1", "A St", "", 10.0, 0.0),
            rec("c", "1", "A St", "", 20.0, 0.0),
        ]);
        two.link(&AddressMatcher);

        let mut global = DuplicateGraph::new();
        global.absorb(one);
        global.absorb(two);
        assert_eq!(global.len(), 3);
        assert_eq!(global.edge_count(), 2);
        let merged = global.merge(Linkage::Connected, &AddressMatcher);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].count, 3);
        // a and c never shared a group but still match each other.
        assert!(!merged[0].chained);
        let direct = global.merge(Linkage::Direct, &AddressMatcher);
        assert_eq!(direct.iter().map(|m| m.count).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn absorbed_pairs_without_edges_use_the_matcher() {
        // Only pairs involving b match, and a and c never share a group.
        let m = FnMatcher(|x: &AddressRecord, y: &AddressRecord| {
            x.hash == "b" || y.hash == "b"
        });
        let mut one = graph_of(vec![
            rec("a", "1", "A St", "", 0.0, 0.0),
            rec("b", "1", "A St", "", 10.0, 0.0),
        ]);
        one.link(&m);
        let mut two = graph_of(vec![
            rec("b", "1", "A St", "", 10.0, 0.0),
            rec("c", "1", "A St", "", 20.0, 0.0),
        ]);
        two.link(&m);

        let mut global = DuplicateGraph::new();
        global.absorb(one);
        global.absorb(two);
        let merged = global.merge(Linkage::Connected, &m);
        assert_eq!(merged[0].count, 3);
        assert!(merged[0].chained);
        let direct = global.merge(Linkage::Direct, &m);
        assert_eq!(direct.iter().map(|m| m.count).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn incremental_link_only_compares_new_pairs() {
        let mut g = graph_of(vec![
            rec("a", "1", "A St", "", 0.0, 0.0),
            rec("b", "1", "A St", "", 0.0, 0.0),
        ]);
        assert_eq!(g.link(&AddressMatcher), 1);
        g.add(rec("c", "1", "A St", "", 0.0, 0.0));
        assert_eq!(g.link(&AddressMatcher), 2);
        assert_eq!(g.edge_count(), 3);
        assert!(!g.merge(Linkage::Connected, &AddressMatcher)[0].chained);
    }

    #[test]
    fn cluster_counts_internal_edges() {
        let edges: HashSet<(usize, usize)> =
            [(0, 1), (1, 2), (0, 2), (3, 4)].into_iter().collect();
        let clusters = cluster(6, &edges, Linkage::Connected, |_, _| false);
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
        assert!(!clusters[0].chained);
        assert_eq!(clusters[1].members, vec![3, 4]);
        assert_eq!(clusters[2].members, vec![5]);

        let path: HashSet<(usize, usize)> = [(0, 1), (1, 2)].into_iter().collect();
        assert!(cluster(3, &path, Linkage::Connected, |_, _| false)[0].chained);
        assert!(!cluster(3, &path, Linkage::Connected, |_, _| true)[0].chained);
    }
}
