//! Hash-keyed disjoint-set forest with path compression and union by size.
//!
//! Elements remember the order in which they were first added so that
//! [`UnionFind::groups`] is deterministic, which keeps merged output stable
//! from run to run.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct UnionFind<K> {
    index: HashMap<K, usize>,
    keys: Vec<K>,
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl<K> Default for UnionFind<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            keys: Vec::new(),
            parent: Vec::new(),
            size: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> UnionFind<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Add `key` as a singleton set. Returns false if it was already present.
    pub fn make_set(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let slot = self.keys.len();
        self.index.insert(key.clone(), slot);
        self.keys.push(key);
        self.parent.push(slot);
        self.size.push(1);
        true
    }

    fn root(&mut self, mut slot: usize) -> usize {
        let mut top = slot;
        while self.parent[top] != top {
            top = self.parent[top];
        }
        while self.parent[slot] != top {
            let next = self.parent[slot];
            self.parent[slot] = top;
            slot = next;
        }
        top
    }

    /// Representative key of the set containing `key`, or `None` if unknown.
    pub fn find(&mut self, key: &K) -> Option<K> {
        let slot = *self.index.get(key)?;
        let top = self.root(slot);
        Some(self.keys[top].clone())
    }

    /// Merge the sets of `a` and `b`. Unknown keys are added first.
    pub fn union(&mut self, a: &K, b: &K) {
        self.make_set(a.clone());
        self.make_set(b.clone());
        let ra = self.root(self.index[a]);
        let rb = self.root(self.index[b]);
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }

    pub fn connected(&mut self, a: &K, b: &K) -> bool {
        match (self.index.get(a).copied(), self.index.get(b).copied()) {
            (Some(sa), Some(sb)) => self.root(sa) == self.root(sb),
            _ => false,
        }
    }

    /// All sets, each listed in insertion order, ordered by their earliest member.
    pub fn groups(&mut self) -> Vec<Vec<K>> {
        let mut by_root: HashMap<usize, usize> = HashMap::new();
        let mut out: Vec<Vec<K>> = Vec::new();
        for slot in 0..self.keys.len() {
            let top = self.root(slot);
            let at = *by_root.entry(top).or_insert_with(|| {
                out.push(Vec::new());
                out.len() - 1
            });
            out[at].push(self.keys[slot].clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_operations() {
        let mut uf: UnionFind<i32> = UnionFind::new();
        uf.make_set(1);
        uf.make_set(2);
        uf.make_set(3);
        assert!(!uf.connected(&1, &2));
        uf.union(&1, &2);
        assert!(uf.connected(&1, &2));
        assert!(!uf.connected(&1, &3));
    }

    #[test]
    fn make_set_is_idempotent() {
        let mut uf: UnionFind<&str> = UnionFind::new();
        assert!(uf.make_set("a"));
        assert!(!uf.make_set("a"));
        assert_eq!(uf.len(), 1);
    }

    #[test]
    fn chain_shares_one_root() {
        let mut uf: UnionFind<i32> = UnionFind::new();
        for i in 1..=4 {
            uf.make_set(i);
        }
        uf.union(&1, &2);
        uf.union(&2, &3);
        uf.union(&3, &4);
        let root = uf.find(&1);
        assert!(root.is_some());
        assert_eq!(uf.find(&2), root);
        assert_eq!(uf.find(&3), root);
        assert_eq!(uf.find(&4), root);
        assert_eq!(uf.find(&9), None);
    }

    #[test]
    fn groups_follow_insertion_order() {
        let mut uf: UnionFind<String> = UnionFind::new();
        for k in ["d", "a", "b", "c"] {
            uf.make_set(k.to_string());
        }
        uf.union(&"c".to_string(), &"d".to_string());
        uf.union(&"a".to_string(), &"b".to_string());
        let groups = uf.groups();
        assert_eq!(
            groups,
            vec![
                vec!["d".to_string(), "c".to_string()],
                vec!["a".to_string(), "b".to_string()],
            ]
        );
    }

    #[test]
    fn union_adds_unknown_keys() {
        let mut uf: UnionFind<u8> = UnionFind::new();
        uf.union(&7, &8);
        assert_eq!(uf.len(), 2);
        assert!(uf.connected(&8, &7));
    }
}
