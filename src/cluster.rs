//! Partitioning of non-depot nodes into per-salesman groups.
//!
//! The deterministic round-robin grouping seeds the balance constraints of the
//! exact model; the randomized even split seeds (and re-seeds, during
//! crossover) the individuals of the genetic algorithm.

use crate::instance::Instance;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How exclusivity sets (`Vk`) are treated when grouping nodes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterPolicy {
    /// Exclusivity sets are ignored: every non-depot node is grouped freely.
    #[default]
    Ignore,
    /// Salesman `k` always owns `Vk`; only the shared pool `U` is distributed.
    Enforce,
}

/// Mapping salesman index (1-based) -> ordered node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    groups: Vec<Vec<usize>>,
}

impl ClusterAssignment {
    pub fn from_groups(groups: Vec<Vec<usize>>) -> Self {
        ClusterAssignment { groups }
    }

    pub fn salesmen(&self) -> usize {
        self.groups.len()
    }

    /// Group of salesman `k` (1-based).
    pub fn group(&self, salesman: usize) -> &[usize] {
        salesman
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .map(|g| g.as_slice())
            .unwrap_or(&[])
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Vec<usize>> {
        self.groups
    }

    /// Salesman (1-based) whose group contains `node`
    pub fn salesman_of(&self, node: usize) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.contains(&node))
            .map(|i| i + 1)
    }

    /// Difference between the largest and the smallest group.
    pub fn size_spread(&self) -> usize {
        let max = self.groups.iter().map(Vec::len).max().unwrap_or(0);
        let min = self.groups.iter().map(Vec::len).min().unwrap_or(0);
        max - min
    }

    /// True when every id of `nodes` appears in exactly one group and groups
    /// hold nothing else.
    pub fn is_partition_of(&self, nodes: &[usize]) -> bool {
        let expected: HashSet<usize> = nodes.iter().copied().collect();
        let mut seen = HashSet::with_capacity(expected.len());
        for &id in self.groups.iter().flatten() {
            if !expected.contains(&id) || !seen.insert(id) {
                return false;
            }
        }
        seen.len() == expected.len()
    }
}

/// Node at position `i` goes to salesman `(i mod m) + 1`.
pub fn round_robin(nodes: &[usize], salesmen: usize) -> ClusterAssignment {
    let mut groups = vec![Vec::with_capacity(nodes.len() / salesmen.max(1) + 1); salesmen];
    if salesmen == 0 {
        return ClusterAssignment { groups };
    }
    for (i, &id) in nodes.iter().enumerate() {
        groups[i % salesmen].push(id);
    }
    ClusterAssignment { groups }
}

/// Contiguous divmod split: the first `n mod m` groups receive one extra node.
pub fn split_evenly(nodes: &[usize], salesmen: usize) -> Vec<Vec<usize>> {
    if salesmen == 0 {
        return Vec::new();
    }
    let (k, r) = (nodes.len() / salesmen, nodes.len() % salesmen);
    (0..salesmen)
        .map(|i| {
            let start = i * k + i.min(r);
            let end = (i + 1) * k + (i + 1).min(r);
            nodes[start..end].to_vec()
        })
        .collect()
}

/// Shuffle `nodes` with `rng`, then split evenly.
pub fn even_split<R: Rng + ?Sized>(nodes: &[usize], salesmen: usize, rng: &mut R) -> ClusterAssignment {
    let mut shuffled = nodes.to_vec();
    shuffled.shuffle(rng);
    ClusterAssignment {
        groups: split_evenly(&shuffled, salesmen),
    }
}

/// Instance-aware grouping that honours the configured [`ClusterPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct ClusterAssigner<'a> {
    instance: &'a Instance,
    policy: ClusterPolicy,
}

impl<'a> ClusterAssigner<'a> {
    pub fn new(instance: &'a Instance, policy: ClusterPolicy) -> Self {
        ClusterAssigner { instance, policy }
    }

    pub fn policy(&self) -> ClusterPolicy {
        self.policy
    }

    /// Nodes that may be moved between salesmen.
    pub fn free_nodes(&self) -> Vec<usize> {
        match self.policy {
            ClusterPolicy::Ignore => self.instance.customers(),
            ClusterPolicy::Enforce => self.instance.unassigned.clone(),
        }
    }

    /// Whether `node` may be moved between salesmen.
    pub fn is_free(&self, node: usize) -> bool {
        self.policy == ClusterPolicy::Ignore || self.instance.exclusive_owner(node).is_none()
    }

    /// Deterministic grouping in raw node order.
    pub fn round_robin(&self) -> ClusterAssignment {
        let free = round_robin(&self.free_nodes(), self.instance.salesmen);
        self.with_exclusive(free.into_groups(), None::<&mut rand_chacha::ChaCha8Rng>)
    }

    /// Random grouping: shuffled free nodes split evenly. Under
    /// [`ClusterPolicy::Enforce`] each group is then merged with its `Vk`
    /// and reshuffled so that the visiting order is random too.
    pub fn even_split<R: Rng + ?Sized>(&self, rng: &mut R) -> ClusterAssignment {
        let free = even_split(&self.free_nodes(), self.instance.salesmen, rng);
        self.with_exclusive(free.into_groups(), Some(rng))
    }

    /// Re-split an arbitrary pool of free nodes (used by crossover).
    pub fn resplit<R: Rng + ?Sized>(&self, pool: &[usize], rng: &mut R) -> ClusterAssignment {
        let free = even_split(pool, self.instance.salesmen, rng);
        self.with_exclusive(free.into_groups(), Some(rng))
    }

    fn with_exclusive<R: Rng + ?Sized>(&self, free: Vec<Vec<usize>>, rng: Option<&mut R>) -> ClusterAssignment {
        if self.policy == ClusterPolicy::Ignore || !self.instance.has_clusters() {
            return ClusterAssignment { groups: free };
        }
        let mut groups: Vec<Vec<usize>> = free
            .into_iter()
            .enumerate()
            .map(|(i, shared)| {
                let mut group = self.instance.cluster(i + 1).to_vec();
                group.extend(shared);
                group
            })
            .collect();
        if let Some(rng) = rng {
            for group in &mut groups {
                group.shuffle(rng);
            }
        }
        ClusterAssignment { groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use crate::instance::Node;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    #[test]
    fn test_round_robin() {
        let a = round_robin(&[2, 3, 4, 5, 6], 2);
        assert_eq!(a.group(1), &[2, 4, 6]);
        assert_eq!(a.group(2), &[3, 5]);
        assert_eq!(a.group(3), &[] as &[usize]);
        assert_eq!(a.salesman_of(5), Some(2));
        assert!(a.is_partition_of(&[2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_round_robin_is_stable() {
        let nodes: Vec<usize> = (2..40).collect();
        assert_eq!(round_robin(&nodes, 7), round_robin(&nodes, 7));
    }

    #[test]
    fn test_split_evenly_sizes() {
        let groups = split_evenly(&[1, 2, 3, 4, 5, 6, 7], 3);
        assert_eq!(groups, vec![vec![1, 2, 3], vec![4, 5], vec![6, 7]]);

        let groups = split_evenly(&[1, 2], 4);
        assert_eq!(groups.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_partition_detection() {
        let a = ClusterAssignment::from_groups(vec![vec![2, 3], vec![3]]);
        assert!(!a.is_partition_of(&[2, 3]));
        let b = ClusterAssignment::from_groups(vec![vec![2], vec![]]);
        assert!(!b.is_partition_of(&[2, 3]));
    }

    fn clustered_instance() -> Instance {
        let nodes = (1..=8).map(|i| Node::new(i, i as f64, 0.0)).collect();
        let clusters: BTreeMap<usize, Vec<usize>> = [(1, vec![2, 3]), (2, vec![8])].into_iter().collect();
        Instance::new("c", nodes, 1, 2, clusters, &Metric::Euclidean).unwrap()
    }

    #[test]
    fn test_enforced_round_robin_keeps_exclusive_sets() {
        let inst = clustered_instance();
        let assigner = ClusterAssigner::new(&inst, ClusterPolicy::Enforce);
        let a = assigner.round_robin();
        assert_eq!(a.group(1), &[2, 3, 4, 6]);
        assert_eq!(a.group(2), &[8, 5, 7]);
        assert!(a.is_partition_of(&inst.customers()));
    }

    #[test]
    fn test_enforced_even_split_keeps_exclusive_sets() {
        let inst = clustered_instance();
        let assigner = ClusterAssigner::new(&inst, ClusterPolicy::Enforce);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            let a = assigner.even_split(&mut rng);
            assert!(a.is_partition_of(&inst.customers()));
            assert_eq!(a.salesman_of(2), Some(1));
            assert_eq!(a.salesman_of(3), Some(1));
            assert_eq!(a.salesman_of(8), Some(2));
        }
        assert!(!assigner.is_free(8));
        assert!(assigner.is_free(5));
    }

    #[test]
    fn test_ignore_policy_ignores_sets() {
        let inst = clustered_instance();
        let assigner = ClusterAssigner::new(&inst, ClusterPolicy::Ignore);
        assert_eq!(assigner.round_robin(), round_robin(&inst.customers(), 2));
        assert!(assigner.is_free(8));
    }

    proptest::proptest! {
        #[test]
        fn prop_round_robin_partitions(n in 0usize..60, m in 1usize..9) {
            let nodes: Vec<usize> = (2..n + 2).collect();
            let a = round_robin(&nodes, m);
            proptest::prop_assert_eq!(a.salesmen(), m);
            proptest::prop_assert!(a.is_partition_of(&nodes));
            proptest::prop_assert!(a.size_spread() <= 1);
        }

        #[test]
        fn prop_even_split_partitions(n in 0usize..60, m in 1usize..9, seed in 0u64..1000) {
            let nodes: Vec<usize> = (2..n + 2).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let a = even_split(&nodes, m, &mut rng);
            proptest::prop_assert_eq!(a.salesmen(), m);
            proptest::prop_assert!(a.is_partition_of(&nodes));
            proptest::prop_assert!(a.size_spread() <= 1);
        }
    }
}
