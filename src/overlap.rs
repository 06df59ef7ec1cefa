//! Overlap graph over supervision groups.
//!
//! Groups are joined when they share a project id, share a supervisor key, or
//! hold a pair of projects scoring at or above the overlap cutoff. Connected
//! components are found with a path-compressed disjoint set.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::model::SupervisionGroup;
use crate::similarity::SimilarPair;

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, item: usize) -> usize {
        let mut root = item;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = item;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// The smaller index becomes the root so roots stay at first-seen groups.
    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (low, high) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[high] = low;
        }
    }
}

/// Connected components as indices into the group slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlapComponents {
    /// Components with two or more groups, ordered by their first group.
    pub clusters: Vec<Vec<usize>>,
    /// Groups with no overlap edge, in group order.
    pub singletons: Vec<usize>,
}

impl OverlapComponents {
    pub fn component_count(&self) -> usize {
        self.clusters.len() + self.singletons.len()
    }
}

fn join_by_key<K: std::hash::Hash + Eq>(
    set: &mut DisjointSet,
    owners: impl Iterator<Item = (K, usize)>,
) {
    let mut first_owner: HashMap<K, usize> = HashMap::new();
    for (key, group) in owners {
        match first_owner.get(&key) {
            Some(&owner) => set.union(owner, group),
            None => {
                first_owner.insert(key, group);
            }
        }
    }
}

pub fn build_overlap_components(
    groups: &[SupervisionGroup],
    pairs: Option<&[SimilarPair]>,
    cutoff: f64,
) -> OverlapComponents {
    let mut set = DisjointSet::new(groups.len());

    join_by_key(
        &mut set,
        groups.iter().enumerate().flat_map(|(index, group)| {
            group.projects.iter().map(move |project| (project.as_str(), index))
        }),
    );
    join_by_key(
        &mut set,
        groups.iter().enumerate().flat_map(|(index, group)| {
            group
                .supervisors
                .iter()
                .map(move |supervisor| (supervisor.as_str(), index))
        }),
    );

    if let Some(pairs) = pairs {
        let mut owner_of: HashMap<&str, usize> = HashMap::new();
        for (index, group) in groups.iter().enumerate() {
            for project in &group.projects {
                owner_of.entry(project.as_str()).or_insert(index);
            }
        }
        for pair in pairs.iter().filter(|pair| pair.score >= cutoff) {
            if let (Some(&a), Some(&b)) = (
                owner_of.get(pair.project1_id.as_str()),
                owner_of.get(pair.project2_id.as_str()),
            ) {
                set.union(a, b);
            }
        }
    }

    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    for index in 0..groups.len() {
        let root = set.find(index);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            members.push(Vec::new());
            members.len() - 1
        });
        members[slot].push(index);
    }

    let mut components = OverlapComponents::default();
    for component in members {
        if component.len() == 1 {
            components.singletons.push(component[0]);
        } else {
            components.clusters.push(component);
        }
    }

    debug!(
        clusters = components.clusters.len(),
        singletons = components.singletons.len(),
        "built overlap components"
    );
    components
}
