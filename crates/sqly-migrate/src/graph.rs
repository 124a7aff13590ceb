//! The migration dependency graph.
//!
//! Edges run from dependency to dependent. Building the graph verifies
//! acyclicity and then keeps only the transitive reduction (the minimal edge
//! set with the same reachability relation), which keeps ancestor and
//! descendant queries cheap and dependency listings uncluttered. All
//! orderings are lexicographic by key, so apply and listing order is
//! reproducible across runs and machines.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{MigrateError, Result};
use crate::migration::Migration;

/// A directed acyclic graph of migration keys, stored as its transitive
/// reduction.
#[derive(Debug, Clone, Default)]
pub struct MigrationGraph {
    nodes: BTreeSet<String>,
    successors: BTreeMap<String, BTreeSet<String>>,
    predecessors: BTreeMap<String, BTreeSet<String>>,
}

impl MigrationGraph {
    /// Builds the graph for a migration set: one node per key, one edge per
    /// declared dependency (dependency -> dependent). Dependency keys that
    /// are not in the set still become nodes; resolving them is the store's
    /// concern, not the graph's.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::CyclicDependency`] carrying the raw adjacency
    /// map if the declarations form a cycle. A cycle is never silently
    /// broken.
    pub fn build(migrations: &BTreeMap<String, Migration>) -> Result<Self> {
        let mut graph = Self::default();
        for (key, migration) in migrations {
            graph.add_node(key);
            for depend in &migration.depends {
                graph.add_node(depend);
                graph.add_edge(depend, key);
            }
        }

        if graph.lexicographic_topological_sort().len() != graph.nodes.len() {
            let adjacency = migrations
                .iter()
                .map(|(key, migration)| (key.clone(), migration.depends.clone()))
                .collect();
            return Err(MigrateError::CyclicDependency { adjacency });
        }

        graph.reduce();
        Ok(graph)
    }

    /// Whether `key` is a node of the graph.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains(key)
    }

    /// The node count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The leaf keys: nodes nothing depends on, in lexicographic order.
    #[must_use]
    pub fn leaves(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|key| self.successors.get(*key).map_or(true, BTreeSet::is_empty))
            .cloned()
            .collect()
    }

    /// Every key reachable backwards from `key` (its transitive
    /// dependencies).
    pub fn ancestors(&self, key: &str) -> Result<BTreeSet<String>> {
        self.reach(key, &self.predecessors)
    }

    /// Every key reachable forwards from `key` (everything that depends on
    /// it, transitively).
    pub fn descendants(&self, key: &str) -> Result<BTreeSet<String>> {
        self.reach(key, &self.successors)
    }

    /// The subgraph induced by `keys`: those nodes and the edges between
    /// them.
    #[must_use]
    pub fn subgraph(&self, keys: &BTreeSet<String>) -> Self {
        let mut sub = Self::default();
        for key in keys {
            if !self.nodes.contains(key) {
                continue;
            }
            sub.add_node(key);
            if let Some(successors) = self.successors.get(key) {
                for successor in successors {
                    if keys.contains(successor) {
                        sub.add_node(successor);
                        sub.add_edge(key, successor);
                    }
                }
            }
        }
        sub
    }

    /// All keys in lexicographic topological order: dependencies first, ties
    /// broken by key string (Kahn's algorithm with an ordered frontier).
    ///
    /// On a graph with cycles the result is shorter than the node count;
    /// [`MigrationGraph::build`] relies on that to detect cycles, and every
    /// graph it returns sorts completely.
    #[must_use]
    pub fn lexicographic_topological_sort(&self) -> Vec<String> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|key| {
                let degree = self.predecessors.get(key).map_or(0, BTreeSet::len);
                (key.as_str(), degree)
            })
            .collect();

        // BTreeSet frontier: pop_first always yields the smallest key.
        let mut frontier: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(key, _)| *key)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(key) = frontier.pop_first() {
            order.push(key.to_string());
            if let Some(successors) = self.successors.get(key) {
                for successor in successors {
                    if let Some(degree) = in_degree.get_mut(successor.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            frontier.insert(successor.as_str());
                        }
                    }
                }
            }
        }
        order
    }

    fn add_node(&mut self, key: &str) {
        self.nodes.insert(key.to_string());
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        self.successors
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.predecessors
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(successors) = self.successors.get_mut(from) {
            successors.remove(to);
        }
        if let Some(predecessors) = self.predecessors.get_mut(to) {
            predecessors.remove(from);
        }
    }

    /// Transitive reduction: an edge `u -> v` is redundant iff `v` is also
    /// reachable through some other direct successor of `u`.
    fn reduce(&mut self) {
        let nodes: Vec<String> = self.nodes.iter().cloned().collect();
        for node in &nodes {
            let direct: Vec<String> = self
                .successors
                .get(node)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            let mut redundant: BTreeSet<String> = BTreeSet::new();
            for successor in &direct {
                // descendants errs only on unknown keys; successor is a node
                if let Ok(reachable) = self.descendants(successor) {
                    for target in reachable {
                        if direct.contains(&target) {
                            redundant.insert(target);
                        }
                    }
                }
            }
            for target in redundant {
                self.remove_edge(node, &target);
            }
        }
    }

    fn reach(
        &self,
        key: &str,
        edges: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<BTreeSet<String>> {
        if !self.nodes.contains(key) {
            return Err(MigrateError::NodeNotFound(key.to_string()));
        }
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([key]);
        while let Some(current) = queue.pop_front() {
            if let Some(next) = edges.get(current) {
                for neighbor in next {
                    if seen.insert(neighbor.clone()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        Ok(seen)
    }
}
