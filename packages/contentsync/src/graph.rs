//! Dependency graph with pass-based topological ordering.
//!
//! Nodes are caller-supplied keys; edges are "depends-on" links. Edges to
//! keys that were never added as nodes are external dependencies and are
//! treated as already satisfied.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::error::{Result, SyncError};

/// Directed depends-on graph over keys of type `K`.
#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    /// Nodes in insertion order.
    nodes: Vec<K>,
    index: HashMap<K, usize>,
    /// Outgoing depends-on edges, parallel to `nodes`.
    edges: Vec<Vec<K>>,
}

impl<K> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        }
    }
}

impl<K> DependencyGraph<K>
where
    K: Clone + Eq + Hash + fmt::Display,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, key: K) {
        self.position_or_insert(key);
    }

    /// Record that `node` depends on `dependency`.
    ///
    /// `node` is added if missing; `dependency` is not, so dependencies that
    /// never become nodes stay external.
    pub fn add_dependency(&mut self, node: K, dependency: K) {
        let position = self.position_or_insert(node);
        let edges = &mut self.edges[position];
        if !edges.contains(&dependency) {
            edges.push(dependency);
        }
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a node.
    #[must_use]
    pub fn dependencies_of(&self, key: &K) -> &[K] {
        self.index
            .get(key)
            .map(|&position| self.edges[position].as_slice())
            .unwrap_or_default()
    }

    /// Order all nodes so that each appears after everything it depends on.
    ///
    /// Works in passes: a node is placed in a pass when every dependency that
    /// is itself a node was placed in an earlier pass. Nodes placed in the
    /// same pass keep insertion order.
    ///
    /// # Errors
    /// Returns `DependencyCycle` naming every node that could not be placed.
    /// No partial order is returned.
    pub fn get_dependencies(&self) -> Result<Vec<K>> {
        let mut placed: HashSet<usize> = HashSet::with_capacity(self.nodes.len());
        let mut order: Vec<K> = Vec::with_capacity(self.nodes.len());

        while placed.len() < self.nodes.len() {
            let placeable: Vec<usize> = (0..self.nodes.len())
                .filter(|position| !placed.contains(position))
                .filter(|&position| {
                    self.edges[position].iter().all(|dependency| {
                        self.index
                            .get(dependency)
                            .map_or(true, |dep_position| placed.contains(dep_position))
                    })
                })
                .collect();

            if placeable.is_empty() {
                let nodes: Vec<String> = (0..self.nodes.len())
                    .filter(|position| !placed.contains(position))
                    .map(|position| self.nodes[position].to_string())
                    .collect();
                tracing::error!(unresolved = nodes.len(), "dependency cycle detected");
                return Err(SyncError::DependencyCycle { nodes });
            }

            for position in placeable {
                placed.insert(position);
                order.push(self.nodes[position].clone());
            }
        }

        Ok(order)
    }

    fn position_or_insert(&mut self, key: K) -> usize {
        if let Some(&position) = self.index.get(&key) {
            return position;
        }
        let position = self.nodes.len();
        self.index.insert(key.clone(), position);
        self.nodes.push(key);
        self.edges.push(Vec::new());
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scenario_order() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("C", "A");
        graph.add_dependency("C", "B");
        graph.add_node("A");
        graph.add_dependency("B", "A");

        assert_eq!(graph.get_dependencies().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_independent_nodes_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        for key in ["z", "y", "x"] {
            graph.add_node(key);
        }
        assert_eq!(graph.get_dependencies().unwrap(), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_external_dependency_is_satisfied() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("report", "external-model");
        assert_eq!(graph.get_dependencies().unwrap(), vec!["report"]);
        assert!(!graph.contains(&"external-model"));
    }

    #[test]
    fn test_two_node_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("X", "Y");
        graph.add_dependency("Y", "X");

        let err = graph.get_dependencies().unwrap_err();
        let SyncError::DependencyCycle { nodes } = err else {
            panic!("expected cycle error");
        };
        assert_eq!(nodes, vec!["X".to_string(), "Y".to_string()]);
    }

    #[test]
    fn test_cycle_reports_only_unplaced_nodes() {
        let mut graph = DependencyGraph::new();
        graph.add_node("root");
        graph.add_dependency("a", "root");
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");

        let err = graph.get_dependencies().unwrap_err();
        assert_eq!(err.to_string(), "Dependency cycle detected among: a, b");
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "a");
        assert!(graph.get_dependencies().is_err());
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("b", "a");
        graph.add_dependency("b", "a");
        assert_eq!(graph.dependencies_of(&"b"), &["a"]);
        assert!(graph.dependencies_of(&"missing").is_empty());
    }

    #[test]
    fn test_every_edge_respected() {
        let mut graph = DependencyGraph::new();
        let edges = [(5, 3), (3, 1), (4, 1), (4, 5), (2, 4), (1, 0)];
        for (node, dependency) in edges {
            graph.add_dependency(node, dependency);
        }
        graph.add_node(0);

        let order = graph.get_dependencies().unwrap();
        let position = |k: i32| order.iter().position(|&x| x == k).unwrap();
        for (node, dependency) in edges {
            assert!(position(dependency) < position(node));
        }
    }

    #[test]
    fn test_empty_graph() {
        let graph: DependencyGraph<String> = DependencyGraph::new();
        assert!(graph.get_dependencies().unwrap().is_empty());
    }
}
