//! Dependency graph between extensions.
//!
//! Nodes are extension names; an edge `A -> B` means A depends on B. Edges
//! are kept even when B is not a candidate, so the graph reflects what was
//! declared. Missing targets are the validator's concern.
//!
//! # Example
//!
//! ```
//! use exthost_core::{DependencyGraph, ExtensionDescriptor};
//!
//! let core = ExtensionDescriptor::new("core", "1.0.0");
//! let auth = ExtensionDescriptor::new("auth", "1.0.0").with_dependency("core", ">=1.0");
//!
//! let graph = DependencyGraph::from_descriptors([&core, &auth]);
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.dependencies_of("auth"), vec!["core"]);
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order, vec!["core", "auth"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::descriptor::ExtensionDescriptor;

/// Directed graph of declared dependencies.
///
/// Built once per resolution run and not modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list: key depends on each value.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Existing edges of a node with the same name are kept.
    pub fn add_node(&mut self, id: impl Into<String>) {
        self.edges.entry(id.into()).or_default();
    }

    /// Declare that `from` depends on `to`.
    ///
    /// `from` becomes a node if it was not one already; `to` does not.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Build the graph from descriptors: one node per descriptor, one edge per
    /// declared dependency.
    pub fn from_descriptors<'a>(
        descriptors: impl IntoIterator<Item = &'a ExtensionDescriptor>,
    ) -> Self {
        let mut graph = Self::new();
        for descriptor in descriptors {
            graph.add_node(descriptor.name.as_str());
            for dependency in descriptor.dependencies.keys() {
                graph.add_edge(&descriptor.name, dependency);
            }
        }
        graph
    }

    /// Return the number of nodes.
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// Return the number of edges, dangling ones included.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|deps| deps.len()).sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Node names in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Get the direct dependencies of a node, sorted.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Get the nodes that directly depend on `id`, sorted.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains(id))
            .map(|(from, _)| from.as_str())
            .collect()
    }

    pub(crate) fn edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }
}
