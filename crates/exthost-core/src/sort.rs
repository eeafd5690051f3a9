//! Topological ordering with Kahn's algorithm.
//!
//! A node's in-degree is the number of its dependencies that are themselves
//! nodes of the graph, so dependencies are emitted before their dependents.
//! Dangling edges do not hold a node back. Ready nodes are taken in name
//! order, which makes the result independent of discovery order.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;

impl DependencyGraph {
    /// Perform a topological sort using Kahn's algorithm.
    ///
    /// Returns node names in dependency-first order: if A depends on B, B
    /// appears before A in the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyCycle` if the graph contains a cycle. The
    /// participants are exactly the nodes lying on a cycle, sorted; nodes
    /// that merely depend on a cycle are not listed.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let edges = self.edges();

        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, deps) in edges {
            let mut degree = 0;
            for dep in deps.iter().filter(|dep| edges.contains_key(*dep)) {
                degree += 1;
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(from.as_str());
            }
            in_degree.insert(from.as_str(), degree);
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(edges.len());
        while let Some(current) = ready.pop_first() {
            order.push(current.to_string());

            for &dependent in dependents.get(current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < edges.len() {
            let emitted: BTreeSet<&str> = order.iter().map(String::as_str).collect();
            let stuck: BTreeSet<&str> = edges
                .keys()
                .map(String::as_str)
                .filter(|id| !emitted.contains(id))
                .collect();
            return Err(Error::DependencyCycle {
                participants: CycleFinder::new(edges, &stuck).run(),
            });
        }

        Ok(order)
    }
}

/// Tarjan's strongly connected components over the nodes Kahn could not
/// emit. Members of non-trivial components, and self-dependent nodes, are
/// the cycle participants.
struct CycleFinder<'g> {
    edges: &'g BTreeMap<String, BTreeSet<String>>,
    stuck: &'g BTreeSet<&'g str>,
    next_index: usize,
    index: BTreeMap<&'g str, usize>,
    low_link: BTreeMap<&'g str, usize>,
    stack: Vec<&'g str>,
    on_stack: BTreeSet<&'g str>,
    members: BTreeSet<&'g str>,
}

impl<'g> CycleFinder<'g> {
    fn new(edges: &'g BTreeMap<String, BTreeSet<String>>, stuck: &'g BTreeSet<&'g str>) -> Self {
        Self {
            edges,
            stuck,
            next_index: 0,
            index: BTreeMap::new(),
            low_link: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            members: BTreeSet::new(),
        }
    }

    fn run(mut self) -> Vec<String> {
        let stuck = self.stuck;
        for &node in stuck {
            if !self.index.contains_key(node) {
                self.connect(node);
            }
        }
        self.members.into_iter().map(str::to_string).collect()
    }

    fn connect(&mut self, node: &'g str) {
        self.index.insert(node, self.next_index);
        self.low_link.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let edges = self.edges;
        let successors = edges
            .get(node)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|dep| self.stuck.contains(dep));
        let mut self_loop = false;
        for dep in successors.collect::<Vec<_>>() {
            if dep == node {
                self_loop = true;
            }
            if !self.index.contains_key(dep) {
                self.connect(dep);
                let low = self.low_link[node].min(self.low_link[dep]);
                self.low_link.insert(node, low);
            } else if self.on_stack.contains(dep) {
                let low = self.low_link[node].min(self.index[dep]);
                self.low_link.insert(node, low);
            }
        }

        if self.low_link[node] == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member);
                if member == node {
                    break;
                }
            }
            if component.len() > 1 || self_loop {
                self.members.extend(component);
            }
        }
    }
}
