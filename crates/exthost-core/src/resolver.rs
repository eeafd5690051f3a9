//! Resolution orchestrator.
//!
//! Takes the loaded candidates and returns the subset that may be hosted, in
//! the order their hooks must run. Nothing here fails: every problem
//! excludes one extension (or, for a cycle, the whole batch) and is recorded
//! in the [`ResolutionContext`].

use std::collections::{BTreeMap, BTreeSet};

use exthost_contract::Extension;

use crate::cascade::cascade_remove;
use crate::context::{RejectionReason, ResolutionContext, Stage};
use crate::descriptor::ExtensionDescriptor;
use crate::error::Error;
use crate::graph::DependencyGraph;
use crate::loader::LoadedExtension;
use crate::validate::{validate_custom, validate_declared};

/// Runs the resolution pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Resolver;

impl Resolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `candidates` into the extensions to host.
    ///
    /// The result is in topological order (dependencies first). Every
    /// extension in it has all of its declared dependencies in it too, each
    /// satisfying the declared requirement. Excluded instances are dropped
    /// here; the libraries they came from stay mapped.
    pub fn resolve(
        &self,
        ctx: &mut ResolutionContext,
        candidates: Vec<LoadedExtension>,
    ) -> Vec<LoadedExtension> {
        if candidates.is_empty() {
            tracing::info!("No extensions to resolve");
            return Vec::new();
        }
        let total = candidates.len();

        let mut by_name: BTreeMap<String, LoadedExtension> = BTreeMap::new();
        for candidate in candidates {
            let name = candidate.name().to_string();
            if by_name.contains_key(&name) {
                tracing::debug!(extension = %name, origin = %candidate.origin(), "Dropping duplicate");
                ctx.reject(&name, Stage::Intake, RejectionReason::DuplicateName);
                continue;
            }
            by_name.insert(name, candidate);
        }

        let descriptors: BTreeMap<String, ExtensionDescriptor> = by_name
            .iter()
            .map(|(name, loaded)| (name.clone(), loaded.descriptor().clone()))
            .collect();
        let graph = DependencyGraph::from_descriptors(descriptors.values());

        let order = match graph.topological_sort() {
            Ok(order) => order,
            Err(Error::DependencyCycle { participants }) => {
                tracing::error!(
                    participants = %participants.join(", "),
                    "Dependency cycle detected, no extensions will be loaded"
                );
                for name in by_name.keys() {
                    let reason = if participants.contains(name) {
                        RejectionReason::DependencyCycle {
                            participants: participants.clone(),
                        }
                    } else {
                        RejectionReason::BatchAborted {
                            participants: participants.clone(),
                        }
                    };
                    ctx.reject(name, Stage::Sort, reason);
                }
                tracing::warn!(
                    removed = total,
                    loaded = 0,
                    "Extensions removed during dependency resolution"
                );
                return Vec::new();
            }
            Err(err) => {
                tracing::error!(error = %err, "Dependency sort failed, no extensions will be loaded");
                return Vec::new();
            }
        };
        tracing::debug!(order = %order.join(", "), "Resolved load order");

        let declared = validate_declared(ctx, &order, &descriptors);

        let instances: BTreeMap<&str, &dyn Extension> = by_name
            .iter()
            .map(|(name, loaded)| (name.as_str(), loaded.extension()))
            .collect();
        let custom = validate_custom(ctx, &order, &declared, &instances);

        let accepted: BTreeSet<String> = cascade_remove(ctx, custom).into_keys().collect();

        let resolved: Vec<LoadedExtension> = order
            .iter()
            .filter(|name| accepted.contains(*name))
            .filter_map(|name| by_name.remove(name))
            .collect();

        let removed = total - resolved.len();
        if removed > 0 {
            tracing::warn!(
                removed,
                loaded = resolved.len(),
                "Extensions removed during dependency resolution"
            );
        }
        tracing::info!(count = resolved.len(), "Extension resolution complete");

        resolved
    }
}
