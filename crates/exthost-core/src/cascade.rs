//! Transitive removal of extensions whose dependencies were excluded.

use crate::context::{RejectionReason, ResolutionContext, Stage};
use crate::validate::ValidSet;

/// Remove members with a dependency outside the set until nothing changes.
///
/// Each pass marks every member that has an absent dependency and then
/// removes all of them together, so the outcome of a pass never depends on
/// iteration order. Running this on its own output removes nothing.
pub fn cascade_remove(ctx: &mut ResolutionContext, mut valid: ValidSet) -> ValidSet {
    let mut pass = 0;
    loop {
        pass += 1;
        let marked: Vec<(String, String)> = valid
            .values()
            .filter_map(|descriptor| {
                descriptor
                    .dependencies
                    .keys()
                    .find(|dependency| !valid.contains_key(*dependency))
                    .map(|dependency| (descriptor.name.clone(), dependency.clone()))
            })
            .collect();

        if marked.is_empty() {
            tracing::debug!(passes = pass, remaining = valid.len(), "Cascade settled");
            return valid;
        }

        for (name, dependency) in marked {
            valid.remove(&name);
            ctx.reject(
                &name,
                Stage::Cascade,
                RejectionReason::DependencyRemoved { dependency },
            );
        }
    }
}
