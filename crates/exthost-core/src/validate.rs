//! Two-stage validation.
//!
//! Stage 1 checks declared dependencies against a valid set built up in
//! topological order, so a dependency is always judged before anything that
//! needs it. Stage 2 hands every survivor a read-only view of the Stage 1
//! set and lets the extension veto itself.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use exthost_contract::{Extension, LoadedVersions};

use crate::context::{RejectionReason, ResolutionContext, Stage};
use crate::descriptor::ExtensionDescriptor;
use crate::error::panic_message;
use crate::version::check_requirement;

/// Extensions that passed a validation step, keyed by name.
pub type ValidSet = BTreeMap<String, ExtensionDescriptor>;

/// Stage 1: declared dependency checks.
///
/// `order` must be a topological order of `candidates`. An extension is
/// accepted when each dependency is a candidate, was itself accepted, and
/// its declared version satisfies the requirement. The first failing
/// dependency (by name) is reported.
pub fn validate_declared(
    ctx: &mut ResolutionContext,
    order: &[String],
    candidates: &BTreeMap<String, ExtensionDescriptor>,
) -> ValidSet {
    let mut valid = ValidSet::new();

    for name in order {
        let Some(descriptor) = candidates.get(name) else {
            continue;
        };

        match first_unsatisfied(descriptor, candidates, &valid) {
            Some(reason) => ctx.reject(name, Stage::Declarative, reason),
            None => {
                tracing::debug!(extension = %name, "Declared dependencies satisfied");
                valid.insert(name.clone(), descriptor.clone());
            }
        }
    }

    valid
}

fn first_unsatisfied(
    descriptor: &ExtensionDescriptor,
    candidates: &BTreeMap<String, ExtensionDescriptor>,
    valid: &ValidSet,
) -> Option<RejectionReason> {
    for (dependency, requirement) in &descriptor.dependencies {
        if !candidates.contains_key(dependency) {
            return Some(RejectionReason::MissingDependency {
                dependency: dependency.clone(),
            });
        }

        let Some(loaded) = valid.get(dependency) else {
            return Some(RejectionReason::DependencyRejected {
                dependency: dependency.clone(),
            });
        };

        if let Err(source) = check_requirement(requirement, &loaded.version) {
            return Some(RejectionReason::Constraint {
                dependency: dependency.clone(),
                source,
            });
        }
    }
    None
}

/// Stage 2: run each extension's `validate_dependency` hook.
///
/// Every hook sees the same name-to-version map of `declared`. Declining,
/// returning an error and panicking all exclude the extension; none of them
/// stop the run.
pub fn validate_custom(
    ctx: &mut ResolutionContext,
    order: &[String],
    declared: &ValidSet,
    extensions: &BTreeMap<&str, &dyn Extension>,
) -> ValidSet {
    let loaded: LoadedVersions = declared
        .iter()
        .map(|(name, descriptor)| (name.clone(), descriptor.version.clone()))
        .collect();

    let mut valid = ValidSet::new();
    for name in order {
        let Some(descriptor) = declared.get(name) else {
            continue;
        };
        let Some(extension) = extensions.get(name.as_str()) else {
            tracing::debug!(extension = %name, "No instance to validate, keeping");
            valid.insert(name.clone(), descriptor.clone());
            continue;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| extension.validate_dependency(&loaded)));
        let reason = match outcome {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) => Some(RejectionReason::ValidationDeclined),
            Ok(Err(err)) => Some(RejectionReason::ValidationFailed {
                message: err.to_string(),
            }),
            Err(payload) => Some(RejectionReason::ValidationFailed {
                message: format!("panicked: {}", panic_message(payload.as_ref())),
            }),
        };

        match reason {
            Some(reason) => ctx.reject(name, Stage::Custom, reason),
            None => {
                valid.insert(name.clone(), descriptor.clone());
            }
        }
    }

    valid
}
