//! Per-run record of why extensions were excluded.
//!
//! Every rejection is emitted as a `tracing` event with `extension`,
//! `dependency` and `reason` fields, and kept as a [`Rejection`] so callers
//! (the CLI `check` command, tests) can inspect the outcome without parsing
//! logs.

use std::fmt;

use crate::version::ConstraintError;

/// The resolution step that excluded an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Candidate intake, before any graph is built.
    Intake,
    /// Topological sort.
    Sort,
    /// Declared dependency checks.
    Declarative,
    /// The extension's own `validate_dependency` hook.
    Custom,
    /// Removal after a dependency was excluded in a later step.
    Cascade,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Sort => "sort",
            Stage::Declarative => "declarative",
            Stage::Custom => "custom",
            Stage::Cascade => "cascade",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an extension was excluded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("another extension with the same name was loaded first")]
    DuplicateName,

    #[error("part of dependency cycle among: {}", participants.join(", "))]
    DependencyCycle { participants: Vec<String> },

    /// Not on the cycle, but excluded because a cycle aborts the batch.
    #[error("resolution aborted by dependency cycle among: {}", participants.join(", "))]
    BatchAborted { participants: Vec<String> },

    #[error("dependency '{dependency}' is not loaded")]
    MissingDependency { dependency: String },

    #[error("dependency '{dependency}' is loaded but was itself rejected")]
    DependencyRejected { dependency: String },

    #[error("dependency '{dependency}': {source}")]
    Constraint {
        dependency: String,
        #[source]
        source: ConstraintError,
    },

    #[error("custom dependency validation declined")]
    ValidationDeclined,

    #[error("custom dependency validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("dependency '{dependency}' was removed")]
    DependencyRemoved { dependency: String },
}

impl RejectionReason {
    /// The dependency this reason points at, if any.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            RejectionReason::MissingDependency { dependency }
            | RejectionReason::DependencyRejected { dependency }
            | RejectionReason::Constraint { dependency, .. }
            | RejectionReason::DependencyRemoved { dependency } => Some(dependency),
            RejectionReason::DuplicateName
            | RejectionReason::DependencyCycle { .. }
            | RejectionReason::BatchAborted { .. }
            | RejectionReason::ValidationDeclined
            | RejectionReason::ValidationFailed { .. } => None,
        }
    }

    /// Failures of the extension's own code are errors; everything else is
    /// an expected outcome of resolution and logged as a warning.
    fn is_error(&self) -> bool {
        matches!(
            self,
            RejectionReason::ValidationFailed { .. } | RejectionReason::DependencyCycle { .. }
        )
    }
}

/// One excluded extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub extension: String,
    pub dependency: Option<String>,
    pub stage: Stage,
    pub reason: RejectionReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.extension, self.stage, self.reason)
    }
}

/// Diagnostic sink threaded through a resolution run.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    rejections: Vec<Rejection>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record that `extension` was excluded at `stage`.
    pub fn reject(&mut self, extension: &str, stage: Stage, reason: RejectionReason) {
        let dependency = reason.dependency().map(str::to_string);

        if reason.is_error() {
            tracing::error!(
                extension,
                dependency = dependency.as_deref(),
                stage = stage.as_str(),
                reason = %reason,
                "Extension rejected"
            );
        } else {
            tracing::warn!(
                extension,
                dependency = dependency.as_deref(),
                stage = stage.as_str(),
                reason = %reason,
                "Extension rejected"
            );
        }

        self.rejections.push(Rejection {
            extension: extension.to_string(),
            dependency,
            stage,
            reason,
        });
    }

    /// All rejections in the order they happened.
    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Rejections recorded for one extension name.
    pub fn rejections_for<'a>(&'a self, extension: &'a str) -> impl Iterator<Item = &'a Rejection> {
        self.rejections
            .iter()
            .filter(move |rejection| rejection.extension == extension)
    }

    pub fn is_rejected(&self, extension: &str) -> bool {
        self.rejections_for(extension).next().is_some()
    }

    pub fn into_rejections(self) -> Vec<Rejection> {
        self.rejections
    }
}
