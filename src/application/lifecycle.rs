//! Lifecycle states and the collaborators the orchestrator drives.

use anyhow::Result;
use log::{debug, warn};
use std::fmt;

use crate::error::KilnError;
use crate::hooks::{HookPhase, HookRunner, HookStage};
use crate::pipeline::{BuildPipeline, BuildStage};
use crate::sync::Fetcher;
use crate::verify::Verifier;

/// `PENDING -> RESOLVING -> BUILT -> REGISTERED`, or `ABORTED` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Pending,
    Resolving,
    Built,
    Registered,
    Aborted,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallState::Pending => "PENDING",
            InstallState::Resolving => "RESOLVING",
            InstallState::Built => "BUILT",
            InstallState::Registered => "REGISTERED",
            InstallState::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// `PENDING -> DEPENDENTS_CHECKED -> UNINSTALLED -> DEREGISTERED -> ORPHAN_SWEPT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveState {
    Pending,
    DependentsChecked,
    Uninstalled,
    Deregistered,
    OrphanSwept,
}

impl fmt::Display for RemoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoveState::Pending => "PENDING",
            RemoveState::DependentsChecked => "DEPENDENTS_CHECKED",
            RemoveState::Uninstalled => "UNINSTALLED",
            RemoveState::Deregistered => "DEREGISTERED",
            RemoveState::OrphanSwept => "ORPHAN_SWEPT",
        };
        f.write_str(s)
    }
}

/// The external capabilities a lifecycle operation needs.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub pipeline: &'a dyn BuildPipeline,
    pub fetcher: &'a dyn Fetcher,
    pub verifier: &'a dyn Verifier,
    pub hooks: &'a dyn HookRunner,
}

impl Collaborators<'_> {
    /// Run a pre-stage hook. A failure stops the stage.
    pub(crate) fn pre_hook(&self, stage: HookStage, package: &str) -> Result<()> {
        self.hooks
            .run_hook(stage, HookPhase::Pre, package)
            .map_err(|source| {
                KilnError::HookFailure {
                    stage,
                    package: package.to_string(),
                    source,
                }
                .into()
            })
    }

    /// Run a post-stage hook. A failure is only logged.
    pub(crate) fn post_hook(&self, stage: HookStage, package: &str) {
        if let Err(e) = self.hooks.run_hook(stage, HookPhase::Post, package) {
            warn!("post-{} hook failed for {}: {:#}", stage, package, e);
        }
    }
}

/// Wraps a collaborator error as a pipeline failure of `stage`.
pub(crate) fn stage_failure(
    package: &str,
    stage: BuildStage,
) -> impl FnOnce(anyhow::Error) -> anyhow::Error {
    let package = package.to_string();
    move |source| {
        debug!("{} failed during {}: {:#}", package, stage, source);
        KilnError::BuildPipelineFailure {
            package,
            stage,
            source,
        }
        .into()
    }
}
