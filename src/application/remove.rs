//! Remove action - uninstalls a package and deregisters it.

use std::path::Path;

use anyhow::Result;
use log::{debug, info, warn};

use super::lifecycle::{Collaborators, RemoveState};
use crate::error::KilnError;
use crate::hooks::HookStage;
use crate::runtime::Runtime;
use crate::state::StateStore;

#[derive(Debug)]
pub struct RemoveOutcome {
    pub state: RemoveState,
    /// Installed packages that still required the removed one (forced removal)
    pub dependents: Vec<String>,
    /// Why uninstalling files failed, if it did. Deregistration still happened.
    pub uninstall_error: Option<String>,
    /// Packages left installed only as dependencies of nothing
    pub orphans: Vec<String>,
}

pub struct RemoveAction<'a, R: Runtime> {
    store: &'a StateStore<'a, R>,
    collab: Collaborators<'a>,
}

impl<'a, R: Runtime> RemoveAction<'a, R> {
    pub fn new(store: &'a StateStore<'a, R>, collab: Collaborators<'a>) -> Self {
        Self { store, collab }
    }

    /// Remove `name` from `dest_dir` and the registry.
    ///
    /// Refused with [`KilnError::BlockedRemoval`] while installed packages
    /// require it, unless `force` is set. Orphans are reported, never removed.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, name: &str, force: bool, dest_dir: &Path) -> Result<RemoveOutcome> {
        let mut state = RemoveState::Pending;

        if !self.store.is_installed(name)? {
            return Err(KilnError::NotInstalled(name.to_string()).into());
        }

        let dependents = self.store.find_dependents(name)?;
        if !dependents.is_empty() {
            if !force {
                return Err(KilnError::BlockedRemoval {
                    package: name.to_string(),
                    dependents,
                }
                .into());
            }
            warn!(
                "Removing {} although {} still require it",
                name,
                dependents.join(", ")
            );
        }
        state = advance(name, state, RemoveState::DependentsChecked);

        self.collab.pre_hook(HookStage::Remove, name)?;

        let uninstall_error = match self.collab.pipeline.uninstall(name, dest_dir) {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to uninstall files of {}: {:#}", name, e);
                Some(format!("{:#}", e))
            }
        };
        state = advance(name, state, RemoveState::Uninstalled);

        let removed = self.store.remove_record(name)?;
        debug!("Dropped {} record(s) for {}", removed, name);
        state = advance(name, state, RemoveState::Deregistered);

        self.collab.post_hook(HookStage::Remove, name);

        let orphans = self.store.find_orphans()?;
        state = advance(name, state, RemoveState::OrphanSwept);
        info!("Removed {}", name);

        Ok(RemoveOutcome {
            state,
            dependents,
            uninstall_error,
            orphans,
        })
    }
}

fn advance(name: &str, from: RemoveState, to: RemoveState) -> RemoveState {
    debug!("remove {}: {} -> {}", name, from, to);
    to
}
