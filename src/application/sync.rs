//! Sync use case - brings package sources up to date ahead of a build.

use std::path::PathBuf;

use anyhow::Result;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};

use super::lifecycle::{Collaborators, stage_failure};
use crate::hooks::HookStage;
use crate::package::Package;
use crate::pipeline::BuildStage;
use crate::runtime::Runtime;
use crate::state::StateStore;

/// Default number of concurrent fetches for `sync all`.
pub const DEFAULT_SYNC_JOBS: usize = 4;

/// Per-package result of a batch sync.
#[derive(Debug)]
pub struct SyncOutcome {
    pub package: String,
    /// `Ok(None)` when the package declares no source
    pub result: Result<Option<PathBuf>>,
}

pub struct SyncUseCase<'a, R: Runtime> {
    store: &'a StateStore<'a, R>,
    collab: Collaborators<'a>,
    sources_dir: PathBuf,
}

impl<'a, R: Runtime> SyncUseCase<'a, R> {
    pub fn new(
        store: &'a StateStore<'a, R>,
        collab: Collaborators<'a>,
        sources_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            collab,
            sources_dir: sources_dir.into(),
        }
    }

    /// Fetch the source of an already loaded package, wrapped in its sync hooks.
    pub(crate) async fn sync_package(&self, package: &Package) -> Result<Option<PathBuf>> {
        let Some(source) = &package.source else {
            debug!("{} declares no source", package.name);
            return Ok(None);
        };

        self.collab.pre_hook(HookStage::Sync, &package.name)?;
        let artifact = self
            .collab
            .fetcher
            .fetch(&package.name, source, &self.sources_dir.join(&package.name))
            .await
            .map_err(stage_failure(&package.name, BuildStage::Sync))?;
        self.collab.post_hook(HookStage::Sync, &package.name);

        Ok(Some(artifact))
    }

    #[tracing::instrument(skip(self))]
    pub async fn sync(&self, name: &str) -> Result<Option<PathBuf>> {
        let package = self.store.repo().load(name)?;
        self.sync_package(&package).await
    }

    /// Sync every installed package, `jobs` at a time. Failures are reported
    /// per package and do not stop the batch.
    #[tracing::instrument(skip(self))]
    pub async fn sync_all(&self, jobs: usize) -> Result<Vec<SyncOutcome>> {
        let names = self.store.list_installed()?;
        info!("Syncing {} package(s)", names.len());

        let mut outcomes: Vec<SyncOutcome> = stream::iter(names)
            .map(|package| async move {
                let result = self.sync(&package).await;
                if let Err(e) = &result {
                    warn!("Failed to sync {}: {:#}", package, e);
                }
                SyncOutcome { package, result }
            })
            .buffer_unordered(jobs.max(1))
            .collect()
            .await;

        outcomes.sort_by(|a, b| a.package.cmp(&b.package));
        Ok(outcomes)
    }
}
