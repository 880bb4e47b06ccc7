//! Upgrade use case - rebuilds installed packages from their current definitions.
//!
//! There is no version comparison: an upgrade always re-runs the full install
//! path and keeps the reason the package was originally installed for.

use anyhow::Result;
use log::{info, warn};

use super::install::{InstallOptions, InstallOutcome, InstallUseCase};
use super::lifecycle::Collaborators;
use crate::error::KilnError;
use crate::hooks::HookStage;
use crate::runtime::Runtime;
use crate::state::StateStore;

/// Result of `upgrade all`.
#[derive(Debug, Default)]
pub struct UpgradeReport {
    pub upgraded: Vec<String>,
    /// Package and the rendered error chain
    pub failed: Vec<(String, String)>,
}

impl UpgradeReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct UpgradeUseCase<'a, R: Runtime> {
    store: &'a StateStore<'a, R>,
    collab: Collaborators<'a>,
    installer: InstallUseCase<'a, R>,
}

impl<'a, R: Runtime> UpgradeUseCase<'a, R> {
    pub fn new(
        store: &'a StateStore<'a, R>,
        collab: Collaborators<'a>,
        installer: InstallUseCase<'a, R>,
    ) -> Self {
        Self {
            store,
            collab,
            installer,
        }
    }

    #[tracing::instrument(skip(self, options))]
    pub async fn upgrade(&self, name: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        let record = self
            .store
            .latest_record(name)?
            .ok_or_else(|| KilnError::NotInstalled(name.to_string()))?;

        self.collab.pre_hook(HookStage::Upgrade, name)?;
        let outcome = self.installer.install(name, record.reason, options).await?;
        self.collab.post_hook(HookStage::Upgrade, name);

        info!("Upgraded {}", name);
        Ok(outcome)
    }

    /// Upgrade every installed package once, in registry order. A failure is
    /// logged and the batch moves on.
    #[tracing::instrument(skip(self, options))]
    pub async fn upgrade_all(&self, options: &InstallOptions) -> Result<UpgradeReport> {
        let mut report = UpgradeReport::default();
        for name in self.store.list_installed()? {
            match self.upgrade(&name, options).await {
                Ok(_) => report.upgraded.push(name),
                Err(e) => {
                    warn!("Failed to upgrade {}: {:#}", name, e);
                    report.failed.push((name, format!("{:#}", e)));
                }
            }
        }
        Ok(report)
    }
}
