use anyhow::{Result, bail};

use crate::{
    application::{SyncOutcome, SyncUseCase},
    runtime::Runtime,
};

use super::config::Config;
use super::services::Services;

/// Fetch or refresh sources of one package, or of every installed package with `all`
#[tracing::instrument(skip(runtime, config))]
pub async fn sync<R: Runtime>(runtime: R, config: Config, target: &str, jobs: usize) -> Result<()> {
    let services = Services::from_config(&runtime, &config)?;
    let syncer = SyncUseCase::new(&services.store, services.collaborators(), config.sources_dir());

    if target != "all" {
        match syncer.sync(target).await? {
            Some(path) => println!("Synced {}: {}", target, path.display()),
            None => println!("{} has no source", target),
        }
        return Ok(());
    }

    let outcomes = syncer.sync_all(jobs).await?;
    if outcomes.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for outcome in &outcomes {
        println!("{}", render_outcome(outcome));
    }
    if failed > 0 {
        bail!("{} package(s) failed to sync", failed);
    }
    Ok(())
}

fn render_outcome(outcome: &SyncOutcome) -> String {
    match &outcome.result {
        Ok(Some(path)) => format!("{}: {}", outcome.package, path.display()),
        Ok(None) => format!("{}: no source", outcome.package),
        Err(e) => format!("{}: failed: {:#}", outcome.package, e),
    }
}
