use anyhow::{Result, bail};
use log::debug;

use crate::{
    application::{InstallOptions, InstallOutcome, InstallState, InstallUseCase, UpgradeUseCase},
    pipeline::BuildFlags,
    resolver::ResolvePolicy,
    runtime::Runtime,
    state::InstallReason,
};

use super::config::Config;
use super::deps::render_notes;
use super::services::Services;

/// Build flags shared by `install` and `upgrade`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub dry_run: bool,
    pub no_install: bool,
    pub skip_recommended: bool,
    pub cflags: Option<String>,
    pub ldflags: Option<String>,
}

impl BuildOptions {
    fn to_install_options(&self, config: &Config) -> InstallOptions {
        InstallOptions {
            dry_run: self.dry_run,
            no_install: self.no_install,
            flags: BuildFlags {
                cflags: self.cflags.clone(),
                ldflags: self.ldflags.clone(),
            },
            dest_dir: config.dest_dir.clone(),
            policy: ResolvePolicy {
                skip_recommended: self.skip_recommended,
            },
        }
    }
}

/// Install a package and its dependencies from the repository
#[tracing::instrument(skip(runtime, config))]
pub async fn install<R: Runtime>(
    runtime: R,
    config: Config,
    name: &str,
    build: BuildOptions,
) -> Result<()> {
    let services = Services::from_config(&runtime, &config)?;
    let installer = InstallUseCase::new(
        &runtime,
        &services.store,
        services.collaborators(),
        config.sources_dir(),
    );

    let outcome = installer
        .install(name, InstallReason::Explicit, &build.to_install_options(&config))
        .await?;
    for line in render_outcome(name, &outcome) {
        println!("{}", line);
    }
    Ok(())
}

/// Rebuild one installed package, or every installed package with `all`
#[tracing::instrument(skip(runtime, config))]
pub async fn upgrade<R: Runtime>(
    runtime: R,
    config: Config,
    target: &str,
    build: BuildOptions,
) -> Result<()> {
    let services = Services::from_config(&runtime, &config)?;
    let collab = services.collaborators();
    let installer = InstallUseCase::new(&runtime, &services.store, collab, config.sources_dir());
    let upgrader = UpgradeUseCase::new(&services.store, collab, installer);
    let options = build.to_install_options(&config);

    if target != "all" {
        let outcome = upgrader.upgrade(target, &options).await?;
        for line in render_outcome(target, &outcome) {
            println!("{}", line);
        }
        return Ok(());
    }

    let report = upgrader.upgrade_all(&options).await?;
    debug!("Upgrade report: {:?}", report);
    for name in &report.upgraded {
        println!("Upgraded {}", name);
    }
    for (name, error) in &report.failed {
        println!("Failed to upgrade {}: {}", name, error);
    }
    if !report.is_success() {
        bail!("{} package(s) failed to upgrade", report.failed.len());
    }
    if report.upgraded.is_empty() {
        println!("No packages installed.");
    }
    Ok(())
}

fn render_outcome(name: &str, outcome: &InstallOutcome) -> Vec<String> {
    let mut lines = render_notes(&outcome.resolution);
    let queue = outcome.queue.join(" ");
    lines.push(match outcome.state {
        InstallState::Resolving => format!("Would build: {}", queue),
        InstallState::Built => format!("Built {} (not installed): {}", name, queue),
        _ => format!("Installed {}: {}", name, queue),
    });
    lines
}
