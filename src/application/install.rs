//! Install use case - orchestrates the package installation flow.
//!
//! This use case coordinates:
//! - Dependency resolution into a dependency-first queue
//! - Sync, verify, build and install of every queued package
//! - Registration of the whole queue once every package succeeded

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::{debug, info, warn};

use super::lifecycle::{Collaborators, InstallState, stage_failure};
use super::sync::SyncUseCase;
use crate::error::KilnError;
use crate::hooks::HookStage;
use crate::package::{Package, validate_name};
use crate::pipeline::{BuildFlags, BuildStage};
use crate::resolver::{Resolution, ResolvePolicy, Resolver};
use crate::runtime::Runtime;
use crate::state::{InstallReason, StateStore};
use crate::verify::ChecksumOutcome;

/// Options for the install use case
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Stop after resolution and report the plan
    pub dry_run: bool,
    /// Build but do not install or register
    pub no_install: bool,
    pub flags: BuildFlags,
    /// Where packages are installed to
    pub dest_dir: PathBuf,
    pub policy: ResolvePolicy,
}

#[derive(Debug)]
pub struct InstallOutcome {
    /// Last state reached: RESOLVING for a dry run, BUILT with
    /// `no_install`, REGISTERED otherwise
    pub state: InstallState,
    pub resolution: Resolution,
    /// Packages built (or, for a dry run, that would be built), in order
    pub queue: Vec<String>,
}

/// Install use case
pub struct InstallUseCase<'a, R: Runtime> {
    runtime: &'a R,
    store: &'a StateStore<'a, R>,
    collab: Collaborators<'a>,
    syncer: SyncUseCase<'a, R>,
}

impl<'a, R: Runtime> InstallUseCase<'a, R> {
    pub fn new(
        runtime: &'a R,
        store: &'a StateStore<'a, R>,
        collab: Collaborators<'a>,
        sources_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            store,
            collab,
            syncer: SyncUseCase::new(store, collab, sources_dir),
        }
    }

    /// Install `name` and whatever it needs.
    ///
    /// On failure nothing from the queue is registered, even packages whose
    /// install step already ran.
    #[tracing::instrument(skip(self, options))]
    pub async fn install(
        &self,
        name: &str,
        reason: InstallReason,
        options: &InstallOptions,
    ) -> Result<InstallOutcome> {
        let mut state = InstallState::Pending;
        let result = self.run(name, reason, options, &mut state).await;
        if let Err(e) = &result {
            warn!("Install of {} aborted in {}: {:#}", name, state, e);
        }
        result
    }

    async fn run(
        &self,
        name: &str,
        reason: InstallReason,
        options: &InstallOptions,
        state: &mut InstallState,
    ) -> Result<InstallOutcome> {
        validate_name(name)?;
        if !self.store.repo().contains(name) {
            bail!(
                "Package {} not found in {}",
                name,
                self.store.repo().root().display()
            );
        }

        *state = InstallState::Resolving;
        let resolution = Resolver::new(self.store.repo(), options.policy).resolve(name)?;
        let queue = self.plan(name, &resolution)?;
        info!("Install queue for {}: {:?}", name, queue);

        if options.dry_run {
            return Ok(InstallOutcome {
                state: *state,
                resolution,
                queue,
            });
        }

        for package in &queue {
            self.build_package(package, options).await?;
        }
        *state = InstallState::Built;

        if options.no_install {
            info!("Built {} package(s); skipping install", queue.len());
            return Ok(InstallOutcome {
                state: *state,
                resolution,
                queue,
            });
        }

        let records: Vec<(String, InstallReason)> = queue
            .iter()
            .map(|p| {
                let reason = if p == name {
                    reason
                } else {
                    InstallReason::Dependency
                };
                (p.clone(), reason)
            })
            .collect();
        self.store
            .record_installs(&records, chrono::Utc::now().timestamp())?;
        *state = InstallState::Registered;

        Ok(InstallOutcome {
            state: *state,
            resolution,
            queue,
        })
    }

    /// Resolution order minus dependencies that are already installed.
    /// The target itself is always rebuilt.
    fn plan(&self, name: &str, resolution: &Resolution) -> Result<Vec<String>> {
        let mut queue = Vec::with_capacity(resolution.order.len());
        for package in &resolution.order {
            if package != name && self.store.is_installed(package)? {
                debug!("{} is already installed", package);
                continue;
            }
            queue.push(package.clone());
        }
        Ok(queue)
    }

    #[tracing::instrument(skip(self, options))]
    async fn build_package(&self, name: &str, options: &InstallOptions) -> Result<()> {
        info!("Building {}", name);
        let package = self.store.repo().load(name)?;

        let artifact = self.syncer.sync_package(&package).await?;
        if let Some(artifact) = &artifact {
            self.verify(&package, artifact)?;
        }

        self.collab.pre_hook(HookStage::Build, name)?;
        let pipeline = self.collab.pipeline;
        let source_dir = pipeline
            .extract(&package, artifact.as_deref().unwrap_or(package.dir.as_path()))
            .map_err(stage_failure(name, BuildStage::Extract))?;
        if !package.patches.is_empty() {
            pipeline
                .apply_patches(&source_dir, &package.patches)
                .map_err(stage_failure(name, BuildStage::Patch))?;
        }
        pipeline
            .compile(&package, &source_dir, &options.flags)
            .map_err(stage_failure(name, BuildStage::Compile))?;
        self.collab.post_hook(HookStage::Build, name);

        if options.no_install {
            return Ok(());
        }

        self.collab.pre_hook(HookStage::Install, name)?;
        pipeline
            .install_to(&package, &source_dir, &options.dest_dir)
            .map_err(stage_failure(name, BuildStage::Install))?;
        self.collab.post_hook(HookStage::Install, name);

        Ok(())
    }

    fn verify(&self, package: &Package, artifact: &Path) -> Result<()> {
        // Checkouts are verified by git itself
        if self.runtime.is_dir(artifact) {
            return Ok(());
        }
        let outcome = self
            .collab
            .verifier
            .verify_or_generate(artifact, &package.checksums_path())
            .map_err(stage_failure(&package.name, BuildStage::Verify))?;

        match outcome {
            ChecksumOutcome::Match => Ok(()),
            ChecksumOutcome::Generated(sum) => {
                info!("Recorded checksum {} for {:?}", sum, artifact);
                Ok(())
            }
            ChecksumOutcome::Mismatch { expected, actual } => Err(KilnError::ChecksumMismatch {
                file: artifact.to_path_buf(),
                expected,
                actual,
            }
            .into()),
        }
    }
}
