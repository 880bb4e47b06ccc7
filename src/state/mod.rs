//! Package state store: install records plus reverse-dependency queries.
//!
//! The registry only knows what is installed. Who depends on whom is derived
//! at query time from each installed package's own `depends` declaration.

mod registry;

pub use registry::{InstallReason, InstallRecord, Registry};

use anyhow::Result;
use log::{debug, info};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::package::PackageRepository;
use crate::runtime::Runtime;

pub struct StateStore<'a, R: Runtime> {
    registry: Registry<'a, R>,
    repo: PackageRepository<'a, R>,
}

impl<'a, R: Runtime> StateStore<'a, R> {
    pub fn new(
        runtime: &'a R,
        registry_path: impl Into<PathBuf>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry: Registry::new(runtime, registry_path),
            repo: PackageRepository::new(runtime, repo_root),
        }
    }

    pub fn registry(&self) -> &Registry<'a, R> {
        &self.registry
    }

    pub fn repo(&self) -> &PackageRepository<'a, R> {
        &self.repo
    }

    pub fn record_install(&self, name: &str, reason: InstallReason, timestamp: i64) -> Result<()> {
        self.registry.record_install(name, reason, timestamp)
    }

    pub fn record_installs(
        &self,
        installs: &[(String, InstallReason)],
        timestamp: i64,
    ) -> Result<()> {
        self.registry.record_installs(installs, timestamp)
    }

    pub fn is_installed(&self, name: &str) -> Result<bool> {
        self.registry.is_installed(name)
    }

    pub fn list_installed(&self) -> Result<Vec<String>> {
        self.registry.list_installed()
    }

    pub fn latest_record(&self, name: &str) -> Result<Option<InstallRecord>> {
        self.registry.latest_record(name)
    }

    pub fn remove_record(&self, name: &str) -> Result<usize> {
        self.registry.remove_record(name)
    }

    /// Installed packages whose required dependencies include `name`.
    #[tracing::instrument(skip(self))]
    pub fn find_dependents(&self, name: &str) -> Result<Vec<String>> {
        let mut dependents = Vec::new();
        for installed in self.registry.list_installed()? {
            if installed == name {
                continue;
            }
            if self.repo.load_dependencies(&installed)?.requires(name) {
                dependents.push(installed);
            }
        }
        debug!("Dependents of {}: {:?}", name, dependents);
        Ok(dependents)
    }

    /// Packages installed only as a dependency that nothing installed requires.
    ///
    /// Only `depends` edges keep a package. Recommended and optional
    /// dependencies are recorded as `dependency` when they get built, but an
    /// installed package that merely recommends one does not protect it, so it
    /// shows up here. Such cases are logged at info level.
    #[tracing::instrument(skip(self))]
    pub fn find_orphans(&self) -> Result<Vec<String>> {
        let installed = self.registry.installed_records()?;

        let mut required: HashSet<String> = HashSet::new();
        let mut wanted: Vec<(String, String)> = Vec::new();
        for record in &installed {
            let deps = self.repo.load_dependencies(&record.name)?;
            for soft in deps.recommended.iter().chain(&deps.optional) {
                wanted.push((soft.clone(), record.name.clone()));
            }
            required.extend(deps.required.into_iter().filter(|d| *d != record.name));
        }

        let orphans: Vec<String> = installed
            .into_iter()
            .filter(|r| r.reason == InstallReason::Dependency && !required.contains(&r.name))
            .map(|r| r.name)
            .collect();

        for (orphan, by) in wanted.iter().filter(|(name, _)| orphans.contains(name)) {
            info!(
                "{} is orphaned although {} still lists it as optional or recommended",
                orphan, by
            );
        }
        Ok(orphans)
    }
}
