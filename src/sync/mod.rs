//! Source acquisition: HTTP archives, git checkouts and local files.

mod download;

pub use download::download_file;

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::http::HttpClient;
use crate::package::{SourceKind, SourceSpec};
use crate::runtime::{CommandSpec, Runtime};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Bring `source` up to date under `dest_dir` and return the artifact
    /// (file or checkout directory) to build from.
    async fn fetch(&self, package: &str, source: &SourceSpec, dest_dir: &Path) -> Result<PathBuf>;
}

pub struct SourceFetcher<'a, R: Runtime> {
    runtime: &'a R,
    http: HttpClient,
}

impl<'a, R: Runtime> SourceFetcher<'a, R> {
    pub fn new(runtime: &'a R, http: HttpClient) -> Self {
        Self { runtime, http }
    }

    async fn fetch_http(&self, source: &SourceSpec, target: &Path) -> Result<()> {
        if self.runtime.exists(target) {
            debug!("Using cached {:?}", target);
            return Ok(());
        }
        download_file(self.runtime, &source.url, target, &self.http).await
    }

    async fn fetch_git(&self, source: &SourceSpec, target: &Path) -> Result<()> {
        if self.runtime.exists(&target.join(".git")) {
            info!("Updating checkout {:?}", target);
            let fetch = CommandSpec::new("git")
                .arg("fetch")
                .arg("--depth")
                .arg("1")
                .arg("origin")
                .arg(source.branch.as_deref().unwrap_or("HEAD"))
                .current_dir(target);
            self.runtime.run_async(&fetch).await?;
            let reset = CommandSpec::new("git")
                .arg("reset")
                .arg("--hard")
                .arg("FETCH_HEAD")
                .current_dir(target);
            return self.runtime.run_async(&reset).await;
        }

        if self.runtime.exists(target) {
            self.runtime.remove_dir_all(target)?;
        }
        info!("Cloning {}", source.url);
        let mut clone = CommandSpec::new("git").arg("clone").arg("--depth").arg("1");
        if let Some(branch) = &source.branch {
            clone = clone.arg("--branch").arg(branch);
        }
        let clone = clone.arg(&source.url).path_arg(target);
        self.runtime.run_async(&clone).await
    }

    fn fetch_local(&self, path: &Path, target: &Path) -> Result<PathBuf> {
        if !self.runtime.exists(path) {
            bail!("Local source {:?} does not exist", path);
        }
        // Directories are built from in place; the pipeline copies them
        if self.runtime.is_dir(path) {
            return Ok(path.to_path_buf());
        }
        self.runtime.copy(path, target)?;
        Ok(target.to_path_buf())
    }
}

#[async_trait]
impl<R: Runtime> Fetcher for SourceFetcher<'_, R> {
    #[tracing::instrument(skip(self, source))]
    async fn fetch(&self, package: &str, source: &SourceSpec, dest_dir: &Path) -> Result<PathBuf> {
        self.runtime.create_dir_all(dest_dir)?;
        let target = dest_dir.join(source.file_name());

        match &source.kind {
            SourceKind::Http => self.fetch_http(source, &target).await?,
            SourceKind::Git => self.fetch_git(source, &target).await?,
            SourceKind::Local(path) => return self.fetch_local(path, &target),
        }

        info!("Synced {} from {}", package, source.url);
        Ok(target)
    }
}
