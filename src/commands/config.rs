use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::runtime::Runtime;

use super::paths::{default_dest_dir, default_root};

/// Resolved locations for one invocation.
///
/// Everything kiln owns lives under `root`: the registry file, install
/// manifests, fetched sources, build trees and global hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    /// Package definitions, one directory per package
    pub repo: PathBuf,
    /// Install destination
    pub dest_dir: PathBuf,
}

impl Config {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(
        runtime: &R,
        root: Option<PathBuf>,
        repo: Option<PathBuf>,
        dest_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let root = match root {
            Some(path) => path,
            None => default_root(runtime)?,
        };
        let repo = repo.unwrap_or_else(|| root.join("repo"));
        let dest_dir = dest_dir.unwrap_or_else(|| default_dest_dir(runtime, &root));

        debug!(
            "Using root {:?}, repository {:?}, destination {:?}",
            root, repo, dest_dir
        );
        Ok(Self {
            root,
            repo,
            dest_dir,
        })
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join("installed")
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.root.join("hooks")
    }
}
