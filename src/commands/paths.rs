use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

const SYSTEM_ROOT: &str = "/var/lib/kiln";

/// Get the default state root: system-wide for root, per-user otherwise.
#[tracing::instrument(skip(runtime))]
pub fn default_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(PathBuf::from(SYSTEM_ROOT))
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".kiln"))
    }
}

/// Where packages install to when no `--destdir` is given.
///
/// Unprivileged users get a private sysroot under the state root so an
/// install never needs write access to `/`.
#[tracing::instrument(skip(runtime))]
pub fn default_dest_dir<R: Runtime>(runtime: &R, root: &Path) -> PathBuf {
    if runtime.is_privileged() {
        PathBuf::from("/")
    } else {
        root.join("sysroot")
    }
}
