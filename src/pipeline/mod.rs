//! Build pipeline contract and the default source build.
//!
//! The orchestrator drives a package through extract, patch, compile and
//! install-to. Uninstall is the inverse of install-to and is best-effort.

mod manifest;
mod source;

pub use manifest::Manifest;
pub use source::SourceBuildPipeline;

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::package::Package;

/// Build stages, in the order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Sync,
    Verify,
    Extract,
    Patch,
    Compile,
    Install,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStage::Sync => "sync",
            BuildStage::Verify => "verify",
            BuildStage::Extract => "extract",
            BuildStage::Patch => "patch",
            BuildStage::Compile => "compile",
            BuildStage::Install => "install",
        };
        f.write_str(s)
    }
}

/// Compiler flags exported to build scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub cflags: Option<String>,
    pub ldflags: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
pub trait BuildPipeline: Send + Sync {
    /// Unpack `artifact` (archive, checkout or plain file) into a fresh
    /// source directory and return it.
    fn extract(&self, package: &Package, artifact: &Path) -> Result<PathBuf>;

    fn apply_patches(&self, source_dir: &Path, patches: &[PathBuf]) -> Result<()>;

    fn compile(&self, package: &Package, source_dir: &Path, flags: &BuildFlags) -> Result<()>;

    fn install_to(&self, package: &Package, source_dir: &Path, dest_dir: &Path) -> Result<()>;

    /// Remove what `install_to` placed under `dest_dir`.
    fn uninstall(&self, package: &str, dest_dir: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_is_a_verb() {
        assert_eq!(BuildStage::Sync.to_string(), "sync");
        assert_eq!(BuildStage::Compile.to_string(), "compile");
        assert_eq!(BuildStage::Install.to_string(), "install");
    }
}
