//! Package definitions
//!
//! A package is a directory in the package repository:
//!
//! ```text
//! <repo>/<name>/
//!     depends       required dependencies, one name per line
//!     optdepends    optional dependencies (reported, never built)
//!     recommends    recommended dependencies (built unless skipped)
//!     source        "<url> [branch]"
//!     checksums     "<sha256>  <file>" lines
//!     patches/      *.patch / *.diff applied in name order
//!     build         build script (default: make)
//!     install       install script (default: make install)
//!     hooks/        per-package pre-/post- stage hooks
//! ```

mod declaration;
mod repository;
mod source;

pub use declaration::{Dependencies, DependencyKind, parse_name_list, validate_name};
pub use repository::PackageRepository;
pub use source::{SourceKind, SourceSpec};

use std::path::PathBuf;

/// A fully loaded package definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    /// Definition directory (`<repo>/<name>`)
    pub dir: PathBuf,
    pub dependencies: Dependencies,
    pub source: Option<SourceSpec>,
    /// Patch files, sorted by file name
    pub patches: Vec<PathBuf>,
}

impl Package {
    pub fn checksums_path(&self) -> PathBuf {
        self.dir.join("checksums")
    }

    pub fn build_script(&self) -> PathBuf {
        self.dir.join("build")
    }

    pub fn install_script(&self) -> PathBuf {
        self.dir.join("install")
    }
}
