//! Package repository: the tree of package definitions.
//!
//! The repository is read-only input. Missing declaration files are never an
//! error; they mean "nothing declared".

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::{Dependencies, DependencyKind, Package, SourceSpec, parse_name_list, validate_name};

const PATCH_PATTERNS: [&str; 2] = ["*.patch", "*.diff"];

/// Read access to package definitions under `<repo>/<name>/`.
pub struct PackageRepository<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> PackageRepository<'a, R> {
    pub fn new(runtime: &'a R, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the definition directory for a package.
    ///
    /// Returns: `<repo>/<name>`
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Check whether the repository has a definition for the package.
    pub fn contains(&self, name: &str) -> bool {
        self.runtime.is_dir(&self.package_dir(name))
    }

    /// Load one declaration list. An absent file is an empty list.
    pub fn load_declaration(&self, name: &str, kind: DependencyKind) -> Result<Vec<String>> {
        let path = self.package_dir(name).join(kind.file_name());
        if !self.runtime.exists(&path) {
            return Ok(Vec::new());
        }
        let content = self
            .runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read {} dependencies of {}", kind, name))?;
        parse_name_list(&content).with_context(|| {
            format!(
                "Invalid {} dependency declared by {} in {:?}",
                kind, name, path
            )
        })
    }

    /// Load all three declaration lists of a package.
    #[tracing::instrument(skip(self))]
    pub fn load_dependencies(&self, name: &str) -> Result<Dependencies> {
        let mut deps = Dependencies::default();
        for kind in DependencyKind::ALL {
            deps.set(kind, self.load_declaration(name, kind)?);
        }
        debug!(
            "{}: {} required, {} optional, {} recommended",
            name,
            deps.required.len(),
            deps.optional.len(),
            deps.recommended.len()
        );
        Ok(deps)
    }

    /// Load the full definition needed to build a package.
    #[tracing::instrument(skip(self))]
    pub fn load(&self, name: &str) -> Result<Package> {
        validate_name(name)?;
        let dir = self.package_dir(name);
        if !self.runtime.is_dir(&dir) {
            anyhow::bail!("No package definition for {} in {:?}", name, self.root);
        }

        let dependencies = self.load_dependencies(name)?;

        let source_path = dir.join("source");
        let source = if self.runtime.exists(&source_path) {
            let content = self.runtime.read_to_string(&source_path)?;
            SourceSpec::parse(&content)
                .with_context(|| format!("Invalid source declaration for {}", name))?
        } else {
            None
        };

        let patches = self.find_patches(&dir.join("patches"))?;

        Ok(Package {
            name: name.to_string(),
            dir,
            dependencies,
            source,
            patches,
        })
    }

    fn find_patches(&self, patches_dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.runtime.is_dir(patches_dir) {
            return Ok(Vec::new());
        }

        let patterns: Vec<glob::Pattern> = PATCH_PATTERNS
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<_, _>>()?;

        let mut patches: Vec<PathBuf> = self
            .runtime
            .read_dir(patches_dir)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| patterns.iter().any(|p| p.matches(n)))
            })
            .collect();
        patches.sort();
        Ok(patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::SourceKind;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_declaration_is_empty() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let repo = PackageRepository::new(&runtime, "/repo");
        let deps = repo.load_dependencies("ghost").unwrap();

        assert_eq!(deps, Dependencies::default());
    }

    #[test]
    fn test_load_dependencies_reads_each_list() {
        let mut runtime = MockRuntime::new();
        let depends = PathBuf::from("/repo/curl/depends");
        let recommends = PathBuf::from("/repo/curl/recommends");

        let existing = [depends.clone(), recommends.clone()];
        runtime
            .expect_exists()
            .returning(move |p| existing.iter().any(|e| e == p));
        runtime
            .expect_read_to_string()
            .with(eq(depends))
            .times(1)
            .returning(|_| Ok("zlib\nopenssl\n".into()));
        runtime
            .expect_read_to_string()
            .with(eq(recommends))
            .times(1)
            .returning(|_| Ok("# nice to have\nca-certificates\n".into()));

        let repo = PackageRepository::new(&runtime, "/repo");
        let deps = repo.load_dependencies("curl").unwrap();

        assert_eq!(deps.required, vec!["zlib", "openssl"]);
        assert!(deps.optional.is_empty());
        assert_eq!(deps.recommended, vec!["ca-certificates"]);
    }

    #[test]
    fn test_unreadable_declaration_is_an_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let repo = PackageRepository::new(&runtime, "/repo");
        let err = repo.load_dependencies("curl").unwrap_err();

        assert!(err.to_string().contains("required dependencies of curl"));
    }

    #[test]
    fn test_load_full_package() {
        let dir = tempdir().unwrap();
        let pkg_dir = dir.path().join("xz");
        fs::create_dir_all(pkg_dir.join("patches")).unwrap();
        fs::write(pkg_dir.join("depends"), "glibc\n").unwrap();
        fs::write(
            pkg_dir.join("source"),
            "https://example.com/xz-5.6.tar.gz\n",
        )
        .unwrap();
        fs::write(pkg_dir.join("patches/02-second.diff"), "").unwrap();
        fs::write(pkg_dir.join("patches/01-first.patch"), "").unwrap();
        fs::write(pkg_dir.join("patches/README"), "").unwrap();

        let runtime = RealRuntime;
        let repo = PackageRepository::new(&runtime, dir.path());
        let package = repo.load("xz").unwrap();

        assert_eq!(package.name, "xz");
        assert_eq!(package.dependencies.required, vec!["glibc"]);
        assert_eq!(package.source.unwrap().kind, SourceKind::Http);
        let patch_names: Vec<_> = package
            .patches
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(patch_names, vec!["01-first.patch", "02-second.diff"]);
        assert!(repo.contains("xz"));
        assert!(!repo.contains("zstd"));
    }

    #[test]
    fn test_declared_path_name_is_an_error() {
        let mut runtime = MockRuntime::new();
        let depends = PathBuf::from("/repo/app/depends");
        let existing = depends.clone();
        runtime.expect_exists().returning(move |p| p == existing);
        runtime
            .expect_read_to_string()
            .with(eq(depends))
            .returning(|_| Ok("zlib\n../outside\n".into()));

        let repo = PackageRepository::new(&runtime, "/repo");
        let err = repo.load_dependencies("app").unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("required dependency declared by app"));
        assert!(message.contains("../outside"));
    }

    #[test]
    fn test_load_rejects_invalid_name() {
        // No runtime expectations: the name is refused before any lookup
        let runtime = MockRuntime::new();
        let repo = PackageRepository::new(&runtime, "/repo");

        assert!(repo.load("../etc").is_err());
    }

    #[test]
    fn test_load_unknown_package_fails() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let repo = PackageRepository::new(&runtime, dir.path());

        let err = repo.load("nope").unwrap_err();
        assert!(err.to_string().contains("No package definition for nope"));
    }
}
