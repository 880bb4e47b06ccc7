use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::{BuildFlags, BuildPipeline, Manifest};
use crate::archive::{ArchiveExtractor, Archives};
use crate::package::Package;
use crate::runtime::{CommandSpec, Runtime};

/// Builds from source with `sh` scripts or `make`, staging installs under
/// `<build>/<package>/pkg` before copying them into the destination.
pub struct SourceBuildPipeline<'a, R: Runtime> {
    runtime: &'a R,
    archives: Archives,
    build_root: PathBuf,
    manifest_dir: PathBuf,
}

impl<'a, R: Runtime> SourceBuildPipeline<'a, R> {
    pub fn new(
        runtime: &'a R,
        build_root: impl Into<PathBuf>,
        manifest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            archives: Archives::new(),
            build_root: build_root.into(),
            manifest_dir: manifest_dir.into(),
        }
    }

    fn work_dir(&self, package: &str) -> PathBuf {
        self.build_root.join(package)
    }

    fn staging_dir(&self, package: &str) -> PathBuf {
        self.work_dir(package).join("pkg")
    }

    pub fn manifest_path(&self, package: &str) -> PathBuf {
        self.manifest_dir.join(package)
    }

    fn reset_dir(&self, dir: &Path) -> Result<()> {
        if self.runtime.exists(dir) {
            self.runtime.remove_dir_all(dir)?;
        }
        self.runtime.create_dir_all(dir)
    }

    /// Script from the package definition, or the make fallback.
    fn script_or_make(&self, script: &Path, make_target: Option<&str>) -> CommandSpec {
        if self.runtime.exists(script) {
            CommandSpec::new("sh").path_arg(script)
        } else {
            let command = CommandSpec::new("make");
            match make_target {
                Some(target) => command.arg(target),
                None => command,
            }
        }
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<()> {
        self.runtime.create_dir_all(to)?;
        for entry in self.runtime.read_dir(from)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            if name == ".git" {
                continue;
            }
            let target = to.join(name);
            if self.runtime.is_dir(&entry) {
                self.copy_tree(&entry, &target)?;
            } else {
                self.runtime.copy(&entry, &target)?;
            }
        }
        Ok(())
    }

    /// Relative paths of every file below `dir`.
    fn collect_files(&self, dir: &Path, base: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.runtime.read_dir(dir)? {
            if self.runtime.is_dir(&entry) {
                self.collect_files(&entry, base, out)?;
            } else if let Ok(relative) = entry.strip_prefix(base) {
                out.push(relative.to_path_buf());
            }
        }
        Ok(())
    }
}

impl<R: Runtime> BuildPipeline for SourceBuildPipeline<'_, R> {
    #[tracing::instrument(skip(self, package), fields(package = %package.name))]
    fn extract(&self, package: &Package, artifact: &Path) -> Result<PathBuf> {
        let work = self.work_dir(&package.name);
        self.reset_dir(&work)?;
        let source_dir = work.join("src");

        if self.runtime.is_dir(artifact) {
            debug!("Copying checkout {:?} to {:?}", artifact, source_dir);
            self.copy_tree(artifact, &source_dir)?;
        } else if self.archives.can_handle(artifact) {
            self.archives.extract(self.runtime, artifact, &source_dir)?;
        } else {
            let file_name = artifact
                .file_name()
                .with_context(|| format!("Invalid source artifact {:?}", artifact))?;
            self.runtime.create_dir_all(&source_dir)?;
            self.runtime.copy(artifact, &source_dir.join(file_name))?;
        }

        info!("Extracted {} to {:?}", package.name, source_dir);
        Ok(source_dir)
    }

    #[tracing::instrument(skip(self))]
    fn apply_patches(&self, source_dir: &Path, patches: &[PathBuf]) -> Result<()> {
        for patch in patches {
            info!("Applying {:?}", patch);
            let command = CommandSpec::new("patch")
                .arg("-p1")
                .arg("-i")
                .path_arg(patch)
                .current_dir(source_dir);
            self.runtime
                .run(&command)
                .with_context(|| format!("Patch {:?} did not apply", patch))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, package), fields(package = %package.name))]
    fn compile(&self, package: &Package, source_dir: &Path, flags: &BuildFlags) -> Result<()> {
        let mut command = self
            .script_or_make(&package.build_script(), None)
            .current_dir(source_dir)
            .env("KILN_PACKAGE", &package.name);
        if let Some(cflags) = &flags.cflags {
            command = command.env("CFLAGS", cflags);
        }
        if let Some(ldflags) = &flags.ldflags {
            command = command.env("LDFLAGS", ldflags);
        }

        info!("Compiling {} with `{}`", package.name, command);
        self.runtime.run(&command)
    }

    #[tracing::instrument(skip(self, package), fields(package = %package.name))]
    fn install_to(&self, package: &Package, source_dir: &Path, dest_dir: &Path) -> Result<()> {
        let staging = self.staging_dir(&package.name);
        self.reset_dir(&staging)?;

        let command = self
            .script_or_make(&package.install_script(), Some("install"))
            .current_dir(source_dir)
            .env("KILN_PACKAGE", &package.name)
            .env("DESTDIR", staging.to_string_lossy());
        info!("Staging {} with `{}`", package.name, command);
        self.runtime.run(&command)?;

        let mut files = Vec::new();
        self.collect_files(&staging, &staging, &mut files)?;
        for relative in &files {
            let target = dest_dir.join(relative);
            if let Some(parent) = target.parent() {
                self.runtime.create_dir_all(parent)?;
            }
            self.runtime.copy(&staging.join(relative), &target)?;
        }

        Manifest::new(files).save(self.runtime, &self.manifest_path(&package.name))?;
        info!("Installed {} into {:?}", package.name, dest_dir);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn uninstall(&self, package: &str, dest_dir: &Path) -> Result<()> {
        let manifest_path = self.manifest_path(package);
        if !self.runtime.exists(&manifest_path) {
            bail!("No install manifest for {} at {:?}", package, manifest_path);
        }
        let manifest = Manifest::load(self.runtime, &manifest_path)?;

        let mut failed = 0;
        for relative in &manifest.files {
            let target = dest_dir.join(relative);
            if !self.runtime.exists(&target) {
                debug!("Already gone: {:?}", target);
                continue;
            }
            if let Err(e) = self.runtime.remove_file(&target) {
                warn!("{:#}", e);
                failed += 1;
            }
        }
        if failed > 0 {
            bail!("Could not remove {} file(s) of {}", failed, package);
        }

        self.runtime.remove_file(&manifest_path)?;
        info!("Uninstalled {} from {:?}", package, dest_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::create_tar_gz;
    use crate::package::Dependencies;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    fn package(dir: &Path, name: &str) -> Package {
        Package {
            name: name.to_string(),
            dir: dir.join("repo").join(name),
            dependencies: Dependencies::default(),
            source: None,
            patches: vec![],
        }
    }

    #[test]
    fn test_extract_archive_into_fresh_source_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("zlib-1.3.tar.gz");
        create_tar_gz(&archive, &[("zlib-1.3/Makefile", "all:")]).unwrap();

        let runtime = RealRuntime;
        let pipeline = SourceBuildPipeline::new(
            &runtime,
            dir.path().join("build"),
            dir.path().join("manifests"),
        );
        let pkg = package(dir.path(), "zlib");

        // Leftovers from an earlier build are discarded
        fs::create_dir_all(dir.path().join("build/zlib/src")).unwrap();
        fs::write(dir.path().join("build/zlib/src/stale.o"), "").unwrap();

        let source_dir = pipeline.extract(&pkg, &archive).unwrap();

        assert_eq!(source_dir, dir.path().join("build/zlib/src"));
        assert_eq!(fs::read_to_string(source_dir.join("Makefile")).unwrap(), "all:");
        assert!(!source_dir.join("stale.o").exists());
    }

    #[test]
    fn test_extract_checkout_skips_git_dir() {
        let dir = tempdir().unwrap();
        let checkout = dir.path().join("sources/tool/repo");
        fs::create_dir_all(checkout.join(".git")).unwrap();
        fs::create_dir_all(checkout.join("src")).unwrap();
        fs::write(checkout.join(".git/HEAD"), "ref").unwrap();
        fs::write(checkout.join("src/main.c"), "int main;").unwrap();

        let runtime = RealRuntime;
        let pipeline = SourceBuildPipeline::new(
            &runtime,
            dir.path().join("build"),
            dir.path().join("manifests"),
        );

        let source_dir = pipeline.extract(&package(dir.path(), "tool"), &checkout).unwrap();

        assert!(source_dir.join("src/main.c").exists());
        assert!(!source_dir.join(".git").exists());
    }

    #[test]
    fn test_extract_plain_file_is_copied() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.sub");
        fs::write(&file, "#!/bin/sh").unwrap();

        let runtime = RealRuntime;
        let pipeline = SourceBuildPipeline::new(
            &runtime,
            dir.path().join("build"),
            dir.path().join("manifests"),
        );

        let source_dir = pipeline.extract(&package(dir.path(), "cfg"), &file).unwrap();
        assert!(source_dir.join("config.sub").exists());
    }

    #[test]
    fn test_compile_defaults_to_make_with_flags() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_run()
            .withf(|c| {
                c.program == "make"
                    && c.args.is_empty()
                    && c.cwd.as_deref() == Some(Path::new("/build/zlib/src"))
                    && c.env_var("CFLAGS") == Some("-O2")
                    && c.env_var("LDFLAGS").is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let pipeline = SourceBuildPipeline::new(&runtime, "/build", "/manifests");
        let flags = BuildFlags {
            cflags: Some("-O2".into()),
            ldflags: None,
        };
        pipeline
            .compile(&package(Path::new("/"), "zlib"), Path::new("/build/zlib/src"), &flags)
            .unwrap();
    }

    #[test]
    fn test_compile_prefers_build_script() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_run()
            .withf(|c| c.program == "sh" && c.args == vec!["/repo/zlib/build".to_string()])
            .times(1)
            .returning(|_| Ok(()));

        let pipeline = SourceBuildPipeline::new(&runtime, "/build", "/manifests");
        pipeline
            .compile(
                &package(Path::new("/"), "zlib"),
                Path::new("/build/zlib/src"),
                &BuildFlags::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_patches_apply_in_order() {
        let mut runtime = MockRuntime::new();
        let mut seq = mockall::Sequence::new();
        for patch in ["/repo/zlib/patches/01-fix.patch", "/repo/zlib/patches/02-cve.diff"] {
            runtime
                .expect_run()
                .withf(move |c| c.program == "patch" && c.args == vec!["-p1", "-i", patch])
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let pipeline = SourceBuildPipeline::new(&runtime, "/build", "/manifests");
        pipeline
            .apply_patches(
                Path::new("/build/zlib/src"),
                &[
                    PathBuf::from("/repo/zlib/patches/01-fix.patch"),
                    PathBuf::from("/repo/zlib/patches/02-cve.diff"),
                ],
            )
            .unwrap();
    }

    #[test]
    fn test_failed_patch_names_the_patch() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .returning(|_| Err(anyhow::anyhow!("`patch` exited with exit status: 1")));

        let pipeline = SourceBuildPipeline::new(&runtime, "/build", "/manifests");
        let err = pipeline
            .apply_patches(Path::new("/src"), &[PathBuf::from("/p/bad.patch")])
            .unwrap_err();
        assert!(err.to_string().contains("bad.patch"));
    }

    #[cfg(unix)]
    #[test]
    fn test_install_then_uninstall_follows_manifest() {
        let dir = tempdir().unwrap();
        let pkg = package(dir.path(), "hello");
        fs::create_dir_all(&pkg.dir).unwrap();
        fs::write(
            pkg.install_script(),
            "mkdir -p \"$DESTDIR/usr/bin\" && echo hi > \"$DESTDIR/usr/bin/hello\"\n",
        )
        .unwrap();
        let source_dir = dir.path().join("build/hello/src");
        fs::create_dir_all(&source_dir).unwrap();
        let dest = dir.path().join("sysroot");
        fs::create_dir_all(dest.join("usr/bin")).unwrap();
        fs::write(dest.join("usr/bin/other"), "keep").unwrap();

        let runtime = RealRuntime;
        let pipeline = SourceBuildPipeline::new(
            &runtime,
            dir.path().join("build"),
            dir.path().join("manifests"),
        );

        pipeline.install_to(&pkg, &source_dir, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("usr/bin/hello")).unwrap(), "hi\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("manifests/hello")).unwrap(),
            "usr/bin/hello\n"
        );

        pipeline.uninstall("hello", &dest).unwrap();

        assert!(!dest.join("usr/bin/hello").exists());
        assert!(dest.join("usr/bin/other").exists());
        assert!(!dir.path().join("manifests/hello").exists());
    }

    #[test]
    fn test_uninstall_without_manifest_fails() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let pipeline = SourceBuildPipeline::new(&runtime, "/build", "/manifests");
        let err = pipeline.uninstall("zlib", Path::new("/")).unwrap_err();
        assert!(err.to_string().contains("No install manifest for zlib"));
    }
}
