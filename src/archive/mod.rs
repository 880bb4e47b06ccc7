//! Source archive extraction.
//!
//! Extractors unpack into a scratch directory next to the destination and then
//! move the contents into place. When an archive wraps everything in a single
//! top-level directory (`zlib-1.3/...`), that directory is stripped.

mod tar_gz;
mod zip;

use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::{Path, PathBuf};

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Trait for format-specific archive extractors
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Extract the archive into `extract_to`, which is created if missing
    fn extract<R: Runtime>(&self, runtime: &R, archive_path: &Path, extract_to: &Path)
    -> Result<()>;
}

/// Dispatcher that selects the appropriate extractor based on archive format.
pub struct Archives {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Default for Archives {
    fn default() -> Self {
        Self::new()
    }
}

impl Archives {
    pub fn new() -> Self {
        Self {
            tar_gz: TarGzExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for Archives {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.tar_gz.can_handle(archive_path) || self.zip.can_handle(archive_path)
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        if self.tar_gz.can_handle(archive_path) {
            return self.tar_gz.extract(runtime, archive_path, extract_to);
        }
        if self.zip.can_handle(archive_path) {
            return self.zip.extract(runtime, archive_path, extract_to);
        }
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path.display()
        ))
    }
}

/// Fresh scratch directory used while unpacking into `extract_to`.
pub(crate) fn scratch_dir<R: Runtime>(runtime: &R, extract_to: &Path) -> Result<PathBuf> {
    let name = extract_to
        .file_name()
        .with_context(|| format!("Invalid extraction target {:?}", extract_to))?;
    let scratch = extract_to.with_file_name(format!("{}.unpack", name.to_string_lossy()));
    if runtime.exists(&scratch) {
        runtime.remove_dir_all(&scratch)?;
    }
    runtime.create_dir_all(&scratch)?;
    Ok(scratch)
}

/// Move the unpacked tree from `scratch` into `extract_to` and drop `scratch`.
pub(crate) fn promote<R: Runtime>(runtime: &R, scratch: &Path, extract_to: &Path) -> Result<()> {
    let entries = runtime
        .read_dir(scratch)
        .context("Failed to read scratch extraction directory")?;

    let source_dir = match entries.as_slice() {
        [] => {
            runtime.remove_dir_all(scratch)?;
            return Err(anyhow!("Archive appears to be empty."));
        }
        [only] if runtime.is_dir(only) => only.clone(),
        _ => scratch.to_path_buf(),
    };

    runtime.create_dir_all(extract_to)?;
    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let file_name = item
            .file_name()
            .with_context(|| format!("Invalid archive entry {:?}", item))?;
        runtime.rename(&item, &extract_to.join(file_name))?;
    }

    runtime.remove_dir_all(scratch)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use anyhow::Result;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::{self, File};
    use tar::Builder;
    use tempfile::tempdir;

    pub(crate) fn create_tar_gz(path: &Path, files: &[(&str, &str)]) -> Result<()> {
        let file = File::create(path)?;
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = Builder::new(enc);

        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name)?;
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, content.as_bytes())?;
        }

        tar.into_inner()?.finish()?;
        Ok(())
    }

    pub(crate) fn create_zip(path: &Path, files: &[(&str, &str)]) -> Result<()> {
        use ::zip::CompressionMethod;
        use ::zip::ZipWriter;
        use ::zip::write::FileOptions;
        use std::io::Write;

        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in files {
            zip.start_file(*name, options)?;
            zip.write_all(content.as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    #[test]
    fn test_archives_can_handle() {
        let archives = Archives::new();
        assert!(archives.can_handle(Path::new("zlib-1.3.tar.gz")));
        assert!(archives.can_handle(Path::new("zlib-1.3.tgz")));
        assert!(archives.can_handle(Path::new("zlib-1.3.TAR.GZ")));
        assert!(archives.can_handle(Path::new("zlib-1.3.zip")));
        assert!(!archives.can_handle(Path::new("zlib-1.3.tar.xz")));
        assert!(!archives.can_handle(Path::new("zlib.h")));
    }

    #[test]
    fn test_dispatches_to_tar_gz_and_strips_root() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("zlib-1.3.tar.gz");
        let extract_path = dir.path().join("src");

        create_tar_gz(
            &archive_path,
            &[("zlib-1.3/configure", "#!/bin/sh"), ("zlib-1.3/lib/zlib.h", "header")],
        )?;

        Archives::new().extract(&RealRuntime, &archive_path, &extract_path)?;

        assert_eq!(fs::read_to_string(extract_path.join("configure"))?, "#!/bin/sh");
        assert_eq!(fs::read_to_string(extract_path.join("lib/zlib.h"))?, "header");
        assert!(!dir.path().join("src.unpack").exists());
        Ok(())
    }

    #[test]
    fn test_dispatches_to_zip_without_common_root() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("tool.zip");
        let extract_path = dir.path().join("src");

        create_zip(&archive_path, &[("Makefile", "all:"), ("main.c", "int main;")])?;

        Archives::new().extract(&RealRuntime, &archive_path, &extract_path)?;

        assert_eq!(fs::read_to_string(extract_path.join("Makefile"))?, "all:");
        assert_eq!(fs::read_to_string(extract_path.join("main.c"))?, "int main;");
        Ok(())
    }

    #[test]
    fn test_unsupported_format() {
        let result = Archives::new().extract(
            &RealRuntime,
            Path::new("/tmp/file.unknown"),
            Path::new("/tmp/out"),
        );
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unsupported archive format")
        );
    }

    #[test]
    fn test_empty_archive_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("empty.tar.gz");
        create_tar_gz(&archive_path, &[])?;

        let err = Archives::new()
            .extract(&RealRuntime, &archive_path, &dir.path().join("src"))
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
        Ok(())
    }
}
