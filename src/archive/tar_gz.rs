use crate::runtime::Runtime;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, promote, scratch_dir};

/// Extractor for .tar.gz, .tgz and plain .tar archives
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".tar")
    }

    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting tar archive to {:?}...", extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let name = archive_path.to_string_lossy().to_lowercase();
        let reader: Box<dyn Read> = if name.ends_with(".tar") {
            file
        } else {
            Box::new(GzDecoder::new(file))
        };

        let scratch = scratch_dir(runtime, extract_to)?;
        if let Err(e) = unpack(runtime, Archive::new(reader), &scratch) {
            let _ = runtime.remove_dir_all(&scratch);
            return Err(e.context(format!("Failed to unpack {:?}", archive_path)));
        }

        promote(runtime, &scratch, extract_to)
    }
}

fn unpack<R: Runtime, T: Read>(runtime: &R, mut archive: Archive<T>, into: &Path) -> Result<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.into_owned();
        let Some(relative) = enclosed(&raw_path) else {
            warn!("Skipping unsafe archive entry {:?}", raw_path);
            continue;
        };
        let full_path = into.join(&relative);

        let kind = entry.header().entry_type();
        match kind {
            EntryType::Directory => runtime.create_dir_all(&full_path)?,
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = full_path.parent() {
                    runtime.create_dir_all(parent)?;
                }
                let mut dest = runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut dest)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                drop(dest);
                if let Ok(mode) = entry.header().mode()
                    && let Err(e) = runtime.set_permissions(&full_path, mode)
                {
                    debug!("Failed to set permissions on {:?}: {}", full_path, e);
                }
            }
            EntryType::Symlink => {
                let Some(target) = entry.link_name()? else {
                    continue;
                };
                if let Some(parent) = full_path.parent() {
                    runtime.create_dir_all(parent)?;
                }
                runtime.symlink(&target, &full_path)?;
            }
            // Global/extended headers carry metadata only
            EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName => {}
            other => debug!("Skipping {:?} entry {:?}", other, raw_path),
        }
    }
    Ok(())
}

/// Relative path inside the archive root, or None for absolute or `..` paths.
fn enclosed(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}
