use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Files a package placed under its destination, relative to it.
///
/// Stored as `<root>/manifests/<package>`, one path per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub files: Vec<PathBuf>,
}

impl Manifest {
    pub fn new(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        Self { files }
    }

    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read install manifest {:?}", path))?;
        Ok(Self {
            files: content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect(),
        })
    }

    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            runtime.create_dir_all(parent)?;
        }
        let mut content = String::new();
        for file in &self.files {
            content.push_str(&file.to_string_lossy());
            content.push('\n');
        }
        runtime.write(path, content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    #[test]
    fn test_new_sorts_and_dedups() {
        let manifest = Manifest::new(vec![
            PathBuf::from("usr/lib/libz.a"),
            PathBuf::from("usr/include/zlib.h"),
            PathBuf::from("usr/lib/libz.a"),
        ]);
        assert_eq!(
            manifest.files,
            vec![PathBuf::from("usr/include/zlib.h"), PathBuf::from("usr/lib/libz.a")]
        );
    }

    #[test]
    fn test_save_and_load() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_create_dir_all()
            .with(eq(Path::new("/kiln/manifests")))
            .returning(|_| Ok(()));
        runtime
            .expect_write()
            .withf(|path, contents| {
                path == Path::new("/kiln/manifests/zlib") && contents == b"usr/include/zlib.h\n"
            })
            .returning(|_, _| Ok(()));
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("usr/include/zlib.h\n\n".into()));

        let manifest = Manifest::new(vec![PathBuf::from("usr/include/zlib.h")]);
        manifest
            .save(&runtime, Path::new("/kiln/manifests/zlib"))
            .unwrap();

        let loaded = Manifest::load(&runtime, Path::new("/kiln/manifests/zlib")).unwrap();
        assert_eq!(loaded, manifest);
    }
}
