//! The package registry file.
//!
//! One record per line: `<unix-timestamp> <name> <reason>`. Records are only
//! ever appended or filtered out; every mutation rewrites the whole file
//! through a temporary file and a rename, so a crash leaves either the old or
//! the new registry, never a torn one. Appends also drop records superseded
//! by a newer one for the same package, so the file stays one line per
//! package no matter how often it is rebuilt.

use anyhow::{Result, anyhow, bail};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use crate::error::KilnError;
use crate::runtime::Runtime;

/// Why a package was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallReason {
    /// Requested by the user
    Explicit,
    /// Pulled in to satisfy another package
    Dependency,
}

impl fmt::Display for InstallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallReason::Explicit => f.write_str("explicit"),
            InstallReason::Dependency => f.write_str("dependency"),
        }
    }
}

impl FromStr for InstallReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "explicit" => Ok(InstallReason::Explicit),
            "dependency" => Ok(InstallReason::Dependency),
            other => Err(anyhow!("Unknown install reason {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRecord {
    pub timestamp: i64,
    pub name: String,
    pub reason: InstallReason,
}

impl fmt::Display for InstallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.timestamp, self.name, self.reason)
    }
}

impl FromStr for InstallRecord {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (timestamp, name, reason) = match fields.as_slice() {
            [ts, name, reason] => (*ts, *name, reason.parse()?),
            // Records written before install reasons were tracked
            [ts, name] => (*ts, *name, InstallReason::Explicit),
            _ => bail!("Malformed registry line {:?}", line),
        };
        let timestamp = timestamp
            .parse()
            .map_err(|_| anyhow!("Malformed timestamp in registry line {:?}", line))?;
        Ok(InstallRecord {
            timestamp,
            name: name.to_string(),
            reason,
        })
    }
}

pub struct Registry<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl<'a, R: Runtime> Registry<'a, R> {
    pub fn new(runtime: &'a R, path: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        if !self.runtime.exists(&self.path) {
            return Ok(Vec::new());
        }
        let content = self.runtime.read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(String::from)
            .collect())
    }

    /// All parseable records in file order. Unparseable lines are skipped
    /// here but preserved by rewrites.
    pub fn records(&self) -> Result<Vec<InstallRecord>> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| match line.parse::<InstallRecord>() {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Ignoring registry line in {:?}: {}", self.path, e);
                    None
                }
            })
            .collect())
    }

    /// The most recent record for a package, which is authoritative.
    pub fn latest_record(&self, name: &str) -> Result<Option<InstallRecord>> {
        Ok(self.records()?.into_iter().rev().find(|r| r.name == name))
    }

    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.records()?.iter().any(|r| r.name == name))
    }

    /// Distinct installed names in order of first appearance.
    pub fn list_installed(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| seen.insert(r.name.clone()))
            .map(|r| r.name)
            .collect())
    }

    /// Latest record of every installed package, in order of first appearance.
    pub fn installed_records(&self) -> Result<Vec<InstallRecord>> {
        let records = self.records()?;
        let mut latest: Vec<InstallRecord> = Vec::new();
        for record in records {
            match latest.iter_mut().find(|r| r.name == record.name) {
                Some(existing) => *existing = record,
                None => latest.push(record),
            }
        }
        Ok(latest)
    }

    pub fn record_install(&self, name: &str, reason: InstallReason, timestamp: i64) -> Result<()> {
        self.record_installs(&[(name.to_string(), reason)], timestamp)
    }

    /// Append several records in a single atomic rewrite.
    #[tracing::instrument(skip(self))]
    pub fn record_installs(
        &self,
        installs: &[(String, InstallReason)],
        timestamp: i64,
    ) -> Result<()> {
        if installs.is_empty() {
            return Ok(());
        }
        let _guard = self.lock()?;

        let mut lines = self.read_lines()?;
        for (name, reason) in installs {
            let record = InstallRecord {
                timestamp,
                name: name.clone(),
                reason: *reason,
            };
            debug!("Recording install: {}", record);
            lines.push(record.to_string());
        }
        self.replace(&compact(lines))
    }

    /// Drop every record for a package. Returns how many records were removed.
    /// Every other line is written back unchanged.
    #[tracing::instrument(skip(self))]
    pub fn remove_record(&self, name: &str) -> Result<usize> {
        let _guard = self.lock()?;

        let lines = self.read_lines()?;
        let before = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| {
                line.parse::<InstallRecord>()
                    .map(|r| r.name != name)
                    .unwrap_or(true)
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            debug!("Removing {} record(s) for {}", removed, name);
            self.replace(&kept)?;
        }
        Ok(removed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| anyhow!("Registry lock poisoned"))
    }

    /// Replace the registry file contents atomically.
    fn replace(&self, lines: &[String]) -> Result<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        let tmp = self.temp_path();
        let result = (|| -> Result<()> {
            if let Some(parent) = self.path.parent()
                && !self.runtime.exists(parent)
            {
                self.runtime.create_dir_all(parent)?;
            }
            self.runtime.write(&tmp, content.as_bytes())?;
            self.runtime.rename(&tmp, &self.path)
        })();

        result.map_err(|source| {
            if self.runtime.exists(&tmp) {
                let _ = self.runtime.remove_file(&tmp);
            }
            KilnError::RegistryWriteFailure {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "installed".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

/// Keep only the last record of each package, in file order. Unparseable
/// lines are kept as they are.
fn compact(lines: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut kept: Vec<String> = lines
        .into_iter()
        .rev()
        .filter(|line| match line.parse::<InstallRecord>() {
            Ok(record) => seen.insert(record.name),
            Err(_) => true,
        })
        .collect();
    kept.reverse();
    kept
}
