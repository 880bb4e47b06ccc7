//! SHA-256 verification of fetched sources.
//!
//! Checksums live next to the package definition in `checksums`, one
//! `<sha256>  <file name>` line per file (the `sha256sum` output format).
//! A file without an entry gets one generated on first use.

use anyhow::{Context, Result};
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumOutcome {
    Match,
    Mismatch { expected: String, actual: String },
    /// No checksum was recorded; the computed one has been stored
    Generated(String),
}

#[cfg_attr(test, mockall::automock)]
pub trait Verifier: Send + Sync {
    fn verify_or_generate(&self, file: &Path, checksums: &Path) -> Result<ChecksumOutcome>;
}

pub struct Sha256Verifier<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> Sha256Verifier<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    pub fn digest(&self, file: &Path) -> Result<String> {
        let mut reader = self.runtime.open(file)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .with_context(|| format!("Failed to read {:?}", file))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn expected_for<'c>(checksums: &'c str, file_name: &str) -> Option<&'c str> {
    checksums.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let sum = fields.next()?;
        let name = fields.next()?.trim_start_matches('*');
        (name == file_name).then_some(sum)
    })
}

impl<R: Runtime> Verifier for Sha256Verifier<'_, R> {
    #[tracing::instrument(skip(self))]
    fn verify_or_generate(&self, file: &Path, checksums: &Path) -> Result<ChecksumOutcome> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Cannot checksum {:?}: no file name", file))?;
        let actual = self.digest(file)?;

        let recorded = if self.runtime.exists(checksums) {
            self.runtime.read_to_string(checksums)?
        } else {
            String::new()
        };

        match expected_for(&recorded, file_name) {
            Some(expected) if expected.eq_ignore_ascii_case(&actual) => {
                debug!("Checksum ok for {}", file_name);
                Ok(ChecksumOutcome::Match)
            }
            Some(expected) => Ok(ChecksumOutcome::Mismatch {
                expected: expected.to_string(),
                actual,
            }),
            None => {
                let mut content = recorded;
                if !content.is_empty() && !content.ends_with('\n') {
                    content.push('\n');
                }
                content.push_str(&format!("{}  {}\n", actual, file_name));
                self.runtime
                    .write(checksums, content.as_bytes())
                    .with_context(|| format!("Failed to store checksum in {:?}", checksums))?;
                info!("Generated checksum for {}", file_name);
                Ok(ChecksumOutcome::Generated(actual))
            }
        }
    }
}
