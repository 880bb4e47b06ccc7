use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::str::FromStr;

/// How a package's source is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A git repository, cloned and updated in place
    Git,
    /// A file on the local machine
    Local(PathBuf),
    /// An archive or file downloaded over HTTP(S)
    Http,
}

/// Parsed `source` declaration: `<url> [branch]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub url: String,
    pub branch: Option<String>,
    pub kind: SourceKind,
}

impl SourceSpec {
    /// Parse the first meaningful line of a `source` file.
    /// Returns `Ok(None)` when the file declares nothing.
    pub fn parse(content: &str) -> Result<Option<Self>> {
        content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|line| line.parse::<SourceSpec>())
            .transpose()
    }

    /// File name the fetched artifact is stored under.
    pub fn file_name(&self) -> String {
        match &self.kind {
            SourceKind::Git => "repo".to_string(),
            SourceKind::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "source".to_string()),
            SourceKind::Http => self
                .url
                .split(['?', '#'])
                .next()
                .and_then(|u| u.rsplit('/').next())
                .filter(|n| !n.is_empty())
                .unwrap_or("source")
                .to_string(),
        }
    }
}

impl FromStr for SourceSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split_whitespace();
        let raw = fields
            .next()
            .ok_or_else(|| anyhow!("Empty source declaration"))?;
        let branch = fields.next().map(String::from);

        let (url, kind) = if let Some(rest) = raw.strip_prefix("git+") {
            (rest.to_string(), SourceKind::Git)
        } else if raw.ends_with(".git") {
            (raw.to_string(), SourceKind::Git)
        } else if let Some(path) = raw.strip_prefix("file://") {
            (raw.to_string(), SourceKind::Local(PathBuf::from(path)))
        } else if raw.starts_with('/') {
            (raw.to_string(), SourceKind::Local(PathBuf::from(raw)))
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            (raw.to_string(), SourceKind::Http)
        } else {
            return Err(anyhow!("Unsupported source URL: {}", raw));
        };

        if branch.is_some() && kind != SourceKind::Git {
            return Err(anyhow!("A branch can only be given for git sources: {}", s));
        }

        Ok(SourceSpec { url, branch, kind })
    }
}
