use anyhow::{Context, Result, bail};
use std::fmt;

/// The three kinds of dependency declarations a package can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Required,
    Optional,
    Recommended,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::Required,
        DependencyKind::Optional,
        DependencyKind::Recommended,
    ];

    /// Declaration file name inside the package directory.
    pub fn file_name(self) -> &'static str {
        match self {
            DependencyKind::Required => "depends",
            DependencyKind::Optional => "optdepends",
            DependencyKind::Recommended => "recommends",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyKind::Required => "required",
            DependencyKind::Optional => "optional",
            DependencyKind::Recommended => "recommended",
        };
        f.write_str(s)
    }
}

/// Declared dependency names of one package. A missing list is an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub recommended: Vec<String>,
}

impl Dependencies {
    pub fn get(&self, kind: DependencyKind) -> &[String] {
        match kind {
            DependencyKind::Required => &self.required,
            DependencyKind::Optional => &self.optional,
            DependencyKind::Recommended => &self.recommended,
        }
    }

    pub fn set(&mut self, kind: DependencyKind, names: Vec<String>) {
        match kind {
            DependencyKind::Required => self.required = names,
            DependencyKind::Optional => self.optional = names,
            DependencyKind::Recommended => self.recommended = names,
        }
    }

    pub fn requires(&self, name: &str) -> bool {
        self.required.iter().any(|n| n == name)
    }
}

/// Parse a newline-delimited list of package names.
///
/// Blank lines and `#` comments are skipped. Only the first field of a line is
/// the name, so trailing annotations (`zlib  # for compression`) are allowed.
/// Duplicates keep their first position. A name that fails [`validate_name`]
/// is an error naming the offending line.
pub fn parse_name_list(content: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };
        validate_name(name).with_context(|| format!("line {}: {:?}", number + 1, line))?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Reject names that cannot be stored in the registry or used as a directory.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Package name must not be empty");
    }
    if name.chars().any(char::is_whitespace) {
        bail!("Invalid package name {:?}: contains whitespace", name);
    }
    if name.contains('/') || name.contains('\\') {
        bail!("Invalid package name {:?}: contains a path separator", name);
    }
    if name.starts_with('.') || name.starts_with('#') || name.starts_with('-') {
        bail!("Invalid package name {:?}", name);
    }
    Ok(())
}
