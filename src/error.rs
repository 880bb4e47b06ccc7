use std::path::PathBuf;

use thiserror::Error;

use crate::hooks::HookStage;
use crate::pipeline::BuildStage;

/// Failures with a defined meaning for the package lifecycle.
///
/// Operations return `anyhow::Result`; callers that need to react to a
/// specific failure recover it with `downcast_ref::<KilnError>()`.
#[derive(Error, Debug)]
pub enum KilnError {
    /// A package was re-entered while still on the active resolution path.
    #[error(
        "Dependency cycle detected: {package} is required by {parent}, which {package} depends on"
    )]
    CycleDetected { package: String, parent: String },

    /// A build pipeline stage failed for a package.
    #[error("Failed to {stage} {package}")]
    BuildPipelineFailure {
        package: String,
        stage: BuildStage,
        #[source]
        source: anyhow::Error,
    },

    /// Removal refused because installed packages still require the package.
    #[error(
        "Cannot remove {package}: required by {}. Use --force to remove it anyway.",
        .dependents.join(", ")
    )]
    BlockedRemoval {
        package: String,
        dependents: Vec<String>,
    },

    /// A fetched file does not match its recorded checksum.
    #[error("Checksum mismatch for {file:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },

    /// The registry could not be rewritten; the previous file is left in place.
    #[error("Failed to update package registry at {path:?}")]
    RegistryWriteFailure {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A pre-stage hook failed, so the stage was not run.
    #[error("pre-{stage} hook failed for {package}")]
    HookFailure {
        stage: HookStage,
        package: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Package {0} is not installed.")]
    NotInstalled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_both_packages() {
        let err = KilnError::CycleDetected {
            package: "x".into(),
            parent: "y".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("x is required by y"));
    }

    #[test]
    fn test_blocked_removal_lists_dependents() {
        let err = KilnError::BlockedRemoval {
            package: "foo".into(),
            dependents: vec!["bar".into(), "baz".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cannot remove foo: required by bar, baz. Use --force to remove it anyway."
        );
    }

    #[test]
    fn test_pipeline_failure_keeps_source() {
        let err = KilnError::BuildPipelineFailure {
            package: "zlib".into(),
            stage: BuildStage::Compile,
            source: anyhow::anyhow!("`make` exited with exit status: 2"),
        };
        assert_eq!(err.to_string(), "Failed to compile zlib");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("exit status: 2"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = KilnError::NotInstalled("foo".into()).into();
        assert!(matches!(
            err.downcast_ref::<KilnError>(),
            Some(KilnError::NotInstalled(name)) if name == "foo"
        ));
    }
}
