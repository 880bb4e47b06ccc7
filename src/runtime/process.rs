//! Child process execution.

use anyhow::{Context, Result, bail};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::RealRuntime;

/// A fully described child process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl CommandSpec {
    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_impl(&self, spec: &CommandSpec) -> Result<()> {
        debug!("Running `{}` in {:?}", spec, spec.cwd);

        let status = spec
            .to_command()
            .status()
            .with_context(|| format!("Failed to start `{}`", spec.program))?;

        if !status.success() {
            bail!("`{}` exited with {}", spec, status);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn run_async_impl(&self, spec: &CommandSpec) -> Result<()> {
        debug!("Running `{}` in {:?} (async)", spec, spec.cwd);

        let status = tokio::process::Command::from(spec.to_command())
            .status()
            .await
            .with_context(|| format!("Failed to start `{}`", spec.program))?;

        if !status.success() {
            bail!("`{}` exited with {}", spec, status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use tempfile::tempdir;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("make")
            .arg("install")
            .current_dir("/tmp/src")
            .env("DESTDIR", "/tmp/pkg")
            .env("DESTDIR", "/tmp/pkg2");

        assert_eq!(spec.to_string(), "make install");
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp/src")));
        assert_eq!(spec.env_var("DESTDIR"), Some("/tmp/pkg2"));
        assert_eq!(spec.env_var("CFLAGS"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runtime_run_success_and_env() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo \"$GREETING\" > out.txt")
            .current_dir(dir.path())
            .env("GREETING", "hello");

        RealRuntime.run(&spec).unwrap();
        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runtime_run_failure_reports_command() {
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 3");
        let err = RealRuntime.run(&spec).unwrap_err();
        assert!(err.to_string().contains("sh -c exit 3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_runtime_run_async_failure_reports_command() {
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 4");
        let err = RealRuntime.run_async(&spec).await.unwrap_err();
        assert!(err.to_string().contains("sh -c exit 4"));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn test_real_runtime_run_async_children_overlap() {
        // Two half-second children on a single-threaded runtime only finish
        // well under a second if neither blocks the executor.
        let slow = CommandSpec::new("sh").arg("-c").arg("sleep 0.5");
        let started = std::time::Instant::now();

        let (first, second) = tokio::join!(
            RealRuntime.run_async(&slow),
            RealRuntime.run_async(&slow)
        );
        first.unwrap();
        second.unwrap();

        assert!(
            started.elapsed() < std::time::Duration::from_millis(900),
            "children ran back to back: {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_real_runtime_run_missing_program() {
        let spec = CommandSpec::new("kiln-definitely-not-a-real-program");
        let err = RealRuntime.run(&spec).unwrap_err();
        assert!(err.to_string().contains("Failed to start"));
    }
}
