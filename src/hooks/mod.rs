//! Pre/post extension points around lifecycle stages.

use anyhow::Result;
use log::{debug, info};
use std::fmt;
use std::path::PathBuf;

use crate::runtime::{CommandSpec, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    Sync,
    Build,
    Install,
    Remove,
    Upgrade,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookStage::Sync => "sync",
            HookStage::Build => "build",
            HookStage::Install => "install",
            HookStage::Remove => "remove",
            HookStage::Upgrade => "upgrade",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Pre,
    Post,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Pre => f.write_str("pre"),
            HookPhase::Post => f.write_str("post"),
        }
    }
}

/// Runs an optional extension point. A missing hook is a no-op.
#[cfg_attr(test, mockall::automock)]
pub trait HookRunner: Send + Sync {
    fn run_hook(&self, stage: HookStage, phase: HookPhase, package: &str) -> Result<()>;
}

/// Hook scripts named `<phase>-<stage>` (e.g. `pre-build`).
///
/// The global hook in `<root>/hooks` runs first, then the package's own hook
/// in `<repo>/<package>/hooks`.
pub struct ScriptHooks<'a, R: Runtime> {
    runtime: &'a R,
    global_dir: PathBuf,
    repo_root: PathBuf,
}

impl<'a, R: Runtime> ScriptHooks<'a, R> {
    pub fn new(
        runtime: &'a R,
        global_dir: impl Into<PathBuf>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            global_dir: global_dir.into(),
            repo_root: repo_root.into(),
        }
    }

    fn candidates(&self, stage: HookStage, phase: HookPhase, package: &str) -> [PathBuf; 2] {
        let file = format!("{}-{}", phase, stage);
        [
            self.global_dir.join(&file),
            self.repo_root.join(package).join("hooks").join(&file),
        ]
    }
}

impl<R: Runtime> HookRunner for ScriptHooks<'_, R> {
    #[tracing::instrument(skip(self))]
    fn run_hook(&self, stage: HookStage, phase: HookPhase, package: &str) -> Result<()> {
        for script in self.candidates(stage, phase, package) {
            if !self.runtime.exists(&script) {
                debug!("No hook at {:?}", script);
                continue;
            }
            info!("Running {}-{} hook {:?} for {}", phase, stage, script, package);
            let command = CommandSpec::new("sh")
                .path_arg(&script)
                .arg(package)
                .env("KILN_PACKAGE", package)
                .env("KILN_HOOK_STAGE", stage.to_string())
                .env("KILN_HOOK_PHASE", phase.to_string());
            self.runtime.run(&command)?;
        }
        Ok(())
    }
}
