use anyhow::Result;

use crate::{
    application::{RemoveAction, RemoveOutcome},
    runtime::Runtime,
    state::StateStore,
};

use super::config::Config;
use super::services::Services;

/// Remove an installed package
#[tracing::instrument(skip(runtime, config))]
pub fn remove<R: Runtime>(runtime: R, config: Config, name: &str, force: bool) -> Result<()> {
    let services = Services::from_config(&runtime, &config)?;
    let action = RemoveAction::new(&services.store, services.collaborators());

    let outcome = action.remove(name, force, &config.dest_dir)?;
    for line in render_outcome(name, &outcome) {
        println!("{}", line);
    }
    Ok(())
}

/// List packages installed as dependencies that nothing requires any more
#[tracing::instrument(skip(runtime, config))]
pub fn orphans<R: Runtime>(runtime: R, config: Config) -> Result<()> {
    let store = StateStore::new(&runtime, config.registry_path(), &config.repo);
    let orphans = store.find_orphans()?;
    if orphans.is_empty() {
        println!("No orphaned packages.");
        return Ok(());
    }
    for name in orphans {
        println!("{}", name);
    }
    Ok(())
}

fn render_outcome(name: &str, outcome: &RemoveOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if !outcome.dependents.is_empty() {
        lines.push(format!(
            "Warning: {} still required by {}",
            name,
            outcome.dependents.join(", ")
        ));
    }
    if let Some(error) = &outcome.uninstall_error {
        lines.push(format!("Warning: files of {} were not removed: {}", name, error));
    }
    lines.push(format!("Removed {}", name));
    if !outcome.orphans.is_empty() {
        lines.push(format!("Orphaned packages: {}", outcome.orphans.join(" ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::RemoveState;
    use crate::runtime::RealRuntime;
    use crate::state::InstallReason;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_render_outcome_with_warnings() {
        let outcome = RemoveOutcome {
            state: RemoveState::OrphanSwept,
            dependents: vec!["bar".into()],
            uninstall_error: Some("No install manifest for foo".into()),
            orphans: vec!["zlib".into(), "pcre".into()],
        };

        assert_eq!(
            render_outcome("foo", &outcome),
            vec![
                "Warning: foo still required by bar",
                "Warning: files of foo were not removed: No install manifest for foo",
                "Removed foo",
                "Orphaned packages: zlib pcre",
            ]
        );
    }

    #[test]
    fn test_render_outcome_clean() {
        let outcome = RemoveOutcome {
            state: RemoveState::OrphanSwept,
            dependents: vec![],
            uninstall_error: None,
            orphans: vec![],
        };
        assert_eq!(render_outcome("foo", &outcome), vec!["Removed foo"]);
    }

    #[test]
    fn test_remove_deletes_installed_files() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir_all(repo.join("foo")).unwrap();
        let dest = dir.path().join("sysroot");
        fs::create_dir_all(dest.join("usr/bin")).unwrap();
        fs::write(dest.join("usr/bin/foo"), "#!/bin/sh\n").unwrap();

        let config = Config {
            root: dir.path().to_path_buf(),
            repo: repo.clone(),
            dest_dir: dest.clone(),
        };
        fs::create_dir_all(config.manifests_dir()).unwrap();
        fs::write(config.manifests_dir().join("foo"), "usr/bin/foo\n").unwrap();

        let runtime = RealRuntime;
        StateStore::new(&runtime, config.registry_path(), &repo)
            .record_install("foo", InstallReason::Explicit, 1)
            .unwrap();

        // --- Execute ---
        remove(RealRuntime, config.clone(), "foo", false).unwrap();

        // --- Verify ---
        assert!(!dest.join("usr/bin/foo").exists());
        assert_eq!(fs::read_to_string(config.registry_path()).unwrap(), "");
    }

    #[test]
    fn test_orphans_without_registry() {
        let dir = tempdir().unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            repo: dir.path().join("repo"),
            dest_dir: PathBuf::from("/"),
        };
        orphans(RealRuntime, config).unwrap();
    }
}
