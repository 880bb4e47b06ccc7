use anyhow::Result;

use crate::{
    package::PackageRepository,
    resolver::{Resolution, ResolvePolicy, Resolver},
    runtime::Runtime,
    state::StateStore,
};

use super::config::Config;

/// Print the build order for a package without building anything
#[tracing::instrument(skip(runtime, config))]
pub fn deps<R: Runtime>(
    runtime: R,
    config: Config,
    name: &str,
    skip_recommended: bool,
) -> Result<()> {
    let repo = PackageRepository::new(&runtime, &config.repo);
    let resolution = Resolver::new(&repo, ResolvePolicy { skip_recommended }).resolve(name)?;

    let store = StateStore::new(&runtime, config.registry_path(), &config.repo);
    let installed = store.list_installed()?;

    for package in &resolution.order {
        if installed.contains(package) {
            println!("{} [installed]", package);
        } else {
            println!("{}", package);
        }
    }
    for line in render_notes(&resolution) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per optional or recommended dependency the resolver reported.
pub(crate) fn render_notes(resolution: &Resolution) -> Vec<String> {
    let optional = resolution
        .optional
        .iter()
        .map(|n| format!("Optional: {} (for {})", n.dependency, n.package));
    let recommended = resolution.recommended.iter().map(|n| {
        if n.skipped {
            format!("Recommended: {} (for {}, skipped)", n.dependency, n.package)
        } else {
            format!("Recommended: {} (for {})", n.dependency, n.package)
        }
    });
    optional.chain(recommended).collect()
}
