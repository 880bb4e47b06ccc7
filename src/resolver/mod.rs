//! Dependency graph resolution.
//!
//! The graph is implicit: nodes are package names and edges are read from each
//! package's declarations as the walk reaches it. Every top-level call owns a
//! [`ResolutionState`], so nothing leaks between independent resolutions.

mod state;

pub use state::ResolutionState;

use anyhow::Result;
use log::{debug, info};

use crate::error::KilnError;
use crate::package::PackageRepository;
use crate::runtime::Runtime;

/// Caller-controlled resolution policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Report recommended dependencies without resolving them.
    pub skip_recommended: bool,
}

/// A dependency that was reported rather than (or as well as) resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNote {
    pub package: String,
    pub dependency: String,
    /// Recommended dependency left out by policy
    pub skipped: bool,
}

/// Result of one top-level resolve call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Every package exactly once, dependencies before dependents.
    /// The requested package is last.
    pub order: Vec<String>,
    pub optional: Vec<DependencyNote>,
    pub recommended: Vec<DependencyNote>,
}

/// Walks dependency declarations into a dependency-first build order.
pub struct Resolver<'r, 'a, R: Runtime> {
    repo: &'r PackageRepository<'a, R>,
    policy: ResolvePolicy,
}

impl<'r, 'a, R: Runtime> Resolver<'r, 'a, R> {
    pub fn new(repo: &'r PackageRepository<'a, R>, policy: ResolvePolicy) -> Self {
        Self { repo, policy }
    }

    /// Resolve a package with a fresh state.
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, name: &str) -> Result<Resolution> {
        let mut state = ResolutionState::new();
        self.resolve_with(name, &mut state)?;
        Ok(state.into_resolution())
    }

    /// Resolve a package into an existing state.
    ///
    /// Packages already resolved in `state` are not walked again, which lets a
    /// caller resolve several roots into one combined order.
    pub fn resolve_with(&self, name: &str, state: &mut ResolutionState) -> Result<()> {
        if state.is_in_progress(name) {
            // Only reachable when a caller re-enters mid-walk
            return Err(KilnError::CycleDetected {
                package: name.to_string(),
                parent: name.to_string(),
            }
            .into());
        }
        self.visit(name, state)
    }

    fn visit(&self, name: &str, state: &mut ResolutionState) -> Result<()> {
        let id = state.slot(name);
        if state.resolved(id) {
            return Ok(());
        }
        state.begin(id);

        let deps = self.repo.load_dependencies(name)?;

        for dep in &deps.optional {
            info!("{}: optional dependency {} (not installed automatically)", name, dep);
            state.note_optional(name, dep);
        }
        for dep in &deps.recommended {
            if self.policy.skip_recommended {
                info!("{}: skipping recommended dependency {}", name, dep);
            } else {
                info!("{}: recommended dependency {}", name, dep);
            }
            state.note_recommended(name, dep, self.policy.skip_recommended);
        }

        let recommended: &[String] = if self.policy.skip_recommended {
            &[]
        } else {
            &deps.recommended
        };

        for dep in deps.required.iter().chain(recommended) {
            if state.is_in_progress(dep) {
                return Err(KilnError::CycleDetected {
                    package: dep.clone(),
                    parent: name.to_string(),
                }
                .into());
            }
            self.visit(dep, state)?;
        }

        debug!("Resolved {}", name);
        state.finish(id);
        Ok(())
    }
}
