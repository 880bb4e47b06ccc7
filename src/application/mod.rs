//! Application layer - the lifecycle orchestrator.
//!
//! Use cases drive the resolver, the state store and the external
//! collaborators through the install, remove, upgrade and sync state machines.

mod install;
mod lifecycle;
mod remove;
mod sync;
mod upgrade;

pub use install::{InstallOptions, InstallOutcome, InstallUseCase};
pub use lifecycle::{Collaborators, InstallState, RemoveState};
pub use remove::{RemoveAction, RemoveOutcome};
pub use sync::{DEFAULT_SYNC_JOBS, SyncOutcome, SyncUseCase};
pub use upgrade::{UpgradeReport, UpgradeUseCase};
