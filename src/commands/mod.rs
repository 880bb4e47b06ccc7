//! CLI command implementations.
//!
//! Each command wires the default collaborators into a use case and prints
//! its outcome.

pub mod config;
mod deps;
mod install;
mod list;
mod paths;
mod remove;
mod services;
mod sync;

pub use deps::deps;
pub use install::{BuildOptions, install, upgrade};
pub use list::list;
pub use remove::{orphans, remove};
pub use services::{Services, build_http_client};
pub use sync::sync;
