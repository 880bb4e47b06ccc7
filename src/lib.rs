pub mod application;
pub mod archive;
pub mod commands;
pub mod error;
pub mod hooks;
pub mod http;
pub mod package;
pub mod pipeline;
pub mod resolver;
pub mod runtime;
pub mod state;
pub mod sync;
pub mod verify;

pub use error::KilnError;
