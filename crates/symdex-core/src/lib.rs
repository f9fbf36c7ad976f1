//! Symdex Core Components
//!
//! This crate composes the indexer into a single lookup entry point,
//! including configuration, the loader session and the host hook chain.

mod config;
mod error;
mod hook;
mod loader;

pub use config::LoaderConfig;
pub use error::CoreError;
pub use hook::{Hook, HookChain};
pub use loader::Loader;
