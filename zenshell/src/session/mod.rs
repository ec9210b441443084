//! Sessions: configuration, the builder, the caller's handle and the
//! background task that ties a shell channel to the engine.

mod builder;
mod config;
mod handle;
mod runner;

pub use builder::SessionBuilder;
pub use config::ShellConfig;
pub use handle::SessionHandle;
