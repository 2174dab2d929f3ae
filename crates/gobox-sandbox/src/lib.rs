//! Execution sandbox: runs WebAssembly guests against a filesystem instance
//! with a per-run runtime context and cooperative cancellation.

mod abi;
mod config;
mod context;
mod error;
mod sandbox;

pub use config::SandboxConfig;
pub use error::SandboxError;
pub use sandbox::{Canceller, ExecutionHandle, RunRequest, Sandbox};
