//! Core logic for tiny42
//!
//! This crate provides:
//! - The container lifecycle (daemon, image build, container create/start, reload)
//! - The command relay that maps the host directory into the container
//! - Relocation of the runtime's storage to goinfre
//! - Installation of the binary, config and build recipe

mod container;
mod error;
mod install;
mod lifecycle;
mod relay;
mod relocation;

pub use container::*;
pub use error::*;
pub use install::*;
pub use lifecycle::*;
pub use relay::*;
pub use relocation::*;

/// Cancellation handle for long waits
pub use tokio_util::sync::CancellationToken;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
