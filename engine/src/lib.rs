//! Shell side of Tether: the dispatch loop, effect executor and view store.
//!
//! # Architecture
//!
//! ```text
//!   presentation ──Shell::dispatch──▶ ┌──────────────┐ ──▶ Core
//!                                     │ dispatch loop│
//!   effect tasks ──Command::Response─▶└──────┬───────┘ ◀── Vec<Request>
//!        ▲                                   │
//!        └──── spawn_http / spawn_sse ◀──────┤ route
//!                                            └──▶ Render ──▶ ViewStore ──▶ ViewHandle
//! ```
//!
//! The Core is driven only through [`tether_types::Core`]; which Core is
//! plugged in is the caller's choice.
//!
//! # Error Handling
//!
//! A caller of [`Shell::dispatch`] or [`Shell::dispatch_response`] gets its
//! chain's error back directly. Chains started by effect tasks have nobody
//! waiting, so their errors go to [`Faults`]. [`ShellError::is_fatal`] tells
//! protocol violations apart from network effects that could not be carried out.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod config;
mod dispatch;
mod error;
mod executor;
mod registry;
mod view;

pub use config::{
    ConfigError, CoreConfig, DispatchConfig, DispatchSection, HttpConfig, ShellConfig, SseConfig,
    config_path,
};
pub use dispatch::{Faults, Runtime, Shell};
pub use error::ShellError;
pub use registry::Delivery;
pub use tether_providers;
pub use tether_types;
pub use view::{ViewHandle, ViewStore};

use tether_providers::Capabilities;
use tether_types::Core;

/// Spawn the dispatch loop and bootstrap it.
///
/// `StartWatch` has been fully dispatched by the time this returns, so no
/// user action can reach the Core before it.
pub async fn start(
    core: Box<dyn Core>,
    capabilities: Capabilities,
    options: &DispatchConfig,
) -> Result<Runtime, ShellError> {
    let runtime = Runtime::spawn(core, capabilities, options);
    runtime.bootstrap().await?;
    Ok(runtime)
}
