//! Hookwarden webhook server.
//!
//! Receives GitHub webhook deliveries, authenticates them against a
//! hot-reloaded HMAC secret and dispatches them to the plugin registered on
//! the request path.
//!
//! # Architecture
//!
//! - **Clients**: [`ClientFactory`] builds the GitHub client and the
//!   repository cache once, from startup options and the secret store
//! - **Routing**: [`PluginRouter`] mounts plugins and validates deliveries
//! - **Lifecycle**: [`Lifecycle`] serves, drains on SIGINT/SIGTERM, cleans
//!   the repository cache and exits

#![warn(clippy::all)]

pub mod clients;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod options;
pub mod router;
pub mod shutdown;
pub mod webhook;

pub use clients::{ClientFactory, GitHubOptions, StartupError};
pub use error::{HookError, HookResult};
pub use lifecycle::{Lifecycle, ShutdownReport};
pub use options::Options;
pub use router::{PluginRouter, RouterError, RouterState};
pub use shutdown::ShutdownCoordinator;
