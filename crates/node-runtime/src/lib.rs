//! # Node Runtime
//!
//! Wiring, configuration, and the CLI entry point that glue every domain
//! crate (event core, tipset tracker, shadow graph, event creator, gossip,
//! peer identity, reconnect, signed-state manager) into one hashgraph
//! consensus node process.

pub mod config;
pub mod context;
pub mod error;
pub mod transport;
pub mod wiring;

pub use config::NodeConfig;
pub use context::PlatformContext;
pub use error::NodeError;
pub use wiring::RunningNode;
