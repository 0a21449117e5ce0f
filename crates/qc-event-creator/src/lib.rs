//! # Event Creator — Creation-Tick Logic
//!
//! Decides, once per scheduled tick, whether this node should create a new
//! event and with which other-parent, then atomically registers the result
//! into the Shadow Graph and Tipset Tracker (spec.md §4.4).

pub mod config;
pub mod creator;
pub mod error;
pub mod outcome;

pub use config::EventCreatorConfig;
pub use creator::EventCreator;
pub use error::CreatorError;
pub use outcome::CreationOutcome;
