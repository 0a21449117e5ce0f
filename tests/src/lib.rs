//! # Cross-Crate Integration Tests
//!
//! Unit tests for spec.md §8 properties 1-4, 6-8, 10 live in their owning
//! crate (shadow graph, tipset tracker, event creator, merkle node, gossip
//! session, peer identity). Properties 5 and 9 each span more than one
//! crate — a real reconnect session over a framed transport, and a signed
//! state manager fed rounds out of order — so they're exercised here
//! instead.
//!
//! ```bash
//! cargo test -p qc-tests
//! ```

pub mod integration;
