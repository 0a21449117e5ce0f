//! # Reconnect — Learning/Teaching Merkle Synchronizer
//!
//! A node that has fallen behind (the learner) catches up to a neighbor (the
//! teacher) by walking the teacher's signed state subtree by subtree, over
//! one connection multiplexed the same way gossip multiplexes its own
//! frames (spec.md §4.7, §4.8, §6). Ordinary subtrees use the default push
//! protocol ([`push_view`]); subtrees backed by a virtual map use the
//! two-phase pessimistic traversal ([`virtual_view`]) built on
//! `qc_traversal::TraversalPolicy`. [`session`] owns the async plumbing that
//! drives either protocol over the wire.

pub mod config;
pub mod error;
pub mod message;
pub mod push_view;
pub mod session;
pub mod virtual_view;

pub use config::ReconnectConfig;
pub use error::{AbortReason, ReconnectError};
pub use message::{NodeContent, ReconnectMessage};
pub use push_view::{LearnerSnapshot, NoPriorSnapshot, NodeResponse, PushLearner, PushTeacher};
pub use session::{run_learner, run_learner_with_prior_virtual, run_teacher, LearnedSubtree, PendingRoot};
pub use virtual_view::{VirtualLearner, VirtualTeacher, ViewRequest};
