//! Manual reconnect trigger: this node's signed-state table holds only one
//! subtree of interest to a learner, the latest complete round's Merkle
//! root at path 0 (spec.md §4.8, §4.10). A richer node would also expose
//! the address-book and roster-snapshot subtrees as further `PendingRoot`s;
//! that multi-subtree wiring is left for the next iteration (see
//! DESIGN.md), since the spec's worked scenarios (§8 property 5, 7) only
//! exercise a single subtree end to end.

use std::sync::Arc;

use qc_gossip::FrameTransport;
use qc_merkle::MerkleTree;
use qc_reconnect::{run_learner, run_teacher, LearnedSubtree, NoPriorSnapshot, PendingRoot};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::context::PlatformContext;
use crate::error::NodeError;
use crate::wiring::subsystems::Subsystems;

/// Serves this node's latest complete state to a learner dialing in over
/// `stream` (reconnect frame envelope, spec.md §6).
pub async fn serve_as_teacher<S>(ctx: &PlatformContext, subsystems: &Subsystems, stream: S) -> Result<(), NodeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let latest = subsystems
        .state_manager
        .latest_complete()
        .ok_or_else(|| NodeError::Fatal("no complete signed state available to teach".into()))?;

    let roots = vec![PendingRoot::push(0, latest.tree().root())];
    let transport = FrameTransport::new(stream);
    run_teacher(
        transport,
        roots,
        ctx.hasher.clone(),
        ctx.config.reconnect_config(),
        ctx.cancellation.clone(),
    )
    .await
    .map_err(|e| NodeError::Fatal(format!("reconnect (teacher) failed: {e}")))
}

/// Catches this node up from a teacher dialed at `stream`, installing
/// whatever it learns as a freshly submitted round (spec.md §4.10 step 1-2).
pub async fn run_as_learner<S>(ctx: &PlatformContext, subsystems: &Subsystems, stream: S) -> Result<(), NodeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let transport = FrameTransport::new(stream);
    let subtrees = run_learner(
        transport,
        Arc::new(NoPriorSnapshot),
        ctx.hasher.clone(),
        ctx.config.reconnect_config(),
        ctx.cancellation.clone(),
    )
    .await
    .map_err(|e| NodeError::Fatal(format!("reconnect (learner) failed: {e}")))?;

    let next_round = subsystems.state_manager.latest_immutable_round() + 1;
    for subtree in subtrees {
        if let LearnedSubtree::Push { path: 0, root } = subtree {
            let tree = MerkleTree::new(root);
            subsystems
                .state_manager
                .submit_round(next_round, tree, ctx.roster().as_ref().clone())
                .map_err(|e| NodeError::Fatal(format!("installing learned state: {e}")))?;
        }
    }
    Ok(())
}
