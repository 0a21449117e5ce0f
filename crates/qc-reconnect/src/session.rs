//! Async orchestration: multiplexes the default push view and the
//! virtual-map view over one [`qc_gossip::FrameTransport`] connection,
//! reusing gossip's exact `Frame{view_id, payload}` envelope (spec.md §6
//! "Reconnect frame: same multiplexed envelope as gossip").
//!
//! View id 0 is reserved as a control channel the teacher uses to announce
//! new views (spec.md §4.8 "view scheduling"); every other view id names one
//! subtree's push or virtual-map exchange. One dedicated task owns the
//! transport and fans inbound frames out to per-view channels, since only
//! one task may read/write a duplex stream at a time.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use qc_gossip::{Frame, FrameTransport};
use qc_merkle::{LeafRange, MerkleNode, VirtualMap};
use shared_bus::CancellationToken;
use shared_crypto::Hasher;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ReconnectConfig;
use crate::error::{AbortReason, ReconnectError};
use crate::message::ReconnectMessage;
use crate::push_view::{LearnerSnapshot, NodeResponse, PushLearner, PushTeacher};
use crate::virtual_view::{VirtualLearner, VirtualTeacher, ViewRequest};

pub const CONTROL_VIEW: i64 = 0;

type Routes = Arc<Mutex<HashMap<i64, mpsc::UnboundedSender<Bytes>>>>;

/// Owns the transport exclusively for the lifetime of one reconnect. Routes
/// inbound frames to whichever view registered for that `view_id`; frames
/// for a view nobody is listening on anymore (already finished or never
/// opened) are logged and dropped rather than treated as a protocol error,
/// since a straggling reply can legitimately arrive after its view closes.
struct IoActor<S> {
    transport: FrameTransport<S>,
    outbound_rx: mpsc::UnboundedReceiver<Frame>,
    routes: Routes,
}

impl<S> IoActor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                outbound = self.outbound_rx.recv() => {
                    let Some(frame) = outbound else { return };
                    if let Err(err) = self.transport.send_frame(&frame).await {
                        warn!(error = %err, "reconnect transport write failed");
                        return;
                    }
                }
                inbound = self.transport.recv_frame() => {
                    match inbound {
                        Ok(frame) => {
                            let sender = self.routes.lock().get(&frame.view_id).cloned();
                            match sender {
                                Some(sender) => { let _ = sender.send(frame.payload); }
                                None => debug!(view_id = frame.view_id, "frame for unknown/closed view dropped"),
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "reconnect transport read failed");
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
struct IoHandle {
    outbound_tx: mpsc::UnboundedSender<Frame>,
    routes: Routes,
}

impl IoHandle {
    fn spawn<S>(
        transport: FrameTransport<S>,
        cancel: CancellationToken,
    ) -> (Self, tokio::task::JoinHandle<()>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let actor = IoActor { transport, outbound_rx, routes: routes.clone() };
        let handle = tokio::spawn(actor.run(cancel));
        (Self { outbound_tx, routes }, handle)
    }

    fn open_view(&self, view_id: i64) -> ViewChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.lock().insert(view_id, tx);
        ViewChannel {
            view_id,
            outbound_tx: self.outbound_tx.clone(),
            inbound_rx: rx,
            routes: self.routes.clone(),
        }
    }
}

struct ViewChannel {
    view_id: i64,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    inbound_rx: mpsc::UnboundedReceiver<Bytes>,
    routes: Routes,
}

impl ViewChannel {
    fn send(&self, message: &ReconnectMessage) -> Result<(), ReconnectError> {
        self.outbound_tx
            .send(Frame::new(self.view_id, message.encode()))
            .map_err(|_| ReconnectError::Aborted(AbortReason::TransportClosed))
    }

    /// Waits for the next message on this view, enforcing a real per-poll
    /// deadline (spec.md §9: the `waitForConnection` fix — a prior version
    /// of this comparison could never fire because it compared an instant
    /// to itself; `tokio::time::timeout` always measures forward from now).
    async fn recv(&mut self, deadline: std::time::Duration) -> Result<ReconnectMessage, ReconnectError> {
        match timeout(deadline, self.inbound_rx.recv()).await {
            Ok(Some(bytes)) => ReconnectMessage::decode(bytes),
            Ok(None) => Err(ReconnectError::Aborted(AbortReason::TransportClosed)),
            Err(_) => Err(ReconnectError::Aborted(AbortReason::Timeout)),
        }
    }
}

impl Drop for ViewChannel {
    fn drop(&mut self) {
        self.routes.lock().remove(&self.view_id);
    }
}

/// One subtree the teacher is prepared to hand over: either a regular
/// `MerkleNode` subtree (default push view) or a virtual map's leaf range
/// (two-phase view), with the virtual map's previous-round twin used to
/// decide which leaves are clean (spec.md §4.7, §4.8, §4.9).
pub struct PendingRoot {
    pub path: u64,
    pub root: Option<Arc<MerkleNode>>,
    pub virtual_current: Option<Arc<VirtualMap>>,
    pub virtual_previous: Option<Arc<VirtualMap>>,
}

impl PendingRoot {
    pub fn push(path: u64, root: Arc<MerkleNode>) -> Self {
        Self { path, root: Some(root), virtual_current: None, virtual_previous: None }
    }

    pub fn virtual_map(
        path: u64,
        current: Arc<VirtualMap>,
        previous: Option<Arc<VirtualMap>>,
    ) -> Self {
        Self { path, root: None, virtual_current: Some(current), virtual_previous: previous }
    }
}

/// What the learner reconstructed for one subtree.
pub enum LearnedSubtree {
    Push { path: u64, root: Arc<MerkleNode> },
    Virtual { path: u64, map: VirtualMap },
}

/// Teacher side: serves every pending subtree over its own view, bounded by
/// `config.max_parallel_subtrees` concurrently open views at once (spec.md
/// §4.8 "view scheduling"). A single view's failure aborts the whole
/// reconnect (spec.md §4.8), so the first task error is propagated and the
/// rest are left to wind down when the transport actor shuts down with it.
pub async fn run_teacher<S>(
    transport: FrameTransport<S>,
    roots: Vec<PendingRoot>,
    hasher: Arc<dyn Hasher>,
    config: ReconnectConfig,
    cancel: CancellationToken,
) -> Result<(), ReconnectError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (io, io_task) = IoHandle::spawn(transport, cancel.clone());
    let control = io.open_view(CONTROL_VIEW);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.max_parallel_subtrees.max(1)));
    let mut tasks: JoinSet<Result<(), ReconnectError>> = JoinSet::new();

    for (offset, pending) in roots.into_iter().enumerate() {
        let view_id = offset as i64 + 1;
        let virtual_range = pending.virtual_current.as_ref().map(|m| {
            let r = m.range();
            (r.first_leaf_path, r.last_leaf_path)
        });
        control.send(&ReconnectMessage::OpenView {
            target_view: view_id,
            path: pending.path,
            virtual_range,
        })?;

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ReconnectError::Aborted(AbortReason::TransportClosed))?;
        let mut view = io.open_view(view_id);
        let hasher = hasher.clone();
        let config = config.clone();
        tasks.spawn(async move {
            let _permit = permit;
            serve_teacher_view(&mut view, pending, &*hasher, &config).await
        });
    }
    control.send(&ReconnectMessage::ViewDone)?;

    let mut first_error = None;
    while let Some(result) = tasks.join_next().await {
        let outcome = result.map_err(|_| ReconnectError::Aborted(AbortReason::ProtocolViolation))?;
        if let Err(err) = outcome {
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }

    drop(control);
    drop(io);
    let _ = io_task.await;

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn serve_teacher_view(
    view: &mut ViewChannel,
    pending: PendingRoot,
    hasher: &dyn Hasher,
    config: &ReconnectConfig,
) -> Result<(), ReconnectError> {
    if let Some(current) = &pending.virtual_current {
        let teacher = VirtualTeacher::new(current.as_ref(), pending.virtual_previous.as_deref(), hasher);
        loop {
            match view.recv(config.async_stream_timeout).await? {
                ReconnectMessage::InternalQuery { path } => {
                    let clean = teacher.answer_internal(path);
                    view.send(&ReconnectMessage::InternalAnswer { path, clean })?;
                }
                ReconnectMessage::LeafQuery { path } => match teacher.answer_leaf(path) {
                    Some((key, value)) => view.send(&ReconnectMessage::LeafAnswer {
                        path,
                        present: true,
                        key,
                        value,
                    })?,
                    None => view.send(&ReconnectMessage::LeafAnswer {
                        path,
                        present: false,
                        key: Vec::new(),
                        value: Vec::new(),
                    })?,
                },
                ReconnectMessage::ViewDone => return Ok(()),
                ReconnectMessage::Abort(reason) => return Err(ReconnectError::Aborted(reason)),
                _ => return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation)),
            }
        }
    } else {
        let root = pending.root.ok_or(ReconnectError::Aborted(AbortReason::ProtocolViolation))?;
        let teacher = PushTeacher::new(root, hasher);
        loop {
            match view.recv(config.async_stream_timeout).await? {
                ReconnectMessage::NodeQuery { path, known_hash } => match teacher.answer(path, known_hash) {
                    Some(NodeResponse::Clean) => view.send(&ReconnectMessage::NodeClean { path })?,
                    Some(NodeResponse::Dirty { hash, content }) => {
                        view.send(&ReconnectMessage::NodeDirty { path, hash, content })?
                    }
                    None => return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation)),
                },
                ReconnectMessage::ViewDone => return Ok(()),
                ReconnectMessage::Abort(reason) => return Err(ReconnectError::Aborted(reason)),
                _ => return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation)),
            }
        }
    }
}

/// Learner side: waits for the teacher to open views on the control
/// channel, runs each to completion bounded by `config.max_parallel_subtrees`
/// concurrent views, and returns every subtree it reconstructed. Results are
/// returned in reverse of the order their views actually finished — the
/// teacher opens parent-bearing views before the children they may depend
/// on finish, so the last subtree to complete is usually the one a caller
/// should hash-and-initialize first (spec.md §4.8 "finalization runs in
/// reverse completion order"); see DESIGN.md for why this heuristic, not a
/// strict dependency graph, is what the retrievable sources show.
pub async fn run_learner<S>(
    transport: FrameTransport<S>,
    snapshot: Arc<dyn LearnerSnapshot>,
    hasher: Arc<dyn Hasher>,
    config: ReconnectConfig,
    cancel: CancellationToken,
) -> Result<Vec<LearnedSubtree>, ReconnectError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let no_prior_virtual: Arc<dyn Fn(u64) -> Option<Arc<VirtualMap>> + Send + Sync> =
        Arc::new(|_: u64| None);
    run_learner_with_prior_virtual(transport, snapshot, no_prior_virtual, hasher, config, cancel).await
}

/// As [`run_learner`], but `prior_virtual` supplies the previous round's
/// virtual map for a given subtree path, when one exists, letting the
/// learner's two-phase view skip leaves that have not changed.
pub async fn run_learner_with_prior_virtual<S>(
    transport: FrameTransport<S>,
    snapshot: Arc<dyn LearnerSnapshot>,
    prior_virtual: Arc<dyn Fn(u64) -> Option<Arc<VirtualMap>> + Send + Sync>,
    hasher: Arc<dyn Hasher>,
    config: ReconnectConfig,
    cancel: CancellationToken,
) -> Result<Vec<LearnedSubtree>, ReconnectError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (io, io_task) = IoHandle::spawn(transport, cancel.clone());
    let mut control = io.open_view(CONTROL_VIEW);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.max_parallel_subtrees.max(1)));
    let mut tasks: JoinSet<Result<LearnedSubtree, ReconnectError>> = JoinSet::new();

    loop {
        match control.recv(config.async_stream_timeout).await? {
            ReconnectMessage::OpenView { target_view, path, virtual_range } => {
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| ReconnectError::Aborted(AbortReason::TransportClosed))?;
                let mut view = io.open_view(target_view);
                let hasher = hasher.clone();
                let snapshot = snapshot.clone();
                let prior_virtual = prior_virtual.clone();
                let config = config.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    learn_view(&mut view, path, virtual_range, &*hasher, &*snapshot, &prior_virtual, &config).await
                });
            }
            ReconnectMessage::CloseView { .. } => continue,
            ReconnectMessage::ViewDone => break,
            ReconnectMessage::Abort(reason) => return Err(ReconnectError::Aborted(reason)),
            other => {
                debug!(?other, "unexpected message on reconnect control view");
                return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation));
            }
        }
    }
    drop(control);

    let mut completion_order = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let subtree = result.map_err(|_| ReconnectError::Aborted(AbortReason::ProtocolViolation))??;
        completion_order.push(subtree);
    }

    drop(io);
    let _ = io_task.await;

    completion_order.reverse();
    Ok(completion_order)
}

async fn learn_view(
    view: &mut ViewChannel,
    path: u64,
    virtual_range: Option<(u64, u64)>,
    hasher: &dyn Hasher,
    snapshot: &dyn LearnerSnapshot,
    prior_virtual: &(dyn Fn(u64) -> Option<Arc<VirtualMap>> + Send + Sync),
    config: &ReconnectConfig,
) -> Result<LearnedSubtree, ReconnectError> {
    if let Some((first, last)) = virtual_range {
        let range = LeafRange::new(first, last);
        let previous = prior_virtual(path);
        let mut learner = VirtualLearner::new(range, previous.as_deref())?;
        while let Some(request) = learner.next_request() {
            match request {
                ViewRequest::Internal(query_path) => {
                    view.send(&ReconnectMessage::InternalQuery { path: query_path })?;
                    match view.recv(config.async_stream_timeout).await? {
                        ReconnectMessage::InternalAnswer { path: answered, clean } if answered == query_path => {
                            learner.handle_internal_response(answered, clean);
                        }
                        ReconnectMessage::Abort(reason) => return Err(ReconnectError::Aborted(reason)),
                        _ => return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation)),
                    }
                }
                ViewRequest::Leaf(query_path) => {
                    view.send(&ReconnectMessage::LeafQuery { path: query_path })?;
                    match view.recv(config.async_stream_timeout).await? {
                        ReconnectMessage::LeafAnswer { path: answered, present, key, value }
                            if answered == query_path =>
                        {
                            let content = present.then_some((key, value));
                            learner
                                .handle_leaf_response(answered, content)
                                .map_err(ReconnectError::Aborted)?;
                        }
                        ReconnectMessage::Abort(reason) => return Err(ReconnectError::Aborted(reason)),
                        _ => return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation)),
                    }
                }
            }
        }
        view.send(&ReconnectMessage::ViewDone)?;
        let map = learner.finish().map_err(ReconnectError::Aborted)?;
        Ok(LearnedSubtree::Virtual { path, map })
    } else {
        let mut learner = PushLearner::new(path, hasher, snapshot);
        while let Some((query_path, known_hash)) = learner.next_request() {
            view.send(&ReconnectMessage::NodeQuery { path: query_path, known_hash })?;
            match view.recv(config.async_stream_timeout).await? {
                ReconnectMessage::NodeClean { path: answered } if answered == query_path => {
                    learner
                        .handle_response(answered, NodeResponse::Clean)
                        .map_err(ReconnectError::Aborted)?;
                }
                ReconnectMessage::NodeDirty { path: answered, hash, content } if answered == query_path => {
                    learner
                        .handle_response(answered, NodeResponse::Dirty { hash, content })
                        .map_err(ReconnectError::Aborted)?;
                }
                ReconnectMessage::Abort(reason) => return Err(ReconnectError::Aborted(reason)),
                _ => return Err(ReconnectError::Aborted(AbortReason::ProtocolViolation)),
            }
        }
        view.send(&ReconnectMessage::ViewDone)?;
        let root = learner.root().ok_or(ReconnectError::Aborted(AbortReason::ProtocolViolation))?;
        Ok(LearnedSubtree::Push { path, root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push_view::NoPriorSnapshot;
    use qc_merkle::test_support::InMemoryDataSource;
    use shared_crypto::Sha384Hasher;
    use std::collections::HashMap as StdHashMap;
    use std::time::Duration;
    use tokio::io::duplex;

    fn test_config() -> ReconnectConfig {
        ReconnectConfig {
            max_parallel_subtrees: 4,
            async_stream_timeout: Duration::from_secs(5),
            async_stream_buffer_size: 64,
        }
    }

    fn push_subtree() -> Arc<MerkleNode> {
        let a = MerkleNode::leaf(4, b"a".to_vec(), b"1".to_vec());
        let b = MerkleNode::leaf(5, b"b".to_vec(), b"2".to_vec());
        MerkleNode::internal(2, a, b)
    }

    #[tokio::test]
    async fn reconnect_transfers_a_single_push_subtree() {
        let (teacher_stream, learner_stream) = duplex(1 << 16);
        let teacher_transport = FrameTransport::new(teacher_stream);
        let learner_transport = FrameTransport::new(learner_stream);
        let hasher: Arc<dyn Hasher> = Arc::new(Sha384Hasher);
        let cancel = CancellationToken::new();

        let root = push_subtree();
        let expected_hash = root.hash(&Sha384Hasher);
        let roots = vec![PendingRoot::push(2, root)];

        let teacher = tokio::spawn(run_teacher(
            teacher_transport,
            roots,
            hasher.clone(),
            test_config(),
            cancel.clone(),
        ));
        let learner = tokio::spawn(run_learner(
            learner_transport,
            Arc::new(NoPriorSnapshot),
            hasher.clone(),
            test_config(),
            cancel,
        ));

        let (teacher_result, learner_result) = tokio::join!(teacher, learner);
        teacher_result.unwrap().unwrap();
        let subtrees = learner_result.unwrap().unwrap();

        assert_eq!(subtrees.len(), 1);
        match &subtrees[0] {
            LearnedSubtree::Push { path, root } => {
                assert_eq!(*path, 2);
                assert_eq!(root.hash(&Sha384Hasher), expected_hash);
            }
            LearnedSubtree::Virtual { .. } => panic!("expected a push subtree"),
        }
    }

    #[tokio::test]
    async fn reconnect_transfers_a_virtual_map_subtree() {
        let (teacher_stream, learner_stream) = duplex(1 << 16);
        let teacher_transport = FrameTransport::new(teacher_stream);
        let learner_transport = FrameTransport::new(learner_stream);
        let hasher: Arc<dyn Hasher> = Arc::new(Sha384Hasher);
        let cancel = CancellationToken::new();

        let range = LeafRange::new(16, 19);
        let mut leaves = StdHashMap::new();
        leaves.insert(16, (b"k0".to_vec(), b"v0".to_vec()));
        leaves.insert(17, (b"k1".to_vec(), b"v1".to_vec()));
        leaves.insert(18, (b"k2".to_vec(), b"v2".to_vec()));
        leaves.insert(19, (b"k3".to_vec(), b"v3".to_vec()));
        let current = Arc::new(VirtualMap::new(range, Box::new(InMemoryDataSource::new(leaves))));

        let roots = vec![PendingRoot::virtual_map(9, current.clone(), None)];

        let teacher = tokio::spawn(run_teacher(
            teacher_transport,
            roots,
            hasher.clone(),
            test_config(),
            cancel.clone(),
        ));
        let learner = tokio::spawn(run_learner(
            learner_transport,
            Arc::new(NoPriorSnapshot),
            hasher.clone(),
            test_config(),
            cancel,
        ));

        let (teacher_result, learner_result) = tokio::join!(teacher, learner);
        teacher_result.unwrap().unwrap();
        let subtrees = learner_result.unwrap().unwrap();

        assert_eq!(subtrees.len(), 1);
        match &subtrees[0] {
            LearnedSubtree::Virtual { path, map } => {
                assert_eq!(*path, 9);
                assert_eq!(
                    map.leaf_value(16).unwrap(),
                    Some((b"k0".to_vec(), b"v0".to_vec()))
                );
            }
            LearnedSubtree::Push { .. } => panic!("expected a virtual subtree"),
        }
    }

    #[tokio::test]
    async fn control_channel_deadline_fires_when_teacher_never_opens_a_view() {
        let (teacher_stream, learner_stream) = duplex(1 << 16);
        let teacher_transport = FrameTransport::new(teacher_stream);
        let learner_transport = FrameTransport::new(learner_stream);
        let hasher: Arc<dyn Hasher> = Arc::new(Sha384Hasher);
        let cancel = CancellationToken::new();

        // Teacher side never sends an `OpenView`, so the learner's deadline
        // on the control channel must fire instead of hanging forever (the
        // `waitForConnection` fix: a real forward-measured timeout).
        let _teacher_transport = teacher_transport;

        let result = run_learner(
            learner_transport,
            Arc::new(NoPriorSnapshot),
            hasher,
            ReconnectConfig {
                async_stream_timeout: Duration::from_millis(200),
                ..test_config()
            },
            cancel,
        )
        .await;

        assert!(matches!(
            result,
            Err(ReconnectError::Aborted(AbortReason::Timeout))
        ));
    }
}
