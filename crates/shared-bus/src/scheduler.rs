//! # Scheduler Kinds
//!
//! spec.md §5: "parallel threads cooperating through bounded, typed queues
//! (a 'wiring' mesh). Each component owns exactly one scheduler: either
//! *sequential* ..., *sequential-thread* ..., *direct* ..., or *concurrent*
//! ...".
//!
//! This is the same choreography idea this workspace already used for its
//! event bus, generalized from one shared topic bus to a per-edge scheduler
//! chosen by each component at construction time.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// The four scheduler kinds a component may pick, spec.md §5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduler {
    /// Single handler task, FIFO. Default for most components.
    Sequential,
    /// Dedicated OS thread running a single-threaded runtime, for
    /// components that block on I/O (gossip sockets, reconnect streams).
    SequentialThread,
    /// Caller executes inline. Only valid where the call graph is
    /// provably acyclic — callers are responsible for that proof.
    Direct,
    /// Work-stealing pool with bounded parallelism, for pure compute
    /// (hashing, signature verification).
    Concurrent { max_parallelism: usize },
}

impl Scheduler {
    pub const DEFAULT_CONCURRENCY: usize = 4;

    pub fn concurrent() -> Self {
        Scheduler::Concurrent {
            max_parallelism: Self::DEFAULT_CONCURRENCY,
        }
    }
}

/// Drives a bounded queue of work items according to a [`Scheduler`].
///
/// `handler` is invoked once per item. For `Sequential` and
/// `SequentialThread` items are processed one at a time in arrival order;
/// for `Concurrent` up to `max_parallelism` handler futures run at once;
/// `Direct` has no queue of its own — callers invoke the handler themselves
/// and never construct a pump for it.
pub struct Pump<T> {
    scheduler: Scheduler,
    receiver: mpsc::Receiver<T>,
}

impl<T: Send + 'static> Pump<T> {
    pub fn new(scheduler: Scheduler, receiver: mpsc::Receiver<T>) -> Self {
        assert!(
            !matches!(scheduler, Scheduler::Direct),
            "Direct scheduler has no queue to pump"
        );
        Self {
            scheduler,
            receiver,
        }
    }

    /// Runs `handler` over every queued item until the sender side is
    /// dropped. Returns the join handle so callers can await shutdown.
    pub fn spawn<F, Fut>(mut self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.scheduler {
            Scheduler::Sequential => tokio::spawn(async move {
                while let Some(item) = self.receiver.recv().await {
                    handler(item).await;
                }
            }),
            Scheduler::SequentialThread => {
                let (done_tx, done_rx) = tokio::sync::oneshot::channel();
                std::thread::Builder::new()
                    .name("wiring-sequential-thread".into())
                    .spawn(move || {
                        let rt = tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                            .expect("build current-thread runtime for SequentialThread scheduler");
                        rt.block_on(async move {
                            while let Some(item) = self.receiver.recv().await {
                                handler(item).await;
                            }
                        });
                        let _ = done_tx.send(());
                    })
                    .expect("spawn dedicated OS thread for SequentialThread scheduler");
                tokio::spawn(async move {
                    let _ = done_rx.await;
                })
            }
            Scheduler::Concurrent { max_parallelism } => {
                let permits = Arc::new(Semaphore::new(max_parallelism.max(1)));
                tokio::spawn(async move {
                    while let Some(item) = self.receiver.recv().await {
                        let permits = permits.clone();
                        let fut = handler(item);
                        tokio::spawn(async move {
                            let _permit = permits.acquire_owned().await;
                            fut.await;
                        });
                    }
                })
            }
            Scheduler::Direct => unreachable!("constructor rejects Direct"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn sequential_pump_processes_all_items_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let pump = Pump::new(Scheduler::Sequential, rx);
        let handle = pump.spawn(move |item: u32| {
            let seen = seen_clone.clone();
            async move {
                seen.lock().push(item);
            }
        });
        for i in 0..5 {
            tx.send(i).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn concurrent_pump_processes_every_item() {
        let (tx, rx) = mpsc::channel(8);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let pump = Pump::new(Scheduler::concurrent(), rx);
        let handle = pump.spawn(move |_item: u32| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        for i in 0..20 {
            tx.send(i).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 20);
    }
}
