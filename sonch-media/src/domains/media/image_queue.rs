//! Sequential image load queue
//!
//! Many images can be on screen at once, but only one fetch from this queue
//! is in flight at any time. Tasks start in submission order and task N+1
//! never starts before task N has settled. Tasks added while another one runs
//! are queued behind it; nothing is dropped or coalesced, so two submissions
//! for the same image both execute.
//!
//! The queue is an ordinary value. Clones share the same queue, so give one
//! to every component that should be serialized against the others (one per
//! gallery, or a single one for the whole session).

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use log::{trace, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{MediaError, Result};

/// A deferred unit of work. Nothing runs until the queue reaches it.
type QueueTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Processing,
}

#[derive(Default)]
struct Slots {
    pending: VecDeque<QueueTask>,
    processing: bool,
    settled: u64,
}

#[derive(Clone, Default)]
pub struct ImageLoadQueue {
    slots: Arc<Mutex<Slots>>,
}

impl std::fmt::Debug for ImageLoadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("ImageLoadQueue")
            .field("pending", &slots.pending.len())
            .field("processing", &slots.processing)
            .field("settled", &slots.settled)
            .finish()
    }
}

impl ImageLoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` behind everything already submitted.
    ///
    /// `task` is only invoked once every earlier task has settled. Dropping
    /// the returned handle does not cancel the task; its result is simply
    /// discarded when it eventually settles.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add<F, Fut, T>(&self, task: F) -> QueuedTask<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: QueueTask = Box::pin(async move {
            let output = task().await;
            // Receiver gone means the owner went away; nothing to deliver.
            let _ = tx.send(output);
        });

        let start_worker = {
            let mut slots = self.slots.lock();
            slots.pending.push_back(job);
            trace!(
                "[ImageLoadQueue] queued task ({} pending, processing={})",
                slots.pending.len(),
                slots.processing
            );
            if slots.processing {
                false
            } else {
                slots.processing = true;
                true
            }
        };

        if start_worker {
            tokio::spawn(drain(Arc::clone(&self.slots)));
        }

        QueuedTask { rx }
    }

    pub fn state(&self) -> QueueState {
        if self.slots.lock().processing {
            QueueState::Processing
        } else {
            QueueState::Idle
        }
    }

    /// Tasks waiting to start, not counting the one running.
    pub fn pending(&self) -> usize {
        self.slots.lock().pending.len()
    }

    /// Tasks that have run to completion (or panicked) so far.
    pub fn settled(&self) -> u64 {
        self.slots.lock().settled
    }
}

/// Run queued tasks one at a time until the queue is empty.
///
/// The empty check and the switch back to idle happen under the same lock as
/// `add`'s push, so a task can't be stranded between the two.
async fn drain(slots: Arc<Mutex<Slots>>) {
    loop {
        let next = {
            let mut guard = slots.lock();
            match guard.pending.pop_front() {
                Some(task) => task,
                None => {
                    guard.processing = false;
                    trace!("[ImageLoadQueue] idle");
                    return;
                }
            }
        };

        if AssertUnwindSafe(next).catch_unwind().await.is_err() {
            warn!("[ImageLoadQueue] task panicked; continuing with the next one");
        }

        slots.lock().settled += 1;
    }
}

/// Completion handle for a queued task.
#[derive(Debug)]
pub struct QueuedTask<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for QueuedTask<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| MediaError::QueueClosed))
    }
}
