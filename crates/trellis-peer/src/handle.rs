//! Response handles with per-event fan-out.
//!
//! A handle is the client-side view of one outstanding request. Replies fan
//! out to registered callbacks and to the handle's own queue (consumed with
//! [`ResponseHandle::recv`]). Cancellation fires exactly once, regardless of
//! whether it came from a local cancel, a timeout, a channel close, or a
//! fatal reply; late cancel listeners get an error instead of silence.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::{CancelReason, PeerError, Result};
use crate::transport::MsgId;

/// Stream phase, driving the stream-timeout watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Waiting for the first reply; the request timeout applies.
    AwaitingFirst,
    /// Mid-stream; the stream timeout applies and resets per element.
    Streaming,
    /// A subscription between streams; no timeout, waiting for a trigger.
    BetweenStreams,
    /// Terminal: completed or cancelled.
    Finished,
}

enum StreamItem<T> {
    Reply(T),
    Done,
    Cancelled,
}

type ReplyCallback<T> = Box<dyn Fn(&T) + Send + Sync>;
type CancelCallback = Box<dyn Fn(&CancelReason) + Send + Sync>;

struct HandleState<T> {
    reply_callbacks: Vec<ReplyCallback<T>>,
    cancel_callbacks: Vec<CancelCallback>,
    cancelled: Option<CancelReason>,
    done: bool,
    batch_count: u32,
    accumulated: usize,
}

struct HandleInner<T> {
    msg_id: MsgId,
    state: Mutex<HandleState<T>>,
    queue_tx: mpsc::UnboundedSender<StreamItem<T>>,
    queue_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<StreamItem<T>>>,
    phase_tx: watch::Sender<(StreamPhase, u64)>,
}

/// Client-side view of one outstanding request.
pub struct ResponseHandle<T> {
    inner: Arc<HandleInner<T>>,
}

impl<T> Clone for ResponseHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> ResponseHandle<T> {
    /// Create a handle for a pending request.
    #[must_use]
    pub fn new(msg_id: MsgId) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (phase_tx, _) = watch::channel((StreamPhase::AwaitingFirst, 0));
        Self {
            inner: Arc::new(HandleInner {
                msg_id,
                state: Mutex::new(HandleState {
                    reply_callbacks: Vec::new(),
                    cancel_callbacks: Vec::new(),
                    cancelled: None,
                    done: false,
                    batch_count: 0,
                    accumulated: 0,
                }),
                queue_tx,
                queue_rx: tokio::sync::Mutex::new(queue_rx),
                phase_tx,
            }),
        }
    }

    /// The request's message id.
    #[must_use]
    pub fn msg_id(&self) -> MsgId {
        self.inner.msg_id
    }

    /// Register a per-reply callback.
    pub fn on_reply(&self, callback: impl Fn(&T) + Send + Sync + 'static) {
        self.inner.state.lock().reply_callbacks.push(Box::new(callback));
    }

    /// Register a cancel callback; errors if cancellation already fired.
    pub fn on_cancel(
        &self,
        callback: impl Fn(&CancelReason) + Send + Sync + 'static,
    ) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.cancelled.is_some() {
            return Err(PeerError::AlreadyCancelled);
        }
        state.cancel_callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Await the next reply.
    ///
    /// `Ok(Some(reply))` per element, `Ok(None)` on clean completion, and
    /// the cancellation reason as an error otherwise.
    pub async fn recv(&self) -> Result<Option<T>> {
        let mut queue = self.inner.queue_rx.lock().await;
        match queue.recv().await {
            Some(StreamItem::Reply(reply)) => Ok(Some(reply)),
            Some(StreamItem::Done) => Ok(None),
            Some(StreamItem::Cancelled) | None => {
                let reason = self
                    .inner
                    .state
                    .lock()
                    .cancelled
                    .clone()
                    .unwrap_or(CancelReason::Local);
                Err(PeerError::Cancelled(reason))
            }
        }
    }

    /// Await cancellation; resolves immediately when already cancelled.
    pub async fn cancelled(&self) -> CancelReason {
        let mut phase_rx = self.inner.phase_tx.subscribe();
        loop {
            if let Some(reason) = self.inner.state.lock().cancelled.clone() {
                return reason;
            }
            if self.is_done() {
                // Completed without cancellation; report local for callers
                // that still await this after completion.
                return CancelReason::Local;
            }
            if phase_rx.changed().await.is_err() {
                return self
                    .inner
                    .state
                    .lock()
                    .cancelled
                    .clone()
                    .unwrap_or(CancelReason::Local);
            }
        }
    }

    /// Streams completed so far (subscription batches).
    #[must_use]
    pub fn batch_count(&self) -> u32 {
        self.inner.state.lock().batch_count
    }

    /// Whether cancellation has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled.is_some()
    }

    /// Whether the request completed cleanly.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.state.lock().done
    }

    /// Cancel the request; the first reason wins, later calls are no-ops.
    pub fn cancel(&self, reason: CancelReason) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.cancelled.is_some() || state.done {
                return;
            }
            state.cancelled = Some(reason.clone());
            std::mem::take(&mut state.cancel_callbacks)
        };
        for callback in &callbacks {
            callback(&reason);
        }
        self.set_phase(StreamPhase::Finished);
        // Wake any `recv` waiter with the cancellation marker.
        let _ = self.inner.queue_tx.send(StreamItem::Cancelled);
    }

    /// Watch phase transitions (used by the stream watchdog).
    #[must_use]
    pub fn phase_receiver(&self) -> watch::Receiver<(StreamPhase, u64)> {
        self.inner.phase_tx.subscribe()
    }

    // ------------------------------------------------------------------
    // Run-loop side
    // ------------------------------------------------------------------

    /// Deliver one reply to callbacks and the queue.
    pub(crate) fn push_reply(&self, reply: T) {
        let state = self.inner.state.lock();
        if state.cancelled.is_some() || state.done {
            return;
        }
        for callback in &state.reply_callbacks {
            callback(&reply);
        }
        drop(state);
        let _ = self.inner.queue_tx.send(StreamItem::Reply(reply));
    }

    /// Record stream payload volume; true when the limit is now exceeded.
    pub(crate) fn add_accumulated(&self, count: usize, limit: usize) -> bool {
        let mut state = self.inner.state.lock();
        state.accumulated += count;
        limit > 0 && state.accumulated > limit
    }

    /// Count one completed stream.
    pub(crate) fn finish_batch(&self) {
        self.inner.state.lock().batch_count += 1;
    }

    /// Mark clean completion of a single-stream request.
    pub(crate) fn mark_done(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.cancelled.is_some() || state.done {
                return;
            }
            state.done = true;
        }
        let _ = self.inner.queue_tx.send(StreamItem::Done);
        self.set_phase(StreamPhase::Finished);
    }

    /// Move the stream watchdog into a phase; bumps the generation so that
    /// repeated `Streaming` updates still reset the timeout.
    pub(crate) fn set_phase(&self, phase: StreamPhase) {
        self.inner.phase_tx.send_modify(|slot| {
            slot.0 = phase;
            slot.1 = slot.1.wrapping_add(1);
        });
    }
}
