//! Request/response correlation
//!
//! The [`Correlator`] hands out call ids and keeps one completion handle per
//! call that is still waiting for an answer. A call is registered before its
//! request frame is written, so even an instant reply finds its waiter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use smol::channel::{self, Receiver, Sender};

use crate::ipc::protocol::{IpcError, Response};

type Completion = Result<Value, IpcError>;

#[derive(Default)]
struct State {
    calls: HashMap<u64, Sender<Completion>>,
    closed: Option<String>,
}

/// Tracks in-flight calls for one connection
pub struct Correlator {
    next_id: AtomicU64,
    state: Mutex<State>,
    max_pending: usize,
}

impl Correlator {
    pub fn new(max_pending: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(State::default()),
            max_pending,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // No code path panics while holding the lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next id and register a waiter for it
    ///
    /// The id counter advances even when registration is refused.
    pub fn register(self: &Arc<Self>) -> Result<PendingCall, IpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if let Some(reason) = &state.closed {
            return Err(IpcError::Disconnected(reason.clone()));
        }
        if state.calls.len() >= self.max_pending {
            tracing::warn!(
                id,
                pending = state.calls.len(),
                limit = self.max_pending,
                "too many pending calls; refusing new call"
            );
            return Err(IpcError::Backpressure {
                limit: self.max_pending,
            });
        }

        let (tx, rx) = channel::bounded(1);
        state.calls.insert(id, tx);
        tracing::debug!(id, pending = state.calls.len(), "registered pending call");

        Ok(PendingCall {
            id,
            rx,
            correlator: Arc::clone(self),
        })
    }

    /// Complete the call a response belongs to
    ///
    /// Returns `false` when no call is waiting for that id. Such responses
    /// (late answers to cancelled calls, stray ids) are dropped.
    pub fn resolve(&self, response: Response) -> bool {
        let Some(id) = response.id else {
            tracing::warn!("discarding response without id");
            return false;
        };

        let waiter = self.state().calls.remove(&id);
        match waiter {
            Some(tx) => {
                tracing::debug!(id, ok = response.outcome.is_ok(), "routing response to caller");
                // The receiver may be mid-drop; nothing is waiting then
                let _ = tx.try_send(response.outcome.map_err(IpcError::Remote));
                true
            }
            None => {
                tracing::warn!(id, "discarding response with no pending call");
                false
            }
        }
    }

    /// Forget a pending call. Returns whether it was still pending.
    pub fn cancel(&self, id: u64) -> bool {
        let removed = self.state().calls.remove(&id).is_some();
        if removed {
            tracing::debug!(id, "pending call cancelled");
        }
        removed
    }

    /// Fail every pending call and refuse new ones
    pub fn fail_all(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let calls = {
            let mut state = self.state();
            state.closed.get_or_insert_with(|| reason.clone());
            std::mem::take(&mut state.calls)
        };

        if !calls.is_empty() {
            tracing::debug!(count = calls.len(), reason = %reason, "failing pending calls");
        }
        for (_, tx) in calls {
            let _ = tx.try_send(Err(IpcError::Disconnected(reason.clone())));
        }
    }

    /// Ids of calls still waiting, in ascending order
    pub fn pending_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.state().calls.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed.is_some()
    }
}

/// Handle held by the caller of one in-flight request
///
/// Dropping it before the answer arrives cancels the call locally; a late
/// response is then discarded by [`Correlator::resolve`].
pub struct PendingCall {
    id: u64,
    rx: Receiver<Completion>,
    correlator: Arc<Correlator>,
}

impl PendingCall {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the response
    pub async fn wait(self) -> Result<Value, IpcError> {
        match self.rx.recv().await {
            Ok(completion) => completion,
            Err(_) => Err(IpcError::Disconnected(format!(
                "call {} was dropped without completion",
                self.id
            ))),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.correlator.cancel(self.id);
    }
}
