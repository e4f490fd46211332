//! Request/response correlation.
//!
//! Every outbound request gets a random correlation id and a oneshot slot.
//! The slot is filled by the matching response or abandoned when the timeout
//! elapses; whichever happens first removes the entry, so a late response or
//! a second settlement for the same id is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;
use uuid::Uuid;

use frameport_core::{CorrelationId, FrameportError, Result};

/// What a response resolves to: the payload, or the peer's error message.
pub type Outcome = std::result::Result<Option<Value>, String>;

/// Whole milliseconds in `timeout`, saturating at `u64::MAX`.
pub(crate) fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Tracks in-flight requests for one endpoint.
pub struct Correlator {
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<Outcome>>>,
    timeout: Duration,
}

impl Correlator {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocate a fresh correlation id and its response slot.
    pub fn register(self: &Arc<Self>) -> PendingRequest {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);
        PendingRequest {
            id,
            rx,
            correlator: Arc::clone(self),
        }
    }

    /// Settle the request with `id`. Returns `false` when no such request is
    /// pending (already settled, timed out, or never sent).
    pub fn settle(&self, id: &str, outcome: Outcome) -> bool {
        let Some(tx) = self.pending.lock().remove(id) else {
            trace!(request_id = id, "response for unknown request id dropped");
            return false;
        };
        // The waiter may have been dropped between removal and send; nothing to do then.
        let _ = tx.send(outcome);
        true
    }

    /// Number of requests awaiting a response.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn forget(&self, id: &str) {
        self.pending.lock().remove(id);
    }
}

/// An in-flight request. Dropping it (after completion, on timeout, or when
/// the caller gives up) removes its entry from the correlator.
pub struct PendingRequest {
    id: CorrelationId,
    rx: oneshot::Receiver<Outcome>,
    correlator: Arc<Correlator>,
}

impl PendingRequest {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the response or the correlator's timeout.
    pub async fn wait(mut self, request_type: &str) -> Result<Option<Value>> {
        let timeout = self.correlator.timeout;
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(message))) => Err(FrameportError::Remote(message)),
            Ok(Err(_)) => Err(FrameportError::EndpointClosed),
            Err(_) => Err(FrameportError::Timeout {
                request_type: request_type.to_string(),
                timeout_ms: millis(timeout),
            }),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.correlator.forget(&self.id);
    }
}
