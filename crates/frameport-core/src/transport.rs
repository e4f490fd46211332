//! In-process model of the browser `postMessage` channel.
//!
//! Every frame is a [`Window`]: an origin-tagged inbox with a cloneable
//! address ([`WindowHandle`]). Posting stamps the sender's origin and handle
//! onto an [`Envelope`]; the receiver can trust both, never the payload.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{FrameportError, Result};
use crate::message::WireMessage;
use crate::types::ANY_ORIGIN;

/// Process-unique identity of a window. Used for echo suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WindowId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// A message as delivered to a window.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Origin of the sending window, stamped by the transport.
    pub origin: String,
    /// Handle of the sending window, usable to reply.
    pub source: WindowHandle,
    /// Structured clone of the posted message.
    pub data: Value,
}

/// Cloneable address of a window.
#[derive(Clone)]
pub struct WindowHandle {
    id: WindowId,
    origin: Arc<str>,
    inbox: mpsc::UnboundedSender<Envelope>,
}

impl WindowHandle {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// True once the window has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    fn deliver(&self, envelope: Envelope) -> Result<()> {
        self.inbox
            .send(envelope)
            .map_err(|_| FrameportError::WindowClosed(self.id))
    }
}

impl PartialEq for WindowHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WindowHandle {}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowHandle")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .finish()
    }
}

/// A window together with its inbox.
pub struct Window {
    handle: WindowHandle,
    inbox: mpsc::UnboundedReceiver<Envelope>,
}

impl Window {
    pub fn new(origin: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let origin: String = origin.into();
        Self {
            handle: WindowHandle {
                id: WindowId::next(),
                origin: Arc::from(origin),
                inbox: tx,
            },
            inbox: rx,
        }
    }

    pub fn handle(&self) -> WindowHandle {
        self.handle.clone()
    }

    pub fn into_parts(self) -> (WindowHandle, mpsc::UnboundedReceiver<Envelope>) {
        (self.handle, self.inbox)
    }
}

/// A bidirectional, origin-tagged message channel owned by one endpoint.
///
/// `open` hands out the inbound stream exactly once; `close` ends the
/// endpoint's participation in the channel.
pub trait Transport: Send + Sync {
    /// Address of the window this transport speaks for.
    fn local(&self) -> &WindowHandle;

    /// Start observing inbound messages.
    fn open(&self) -> Result<mpsc::UnboundedReceiver<Envelope>>;

    /// Post `message` to `target`. Silently undelivered when `target_origin`
    /// does not match the target window's origin.
    fn post(&self, target: &WindowHandle, message: &WireMessage, target_origin: &str)
    -> Result<()>;

    fn close(&self);

    fn is_open(&self) -> bool;
}

/// [`Transport`] over an in-process [`Window`].
pub struct WindowTransport {
    handle: WindowHandle,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    open: AtomicBool,
    closed: AtomicBool,
}

impl WindowTransport {
    pub fn new(window: Window) -> Self {
        let (handle, inbox) = window.into_parts();
        Self {
            handle,
            inbox: Mutex::new(Some(inbox)),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Post an arbitrary JSON value. `post` goes through here after encoding.
    pub fn post_value(&self, target: &WindowHandle, data: Value, target_origin: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FrameportError::EndpointClosed);
        }
        if target_origin != ANY_ORIGIN && target_origin != target.origin() {
            debug!(
                target = %target.id(),
                target_origin,
                actual_origin = target.origin(),
                "target origin mismatch, message not delivered"
            );
            return Ok(());
        }
        trace!(from = %self.handle.id(), to = %target.id(), "posting message");
        target.deliver(Envelope {
            origin: self.handle.origin().to_string(),
            source: self.handle.clone(),
            data,
        })
    }
}

impl Transport for WindowTransport {
    fn local(&self) -> &WindowHandle {
        &self.handle
    }

    fn open(&self) -> Result<mpsc::UnboundedReceiver<Envelope>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FrameportError::EndpointClosed);
        }
        let inbox = self
            .inbox
            .lock()
            .take()
            .ok_or_else(|| FrameportError::Transport("transport already opened".into()))?;
        self.open.store(true, Ordering::Release);
        Ok(inbox)
    }

    fn post(
        &self,
        target: &WindowHandle,
        message: &WireMessage,
        target_origin: &str,
    ) -> Result<()> {
        self.post_value(target, message.to_value()?, target_origin)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.open.store(false, Ordering::Release);
        // An unopened inbox is dropped here; an opened one goes with its reader.
        self.inbox.lock().take();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Serialize the origin (`scheme://host[:port]`) of a URL.
///
/// URLs without a tuple origin (e.g. `file:`) serialize as `"null"`, as
/// browsers do.
pub fn origin_of(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| FrameportError::Transport(format!("invalid url '{url}': {e}")))?;
    Ok(parsed.origin().ascii_serialization())
}
