//! # frameport-bridge
//!
//! The messaging endpoints that sit on either side of a frame boundary.
//!
//! A host and its plugins exchange three kinds of message over an untrusted
//! `postMessage`-style channel: requests, responses, and events. One
//! [`Endpoint`] type implements both sides; its [`Role`] decides how incoming
//! requests are routed and whether events are fanned out.
//!
//! ```text
//!   plugin "a" ──request b.ping──▶ host ──request b.ping (new id)──▶ plugin "b"
//!   plugin "a" ◀──response (orig id)── host ◀──────response────────── plugin "b"
//! ```

pub mod correlator;
pub mod endpoint;
pub mod events;
pub mod registry;
pub mod router;

pub use correlator::{Correlator, PendingRequest};
pub use endpoint::{Endpoint, EndpointConfig, RegisteredPluginContext, Role};
pub use events::{EventListenerSet, Listener, ListenerId, listener};
pub use registry::{PluginRegistration, PluginRegistry};
pub use router::{Handler, Route};
