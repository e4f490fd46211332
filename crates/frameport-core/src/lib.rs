//! # frameport-core
//!
//! Core types for the frameport host/plugin bridge: the three wire message
//! shapes, the origin-tagged window transport they travel over, and the error
//! type shared by every other crate in the workspace.

pub mod error;
pub mod message;
pub mod transport;
pub mod types;

pub use error::{FrameportError, Result};
pub use message::{EventMessage, RequestMessage, ResponseMessage, WireMessage};
pub use transport::{Envelope, Transport, Window, WindowHandle, WindowId, WindowTransport, origin_of};
pub use types::*;
