//! Client side of the tether control plane.
//!
//! UI code talks to the backend through one [`CallSurface`] regardless of
//! how it is hosted:
//! - embedded in the desktop shell, the host injects an in-process bridge
//! - as a detached web view, [`HttpTransport`] speaks HTTP for calls and
//!   subscribes to the server's event stream for pushes
//!
//! [`TransportResolver`] makes that choice once per process and [`Api`] is
//! the handle every consumer holds.
//!
//! Key modules:
//! - [`surface`]: the call surface trait and typed event helpers
//! - [`listeners`]: per-channel listener registry
//! - [`sse`]: incremental event-stream decoder
//! - [`http_transport`]: network transport client
//! - [`resolver`]: transport selection and the forwarding handle

pub mod error;
pub mod http_transport;
pub mod listeners;
pub mod resolver;
pub mod sse;
pub mod surface;

pub use error::TransportError;
pub use http_transport::{HttpTransport, ReconnectPolicy, StreamState};
pub use listeners::{Listener, ListenerRegistry, Subscription};
pub use resolver::{port_from_query, Api, HostEnvironment, TransportResolver};
pub use surface::{CallSurface, CallSurfaceExt, TransportKind};
