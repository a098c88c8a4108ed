//! Backend process for tether.
//!
//! Owns the process-scoped services (event hub, remote connection manager,
//! notification center, shell state), serves them over HTTP and shuts down
//! cleanly on request.

pub mod daemon;
pub mod shutdown;
