//! Backend side of the tether control plane.
//!
//! Exposes the application services to every kind of client:
//! - HTTP API for calls plus one server-sent event stream per client
//! - in-process bridge for the embedded desktop shell
//! - broadcast hub fanning backend events out to all attached clients
//!
//! Key modules:
//! - [`event_hub`]: streaming connection registry, publish and keepalive
//! - [`http_api`]: Axum router and handlers
//! - [`ipc`]: in-process call surface
//! - [`remote`]: remote host connection manager
//! - [`notifications`]: notification store

pub mod api_error;
pub mod event_hub;
pub mod http_api;
pub mod ipc;
pub mod notifications;
pub mod remote;
pub mod routes;
pub mod shell;
pub mod updater;
pub mod validation;

pub use event_hub::{EventHub, Frame, StreamingConnection};
pub use http_api::{api_router, ApiState};
pub use ipc::InProcessBridge;
