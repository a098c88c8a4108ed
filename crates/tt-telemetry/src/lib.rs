//! Logging and request tracing for tether services.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`
//! - **Tracing**: per-request `x-request-id` propagation and spans

pub mod logging;
pub mod tracing_setup;
