//! API route organization by domain.
//!
//! Each domain exposes a function returning a `Router<Arc<ApiState>>`;
//! [`crate::http_api::api_router`] merges them into the application router.
//! Every path is absolute (`/api/...`).

pub mod events;
pub mod misc;
pub mod notifications;
pub mod remote;
pub mod updater;
pub mod validation;
