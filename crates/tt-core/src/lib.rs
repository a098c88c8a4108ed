//! Core configuration for tether.
//!
//! - [`config`]: the TOML-backed [`config::Config`] model and its defaults
//! - [`config_store`]: the process-wide store with `get`/`update` semantics

pub mod config;
pub mod config_store;
