//! Virtual try-on orchestration backend.
//!
//! This library drives the try-on flow for a mobile fashion client:
//! uploaded person/garment photos are normalized, submitted to a remote
//! image-synthesis vendor as an async job, polled to completion, and the
//! generated composite is persisted and served statically.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
