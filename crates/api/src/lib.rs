//! HTTP API: server wiring, session transport and request/response mapping.

pub mod app;
pub mod config;
pub mod middleware;
pub mod transport;
