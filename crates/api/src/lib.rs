//! HTTP API: server, routing, and request/response mapping.

pub mod app;
pub mod context;
pub mod server;
