//! switchboard-gateway — HTTP front end for the routing engine
//!
//! Exposes generation, health, readiness, and status endpoints over
//! Axum. All routing decisions live in switchboard-core; this crate
//! only translates HTTP to router calls and back.

pub mod protocol;
pub mod server;

pub use server::GatewayServer;
