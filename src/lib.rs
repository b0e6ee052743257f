//! Portfolio Backend Library
//!
//! Request gates (bearer-token authentication, role checks, per-IP rate
//! limiting) and the routes they protect. The binary in `main.rs` only wires
//! configuration and serves `api::create_router`.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod memories;
pub mod messages;
pub mod middleware;
