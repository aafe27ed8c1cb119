//! Customer-support chat client with a reference chat service.
//!
//! The client side keeps one conversation consistent with a remote service
//! ([`session`]); the server side ([`routes`]) answers the same wire contract.

pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod message;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
