// src/services/mod.rs
pub mod chatbot;
pub mod rate_limit;
pub mod store;
