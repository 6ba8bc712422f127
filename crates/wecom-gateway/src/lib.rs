//! WeCom callback gateway: verifies and decrypts platform callbacks, answers
//! URL verification, and relays @mentions to an AI assistant.

pub mod ai;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod mention;
pub mod message;
pub mod metrics;
pub mod protocol;
pub mod server;

#[cfg(test)]
mod proptests;

pub use server::{build_router, GatewayServer};
