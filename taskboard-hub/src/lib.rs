//! Taskboard notification hub.
//!
//! A WebSocket fan-out server: board clients publish change notifications
//! and the hub delivers them to everyone else sharing the same scope.

pub mod config;
pub mod hub;
pub mod scopes;
