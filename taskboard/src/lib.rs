//! Client-side state for a shared Kanban task board.
//!
//! The [`store`] holds the authoritative local task list. The [`board`]
//! reconciler projects it into columns and applies drag-and-drop. Every
//! backend write goes through the [`gateway`], which announces changes on a
//! [`notify`] bus; the listener turns other users' announcements into
//! [`notice`]s.

pub mod board;
pub mod config;
pub mod crud;
pub mod dashboard;
pub mod gateway;
pub mod notice;
pub mod notify;
pub mod session;
pub mod store;
pub mod view;
