//! Shared data model and wire formats for the task board.

pub mod api;
pub mod codec;
pub mod event;
pub mod hub;
pub mod task;
