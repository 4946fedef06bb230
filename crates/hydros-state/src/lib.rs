//! Hydros State - what is running in this process and which tasks are active.
//!
//! A [`StateManager`] is shared (behind an `Arc`) by the inbound dispatch
//! path and the outbound queue worker of a coordination client.

pub mod state_manager;

pub use state_manager::{StateManager, TaskState, TaskStatus};
