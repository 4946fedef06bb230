//! Hydros Agent - simulation agents and the host that runs them.
//!
//! An [`AgentHost`] is the [`CommandHandler`](hydros_coordination::CommandHandler)
//! of a coordination client. It creates agents through registered
//! [`AgentFactory`]s when a task starts, routes ticks, data updates and
//! calculation requests by context and drive mode, and retires the agents
//! when the task terminates.

pub mod agent;
pub mod base;
pub mod error;
pub mod event_driven;
pub mod factory;
pub mod host;
pub mod lifecycle;
pub mod tickable;

pub use crate::agent::SimAgent;
pub use crate::base::{AgentCore, LifecycleState};
pub use crate::error::AgentError;
pub use crate::event_driven::{EventDrivenAgent, ModelCalculation};
pub use crate::factory::{AgentFactory, SimpleFactory};
pub use crate::host::AgentHost;
pub use crate::tickable::{BoundaryCache, TickContext, TickStep, TickableAgent};
