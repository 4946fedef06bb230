//! Hydros Protocol - Core types and command definitions
//!
//! Implements the coordination message model shared by every agent process
//! attached to a cluster topic: one UTF-8 JSON object per message, with the
//! `command_type` field selecting the variant.

pub mod commands;
pub mod constants;
pub mod error;
pub mod error_codes;
pub mod identity;
pub mod types;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use error_codes::ErrorCode;
pub use identity::{generate_agent_instance_id, generate_command_id, parse_agent_instance_id, AgentInstanceIdParts};
pub use types::*;
