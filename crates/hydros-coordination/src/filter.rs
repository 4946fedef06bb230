use std::collections::HashMap;
use std::sync::Arc;

use hydros_protocol::{CommandKind, CommandType, SimCommand};
use hydros_state::StateManager;

/// How a command type is treated by [`MessageFilter::is_received`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reception {
    /// Every listener evaluates it.
    Always,
    /// Accepted only when the source agent is not hosted here, so a client
    /// never reacts to the echo of its own output.
    RemoteSourceOnly,
    /// Dropped.
    Never,
}

/// Decides whether a decoded broadcast command is meant for this process.
///
/// The reception table starts from these defaults and can be extended:
///
/// | command type                    | reception          |
/// |---------------------------------|--------------------|
/// | every request                   | `Always`           |
/// | `task_init_response`            | `RemoteSourceOnly` |
/// | `agent_instance_status_report`  | `RemoteSourceOnly` |
/// | everything else                 | `Never`            |
#[derive(Debug, Clone)]
pub struct MessageFilter {
    state: Arc<StateManager>,
    reception: HashMap<CommandType, Reception>,
}

impl MessageFilter {
    pub fn new(state: Arc<StateManager>) -> Self {
        let reception = CommandType::ALL
            .into_iter()
            .map(|t| (t, default_reception(t)))
            .collect();
        Self { state, reception }
    }

    /// Override the reception rule for one command type.
    pub fn with_reception(mut self, command_type: CommandType, reception: Reception) -> Self {
        self.reception.insert(command_type, reception);
        self
    }

    pub fn reception(&self, command_type: CommandType) -> Reception {
        self.reception
            .get(&command_type)
            .copied()
            .unwrap_or(Reception::Never)
    }

    /// Task-init requests always pass (they activate the context); anything
    /// else passes only while its context is active.
    pub fn is_active_to_task(&self, cmd: &SimCommand) -> bool {
        if matches!(cmd, SimCommand::TaskInitRequest(_)) {
            return true;
        }
        self.state.has_active_context(cmd.context())
    }

    pub fn is_received(&self, cmd: &SimCommand) -> bool {
        match self.reception(cmd.command_type()) {
            Reception::Always => true,
            Reception::Never => false,
            Reception::RemoteSourceOnly => cmd
                .source_agent_instance()
                .is_some_and(|source| self.state.is_remote_agent(source)),
        }
    }

    pub fn should_process(&self, cmd: &SimCommand) -> bool {
        self.is_active_to_task(cmd) && self.is_received(cmd)
    }
}

fn default_reception(command_type: CommandType) -> Reception {
    match command_type {
        CommandType::TaskInitResponse | CommandType::AgentInstanceStatusReport => Reception::RemoteSourceOnly,
        t if t.kind() == CommandKind::Request => Reception::Always,
        _ => Reception::Never,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let filter = MessageFilter::new(Arc::new(StateManager::new()));
        assert_eq!(filter.reception(CommandType::TickRequest), Reception::Always);
        assert_eq!(filter.reception(CommandType::TaskInitResponse), Reception::RemoteSourceOnly);
        assert_eq!(filter.reception(CommandType::TickResponse), Reception::Never);
        assert_eq!(filter.reception(CommandType::AlertReport), Reception::Never);
    }

    #[test]
    fn test_override() {
        let filter = MessageFilter::new(Arc::new(StateManager::new()))
            .with_reception(CommandType::AlertReport, Reception::RemoteSourceOnly);
        assert_eq!(filter.reception(CommandType::AlertReport), Reception::RemoteSourceOnly);
    }
}
