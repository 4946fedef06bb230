use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use hydros_protocol::{AgentInstance, SimCommand};
use hydros_state::StateManager;

use crate::error::CoordinationError;
use crate::transport::Publisher;

/// Item processed by the outbound worker, strictly in FIFO order.
#[derive(Debug, Clone)]
pub enum Outbound {
    Publish(SimCommand),
    /// Drop the local registration of an agent once everything queued
    /// before it has been handled.
    ReleaseLocal(AgentInstance),
}

/// Non-blocking handle handlers use to queue outbound work.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

pub(crate) type OutboundQueue = Arc<AsyncMutex<mpsc::UnboundedReceiver<Outbound>>>;

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append a command to the queue. Returns `false` if the queue is gone.
    pub fn enqueue(&self, cmd: impl Into<SimCommand>) -> bool {
        let cmd = cmd.into();
        let command_id = cmd.command_id().to_string();
        let command_type = cmd.command_type();
        match self.tx.send(Outbound::Publish(cmd)) {
            Ok(()) => {
                tracing::debug!(command_id = %command_id, command_type = %command_type, "Enqueued command");
                true
            }
            Err(_) => {
                tracing::error!(command_id = %command_id, command_type = %command_type, "Outbound queue closed");
                false
            }
        }
    }

    /// Queue the release of an agent's local registration behind any
    /// responses it already enqueued.
    pub fn release_local(&self, agent: AgentInstance) -> bool {
        self.tx.send(Outbound::ReleaseLocal(agent)).is_ok()
    }
}

/// Bounded exponential backoff: retry `n` (1-based) is preceded by a wait
/// of `base_delay * 2^n`, so the first retry waits twice the base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry_count: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retry_count.saturating_add(1)
    }
}

/// Responses and reports are sent only when their source agent is hosted
/// by this process. Requests are never sent by a client.
pub fn should_send(state: &StateManager, cmd: &SimCommand) -> bool {
    if cmd.is_request() {
        return false;
    }
    cmd.source_agent_instance()
        .is_some_and(|source| state.is_local_agent(source))
}

/// Publish one command, retrying with exponential backoff. Fails with
/// [`CoordinationError::RetryExhausted`] after `max_retry_count + 1` attempts.
pub async fn send_with_retry(
    publisher: &dyn Publisher,
    topic: &str,
    cmd: &SimCommand,
    policy: RetryPolicy,
) -> Result<(), CoordinationError> {
    let payload = cmd.encode()?;
    let mut last_error = String::new();

    for attempt in 0..policy.max_attempts() {
        match publisher.publish(topic, payload.clone()).await {
            Ok(()) => {
                tracing::info!(
                    command_id = %cmd.command_id(),
                    command_type = %cmd.command_type(),
                    attempt = attempt + 1,
                    "Published command"
                );
                return Ok(());
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < policy.max_retry_count {
                    let delay = policy.delay_for(attempt + 1);
                    tracing::warn!(
                        command_id = %cmd.command_id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(CoordinationError::RetryExhausted {
        command_id: cmd.command_id().to_string(),
        attempts: policy.max_attempts(),
        last_error,
    })
}

/// Drains the outbound queue until the running flag is cleared.
pub(crate) struct OutboundWorker {
    pub state: Arc<StateManager>,
    pub publisher: Arc<dyn Publisher>,
    pub topic: String,
    pub policy: RetryPolicy,
    pub poll_interval: Duration,
    pub running: Arc<AtomicBool>,
}

impl OutboundWorker {
    pub async fn run(self, queue: OutboundQueue) {
        let mut rx = queue.lock().await;
        tracing::info!(topic = %self.topic, "Outbound worker started");

        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(self.poll_interval, rx.recv()).await {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(item)) => self.process(item).await,
            }
        }

        tracing::info!("Outbound worker stopped");
    }

    async fn process(&self, item: Outbound) {
        match item {
            Outbound::Publish(cmd) => {
                if !should_send(&self.state, &cmd) {
                    tracing::debug!(
                        command_id = %cmd.command_id(),
                        command_type = %cmd.command_type(),
                        "Skipping command not owned by a local agent"
                    );
                    return;
                }
                if let Err(e) = send_with_retry(self.publisher.as_ref(), &self.topic, &cmd, self.policy).await {
                    tracing::error!(
                        command_id = %cmd.command_id(),
                        command_type = %cmd.command_type(),
                        error = %e,
                        "Dropping command"
                    );
                }
            }
            Outbound::ReleaseLocal(agent) => self.state.remove_local_agent(&agent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy {
            max_retry_count: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(64), Duration::from_secs(u32::MAX as u64));
    }
}
