use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{Event, EventLoop, Outgoing, Packet};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use hydros_protocol::SimCommand;
use hydros_state::StateManager;

use crate::config::ClientConfig;
use crate::error::{CoordinationError, HandlerResult};
use crate::filter::MessageFilter;
use crate::handler::CommandHandler;
use crate::outbound::{send_with_retry, should_send, OutboundQueue, OutboundWorker, Outbox};
use crate::transport::{MqttLink, Publisher};

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Inbound half: decode, filter, dispatch.
pub struct Dispatcher<H> {
    state: Arc<StateManager>,
    filter: MessageFilter,
    handler: Arc<H>,
}

impl<H: CommandHandler> Dispatcher<H> {
    /// Handle one raw payload from the topic. Never fails: undecodable
    /// payloads, filtered commands and handler faults are all logged.
    pub fn handle_payload(&self, payload: &[u8]) {
        match SimCommand::decode(payload) {
            Ok(cmd) => {
                self.handle_command(&cmd);
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = payload.len(), "Dropping undecodable payload");
            }
        }
    }

    /// Returns `true` if the command passed the filter and was dispatched.
    pub fn handle_command(&self, cmd: &SimCommand) -> bool {
        if !self.filter.should_process(cmd) {
            tracing::info!(
                command_id = %cmd.command_id(),
                command_type = %cmd.command_type(),
                context_id = %cmd.context_id(),
                "Filtered out command"
            );
            return false;
        }

        tracing::debug!(
            command_id = %cmd.command_id(),
            command_type = %cmd.command_type(),
            context_id = %cmd.context_id(),
            "Dispatching command"
        );

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(cmd))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    command_id = %cmd.command_id(),
                    command_type = %cmd.command_type(),
                    error = %e,
                    "Handler failed"
                );
            }
            Err(_) => {
                tracing::error!(
                    command_id = %cmd.command_id(),
                    command_type = %cmd.command_type(),
                    "Handler panicked"
                );
            }
        }
        true
    }

    fn dispatch(&self, cmd: &SimCommand) -> HandlerResult {
        let handler = self.handler.as_ref();
        match cmd {
            SimCommand::TaskInitRequest(req) => handler.on_task_init(req),
            SimCommand::TickRequest(req) => handler.on_tick(req),
            SimCommand::TerminateRequest(req) => handler.on_terminate(req),
            SimCommand::TimeSeriesDataUpdateRequest(req) => handler.on_time_series_data_update(req),
            SimCommand::TimeSeriesCalculationRequest(req) => handler.on_time_series_calculation(req),
            SimCommand::TaskInitResponse(resp) => handler.on_agent_instance_sibling_created(&self.state, resp),
            SimCommand::AgentInstanceStatusReport(report) => {
                handler.on_agent_instance_sibling_status_updated(&self.state, report)
            }
            SimCommand::ParameterIdentifiedReport(report) => handler.on_parameter_identified(report),
            SimCommand::AlertReport(report) => handler.on_alert(report),
            SimCommand::TickResponse(_)
            | SimCommand::TerminateResponse(_)
            | SimCommand::TimeSeriesDataUpdateResponse(_)
            | SimCommand::TimeSeriesCalculationResponse(_) => handler.on_peer_response(cmd),
        }
    }
}

/// Turns one shared broadcast topic into a per-task command/response
/// channel for the agents hosted in this process.
///
/// Inbound commands are handled on the event-loop task; everything
/// outbound goes through a FIFO drained by a single worker task that
/// publishes with bounded retry.
pub struct CoordinationClient<H> {
    config: ClientConfig,
    topic: String,
    state: Arc<StateManager>,
    dispatcher: Arc<Dispatcher<H>>,
    outbox: Outbox,
    queue: OutboundQueue,
    publisher: Arc<dyn Publisher>,
    link: Option<Arc<MqttLink>>,
    connection: watch::Sender<ConnectionState>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl<H: CommandHandler> CoordinationClient<H> {
    /// Client backed by an MQTT broker. `build` receives the outbox and
    /// state manager so the handler can reply without holding the client.
    pub fn mqtt<F>(config: ClientConfig, state: Arc<StateManager>, build: F) -> Result<Self, CoordinationError>
    where
        F: FnOnce(Outbox, Arc<StateManager>) -> H,
    {
        let link = Arc::new(MqttLink::new(config.qos.into()));
        Self::assemble(config, state, link.clone(), Some(link), build)
    }

    /// Client publishing through any [`Publisher`]. Inbound payloads are
    /// fed with [`handle_payload`](Self::handle_payload).
    pub fn with_publisher<F>(
        config: ClientConfig,
        state: Arc<StateManager>,
        publisher: Arc<dyn Publisher>,
        build: F,
    ) -> Result<Self, CoordinationError>
    where
        F: FnOnce(Outbox, Arc<StateManager>) -> H,
    {
        Self::assemble(config, state, publisher, None, build)
    }

    fn assemble<F>(
        config: ClientConfig,
        state: Arc<StateManager>,
        publisher: Arc<dyn Publisher>,
        link: Option<Arc<MqttLink>>,
        build: F,
    ) -> Result<Self, CoordinationError>
    where
        F: FnOnce(Outbox, Arc<StateManager>) -> H,
    {
        config.validate()?;

        if !config.cluster_id.is_empty() && state.cluster_id().is_none() {
            state.set_cluster_id(config.cluster_id.clone());
        }
        if !config.node_id.is_empty() && state.node_id().is_none() {
            state.set_node_id(config.node_id.clone());
        }

        let (outbox, rx) = Outbox::channel();
        let handler = Arc::new(build(outbox.clone(), state.clone()));
        let dispatcher = Arc::new(Dispatcher {
            state: state.clone(),
            filter: MessageFilter::new(state.clone()),
            handler,
        });
        let (connection, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            topic: config.topic(),
            config,
            state,
            dispatcher,
            outbox,
            queue: Arc::new(AsyncMutex::new(rx)),
            publisher,
            link,
            connection,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            event_loop: Mutex::new(None),
        })
    }

    /// Replace the message filter, e.g. to extend the reception table.
    /// A running event loop keeps the filter it started with; the new one
    /// applies from the next [`start`](Self::start).
    pub fn with_filter(mut self, configure: impl FnOnce(MessageFilter) -> MessageFilter) -> Self {
        let filter = configure(MessageFilter::new(self.state.clone()));
        match Arc::get_mut(&mut self.dispatcher) {
            Some(dispatcher) => dispatcher.filter = filter,
            None => {
                if self.is_running() {
                    tracing::warn!("Filter replaced while running; takes effect on restart");
                }
                self.dispatcher = Arc::new(Dispatcher {
                    state: self.state.clone(),
                    filter,
                    handler: self.dispatcher.handler.clone(),
                });
            }
        }
        self
    }

    /// Connect, subscribe, wait for the broker acknowledgement, then start
    /// the outbound worker.
    pub async fn start(&self) -> Result<(), CoordinationError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CoordinationError::AlreadyRunning);
        }
        self.connection.send_replace(ConnectionState::Connecting);
        tracing::info!(
            broker = %self.config.broker_host(),
            port = self.config.broker_port,
            topic = %self.topic,
            "Starting coordination client"
        );

        if let Some(link) = &self.link {
            let event_loop = link.connect(&self.config);
            let handle = tokio::spawn(drive_event_loop(
                event_loop,
                link.clone(),
                self.topic.clone(),
                self.dispatcher.clone(),
                self.connection.clone(),
                self.running.clone(),
                self.config.reconnect_delay(),
            ));
            *self.event_loop.lock() = Some(handle);

            let mut rx = self.connection.subscribe();
            let connected = tokio::time::timeout(
                self.config.connect_timeout(),
                rx.wait_for(|s| *s == ConnectionState::Connected),
            )
            .await
            .map(|acked| acked.is_ok());
            if !matches!(connected, Ok(true)) {
                self.running.store(false, Ordering::SeqCst);
                let handle = self.event_loop.lock().take();
                if let Some(handle) = handle {
                    handle.abort();
                }
                self.connection.send_replace(ConnectionState::Disconnected);
                tracing::error!(timeout = ?self.config.connect_timeout(), "Broker connection not acknowledged");
                return Err(CoordinationError::ConnectTimeout(self.config.connect_timeout()));
            }
        } else {
            self.connection.send_replace(ConnectionState::Connected);
        }

        let worker = OutboundWorker {
            state: self.state.clone(),
            publisher: self.publisher.clone(),
            topic: self.topic.clone(),
            policy: self.config.retry_policy(),
            poll_interval: self.config.queue_poll_interval(),
            running: self.running.clone(),
        };
        let handle = tokio::spawn(worker.run(self.queue.clone()));
        *self.worker.lock() = Some(handle);

        tracing::info!(topic = %self.topic, "Coordination client started");
        Ok(())
    }

    /// Stop the worker (bounded join), then disconnect.
    pub async fn stop(&self) -> Result<(), CoordinationError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(CoordinationError::NotRunning);
        }

        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.config.stop_join_timeout(), handle).await.is_err() {
                tracing::warn!("Outbound worker did not stop in time, aborting");
                abort.abort();
            }
        }

        match tokio::time::timeout(self.config.stop_join_timeout(), self.publisher.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Disconnect failed"),
            Err(_) => tracing::warn!("Disconnect did not complete in time"),
        }

        let event_loop = self.event_loop.lock().take();
        if let Some(handle) = event_loop {
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(1), handle).await.is_err() {
                abort.abort();
            }
        }

        self.connection.send_replace(ConnectionState::Disconnected);
        tracing::info!("Coordination client stopped");
        Ok(())
    }

    /// Queue a command for the outbound worker.
    pub fn enqueue(&self, cmd: impl Into<SimCommand>) -> bool {
        self.outbox.enqueue(cmd)
    }

    /// Publish immediately on the caller's task, bypassing the queue but
    /// not the eligibility check or the retry policy.
    pub async fn send_now(&self, cmd: impl Into<SimCommand>) -> Result<(), CoordinationError> {
        let cmd = cmd.into();
        if !should_send(&self.state, &cmd) {
            return Err(CoordinationError::NotSendable(cmd.command_type().to_string()));
        }
        send_with_retry(self.publisher.as_ref(), &self.topic, &cmd, self.config.retry_policy()).await
    }

    /// Feed one raw inbound payload through decode, filter and dispatch.
    pub fn handle_payload(&self, payload: &[u8]) {
        self.dispatcher.handle_payload(payload);
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.dispatcher.handler
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.dispatcher.filter
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn drive_event_loop<H: CommandHandler>(
    mut event_loop: EventLoop,
    link: Arc<MqttLink>,
    topic: String,
    dispatcher: Arc<Dispatcher<H>>,
    connection: watch::Sender<ConnectionState>,
    running: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "MQTT connected");
                // Connected only once subscribed.
                match link.try_subscribe(&topic) {
                    Ok(()) => {
                        tracing::info!(topic = %topic, "Subscribed");
                        link.set_connected(true);
                        connection.send_replace(ConnectionState::Connected);
                    }
                    Err(e) => {
                        tracing::error!(topic = %topic, error = %e, "Subscribe failed, client not connected");
                        link.set_connected(false);
                        connection.send_replace(ConnectionState::Disconnected);
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatcher.handle_payload(&publish.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("Broker sent disconnect");
                link.set_connected(false);
                connection.send_replace(ConnectionState::Disconnected);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                link.set_connected(false);
                connection.send_replace(ConnectionState::Disconnected);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                link.set_connected(false);
                connection.send_replace(ConnectionState::Disconnected);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!(error = %e, "MQTT connection error, reconnecting");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
    tracing::debug!("MQTT event loop exited");
}
