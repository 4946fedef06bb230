use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use hydros_coordination::*;
use hydros_protocol::*;
use hydros_state::StateManager;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    fn commands(&self) -> Vec<SimCommand> {
        self.published
            .lock()
            .iter()
            .map(|(_, payload)| SimCommand::decode(payload).unwrap())
            .collect()
    }

    async fn wait_for(&self, count: usize) -> Vec<SimCommand> {
        for _ in 0..200 {
            if self.published.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.commands()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), CoordinationError> {
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }
}

struct Recorder {
    state: Arc<StateManager>,
    seen: Mutex<Vec<CommandType>>,
}

impl CommandHandler for Recorder {
    fn on_task_init(&self, request: &TaskInitRequest) -> HandlerResult {
        self.seen.lock().push(CommandType::TaskInitRequest);
        self.state.init_task(&request.header.context, &[]);
        Ok(())
    }

    fn on_tick(&self, request: &TickRequest) -> HandlerResult {
        self.seen.lock().push(CommandType::TickRequest);
        match request.step {
            s if s < 0 => Err("negative step".into()),
            13 => panic!("unlucky step"),
            _ => Ok(()),
        }
    }

    fn on_terminate(&self, request: &TerminateRequest) -> HandlerResult {
        self.seen.lock().push(CommandType::TerminateRequest);
        self.state.terminate_task(&request.header.context);
        Ok(())
    }
}

fn config() -> ClientConfig {
    ClientConfig::new("tcp://localhost", "weijiahao")
        .with_node_id("node-1")
        .with_queue_poll_interval_ms(20)
        .with_retry(2, 10)
}

fn client(publisher: Arc<RecordingPublisher>) -> CoordinationClient<Recorder> {
    init_tracing();
    let state = Arc::new(StateManager::new());
    CoordinationClient::with_publisher(config(), state, publisher, |_outbox, state| Recorder {
        state,
        seen: Mutex::new(Vec::new()),
    })
    .unwrap()
}

fn local_agent(client: &CoordinationClient<Recorder>, ctx: &SimulationContext) -> AgentInstance {
    let agent = AgentInstance {
        definition: AgentDefinition::new("A", "TWINS_SIMULATION_AGENT"),
        agent_id: generate_agent_instance_id("A"),
        biz_scene_instance_id: ctx.biz_scene_instance_id.clone(),
        cluster_id: "weijiahao".into(),
        node_id: "node-1".into(),
        context: ctx.clone(),
        biz_status: AgentBizStatus::Active,
        drive_mode: AgentDriveMode::SimTickDriven,
    };
    client.state().register_agent_instance(&agent);
    client.state().add_local_agent(&agent);
    agent
}

fn tick_payload(ctx: &str, step: i64) -> Vec<u8> {
    SimCommand::from(TickRequest {
        header: CommandHeader::new(SimulationContext::new(ctx)),
        step,
        delta_time: Some(1.0),
    })
    .encode()
    .unwrap()
}

fn tick_response(agent: &AgentInstance, step: i64) -> TickResponse {
    TickResponse {
        header: CommandHeader::new(agent.context.clone()),
        outcome: Outcome::succeed(agent.clone()),
        step,
    }
}

#[test]
fn test_identity_seeded_from_config() {
    let client = client(Arc::new(RecordingPublisher::default()));
    assert_eq!(client.state().cluster_id().as_deref(), Some("weijiahao"));
    assert_eq!(client.state().node_id().as_deref(), Some("node-1"));
    assert_eq!(client.topic(), "/hydros/commands/coordination/weijiahao");
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn test_inbound_filter_and_dispatch() {
    let client = client(Arc::new(RecordingPublisher::default()));

    // Tick for a context nobody initialized.
    client.handle_payload(&tick_payload("T1", 1));
    assert!(client.handler().seen.lock().is_empty());

    let init = SimCommand::from(TaskInitRequest {
        header: CommandHeader::new(SimulationContext::new("T1")),
        agent_list: vec![AgentDefinition::new("A", "TWINS_SIMULATION_AGENT")],
        biz_scene_configuration_url: None,
    });
    client.handle_payload(&init.encode().unwrap());
    assert!(client.state().has_active_context(&SimulationContext::new("T1")));

    client.handle_payload(&tick_payload("T1", 1));
    assert_eq!(
        *client.handler().seen.lock(),
        vec![CommandType::TaskInitRequest, CommandType::TickRequest]
    );
}

#[test]
fn test_bad_input_never_propagates() {
    let client = client(Arc::new(RecordingPublisher::default()));
    client.state().add_active_context(&SimulationContext::new("T1"));

    client.handle_payload(b"not json at all");
    client.handle_payload(br#"{"command_type":"unheard_of","command_id":"x"}"#);
    client.handle_payload(&tick_payload("T1", -1));
    client.handle_payload(&tick_payload("T1", 13));
    client.handle_payload(&tick_payload("T1", 14));

    assert_eq!(client.handler().seen.lock().len(), 3);
}

#[test]
fn test_sibling_created_registered() {
    let client = client(Arc::new(RecordingPublisher::default()));
    let ctx = SimulationContext::new("T1");
    client.state().add_active_context(&ctx);

    let sibling = AgentInstance {
        node_id: "node-2".into(),
        ..AgentInstance {
            definition: AgentDefinition::new("B", "ONTOLOGY_SIMULATION_AGENT"),
            agent_id: generate_agent_instance_id("B"),
            biz_scene_instance_id: "T1".into(),
            cluster_id: "weijiahao".into(),
            node_id: String::new(),
            context: ctx.clone(),
            biz_status: AgentBizStatus::Active,
            drive_mode: AgentDriveMode::EventDriven,
        }
    };
    let response = SimCommand::from(TaskInitResponse {
        header: CommandHeader::new(ctx),
        outcome: Outcome::succeed(sibling.clone()),
        created_agent_instances: vec![sibling.clone()],
        managed_top_objects: Default::default(),
    });
    client.handle_payload(&response.encode().unwrap());

    assert_eq!(client.state().get_agent_instance(&sibling.agent_id), Some(sibling));
}

#[tokio::test]
async fn test_worker_preserves_fifo_order() {
    let publisher = Arc::new(RecordingPublisher::default());
    let client = client(publisher.clone());
    client.start().await.unwrap();
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    let agent = local_agent(&client, &SimulationContext::new("T1"));
    assert!(client.enqueue(tick_response(&agent, 1)));
    assert!(client.enqueue(tick_response(&agent, 2)));

    let sent = publisher.wait_for(2).await;
    let steps: Vec<i64> = sent
        .iter()
        .map(|cmd| match cmd {
            SimCommand::TickResponse(r) => r.step,
            other => panic!("unexpected {}", other.command_type()),
        })
        .collect();
    assert_eq!(steps, vec![1, 2]);
    assert!(publisher
        .published
        .lock()
        .iter()
        .all(|(topic, _)| topic == "/hydros/commands/coordination/weijiahao"));

    client.stop().await.unwrap();
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_worker_skips_foreign_sources() {
    let publisher = Arc::new(RecordingPublisher::default());
    let client = client(publisher.clone());
    client.start().await.unwrap();

    let ctx = SimulationContext::new("T1");
    let local = local_agent(&client, &ctx);
    let mut foreign = local.clone();
    foreign.agent_id = generate_agent_instance_id("A");

    client.enqueue(tick_response(&foreign, 1));
    client.enqueue(tick_response(&local, 2));

    let sent = publisher.wait_for(1).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(publisher.commands().len(), 1);
    assert_eq!(sent[0].source_agent_instance(), Some(&local));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_release_after_last_response() {
    let publisher = Arc::new(RecordingPublisher::default());
    let client = client(publisher.clone());
    let ctx = SimulationContext::new("T1");
    let agent = local_agent(&client, &ctx);

    // Queued before the worker starts: the release must not overtake the reply.
    let outbox = client.outbox();
    outbox.enqueue(TerminateResponse {
        header: CommandHeader::new(ctx),
        outcome: Outcome::succeed(agent.clone()),
    });
    outbox.release_local(agent.clone());

    client.start().await.unwrap();
    let sent = publisher.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    for _ in 0..100 {
        if !client.state().is_local_agent(&agent) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!client.state().is_local_agent(&agent));
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_misuse() {
    let client = client(Arc::new(RecordingPublisher::default()));
    assert!(matches!(client.stop().await, Err(CoordinationError::NotRunning)));
    client.start().await.unwrap();
    assert!(matches!(client.start().await, Err(CoordinationError::AlreadyRunning)));
    client.stop().await.unwrap();
    // Restartable after a clean stop.
    client.start().await.unwrap();
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_send_now() {
    let publisher = Arc::new(RecordingPublisher::default());
    let client = client(publisher.clone());
    let agent = local_agent(&client, &SimulationContext::new("T1"));

    client.send_now(tick_response(&agent, 7)).await.unwrap();
    assert_eq!(publisher.commands().len(), 1);

    let request = TickRequest {
        header: CommandHeader::new(SimulationContext::new("T1")),
        step: 1,
        delta_time: None,
    };
    assert!(matches!(
        client.send_now(request).await,
        Err(CoordinationError::NotSendable(_))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let state = Arc::new(StateManager::new());
    let result = CoordinationClient::with_publisher(
        ClientConfig::new("", ""),
        state,
        Arc::new(RecordingPublisher::default()),
        |_, state| Recorder {
            state,
            seen: Mutex::new(Vec::new()),
        },
    );
    assert!(matches!(result, Err(CoordinationError::Config(_))));
}

#[tokio::test]
async fn test_start_times_out_without_broker() {
    init_tracing();
    let mut config = ClientConfig::new("127.0.0.1", "c1").with_port(1);
    config.connect_timeout_secs = 1;
    let state = Arc::new(StateManager::new());
    let client = CoordinationClient::mqtt(config, state, |_outbox, state| Recorder {
        state,
        seen: Mutex::new(Vec::new()),
    })
    .unwrap();

    for _ in 0..2 {
        let result = client.start().await;
        assert!(matches!(result, Err(CoordinationError::ConnectTimeout(_))));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_running());
    }
    assert!(matches!(client.stop().await, Err(CoordinationError::NotRunning)));
}

#[tokio::test]
async fn test_with_filter_replaces_reception() {
    let publisher = Arc::new(RecordingPublisher::default());
    let client = client(publisher);
    assert_eq!(client.filter().reception(CommandType::TickResponse), Reception::Never);

    client.start().await.unwrap();
    client.stop().await.unwrap();
    let client = client.with_filter(|f| f.with_reception(CommandType::TickResponse, Reception::RemoteSourceOnly));

    assert_eq!(
        client.filter().reception(CommandType::TickResponse),
        Reception::RemoteSourceOnly
    );
    assert_eq!(client.filter().reception(CommandType::TickRequest), Reception::Always);
    client.start().await.unwrap();
    client.stop().await.unwrap();
}
