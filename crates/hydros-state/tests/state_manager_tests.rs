use std::sync::Arc;

use hydros_protocol::*;
use hydros_state::*;

fn ctx(id: &str) -> SimulationContext {
    SimulationContext::new(id)
}

fn agent(code: &str, context: &SimulationContext) -> AgentInstance {
    AgentInstance {
        definition: AgentDefinition::new(code, "TWINS_SIMULATION_AGENT"),
        agent_id: generate_agent_instance_id(code),
        biz_scene_instance_id: context.biz_scene_instance_id.clone(),
        cluster_id: "weijiahao".into(),
        node_id: "node-1".into(),
        context: context.clone(),
        biz_status: AgentBizStatus::Init,
        drive_mode: AgentDriveMode::SimTickDriven,
    }
}

#[test]
fn test_uninitialized_context_inactive() {
    let state = StateManager::new();
    assert!(!state.has_active_context(&ctx("T1")));
    assert!(!state.has_active_context(&ctx("")));
    assert!(state.get_task_state("T1").is_none());
}

#[test]
fn test_init_then_terminate() {
    let state = StateManager::new();
    let c = ctx("T1");
    let a = agent("A", &c);

    state.init_task(&c, std::slice::from_ref(&a));
    assert!(state.has_active_context(&c));
    let task = state.get_task_state("T1").unwrap();
    assert_eq!(task.status, TaskStatus::Active);
    assert_eq!(task.agent_ids, vec![a.agent_id.clone()]);
    assert_eq!(state.get_agent_instance(&a.agent_id), Some(a.clone()));
    assert_eq!(state.agents_for_context("T1"), vec![a]);
    assert_eq!(state.active_tasks().len(), 1);

    state.terminate_task(&c);
    assert!(!state.has_active_context(&c));
    let task = state.get_task_state("T1").unwrap();
    assert_eq!(task.status, TaskStatus::Terminated);
    assert!(task.terminated_at.is_some());
    assert!(state.active_tasks().is_empty());

    // Second terminate is a no-op.
    state.terminate_task(&c);
    assert!(!state.has_active_context(&c));
}

#[test]
fn test_terminate_unknown_context() {
    let state = StateManager::new();
    state.terminate_task(&ctx("never-started"));
    state.terminate_task(&ctx(""));
    assert!(state.active_contexts().is_empty());
}

#[test]
fn test_context_toggles_idempotent() {
    let state = StateManager::new();
    let c = ctx("T2");
    state.add_active_context(&c);
    state.add_active_context(&c);
    assert_eq!(state.active_contexts().len(), 1);
    state.remove_active_context(&c);
    state.remove_active_context(&c);
    assert!(!state.has_active_context(&c));
}

#[test]
fn test_empty_context_ignored() {
    let state = StateManager::new();
    state.add_active_context(&ctx(""));
    state.init_task(&ctx(""), &[]);
    assert!(state.active_contexts().is_empty());
}

#[test]
fn test_local_remote_toggle() {
    let state = StateManager::new();
    let a = agent("A", &ctx("T1"));

    assert!(state.is_remote_agent(&a));
    state.add_local_agent(&a);
    assert!(state.is_local_agent(&a));
    assert!(!state.is_remote_agent(&a));
    state.remove_local_agent(&a);
    assert!(!state.is_local_agent(&a));
    assert!(state.is_remote_agent(&a));
}

#[test]
fn test_register_overwrites() {
    let state = StateManager::new();
    let mut a = agent("A", &ctx("T1"));
    state.register_agent_instance(&a);
    a.biz_status = AgentBizStatus::Active;
    state.register_agent_instance(&a);
    assert_eq!(state.get_agent_status(&a.agent_id), Some(AgentBizStatus::Active));

    state.unregister_agent_instance(&a.agent_id);
    assert!(state.get_agent_instance(&a.agent_id).is_none());
}

#[test]
fn test_update_status() {
    let state = StateManager::new();
    let a = agent("A", &ctx("T1"));
    assert!(!state.update_agent_status(&a.agent_id, AgentBizStatus::Failed));
    state.register_agent_instance(&a);
    assert!(state.update_agent_status(&a.agent_id, AgentBizStatus::Failed));
    assert_eq!(state.get_agent_status(&a.agent_id), Some(AgentBizStatus::Failed));
}

#[test]
fn test_clear_keeps_identity() {
    let state = StateManager::with_identity("weijiahao", "node-1");
    let c = ctx("T1");
    let a = agent("A", &c);
    state.init_task(&c, std::slice::from_ref(&a));
    state.add_local_agent(&a);

    state.clear();
    assert!(!state.has_active_context(&c));
    assert!(!state.is_local_agent(&a));
    assert_eq!(state.local_agent_count(), 0);
    assert_eq!(state.cluster_id().as_deref(), Some("weijiahao"));
    assert_eq!(state.node_id().as_deref(), Some("node-1"));
}

#[test]
fn test_shared_across_threads() {
    let state = Arc::new(StateManager::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let state = state.clone();
            std::thread::spawn(move || {
                let c = ctx(&format!("T{i}"));
                state.init_task(&c, &[agent("A", &c)]);
                assert!(state.has_active_context(&c));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(state.active_contexts().len(), 8);
}
