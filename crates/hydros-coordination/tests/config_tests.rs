use std::io::Write;
use std::time::Duration;

use hydros_coordination::*;

#[test]
fn test_minimal_toml_uses_defaults() {
    let config = ClientConfig::from_toml_str(
        r#"
        broker_url = "tcp://192.168.1.24"
        cluster_id = "weijiahao"
        "#,
    )
    .unwrap();

    assert_eq!(config.broker_host(), "192.168.1.24");
    assert_eq!(config.broker_port, 1883);
    assert_eq!(config.qos, Qos::AtLeastOnce);
    assert_eq!(config.topic(), "/hydros/commands/coordination/weijiahao");
    assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    assert_eq!(config.queue_poll_interval(), Duration::from_secs(1));
    assert_eq!(config.stop_join_timeout(), Duration::from_secs(5));
    assert_eq!(
        config.retry_policy(),
        RetryPolicy {
            max_retry_count: 5,
            base_delay: Duration::from_millis(1000),
        }
    );
}

#[test]
fn test_full_toml() {
    let config = ClientConfig::from_toml_str(
        r#"
        broker_url = "broker.internal"
        broker_port = 1884
        cluster_id = "c2"
        node_id = "node-7"
        topic = "/custom/coordination"
        client_id = "hydros_twins_1"
        username = "agent"
        password = "secret"
        qos = "exactly_once"
        max_retry_count = 2
        base_retry_delay_ms = 250
        "#,
    )
    .unwrap();

    assert_eq!(config.broker_port, 1884);
    assert_eq!(config.node_id, "node-7");
    assert_eq!(config.topic(), "/custom/coordination");
    assert_eq!(config.client_id(), "hydros_twins_1");
    assert_eq!(config.qos, Qos::ExactlyOnce);
    assert_eq!(config.retry_policy().delay_for(2), Duration::from_millis(1000));
}

#[test]
fn test_validation_errors() {
    let err = ClientConfig::from_toml_str(r#"broker_url = """#).unwrap_err();
    match err {
        CoordinationError::Config(msg) => {
            assert!(msg.contains("broker_url"));
            assert!(msg.contains("cluster_id"));
        }
        other => panic!("unexpected error {other}"),
    }

    assert!(matches!(
        ClientConfig::from_toml_str("broker_port = 1883"),
        Err(CoordinationError::ConfigParse(_))
    ));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "broker_url = \"localhost\"").unwrap();
    writeln!(file, "cluster_id = \"file-cluster\"").unwrap();

    let config = ClientConfig::load(file.path()).unwrap();
    assert_eq!(config.cluster_id, "file-cluster");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        ClientConfig::load(&missing),
        Err(CoordinationError::ConfigRead { .. })
    ));
}
