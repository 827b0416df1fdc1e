use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_registry_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("REGISTRY__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = RegistryConfig::default();

    assert_eq!(config.catalog.default_ttl_ms, 30_000);
    assert_eq!(config.replication.send_timeout_ms, 7_000);
    assert_eq!(config.replication.flush_interval_ms, 100);
    assert_eq!(config.replication.reconnect_base_delay_ms, 3_000);
    assert_eq!(config.replication.disconnected_threshold_ms, 600_000);
    assert!(!config.replication.enabled);
    assert!(!config.monitoring.metrics_enabled);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_registry_env_vars();
    with_vars(
        vec![
            ("REGISTRY__CATALOG__NAMESPACE_CAPACITY", Some("-1")),
            ("REGISTRY__REPLICATION__ENABLED", Some("true")),
        ],
        || {
            let config = RegistryConfig::new().unwrap();

            assert_eq!(config.catalog.namespace_capacity, -1);
            assert!(config.replication.enabled);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_registry_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("registry.toml");

    std::fs::write(
        &config_path,
        r#"
        [catalog]
        default_ttl_ms = 20000
        minimum_ttl_ms = 1000

        [cluster]
        self_port = 6200

        [[cluster.members]]
        ip = "127.0.0.1"
        port = 6201
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let config = RegistryConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(config.catalog.default_ttl_ms, 20_000);
        assert_eq!(config.catalog.minimum_ttl_ms, 1_000);
        assert_eq!(config.catalog.maximum_ttl_ms, 600_000);
        assert_eq!(config.cluster.self_port, 6200);
        assert_eq!(config.cluster.members.len(), 1);
        assert_eq!(config.cluster.members[0].port, 6201);
    });
}

#[test]
#[serial]
fn validate_should_reject_inverted_ttl_bounds() {
    cleanup_all_registry_env_vars();
    let mut config = RegistryConfig::default();
    config.catalog.minimum_ttl_ms = 700_000;

    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
#[serial]
fn validate_should_reject_duplicate_members() {
    let mut config = RegistryConfig::default();
    let peer = PeerAddress {
        ip: "10.0.0.1".parse().unwrap(),
        port: 6100,
    };
    config.cluster.members = vec![peer.clone(), peer];

    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn validate_should_reject_zero_queue_sizes() {
    let mut config = RegistryConfig::default();
    config.replication.repair_queue_size = 0;

    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn validate_should_reject_zero_intervals() {
    for field in [
        "reconnect_base_delay_ms",
        "sync_poll_interval_ms",
        "disconnected_threshold_ms",
    ] {
        let mut config = RegistryConfig::default();
        match field {
            "reconnect_base_delay_ms" => config.replication.reconnect_base_delay_ms = 0,
            "sync_poll_interval_ms" => config.replication.sync_poll_interval_ms = 0,
            _ => config.replication.disconnected_threshold_ms = 0,
        }

        match config.validate() {
            Err(Error::InvalidConfig(message)) => assert!(message.contains(field), "{message}"),
            Err(e) => panic!("unexpected error for {field}: {e}"),
            Ok(_) => panic!("{field} = 0 was accepted"),
        }
    }
}
