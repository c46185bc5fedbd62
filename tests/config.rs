use std::io::Write;
use std::time::Duration;
use withdrawal_ledger::config::{load_config, AppConfig};

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        r#"
[server]
host = "0.0.0.0:9000"

[database]
max_connections = 3

[ledger]
enforce_quorum = true
operation_timeout_ms = 1500

[logging]
level = "debug"
"#
    )
    .unwrap();

    let config = load_config(Some(file.path())).unwrap();

    assert_eq!(config.server.host, "0.0.0.0:9000");
    assert_eq!(config.database.max_connections, 3);
    assert!(config.ledger.enforce_quorum);
    assert_eq!(
        config.ledger.operation_timeout(),
        Some(Duration::from_millis(1500))
    );
    assert_eq!(config.ledger.default_page_size, 20);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_missing_sections_fall_back_to_defaults() {
    let config: AppConfig = serde_json::from_str("{}").unwrap();

    assert_eq!(config.server.host, "127.0.0.1:8080");
    assert_eq!(config.database.max_connections, 10);
    assert!(!config.ledger.enforce_quorum);
    assert_eq!(config.ledger.operation_timeout(), None);
    assert_eq!(config.ledger.max_page_size, 100);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let result = load_config(Some(std::path::Path::new("/nonexistent/withdrawal-ledger.toml")));
    assert!(result.is_err());
}
