use std::fs;
use std::time::Duration;

use docscope::{MemoryClient, RequiredFilter, Scope, ScopeConfig, ScopeError, ScopedDatabase, TransportError, Value};
use serde_json::json;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("scope.json");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_config_from_file_drives_a_database() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"required_filter": {"tenant": "acme"}, "retry": {"budget_ms": 5000}}"#,
    );
    let config = ScopeConfig::from_path(&path).unwrap();
    assert_eq!(config.retry.budget(), Duration::from_secs(5));

    let client = MemoryClient::new();
    client
        .database("app")
        .collection("orders")
        .unwrap()
        .insert_documents(vec![json!({"tenant": "acme"}), json!({"tenant": "other"})])
        .unwrap();

    let db = ScopedDatabase::new(client.database("app"), Scope::try_from(config).unwrap());
    assert_eq!(db.collection("orders").unwrap().count(Value::Null).unwrap(), 1);
    assert_eq!(db.required_filter().as_document(), json!({"tenant": "acme"}).as_object().unwrap());
}

#[test]
fn test_retry_disabled_in_config() {
    let config = ScopeConfig::from_json_str(r#"{"required_filter": {}, "retry": {"enabled": false}}"#).unwrap();
    let scope = Scope::from_config(&config).unwrap();
    assert!(scope.retry().is_none());

    let client = MemoryClient::new();
    let db = ScopedDatabase::new(client.database("app"), scope);
    let orders = db.collection("orders").unwrap();

    client.faults().fail_next(TransportError::NetworkTimeout("slow".into()));
    assert!(orders.count(Value::Null).unwrap_err().is_transient());
}

#[test]
fn test_builder_matches_file_form() {
    let required = RequiredFilter::from_value(json!({"tenant": "acme"})).unwrap();
    let built = ScopeConfig::new(required)
        .retry_budget(Duration::from_secs(12))
        .retry_bulk_operations(true);

    let parsed = ScopeConfig::from_json_str(
        r#"{"required_filter": {"tenant": "acme"}, "retry": {"budget_ms": 12000, "retry_bulk_operations": true}}"#,
    )
    .unwrap();
    assert_eq!(built, parsed);
    assert!(Scope::from_config(&parsed).unwrap().retries_bulk_operations());
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let err = ScopeConfig::from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ScopeError::ConfigError(_)));
}

#[test]
fn test_malformed_config_is_rejected() {
    let dir = TempDir::new().unwrap();

    let path = write_config(&dir, r#"{"required_filter": [1, 2]}"#);
    assert!(matches!(ScopeConfig::from_path(&path), Err(ScopeError::ConfigError(_))));

    let path = write_config(&dir, r#"{"retry": {"budget_ms": 0}}"#);
    assert!(matches!(ScopeConfig::from_path(&path), Err(ScopeError::ConfigError(_))));
}

#[test]
fn test_builder_config_is_validated_when_scoped() {
    let config = ScopeConfig::default().retry_budget(Duration::from_millis(400));
    let scope = Scope::from_config(&config).unwrap();
    assert_eq!(scope.retry().map(|retry| retry.budget()), Some(Duration::from_millis(400)));

    let config = ScopeConfig::default().retry_budget(Duration::ZERO);
    assert!(matches!(Scope::from_config(&config), Err(ScopeError::ConfigError(_))));
    assert!(Scope::try_from(config.retry(false)).is_ok());
}
