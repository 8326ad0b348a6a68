//! Config tests.

use std::env;
use std::time::Duration;

use serial_test::serial;

use crate::config::{ServiceConfig, StoreBackend};

const VARS: &[&str] = &[
    "LISTEN_ADDR",
    "SERVER_PORT",
    "STORE_BACKEND",
    "REDIS_ADDR",
    "REDIS_USERNAME",
    "REDIS_PASSWORD",
    "REDIS_DB",
    "DATABASE_URL",
    "PAGE_SIZE",
    "STORE_TIMEOUT_MS",
    "LOG_FILE",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_load_config_with_defaults() {
    clear_env();

    let config = ServiceConfig::load().unwrap();

    assert_eq!(config.listen_addr, "0.0.0.0");
    assert_eq!(config.server_port, 8080);
    assert_eq!(config.store_backend, StoreBackend::Redis);
    assert_eq!(config.redis.address, "localhost:6379");
    assert!(config.redis.username.is_none());
    assert!(config.redis.password.is_none());
    assert_eq!(config.redis.database, 0);
    assert_eq!(config.database_url, "./messages.db");
    assert_eq!(config.page_size, 50);
    assert!(config.store_timeout.is_none());
    assert!(config.log_file.is_none());
    assert!(config.validate().is_ok());
    assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
}

#[test]
#[serial]
fn test_load_config_with_custom_values() {
    clear_env();
    env::set_var("LISTEN_ADDR", "127.0.0.1");
    env::set_var("SERVER_PORT", "3000");
    env::set_var("STORE_BACKEND", "SQLite");
    env::set_var("REDIS_ADDR", "cache:6380");
    env::set_var("REDIS_USERNAME", "svc");
    env::set_var("REDIS_PASSWORD", "secret");
    env::set_var("REDIS_DB", "2");
    env::set_var("DATABASE_URL", "/tmp/custom.db");
    env::set_var("PAGE_SIZE", "10");
    env::set_var("STORE_TIMEOUT_MS", "250");
    env::set_var("LOG_FILE", "/var/log/messages.log");

    let config = ServiceConfig::load().unwrap();

    assert_eq!(config.server_port, 3000);
    assert_eq!(config.store_backend, StoreBackend::Sqlite);
    assert_eq!(config.redis.address, "cache:6380");
    assert_eq!(config.redis.username.as_deref(), Some("svc"));
    assert_eq!(config.redis.password.as_deref(), Some("secret"));
    assert_eq!(config.redis.database, 2);
    assert_eq!(config.database_url, "/tmp/custom.db");
    assert_eq!(config.page_size, 10);
    assert_eq!(config.store_timeout, Some(Duration::from_millis(250)));
    assert_eq!(
        config.store_options().operation_timeout,
        Some(Duration::from_millis(250))
    );
    assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    assert_eq!(config.log_file.as_deref(), Some("/var/log/messages.log"));
    clear_env();
}

#[test]
#[serial]
fn test_unparsable_port_is_an_error() {
    clear_env();
    env::set_var("SERVER_PORT", "eighty");

    let err = ServiceConfig::load().unwrap_err();

    assert!(err.to_string().contains("SERVER_PORT"));
    clear_env();
}

#[test]
#[serial]
fn test_unknown_backend_is_an_error() {
    clear_env();
    env::set_var("STORE_BACKEND", "postgres");

    let err = ServiceConfig::load().unwrap_err();

    assert!(err.to_string().contains("STORE_BACKEND"));
    clear_env();
}

#[test]
#[serial]
fn test_validate_rejects_zero_page_size() {
    clear_env();
    env::set_var("PAGE_SIZE", "0");

    let config = ServiceConfig::load().unwrap();

    assert!(config.validate().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_validate_rejects_bad_listen_addr() {
    clear_env();
    env::set_var("LISTEN_ADDR", "not-an-ip");

    let config = ServiceConfig::load().unwrap();

    assert!(config.validate().is_err());
    assert!(config.socket_addr().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_empty_log_file_means_stdout_only() {
    clear_env();
    env::set_var("LOG_FILE", "");

    let config = ServiceConfig::load().unwrap();

    assert!(config.log_file.is_none());
    clear_env();
}

#[test]
fn test_backend_kinds() {
    assert!(StoreBackend::Redis.is_key_value());
    assert!(StoreBackend::Memory.is_key_value());
    assert!(!StoreBackend::Sqlite.is_key_value());
    assert_eq!(StoreBackend::Memory.to_string(), "memory");
}
