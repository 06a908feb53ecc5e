//! Loading configuration files from disk

use catalog_scraper::config::{Config, ConfigError};
use std::io::Write;
use std::time::Duration;

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_file_and_derive_runtime_settings() {
    let file = write_config(
        r#"
env: local
local:
  upstream:
    base_url: "https://shop.test/"
    store_id: 86
  http:
    timeout_seconds: 12
    retries: 4
    base_delay_ms: 50
  pagination:
    max_products: 1000
  server:
    host: 127.0.0.1
    port: 8088
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.upstream.store_id, 86);
    assert_eq!(config.http_timeout(), Duration::from_secs(12));
    assert_eq!(config.cli_deadline(), Duration::from_secs(300));
    assert_eq!(config.server_addr(), Some("127.0.0.1:8088".parse().unwrap()));

    let options = config.transport_options(7);
    assert_eq!(options.retries, 4);
    assert_eq!(options.concurrency, 7);
    assert_eq!(options.base_delay, Duration::from_millis(50));
    assert_eq!(options.max_delay, Duration::from_secs(8));
    assert!(options.proxy.is_none());

    let pagination = config.pagination_settings();
    assert_eq!(pagination.per_page, 5);
    assert_eq!(pagination.max_products, 1000);
}

#[test]
fn test_environment_overrides_file_values() {
    let file = write_config("env: dev\ndev:\n  http:\n    retries: 1\n");
    std::env::set_var("CATALOG__DEV__HTTP__RETRIES", "6");
    let loaded = Config::load(file.path());
    std::env::remove_var("CATALOG__DEV__HTTP__RETRIES");

    let config = loaded.unwrap();
    assert_eq!(config.env, "dev");
    assert_eq!(config.http.retries, 6);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = Config::load(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}
