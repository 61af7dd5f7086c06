use scout::utils::toml_config::{ConfigManager, LlmProviderKind, ScoutConfig, SearchProviderKind};
use std::fs;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const EXAMPLE: &str = include_str!("../scout.example.toml");

#[test]
fn test_example_config_matches_defaults() {
    let parsed = ScoutConfig::from_toml(EXAMPLE).unwrap();
    let defaults = ScoutConfig::default();

    assert_eq!(parsed.bind_address(), defaults.bind_address());
    assert_eq!(parsed.llm.provider, LlmProviderKind::Ollama);
    assert_eq!(parsed.search.provider, SearchProviderKind::DuckDuckGo);
    assert_eq!(parsed.research.top_k, defaults.research.top_k);
    assert_eq!(parsed.research.max_page_bytes, defaults.research.max_page_bytes);
    assert_eq!(parsed.research.event_buffer, defaults.research.event_buffer);
    assert_eq!(parsed.pipelines.default, "research");
}

#[test]
fn test_empty_file_uses_defaults() {
    let config = ScoutConfig::from_toml("").unwrap();
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.research.top_k, 3);
    assert_eq!(config.research.fetch_timeout(), Duration::from_secs(30));
}

#[tokio::test]
async fn test_file_watcher_hot_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scout.toml");
    fs::write(&path, "[research]\ntop_k = 3\n").unwrap();

    let manager = ConfigManager::new(&path).unwrap();
    manager.start_watching().unwrap();
    let before = manager.config();

    // Give the watcher a moment to register before writing
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(&path, "[research]\ntop_k = 7\n").unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.config().research.top_k != 7 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    manager.stop_watching();

    assert_eq!(manager.config().research.top_k, 7);
    // Snapshots taken earlier are unaffected
    assert_eq!(before.research.top_k, 3);
}

#[tokio::test]
async fn test_invalid_edit_keeps_previous_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scout.toml");
    fs::write(&path, "[research]\ntop_k = 4\n").unwrap();

    let manager = ConfigManager::new(&path).unwrap();
    fs::write(&path, "[research]\ntop_k = 0\n").unwrap();

    assert!(manager.reload().is_err());
    assert_eq!(manager.config().research.top_k, 4);
}
