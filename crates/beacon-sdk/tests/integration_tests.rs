use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use beacon_sdk::{AuthState, Client, Config, KeepPolicy, StorageScope};
use beacon_testing::{MockBackend, meta_of, test_credentials};

fn test_config() -> Config {
    Config {
        retry_count: 1,
        retry_interval_ms: 10,
        batch_wait_ms: 0,
        straggler_timeout_ms: 200,
        durable_cache: false,
        ..Default::default()
    }
}

async fn test_client(backend: &Arc<MockBackend>) -> Client {
    Client::builder("https://collect.example.com")
        .config(test_config())
        .backend(backend.clone())
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn full_session_flow_over_the_public_surface() {
    let backend = Arc::new(MockBackend::new());
    let client = test_client(&backend).await;

    assert_eq!(client.auth_state().await, AuthState::Unauthenticated);

    backend.push_auth("tok", "sec");
    let state = client.sign_in(test_credentials(), None).await.unwrap();
    assert_eq!(state, AuthState::Authenticated);

    assert!(client.event("session_started", meta_of(&[("screen", "home")])).await);
    client.flush().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let event_request = backend
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("collect/event"))
        .unwrap();
    let body = event_request.body.unwrap();
    assert_eq!(body[0]["event"], json!("session_started"));
    assert_eq!(body[0]["environment"], json!("test"));
    assert_eq!(body[0]["meta"]["screen"], json!("home"));

    client.shutdown().await;
}

#[tokio::test]
async fn timed_wrapper_stamps_flow_through_the_client() {
    let backend = Arc::new(MockBackend::new());
    let client = test_client(&backend).await;

    backend.push_auth("tok", "sec");
    client.sign_in(test_credentials(), None).await.unwrap();

    client.start_assessment("quiz", meta_of(&[])).await;
    client
        .complete_assessment("quiz", 150.0, Some("a|b|c"), meta_of(&[]))
        .await;
    client.flush().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let event_request = backend
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("collect/event"))
        .unwrap();
    let body = event_request.body.unwrap();
    let meta = &body[0]["meta"];
    assert_eq!(meta["type"], json!("assessment"));
    assert_eq!(meta["verb"], json!("completed"));
    assert_eq!(meta["assessment_name"], json!("quiz"));
    assert_eq!(meta["score"], json!("100"));
    assert_eq!(meta["result_options"], json!("a|b|c"));
    assert_eq!(meta["duration"], json!("0"));

    client.shutdown().await;
}

#[tokio::test]
async fn storage_surface_round_trips() {
    let backend = Arc::new(MockBackend::new());
    let client = test_client(&backend).await;

    client
        .set_entry(
            "prefs",
            meta_of(&[("theme", "dark")]),
            StorageScope::Device,
            KeepPolicy::KeepLatest,
        )
        .await
        .unwrap();

    let entries = client.get_entry("prefs", StorageScope::Device).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].get("theme"), Some("dark"));

    client.remove_entry("prefs", StorageScope::Device).await.unwrap();
    assert!(client.get_entry("prefs", StorageScope::Device).await.is_err());

    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_cached_records() {
    let backend = Arc::new(MockBackend::new());
    let transport_config = Config {
        straggler_timeout_ms: 60_000,
        ..test_config()
    };
    let client = Client::builder("https://collect.example.com")
        .config(transport_config)
        .backend(backend.clone())
        .build()
        .await
        .unwrap();

    backend.push_auth("tok", "sec");
    client.sign_in(test_credentials(), None).await.unwrap();

    // Held back by the long straggler timeout until shutdown drains it.
    client.event("last_words", meta_of(&[])).await;
    client.shutdown().await;

    let delivered = backend
        .request_paths()
        .iter()
        .any(|p| p.ends_with("collect/event"));
    assert!(delivered);
}
