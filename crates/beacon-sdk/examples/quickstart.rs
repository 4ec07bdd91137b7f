//! Minimal end-to-end usage: sign in, capture a few records, shut down.
//!
//! Run with a collection service URL:
//! `cargo run --example quickstart -- https://collect.example.com`

use beacon_sdk::{Client, Credentials, MetaMap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=debug".into()),
        )
        .init();

    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let client = Client::builder(base_url).build().await?;

    client
        .sign_in(
            Credentials {
                app_id: "demo-app".into(),
                org_id: "demo-org".into(),
                auth_secret: "demo-secret".into(),
                device_id: "demo-device".into(),
                session_id: "demo-session".into(),
                partner_tag: String::new(),
                environment: "demo".into(),
                client_version: env!("CARGO_PKG_VERSION").into(),
                platform: std::env::consts::OS.into(),
                mechanism_value: None,
            },
            Some("demo-user".into()),
        )
        .await?;

    let mut meta = MetaMap::new();
    meta.set("screen", "home");
    client.event("session_started", meta).await;

    client.start_assessment("intro-quiz", MetaMap::new()).await;
    client
        .complete_assessment("intro-quiz", 87.5, Some("a|b|c|d"), MetaMap::new())
        .await;

    while let Some(module) = client.next_module().await {
        println!("next module: {} -> {}", module.name, module.target);
    }

    client.shutdown().await;
    Ok(())
}
