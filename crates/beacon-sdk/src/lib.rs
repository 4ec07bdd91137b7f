//! Embedded telemetry collection SDK.
//!
//! A [`Client`] captures structured events, logs, telemetry samples, and
//! key-value state records, caches them locally, and synchronizes them to a
//! remote collection service under an authenticated session.
//!
//! ```no_run
//! use beacon_sdk::{Client, Credentials};
//!
//! # async fn run() -> beacon_sdk::Result<()> {
//! let client = Client::builder("https://collect.example.com")
//!     .build()
//!     .await?;
//!
//! client
//!     .sign_in(
//!         Credentials {
//!             app_id: "app".into(),
//!             org_id: "org".into(),
//!             auth_secret: "secret".into(),
//!             device_id: "device".into(),
//!             session_id: "session".into(),
//!             partner_tag: String::new(),
//!             environment: "production".into(),
//!             client_version: env!("CARGO_PKG_VERSION").into(),
//!             platform: std::env::consts::OS.into(),
//!             mechanism_value: None,
//!         },
//!         Some("user-1".into()),
//!     )
//!     .await?;
//!
//! client.event("session_started", Default::default()).await;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};

pub use beacon_runtime::{AuthState, Score};
pub use beacon_transport::Credentials;
pub use beacon_types::{
    Config, KeepPolicy, LogLevel, MetaMap, ModuleTarget, StorageScope, StringList,
};
