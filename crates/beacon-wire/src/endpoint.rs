use beacon_types::{AiProxy, Event, LogEntry, StorageEntry, Telemetry};

/// REST collection endpoint for an entity type, relative to the base URL.
///
/// Implemented per concrete type so endpoint selection happens at compile
/// time through generics.
pub trait Endpoint {
    /// Path under the configured base URL.
    const PATH: &'static str;
    /// Short kind name used for batch-size overrides and cache rows.
    const KIND: &'static str;
}

impl Endpoint for Event {
    const PATH: &'static str = "collect/event";
    const KIND: &'static str = "event";
}

impl Endpoint for LogEntry {
    const PATH: &'static str = "collect/log";
    const KIND: &'static str = "log";
}

impl Endpoint for Telemetry {
    const PATH: &'static str = "collect/telemetry";
    const KIND: &'static str = "telemetry";
}

impl Endpoint for AiProxy {
    const PATH: &'static str = "services/llm";
    const KIND: &'static str = "ai_proxy";
}

impl Endpoint for StorageEntry {
    const PATH: &'static str = "storage";
    const KIND: &'static str = "storage";
}

/// Token endpoint used by authentication.
pub const AUTH_TOKEN_PATH: &str = "auth/token";

/// Server-pushed configuration document.
pub const STORAGE_CONFIG_PATH: &str = "storage/config";
