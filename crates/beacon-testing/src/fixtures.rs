use beacon_transport::Credentials;
use beacon_types::{Clock, Event, MetaMap};

/// Credentials accepted by the scripted backend.
pub fn test_credentials() -> Credentials {
    Credentials {
        app_id: "app-123".to_string(),
        org_id: "org-456".to_string(),
        auth_secret: "s3cret".to_string(),
        device_id: "device-789".to_string(),
        session_id: "session-abc".to_string(),
        partner_tag: "partner".to_string(),
        environment: "test".to_string(),
        client_version: "0.0.0".to_string(),
        platform: "linux".to_string(),
        mechanism_value: None,
    }
}

pub fn meta_of(pairs: &[(&str, &str)]) -> MetaMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn sample_event(clock: &Clock, name: &str) -> Event {
    Event::new(clock, name, "test").with_meta(meta_of(&[("source", "fixture")]))
}
