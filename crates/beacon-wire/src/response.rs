use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success response body: `{"status": "<text>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess {
    pub status: String,
}

/// One structured item of a failure `detail` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureItem {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub loc: Vec<Value>,
}

/// The `detail` field of a failure body: free text or a structured list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureDetail {
    Text(String),
    Items(Vec<FailureItem>),
}

/// Failure response body: `{"detail": ...}` or `{"message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFailure {
    #[serde(default)]
    pub detail: Option<FailureDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiFailure {
    /// Human-readable form used for last-error reporting.
    pub fn text(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match &self.detail {
            Some(FailureDetail::Text(text)) => text.clone(),
            Some(FailureDetail::Items(items)) => items
                .iter()
                .filter_map(|item| item.msg.as_deref())
                .collect::<Vec<_>>()
                .join("; "),
            None => "unknown failure".to_string(),
        }
    }
}

/// Authentication success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSuccess {
    pub token: String,
    pub secret: String,
}

/// Outcome of shape-classifying a response body.
#[derive(Debug, Clone)]
pub enum Classified {
    Success(ApiSuccess),
    Failure(ApiFailure),
    /// Neither shape parses; distinct from a transport-level network error.
    Unparseable,
}

/// Classify a response body, trying the success shape before the failure
/// shape.
pub fn classify(body: &Value) -> Classified {
    if let Ok(success) = serde_json::from_value::<ApiSuccess>(body.clone()) {
        return Classified::Success(success);
    }
    if let Ok(failure) = serde_json::from_value::<ApiFailure>(body.clone())
        && (failure.detail.is_some() || failure.message.is_some())
    {
        return Classified::Failure(failure);
    }
    Classified::Unparseable
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_success() {
        match classify(&json!({"status": "accepted"})) {
            Classified::Success(s) => assert_eq!(s.status, "accepted"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_message_form() {
        match classify(&json!({"message": "token expired"})) {
            Classified::Failure(f) => assert_eq!(f.text(), "token expired"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_structured_detail() {
        let body = json!({
            "message": null,
            "detail": [
                {"msg": "field required", "type": "missing", "loc": ["body", "event"]},
                {"msg": "value too long", "type": "length", "loc": ["body", "text"]}
            ]
        });
        match classify(&body) {
            Classified::Failure(f) => {
                assert_eq!(f.text(), "field required; value too long");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_unparseable() {
        assert!(matches!(
            classify(&json!({"weird": true})),
            Classified::Unparseable
        ));
        assert!(matches!(classify(&json!("nope")), Classified::Unparseable));
    }
}
