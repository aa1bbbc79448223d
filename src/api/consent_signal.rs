//! Recognition of consent-escalation bodies on 403 responses.
//!
//! The server reports missing consent in a few shapes:
//!
//! ```text
//! { "code": "consent_required", "required_scopes": [...] }
//! { "detail": { "error": "consent_required", "required_scopes": [...] } }
//! { "detail": { "code": "consent_required", "scope": [...] } }
//! ```
//!
//! Detection is broad: any 403 whose body carries a
//! `required_scopes` or `scope` array (top level or under `detail`) counts as
//! a consent escalation, even without the code marker. An unrelated 403 that
//! happens to use one of those field names as an array will be misread.

use serde_json::{Map, Value};

/// Code marker the server uses for missing consent
pub const CONSENT_REQUIRED_CODE: &str = "consent_required";

const DEFAULT_CONSENT_MESSAGE: &str = "Consent required";

/// Consent escalation extracted from a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentSignal {
    pub message: String,
    pub required_scopes: Vec<String>,
}

/// Inspect a 403 body. `None` means the body is not consent related and the
/// response should go back to the caller as-is.
pub fn detect_consent_required(body: &str) -> Option<ConsentSignal> {
    let root = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(root)) => root,
        _ => return None,
    };
    let detail = root.get("detail").and_then(Value::as_object);

    let code = string_field(&root, "code")
        .or_else(|| detail.and_then(|d| string_field(d, "error")))
        .or_else(|| detail.and_then(|d| string_field(d, "code")));

    let scopes = scope_array(&root).or_else(|| detail.and_then(scope_array));

    if code != Some(CONSENT_REQUIRED_CODE) && scopes.is_none() {
        return None;
    }

    let required_scopes = scopes
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let message = string_field(&root, "message")
        .or_else(|| detail.and_then(|d| string_field(d, "message")))
        .unwrap_or(DEFAULT_CONSENT_MESSAGE)
        .to_string();

    Some(ConsentSignal {
        message,
        required_scopes,
    })
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn scope_array(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    ["required_scopes", "scope"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
}
