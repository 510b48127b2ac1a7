//! Problem Details body: the immutable, fully defaulted snapshot of a [`ProblemError`]

use std::collections::BTreeMap;

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::problem::ProblemError;
use crate::{ENCODING_ERROR_TYPE, UNKNOWN_ERROR_TYPE};

/// Members every problem body carries before extensions are merged in.
const STANDARD_MEMBERS: [&str; 3] = ["detail", "status", "type"];

/// Failure to turn a [`ProblemError`] into a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("json: unsupported value for extension field `{key}`: {message}")]
    Extension { key: String, message: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fully populated problem body.
///
/// Top-level members are kept in a `BTreeMap` and written in lexicographic key
/// order, independent of `serde_json` features such as `preserve_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemDetails {
    status: StatusCode,
    fields: BTreeMap<String, Value>,
}

impl ProblemDetails {
    /// Apply the defaulting rules to `problem` and merge its extensions.
    ///
    /// - status: 500 when unset
    /// - type: `unknown-error` when empty
    /// - detail: the cause's message when empty and a cause exists
    ///
    /// Extension members are merged last and replace standard members on
    /// collision. `status()` keeps the defaulted status field even then.
    ///
    /// # Errors
    /// Returns [`EncodeError::Extension`] for the first (by key) extension
    /// value that was rejected.
    pub fn derive(problem: &ProblemError) -> Result<Self, EncodeError> {
        if let Some((key, message)) = problem.rejected.iter().next() {
            return Err(EncodeError::Extension {
                key: key.clone(),
                message: message.clone(),
            });
        }

        let status = problem.effective_status();
        let type_url = if problem.type_url.is_empty() {
            UNKNOWN_ERROR_TYPE.to_owned()
        } else {
            problem.type_url.clone()
        };
        let detail = match (&problem.cause, problem.detail.is_empty()) {
            (Some(cause), true) => cause.to_string(),
            _ => problem.detail.clone(),
        };

        let mut fields = BTreeMap::new();
        fields.insert("status".to_owned(), Value::from(status.as_u16()));
        fields.insert("type".to_owned(), Value::String(type_url));
        fields.insert("detail".to_owned(), Value::String(detail));

        for (key, value) in &problem.extensions {
            if STANDARD_MEMBERS.contains(&key.as_str()) {
                tracing::warn!(
                    member = %key,
                    "Extension field overrides standard problem member"
                );
            }
            fields.insert(key.clone(), value.clone());
        }

        Ok(Self { status, fields })
    }

    /// Status for the response status line.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// All body members, extensions included.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.fields.get(member)
    }

    /// The `type` member, if it is a string.
    #[must_use]
    pub fn type_url(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    /// The `detail` member, if it is a string.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.get("detail").and_then(Value::as_str)
    }

    /// Encode the body as JSON bytes.
    ///
    /// # Errors
    /// Returns [`EncodeError::Json`] if `serde_json` fails to write the body.
    pub fn to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(&self.fields)?)
    }
}

impl Serialize for ProblemDetails {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.fields.serialize(serializer)
    }
}

/// Parses a problem body, e.g. on the client side of an API.
///
/// The status comes from the `status` member and falls back to 500 when the
/// member is missing, not an integer or not a valid HTTP status.
impl<'de> Deserialize<'de> for ProblemDetails {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let status = fields
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Ok(Self { status, fields })
    }
}

/// Body written when a problem cannot be encoded.
///
/// Built through `serde_json`, so the error message is always escaped properly.
/// Members are listed in key order so the output is sorted with or without
/// `preserve_order`.
#[must_use]
pub fn encoding_failure_body(err: &EncodeError) -> Vec<u8> {
    json!({
        "detail": err.to_string(),
        "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        "type": ENCODING_ERROR_TYPE,
    })
    .to_string()
    .into_bytes()
}
