//! The structured error carried through handlers until it is written as a response

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::UNKNOWN_ERROR_TYPE;
use crate::details::{EncodeError, ProblemDetails};
use crate::finite;

/// Boxed error used as the cause of a problem.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An error with the fields needed to produce an RFC 7807 body.
///
/// Unset fields (`status` of `None`, empty `type_url` or `detail`) are filled in
/// when the error is turned into [`ProblemDetails`], never at construction time.
#[derive(Debug, Default)]
#[must_use]
pub struct ProblemError {
    /// The underlying error. Its message becomes the detail when `detail` is empty.
    pub cause: Option<BoxError>,
    /// HTTP status. `None` means 500 Internal Server Error.
    pub status: Option<StatusCode>,
    /// URI or short token classifying the error kind. Serialized as `type`.
    pub type_url: String,
    /// Human-readable explanation of this occurrence.
    pub detail: String,
    pub(crate) extensions: BTreeMap<String, Value>,
    /// Keys whose latest value could not be represented as JSON, with the reason.
    pub(crate) rejected: BTreeMap<String, String>,
}

impl ProblemError {
    /// Create a problem with the given status and type.
    pub fn new(status: StatusCode, type_url: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            type_url: type_url.into(),
            ..Self::default()
        }
    }

    /// Wrap an error that has no problem representation of its own.
    ///
    /// The result is a 500 `unknown-error` whose detail is derived from `cause`.
    pub fn unknown(cause: impl Into<BoxError>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR_TYPE).with_cause(cause)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Add an extension member to the body.
    ///
    /// Extension members are merged last, so a key such as `status` replaces the
    /// standard member in the body. A value JSON cannot represent (a map with
    /// non-string keys, NaN or an infinity) makes encoding fail later with
    /// [`EncodeError::Extension`] until the key is set again to a valid value.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert_extension(key, value);
        self
    }

    /// In-place form of [`ProblemError::with_extension`].
    pub fn insert_extension(&mut self, key: impl Into<String>, value: impl Serialize) {
        let key = key.into();
        let converted = finite::check(&value)
            .map_err(|e| e.to_string())
            .and_then(|()| serde_json::to_value(value).map_err(|e| e.to_string()));

        match converted {
            Ok(value) => {
                self.rejected.remove(&key);
                self.extensions.insert(key, value);
            }
            Err(message) => {
                self.extensions.remove(&key);
                self.rejected.insert(key, message);
            }
        }
    }

    /// Extension members added so far.
    #[must_use]
    pub fn extensions(&self) -> &BTreeMap<String, Value> {
        &self.extensions
    }

    /// Status that will be written, after defaulting.
    #[must_use]
    pub fn effective_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Fill unset fields with their defaults, in place.
    ///
    /// Calling this is optional: [`ProblemError::details`] applies the same rules
    /// to its snapshot without touching `self`. Applying it twice is a no-op.
    pub fn apply_defaults(&mut self) {
        if self.status.is_none() {
            self.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if self.type_url.is_empty() {
            self.type_url = UNKNOWN_ERROR_TYPE.to_owned();
        }
        if self.detail.is_empty()
            && let Some(cause) = &self.cause
        {
            self.detail = cause.to_string();
        }
    }

    /// Derive the fully populated body for this error.
    ///
    /// # Errors
    /// Returns [`EncodeError::Extension`] if an extension value was not
    /// representable as JSON.
    pub fn details(&self) -> Result<ProblemDetails, EncodeError> {
        ProblemDetails::derive(self)
    }

    /// Encode this error as a JSON body.
    ///
    /// # Errors
    /// Returns [`EncodeError`] if the body cannot be produced.
    pub fn to_json(&self) -> Result<Vec<u8>, EncodeError> {
        self.details()?.to_vec()
    }
}

impl fmt::Display for ProblemError {
    /// `<status reason> <type>: <detail>: <cause>`; the cause segment is left out
    /// when there is no cause.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = self
            .status
            .and_then(|status| status.canonical_reason())
            .unwrap_or_default();
        write!(f, "{reason} {}: {}", self.type_url, self.detail)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl StdError for ProblemError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl Serialize for ProblemError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.details()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    fn jwt_problem() -> ProblemError {
        ProblemError::new(
            StatusCode::UNAUTHORIZED,
            "https://example.net/errors/invalid-jwt",
        )
        .with_detail("The JWT token provided is not valid")
        .with_cause(io::Error::other("JWT token exp claim is in the past"))
    }

    #[test]
    fn problem_builder_pattern() {
        let p = jwt_problem().with_extension("traceId", "1234567890");

        assert_eq!(p.status, Some(StatusCode::UNAUTHORIZED));
        assert_eq!(p.type_url, "https://example.net/errors/invalid-jwt");
        assert_eq!(p.detail, "The JWT token provided is not valid");
        assert!(p.cause.is_some());
        assert_eq!(p.extensions().get("traceId"), Some(&Value::from("1234567890")));
    }

    #[test]
    fn display_lists_reason_type_detail_and_cause() {
        assert_eq!(
            jwt_problem().to_string(),
            "Unauthorized https://example.net/errors/invalid-jwt: \
             The JWT token provided is not valid: JWT token exp claim is in the past"
        );
    }

    #[test]
    fn display_without_cause_omits_cause_segment() {
        let p = ProblemError::new(StatusCode::NOT_FOUND, "missing").with_detail("no such user");
        assert_eq!(p.to_string(), "Not Found missing: no such user");
    }

    #[test]
    fn display_with_unset_status_has_empty_reason() {
        let p = ProblemError::default().with_type("t").with_detail("d");
        assert_eq!(p.to_string(), " t: d");
    }

    #[test]
    fn source_is_the_cause() {
        let p = jwt_problem();
        let source = p.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("JWT token exp claim is in the past"));
        assert!(ProblemError::default().source().is_none());
    }

    #[test]
    fn unknown_wraps_cause_as_internal_error() {
        let p = ProblemError::unknown("boom");
        assert_eq!(p.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(p.type_url, UNKNOWN_ERROR_TYPE);
        assert!(p.detail.is_empty());
        assert_eq!(p.cause.as_ref().map(ToString::to_string).as_deref(), Some("boom"));
    }

    #[test]
    fn apply_defaults_fills_unset_fields() {
        let mut p = ProblemError::default().with_cause("database unreachable");
        p.apply_defaults();

        assert_eq!(p.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(p.type_url, UNKNOWN_ERROR_TYPE);
        assert_eq!(p.detail, "database unreachable");
    }

    #[test]
    fn apply_defaults_keeps_explicit_fields() {
        let mut p = jwt_problem();
        p.apply_defaults();

        assert_eq!(p.status, Some(StatusCode::UNAUTHORIZED));
        assert_eq!(p.type_url, "https://example.net/errors/invalid-jwt");
        assert_eq!(p.detail, "The JWT token provided is not valid");
    }

    #[test]
    fn apply_defaults_without_cause_leaves_detail_empty() {
        let mut p = ProblemError::default();
        p.apply_defaults();
        assert!(p.detail.is_empty());
    }

    #[test]
    fn unrepresentable_extension_is_kept_out_of_the_map() {
        let mut bad = HashMap::new();
        bad.insert((1_u8, 2_u8), "tuple keys are not JSON object keys");

        let p = jwt_problem()
            .with_extension("coords", bad)
            .with_extension("traceId", "abc");

        assert!(!p.extensions().contains_key("coords"));
        assert!(p.extensions().contains_key("traceId"));
        assert!(p.rejected.contains_key("coords"));
    }

    #[test]
    fn non_finite_extension_is_rejected() {
        let p = jwt_problem()
            .with_extension("ratio", f64::NAN)
            .with_extension("limit", vec![1.0, f64::INFINITY]);

        assert!(p.extensions().is_empty());
        assert_eq!(
            p.rejected.get("ratio").map(String::as_str),
            Some("unsupported value: NaN")
        );
        assert!(p.rejected.contains_key("limit"));
        assert!(p.to_json().is_err());
    }

    #[test]
    fn valid_value_clears_earlier_rejection() {
        let mut p = jwt_problem().with_extension("ratio", f64::NAN);
        assert!(p.to_json().is_err());

        p.insert_extension("ratio", 0.5);

        assert!(p.rejected.is_empty());
        assert_eq!(p.extensions().get("ratio"), Some(&Value::from(0.5)));
        assert!(p.to_json().is_ok());
    }

    #[test]
    fn invalid_value_replaces_earlier_valid_one() {
        let mut p = jwt_problem().with_extension("ratio", 0.5);
        p.insert_extension("ratio", f64::INFINITY);

        assert!(!p.extensions().contains_key("ratio"));
        assert!(p.to_json().is_err());
    }

    #[test]
    fn serialize_goes_through_defaulted_details() {
        let p = ProblemError::default().with_cause("boom");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(
            json,
            r#"{"detail":"boom","status":500,"type":"unknown-error"}"#
        );
        // serialization did not mutate the error
        assert!(p.status.is_none());
        assert!(p.type_url.is_empty());
        assert!(p.detail.is_empty());
    }

    #[test]
    fn serialize_reports_rejected_extension() {
        let mut bad = HashMap::new();
        bad.insert((1_u8, 2_u8), 3_u8);
        let p = jwt_problem().with_extension("coords", bad);

        let err = serde_json::to_string(&p).unwrap_err();
        assert!(err.to_string().contains("coords"));
    }
}
