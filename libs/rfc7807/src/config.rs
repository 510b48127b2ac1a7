//! Configuration for problem response writing.

use serde::Deserialize;

use crate::APPLICATION_PROBLEM_JSON;

/// Configuration for [`crate::ProblemWriter`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemConfig {
    /// `Content-Type` written with the problem body.
    /// Default: none, the caller sets the header.
    pub content_type: Option<String>,

    /// Request header whose value is copied into the body, e.g. `x-request-id`.
    /// Default: none.
    pub trace_id_header: Option<String>,

    /// Extension member that receives the `trace_id_header` value.
    /// Default: `traceId`
    pub trace_id_field: String,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            content_type: None,
            trace_id_header: None,
            trace_id_field: "traceId".to_owned(),
        }
    }
}

impl ProblemConfig {
    /// Defaults plus `Content-Type: application/problem+json`.
    #[must_use]
    pub fn problem_json() -> Self {
        Self {
            content_type: Some(APPLICATION_PROBLEM_JSON.to_owned()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ProblemConfig::default();
        assert_eq!(cfg.content_type, None);
        assert_eq!(cfg.trace_id_header, None);
        assert_eq!(cfg.trace_id_field, "traceId");
    }

    #[test]
    fn test_problem_json_config() {
        let cfg = ProblemConfig::problem_json();
        assert_eq!(cfg.content_type.as_deref(), Some(APPLICATION_PROBLEM_JSON));
        assert_eq!(cfg.trace_id_field, "traceId");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: ProblemConfig =
            serde_json::from_str(r#"{"trace_id_header":"x-request-id"}"#).unwrap();
        assert_eq!(cfg.trace_id_header.as_deref(), Some("x-request-id"));
        assert_eq!(cfg.trace_id_field, "traceId");
        assert_eq!(cfg.content_type, None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let res = serde_json::from_str::<ProblemConfig>(r#"{"content_typ":"text/plain"}"#);
        assert!(res.is_err());
    }
}
