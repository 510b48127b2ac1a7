//! RFC 7807 Problem Details for HTTP services
//!
//! This crate provides a small structured-error type and the glue to turn any
//! error into a problem-details response. It includes:
//! - The error wrapper (`ProblemError`)
//! - The serialized snapshot (`ProblemDetails`)
//! - Response writing (`write_problem_response`, `ProblemWriter`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod details;
mod finite;
pub mod problem;
pub mod response;

// Re-export commonly used types
pub use config::ProblemConfig;
pub use details::{EncodeError, ProblemDetails, encoding_failure_body};
pub use problem::{BoxError, ProblemError};
pub use response::{IntoProblem, ProblemWriter, write_problem_response};

/// Content type for Problem Details as per RFC 7807.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Problem type used when an error carries no type of its own.
pub const UNKNOWN_ERROR_TYPE: &str = "unknown-error";

/// Problem type of the fallback body written when encoding fails.
pub const ENCODING_ERROR_TYPE: &str = "rfc7807-encoding-error";
