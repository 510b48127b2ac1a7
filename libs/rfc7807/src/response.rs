//! Writing errors as problem-details HTTP responses
//!
//! All error translation happens here, once per request: handlers return
//! [`ProblemError`] (or anything implementing [`IntoProblem`]) and the boundary
//! calls [`write_problem_response`] or [`ProblemWriter::respond`].

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Request, StatusCode};

use crate::UNKNOWN_ERROR_TYPE;
use crate::config::ProblemConfig;
use crate::details::encoding_failure_body;
use crate::problem::{BoxError, ProblemError};

/// Conversion of an error into a [`ProblemError`].
///
/// Error types that know their own status and type implement this to take the
/// structured path; everything else is wrapped as a 500 `unknown-error`.
pub trait IntoProblem {
    fn into_problem(self) -> ProblemError;
}

impl IntoProblem for ProblemError {
    fn into_problem(self) -> ProblemError {
        self
    }
}

impl IntoProblem for BoxError {
    fn into_problem(self) -> ProblemError {
        match self.downcast::<ProblemError>() {
            Ok(problem) => *problem,
            Err(other) => wrap_unknown(other),
        }
    }
}

impl IntoProblem for anyhow::Error {
    fn into_problem(self) -> ProblemError {
        match self.downcast::<ProblemError>() {
            Ok(problem) => problem,
            Err(other) => wrap_unknown(other.into()),
        }
    }
}

fn wrap_unknown(cause: BoxError) -> ProblemError {
    tracing::debug!(error = %cause, "Wrapping unrecognized error as {UNKNOWN_ERROR_TYPE}");
    ProblemError::unknown(cause)
}

/// Writes problems to responses according to a [`ProblemConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProblemWriter {
    config: ProblemConfig,
}

impl ProblemWriter {
    #[must_use]
    pub fn new(config: ProblemConfig) -> Self {
        Self { config }
    }

    /// Write `err` into `response`: status once, body once.
    ///
    /// The response must not be written to afterwards.
    pub fn write<E, B>(&self, err: E, response: &mut Response, request: &Request<B>)
    where
        E: IntoProblem,
    {
        let problem = self.enrich(err.into_problem(), request.headers());
        self.render(&problem, response);
    }

    /// Build a fresh response for `err`, using `headers` from the request.
    pub fn respond<E>(&self, err: E, headers: &HeaderMap) -> Response
    where
        E: IntoProblem,
    {
        let mut response = Response::new(Body::empty());
        let problem = self.enrich(err.into_problem(), headers);
        self.render(&problem, &mut response);
        response
    }

    /// Copy the configured trace header into the problem unless it already
    /// carries that member.
    fn enrich(&self, mut problem: ProblemError, headers: &HeaderMap) -> ProblemError {
        let Some(header) = self.config.trace_id_header.as_deref() else {
            return problem;
        };
        if problem.extensions().contains_key(&self.config.trace_id_field) {
            return problem;
        }
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            problem.insert_extension(self.config.trace_id_field.clone(), value);
        }
        problem
    }

    fn render(&self, problem: &ProblemError, response: &mut Response) {
        let encoded = problem.details().and_then(|details| {
            let body = details.to_vec()?;
            Ok((details.status(), body))
        });

        let (status, body) = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    problem = %problem,
                    "Failed to encode problem details, writing fallback body"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    encoding_failure_body(&err),
                )
            }
        };

        *response.status_mut() = status;
        if let Some(content_type) = self.config.content_type.as_deref() {
            match HeaderValue::from_str(content_type) {
                Ok(value) => {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                Err(_) => {
                    tracing::warn!(
                        content_type,
                        "Configured content type is not a valid header value"
                    );
                }
            }
        }
        *response.body_mut() = Body::from(body);
    }
}

/// Write `err` as a problem-details response with the default configuration.
///
/// Errors that are not problems are wrapped as 500 `unknown-error` with the
/// error as cause. `Content-Type` is left to the caller.
pub fn write_problem_response<E, B>(err: E, response: &mut Response, request: &Request<B>)
where
    E: IntoProblem,
{
    ProblemWriter::default().write(err, response, request);
}

/// Axum integration: make `ProblemError` directly usable as a response
impl IntoResponse for ProblemError {
    fn into_response(self) -> Response {
        ProblemWriter::new(ProblemConfig::problem_json()).respond(self, &HeaderMap::new())
    }
}
