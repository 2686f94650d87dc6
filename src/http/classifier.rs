//! Maps a completed HTTP response's status code to either success or a
//! typed [`RegistryClientError`], extracting the `detail` field from a
//! `application/problem+json` error envelope when the registry supplies
//! one.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{RegistryClientError, RegistryResult};

#[derive(Debug, Deserialize)]
struct ProblemDetails {
    detail: Option<String>,
}

/// Extracts the `detail` string from a `problem+json` body, falling back to
/// the raw body text (truncated) when it isn't one.
fn describe_body(body: &str) -> String {
    match serde_json::from_str::<ProblemDetails>(body) {
        Ok(ProblemDetails { detail: Some(detail) }) => detail,
        _ if body.is_empty() => "<empty body>".to_string(),
        _ => body.chars().take(500).collect(),
    }
}

/// Classifies a response's status code against the set of statuses an
/// operation considers successful.
///
/// # Errors
///
/// - [`RegistryClientError::Unauthorized`] for `401`.
/// - [`RegistryClientError::Forbidden`] for `403`.
/// - [`RegistryClientError::AuthenticationMethodNotSupported`] for `501`.
/// - [`RegistryClientError::ClientError`] for other `4xx`.
/// - [`RegistryClientError::ServerError`] for `5xx`.
/// - [`RegistryClientError::InvalidResponseStatus`] for a status outside
///   both `expected` and the error ranges above (e.g. an unexpected `2xx`
///   or `3xx`).
pub fn classify_response(
    status: StatusCode,
    body: &str,
    registry: &str,
    expected: &[StatusCode],
) -> RegistryResult<()> {
    if expected.contains(&status) {
        return Ok(());
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(RegistryClientError::Unauthorized { registry: registry.to_string() }),
        StatusCode::FORBIDDEN => Err(RegistryClientError::Forbidden { registry: registry.to_string() }),
        StatusCode::NOT_IMPLEMENTED => {
            Err(RegistryClientError::AuthenticationMethodNotSupported { registry: registry.to_string() })
        }
        s if s.is_client_error() => Err(RegistryClientError::ClientError {
            registry: registry.to_string(),
            code: s.as_u16(),
            body: describe_body(body),
        }),
        s if s.is_server_error() => Err(RegistryClientError::ServerError {
            registry: registry.to_string(),
            code: s.as_u16(),
            body: describe_body(body),
        }),
        s => Err(RegistryClientError::InvalidResponseStatus {
            registry: registry.to_string(),
            expected: expected.iter().map(StatusCode::as_str).collect::<Vec<_>>().join(" or "),
            actual: s.as_u16(),
        }),
    }
}

#[allow(clippy::unwrap_used)]
#[allow(clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_status_is_ok() {
        assert!(classify_response(StatusCode::OK, "", "https://example.com", &[StatusCode::OK]).is_ok());
    }

    #[test]
    fn unauthorized_maps_to_variant() {
        let err =
            classify_response(StatusCode::UNAUTHORIZED, "", "https://example.com", &[StatusCode::OK]).unwrap_err();
        assert!(matches!(err, RegistryClientError::Unauthorized { .. }));
    }

    #[test]
    fn not_implemented_maps_to_auth_method_not_supported() {
        let err =
            classify_response(StatusCode::NOT_IMPLEMENTED, "", "https://example.com", &[StatusCode::OK])
                .unwrap_err();
        assert!(matches!(err, RegistryClientError::AuthenticationMethodNotSupported { .. }));
    }

    #[test]
    fn client_error_extracts_problem_detail() {
        let body = r#"{"detail": "package not found"}"#;
        let err =
            classify_response(StatusCode::NOT_FOUND, body, "https://example.com", &[StatusCode::OK]).unwrap_err();
        match err {
            RegistryClientError::ClientError { body, code, .. } => {
                assert_eq!(body, "package not found");
                assert_eq!(code, 404);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn server_error_maps_to_variant() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "", "https://example.com", &[StatusCode::OK])
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::ServerError { .. }));
    }

    #[test]
    fn unexpected_success_status_is_invalid_response_status() {
        let err = classify_response(StatusCode::CREATED, "", "https://example.com", &[StatusCode::OK])
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::InvalidResponseStatus { .. }));
    }
}
