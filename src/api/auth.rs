use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::utils::error::AppError;

/// Check a `Authorization: Bearer <token>` header against an expected shared
/// secret. Comparison is constant-time.
pub fn require_bearer(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Authentication("malformed authorization header".to_string()))?;

    if token.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::Authentication("invalid bearer token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_accepts_matching_token() {
        let headers = headers_with("Bearer sweep-secret");
        assert!(require_bearer(&headers, "sweep-secret").is_ok());
    }

    #[test]
    fn test_rejects_wrong_token() {
        let headers = headers_with("Bearer wrong");
        assert!(require_bearer(&headers, "sweep-secret").is_err());
    }

    #[test]
    fn test_rejects_missing_header() {
        assert!(require_bearer(&HeaderMap::new(), "sweep-secret").is_err());
    }

    #[test]
    fn test_rejects_non_bearer_scheme() {
        let headers = headers_with("Basic sweep-secret");
        assert!(require_bearer(&headers, "sweep-secret").is_err());
    }
}
