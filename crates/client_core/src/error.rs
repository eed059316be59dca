//! Client-side error taxonomy.
//!
//! Failures are never retried here; they propagate to the caller, which owns
//! user-visible reporting (see [`crate::session::ErrorLog`]).

use model::error::ApiError;
use thiserror::Error;

use crate::auth::AuthError;

/// Non-2xx HTTP response. Carries enough of the response to report and to
/// branch on status, plus the decoded structured body when the server sent
/// one.
#[derive(Debug, Error)]
#[error("request to {url} failed: {status} {status_text}")]
pub struct FetchError {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// Raw response body text.
    pub body: String,
    /// The body decoded as the API's structured error payload, if it was one.
    pub api_error: Option<ApiError>,
}

impl FetchError {
    pub(crate) fn new(url: String, status: reqwest::StatusCode, body: String) -> Self {
        Self {
            url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("unknown status").to_string(),
            api_error: serde_json::from_str(&body).ok(),
            body,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Connectivity, timeout, or body-decode failure in the transport.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode cached payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Fetch(fetch) => Some(fetch.status),
            ClientError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::error::ErrorCode;

    #[test]
    fn fetch_error_decodes_structured_body() {
        let error = FetchError::new(
            "http://api.test/protocol/1".into(),
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "{\"code\":\"internal\",\"message\":\"boom\"}".into(),
        );
        assert_eq!(error.status, 500);
        assert_eq!(error.status_text, "Internal Server Error");
        assert_eq!(error.api_error, Some(ApiError::new(ErrorCode::Internal, "boom")));
        assert_eq!(ClientError::from(error).status(), Some(500));
    }

    #[test]
    fn fetch_error_keeps_unstructured_body_raw() {
        let error = FetchError::new(
            "http://api.test/run".into(),
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>gateway</html>".into(),
        );
        assert_eq!(error.api_error, None);
        assert_eq!(error.body, "<html>gateway</html>");
    }
}
