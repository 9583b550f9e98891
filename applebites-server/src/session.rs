//! Consumer session context.
//!
//! The session identity is extracted from request headers in exactly one
//! place and passed explicitly to the code that needs it, replacing the
//! ad-hoc per-page storage reads of the original surfaces.

use axum::http::HeaderMap;

/// Header carrying the consumer session ID.
pub const SESSION_HEADER: &str = "x-session-id";
/// Header carrying the visitor's email, when the wizard already knows it.
pub const VISITOR_EMAIL_HEADER: &str = "x-visitor-email";

/// Typed session identity for one request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Session ID, minted fresh when the client sends none
    pub session_id: String,
    /// Visitor email, when known
    pub visitor_email: Option<String>,
    /// Whether the session ID was minted server-side on this request
    pub minted: bool,
}

impl SessionContext {
    /// Build the session context from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let session_id = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let visitor_email = headers
            .get(VISITOR_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        match session_id {
            Some(id) => Self {
                session_id: id,
                visitor_email,
                minted: false,
            },
            None => Self {
                session_id: uuid::Uuid::new_v4().to_string(),
                visitor_email,
                minted: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_from_headers_with_session() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("sess-42"));
        headers.insert(
            VISITOR_EMAIL_HEADER,
            HeaderValue::from_static("owner@example.com"),
        );

        let ctx = SessionContext::from_headers(&headers);
        assert_eq!(ctx.session_id, "sess-42");
        assert_eq!(ctx.visitor_email.as_deref(), Some("owner@example.com"));
        assert!(!ctx.minted);
    }

    #[test]
    fn test_missing_session_mints_fresh_id() {
        let ctx = SessionContext::from_headers(&HeaderMap::new());
        assert!(ctx.minted);
        assert!(!ctx.session_id.is_empty());
        assert!(ctx.visitor_email.is_none());

        // Fresh mint per request
        let other = SessionContext::from_headers(&HeaderMap::new());
        assert_ne!(ctx.session_id, other.session_id);
    }

    #[test]
    fn test_blank_header_treated_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("   "));

        let ctx = SessionContext::from_headers(&headers);
        assert!(ctx.minted);
    }
}
