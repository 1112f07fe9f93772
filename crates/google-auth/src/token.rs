//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (consent callback)
//! 2. Token refresh (pre-flight, when the held access token has expired)
//!
//! Both operations POST a form to `OAuthClient::token_endpoint` with
//! different grant types and authenticate with the client secret.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::OAuthClient;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Google omits
/// `refresh_token` on refresh responses and on repeat consents without
/// `prompt=consent`.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    /// Space-separated granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Error payload of the token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens.
///
/// The code arrives on the redirect URI after the account owner consents.
/// It is single-use and short-lived; a replayed or stale code comes back as
/// a 400 `invalid_grant`.
pub async fn exchange_code(
    http: &reqwest::Client,
    oauth: &OAuthClient,
    code: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&oauth.token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.expose().as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let (_, message) = read_failure(response).await;
        return Err(Error::TokenEndpoint {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("token exchange: {e}")))
}

/// Mint a new access token from a refresh token.
///
/// A revoked or expired grant (`invalid_grant`, 401, 403) maps to
/// `InvalidCredentials`; the account owner has to consent again.
pub async fn refresh_token(
    http: &reqwest::Client,
    oauth: &OAuthClient,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&oauth.token_endpoint)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let (code, message) = read_failure(response).await;

        if status.as_u16() == 401
            || status.as_u16() == 403
            || code.as_deref() == Some("invalid_grant")
        {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {message}"
            )));
        }

        return Err(Error::TokenEndpoint {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("token refresh: {e}")))
}

/// Read a failed token endpoint response into `(error code, message)`.
///
/// Falls back to the raw body when it is not an RFC 6749 error payload.
async fn read_failure(response: reqwest::Response) -> (Option<String>, String) {
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));

    match serde_json::from_str::<TokenErrorBody>(&body) {
        Ok(parsed) => {
            let message = match parsed.error_description {
                Some(description) => format!("{}: {description}", parsed.error),
                None => parsed.error.clone(),
            };
            (Some(parsed.error), message)
        }
        Err(_) => (None, body),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;
    use axum::routing::post;

    use super::*;
    use crate::testing::{oauth_client, serve};

    type Captured = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Token endpoint that records each form it receives and answers with
    /// the given status and JSON body.
    async fn token_endpoint(status: StatusCode, body: &'static str) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let sink = captured.clone();
        let app = axum::Router::new().route(
            "/token",
            post(
                move |axum::Form(form): axum::Form<HashMap<String, String>>| {
                    sink.lock().unwrap().push(form);
                    async move {
                        (
                            status,
                            [(axum::http::header::CONTENT_TYPE, "application/json")],
                            body,
                        )
                    }
                },
            ),
        );
        (serve(app).await, captured)
    }

    #[test]
    fn token_response_deserializes_full_grant() {
        let json = r#"{
            "access_token":"ya29.abc",
            "refresh_token":"1//rt-def",
            "expires_in":3599,
            "scope":"https://www.googleapis.com/auth/youtube.force-ssl",
            "token_type":"Bearer"
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.abc");
        assert_eq!(token.refresh_token.as_deref(), Some("1//rt-def"));
        assert_eq!(token.expires_in, 3599);
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn token_response_tolerates_missing_refresh_token() {
        let json = r#"{"access_token":"ya29.abc","expires_in":3599}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(token.refresh_token.is_none());
        assert!(token.scope.is_none());
    }

    #[test]
    fn token_response_debug_redacts_tokens() {
        let token = TokenResponse {
            access_token: "ya29.secret".into(),
            refresh_token: Some("1//secret".into()),
            expires_in: 3599,
            scope: None,
            token_type: None,
        };
        let debug = format!("{token:?}");
        assert!(!debug.contains("ya29.secret"));
        assert!(!debug.contains("1//secret"));
        assert!(debug.contains("3599"));
    }

    #[tokio::test]
    async fn exchange_posts_authorization_code_grant() {
        let (base, captured) = token_endpoint(
            StatusCode::OK,
            r#"{"access_token":"ya29.new","refresh_token":"1//rt","expires_in":3599}"#,
        )
        .await;
        let oauth = oauth_client(&base);

        let token = exchange_code(&reqwest::Client::new(), &oauth, "4/0-code")
            .await
            .unwrap();
        assert_eq!(token.access_token, "ya29.new");

        let forms = captured.lock().unwrap();
        assert_eq!(forms.len(), 1);
        let form = &forms[0];
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "4/0-code");
        assert_eq!(form["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(form["client_secret"], "GOCSPX-test-secret");
        assert_eq!(form["redirect_uri"], "http://localhost:3000/oauth2callback");
    }

    #[tokio::test]
    async fn exchange_reports_upstream_status_and_message() {
        let (base, _) = token_endpoint(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
        )
        .await;

        let err = exchange_code(&reqwest::Client::new(), &oauth_client(&base), "used")
            .await
            .unwrap_err();
        match err {
            Error::TokenEndpoint { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid_grant: Bad Request");
            }
            other => panic!("expected TokenEndpoint, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exchange_against_dead_endpoint_is_http_error() {
        let oauth = oauth_client("http://127.0.0.1:1");
        let err = exchange_code(&reqwest::Client::new(), &oauth, "code")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn exchange_rejects_undecodable_success_body() {
        let (base, _) = token_endpoint(StatusCode::OK, r#"{"unexpected":true}"#).await;
        let err = exchange_code(&reqwest::Client::new(), &oauth_client(&base), "code")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_grant() {
        let (base, captured) = token_endpoint(
            StatusCode::OK,
            r#"{"access_token":"ya29.refreshed","expires_in":3599}"#,
        )
        .await;

        let token = refresh_token(&reqwest::Client::new(), &oauth_client(&base), "1//rt")
            .await
            .unwrap();
        assert_eq!(token.access_token, "ya29.refreshed");
        assert!(token.refresh_token.is_none());

        let forms = captured.lock().unwrap();
        assert_eq!(forms[0]["grant_type"], "refresh_token");
        assert_eq!(forms[0]["refresh_token"], "1//rt");
        assert!(!forms[0].contains_key("redirect_uri"));
    }

    #[tokio::test]
    async fn refresh_invalid_grant_is_invalid_credentials() {
        let (base, _) = token_endpoint(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        )
        .await;

        let err = refresh_token(&reqwest::Client::new(), &oauth_client(&base), "1//revoked")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn refresh_server_error_keeps_status() {
        let (base, _) = token_endpoint(StatusCode::SERVICE_UNAVAILABLE, "backend down").await;

        let err = refresh_token(&reqwest::Client::new(), &oauth_client(&base), "1//rt")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("backend down"));
    }
}
