//! OAuth client identity and the consent URL
//!
//! `OAuthClient` is the deployment's registered Google OAuth application:
//! client id, client secret, redirect target and the two endpoints. The
//! consent URL is a pure function of it.

use common::Secret;
use reqwest::Url;

use crate::constants::{AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// Registered OAuth application used for every exchange.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
}

impl OAuthClient {
    /// Client against Google's production endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
        }
    }

    /// Point the client at different authorize/token endpoints.
    pub fn with_endpoints(
        mut self,
        authorize_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        self.authorize_endpoint = authorize_endpoint.into();
        self.token_endpoint = token_endpoint.into();
        self
    }

    /// Build the consent URL for the three-legged flow.
    ///
    /// `offline` asks for a refresh token (`access_type=offline`);
    /// `force_consent` re-shows the consent screen (`prompt=consent`), which is
    /// what makes Google issue a refresh token again on a repeat grant.
    /// Scopes are space-joined in the order given. Only a malformed
    /// `authorize_endpoint` can fail, which config validation catches at boot.
    pub fn build_authorization_url<S: AsRef<str>>(
        &self,
        scopes: &[S],
        offline: bool,
        force_consent: bool,
    ) -> Result<Url> {
        let scope = scopes
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
        ];
        if offline {
            params.push(("access_type", "offline"));
        }
        if force_consent {
            params.push(("prompt", "consent"));
        }

        Url::parse_with_params(&self.authorize_endpoint, &params)
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", self.authorize_endpoint)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::constants::CONSENT_SCOPES;

    fn client() -> OAuthClient {
        OAuthClient::new(
            "client-123.apps.googleusercontent.com",
            String::from("GOCSPX-secret"),
            "http://localhost:3000/oauth2callback",
        )
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn consent_url_carries_identity_scopes_and_flags() {
        let url = client()
            .build_authorization_url(CONSENT_SCOPES, true, true)
            .unwrap();

        assert!(url.as_str().starts_with(AUTHORIZE_ENDPOINT));
        let q = query(&url);
        assert_eq!(q["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(q["redirect_uri"], "http://localhost:3000/oauth2callback");
        assert_eq!(q["response_type"], "code");
        assert_eq!(
            q["scope"],
            "https://www.googleapis.com/auth/youtube.force-ssl https://www.googleapis.com/auth/userinfo.profile"
        );
        assert_eq!(q["access_type"], "offline");
        assert_eq!(q["prompt"], "consent");
    }

    #[test]
    fn flags_are_omitted_when_not_requested() {
        let url = client()
            .build_authorization_url(&["scope-a"], false, false)
            .unwrap();
        let q = query(&url);
        assert!(!q.contains_key("access_type"));
        assert!(!q.contains_key("prompt"));
        assert_eq!(q["scope"], "scope-a");
    }

    #[test]
    fn consent_url_is_deterministic() {
        let a = client().build_authorization_url(CONSENT_SCOPES, true, true);
        let b = client().build_authorization_url(CONSENT_SCOPES, true, true);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn client_secret_never_appears_in_consent_url() {
        let url = client()
            .build_authorization_url(CONSENT_SCOPES, true, true)
            .unwrap();
        assert!(!url.as_str().contains("GOCSPX-secret"));
    }

    #[test]
    fn malformed_authorize_endpoint_is_rejected() {
        let client = client().with_endpoints("not a url", TOKEN_ENDPOINT);
        let err = client
            .build_authorization_url(CONSENT_SCOPES, true, true)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)), "got: {err:?}");
    }

    #[test]
    fn debug_redacts_client_secret() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("GOCSPX-secret"), "got: {debug}");
        assert!(debug.contains("client-123"));
    }
}
