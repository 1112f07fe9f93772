//! The process-wide delegated credential
//!
//! One `CredentialStore` exists per process and holds one `Credential`.
//! Reads hand out clones, so nothing outside the store can mutate the held
//! value. Writes replace the whole value under a short lock with
//! last-writer-wins semantics: there is no versioning, and two concurrent
//! refreshes both succeed with the later one kept.
//!
//! reqwest does not refresh OAuth tokens on its own, so `authorized()` checks
//! expiry before every upstream call and exchanges the refresh token when the
//! access token is no longer usable.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::OAuthClient;
use crate::constants::{
    REFRESH_SKEW_MILLIS, SEED_TOKEN_LIFETIME_SECS, TOKEN_TYPE_BEARER, YOUTUBE_FORCE_SSL_SCOPE,
};
use crate::error::{Error, Result};
use crate::token::{self, TokenResponse};

/// OAuth token material for the delegated account.
///
/// `expiry` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed from `TokenResponse.expires_in` at the time the response arrived.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: BTreeSet<String>,
    pub token_type: String,
    pub expiry: u64,
}

impl Credential {
    /// Credential built from configured tokens at process start.
    ///
    /// A supplied access token is trusted for `SEED_TOKEN_LIFETIME_SECS`; an
    /// empty one gets expiry 0 so the first use refreshes it.
    pub fn seeded(access_token: String, refresh_token: String, now_millis: u64) -> Self {
        let expiry = if access_token.is_empty() {
            0
        } else {
            now_millis + SEED_TOKEN_LIFETIME_SECS * 1000
        };
        Self {
            access_token,
            refresh_token,
            scope: BTreeSet::from([YOUTUBE_FORCE_SSL_SCOPE.to_string()]),
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expiry,
        }
    }

    /// Credential from a token endpoint response received at `now_millis`.
    ///
    /// A missing refresh token becomes an empty string; see
    /// `carry_refresh_from` for keeping the previous one.
    pub fn from_token_response(response: TokenResponse, now_millis: u64) -> Self {
        let scope = response
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            scope,
            token_type: response
                .token_type
                .unwrap_or_else(|| TOKEN_TYPE_BEARER.to_string()),
            expiry: now_millis.saturating_add(response.expires_in.saturating_mul(1000)),
        }
    }

    /// Fill a missing refresh token and scope from the previously held value.
    ///
    /// Google leaves `refresh_token` out of refresh responses, and out of
    /// exchange responses when the grant already exists.
    pub fn carry_refresh_from(mut self, previous: &Credential) -> Self {
        if self.refresh_token.is_empty() {
            self.refresh_token = previous.refresh_token.clone();
        }
        if self.scope.is_empty() {
            self.scope = previous.scope.clone();
        }
        self
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// True when the access token must not be trusted at `now_millis`.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.access_token.is_empty() || now_millis >= self.expiry
    }

    /// True when the access token is expired or about to be.
    pub fn needs_refresh_at(&self, now_millis: u64) -> bool {
        self.is_expired_at(now_millis.saturating_add(REFRESH_SKEW_MILLIS))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Holder of the single delegated credential and the OAuth exchanges.
pub struct CredentialStore {
    oauth: OAuthClient,
    http: reqwest::Client,
    state: RwLock<Credential>,
}

impl CredentialStore {
    pub fn new(oauth: OAuthClient, http: reqwest::Client, seed: Credential) -> Self {
        info!(
            has_refresh_token = seed.has_refresh_token(),
            expired = seed.is_expired_at(now_millis()),
            "credential store seeded"
        );
        Self {
            oauth,
            http,
            state: RwLock::new(seed),
        }
    }

    pub fn oauth_client(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Consent URL for this store's OAuth client.
    pub fn build_authorization_url<S: AsRef<str>>(
        &self,
        scopes: &[S],
        offline: bool,
        force_consent: bool,
    ) -> Result<Url> {
        self.oauth
            .build_authorization_url(scopes, offline, force_consent)
    }

    /// Exchange an authorization code for a fresh Credential.
    ///
    /// Does not touch the held credential; the caller decides whether to
    /// `apply()` the result. The returned refresh token is empty when Google
    /// did not issue one.
    pub async fn exchange_code_for_tokens(&self, code: &str) -> Result<Credential> {
        let response = token::exchange_code(&self.http, &self.oauth, code).await?;
        let credential = Credential::from_token_response(response, now_millis());
        debug!(
            has_refresh_token = credential.has_refresh_token(),
            expiry = credential.expiry,
            "authorization code exchanged"
        );
        Ok(credential)
    }

    /// Snapshot of the held credential.
    pub async fn current(&self) -> Credential {
        self.state.read().await.clone()
    }

    /// Replace the held credential.
    pub async fn apply(&self, credential: Credential) {
        let mut state = self.state.write().await;
        *state = credential;
        debug!(expiry = state.expiry, "credential applied");
    }

    /// Credential whose access token is usable right now.
    ///
    /// Returns the held credential when it has not expired. Otherwise
    /// exchanges the refresh token, applies the result and returns it. The
    /// refresh is attempted once; failures propagate to the caller.
    pub async fn authorized(&self) -> Result<Credential> {
        let current = self.current().await;
        if !current.needs_refresh_at(now_millis()) {
            return Ok(current);
        }
        if !current.has_refresh_token() {
            return Err(Error::MissingRefreshToken);
        }

        debug!("access token expired or expiring, refreshing");
        match token::refresh_token(&self.http, &self.oauth, &current.refresh_token).await {
            Ok(response) => {
                let refreshed =
                    Credential::from_token_response(response, now_millis()).carry_refresh_from(&current);
                self.apply(refreshed.clone()).await;
                metrics::counter!("gateway_token_refreshes_total", "outcome" => "success")
                    .increment(1);
                info!(expiry = refreshed.expiry, "access token refreshed");
                Ok(refreshed)
            }
            Err(e) => {
                metrics::counter!("gateway_token_refreshes_total", "outcome" => "failure")
                    .increment(1);
                warn!(error = %e, "access token refresh failed");
                Err(e)
            }
        }
    }
}
