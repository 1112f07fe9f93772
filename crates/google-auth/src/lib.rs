//! Google OAuth2 delegated credentials
//!
//! Holds the single delegated Credential for the process and runs the two
//! token endpoint exchanges against Google. The HTTP client (reqwest) has no
//! notion of OAuth, so expiry is checked before every use and an expired
//! access token is exchanged for a fresh one using the refresh token.
//!
//! Credential flow:
//! 1. Process seeds the store from configured tokens via `Credential::seeded()`
//! 2. Operator is redirected to `OAuthClient::build_authorization_url()`
//! 3. Callback calls `CredentialStore::exchange_code_for_tokens()`
//! 4. Result installed with `CredentialStore::apply()`
//! 5. Every upstream call site asks `CredentialStore::authorized()`, which
//!    refreshes through `token::refresh_token()` when the access token expired

pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use client::OAuthClient;
pub use constants::*;
pub use credentials::{Credential, CredentialStore, now_millis};
pub use error::{Error, Result};
pub use token::{TokenResponse, exchange_code, refresh_token};
