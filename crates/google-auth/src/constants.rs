//! Google OAuth constants
//!
//! Public endpoint and scope identifiers. The client id, client secret and
//! redirect URI are deployment configuration and live in `OAuthClient`.

/// Consent screen endpoint for the three-legged flow
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Manage videos and comments on the delegated channel (HTTPS only).
pub const YOUTUBE_FORCE_SSL_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

/// Basic profile of the consenting account.
pub const USERINFO_PROFILE_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.profile";

/// Scopes requested by the consent redirect.
pub const CONSENT_SCOPES: &[&str] = &[YOUTUBE_FORCE_SSL_SCOPE, USERINFO_PROFILE_SCOPE];

/// Token type discriminator; Google only issues bearer tokens.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Assumed lifetime of an access token supplied through configuration.
pub const SEED_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_SKEW_MILLIS: u64 = 60_000;
