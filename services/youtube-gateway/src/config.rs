//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The file is
//! optional; a deployment driven entirely by `.env` never needs one.
//! Tokens and the client secret are only ever held as `Secret`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use common::Secret;
use google_auth::{AUTHORIZE_ENDPOINT, Credential, OAuthClient, TOKEN_ENDPOINT};
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONFIG_FILE: &str = "youtube-gateway.toml";

/// Resolved gateway configuration.
#[derive(Debug)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub port: u16,
    pub youtube_api_base_url: String,
    /// Audit sink target. `None` disables the sink.
    pub database_url: Option<Secret<String>>,
}

/// On-disk shape of the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    oauth: OAuthSection,
    tokens: TokensSection,
    server: ServerSection,
    youtube: YouTubeSection,
    audit: AuditSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OAuthSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    authorize_endpoint: Option<String>,
    token_endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TokensSection {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct YouTubeSection {
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AuditSection {
    database_url: Option<String>,
}

impl Config {
    /// Load from the optional TOML file, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let contents = match path {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };
        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from file contents and an environment lookup.
    ///
    /// Blank environment values count as unset, the way an empty line in
    /// `.env` would.
    fn from_sources(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> common::Result<Self> {
        let file: FileConfig = match file {
            Some(contents) => toml::from_str(contents)?,
            None => FileConfig::default(),
        };
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let port = match env("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                common::Error::Config(format!("PORT must be a port number, got {raw:?}: {e}"))
            })?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };
        if port == 0 {
            return Err(common::Error::Config("PORT must be greater than 0".into()));
        }

        let config = Config {
            client_id: required("CLIENT_ID", env("CLIENT_ID").or(file.oauth.client_id))?,
            client_secret: Secret::new(required(
                "CLIENT_SECRET",
                env("CLIENT_SECRET").or(file.oauth.client_secret),
            )?),
            redirect_uri: required("REDIRECT_URI", env("REDIRECT_URI").or(file.oauth.redirect_uri))?,
            authorize_endpoint: env("GOOGLE_AUTH_ENDPOINT")
                .or(file.oauth.authorize_endpoint)
                .unwrap_or_else(|| AUTHORIZE_ENDPOINT.to_string()),
            token_endpoint: env("GOOGLE_TOKEN_ENDPOINT")
                .or(file.oauth.token_endpoint)
                .unwrap_or_else(|| TOKEN_ENDPOINT.to_string()),
            access_token: Secret::new(
                env("ACCESS_TOKEN")
                    .or(file.tokens.access_token)
                    .unwrap_or_default(),
            ),
            refresh_token: Secret::new(
                env("REFRESH_TOKEN")
                    .or(file.tokens.refresh_token)
                    .unwrap_or_default(),
            ),
            port,
            youtube_api_base_url: env("YOUTUBE_API_BASE_URL")
                .or(file.youtube.api_base_url)
                .unwrap_or_else(|| youtube::API_BASE_URL.to_string()),
            database_url: env("DATABASE_URL")
                .or(file.audit.database_url)
                .map(Secret::new),
        };

        require_http("REDIRECT_URI", &config.redirect_uri)?;
        require_http("GOOGLE_AUTH_ENDPOINT", &config.authorize_endpoint)?;
        require_http("GOOGLE_TOKEN_ENDPOINT", &config.token_endpoint)?;
        require_http("YOUTUBE_API_BASE_URL", &config.youtube_api_base_url)?;

        Ok(config)
    }

    /// Resolve the config file path: CLI arg, then CONFIG_PATH, then
    /// `youtube-gateway.toml` if it exists in the working directory.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// The registered OAuth application this deployment acts as.
    pub fn oauth_client(&self) -> OAuthClient {
        OAuthClient::new(
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
        )
        .with_endpoints(self.authorize_endpoint.clone(), self.token_endpoint.clone())
    }

    /// Initial credential from the configured tokens.
    pub fn seed_credential(&self, now_millis: u64) -> Credential {
        Credential::seeded(
            self.access_token.expose().clone(),
            self.refresh_token.expose().clone(),
            now_millis,
        )
    }
}

fn required(key: &str, value: Option<String>) -> common::Result<String> {
    value.ok_or_else(|| common::Error::Config(format!("{key} is required")))
}

fn require_http(key: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{key} must start with http:// or https://, got: {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("CLIENT_ID", "client-123.apps.googleusercontent.com"),
            ("CLIENT_SECRET", "GOCSPX-secret"),
            ("REDIRECT_URI", "http://localhost:3000/oauth2callback"),
        ])
    }

    fn from_env(
        file: Option<&str>,
        vars: &HashMap<&'static str, &'static str>,
    ) -> common::Result<Config> {
        Config::from_sources(file, |key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn env_only_config_uses_defaults() {
        let config = from_env(None, &base_env()).unwrap();
        assert_eq!(config.client_id, "client-123.apps.googleusercontent.com");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.authorize_endpoint, AUTHORIZE_ENDPOINT);
        assert_eq!(config.token_endpoint, TOKEN_ENDPOINT);
        assert_eq!(config.youtube_api_base_url, youtube::API_BASE_URL);
        assert!(config.database_url.is_none());
        assert!(config.access_token.is_blank());
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn missing_required_values_are_rejected() {
        for key in ["CLIENT_ID", "CLIENT_SECRET", "REDIRECT_URI"] {
            let mut vars = base_env();
            vars.remove(key);
            let err = from_env(None, &vars).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn blank_env_value_counts_as_unset() {
        let mut vars = base_env();
        vars.insert("CLIENT_ID", "   ");
        assert!(from_env(None, &vars).is_err());

        let mut vars = base_env();
        vars.insert("DATABASE_URL", "");
        assert!(from_env(None, &vars).unwrap().database_url.is_none());
    }

    #[test]
    fn file_supplies_values_and_env_overrides_them() {
        let file = r#"
            [oauth]
            client_id = "file-client"
            client_secret = "file-secret"
            redirect_uri = "https://gateway.example.com/oauth2callback"

            [tokens]
            refresh_token = "1//file-refresh"

            [server]
            port = 8080

            [audit]
            database_url = "postgres://localhost/audit"
        "#;

        let config = from_env(Some(file), &HashMap::new()).unwrap();
        assert_eq!(config.client_id, "file-client");
        assert_eq!(config.port, 8080);
        assert_eq!(config.refresh_token.expose(), "1//file-refresh");
        assert_eq!(
            config.database_url.as_ref().map(|u| u.expose().as_str()),
            Some("postgres://localhost/audit")
        );

        let vars = HashMap::from([("CLIENT_ID", "env-client"), ("PORT", "9090")]);
        let config = from_env(Some(file), &vars).unwrap();
        assert_eq!(config.client_id, "env-client");
        assert_eq!(config.port, 9090);
        assert_eq!(config.client_secret.expose(), "file-secret");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut vars = base_env();
        vars.insert("PORT", "http");
        let err = from_env(None, &vars).unwrap_err();
        assert!(err.to_string().contains("PORT"), "got: {err}");

        vars.insert("PORT", "0");
        assert!(from_env(None, &vars).is_err());
    }

    #[test]
    fn non_http_urls_are_rejected() {
        for key in [
            "REDIRECT_URI",
            "GOOGLE_AUTH_ENDPOINT",
            "GOOGLE_TOKEN_ENDPOINT",
            "YOUTUBE_API_BASE_URL",
        ] {
            let mut vars = base_env();
            vars.insert(key, "ftp://example.com");
            let err = from_env(None, &vars).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let file = "[server]\nlisten = \"0.0.0.0:80\"\n";
        assert!(matches!(
            from_env(Some(file), &base_env()),
            Err(common::Error::Toml(_))
        ));
    }

    #[test]
    fn seed_credential_reflects_configured_tokens() {
        let mut vars = base_env();
        vars.insert("ACCESS_TOKEN", "ya29.seed");
        vars.insert("REFRESH_TOKEN", "1//seed");
        let config = from_env(None, &vars).unwrap();

        let now = 1_700_000_000_000;
        let credential = config.seed_credential(now);
        assert_eq!(credential.access_token, "ya29.seed");
        assert_eq!(credential.refresh_token, "1//seed");
        assert!(!credential.is_expired_at(now));
    }

    #[test]
    fn oauth_client_carries_endpoint_overrides() {
        let mut vars = base_env();
        vars.insert("GOOGLE_TOKEN_ENDPOINT", "http://127.0.0.1:9000/token");
        let oauth = from_env(None, &vars).unwrap().oauth_client();
        assert_eq!(oauth.token_endpoint, "http://127.0.0.1:9000/token");
        assert_eq!(oauth.authorize_endpoint, AUTHORIZE_ENDPOINT);
        assert_eq!(oauth.client_secret.expose(), "GOCSPX-secret");
    }

    #[test]
    fn debug_never_prints_secrets() {
        let mut vars = base_env();
        vars.insert("REFRESH_TOKEN", "1//very-secret");
        let config = from_env(None, &vars).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("GOCSPX-secret"));
        assert!(!debug.contains("1//very-secret"));
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let dir = std::env::temp_dir().join("youtube-gateway-test-load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
            [oauth]
            client_id = "file-client"
            client_secret = "file-secret"
            redirect_uri = "http://localhost:3000/oauth2callback"
            "#,
        )
        .unwrap();

        let _lock = ENV_MUTEX.lock().unwrap();
        if std::env::var("CLIENT_ID").is_err() {
            assert_eq!(Config::load(Some(path.as_path())).unwrap().client_id, "file-client");
        }

        let missing = dir.join("does-not-exist.toml");
        assert!(matches!(
            Config::load(Some(missing.as_path())),
            Err(common::Error::Io(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn resolve_path_prefers_cli_then_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: ENV_MUTEX is held.
        unsafe { std::env::set_var("CONFIG_PATH", "/etc/youtube-gateway/env.toml") };

        assert_eq!(
            Config::resolve_path(Some("/tmp/cli.toml")),
            Some(PathBuf::from("/tmp/cli.toml"))
        );
        assert_eq!(
            Config::resolve_path(None),
            Some(PathBuf::from("/etc/youtube-gateway/env.toml"))
        );

        // SAFETY: ENV_MUTEX is held.
        unsafe { std::env::remove_var("CONFIG_PATH") };
    }
}
