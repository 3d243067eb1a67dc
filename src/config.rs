//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `COURIER_`-prefixed environment variables (`__` separates sections).

use crate::error::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "COURIER_";

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    pub http: HttpConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BasicConfig {
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:messages.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GoogleConfig {
    /// Client registration downloaded from the cloud console.
    pub client_secret_path: PathBuf,
    /// Where the delegated credential is cached between runs.
    pub token_path: PathBuf,
    /// Used when the client registration omits `auth_uri`.
    pub auth_url: Url,
    /// Used when the client registration omits `token_uri`.
    pub token_url: Url,
    pub scopes: Vec<String>,
    pub drive_upload_url: Url,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_secret_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            auth_url: Url::parse(GOOGLE_AUTH_URL).expect("valid auth url"),
            token_url: Url::parse(GOOGLE_TOKEN_URL).expect("valid token url"),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            drive_upload_url: Url::parse(DRIVE_UPLOAD_URL).expect("valid upload url"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub proxy: Option<Url>,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout_secs: 5,
            timeout_secs: 60,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the shared HTTP client used for token and upload calls.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("chatcourier/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.connect_timeout())
            .timeout(self.timeout())
            // token endpoints must not be followed through redirects
            .redirect(reqwest::redirect::Policy::none());
        if let Some(proxy_url) = self.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Skip messages whose timestamp is not on the current local day.
    pub today_only: bool,
}

impl Config {
    /// Load from the default file name in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::figment(path).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
