use crate::error::{CourierError, Result};
use chrono::Utc;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Delegated credential cached on disk between runs.
///
/// Field names follow the token file written by Google's client libraries,
/// so an existing `token.json` can be reused as is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Space-delimited granted scopes.
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token expiry, milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredCredential {
    /// Build from a token endpoint response. `requested` fills in the scope
    /// when the provider does not echo it back.
    pub fn from_token_response(
        resp: &BasicTokenResponse,
        client_id: &str,
        requested: &[String],
    ) -> Self {
        let scope = resp
            .scopes()
            .map(|s| s.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| requested.join(" "));
        Self {
            access_token: resp.access_token().secret().clone(),
            refresh_token: resp.refresh_token().map(|t| t.secret().clone()),
            scope,
            token_type: default_token_type(),
            expiry_date: resp
                .expires_in()
                .and_then(|d| i64::try_from(d.as_millis()).ok())
                .map(|ms| Utc::now().timestamp_millis() + ms),
            client_id: Some(client_id.to_string()),
        }
    }

    /// Apply a refresh response. Providers usually omit the refresh token on
    /// refresh, in which case the current one is kept.
    pub fn refreshed_with(&self, resp: &BasicTokenResponse) -> Self {
        let client_id = self.client_id.clone().unwrap_or_default();
        let requested: Vec<String> = self.scopes().into_iter().map(str::to_string).collect();
        let mut next = Self::from_token_response(resp, &client_id, &requested);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        next.client_id = self.client_id.clone();
        next
    }

    pub fn scopes(&self) -> BTreeSet<&str> {
        self.scope.split_whitespace().collect()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Read the cached credential. `Ok(None)` when there is no file; a file
    /// that does not parse is a [`CourierError::CredentialLoad`].
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CourierError::CredentialLoad(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let cred: Self = serde_json::from_str(&contents).map_err(|e| {
            CourierError::CredentialLoad(format!("{}: {}", path.display(), e))
        })?;
        if cred.access_token.is_empty() {
            return Err(CourierError::CredentialLoad(format!(
                "{}: empty access_token",
                path.display()
            )));
        }
        Ok(Some(cred))
    }

    /// Write the credential, readable by the owner only on Unix. The file is
    /// opened with that mode before any bytes are written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(self)?;

        let mut opts = tokio::fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(path).await?;
        secure_token_file(&file).await?;
        file.write_all(&body).await?;
        file.flush().await?;

        debug!(path = %path.display(), "credential persisted");
        Ok(())
    }
}

/// `mode` only applies on creation; tighten a file left by an earlier run.
#[cfg(unix)]
async fn secure_token_file(file: &tokio::fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await?;
    Ok(())
}

#[cfg(not(unix))]
async fn secure_token_file(_file: &tokio::fs::File) -> Result<()> {
    Ok(())
}

/// OAuth client registration, as downloaded from the cloud console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientRegistration>,
    web: Option<ClientRegistration>,
}

impl ClientRegistration {
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CourierError::CredentialLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
            .map_err(|e| CourierError::CredentialLoad(format!("{}: {}", path.display(), e)))
    }

    /// Accepts the `installed` or `web` envelope.
    pub fn from_json(contents: &str) -> std::result::Result<Self, String> {
        let file: ClientSecretFile = serde_json::from_str(contents).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an `installed` or `web` client entry".to_string())
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }
}
