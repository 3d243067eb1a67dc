use super::code_provider::{CodeProvider, extract_code};
use super::endpoints::{GoogleOauthEndpoints, build_oauth2_client};
use crate::config::GoogleConfig;
use crate::error::{CourierError, Result};
use crate::google_oauth::credentials::{ClientRegistration, StoredCredential};
use oauth2::{AuthorizationCode, PkceCodeChallenge};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthorized,
    PendingGrant,
    Authorized,
}

/// Owns the delegated credential for the lifetime of the process.
///
/// The first `authorize` either loads the cached credential or runs the
/// interactive grant; after that the in-memory copy is returned. The slot
/// lock is held across the grant, so concurrent first callers share one
/// prompt.
pub struct AuthorizationManager {
    google: GoogleConfig,
    http: reqwest::Client,
    code_provider: Arc<dyn CodeProvider>,
    credential: Mutex<Option<StoredCredential>>,
    state: StdMutex<AuthState>,
}

impl AuthorizationManager {
    pub fn new(
        google: GoogleConfig,
        http: reqwest::Client,
        code_provider: Arc<dyn CodeProvider>,
    ) -> Self {
        Self {
            google,
            http,
            code_provider,
            credential: Mutex::new(None),
            state: StdMutex::new(AuthState::Unauthorized),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: AuthState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }

    pub fn token_path(&self) -> &std::path::Path {
        &self.google.token_path
    }

    /// Return a usable credential. A cached file that parses is trusted as
    /// is; expiry is not checked here.
    pub async fn authorize(&self) -> Result<StoredCredential> {
        let mut slot = self.credential.lock().await;
        if let Some(cred) = slot.as_ref() {
            return Ok(cred.clone());
        }

        if let Some(cred) = StoredCredential::load(&self.google.token_path).await? {
            info!(path = %self.google.token_path.display(), "using cached credential");
            *slot = Some(cred.clone());
            self.set_state(AuthState::Authorized);
            return Ok(cred);
        }

        info!(
            path = %self.google.token_path.display(),
            "no cached credential; starting interactive grant"
        );
        self.set_state(AuthState::PendingGrant);
        let granted = match self.grant().await {
            Ok(cred) => cred,
            Err(e) => {
                self.set_state(AuthState::Unauthorized);
                return Err(e);
            }
        };
        if let Err(e) = granted.save(&self.google.token_path).await {
            self.set_state(AuthState::Unauthorized);
            return Err(e);
        }

        info!(path = %self.google.token_path.display(), "credential stored");
        *slot = Some(granted.clone());
        self.set_state(AuthState::Authorized);
        Ok(granted)
    }

    /// Trade the refresh token for a new access token and persist the result.
    pub async fn refresh(&self) -> Result<StoredCredential> {
        let mut slot = self.credential.lock().await;
        let current = match slot.clone() {
            Some(cred) => cred,
            None => StoredCredential::load(&self.google.token_path)
                .await?
                .ok_or_else(|| {
                    CourierError::GrantExchange("no cached credential to refresh".to_string())
                })?,
        };
        let Some(refresh_token) = current.refresh_token.clone().filter(|t| !t.is_empty()) else {
            warn!("cached credential carries no refresh token");
            return Err(CourierError::GrantExchange(
                "cached credential has no refresh token".to_string(),
            ));
        };

        let reg = ClientRegistration::load(&self.google.client_secret_path).await?;
        let client = build_oauth2_client(&reg, &self.google)?;
        let resp =
            GoogleOauthEndpoints::refresh_access_token(&client, refresh_token, &self.http).await?;

        let refreshed = current.refreshed_with(&resp);
        refreshed.save(&self.google.token_path).await?;
        *slot = Some(refreshed.clone());
        self.set_state(AuthState::Authorized);
        Ok(refreshed)
    }

    async fn grant(&self) -> Result<StoredCredential> {
        let reg = ClientRegistration::load(&self.google.client_secret_path).await?;
        let client = build_oauth2_client(&reg, &self.google)?;

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) =
            GoogleOauthEndpoints::build_authorize_url(&client, &self.google.scopes, challenge);

        let input = self.code_provider.request_code(&auth_url).await?;
        let code = extract_code(&input, csrf.secret())?;

        let resp = GoogleOauthEndpoints::exchange_authorization_code(
            &client,
            AuthorizationCode::new(code),
            verifier,
            &self.http,
        )
        .await?;

        let cred = StoredCredential::from_token_response(&resp, &reg.client_id, &self.google.scopes);
        if !cred.has_refresh_token() {
            warn!("token response carried no refresh_token; the credential cannot be refreshed");
        }
        Ok(cred)
    }
}
