use crate::config::GoogleConfig;
use crate::error::{CourierError, Result};
use crate::google_oauth::credentials::ClientRegistration;

use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, StandardRevocableToken, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use tracing::info;
use url::Url;

/// Stateless Google OAuth endpoints.
pub(super) struct GoogleOauthEndpoints;

impl GoogleOauthEndpoints {
    /// Consent page URL for an offline (refresh-token issuing) grant.
    pub(super) fn build_authorize_url(
        client: &DriveOauth2Client,
        scopes: &[String],
        challenge: PkceCodeChallenge,
    ) -> (Url, CsrfToken) {
        client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .url()
    }

    pub(super) async fn exchange_authorization_code(
        client: &DriveOauth2Client,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse> {
        let token = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(http_client)
            .await?;
        info!("authorization code exchanged");
        Ok(token)
    }

    pub(super) async fn refresh_access_token(
        client: &DriveOauth2Client,
        refresh_token: String,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse> {
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(http_client)
            .await?;
        info!("access token refreshed");
        Ok(token)
    }
}

/// Build the OAuth2 client from the registration, falling back to the
/// configured endpoints where the registration leaves them out.
pub(super) fn build_oauth2_client(
    reg: &ClientRegistration,
    google: &GoogleConfig,
) -> Result<DriveOauth2Client> {
    let auth_uri = reg
        .auth_uri
        .clone()
        .unwrap_or_else(|| google.auth_url.to_string());
    let token_uri = reg
        .token_uri
        .clone()
        .unwrap_or_else(|| google.token_url.to_string());
    let redirect = reg.redirect_uri().ok_or_else(|| {
        CourierError::CredentialLoad("client registration has no redirect_uris".to_string())
    })?;

    let client = OAuth2Client::new(ClientId::new(reg.client_id.clone()))
        .set_client_secret(ClientSecret::new(reg.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(auth_uri)?)
        .set_token_uri(TokenUrl::new(token_uri)?)
        .set_redirect_uri(RedirectUrl::new(redirect.to_string())?);
    Ok(client)
}

pub(super) type DriveOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
