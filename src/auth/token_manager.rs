//! Token lifecycle for the Microsoft identity platform
//!
//! Decides, from what the credential store holds, whether to reuse the access
//! token, refresh it, or run a new PKCE authorization-code login:
//!
//! - [`TokenState::Valid`]: return the cached token, no network
//! - [`TokenState::Expired`]: one refresh attempt; a rejection clears the store
//!   and falls through to login
//! - [`TokenState::NoCredential`]: interactive login if allowed

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;
use crate::Result;
use crate::api::client::error_message;
use crate::api::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::config::Config;
use crate::error::{AuthError, Error};
use super::credentials::{Credential, CredentialStore};
use super::login::LoginFlow;
use super::pkce::PkceSecret;

/// Client registration and endpoints
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    /// Space-separated scopes
    pub scope: String,
}

impl From<&Config> for OAuthSettings {
    fn from(config: &Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            authorize_url: config.authorize_url(),
            token_url: config.token_url(),
            redirect_uri: config.redirect_uri(),
            scope: config.scope_string(),
        }
    }
}

/// Where the stored credential stands relative to now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    NoCredential,
    Valid(Credential),
    Expired(Credential),
}

impl TokenState {
    pub fn classify(credential: Option<Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            None => TokenState::NoCredential,
            Some(c) if c.is_valid_at(now) => TokenState::Valid(c),
            Some(c) => TokenState::Expired(c),
        }
    }
}

/// Token endpoint success body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Owns the credential and every transition between token states
pub struct TokenManager {
    settings: OAuthSettings,
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    login: Arc<dyn LoginFlow>,
    // Serialises load-modify-save so a refresh never races a new login
    lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        settings: OAuthSettings,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
        login: Arc<dyn LoginFlow>,
    ) -> Self {
        Self {
            settings,
            store,
            transport,
            login,
            lock: Mutex::new(()),
        }
    }

    /// Current state of the stored credential
    pub fn state(&self) -> Result<TokenState> {
        Ok(TokenState::classify(self.store.load()?, Utc::now()))
    }

    /// Get a usable access token, refreshing or logging in as needed
    pub async fn get_token(&self, allow_interactive: bool) -> Result<String> {
        let _guard = self.lock.lock().await;

        match self.state()? {
            TokenState::Valid(credential) => {
                tracing::debug!("Using cached access token");
                return Ok(credential.access_token);
            }
            TokenState::Expired(credential) => {
                tracing::info!("Access token expired, refreshing...");
                match self.refresh(&credential).await {
                    Ok(refreshed) => return Ok(refreshed.access_token),
                    Err(Error::Auth(AuthError::RefreshRejected(detail))) if allow_interactive => {
                        tracing::warn!("Refresh rejected ({}), signing in again", detail);
                    }
                    Err(e) => return Err(e),
                }
            }
            TokenState::NoCredential => {
                tracing::debug!("No stored credential");
            }
        }

        if !allow_interactive {
            return Err(AuthError::NotAuthenticated.into());
        }

        tracing::info!("No valid token, starting interactive login");
        let credential = self.login_interactive().await?;
        Ok(credential.access_token)
    }

    /// Run the interactive login even if a credential is stored
    pub async fn login(&self) -> Result<Credential> {
        let _guard = self.lock.lock().await;
        self.login_interactive().await
    }

    /// Forget the stored credential
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.clear()
    }

    /// Authorization request URL for one login attempt
    pub fn authorization_url(&self, code_challenge: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.settings.authorize_url)
            .map_err(|e| Error::Config(format!("Invalid authorization URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("scope", &self.settings.scope)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state)
            .append_pair("prompt", "select_account");

        Ok(url)
    }

    async fn login_interactive(&self) -> Result<Credential> {
        let secret = PkceSecret::generate();
        let state = generate_state();
        let url = self.authorization_url(secret.challenge(), &state)?;

        let redirect = self.login.run(&url).await?.ok_or_else(|| {
            AuthError::LoginCancelled("login window closed before completion".to_string())
        })?;

        let code = extract_code(&redirect, &state)?;
        // The secret is consumed here whatever the exchange outcome
        self.exchange_code(&code, secret.into_verifier()).await
    }

    async fn exchange_code(&self, code: &str, code_verifier: String) -> Result<Credential> {
        let request = HttpRequest::post_form(
            self.settings.token_url.as_str(),
            [
                ("client_id", self.settings.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("code_verifier", code_verifier.as_str()),
            ],
        );

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            let detail = failure_detail(&response);
            tracing::error!("Token exchange failed: {}", detail);
            return Err(AuthError::TokenExchangeFailed(detail).into());
        }

        let tokens: TokenResponse = response.json().map_err(|e| {
            AuthError::TokenExchangeFailed(format!("malformed token response: {}", e))
        })?;
        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            AuthError::TokenExchangeFailed(
                "token response carried no refresh token (is offline_access granted?)".to_string(),
            )
        })?;

        let expires_in = tokens.expires_in;
        let credential = Credential::from_expires_in(tokens.access_token, refresh_token, expires_in, Utc::now())
            .ok_or_else(|| {
                AuthError::TokenExchangeFailed(format!("token lifetime out of range: {} seconds", expires_in))
            })?;
        self.store.save(&credential)?;
        tracing::info!("Signed in, token valid until {}", credential.expires_at);
        Ok(credential)
    }

    /// Single refresh attempt. Any HTTP error status is a definitive rejection.
    async fn refresh(&self, current: &Credential) -> Result<Credential> {
        let request = HttpRequest::post_form(
            self.settings.token_url.as_str(),
            [
                ("client_id", self.settings.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("scope", self.settings.scope.as_str()),
            ],
        );

        // No response at all leaves the credential untouched
        let response = self.transport.send(&request).await?;

        let tokens = if response.is_success() {
            response
                .json::<TokenResponse>()
                .map_err(|e| format!("malformed token response: {}", e))
        } else {
            Err(failure_detail(&response))
        };

        let credential = tokens.and_then(|tokens| {
            let expires_in = tokens.expires_in;
            Credential::from_expires_in(
                tokens.access_token,
                tokens
                    .refresh_token
                    .unwrap_or_else(|| current.refresh_token.clone()),
                expires_in,
                Utc::now(),
            )
            .ok_or_else(|| format!("token lifetime out of range: {} seconds", expires_in))
        });

        let credential = match credential {
            Ok(credential) => credential,
            Err(detail) => {
                tracing::error!("Refresh token rejected, user must sign in again: {}", detail);
                self.store.clear()?;
                return Err(AuthError::RefreshRejected(detail).into());
            }
        };

        self.store.save(&credential)?;
        tracing::info!("Refreshed access token");
        Ok(credential)
    }
}

/// Pull the authorization code out of the redirect the login ended on
fn extract_code(redirect: &Url, expected_state: &str) -> std::result::Result<String, AuthError> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in redirect.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(err) = error {
        let description = error_description.unwrap_or_else(|| "no description".to_string());
        return Err(AuthError::LoginCancelled(format!("{}: {}", err, description)));
    }

    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::LoginCancelled(
            "redirect state did not match the login request".to_string(),
        ));
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::LoginCancelled("redirect carried no authorization code".to_string()))
}

/// `error_description` from the token endpoint, or the bare status
fn failure_detail(response: &HttpResponse) -> String {
    response
        .json::<serde_json::Value>()
        .ok()
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("HTTP status {}", response.status))
}

/// Random state string binding the redirect to this login attempt
fn generate_state() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}
