//! Authentication module for OAuth2 and credential management
//!
//! This module provides:
//! - PKCE secrets for the authorization-code grant
//! - Credential storage and retrieval
//! - The loopback redirect listener and browser login flow
//! - [`TokenManager`], which owns the token lifecycle

mod callback_server;
mod credentials;
pub(crate) mod login;
mod pkce;
mod token_manager;

pub use callback_server::{CallbackServer, CALLBACK_HOST, CALLBACK_PATH};
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use login::{BrowserLoginFlow, LoginFlow};
pub use pkce::{derive_challenge, generate_verifier, PkceSecret, VERIFIER_LENGTH};
pub use token_manager::{OAuthSettings, TokenManager, TokenState};
