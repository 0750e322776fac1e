pub mod auth;
pub mod data;

use oauth2::AccessToken;
use std::sync::Arc;

/// Hands a token to whoever asked for it.
pub type TokenCallback = Box<dyn FnOnce(String) + Send>;

/// The player's `getOAuthToken` hook.
pub type TokenSupplier = Arc<dyn Fn(TokenCallback) + Send + Sync>;

/// Token captured by the bootstrap. Read-only for the rest of the session.
#[derive(Clone, Debug)]
pub struct AuthContext {
    token: AccessToken,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

impl AuthContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token.into()),
            token_type: None,
            expires_in: None,
        }
    }

    pub fn token(&self) -> &str {
        self.token.secret()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token())
    }

    pub fn token_supplier(&self) -> TokenSupplier {
        let token = self.token().to_string();
        Arc::new(move |callback: TokenCallback| callback(token.clone()))
    }
}
