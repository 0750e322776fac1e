use crate::spotify::AuthContext;
use log::{error, info};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use std::collections::BTreeMap;
use thiserror::Error;
use url::{form_urlencoded, Url};

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const SCOPE: &str = "streaming,user-modify-playback-state";

/// Unrecoverable outcomes of the bootstrap. The caller ends the session on any of them.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BootstrapFault {
    #[error("redirect fragment carries no access_token: {fragment:?}")]
    MissingToken { fragment: BTreeMap<String, String> },

    #[error("authorization was refused: {error}")]
    Denied {
        error: String,
        description: Option<String>,
    },

    #[error("redirect state does not match the authorization request")]
    StateMismatch,
}

/// What a page load resolves to.
#[derive(Debug)]
pub enum Bootstrap {
    /// Navigate here; nothing else happens during this load.
    Redirect { url: Url, state: CsrfToken },
    Authorized(AuthContext),
}

pub struct ImplicitGrant {
    client_id: ClientId,
    auth_url: AuthUrl,
}

impl ImplicitGrant {
    pub fn new(client_id: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            client_id: ClientId::new(client_id.into()),
            auth_url: AuthUrl::new(AUTHORIZE_URL.to_string())?,
        })
    }

    /// Authorization URL sending the browser back to `page_url` with the token in the fragment.
    pub fn authorize_url(&self, page_url: &Url) -> (Url, CsrfToken) {
        let mut redirect = page_url.clone();
        redirect.set_fragment(None);

        let client = BasicClient::new(self.client_id.clone(), None, self.auth_url.clone(), None)
            .set_redirect_uri(RedirectUrl::from_url(redirect));

        client
            .authorize_url(CsrfToken::new_random)
            .use_implicit_flow()
            // Serialized as `streaming%2Cuser-modify-playback-state`, which the server decodes back.
            .add_scope(Scope::new(SCOPE.to_string()))
            .url()
    }

    pub fn bootstrap(
        &self,
        location: &Url,
        expected_state: Option<&CsrfToken>,
    ) -> Result<Bootstrap, BootstrapFault> {
        match location.fragment().filter(|fragment| !fragment.is_empty()) {
            None => {
                let (url, state) = self.authorize_url(location);
                info!("No redirect fragment, sending the browser to the authorization page");
                Ok(Bootstrap::Redirect { url, state })
            }
            Some(fragment) => parse_fragment(fragment, expected_state).map(Bootstrap::Authorized),
        }
    }
}

/// Reads the implicit-grant response out of a URL fragment (without the leading `#`).
pub fn parse_fragment(
    fragment: &str,
    expected_state: Option<&CsrfToken>,
) -> Result<AuthContext, BootstrapFault> {
    let params: BTreeMap<String, String> = form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect();

    if let Some(code) = params.get("error") {
        error!("{:?}", params);
        return Err(BootstrapFault::Denied {
            error: code.clone(),
            description: params.get("error_description").cloned(),
        });
    }

    let token = match params.get("access_token").filter(|token| !token.is_empty()) {
        Some(token) => token.clone(),
        None => {
            error!("{:?}", params);
            return Err(BootstrapFault::MissingToken { fragment: params });
        }
    };

    if let Some(expected) = expected_state {
        if params.get("state") != Some(expected.secret()) {
            error!("state mismatch in redirect fragment");
            return Err(BootstrapFault::StateMismatch);
        }
    }

    let mut auth = AuthContext::new(token);
    auth.token_type = params.get("token_type").cloned();
    auth.expires_in = params.get("expires_in").and_then(|secs| secs.parse().ok());

    info!(
        "Captured access token (type {}, expires in {}s)",
        auth.token_type.as_deref().unwrap_or("unknown"),
        auth.expires_in.map(|secs| secs.to_string()).unwrap_or_else(|| "?".to_string()),
    );
    Ok(auth)
}
