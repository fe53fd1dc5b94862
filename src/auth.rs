use crate::GoogleConfig;
use async_lock::RwLock;
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata},
    reqwest::async_http_client,
    AccessTokenHash, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse, RedirectUrl, Scope,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use url::Url;

const GOOGLE_ISSUER: &str = "https://accounts.google.com";

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// How long a login started at `/login` may take to come back to the callback.
const LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on logins waiting for their callback.
const MAX_PENDING_LOGINS: usize = 1024;

type OidcStore = Arc<RwLock<PendingLogins>>;

/// Nonces of logins that have been started but not yet completed, keyed by
/// the CSRF state sent to Google.
///
/// Entries older than the TTL are pruned on every insert; when the map is
/// still full the oldest entry is evicted.
#[derive(Debug)]
struct PendingLogins {
    entries: HashMap<String, (Nonce, Instant)>,
    ttl: Duration,
    capacity: usize,
}

impl PendingLogins {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    fn insert(&mut self, state: String, nonce: Nonce, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (_, started)| now.saturating_duration_since(*started) < ttl);

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (_, started))| *started)
                .map(|(state, _)| state.clone());
            match oldest {
                Some(state) => {
                    tracing::warn!("too many pending logins, dropping the oldest");
                    self.entries.remove(&state);
                }
                None => break,
            }
        }

        self.entries.insert(state, (nonce, now));
    }

    fn take(&mut self, state: &str, now: Instant) -> Option<Nonce> {
        let (nonce, started) = self.entries.remove(state)?;
        (now.saturating_duration_since(started) < self.ttl).then_some(nonce)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown or expired login state")]
    UnknownState,
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("provider returned no id token")]
    MissingIdToken,
    #[error("id token rejected: {0}")]
    Claims(String),
    #[error("access token hash mismatch")]
    AccessTokenHash,
}

#[derive(Clone, Debug)]
pub struct Authenticator {
    client: CoreClient,
    store: OidcStore,
}

impl Authenticator {
    pub async fn discover(config: &GoogleConfig, public_url: &str) -> anyhow::Result<Self> {
        let provider_metadata = CoreProviderMetadata::discover_async(
            IssuerUrl::new(GOOGLE_ISSUER.to_string())?,
            async_http_client,
        )
        .await?;

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
        )
        .set_redirect_uri(RedirectUrl::new(format!(
            "{}/oauth2callback",
            public_url.trim_end_matches('/')
        ))?);

        Ok(Self {
            client,
            store: Arc::new(RwLock::new(PendingLogins::new(
                LOGIN_TTL,
                MAX_PENDING_LOGINS,
            ))),
        })
    }

    pub async fn login_redirect_url(&self) -> Url {
        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        );
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, csrf_token, nonce) = request
            .add_extra_param("prompt", "consent")
            .add_extra_param("include_granted_scopes", "true")
            .url();

        let mut pending = self.store.write().await;
        pending.insert(csrf_token.secret().to_owned(), nonce, Instant::now());
        tracing::debug!(pending = pending.len(), "login started");

        auth_url
    }

    /// Exchanges the authorization code and checks the ID token against the
    /// nonce issued for `state`.
    pub async fn verify_code(&self, state: &str, code: String) -> Result<AccessToken, Error> {
        let nonce = self
            .store
            .write()
            .await
            .take(state, Instant::now())
            .ok_or(Error::UnknownState)?;

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Exchange(e.to_string()))?;

        let id_token_verifier = self.client.id_token_verifier();
        let id_token = token_response
            .extra_fields()
            .id_token()
            .ok_or(Error::MissingIdToken)?;
        let id_token_claims = id_token
            .claims(&id_token_verifier, &nonce)
            .map_err(|e| Error::Claims(e.to_string()))?;

        if let Some(expected_access_token_hash) = id_token_claims.access_token_hash() {
            let algorithm = id_token
                .signing_alg()
                .map_err(|e| Error::Claims(e.to_string()))?;
            let actual = AccessTokenHash::from_token(token_response.access_token(), &algorithm)
                .map_err(|e| Error::Claims(e.to_string()))?;

            if actual != *expected_access_token_hash {
                return Err(Error::AccessTokenHash);
            }
        }

        tracing::debug!(subject = %id_token_claims.subject().as_str(), "verified id token");

        Ok(AccessToken(token_response.access_token().secret().to_owned()))
    }
}

/// Bearer token for the Gmail API.
#[derive(Serialize, Deserialize, Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}
