use crate::auth::AccessToken;
use crate::server::{LoginAgain, COOKIE_NAME};
use async_session::{MemoryStore, SessionStore};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, TypedHeader},
    http::request::Parts,
    RequestPartsExt,
};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const EMAIL_KEY: &str = "email";

/// The logged-in Gmail account attached to the request cookie.
#[derive(Debug, Clone)]
pub struct GmailSession {
    access_token: AccessToken,
    email: String,
}

impl GmailSession {
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for GmailSession
where
    MemoryStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = LoginAgain;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = MemoryStore::from_ref(state);

        let cookies = parts
            .extract::<TypedHeader<headers::Cookie>>()
            .await
            .map_err(|_| LoginAgain)?;
        let session_cookie = cookies.get(COOKIE_NAME).ok_or(LoginAgain)?;

        let session = store
            .load_session(session_cookie.to_string())
            .await
            .map_err(|err| {
                tracing::warn!("failed loading session: {}", err);
                LoginAgain
            })?
            .ok_or(LoginAgain)?;

        let access_token = session
            .get::<AccessToken>(ACCESS_TOKEN_KEY)
            .ok_or(LoginAgain)?;
        let email = session.get::<String>(EMAIL_KEY).unwrap_or_default();

        Ok(GmailSession {
            access_token,
            email,
        })
    }
}
