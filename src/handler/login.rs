use crate::auth::Authenticator;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use tracing::instrument;

/// Starts the Google sign-in: remembers a fresh state/nonce pair and sends
/// the browser to the consent screen with the Gmail scopes.
#[instrument(skip(auth))]
pub async fn login(State(auth): State<Authenticator>) -> impl IntoResponse {
    let auth_url = auth.login_redirect_url().await;
    Redirect::to(auth_url.as_ref())
}
