use crate::server::{InternalError, COOKIE_NAME};
use async_session::{MemoryStore, SessionStore};
use axum::{
    extract::{State, TypedHeader},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect},
};
use tracing::instrument;

/// Drops the server-side session and clears the cookie.
#[instrument(skip_all)]
pub async fn logout(
    State(store): State<MemoryStore>,
    cookies: Option<TypedHeader<headers::Cookie>>,
) -> Result<impl IntoResponse, InternalError> {
    let session_cookie = cookies
        .as_ref()
        .and_then(|TypedHeader(cookies)| cookies.get(COOKIE_NAME))
        .map(str::to_owned);

    if let Some(cookie) = session_cookie {
        if let Some(session) = store.load_session(cookie).await? {
            store.destroy_session(session).await?;
            tracing::debug!("session destroyed");
        }
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        format!("{}=; Max-Age=0; Path=/", COOKIE_NAME).parse()?,
    );

    Ok((headers, Redirect::to("/")))
}
