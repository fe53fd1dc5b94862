use crate::redirect::BackendOrigin;
use axum::{
    extract::State,
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::instrument;

/// "Connect to Gmail": sends the browser to the backend's login route.
#[instrument]
pub async fn connect(State(origin): State<BackendOrigin>) -> Response {
    let target = origin.login_location();
    tracing::debug!(origin = origin.as_str(), %target, "redirecting to login");

    match HeaderValue::try_from(target.as_str()) {
        Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
        Err(err) => {
            tracing::error!(%target, "login target is not a valid header value: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
