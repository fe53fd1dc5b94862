use crate::{
    auth::Authenticator, gemini::Gemini, handler, redirect::BackendOrigin, store::DomainStore,
    GoogleConfig, LightConfig,
};
use async_session::MemoryStore;
use axum::{
    extract::FromRef,
    http::{Request, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, time::Duration};
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::Span;

pub const COOKIE_NAME: &str = "light-session";

pub async fn start_server(config: LightConfig, google: Option<GoogleConfig>) -> anyhow::Result<()> {
    let origin = config.backend_origin();
    tracing::info!(backend = %origin, "login target is {}", origin.login_target());

    let store = DomainStore::open(config.database_path())?;

    let mut app = landing_routes(origin).merge(domain_routes(store.clone()));

    if let Some(google) = google {
        // `MemoryStore` keeps sessions per process; a restart logs everyone out.
        let sessions = MemoryStore::new();
        let authenticator = Authenticator::discover(&google, config.public_url()).await?;
        let http = reqwest::Client::new();
        let gemini = Gemini::new(http.clone(), google.api_key().map(str::to_owned));

        app = app.merge(google_routes(GoogleState {
            authenticator,
            sessions,
            store,
            http,
            gemini,
        }));
    }

    let app = app.layer(
        TraceLayer::new_for_http()
            .on_request(|request: &Request<_>, _span: &Span| {
                tracing::info!("{} {}", request.method(), request.uri());
            })
            .on_response(|response: &Response, latency: Duration, _span: &Span| {
                tracing::info!("{} in {:?}", response.status(), latency);
            })
            .on_failure(
                |error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                    tracing::error!("{} after {:?}", error, latency);
                },
            ),
    );

    let addr: SocketAddr = config.listen_addr().parse()?;
    tracing::debug!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

/// The landing page and its call-to-action.
pub fn landing_routes(origin: BackendOrigin) -> Router {
    Router::new()
        .route("/", get(handler::home))
        .route("/connect", get(handler::connect))
        .with_state(origin)
}

pub fn domain_routes(store: DomainStore) -> Router {
    Router::new()
        .route("/domains", get(handler::domains))
        .route("/save_domain", get(handler::save_domain))
        .route("/delete_domain", get(handler::delete_domain))
        .with_state(store)
}

/// Routes that need a Google login.
pub fn google_routes(state: GoogleState) -> Router {
    Router::new()
        .route("/login", get(handler::login))
        .route("/oauth2callback", get(handler::callback))
        .route("/logout", get(handler::logout))
        .route("/draft/:message_id", get(handler::draft_one))
        .route("/draft_all", get(handler::draft_all))
        .with_state(state)
}

#[derive(Clone)]
pub struct GoogleState {
    authenticator: Authenticator,
    sessions: MemoryStore,
    store: DomainStore,
    http: reqwest::Client,
    gemini: Gemini,
}

impl FromRef<GoogleState> for Authenticator {
    fn from_ref(state: &GoogleState) -> Self {
        state.authenticator.clone()
    }
}

impl FromRef<GoogleState> for MemoryStore {
    fn from_ref(state: &GoogleState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<GoogleState> for DomainStore {
    fn from_ref(state: &GoogleState) -> Self {
        state.store.clone()
    }
}

impl FromRef<GoogleState> for reqwest::Client {
    fn from_ref(state: &GoogleState) -> Self {
        state.http.clone()
    }
}

impl FromRef<GoogleState> for Gemini {
    fn from_ref(state: &GoogleState) -> Self {
        state.gemini.clone()
    }
}

/// Rejection for requests that need a Gmail session but have none.
pub struct LoginAgain;

impl IntoResponse for LoginAgain {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Login again" })),
        )
            .into_response()
    }
}

/// Any unexpected failure inside a handler.
#[derive(Debug)]
pub struct InternalError(anyhow::Error);

impl<E> From<E> for InternalError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        tracing::error!("{:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}
