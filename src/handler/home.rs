use super::HtmlTemplate;
use askama::Template;
use axum::response::IntoResponse;
use tracing::instrument;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate;

/// Renders the landing page. Never redirects.
#[instrument]
pub async fn home() -> impl IntoResponse {
    HtmlTemplate(HomeTemplate)
}
