use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

pub mod callback;
pub mod connect;
pub mod domains;
pub mod drafts;
pub mod home;
pub mod login;
pub mod logout;

pub use callback::callback;
pub use connect::connect;
pub use domains::{delete_domain, domains, save_domain};
pub use drafts::{draft_all, draft_one};
pub use home::home;
pub use login::login;
pub use logout::logout;

pub(crate) struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template. Error: {}", err),
            )
                .into_response(),
        }
    }
}
