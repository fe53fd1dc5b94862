use super::HtmlTemplate;
use crate::server::InternalError;
use crate::store::{DomainStore, Source};
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use tracing::instrument;

struct DomainRow {
    domain: String,
    label: String,
    source: String,
    delete_href: String,
}

#[derive(Template)]
#[template(path = "domains.html")]
struct DomainsTemplate {
    rows: Vec<DomainRow>,
}

#[instrument(skip(store))]
pub async fn domains(State(store): State<DomainStore>) -> Result<impl IntoResponse, InternalError> {
    let rows = store
        .all()
        .await?
        .into_iter()
        .map(|row| DomainRow {
            delete_href: format!(
                "/delete_domain?domain={}",
                utf8_percent_encode(&row.domain, NON_ALPHANUMERIC)
            ),
            domain: row.domain,
            label: row.label,
            source: row.source,
        })
        .collect();

    Ok(HtmlTemplate(DomainsTemplate { rows }))
}

#[derive(Debug, Deserialize)]
pub struct SaveDomain {
    domain: String,
    label: String,
}

#[instrument(skip(store))]
pub async fn save_domain(
    State(store): State<DomainStore>,
    Query(form): Query<SaveDomain>,
) -> Result<Redirect, InternalError> {
    let domain = form.domain.trim();
    let label = form.label.trim();

    if domain.is_empty() || label.is_empty() {
        tracing::debug!("ignoring incomplete domain form");
    } else {
        store.save(domain, label, Source::Manual).await?;
    }

    Ok(Redirect::to("/domains"))
}

#[derive(Debug, Deserialize)]
pub struct DeleteDomain {
    domain: String,
}

#[instrument(skip(store))]
pub async fn delete_domain(
    State(store): State<DomainStore>,
    Query(query): Query<DeleteDomain>,
) -> Result<Redirect, InternalError> {
    store.delete(&query.domain).await?;
    Ok(Redirect::to("/domains"))
}
