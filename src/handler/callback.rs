use super::HtmlTemplate;
use crate::auth::{AccessToken, Authenticator};
use crate::extractor::{ACCESS_TOKEN_KEY, EMAIL_KEY};
use crate::gemini::{self, Gemini};
use crate::gmail::{GmailClient, Mailbox};
use crate::labeler;
use crate::server::{InternalError, COOKIE_NAME};
use crate::store::DomainStore;
use anyhow::Context;
use askama::Template;
use async_session::{MemoryStore, Session, SessionStore};
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

/// Messages scanned for sender domains.
const DOMAIN_SCAN: u32 = 100;
/// Most recent messages that get labelled.
const LABEL_BATCH: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    code: String,
    state: String,
}

struct ReportRow {
    message_id: String,
    category: String,
    confidence: u8,
    reason: String,
}

#[derive(Template)]
#[template(path = "labels.html")]
struct LabelsTemplate {
    email: String,
    reports: Vec<ReportRow>,
}

#[instrument(skip_all)]
pub async fn callback(
    Query(query): Query<AuthRequest>,
    State(auth): State<Authenticator>,
    State(sessions): State<MemoryStore>,
    State(store): State<DomainStore>,
    State(http): State<reqwest::Client>,
    State(gemini): State<Gemini>,
) -> Result<impl IntoResponse, InternalError> {
    let access_token = auth.verify_code(&query.state, query.code).await?;
    let mailbox = GmailClient::new(http, access_token.secret());

    let email = mailbox.profile_email().await?;
    tracing::info!(%email, "logged in");

    let scanned = mailbox.list_messages(DOMAIN_SCAN).await?;
    let domains = labeler::collect_domains(&mailbox, &scanned).await?;
    let entertainment = gemini::classify_entertainment(&gemini, &domains).await;

    let recent = mailbox.list_messages(LABEL_BATCH).await?;
    let reports = labeler::apply_labels(&mailbox, &store, &recent, &entertainment).await?;

    let headers = save_and_get_cookie_header(&sessions, access_token, &email).await?;

    let template = LabelsTemplate {
        email,
        reports: reports
            .into_iter()
            .map(|(message_id, report)| ReportRow {
                message_id,
                category: report.category,
                confidence: report.confidence,
                reason: report.reason,
            })
            .collect(),
    };

    Ok((headers, HtmlTemplate(template)))
}

async fn save_and_get_cookie_header(
    store: &MemoryStore,
    access_token: AccessToken,
    email: &str,
) -> anyhow::Result<HeaderMap> {
    let mut session = Session::new();
    session.insert(ACCESS_TOKEN_KEY, access_token)?;
    session.insert(EMAIL_KEY, email)?;

    let cookie = store
        .store_session(session)
        .await?
        .context("cookie string not found")?;

    let cookie = format!("{}={}; SameSite=Lax; Path=/; HttpOnly", COOKIE_NAME, cookie);

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie.parse()?);

    Ok(headers)
}
