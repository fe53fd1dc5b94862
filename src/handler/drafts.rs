use crate::draft::{self, DraftOutcome, DraftSummary};
use crate::extractor::GmailSession;
use crate::gemini::Gemini;
use crate::gmail::{Format, GmailClient, Mailbox};
use crate::server::InternalError;
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::Utc;
use tracing::instrument;

/// Most recent messages considered by `/draft_all`.
const DRAFT_BATCH: u32 = 20;

#[instrument(skip(session, http, gemini))]
pub async fn draft_one(
    Path(message_id): Path<String>,
    session: GmailSession,
    State(http): State<reqwest::Client>,
    State(gemini): State<Gemini>,
) -> Result<Json<DraftOutcome>, InternalError> {
    let mailbox = GmailClient::new(http, session.access_token().secret());
    let message = mailbox.message(&message_id, Format::Full).await?;

    let outcome = draft::generate_reply_and_save(
        &mailbox,
        &gemini,
        session.email(),
        &message,
        Utc::now(),
    )
    .await?;

    Ok(Json(outcome))
}

#[instrument(skip_all, fields(email = %session.email()))]
pub async fn draft_all(
    session: GmailSession,
    State(http): State<reqwest::Client>,
    State(gemini): State<Gemini>,
) -> Result<Json<DraftSummary>, InternalError> {
    let mailbox = GmailClient::new(http, session.access_token().secret());
    let summary =
        draft::draft_recent(&mailbox, &gemini, session.email(), DRAFT_BATCH, Utc::now()).await?;

    Ok(Json(summary))
}
