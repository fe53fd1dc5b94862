//! Drafting AI replies to recent personal mail.

use crate::{
    gemini::{self, LanguageModel},
    gmail::{Format, Mailbox, Message, Payload},
};
use anyhow::Context;
use base64::{
    alphabet,
    engine::{general_purpose, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use chrono::{DateTime, Duration, Utc};
use lettre::message::{header::ContentType, Mailbox as Address};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Gmail omits padding on some payloads and keeps it on others.
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const PREVIEW_CHARS: usize = 200;

static BLOCK_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6])\s*>").unwrap());
static SCRIPT_OR_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DraftOutcome {
    Skipped {
        eligible: bool,
        reason: String,
    },
    Drafted {
        eligible: bool,
        draft_id: String,
        reply_preview: String,
    },
}

impl DraftOutcome {
    fn skipped(reason: &str) -> Self {
        DraftOutcome::Skipped {
            eligible: false,
            reason: reason.to_string(),
        }
    }

    fn drafted(draft_id: String, reply: &str) -> Self {
        DraftOutcome::Drafted {
            eligible: true,
            draft_id,
            reply_preview: preview(reply),
        }
    }

    pub fn is_drafted(&self) -> bool {
        matches!(self, DraftOutcome::Drafted { .. })
    }
}

fn preview(reply: &str) -> String {
    let mut preview: String = reply.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Whether an RFC 2822 `Date` header lies within the last 24 hours.
/// Unparsable dates count as old.
pub fn is_recent(date: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc2822(date.trim()) {
        Ok(sent) => now.signed_duration_since(sent) <= Duration::hours(24),
        Err(_) => false,
    }
}

/// First body found depth-first, decoded from base64url.
pub fn extract_body(payload: &Payload) -> String {
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        if let Ok(bytes) = GMAIL_BASE64.decode(data) {
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }

    payload
        .parts
        .iter()
        .map(extract_body)
        .find(|body| !body.is_empty())
        .unwrap_or_default()
}

/// Reduces HTML to readable plain text. Plain text passes through trimmed.
pub fn clean_html(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, "");
    let text = BLOCK_END.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = htmlescape::decode_html(&text).unwrap_or_else(|_| text.into_owned());

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Base64url encoded plain-text reply, ready for `drafts.create`.
///
/// Headers are RFC 2047 encoded by `lettre`, so non-ASCII names and
/// subjects stay 7-bit on the wire.
pub fn encode_reply(
    from: Address,
    to: Address,
    subject: &str,
    body: &str,
) -> Result<String, lettre::error::Error> {
    let message = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(format!("Re: {subject}"))
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?;
    Ok(general_purpose::URL_SAFE.encode(message.formatted()))
}

/// Drafts a reply to `message` if it comes from a Gmail sender and is less
/// than a day old. `account` is the mailbox owner, used as the draft sender.
pub async fn generate_reply_and_save<M, L>(
    mailbox: &M,
    model: &L,
    account: &str,
    message: &Message,
    now: DateTime<Utc>,
) -> anyhow::Result<DraftOutcome>
where
    M: Mailbox + ?Sized,
    L: LanguageModel + ?Sized,
{
    let from = message.payload.header("From");
    let subject = message.payload.header("Subject");

    if !from.contains("@gmail.com") {
        return Ok(DraftOutcome::skipped("Sender not gmail.com"));
    }

    if !is_recent(message.payload.header("Date"), now) {
        return Ok(DraftOutcome::skipped("Email older than 24 hours"));
    }

    let to = match from.trim().parse::<Address>() {
        Ok(to) => to,
        Err(err) => {
            tracing::debug!(message = %message.id, "unparsable sender {:?}: {}", from, err);
            return Ok(DraftOutcome::skipped("Sender address not parseable"));
        }
    };
    let account = account
        .parse::<Address>()
        .with_context(|| format!("invalid account address {:?}", account))?;

    let thread_text = clean_html(&extract_body(&message.payload));
    let reply = model.generate(&gemini::reply_prompt(&thread_text)).await?;

    let raw = encode_reply(account, to, subject, &reply)?;
    let draft = mailbox.create_draft(&raw, &message.thread_id).await?;
    tracing::info!(message = %message.id, draft = %draft.id, "created reply draft");

    Ok(DraftOutcome::drafted(draft.id, &reply))
}

#[derive(Debug, Serialize)]
pub struct DraftSummary {
    pub processed: usize,
    pub drafted: Vec<DraftOutcome>,
    pub skipped: Vec<DraftOutcome>,
}

/// Runs [`generate_reply_and_save`] over the `limit` most recent messages.
pub async fn draft_recent<M, L>(
    mailbox: &M,
    model: &L,
    account: &str,
    limit: u32,
    now: DateTime<Utc>,
) -> anyhow::Result<DraftSummary>
where
    M: Mailbox + ?Sized,
    L: LanguageModel + ?Sized,
{
    let recent = mailbox.list_messages(limit).await?;

    let mut drafted = Vec::new();
    let mut skipped = Vec::new();

    for message_ref in &recent {
        let message = mailbox.message(&message_ref.id, Format::Full).await?;
        let outcome = generate_reply_and_save(mailbox, model, account, &message, now).await?;

        if outcome.is_drafted() {
            drafted.push(outcome);
        } else {
            skipped.push(outcome);
        }
    }

    tracing::info!(drafted = drafted.len(), skipped = skipped.len(), "drafting finished");

    Ok(DraftSummary {
        processed: recent.len(),
        drafted,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::tests::ScriptedModel;
    use crate::gmail::Body;
    use crate::labeler::tests::{message, FakeMailbox};
    use chrono::TimeZone;

    const ACCOUNT: &str = "me@example.com";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn recent_dates_are_within_a_day() {
        assert!(is_recent("Sun, 10 Mar 2024 08:00:00 +0000", now()));
        assert!(is_recent("Sat, 09 Mar 2024 12:00:00 +0000", now()));
        assert!(!is_recent("Sat, 09 Mar 2024 11:59:59 +0000", now()));
        assert!(is_recent("Sun, 10 Mar 2024 10:30:00 -0100", now()));
    }

    #[test]
    fn unparsable_dates_are_old() {
        assert!(!is_recent("", now()));
        assert!(!is_recent("yesterday", now()));
    }

    #[test]
    fn finds_first_nested_body() {
        let payload = Payload {
            parts: vec![
                Payload::default(),
                Payload {
                    parts: vec![Payload {
                        body: Some(Body {
                            data: Some(general_purpose::URL_SAFE_NO_PAD.encode("<p>Hi</p>")),
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(extract_body(&payload), "<p>Hi</p>");
        assert_eq!(extract_body(&Payload::default()), "");
    }

    #[test]
    fn strips_markup() {
        let html = "<html><style>p{}</style><body><p>Hello &amp; welcome</p>\
                    <div>Line two<br/>Line three</div></body></html>";
        assert_eq!(clean_html(html), "Hello & welcome\nLine two\nLine three");
    }

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn header_block(raw: &str) -> Vec<u8> {
        let decoded = GMAIL_BASE64.decode(raw).unwrap();
        let end = decoded
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("no header/body separator");
        decoded[..end].to_vec()
    }

    #[test]
    fn encodes_reply_headers() {
        let raw = encode_reply(
            addr("me@example.com"),
            addr("Ann <ann@gmail.com>"),
            "Dinner",
            "Sounds good",
        )
        .unwrap();
        let decoded = String::from_utf8(GMAIL_BASE64.decode(&raw).unwrap()).unwrap();
        assert!(decoded.contains("ann@gmail.com"));
        assert!(decoded.contains("Subject: Re: Dinner\r\n"));
        assert!(decoded.contains("Sounds good"));
    }

    #[test]
    fn non_ascii_headers_stay_seven_bit() {
        let raw = encode_reply(
            addr("me@example.com"),
            addr("Zoë <zoe@gmail.com>"),
            "Café ☕",
            "Merci, à bientôt",
        )
        .unwrap();
        let headers = header_block(&raw);
        assert!(headers.iter().all(u8::is_ascii));

        let headers = String::from_utf8(headers).unwrap();
        assert!(headers.contains("zoe@gmail.com"));
        assert!(headers.contains("Subject: =?"));
        assert!(!headers.contains("Café"));
    }

    #[tokio::test]
    async fn skips_non_gmail_senders() {
        let mailbox = FakeMailbox::default();
        let model = ScriptedModel::new(vec![]);
        let msg = message(
            "1",
            &[("From", "boss@corp.com"), ("Date", "Sun, 10 Mar 2024 11:00:00 +0000")],
        );
        let outcome = generate_reply_and_save(&mailbox, &model, ACCOUNT, &msg, now())
            .await
            .unwrap();
        assert_eq!(outcome, DraftOutcome::skipped("Sender not gmail.com"));
        assert!(model.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn skips_stale_mail() {
        let mailbox = FakeMailbox::default();
        let model = ScriptedModel::new(vec![]);
        let msg = message(
            "1",
            &[("From", "pal@gmail.com"), ("Date", "Fri, 08 Mar 2024 11:00:00 +0000")],
        );
        let outcome = generate_reply_and_save(&mailbox, &model, ACCOUNT, &msg, now())
            .await
            .unwrap();
        assert_eq!(outcome, DraftOutcome::skipped("Email older than 24 hours"));
    }

    #[tokio::test]
    async fn drafts_reply_in_thread() {
        let mailbox = FakeMailbox::default();
        let reply = "x".repeat(250);
        let model = ScriptedModel::new(vec![Ok(reply)]);
        let mut msg = message(
            "7",
            &[
                ("From", "Pal <pal@gmail.com>"),
                ("Subject", "Weekend"),
                ("Date", "Sun, 10 Mar 2024 11:00:00 +0000"),
            ],
        );
        msg.payload.body = Some(Body {
            data: Some(general_purpose::URL_SAFE.encode("<div>Free on Saturday?</div>")),
        });

        let outcome = generate_reply_and_save(&mailbox, &model, ACCOUNT, &msg, now())
            .await
            .unwrap();

        match &outcome {
            DraftOutcome::Drafted {
                draft_id,
                reply_preview,
                ..
            } => {
                assert_eq!(draft_id, "draft-1");
                assert_eq!(reply_preview.chars().count(), PREVIEW_CHARS + 3);
                assert!(reply_preview.ends_with("..."));
            }
            other => panic!("expected a draft, got {other:?}"),
        }
        assert!(model.prompts.lock().await[0].contains("Free on Saturday?"));

        let drafts = mailbox.drafts.lock().await;
        assert_eq!(drafts[0].1, "thread-7");

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["eligible"], true);
        assert_eq!(json["draft_id"], "draft-1");
    }

    #[tokio::test]
    async fn draft_recent_splits_drafted_and_skipped() {
        let mailbox = FakeMailbox::with_messages(vec![
            message(
                "1",
                &[
                    ("From", "Zoë <zoe@gmail.com>"),
                    ("Subject", "Café ☕"),
                    ("Date", "Sun, 10 Mar 2024 09:00:00 +0000"),
                ],
            ),
            message(
                "2",
                &[("From", "news@shop.com"), ("Date", "Sun, 10 Mar 2024 09:00:00 +0000")],
            ),
            message(
                "3",
                &[("From", "old@gmail.com"), ("Date", "Mon, 04 Mar 2024 09:00:00 +0000")],
            ),
        ]);
        let model = ScriptedModel::new(vec![Ok("See you there".to_string())]);

        let summary = draft_recent(&mailbox, &model, ACCOUNT, 20, now())
            .await
            .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.drafted.len(), 1);
        assert_eq!(
            summary.skipped,
            vec![
                DraftOutcome::skipped("Sender not gmail.com"),
                DraftOutcome::skipped("Email older than 24 hours"),
            ]
        );

        let drafts = mailbox.drafts.lock().await;
        assert_eq!(drafts.len(), 1);
        assert!(header_block(&drafts[0].0).iter().all(u8::is_ascii));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["processed"], 3);
        assert_eq!(json["drafted"][0]["eligible"], true);
        assert_eq!(json["skipped"][1]["reason"], "Email older than 24 hours");
    }
}
