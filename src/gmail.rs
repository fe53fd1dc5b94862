//! Minimal Gmail REST v1 client.

use axum::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("gmail request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gmail returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Body {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<Body>,
    #[serde(default)]
    pub parts: Vec<Payload>,
}

impl Payload {
    /// Case-insensitive header lookup, empty when missing.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub payload: Payload,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Draft {
    pub id: String,
}

/// How much of a message to fetch.
#[derive(Clone, Copy, Debug)]
pub enum Format<'a> {
    /// Only the listed headers.
    Metadata(&'a [&'a str]),
    Full,
}

/// The mailbox operations the labeller and drafter rely on.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn profile_email(&self) -> Result<String, Error>;
    async fn list_messages(&self, max_results: u32) -> Result<Vec<MessageRef>, Error>;
    async fn message(&self, id: &str, format: Format<'_>) -> Result<Message, Error>;
    async fn labels(&self) -> Result<Vec<Label>, Error>;
    async fn create_label(&self, name: &str) -> Result<Label, Error>;
    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<(), Error>;
    /// `raw` is the base64url encoded RFC 2822 message.
    async fn create_draft(&self, raw: &str, thread_id: &str) -> Result<Draft, Error>;
}

#[derive(Clone)]
pub struct GmailClient {
    http: Client,
    access_token: String,
}

impl std::fmt::Debug for GmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailClient").finish_non_exhaustive()
    }
}

impl GmailClient {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        Ok(response.json::<T>().await?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    email_address: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn profile_email(&self) -> Result<String, Error> {
        let profile: Profile = self
            .send(self.http.get(format!("{GMAIL_API}/profile")))
            .await?;
        Ok(profile.email_address)
    }

    async fn list_messages(&self, max_results: u32) -> Result<Vec<MessageRef>, Error> {
        let list: MessageList = self
            .send(
                self.http
                    .get(format!("{GMAIL_API}/messages"))
                    .query(&[("maxResults", max_results)]),
            )
            .await?;
        Ok(list.messages)
    }

    async fn message(&self, id: &str, format: Format<'_>) -> Result<Message, Error> {
        let mut query = Vec::new();
        match format {
            Format::Metadata(headers) => {
                query.push(("format", "metadata"));
                query.extend(headers.iter().map(|h| ("metadataHeaders", *h)));
            }
            Format::Full => query.push(("format", "full")),
        }
        self.send(
            self.http
                .get(format!("{GMAIL_API}/messages/{id}"))
                .query(&query),
        )
        .await
    }

    async fn labels(&self) -> Result<Vec<Label>, Error> {
        let list: LabelList = self
            .send(self.http.get(format!("{GMAIL_API}/labels")))
            .await?;
        Ok(list.labels)
    }

    async fn create_label(&self, name: &str) -> Result<Label, Error> {
        self.send(
            self.http
                .post(format!("{GMAIL_API}/labels"))
                .json(&json!({ "name": name })),
        )
        .await
    }

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<(), Error> {
        let _: serde_json::Value = self
            .send(
                self.http
                    .post(format!("{GMAIL_API}/messages/{message_id}/modify"))
                    .json(&json!({ "addLabelIds": [label_id] })),
            )
            .await?;
        Ok(())
    }

    async fn create_draft(&self, raw: &str, thread_id: &str) -> Result<Draft, Error> {
        self.send(
            self.http
                .post(format!("{GMAIL_API}/drafts"))
                .json(&json!({ "message": { "raw": raw, "threadId": thread_id } })),
        )
        .await
    }
}
