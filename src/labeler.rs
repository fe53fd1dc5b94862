use crate::{
    classify::{self, LabelReport, Verdict},
    gmail::{Format, Mailbox, MessageRef},
    store::DomainStore,
};
use std::collections::{BTreeSet, HashMap};

const FROM_ONLY: &[&str] = &["From"];
const SUBJECT_AND_FROM: &[&str] = &["Subject", "From"];

/// Sender domains of the given messages, deduplicated and sorted.
pub async fn collect_domains<M>(
    mailbox: &M,
    messages: &[MessageRef],
) -> anyhow::Result<Vec<String>>
where
    M: Mailbox + ?Sized,
{
    let mut domains = BTreeSet::new();
    for message in messages {
        let meta = mailbox
            .message(&message.id, Format::Metadata(FROM_ONLY))
            .await?;
        let sender = classify::sender_address(meta.payload.header("From"));
        domains.insert(classify::extract_domain(sender));
    }
    Ok(domains.into_iter().collect())
}

/// Gmail label ids keyed by lower-cased name, creating labels on demand.
struct LabelCache<'a, M: ?Sized> {
    mailbox: &'a M,
    ids: HashMap<String, String>,
}

impl<'a, M> LabelCache<'a, M>
where
    M: Mailbox + ?Sized,
{
    async fn load(mailbox: &'a M) -> anyhow::Result<LabelCache<'a, M>> {
        let ids = mailbox
            .labels()
            .await?
            .into_iter()
            .map(|label| (label.name.to_lowercase(), label.id))
            .collect();
        Ok(Self { mailbox, ids })
    }

    async fn ensure(&mut self, name: &str) -> anyhow::Result<String> {
        let key = name.to_lowercase();
        if let Some(id) = self.ids.get(&key) {
            return Ok(id.clone());
        }

        let created = self.mailbox.create_label(name).await?;
        tracing::info!(label = name, id = %created.id, "created gmail label");
        self.ids.insert(key, created.id.clone());
        Ok(created.id)
    }
}

/// Classifies each message and applies the resulting category as a label.
///
/// Returns one report per message, in input order.
pub async fn apply_labels<M>(
    mailbox: &M,
    store: &DomainStore,
    messages: &[MessageRef],
    entertainment: &HashMap<String, bool>,
) -> anyhow::Result<Vec<(String, LabelReport)>>
where
    M: Mailbox + ?Sized,
{
    let mut labels = LabelCache::load(mailbox).await?;
    let mut reports = Vec::with_capacity(messages.len());

    for message in messages {
        let meta = mailbox
            .message(&message.id, Format::Metadata(SUBJECT_AND_FROM))
            .await?;
        let subject = meta.payload.header("Subject");
        let sender = classify::sender_address(meta.payload.header("From"));
        let domain = classify::extract_domain(sender);

        let override_label = store.label_for(&domain).await?;
        let verdict = classify::classify(
            override_label.as_deref(),
            subject,
            sender,
            entertainment.get(&domain).copied().unwrap_or(false),
        );

        if let Verdict::Apply(classification) = &verdict {
            let label_id = labels.ensure(&classification.category).await?;
            mailbox.add_label(&message.id, &label_id).await?;
        }

        tracing::debug!(message = %message.id, ?verdict, "classified message");
        reports.push((message.id.clone(), LabelReport::from(&verdict)));
    }

    Ok(reports)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gmail::{Draft, Error, Header, Label, Message, Payload};
    use async_lock::Mutex;
    use axum::async_trait;

    /// In-memory mailbox recording every mutation.
    #[derive(Default)]
    pub(crate) struct FakeMailbox {
        pub messages: Vec<Message>,
        pub labels: Mutex<Vec<Label>>,
        pub applied: Mutex<Vec<(String, String)>>,
        pub drafts: Mutex<Vec<(String, String)>>,
    }

    impl FakeMailbox {
        pub(crate) fn with_messages(messages: Vec<Message>) -> Self {
            Self {
                messages,
                ..Default::default()
            }
        }
    }

    pub(crate) fn message(id: &str, headers: &[(&str, &str)]) -> Message {
        Message {
            id: id.to_string(),
            thread_id: format!("thread-{id}"),
            payload: Payload {
                headers: headers
                    .iter()
                    .map(|(name, value)| Header {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
                ..Default::default()
            },
        }
    }

    fn not_found() -> Error {
        Error::Status {
            status: reqwest::StatusCode::NOT_FOUND,
            body: String::new(),
        }
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn profile_email(&self) -> Result<String, Error> {
            Ok("me@example.com".to_string())
        }

        async fn list_messages(&self, max_results: u32) -> Result<Vec<MessageRef>, Error> {
            Ok(self
                .messages
                .iter()
                .take(max_results as usize)
                .map(|m| MessageRef {
                    id: m.id.clone(),
                    thread_id: m.thread_id.clone(),
                })
                .collect())
        }

        async fn message(&self, id: &str, _format: Format<'_>) -> Result<Message, Error> {
            self.messages
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(not_found)
        }

        async fn labels(&self) -> Result<Vec<Label>, Error> {
            Ok(self.labels.lock().await.clone())
        }

        async fn create_label(&self, name: &str) -> Result<Label, Error> {
            let mut labels = self.labels.lock().await;
            let label = Label {
                id: format!("Label_{}", labels.len() + 1),
                name: name.to_string(),
            };
            labels.push(label.clone());
            Ok(label)
        }

        async fn add_label(&self, message_id: &str, label_id: &str) -> Result<(), Error> {
            self.applied
                .lock()
                .await
                .push((message_id.to_string(), label_id.to_string()));
            Ok(())
        }

        async fn create_draft(&self, raw: &str, thread_id: &str) -> Result<Draft, Error> {
            let mut drafts = self.drafts.lock().await;
            drafts.push((raw.to_string(), thread_id.to_string()));
            Ok(Draft {
                id: format!("draft-{}", drafts.len()),
            })
        }
    }

    fn refs(mailbox: &FakeMailbox) -> Vec<MessageRef> {
        mailbox
            .messages
            .iter()
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect()
    }

    #[tokio::test]
    async fn collects_unique_sender_domains() {
        let mailbox = FakeMailbox::with_messages(vec![
            message("1", &[("From", "A <a@Shop.com>")]),
            message("2", &[("From", "b@shop.com")]),
            message("3", &[("From", "c@news.org")]),
        ]);
        let domains = collect_domains(&mailbox, &refs(&mailbox)).await.unwrap();
        assert_eq!(domains, vec!["news.org".to_string(), "shop.com".to_string()]);
    }

    #[tokio::test]
    async fn applies_labels_and_reports_in_order() {
        let store = DomainStore::open_in_memory().unwrap();
        let mailbox = FakeMailbox::with_messages(vec![
            message("1", &[("Subject", "Your invoice"), ("From", "billing@acme.io")]),
            message("2", &[("Subject", "Movie night"), ("From", "Netflix <info@netflix.com>")]),
            message("3", &[("Subject", "lunch?"), ("From", "pal@gmail.com")]),
            message("4", &[("Subject", "New drop"), ("From", "hi@streams.tv")]),
            message("5", &[("Subject", "hello"), ("From", "who@nowhere.net")]),
            message("6", &[("Subject", "Payment received"), ("From", "x@acme.io")]),
        ]);
        mailbox.labels.lock().await.push(Label {
            id: "Label_finance".to_string(),
            name: "finance".to_string(),
        });
        let entertainment = HashMap::from([("streams.tv".to_string(), true)]);

        let reports = apply_labels(&mailbox, &store, &refs(&mailbox), &entertainment)
            .await
            .unwrap();

        let categories: Vec<_> = reports
            .iter()
            .map(|(id, r)| (id.as_str(), r.category.as_str(), r.confidence))
            .collect();
        assert_eq!(
            categories,
            vec![
                ("1", "Finance", 90),
                ("2", "Entertainment", 99),
                ("3", "Personal (skipped)", 50),
                ("4", "Entertainment", 80),
                ("5", "None", 0),
                ("6", "Finance", 90),
            ]
        );

        let applied = mailbox.applied.lock().await.clone();
        assert_eq!(
            applied,
            vec![
                ("1".to_string(), "Label_finance".to_string()),
                ("2".to_string(), "Label_2".to_string()),
                ("4".to_string(), "Label_2".to_string()),
                ("6".to_string(), "Label_finance".to_string()),
            ]
        );
        // Existing "finance" label reused; only "Entertainment" was created.
        assert_eq!(mailbox.labels.lock().await.len(), 2);
    }
}
