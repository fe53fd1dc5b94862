use async_lock::Mutex;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::{fmt, path::Path, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Where a domain label came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Manual,
    Seed,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::Seed => "seed",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainLabel {
    pub domain: String,
    pub label: String,
    pub source: String,
}

const SEED_DOMAINS: &[(&str, &str)] = &[
    ("netflix.com", "Entertainment"),
    ("primevideo.com", "Entertainment"),
    ("hotstar.com", "Entertainment"),
    ("spotify.com", "Entertainment"),
    ("instagram.com", "Entertainment"),
    ("facebookmail.com", "Entertainment"),
    ("redditmail.com", "Entertainment"),
    ("pinterest.com", "Entertainment"),
    ("amazon.in", "Shopping"),
    ("flipkart.com", "Shopping"),
    ("ajio.com", "Shopping"),
    ("myntra.com", "Shopping"),
    ("zomato.com", "Food"),
    ("swiggy.com", "Food"),
    ("ola.com", "Travel"),
    ("uber.com", "Travel"),
    ("airindia.in", "Travel"),
    ("goindigo.in", "Travel"),
    ("hdfcbank.com", "Finance"),
    ("icicibank.com", "Finance"),
    ("axisbank.com", "Finance"),
    ("sbi.co.in", "Finance"),
    ("paytm.com", "Finance"),
    ("linkedin.com", "Career"),
    ("naukri.com", "Career"),
    ("indeed.com", "Career"),
    ("support.google.com", "Support"),
    ("support.microsoft.com", "Support"),
];

/// Domain to label overrides, backed by a single SQLite connection.
#[derive(Clone)]
pub struct DomainStore {
    conn: Arc<Mutex<Connection>>,
}

impl fmt::Debug for DomainStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainStore").finish_non_exhaustive()
    }
}

impl DomainStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS domain_labels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT UNIQUE,
                label TEXT,
                source TEXT,
                created_at TEXT
            )",
            [],
        )?;

        // Existing rows win so manual edits survive a restart.
        let now = Utc::now().to_rfc3339();
        for (domain, label) in SEED_DOMAINS {
            conn.execute(
                "INSERT OR IGNORE INTO domain_labels (domain, label, source, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![domain, label, Source::Seed.as_str(), now],
            )?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn save(&self, domain: &str, label: &str, source: Source) -> Result<(), Error> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO domain_labels (domain, label, source, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                domain.to_lowercase(),
                label,
                source.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        tracing::debug!(domain, label, %source, "saved domain label");
        Ok(())
    }

    pub async fn label_for(&self, domain: &str) -> Result<Option<String>, Error> {
        let conn = self.conn.lock().await;
        let label = conn
            .query_row(
                "SELECT label FROM domain_labels WHERE domain = ?1",
                params![domain.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(label)
    }

    pub async fn all(&self) -> Result<Vec<DomainLabel>, Error> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT domain, label, source FROM domain_labels ORDER BY domain")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DomainLabel {
                    domain: row.get(0)?,
                    label: row.get(1)?,
                    source: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn delete(&self, domain: &str) -> Result<(), Error> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM domain_labels WHERE domain = ?1",
            params![domain.to_lowercase()],
        )?;
        tracing::debug!(domain, "deleted domain label");
        Ok(())
    }
}
