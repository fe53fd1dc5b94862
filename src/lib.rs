use serde::Deserialize;

pub mod auth;
pub mod classify;
pub mod draft;
pub mod extractor;
pub mod gemini;
pub mod gmail;
pub mod handler;
pub mod labeler;
pub mod redirect;
pub mod server;
pub mod store;

use redirect::BackendOrigin;

/// Application settings read from the environment.
#[derive(Deserialize, Clone, Debug)]
pub struct LightConfig {
    #[serde(default)]
    backend_url: Option<String>,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    #[serde(default = "default_public_url")]
    public_url: String,
    #[serde(default = "default_database_path")]
    database_path: String,
}

impl LightConfig {
    pub fn backend_origin(&self) -> BackendOrigin {
        BackendOrigin::resolve(self.backend_url.as_deref())
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn database_path(&self) -> &str {
        &self.database_path
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_database_path() -> String {
    "db.sqlite3".to_string()
}

/// Google OAuth client and Gemini key, read from `GOOGLE_*` variables.
#[derive(Deserialize, Clone, Debug)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    api_key: Option<String>,
}

impl GoogleConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}
