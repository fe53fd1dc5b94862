use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;

/// Origin used when `BACKEND_URL` is unset or empty.
pub const DEFAULT_BACKEND_URL: &str = "https://lighter-delv.onrender.com";

/// Path appended to the origin to reach the login route of the backend.
pub const LOGIN_PATH: &str = "/login";

/// Bytes that cannot travel raw in a header value. Non-ASCII bytes are
/// always encoded by `utf8_percent_encode`.
const HEADER_UNSAFE: &AsciiSet = CONTROLS;

/// Scheme and host (optionally with a path prefix) of the service that
/// handles authentication.
///
/// The value is taken as-is: it is neither validated nor normalized, so an
/// origin ending in `/` yields a target containing `//login`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendOrigin(String);

impl BackendOrigin {
    /// Resolves the origin from an optional configured value, falling back to
    /// [`DEFAULT_BACKEND_URL`] when it is absent or empty.
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured {
            Some(origin) if !origin.is_empty() => Self(origin.to_owned()),
            _ => Self(DEFAULT_BACKEND_URL.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Navigation target for the "Connect to Gmail" call-to-action.
    pub fn login_target(&self) -> String {
        format!("{}{}", self.0, LOGIN_PATH)
    }

    /// [`Self::login_target`] with control and non-ASCII bytes
    /// percent-encoded, so it always fits in a `Location` header.
    pub fn login_location(&self) -> String {
        utf8_percent_encode(&self.login_target(), HEADER_UNSAFE).to_string()
    }
}

impl Default for BackendOrigin {
    fn default() -> Self {
        Self::resolve(None)
    }
}

impl fmt::Display for BackendOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
