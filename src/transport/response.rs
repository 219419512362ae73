use chrono::{DateTime, Utc};

use crate::error::{MirrorError, MirrorResult};
use crate::urls::UrlHandler;

/// Outcome of one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Finished,
    InProgress,
    Moved,
    TimedOut,
    ConnError,
    ServerError,
}

/// Result of a single `get()`, consumed once by the caller
#[derive(Debug, Clone)]
pub struct Response {
    pub status: ResponseStatus,

    /// Status code from the status line, 0 if none was received
    pub status_code: u16,

    pub content_type: String,

    pub content_disposition: String,

    pub last_modified: Option<DateTime<Utc>>,

    /// Declared body length; `None` means read until the peer closes
    pub content_length: Option<usize>,

    /// Redirect target when the status is `Moved`
    pub moved_url: Option<UrlHandler>,

    pub body: Vec<u8>,

    /// Failure that produced a non-success status
    pub error: Option<MirrorError>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: ResponseStatus::InProgress,
            status_code: 0,
            content_type: String::new(),
            content_disposition: String::new(),
            last_modified: None,
            content_length: None,
            moved_url: None,
            body: Vec::new(),
            error: None,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response standing for a failed attempt
    pub fn failed(error: MirrorError) -> Self {
        let status = match error {
            MirrorError::Timeout { .. } => ResponseStatus::TimedOut,
            MirrorError::Connection { .. } | MirrorError::Certificate { .. } => {
                ResponseStatus::ConnError
            }
            _ => ResponseStatus::ServerError,
        };

        Self {
            status,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Media type without parameters, lower-cased
    pub fn mime_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    /// Resolve a `Location` header value and record it as the redirect target
    pub fn set_moved_url(
        &mut self,
        location: &str,
        current: &UrlHandler,
        root: &UrlHandler,
    ) -> MirrorResult<()> {
        self.moved_url = Some(resolve_location(location, current, root)?);
        Ok(())
    }
}

/// Resolve a redirect target against the URL that produced it
///
/// The external flag of the result is recomputed against the crawl root,
/// since a redirect may cross domains in either direction.
pub fn resolve_location(
    location: &str,
    current: &UrlHandler,
    root: &UrlHandler,
) -> MirrorResult<UrlHandler> {
    let location = location.trim();
    if location.is_empty() {
        return Err(MirrorError::url_parse(location, "empty Location header"));
    }

    let mut target = if location.starts_with("//") {
        UrlHandler::parse(&format!("{}:{}", current.scheme(), location))?
    } else if location.starts_with('/') {
        current.join(location)
    } else if has_http_scheme(location) {
        UrlHandler::parse(location)?
    } else if location.contains("://") {
        return Err(MirrorError::url_parse(location, "unsupported redirect scheme"));
    } else {
        current.join(location)
    };

    target.set_external(target.domain_norm() != root.domain_norm());
    Ok(target)
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
