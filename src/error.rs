use std::path::PathBuf;
use thiserror::Error;

/// Failures produced while mirroring a site
///
/// Transport failures are carried inside a `Response` rather than returned,
/// so every variant holds owned strings and the type stays cheap to clone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MirrorError {
    /// Input could not be understood as an http(s) URL
    #[error("invalid URL '{url}': {reason}")]
    UrlParse { url: String, reason: String },

    /// TCP or TLS level failure, including an exhausted redirect budget
    #[error("connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    /// Connect or read deadline elapsed
    #[error("connection to {host} timed out")]
    Timeout { host: String },

    /// Server answered with something that is not an HTTP response
    #[error("malformed response from {host}: {reason}")]
    ServerProtocol { host: String, reason: String },

    /// Certificate chain or hostname verification failed
    #[error("certificate verification failed for {host}: {reason}")]
    Certificate { host: String, reason: String },

    /// Server answered with an error status code
    #[error("HTTP {code} for {url}")]
    HttpStatus { url: String, code: u16 },

    /// Writing the mirror to disk failed
    #[error("filesystem error at {}: {reason}", path.display())]
    Filesystem { path: PathBuf, reason: String },

    /// Configuration value is missing or unusable
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type MirrorResult<T> = std::result::Result<T, MirrorError>;

impl MirrorError {
    pub fn url_parse(url: &str, reason: impl Into<String>) -> Self {
        Self::UrlParse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
