use regex::Regex;
use std::sync::OnceLock;

use crate::error::{MirrorError, MirrorResult};
use crate::urls::UrlHandler;

/// Upper bound on the header section before the response is rejected
pub const MAX_HEAD_LEN: usize = 64 * 1024;

/// Status line and header fields of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn status_line() -> &'static Regex {
    static STATUS_LINE: OnceLock<Regex> = OnceLock::new();
    STATUS_LINE.get_or_init(|| {
        Regex::new(r"^HTTP/\d(?:\.\d)?\s+(\d{3})(?:\s+(.*))?$")
            .expect("hardcoded regex pattern is valid")
    })
}

/// Offset just past the blank line ending the header section
pub fn find_head_end(buffer: &[u8]) -> Option<usize> {
    if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
        return Some(pos + 4);
    }

    buffer.windows(2).position(|window| window == b"\n\n").map(|pos| pos + 2)
}

/// Parse the header section of a response
pub fn parse_head(head: &[u8], host: &str) -> MirrorResult<ResponseHead> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));

    let first = lines.next().unwrap_or_default();
    let captures = status_line().captures(first.trim()).ok_or_else(|| MirrorError::ServerProtocol {
        host: host.to_string(),
        reason: format!("invalid status line '{}'", first.trim()),
    })?;

    let status_code = captures[1].parse::<u16>().map_err(|e| MirrorError::ServerProtocol {
        host: host.to_string(),
        reason: e.to_string(),
    })?;
    let reason = captures.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();

    let headers = lines
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    Ok(ResponseHead {
        status_code,
        reason,
        headers,
    })
}

/// Build the HTTP/1.0 request for a URL
///
/// `Cookie` and `User-Agent` are only sent when configured.
pub fn build_request(url: &UrlHandler, cookies: &str, user_agent: &str) -> String {
    let mut request = format!(
        "GET /{} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n",
        url.norm_url_path(),
        url.domain()
    );

    if !cookies.is_empty() {
        request.push_str(&format!("Cookie: {}\r\n", cookies));
    }

    if !user_agent.is_empty() {
        request.push_str(&format!("User-Agent: {}\r\n", user_agent));
    }

    request.push_str("\r\n");
    request
}
