use std::fmt;

use crate::error::{MirrorError, MirrorResult};

const HTTPS_PREFIX: &str = "https://";
const HTTP_PREFIX: &str = "http://";

/// Canonical identity of a URL inside the mirror
///
/// Holds the raw path segments as they were added; every accessor that
/// produces a path runs the stack normalization, so `.` and `..` never
/// escape into request lines or output paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlHandler {
    /// Whether the scheme is https
    https: bool,

    /// Lower-cased domain, including an explicit `:port` if one was given
    domain: String,

    /// Path segments in insertion order, not yet normalized
    segments: Vec<String>,

    /// Whether the domain differs from the crawl root's
    external: bool,

    /// Whether the most recently added path ended with `/`
    trailing_slash: bool,
}

impl UrlHandler {
    /// Parse an internal URL
    pub fn parse(raw: &str) -> MirrorResult<Self> {
        Self::new(raw, false)
    }

    /// Parse a URL, recording whether it points outside the crawl root
    ///
    /// The scheme is optional and defaults to http. The domain is
    /// lower-cased, the remainder is split into `/`-delimited segments and a
    /// fragment, if any, is dropped.
    pub fn new(raw: &str, external: bool) -> MirrorResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MirrorError::url_parse(raw, "empty URL"));
        }

        let (https, rest) = if starts_with_ignore_case(trimmed, HTTPS_PREFIX) {
            (true, &trimmed[HTTPS_PREFIX.len()..])
        } else if starts_with_ignore_case(trimmed, HTTP_PREFIX) {
            (false, &trimmed[HTTP_PREFIX.len()..])
        } else {
            if let Some(idx) = trimmed.find("://") {
                let scheme = &trimmed[..idx];
                if !scheme.contains(['/', '?']) {
                    return Err(MirrorError::url_parse(
                        raw,
                        format!("unsupported scheme '{}'", scheme),
                    ));
                }
            }
            (false, trimmed)
        };

        // Fragments never reach the server
        let rest = rest.split('#').next().unwrap_or_default();

        let domain_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let domain = rest[..domain_end].to_lowercase();
        let path = match rest[domain_end..].strip_prefix('/') {
            Some(path) => path,
            None => &rest[domain_end..],
        };

        validate_domain(raw, &domain)?;

        let mut url = Self {
            https,
            domain,
            segments: Vec::new(),
            external,
            trailing_slash: false,
        };
        url.add_path(path);

        Ok(url)
    }

    /// Append a path; a value starting with `/` replaces the whole path
    pub fn add_path(&mut self, path: &str) {
        let path = path.split('#').next().unwrap_or_default();

        self.trailing_slash = path.ends_with('/');

        let path = match path.strip_prefix('/') {
            Some(stripped) => {
                self.segments.clear();
                stripped
            }
            None => path,
        };

        self.segments.extend(path.split('/').map(String::from));
    }

    /// Resolve a link found in the document at this URL
    ///
    /// Root-relative links resolve against the domain, everything else
    /// against this document's directory. The result inherits the external
    /// flag because it lives on the same host.
    pub fn join(&self, link: &str) -> Self {
        let mut joined = Self {
            https: self.https,
            domain: self.domain.clone(),
            segments: Vec::new(),
            external: self.external,
            trailing_slash: false,
        };

        if !link.starts_with('/') {
            joined.segments = self.directory_segments().into_iter().map(String::from).collect();
        }

        joined.add_path(link);
        joined
    }

    /// Segments with `.`, empty and `..` levels resolved
    fn norm_segments(&self) -> Vec<&str> {
        let mut stack: Vec<&str> = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            match segment.as_str() {
                // Popping past the root is a no-op
                ".." => {
                    stack.pop();
                }
                "" | "." => {}
                level => stack.push(level),
            }
        }

        stack
    }

    /// Normalized segments without a trailing filename
    fn directory_segments(&self) -> Vec<&str> {
        let mut segments = self.norm_segments();
        if segments.last().map_or(false, |last| is_filename(last)) {
            segments.pop();
        }
        segments
    }

    /// Normalized path without the domain
    ///
    /// Every level is followed by `/` except a final level that looks like a
    /// filename (contains a dot).
    pub fn norm_file_path(&self) -> String {
        let segments = self.norm_segments();
        let mut path = segments.join("/");

        if let Some(last) = segments.last() {
            if !is_filename(last) {
                path.push('/');
            }
        }

        path
    }

    /// Full normalized URL, used as the identity of a resource
    pub fn norm_url(&self) -> String {
        format!("{}://{}/{}", self.scheme(), self.domain, self.norm_file_path())
    }

    /// Normalized path for the request line
    ///
    /// Same as `norm_file_path` but without the trailing slash when the
    /// original path had none.
    pub fn norm_url_path(&self) -> String {
        let mut path = self.norm_file_path();
        if !self.trailing_slash && path.ends_with('/') {
            path.pop();
        }
        path
    }

    /// Number of directory levels, not counting a trailing filename
    pub fn path_depth(&self) -> usize {
        self.directory_segments().len()
    }

    /// Whether the normalized path names a directory rather than a file
    pub fn is_directory(&self) -> bool {
        let path = self.norm_file_path();
        path.is_empty() || path.ends_with('/')
    }

    /// Lower-cased extension of the final path level, ignoring any query string
    pub fn extension(&self) -> Option<String> {
        let segments = self.norm_segments();
        let last = strip_query(segments.last()?);
        let (stem, extension) = last.rsplit_once('.')?;

        if stem.is_empty() && extension.is_empty() {
            return None;
        }

        Some(extension.to_lowercase())
    }

    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// Domain as given, including an explicit port
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Domain with a leading `www.` removed, for same-site comparison
    pub fn domain_norm(&self) -> &str {
        self.domain.strip_prefix("www.").unwrap_or(&self.domain)
    }

    /// Host name without the port
    pub fn host(&self) -> &str {
        split_host_port(&self.domain).0
    }

    /// Explicit port, if the domain carried one
    pub fn port(&self) -> Option<u16> {
        split_host_port(&self.domain).1.and_then(|port| port.parse().ok())
    }

    /// Port to connect to, falling back to the scheme default
    pub fn effective_port(&self) -> u16 {
        self.port().unwrap_or(if self.https { 443 } else { 80 })
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Only the transport may override this, when a redirect crosses domains
    pub fn set_external(&mut self, external: bool) {
        self.external = external;
    }
}

impl fmt::Display for UrlHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.norm_url())
    }
}

/// Drop everything from the first `?`
pub fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or_default()
}

fn is_filename(level: &str) -> bool {
    level.contains('.')
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn split_host_port(domain: &str) -> (&str, Option<&str>) {
    // Skip over the colons of a bracketed IPv6 literal
    let search_from = if domain.starts_with('[') {
        domain.find(']').unwrap_or(0)
    } else {
        0
    };

    match domain[search_from..].rfind(':') {
        Some(idx) => {
            let idx = search_from + idx;
            (&domain[..idx], Some(&domain[idx + 1..]))
        }
        None => (domain, None),
    }
}

fn validate_domain(raw: &str, domain: &str) -> MirrorResult<()> {
    if domain.is_empty() {
        return Err(MirrorError::url_parse(raw, "missing domain"));
    }

    let (host, port) = split_host_port(domain);

    if let Some(port) = port {
        if port.parse::<u16>().is_err() {
            return Err(MirrorError::url_parse(raw, format!("invalid port '{}'", port)));
        }
    }

    url::Host::parse(host)
        .map(|_| ())
        .map_err(|e| MirrorError::url_parse(raw, format!("invalid host '{}': {}", host, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_drops_trailing_slash_after_filename() {
        let url = UrlHandler::parse("https://www.google.com/index.html/").unwrap();

        assert!(url.is_https());
        assert!(!url.is_external());
        assert_eq!(url.domain(), "www.google.com");
        assert_eq!(url.domain_norm(), "google.com");
        assert_eq!(url.norm_url(), "https://www.google.com/index.html");
        assert_eq!(url.norm_url_path(), "index.html");
        assert_eq!(url.norm_file_path(), "index.html");
        assert_eq!(url.path_depth(), 0);
    }

    #[test]
    fn test_add_path_normalizes() {
        let mut url = UrlHandler::parse("https://www.google.com").unwrap();
        url.add_path("lorem//ipsum/./dolor/../../folder");

        assert_eq!(url.norm_url(), "https://www.google.com/lorem/folder/");
        assert_eq!(url.norm_url_path(), "lorem/folder");
        assert_eq!(url.norm_file_path(), "lorem/folder/");
        assert_eq!(url.path_depth(), 2);

        url.add_path("next/file.js");
        assert_eq!(url.norm_url_path(), "lorem/folder/next/file.js");
        assert_eq!(url.norm_file_path(), "lorem/folder/next/file.js");
        assert_eq!(url.path_depth(), 3);
    }

    #[test]
    fn test_pop_on_empty_path_is_noop() {
        let mut url = UrlHandler::parse("http://example.com").unwrap();
        url.add_path("..");
        assert_eq!(url.norm_url(), "http://example.com/");

        url.add_path("../../a/../../b.css");
        assert_eq!(url.norm_file_path(), "b.css");
    }

    #[test]
    fn test_path_depth_of_root_documents() {
        assert_eq!(UrlHandler::parse("https://x.com").unwrap().path_depth(), 0);
        assert_eq!(UrlHandler::parse("https://x.com/").unwrap().path_depth(), 0);
        assert_eq!(UrlHandler::parse("https://x.com/index.html").unwrap().path_depth(), 0);
        assert_eq!(UrlHandler::parse("https://x.com/a/b/c.png").unwrap().path_depth(), 2);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "https://Example.com/a/./b/../c/",
            "example.com/x//y/../../z.html",
            "http://example.com/../../deep/./file.tar.gz",
            "https://www.example.com/a/b?query=1",
        ];

        for input in inputs {
            let first = UrlHandler::parse(input).unwrap();
            let second = UrlHandler::parse(&first.norm_url()).unwrap();

            assert_eq!(first.norm_url(), second.norm_url(), "input: {}", input);
            assert!(
                !first.norm_file_path().split('/').any(|level| level == "." || level == ".."),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_scheme_and_domain_case() {
        let url = UrlHandler::parse("HTTPS://WWW.Example.COM/Path/Page.HTML").unwrap();
        assert!(url.is_https());
        assert_eq!(url.domain(), "www.example.com");
        assert_eq!(url.norm_file_path(), "Path/Page.HTML");
        assert_eq!(url.extension().as_deref(), Some("html"));

        let url = UrlHandler::parse("example.com/about").unwrap();
        assert!(!url.is_https());
        assert_eq!(url.norm_url(), "http://example.com/about/");
        assert_eq!(url.norm_url_path(), "about");
    }

    #[test]
    fn test_fragment_and_query() {
        let url = UrlHandler::parse("http://example.com/docs/page.php?id=2#top").unwrap();
        assert_eq!(url.norm_file_path(), "docs/page.php?id=2");
        assert_eq!(url.extension().as_deref(), Some("php"));

        let url = UrlHandler::parse("http://example.com?lang=en").unwrap();
        assert_eq!(url.domain(), "example.com");
        assert_eq!(url.norm_url_path(), "?lang=en");
    }

    #[test]
    fn test_ports() {
        let url = UrlHandler::parse("http://127.0.0.1:8080/index.html").unwrap();
        assert_eq!(url.host(), "127.0.0.1");
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.effective_port(), 8080);
        assert_eq!(url.domain(), "127.0.0.1:8080");

        assert_eq!(UrlHandler::parse("https://example.com").unwrap().effective_port(), 443);
        assert_eq!(UrlHandler::parse("example.com").unwrap().effective_port(), 80);
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let inputs = [
            "",
            "   ",
            "ftp://example.com",
            "http://",
            "http:///path",
            "http://exa mple.com",
            "http://example.com:99999",
        ];
        for input in inputs {
            assert!(
                matches!(UrlHandler::parse(input), Err(MirrorError::UrlParse { .. })),
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_join_relative_to_directory() {
        let page = UrlHandler::parse("https://example.com/blog/post.html").unwrap();

        let sibling = page.join("other.html");
        assert_eq!(sibling.norm_url(), "https://example.com/blog/other.html");

        let up = page.join("../img/logo.png");
        assert_eq!(up.norm_url(), "https://example.com/img/logo.png");

        let rooted = page.join("/css/site.css");
        assert_eq!(rooted.norm_url(), "https://example.com/css/site.css");

        let dir = UrlHandler::parse("https://example.com/blog/").unwrap();
        assert_eq!(dir.join("post.html").norm_url(), "https://example.com/blog/post.html");
    }

    #[test]
    fn test_join_keeps_external_flag() {
        let page = UrlHandler::new("https://cdn.example.org/lib/app.css", true).unwrap();
        let asset = page.join("fonts/a.woff2");

        assert!(asset.is_external());
        assert_eq!(asset.norm_url(), "https://cdn.example.org/lib/fonts/a.woff2");
    }

    #[test]
    fn test_directory_detection() {
        assert!(UrlHandler::parse("https://example.com").unwrap().is_directory());
        assert!(UrlHandler::parse("https://example.com/docs").unwrap().is_directory());
        assert!(!UrlHandler::parse("https://example.com/docs/a.html").unwrap().is_directory());
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("page.php?id=2"), "page.php");
        assert_eq!(strip_query("page.php"), "page.php");
        assert_eq!(strip_query("?x"), "");
    }
}
