use regex::bytes::{NoExpand, Regex};
use std::collections::BTreeSet;

/// How a reference found in a document is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Same host; root-relative or relative to the document's directory
    Relative,
    /// Absolute http(s) reference
    External,
    /// Never fetched: data URIs, script, mail and phone links, fragments,
    /// protocol-relative and non-http schemes
    Ignored,
}

const IGNORED_PREFIXES: [&str; 5] = ["data:", "tel:", "javascript:", "mailto:", "//"];

pub fn classify_link(value: &str) -> LinkKind {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return LinkKind::Ignored;
    }

    let lower = value.get(..12).unwrap_or(value).to_ascii_lowercase();
    if IGNORED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return LinkKind::Ignored;
    }

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return LinkKind::External;
    }

    // Any other scheme, e.g. ftp:// or about:blank
    if has_scheme(value) {
        return LinkKind::Ignored;
    }

    LinkKind::Relative
}

fn has_scheme(value: &str) -> bool {
    match value.find(':') {
        Some(idx) => {
            let scheme = &value[..idx];
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && scheme.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

pub fn strip_fragment(value: &str) -> &str {
    value.split('#').next().unwrap_or_default()
}

/// Deduplicated references found in one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredLinks {
    pub relative: BTreeSet<String>,
    pub external: BTreeSet<String>,
}

impl DiscoveredLinks {
    /// Record a reference, returning how it was classified
    ///
    /// The fragment is dropped so `a.html#top` and `a.html` are one link.
    pub fn insert(&mut self, value: &str) -> LinkKind {
        let kind = classify_link(value);
        let link = strip_fragment(value.trim());

        if link.is_empty() {
            return LinkKind::Ignored;
        }

        match kind {
            LinkKind::Relative => {
                self.relative.insert(link.to_string());
            }
            LinkKind::External => {
                self.external.insert(link.to_string());
            }
            LinkKind::Ignored => {}
        }

        kind
    }
}

/// `levels` repetitions of `../`
pub fn back_references(levels: usize) -> String {
    "../".repeat(levels)
}

/// Rewrite a root-relative value against a back-reference prefix
///
/// Returns `None` for anything that is not root-relative. A bare `/`
/// points at the root's `index.html`.
pub fn rewrite_root_relative(value: &str, prefix: &str) -> Option<String> {
    let rest = value.strip_prefix('/')?;
    if rest.starts_with('/') {
        return None;
    }

    if rest.is_empty() || rest.starts_with(['?', '#']) {
        return Some(format!("{}index.html{}", prefix, rest));
    }

    Some(format!("{}{}", prefix, rest))
}

/// Replace every literal occurrence of `needle`
pub fn replace_literal(content: &[u8], needle: &str, replacement: &str) -> Vec<u8> {
    if needle.is_empty() {
        return content.to_vec();
    }

    match Regex::new(&regex::escape(needle)) {
        Ok(pattern) => pattern
            .replace_all(content, NoExpand(replacement.as_bytes()))
            .into_owned(),
        Err(_) => content.to_vec(),
    }
}

/// Apply literal rewrites, longest reference first
///
/// A reference that is a prefix of another must not clobber the longer one.
pub fn apply_rewrites(content: &[u8], rewrites: &[(String, String)]) -> Vec<u8> {
    let mut ordered: Vec<&(String, String)> = rewrites.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    let mut output = content.to_vec();
    for (from, to) in ordered {
        output = replace_literal(&output, from, to);
    }
    output
}
