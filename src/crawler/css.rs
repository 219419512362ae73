use regex::bytes::{Captures, Regex};
use std::sync::OnceLock;

use crate::crawler::links::{back_references, rewrite_root_relative, DiscoveredLinks, LinkKind};
use crate::crawler::task::CrawlTask;

const BANNER: &str = "

/*
 * Mirrored with site-mirror. Links were rewritten for offline browsing.
 */
";

fn url_function() -> &'static Regex {
    static URL_FUNCTION: OnceLock<Regex> = OnceLock::new();
    URL_FUNCTION.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*["']?([^"')\s]+)["']?\s*\)"#)
            .expect("hardcoded regex pattern is valid")
    })
}

fn import_rule() -> &'static Regex {
    static IMPORT_RULE: OnceLock<Regex> = OnceLock::new();
    IMPORT_RULE.get_or_init(|| {
        Regex::new(r#"(?i)@import\s+["']([^"';\s]+)["']"#)
            .expect("hardcoded regex pattern is valid")
    })
}

/// Extract `url()` and `@import` targets and rewrite root-relative ones
pub fn process(task: &CrawlTask) -> (Vec<u8>, DiscoveredLinks) {
    let prefix = back_references(task.url.path_depth());
    let mut links = DiscoveredLinks::default();

    let content = rewrite_group(url_function(), &task.content, &prefix, &mut links);
    let content = rewrite_group(import_rule(), &content, &prefix, &mut links);

    (content, links)
}

/// Replace capture group 1 of every match, keeping the rest of the match
fn rewrite_group(
    pattern: &Regex,
    content: &[u8],
    prefix: &str,
    links: &mut DiscoveredLinks,
) -> Vec<u8> {
    pattern
        .replace_all(content, |caps: &Captures| {
            let whole = match caps.get(0) {
                Some(whole) => whole,
                None => return Vec::new(),
            };
            let target = match caps.get(1) {
                Some(target) => target,
                None => return whole.as_bytes().to_vec(),
            };

            let value = match std::str::from_utf8(target.as_bytes()) {
                Ok(value) => value,
                Err(_) => return whole.as_bytes().to_vec(),
            };

            let replacement = match links.insert(value) {
                LinkKind::Relative => rewrite_root_relative(value, prefix),
                LinkKind::External | LinkKind::Ignored => None,
            };

            match replacement {
                Some(replacement) => {
                    let start = target.start() - whole.start();
                    let end = target.end() - whole.start();
                    let bytes = whole.as_bytes();

                    let mut output = Vec::with_capacity(bytes.len() + prefix.len());
                    output.extend_from_slice(&bytes[..start]);
                    output.extend_from_slice(replacement.as_bytes());
                    output.extend_from_slice(&bytes[end..]);
                    output
                }
                None => whole.as_bytes().to_vec(),
            }
        })
        .into_owned()
}

pub fn append_banner(content: &mut Vec<u8>) {
    content.extend_from_slice(BANNER.as_bytes());
}
