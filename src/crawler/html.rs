use regex::bytes::{Captures, Regex};
use std::sync::OnceLock;

use crate::crawler::links::{back_references, rewrite_root_relative, DiscoveredLinks, LinkKind};
use crate::crawler::scheduler::LinkScheduler;
use crate::crawler::task::CrawlTask;

const BANNER: &str = "

<!--
  Mirrored with site-mirror. Links were rewritten for offline browsing.
-->
";

fn link_attribute() -> &'static Regex {
    static LINK_ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    LINK_ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"(?i)\b(srcset|src|href)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
            .expect("hardcoded regex pattern is valid")
    })
}

/// Extract links from an HTML document and rewrite its root-relative ones
///
/// Root-relative values get enough `../` to reach the document's domain
/// root inside the mirror. Images kept remote are turned into absolute
/// URLs and not reported as links.
pub fn process(task: &CrawlTask, scheduler: &LinkScheduler) -> (Vec<u8>, DiscoveredLinks) {
    let prefix = back_references(task.url.path_depth());
    let mut links = DiscoveredLinks::default();

    let rewritten = link_attribute().replace_all(&task.content, |caps: &Captures| {
        let (quote, raw) = match (caps.get(3), caps.get(4)) {
            (Some(value), _) => ('"', value.as_bytes()),
            (None, Some(value)) => ('\'', value.as_bytes()),
            (None, None) => return caps[0].to_vec(),
        };

        let value = match std::str::from_utf8(raw) {
            Ok(value) => value,
            Err(_) => return caps[0].to_vec(),
        };

        let is_srcset = caps[1].eq_ignore_ascii_case(b"srcset");
        let new_value = if is_srcset && !value.trim_start().starts_with("data:") {
            rewrite_srcset(value, |candidate| {
                visit(candidate, task, scheduler, &prefix, &mut links)
            })
        } else {
            visit(value, task, scheduler, &prefix, &mut links)
        };

        let mut attribute = Vec::with_capacity(caps[0].len() + prefix.len());
        attribute.extend_from_slice(&caps[1]);
        attribute.extend_from_slice(&caps[2]);
        attribute.push(quote as u8);
        attribute.extend_from_slice(new_value.as_bytes());
        attribute.push(quote as u8);
        attribute
    });

    (rewritten.into_owned(), links)
}

/// Record one attribute value and return its replacement
fn visit(
    value: &str,
    task: &CrawlTask,
    scheduler: &LinkScheduler,
    prefix: &str,
    links: &mut DiscoveredLinks,
) -> String {
    let trimmed = value.trim();

    let mut found = DiscoveredLinks::default();
    match found.insert(trimmed) {
        LinkKind::Relative => {
            let target = task.url.join(trimmed.split('#').next().unwrap_or_default());
            if scheduler.keeps_remote(&target) {
                return target.norm_url();
            }

            links.relative.extend(found.relative);
            rewrite_root_relative(trimmed, prefix).unwrap_or_else(|| value.to_string())
        }
        LinkKind::External => {
            links.external.extend(found.external);
            value.to_string()
        }
        LinkKind::Ignored => value.to_string(),
    }
}

/// Apply `rewrite` to the URL of every `srcset` candidate, keeping descriptors
fn rewrite_srcset<F>(value: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> String,
{
    value
        .split(',')
        .map(|candidate| {
            let start = candidate.len() - candidate.trim_start().len();
            let url_end = candidate[start..]
                .find(char::is_whitespace)
                .map_or(candidate.len(), |end| start + end);

            if start == url_end {
                return candidate.to_string();
            }

            format!(
                "{}{}{}",
                &candidate[..start],
                rewrite(&candidate[start..url_end]),
                &candidate[url_end..]
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn append_banner(content: &mut Vec<u8>) {
    content.extend_from_slice(BANNER.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::MirrorConfig;
    use crate::urls::UrlHandler;
    use crate::utils::logging::{Logger, MockLogger};
    use std::sync::Arc;

    fn scheduler(config: &MirrorConfig) -> LinkScheduler {
        let mut logger = MockLogger::new();
        logger.expect_log().returning(|_, _| ());
        let logger: Arc<dyn Logger> = Arc::new(logger);
        LinkScheduler::new(config, UrlHandler::parse(&config.url).unwrap(), logger)
    }

    fn task(url: &str, html: &str) -> CrawlTask {
        let mut task = CrawlTask::new(UrlHandler::parse(url).unwrap(), 1);
        task.content = html.as_bytes().to_vec();
        task
    }

    fn config() -> MirrorConfig {
        MirrorConfig {
            url: "https://example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_root_relative_values_are_rewritten() {
        let task = task(
            "https://example.com/blog/2024/post.html",
            concat!(
                r#"<link href="/css/site.css"><img SRC='/img/a.png'>"#,
                r#"<a href="other.html">x</a><a href="/">home</a>"#,
            ),
        );

        let (content, links) = process(&task, &scheduler(&config()));

        assert_eq!(
            String::from_utf8(content).unwrap(),
            concat!(
                r#"<link href="../../css/site.css"><img SRC='../../img/a.png'>"#,
                r#"<a href="other.html">x</a><a href="../../index.html">home</a>"#,
            )
        );
        assert_eq!(links.relative.len(), 4);
        assert!(links.relative.contains("/css/site.css"));
        assert!(links.relative.contains("other.html"));
    }

    #[test]
    fn test_ignored_and_external_values() {
        let task = task(
            "https://example.com/",
            r##"<a href="mailto:a@b.org"></a><a href="tel:123"></a><a href="javascript:void(0)"></a>
            <img src="data:image/gif;base64,R0lGOD"><script src="//cdn.other.org/x.js"></script>
            <a href="#top"></a><a href="https://other.org/page.html#frag"></a>"##,
        );

        let (content, links) = process(&task, &scheduler(&config()));

        assert_eq!(content, task.content);
        assert!(links.relative.is_empty());
        assert_eq!(links.external.len(), 1);
        assert!(links.external.contains("https://other.org/page.html"));
    }

    #[test]
    fn test_srcset_candidates() {
        let task = task(
            "https://example.com/gallery/index.html",
            r#"<img srcset="/img/a-1x.png 1x, b-2x.png 2x,https://cdn.other.org/c.png 3x">"#,
        );

        let (content, links) = process(&task, &scheduler(&config()));

        assert_eq!(
            String::from_utf8(content).unwrap(),
            r#"<img srcset="../img/a-1x.png 1x, b-2x.png 2x,https://cdn.other.org/c.png 3x">"#
        );
        assert!(links.relative.contains("/img/a-1x.png"));
        assert!(links.relative.contains("b-2x.png"));
        assert!(links.external.contains("https://cdn.other.org/c.png"));
    }

    #[test]
    fn test_remote_images_become_absolute() {
        let config = MirrorConfig {
            remote_images: true,
            ..config()
        };
        let task = task(
            "https://example.com/blog/post.html",
            r#"<img src="/img/a.png"><img src="b.jpg"><a href="next.html"></a>"#,
        );

        let (content, links) = process(&task, &scheduler(&config));

        assert_eq!(
            String::from_utf8(content).unwrap(),
            concat!(
                r#"<img src="https://example.com/img/a.png">"#,
                r#"<img src="https://example.com/blog/b.jpg"><a href="next.html"></a>"#,
            )
        );
        assert_eq!(links.relative.len(), 1);
        assert!(links.relative.contains("next.html"));
    }

    #[test]
    fn test_non_utf8_body_is_preserved() {
        let mut task = task("https://example.com/", "");
        task.content = b"<p>\xff\xfe</p><a href=\"/a.html\">".to_vec();

        let (content, links) = process(&task, &scheduler(&config()));

        assert_eq!(content, b"<p>\xff\xfe</p><a href=\"a.html\">".to_vec());
        assert!(links.relative.contains("/a.html"));
    }

    #[test]
    fn test_banner() {
        let mut content = b"<html></html>".to_vec();
        append_banner(&mut content);
        let text = String::from_utf8(content).unwrap();
        assert!(text.starts_with("<html></html>"));
        assert!(text.trim_end().ends_with("-->"));
    }
}
