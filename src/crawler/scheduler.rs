use std::collections::HashSet;
use std::sync::Arc;

use crate::cli::config::MirrorConfig;
use crate::crawler::links::{back_references, DiscoveredLinks};
use crate::crawler::task::{CrawlTask, TaskKind};
use crate::urls::UrlHandler;
use crate::utils::logging::{LogLevel, Logger};

const IMAGE_EXTENSIONS: [&str; 11] = [
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "avif", "tif", "tiff",
];

/// Children and rewrites derived from one document's links
#[derive(Debug, Default)]
pub struct LinkPlan {
    /// Tasks to run after the document is saved, in discovery order
    pub children: Vec<CrawlTask>,

    /// Literal replacements of external references with mirror paths
    pub rewrites: Vec<(String, String)>,
}

/// Decides which discovered links become crawl tasks
pub struct LinkScheduler {
    /// Crawl root, for self-domain detection
    root: UrlHandler,

    max_depth: u32,

    /// Skip all external links
    remote: bool,

    /// Leave image links pointing at their original host
    remote_images: bool,

    /// Allowed external domains (if empty, any domain is allowed)
    allowed_domains: HashSet<String>,

    logger: Arc<dyn Logger>,
}

impl LinkScheduler {
    pub fn new(config: &MirrorConfig, root: UrlHandler, logger: Arc<dyn Logger>) -> Self {
        Self {
            root,
            max_depth: config.depth,
            remote: config.remote,
            remote_images: config.remote_images,
            allowed_domains: config.limit_domains().into_iter().collect(),
            logger,
        }
    }

    /// Whether a link stays pointing at its host instead of being mirrored
    pub fn keeps_remote(&self, target: &UrlHandler) -> bool {
        self.remote_images
            && target
                .extension()
                .map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Determine if an external URL should be followed
    pub fn should_follow_external(&self, target: &UrlHandler) -> bool {
        if self.remote {
            return false;
        }

        // Absolute links back into the mirrored site
        if target.domain_norm() == self.root.domain_norm() {
            self.logger.log(
                LogLevel::Verbose,
                &format!("Skipping self reference: {}", target),
            );
            return false;
        }

        if !self.allowed_domains.is_empty()
            && !self.allowed_domains.contains(target.domain())
            && !self.allowed_domains.contains(target.domain_norm())
        {
            self.logger.log(
                LogLevel::Info,
                &format!("Skipping link due to limit: {}", target),
            );
            return false;
        }

        true
    }

    /// Turn a document's links into child tasks
    ///
    /// Relative links run at `relative_depth`, external ones always one
    /// level below the document. An external reference is only rewritten
    /// when its target is within the depth limit. Images are only left
    /// remote for HTML documents, stylesheets always get theirs mirrored.
    pub fn plan(&self, doc: &CrawlTask, links: &DiscoveredLinks, relative_depth: u32) -> LinkPlan {
        let mut plan = LinkPlan::default();
        let skip_images = doc.kind == TaskKind::Html;

        for link in &links.relative {
            let target = doc.url.join(link);
            if skip_images && self.keeps_remote(&target) {
                continue;
            }

            self.logger.log(
                LogLevel::Verbose,
                &format!("Next relative file: {} | (depth {})", target, relative_depth),
            );
            plan.children.push(CrawlTask::new(target, relative_depth));
        }

        if self.remote {
            return plan;
        }

        let external_depth = doc.depth + 1;
        let prefix = back_references(doc.mirror_depth());

        for link in &links.external {
            let target = match UrlHandler::new(link, true) {
                Ok(target) => target,
                Err(e) => {
                    self.logger.log(
                        LogLevel::Verbose,
                        &format!("Skipping unparsable link: {}", e),
                    );
                    continue;
                }
            };

            if (skip_images && self.keeps_remote(&target))
                || !self.should_follow_external(&target)
            {
                continue;
            }

            let child = CrawlTask::new(target, external_depth);

            if external_depth <= self.max_depth {
                let local = format!("{}{}", prefix, slash_path(&child));
                self.logger.log(
                    LogLevel::Verbose,
                    &format!("Replacing '{}' with '{}'", link, local),
                );
                plan.rewrites.push((link.clone(), local));
            }

            self.logger.log(
                LogLevel::Verbose,
                &format!("Next external file: {} | (depth {})", child.url, external_depth),
            );
            plan.children.push(child);
        }

        plan
    }
}

/// Output path of a task with `/` separators, for use inside documents
fn slash_path(task: &CrawlTask) -> String {
    task.output_path()
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
