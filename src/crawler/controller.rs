use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::config::MirrorConfig;
use crate::crawler::links::apply_rewrites;
use crate::crawler::scheduler::LinkScheduler;
use crate::crawler::task::{CrawlTask, TaskKind};
use crate::crawler::{css, html};
use crate::error::{MirrorError, MirrorResult};
use crate::storage::{FilesystemStorage, MirrorStorage};
use crate::transport::{HttpsClient, Response, ResponseStatus};
use crate::urls::UrlHandler;
use crate::utils::logging::{LogLevel, Logger};
use crate::utils::metrics::{MirrorStats, RequestTimer};

/// Redirect hops followed before a link is given up
pub const MAX_REDIRECTS: usize = 20;

const ERROR_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>404 Not mirrored</title></head>
<body>
<h1>404 Not mirrored</h1>
<p>This page was beyond the depth limit of the mirror.</p>
</body>
</html>
"#;

/// Runs one mirroring job from the root URL down to the depth limit
pub struct MirrorController {
    config: Arc<MirrorConfig>,
    root: UrlHandler,
    client: HttpsClient,
    scheduler: LinkScheduler,
    storage: Arc<dyn MirrorStorage>,
    logger: Arc<dyn Logger>,

    /// Placeholder pages written this run, which a later fetch may replace
    error_pages: HashSet<PathBuf>,

    stats: MirrorStats,
}

impl MirrorController {
    /// Create a controller writing to `config.output`
    ///
    /// A missing or malformed root URL and an unusable certificate store
    /// are reported here, before anything is fetched.
    pub fn new(config: MirrorConfig, logger: Arc<dyn Logger>) -> MirrorResult<Self> {
        let storage: Arc<dyn MirrorStorage> =
            Arc::new(FilesystemStorage::new(config.output.clone()));
        Self::with_storage(config, storage, logger)
    }

    pub fn with_storage(
        config: MirrorConfig,
        storage: Arc<dyn MirrorStorage>,
        logger: Arc<dyn Logger>,
    ) -> MirrorResult<Self> {
        config.validate()?;
        let root = UrlHandler::parse(&config.url)?;
        let config = Arc::new(config);

        let client = HttpsClient::new(config.clone(), root.clone(), logger.clone())?;
        let scheduler = LinkScheduler::new(&config, root.clone(), logger.clone());

        Ok(Self {
            config,
            root,
            client,
            scheduler,
            storage,
            logger,
            error_pages: HashSet::new(),
            stats: MirrorStats::new(),
        })
    }

    /// Mirror the site depth-first and return the run statistics
    ///
    /// Only preparing the output root can fail the run; every per-link
    /// failure is logged and counted.
    pub async fn run(mut self) -> MirrorResult<MirrorStats> {
        self.storage.prepare().await?;

        self.logger.log(
            LogLevel::Info,
            &format!("Mirroring {} (depth {})", self.root, self.config.depth),
        );

        let mut stack = vec![CrawlTask::new(self.root.clone(), 0)];

        while let Some(task) = stack.pop() {
            let url = task.url.norm_url();

            match self.download(task).await {
                // Reversed so the first child is processed next
                Ok(children) => stack.extend(children.into_iter().rev()),
                Err(e) => {
                    self.stats.failed += 1;
                    self.logger.log(LogLevel::Error, &format!("Failed to mirror {}: {}", url, e));
                }
            }
        }

        self.logger.log(LogLevel::Info, &format!("Finished: {}", self.stats.summary()));

        Ok(self.stats)
    }

    /// Mirror a single task and return the tasks it discovered
    async fn download(&mut self, mut task: CrawlTask) -> MirrorResult<Vec<CrawlTask>> {
        if task.depth > self.config.depth {
            self.write_error_page(&task).await?;
            return Ok(Vec::new());
        }

        let output_path = task.output_path();
        if self.storage.exists(&output_path).await && !self.error_pages.remove(&output_path) {
            self.logger.log(
                LogLevel::Verbose,
                &format!("{} already exists, skipping!", output_path.display()),
            );
            self.stats.skipped += 1;
            return Ok(Vec::new());
        }

        self.logger.log(
            LogLevel::Verbose,
            &format!("Processing: {} | (depth {})", task.url, task.depth),
        );

        let response = self.fetch(&task.url).await?;

        let modified = response
            .last_modified
            .map(|date| date.to_rfc2822())
            .unwrap_or_else(|| "unknown".to_string());
        self.logger.log(
            LogLevel::Verbose,
            &format!(
                "{}: HTTP {}, {} bytes, type '{}', disposition '{}', modified {}",
                task.url,
                response.status_code,
                response.body.len(),
                response.content_type,
                response.content_disposition,
                modified
            ),
        );

        if response.status_code >= 400 {
            return Err(MirrorError::HttpStatus {
                url: task.url.norm_url(),
                code: response.status_code,
            });
        }

        task.kind = task.kind.refine(&response.mime_type());
        task.content = response.body;

        let children = match task.kind {
            TaskKind::Generic => Vec::new(),
            TaskKind::Html => {
                let (content, links) = html::process(&task, &self.scheduler);
                let plan = self.scheduler.plan(&task, &links, task.depth + 1);

                task.content = apply_rewrites(&content, &plan.rewrites);
                if self.config.advertisement {
                    html::append_banner(&mut task.content);
                }
                plan.children
            }
            TaskKind::Css => {
                let (content, links) = css::process(&task);
                // Stylesheet references do not consume recursion depth
                let plan = self.scheduler.plan(&task, &links, task.depth);

                task.content = apply_rewrites(&content, &plan.rewrites);
                if self.config.advertisement {
                    css::append_banner(&mut task.content);
                }
                plan.children
            }
        };

        let written = self
            .storage
            .store(&task.output_dir, &task.filename, &task.content)
            .await?;
        self.stats.record_saved(task.content.len());

        self.logger.log(
            LogLevel::Info,
            &format!("Saved {} ({} bytes)", written.display(), task.content.len()),
        );

        Ok(children)
    }

    /// Fetch a URL, following redirects up to `MAX_REDIRECTS` hops
    async fn fetch(&mut self, url: &UrlHandler) -> MirrorResult<Response> {
        let mut current = url.clone();

        for _ in 0..=MAX_REDIRECTS {
            let timer = RequestTimer::start();
            let response = self.client.get(&current).await;

            match response.status {
                ResponseStatus::Finished => {
                    self.stats.record_response(response.status_code, timer.end());
                    return Ok(response);
                }
                ResponseStatus::Moved => {
                    self.stats.record_response(response.status_code, timer.end());
                    self.stats.redirects += 1;

                    let next = response.moved_url.ok_or_else(|| MirrorError::ServerProtocol {
                        host: current.domain().to_string(),
                        reason: "redirect without target".to_string(),
                    })?;

                    self.logger.log(
                        LogLevel::Verbose,
                        &format!("{} moved to {}", current, next),
                    );
                    current = next;
                }
                status => {
                    return Err(response.error.unwrap_or_else(|| MirrorError::Connection {
                        host: current.domain().to_string(),
                        reason: format!("request ended in state {:?}", status),
                    }));
                }
            }
        }

        Err(MirrorError::Connection {
            host: url.domain().to_string(),
            reason: format!("more than {} redirects", MAX_REDIRECTS),
        })
    }

    /// Write the placeholder for a too-deep link, if enabled and nothing is there yet
    async fn write_error_page(&mut self, task: &CrawlTask) -> MirrorResult<()> {
        if !self.config.error_page || task.kind != TaskKind::Html || task.url.is_external() {
            self.logger.log(
                LogLevel::Verbose,
                &format!("Depth exceeded, skipping {}", task.url),
            );
            return Ok(());
        }

        let output_path = task.output_path();
        if self.storage.exists(&output_path).await {
            return Ok(());
        }

        self.storage
            .store(&task.output_dir, &task.filename, ERROR_PAGE.as_bytes())
            .await?;
        self.error_pages.insert(output_path);
        self.stats.error_pages += 1;
        self.stats.record_saved(ERROR_PAGE.len());

        self.logger.log(
            LogLevel::Verbose,
            &format!("Depth exceeded, wrote error page for {}", task.url),
        );

        Ok(())
    }
}
