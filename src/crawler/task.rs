use std::path::PathBuf;

use crate::urls::{strip_query, UrlHandler};

/// Directory external hosts are mirrored under
pub const EXTERNAL_DIR: &str = "__external";

/// How a downloaded document is post-processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Stored as received
    Generic,
    /// Links in `src`, `href` and `srcset` are rewritten and followed
    Html,
    /// Links in `url()` and `@import` are rewritten and followed
    Css,
}

impl TaskKind {
    /// Classify a URL by its path, ignoring any query string
    pub fn classify(url: &UrlHandler) -> Self {
        if url.is_directory() {
            return TaskKind::Html;
        }

        match url.extension().as_deref() {
            Some("html") | Some("htm") | Some("php") => TaskKind::Html,
            Some("css") => TaskKind::Css,
            _ => TaskKind::Generic,
        }
    }

    /// Promote a generic task whose response turned out to be a document
    pub fn refine(self, mime_type: &str) -> Self {
        if self != TaskKind::Generic {
            return self;
        }

        match mime_type {
            "text/html" | "application/xhtml+xml" => TaskKind::Html,
            "text/css" => TaskKind::Css,
            _ => self,
        }
    }
}

/// Represents one URL waiting to be mirrored
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub kind: TaskKind,

    /// Current depth in the crawl tree (0 for the root document)
    pub depth: u32,

    pub url: UrlHandler,

    /// Directory of the output file, relative to the mirror root
    pub output_dir: PathBuf,

    pub filename: String,

    /// Body as fetched, then as rewritten
    pub content: Vec<u8>,
}

impl CrawlTask {
    pub fn new(url: UrlHandler, depth: u32) -> Self {
        let kind = TaskKind::classify(&url);
        Self::with_kind(url, depth, kind)
    }

    pub fn with_kind(url: UrlHandler, depth: u32, kind: TaskKind) -> Self {
        let (output_dir, filename) = output_location(&url);

        Self {
            kind,
            depth,
            url,
            output_dir,
            filename,
            content: Vec::new(),
        }
    }

    /// Output file relative to the mirror root
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.filename)
    }

    /// Directory levels between this document and the mirror root
    pub fn mirror_depth(&self) -> usize {
        self.output_dir.components().count()
    }
}

/// Where a URL is written inside the mirror
///
/// Same-site files keep their normalized path, external ones go under
/// `__external/<domain>/`. A path without a filename is saved as
/// `index.html`. Only the filename loses its query string; a query that
/// forms its own level (`blog/?page=2`) stays a directory, so the file
/// sits as deep as `UrlHandler::path_depth` says.
pub fn output_location(url: &UrlHandler) -> (PathBuf, String) {
    let path = url.norm_file_path();

    let (dir, filename) = if url.is_directory() {
        (path.trim_end_matches('/'), "")
    } else {
        path.rsplit_once('/').unwrap_or(("", path.as_str()))
    };
    let filename = strip_query(filename);

    let mut output_dir = PathBuf::new();
    if url.is_external() {
        output_dir.push(EXTERNAL_DIR);
        output_dir.push(url.domain());
    }
    output_dir.extend(dir.split('/').filter(|level| !level.is_empty()));

    let filename = if filename.is_empty() { "index.html" } else { filename };

    (output_dir, filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> UrlHandler {
        UrlHandler::parse(raw).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(TaskKind::classify(&url("https://x.com")), TaskKind::Html);
        assert_eq!(TaskKind::classify(&url("https://x.com/docs/")), TaskKind::Html);
        assert_eq!(TaskKind::classify(&url("https://x.com/a.HTML")), TaskKind::Html);
        assert_eq!(TaskKind::classify(&url("https://x.com/page.php?id=2")), TaskKind::Html);
        assert_eq!(TaskKind::classify(&url("https://x.com/css/site.css")), TaskKind::Css);
        assert_eq!(TaskKind::classify(&url("https://x.com/app.js")), TaskKind::Generic);
        assert_eq!(TaskKind::classify(&url("https://x.com/logo.png?v=3")), TaskKind::Generic);
    }

    #[test]
    fn test_refine_by_content_type() {
        assert_eq!(TaskKind::Generic.refine("text/html"), TaskKind::Html);
        assert_eq!(TaskKind::Generic.refine("text/css"), TaskKind::Css);
        assert_eq!(TaskKind::Generic.refine("image/png"), TaskKind::Generic);
        assert_eq!(TaskKind::Css.refine("text/html"), TaskKind::Css);
    }

    #[test]
    fn test_output_location_same_site() {
        let task = CrawlTask::new(url("https://x.com/blog/post.html"), 1);
        assert_eq!(task.output_dir, PathBuf::from("blog"));
        assert_eq!(task.filename, "post.html");
        assert_eq!(task.output_path(), PathBuf::from("blog/post.html"));
        assert_eq!(task.mirror_depth(), 1);

        let root = CrawlTask::new(url("https://x.com"), 0);
        assert_eq!(root.output_path(), PathBuf::from("index.html"));
        assert_eq!(root.mirror_depth(), 0);

        let dir = CrawlTask::new(url("https://x.com/docs/guide"), 1);
        assert_eq!(dir.output_path(), PathBuf::from("docs/guide/index.html"));
    }

    #[test]
    fn test_output_location_strips_query_from_filename() {
        let task = CrawlTask::new(url("https://x.com/lib/page.php?id=2&x=y"), 1);
        assert_eq!(task.output_path(), PathBuf::from("lib/page.php"));

        let task = CrawlTask::new(url("https://x.com/img/?v=1.2"), 1);
        assert_eq!(task.output_path(), PathBuf::from("img/index.html"));
    }

    #[test]
    fn test_output_location_keeps_query_levels() {
        let page = CrawlTask::new(url("https://x.com/blog/?page=2"), 1);
        assert_eq!(page.output_path(), PathBuf::from("blog/?page=2/index.html"));
        assert_eq!(page.mirror_depth(), page.url.path_depth());

        let blog = CrawlTask::new(url("https://x.com/blog/"), 1);
        assert_ne!(blog.output_path(), page.output_path());

        let search = CrawlTask::new(url("https://x.com/search?q=a"), 1);
        assert_eq!(search.output_path(), PathBuf::from("search?q=a/index.html"));
        assert_eq!(search.mirror_depth(), search.url.path_depth());
    }

    #[test]
    fn test_output_location_external() {
        let external = UrlHandler::new("https://cdn.other.org/js/lib.js", true).unwrap();
        let task = CrawlTask::new(external, 1);

        assert_eq!(task.output_path(), PathBuf::from("__external/cdn.other.org/js/lib.js"));
        assert_eq!(task.mirror_depth(), 3);
    }
}
