pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::cli::config::MirrorConfig;

#[derive(Parser)]
#[command(name = "mirror", author, version, about, long_about = None)]
pub struct Cli {
    /// Log every request and rewrite
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write the log to a file; without a path the default location is used
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a website into a local directory
    Crawl(CrawlArgs),

    /// Show the effective configuration
    Config {
        /// Configuration file to read instead of the default one
        #[arg(long)]
        config: Option<PathBuf>,

        /// Store the shown configuration as the new default
        #[arg(long)]
        save: bool,
    },
}

/// Command line overrides for a mirroring run
#[derive(Args, Debug, Default)]
pub struct CrawlArgs {
    /// Root URL to mirror
    #[arg(required = true)]
    pub url: String,

    /// Maximum recursion depth
    #[arg(short, long)]
    pub depth: Option<u32>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Comma separated external domains to follow
    #[arg(short, long)]
    pub limit: Option<String>,

    /// Do not follow external links
    #[arg(short, long)]
    pub remote: bool,

    /// Keep images on their original host
    #[arg(short = 'R', long)]
    pub remote_images: bool,

    /// Write a placeholder page for links beyond the depth limit
    #[arg(short, long)]
    pub error_page: bool,

    /// Cookie header sent with every request
    #[arg(short, long = "cookie")]
    pub cookies: Option<String>,

    /// User-Agent header sent with every request
    #[arg(short, long)]
    pub user_agent: Option<String>,

    /// Additional PEM certificate file or directory
    #[arg(long)]
    pub cert_store: Option<PathBuf>,

    /// Do not append the generator comment to documents
    #[arg(long)]
    pub no_banner: bool,

    /// Configuration file to read instead of the default one
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CrawlArgs {
    /// Override configuration values given on the command line
    pub fn apply(&self, config: &mut MirrorConfig) {
        config.url = self.url.clone();

        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(limit) = &self.limit {
            config.limit = limit.clone();
        }
        if let Some(cookies) = &self.cookies {
            config.cookies = cookies.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(cert_store) = &self.cert_store {
            config.cert_store = Some(cert_store.clone());
        }

        config.remote |= self.remote;
        config.remote_images |= self.remote_images;
        config.error_page |= self.error_page;
        if self.no_banner {
            config.advertisement = false;
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crawl(args) => {
            info!("Starting mirror of {}", args.url);
            commands::crawl(args).await
        }
        Commands::Config { config, save } => commands::show_config(config.as_deref(), save),
    }
}
