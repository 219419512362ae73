use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::config::MirrorConfig;
use crate::cli::CrawlArgs;
use crate::crawler::MirrorController;
use crate::utils::logging::{Logger, TracingLogger};

/// Mirror a website
pub async fn crawl(args: CrawlArgs) -> Result<()> {
    let mut config =
        MirrorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Override configuration with command line parameters if provided
    args.apply(&mut config);

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let controller = MirrorController::new(config.clone(), logger)
        .context(format!("Failed to start mirror of {}", config.url))?;

    let stats = controller
        .run()
        .await
        .context(format!("Failed to prepare output directory: {}", config.output.display()))?;

    if stats.saved == 0 {
        warn!("Nothing was mirrored from {}", config.url);
    }

    info!("Mirror written to: {}", config.output.display());

    Ok(())
}

/// Print the effective configuration, optionally storing it as the default
pub fn show_config(path: Option<&Path>, save: bool) -> Result<()> {
    let config = MirrorConfig::load(path).context("Failed to load configuration")?;

    if save {
        let saved = config.save_as_default()?;
        info!("Configuration saved to: {}", saved.display());
    }

    print!("{}", config.to_yaml()?);

    Ok(())
}
