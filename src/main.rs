use anyhow::Result;
use tracing::{debug, error};

mod cli;
mod crawler;
mod error;
mod storage;
mod transport;
mod urls;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Initialize logging
    let log_file = args
        .log_file
        .clone()
        .map(|path| path.unwrap_or_else(utils::default_log_file));
    utils::init_logging(args.verbose, args.quiet, log_file)?;

    debug!("site-mirror v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}
