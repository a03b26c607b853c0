use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod errors;
mod http;
mod restore;
mod shared;

use crate::config::Config;
use crate::errors::RestoreServiceError;
use crate::restore::RestorePipeline;
use crate::shared::commands::RestoreRequest;
use crate::shared::display::DisplayFormatter;
use crate::shared::executor::TokioProcessExecutor;
use crate::shared::storage::LocalUploadStore;

#[derive(Parser)]
#[command(name = "onehub-restore-service")]
#[command(about = "HTTP service that restores database dumps through an external restore tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listen address (otherwise ONEHUB_BIND_ADDR)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Run a single restore locally and print the outcome
    Restore {
        /// Dump path or identifier passed to the restore tool
        #[arg(short, long)]
        dump: String,
        /// Target namespace
        #[arg(short, long)]
        namespace: Option<String>,
        /// Optional restore target
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Generate sample .env file
    Init,
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard, RestoreServiceError> {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

    // Create logs directory if it doesn't exist
    std::fs::create_dir_all("./logs")?;

    let file_appender = rolling::daily("./logs", "onehub-restore.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking))
        .with_env_filter(env_filter)
        .init();

    Ok(guard)
}

async fn build_pipeline(config: Config) -> Result<RestorePipeline, RestoreServiceError> {
    let store = LocalUploadStore::open(&config.upload_dir).await?;
    Ok(RestorePipeline::new(
        Arc::new(config),
        Arc::new(TokioProcessExecutor::default()),
        Arc::new(store),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging first; the guard flushes the file writer on exit
    let _log_guard = init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => {
            let config = Config::load()?;
            let addr = bind.unwrap_or(config.bind_addr);
            info!(config = %serde_json::to_string(&config)?, "Loaded configuration");
            if config.api_key.is_none() {
                warn!("ONEHUB_API_KEY not set, /internal/restore is unauthenticated");
            }

            let pipeline = build_pipeline(config).await?;
            http::ApiServer::new(pipeline).serve(addr).await?;
        }
        Commands::Restore {
            dump,
            namespace,
            target,
        } => {
            let config = Config::load()?;
            let pipeline = build_pipeline(config).await?;
            let request = RestoreRequest::new(dump, namespace, target);

            let pb = shared::ui::create_restore_spinner(&request.dump_reference)?;
            let result = pipeline.restore(&request).await;
            pb.finish_and_clear();

            match result {
                Ok(outcome) => DisplayFormatter::display_restore_outcome(&outcome)?,
                Err(e) => {
                    DisplayFormatter::display_restore_failure(&e)?;
                    return Err(e.into());
                }
            }
        }
        Commands::Init => {
            init_env_file()?;
        }
    }

    Ok(())
}

fn init_env_file() -> Result<(), RestoreServiceError> {
    use std::fs;
    use std::path::Path;

    let env_file = ".env";
    if Path::new(env_file).exists() {
        warn!(file = %env_file, ".env file already exists, not overwriting");
        return Ok(());
    }

    let content = r#"# OneHub Restore Service Configuration
# All values are optional; defaults are shown.

# Project root, used as the restore tool's working directory
# ONEHUB_BASE_DIR=/srv/onehub

# Restore tool script (also served at GET /onehub.sh)
# ONEHUB_SCRIPT_FILE=/srv/onehub/restore_demo.sh

# Program used to run the script; leave empty to execute it directly
# ONEHUB_SCRIPT_INTERPRETER=bash

# Where uploaded dumps are stored
# ONEHUB_UPLOAD_DIR=/srv/onehub/backend/uploads

# Shared secret for POST /internal/restore (X-API-Key header)
ONEHUB_API_KEY=change_me

# Listen address
# ONEHUB_BIND_ADDR=0.0.0.0:8000

# Per-restore time budget in seconds
# ONEHUB_RESTORE_TIMEOUT_SECS=600

# Maximum upload size in bytes
# ONEHUB_MAX_UPLOAD_BYTES=1073741824
"#;

    fs::write(env_file, content)?;
    info!(file = %env_file, "Created sample .env file, please edit with your actual values");

    Ok(())
}
