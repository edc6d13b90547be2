mod http;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use podcast_core::client::BackendClient;
use podcast_core::{DropReason, PollerEvent, Session};
use podcast_proto::config::Config;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Headless podcast client: polls backend jobs and keeps the playlist.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Batch numbers to start watching immediately.
    batch_no: Vec<String>,

    /// Config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also log to stderr.
    #[arg(short, long)]
    verbose: bool,
}

// All store mutations happen on this one loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_logging(&config, args.verbose)?;
    info!("Config loaded from: {:?}", args.config.clone().unwrap_or_else(Config::config_path));

    let client = Arc::new(BackendClient::new(&config.remote)?);
    let session = Session::new(&config.poller, client.clone());

    let _watcher = spawn_event_logger(&session);

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            http::HttpState {
                session: session.clone(),
                merger: client,
                language: config.daemon.language.clone(),
            },
        );
    }

    for batch_no in args.batch_no {
        session.poller.enqueue(batch_no);
    }

    info!(
        "Daemon initialised, polling {} every {}s",
        config.remote.host, config.poller.interval_secs
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    session.shutdown();

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let log_path = &config.daemon.log_file;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = verbose.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,podcast_daemon=debug,podcast_core=debug",
                )
            }),
        )
        .init();

    eprintln!("podcast-daemon log: {}", log_path.display());
    Ok(())
}

/// Surface poller outcomes in the log.  Abandoned jobs are otherwise silent.
fn spawn_event_logger(session: &Session) -> tokio::task::JoinHandle<()> {
    let mut events = session.poller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PollerEvent::Delivered { batch_no, stage_id }) => {
                    info!("{} delivered audio (stage {})", batch_no, stage_id);
                }
                Ok(PollerEvent::Dropped { batch_no, reason }) => match reason {
                    DropReason::RetriesExhausted => {
                        warn!("{} abandoned: still unfinished after max retries", batch_no)
                    }
                    DropReason::TaskFailed | DropReason::StageFailed => {
                        warn!("{} failed on the backend ({:?})", batch_no, reason)
                    }
                },
                Ok(other) => debug!("poller event: {:?}", other),
                Err(RecvError::Lagged(n)) => warn!("event logger lagged, skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
