use calendar_notify::abstractions::{
    GistContextStore, GistSettings, HttpCalendarSource, LineNotifyClient,
};
use calendar_notify::clock::{Clock, SystemClock};
use calendar_notify::{Config, ContextProcessor, Orchestrator, ReadFailurePolicy};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Send tomorrow's calendar reminder for every configured context
#[derive(Parser)]
#[command(name = "calendar-notify", version)]
#[command(about = "Send at most one calendar-driven notification per day per context", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// What to do when the context document cannot be read
    #[arg(long, value_enum)]
    on_read_failure: Option<ReadFailurePolicy>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    calendar_notify::logging::init(cli.verbose);

    debug!("calendar-notify started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let mut config = Config::from_env();
    if let Some(policy) = cli.on_read_failure {
        config.read_failure_policy = policy;
    }

    if let Err(e) = run(config).await {
        let kind = e
            .downcast_ref::<calendar_notify::Error>()
            .map_or("FatalError", calendar_notify::Error::kind);
        error!(severity = "CRITICAL", kind, "Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let store_id = config.store_id()?.to_string();

    let client = reqwest::Client::builder()
        .user_agent(concat!("calendar-notify/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(calendar_notify::Error::HttpClient)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = GistContextStore::new(
        client.clone(),
        GistSettings {
            api_base: config.store_api_base.clone(),
            gist_id: store_id,
            file_name: config.store_file.clone(),
            token: config.store_token.clone(),
        },
    );
    let calendar = HttpCalendarSource::new(client.clone(), clock.clone())
        .with_cache_window_ms(config.cache_window_ms);
    let notifier = LineNotifyClient::with_endpoint(client, config.notify_endpoint.clone());

    let processor = ContextProcessor::new(Arc::new(calendar), Arc::new(notifier), clock);
    let orchestrator = Orchestrator::new(Arc::new(store), processor)
        .with_read_failure_policy(config.read_failure_policy);

    orchestrator.run().await?;
    Ok(())
}
