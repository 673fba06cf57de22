use anyhow::Context;
use clap::Parser;
use mention_notifier::{
    build_registry, DedupStore, FailurePolicy, Fetcher, LogFormat, Notifier, Orchestrator, RunConfig, SeenStore,
    SlackNotifier,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = RunConfig::parse();
    init_tracing(config.log_format);

    let config = match config.validate() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    config.log_summary();

    let store = SeenStore::open(&config.database_file)
        .await
        .with_context(|| format!("opening database {}", config.database_file))?;
    let store = Arc::new(store);

    let fetcher = Fetcher::new(&config.fetch_config())?;
    let notifier: Arc<dyn Notifier> = Arc::new(SlackNotifier::from_config(&config, fetcher.client().clone())?);

    let policy = if config.isolate_sources {
        FailurePolicy::Isolate
    } else {
        FailurePolicy::FailFast
    };
    let registry = build_registry(&config, fetcher);
    let orchestrator = Orchestrator::new(registry, store.clone() as Arc<dyn DedupStore>, notifier, policy);

    let result = orchestrator.run(|name| config.source_enabled(name)).await;
    store.close().await;

    match result {
        Ok(report) => {
            let totals = report.totals();
            info!(
                run_id = %report.run_id,
                inserted_count = totals.inserted,
                notified_count = totals.notified,
                "All sources done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            Err(e.into())
        }
    }
}
