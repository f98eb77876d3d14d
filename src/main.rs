use std::sync::Arc;

use diagsearch::cli::{Cli, Commands};
use diagsearch::config::Config;
use diagsearch::registry::ModelRegistry;
use diagsearch::service::SearchService;
use diagsearch::store::FsModelStore;
use diagsearch::sync::ModelSyncWatcher;
use diagsearch::Result;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| diagsearch::DiagSearchError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    runtime.block_on(run(cli.command, config))
}

async fn run(command: Commands, config: Config) -> Result<()> {
    let store = Arc::new(FsModelStore::new(config.store_root()));
    let registry = Arc::new(ModelRegistry::new(
        store.clone(),
        config.registry_settings(),
    ));
    let service = SearchService::new(registry.clone(), &config);

    match command {
        Commands::Query { tenant, text } => {
            let response = service.query_detectors(&tenant, &text).await?;
            println!("{}", serde_json::to_string_pretty(&response).unwrap());
        }
        Commands::Utterances {
            tenant,
            description,
            existing,
        } => {
            let response = service
                .query_utterances(&tenant, &description, existing)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response).unwrap());
        }
        Commands::Refresh { tenant } => {
            println!("{} - {}", tenant, service.refresh(&tenant).await);
        }
        Commands::Evict { tenant } => {
            service.evict(&tenant).await;
            println!("{tenant} - Evicted");
        }
        Commands::Watch => {
            if !config.sync.enabled {
                tracing::warn!("Model sync is disabled in configuration");
                return Ok(());
            }
            let watcher = Arc::new(ModelSyncWatcher::new(
                registry,
                store,
                config.sync.tenants.clone(),
                config.sync_interval(),
            ));
            tracing::info!(
                "Starting model sync for {}",
                config.sync.tenants.join(",")
            );
            let handle = watcher.clone().spawn();
            watcher.wait_until_ready().await;
            tracing::info!("Initial model sync complete, watching for new versions");
            handle.await.map_err(anyhow::Error::from)?;
        }
        Commands::Status => {
            for tenant in &config.sync.tenants {
                if let Err(e) = service.ensure_loaded(tenant).await {
                    tracing::warn!(tenant = %tenant, "Failed to load: {e}");
                }
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&service.statuses()).unwrap()
            );
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "diagsearch=debug"
    } else {
        "diagsearch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}
