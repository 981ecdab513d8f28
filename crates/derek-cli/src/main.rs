use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use derek_core::cache::QueryCache;
use derek_core::constants::{kinds, AUTHOR_PUBKEY_HEX, PUBLISH_TIMEOUT};
use derek_core::tracing_setup::init_tracing;
use derek_core::{
    ConfigStorage, ContentFeeds, CoreConfig, QueryFilter, Record, RelayConfig, RelayPool,
};

#[derive(Parser)]
#[command(name = "derek-cli")]
#[command(about = "Read Derek Ross's Nostr content through the relay pool")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Directory holding config.json (defaults to the platform config dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Primary relay for this run only
    #[arg(long, global = true)]
    relay: Option<String>,

    /// Read from every preset relay for this run only
    #[arg(long, global = true)]
    all_relays: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Author profile (kind:0)
    Profile,

    /// Top-level notes
    Notes,

    /// Notes and long-form articles
    Posts,

    /// Long-form articles; with --until, one page older than the cursor
    Articles {
        /// Only articles created at or before this unix time
        #[arg(long)]
        until: Option<u64>,

        /// Return one page of every article instead of the highlights
        #[arg(long)]
        paged: bool,
    },

    /// Photos from picture posts (kind:20)
    Photos,

    /// Calendar events (kind:31922/31923)
    Events,

    /// Published applications (kind:31990)
    Apps,

    /// Git repositories (kind:30617)
    Repos,

    /// Raw deletion requests (kind:5)
    Deletions,

    /// Show which relays a query (or a publish) would go to
    Route {
        /// Show publish targets for this signed event JSON file
        #[arg(long, value_name = "EVENT_FILE")]
        publish: Option<PathBuf>,
    },

    /// Show or change the stored relay configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Publish a pre-signed event JSON file
    Publish {
        file: PathBuf,
    },

    /// Run the notes feed and print per-relay counters
    Stats,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the stored config
    Show,

    /// Set the primary relay
    SetRelay {
        url: String,
    },

    /// Turn reading from every preset relay on or off
    AllRelays {
        state: Toggle,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let core = cli.data_dir.clone().map(CoreConfig::new).unwrap_or_default();
    let mut storage = ConfigStorage::new(&core);

    if let Commands::Config { action } = &cli.command {
        return run_config(&mut storage, action, cli.pretty);
    }

    let relay_config = effective_config(&storage.config, &cli);
    let pool = Arc::new(RelayPool::with_nostr(&relay_config));

    let result = run_pool_command(&cli, &pool).await;
    pool.close().await;
    result
}

/// Stored config with the per-run overrides applied
fn effective_config(stored: &RelayConfig, cli: &Cli) -> RelayConfig {
    let mut config = stored.clone();
    if let Some(relay) = &cli.relay {
        config.relay_url = relay.clone();
    }
    if cli.all_relays {
        config.use_all_relays = true;
    }
    config
}

async fn run_pool_command(cli: &Cli, pool: &Arc<RelayPool>) -> Result<()> {
    let cache = Arc::new(QueryCache::new());
    Arc::clone(&cache).listen(pool.subscribe_changes());
    let feeds = ContentFeeds::new(Arc::clone(pool), AUTHOR_PUBKEY_HEX).with_cache(cache);
    let pretty = cli.pretty;

    match &cli.command {
        Commands::Profile => print_json(&feeds.profile().await?, pretty),
        Commands::Notes => print_json(&feeds.notes().await?, pretty),
        Commands::Posts => print_json(&feeds.posts().await?, pretty),
        Commands::Articles { until, paged } => {
            if *paged || until.is_some() {
                print_json(&feeds.articles_page(*until).await?, pretty)
            } else {
                print_json(&feeds.articles().await?, pretty)
            }
        }
        Commands::Photos => print_json(&feeds.photos().await?, pretty),
        Commands::Events => print_json(&feeds.calendar_events(chrono::Utc::now()).await?, pretty),
        Commands::Apps => print_json(&feeds.applications().await?, pretty),
        Commands::Repos => print_json(&feeds.repositories().await?, pretty),
        Commands::Deletions => print_json(&feeds.deletions().await?, pretty),
        Commands::Route { publish } => print_route(pool, publish.as_deref(), pretty),
        Commands::Publish { file } => {
            let record = read_record(file)?;
            let report = pool
                .publish(&record, PUBLISH_TIMEOUT)
                .await
                .with_context(|| format!("Failed to publish {}", record.id))?;
            print_json(&report, pretty)
        }
        Commands::Stats => {
            let notes = feeds.notes().await?;
            print_json(
                &serde_json::json!({
                    "notes": notes.len(),
                    "relays": pool.stats().relays_by_events(),
                }),
                pretty,
            )
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn print_route(pool: &RelayPool, publish: Option<&Path>, pretty: bool) -> Result<()> {
    let router = pool.router();

    if let Some(file) = publish {
        let record = read_record(file)?;
        return print_json(&router.route_publish(&record), pretty);
    }

    let filters = [QueryFilter::new()
        .kinds([kinds::TEXT_NOTE])
        .author(AUTHOR_PUBKEY_HEX)];
    let routes: BTreeMap<String, Vec<QueryFilter>> = router.route_query(&filters).into_iter().collect();
    let params = router.params();

    print_json(
        &serde_json::json!({
            "primary": params.primary,
            "useAllRelays": params.use_all_relays,
            "routes": routes,
        }),
        pretty,
    )
}

fn run_config(storage: &mut ConfigStorage, action: &ConfigAction, pretty: bool) -> Result<()> {
    match action {
        ConfigAction::Show => {}
        ConfigAction::SetRelay { url } => storage
            .set_relay_url(url)
            .with_context(|| format!("Failed to save {}", storage.path().display()))?,
        ConfigAction::AllRelays { state } => storage
            .set_use_all_relays(matches!(state, Toggle::On))
            .with_context(|| format!("Failed to save {}", storage.path().display()))?,
    }

    print_json(
        &serde_json::json!({
            "path": storage.path().display().to_string(),
            "config": storage.config,
        }),
        pretty,
    )
}

fn read_record(path: &Path) -> Result<Record> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not a signed event", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
