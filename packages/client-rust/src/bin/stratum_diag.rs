//! Operator CLI for the Stratum persistence tiers.
//!
//! Usage:
//!   stratum-diag --rest-url https://db.example.com/rest/v1 --user u1 probe
//!   stratum-diag --rest-url https://db.example.com/rest/v1 --durable customers=customer_lists probe
//!   stratum-diag --cache-file ./cache.json --user u1 migrate
//!   stratum-diag serve --port 8787
//!
//! Logs go to stderr; reports go to stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stratum_client::config::{MigrationConfig, ProbeConfig, ResolverConfig, TierPolicy};
use stratum_client::identity::StaticIdentity;
use stratum_client::migration::MigrationSweeper;
use stratum_client::panel::{PanelConfig, PanelModule, PanelState};
use stratum_client::prober::{ProbeTargets, StatusProber};
use stratum_client::resolver::{Resolver, ResolverDeps};
use stratum_client::storage::{
    AdapterRegistry, JsonFileCache, MemoryLocalCache, NullFallbackStore, RestClient, RestEndpoint,
    RestEntityAdapter, RestFallbackStore,
};
use stratum_client::sync_state::SyncStateTracker;
use stratum_core::{FallbackStore, KeyRegistry, LocalCache, StorageKey, SystemClock};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stratum-diag")]
#[command(about = "Probe, migrate and inspect Stratum storage tiers")]
struct Args {
    /// JSON file backing the local cache. In-memory when omitted.
    #[arg(long, env = "STRATUM_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Prefix of local cache keys.
    #[arg(long, env = "STRATUM_APP_PREFIX", default_value = "stratum")]
    app_prefix: String,

    /// REST root holding the fallback and entity tables. No remote tier
    /// when omitted.
    #[arg(long, env = "STRATUM_REST_URL", alias = "fallback-url")]
    rest_url: Option<String>,

    #[arg(long, env = "STRATUM_FALLBACK_TABLE", default_value = "app_storage")]
    fallback_table: String,

    #[arg(long, env = "STRATUM_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Bearer token of the signed-in user, if any.
    #[arg(long, env = "STRATUM_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Id of the signed-in user. Guest session when omitted.
    #[arg(long, env = "STRATUM_USER")]
    user: Option<String>,

    /// Bound on every remote call, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Tier policy: prefer-durable, fallback-only, local-first, local-only.
    #[arg(long, default_value = "prefer-durable")]
    policy: TierPolicy,

    /// Entity table backing a storage key, as `key=table`. Repeatable.
    #[arg(long = "durable", value_name = "KEY=TABLE", value_parser = parse_durable)]
    durable: Vec<(StorageKey, String)>,

    /// Registered storage keys, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "customers,orders,claims,shipping,products,user-settings")]
    keys: Vec<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Round-trip every tier and print a diagnostic report.
    Probe {
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Copy local-only entries of the signed-in user into remote tiers.
    Migrate,
    /// Serve the diagnostics panel over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 8787)]
        port: u16,
        /// Browser origin allowed to call the panel. Repeatable; `*` for any.
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
}

struct Services {
    resolver: Arc<Resolver>,
    sweeper: Arc<MigrationSweeper>,
    prober: Arc<StatusProber>,
}

fn parse_durable(raw: &str) -> Result<(StorageKey, String), String> {
    let (key, table) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=TABLE, got {raw:?}"))?;
    if table.is_empty() {
        return Err(format!("empty table name for {key:?}"));
    }
    let key = StorageKey::new(key).map_err(|e| e.to_string())?;
    Ok((key, table.to_string()))
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn build_services(args: &Args) -> Result<Services> {
    let timeout = Duration::from_millis(args.timeout_ms);
    let identity = Arc::new(match &args.user {
        Some(user) => StaticIdentity::signed_in(user.clone()),
        None => StaticIdentity::guest(),
    });

    let local: Arc<dyn LocalCache> = match &args.cache_file {
        Some(path) => Arc::new(
            JsonFileCache::open(path)
                .with_context(|| format!("opening local cache {}", path.display()))?,
        ),
        None => Arc::new(MemoryLocalCache::new()),
    };

    let rest = match &args.rest_url {
        Some(url) => Some(RestClient::new(RestEndpoint {
            base_url: url.clone(),
            api_key: args.api_key.clone(),
            bearer_token: args.bearer_token.clone(),
            request_timeout: timeout,
        })?),
        None => None,
    };

    let fallback: Arc<dyn FallbackStore> = match &rest {
        Some(client) => Arc::new(RestFallbackStore::with_client(
            client.clone(),
            args.fallback_table.clone(),
        )),
        None => Arc::new(NullFallbackStore),
    };

    let mut keys = KeyRegistry::from_names(&args.keys).context("invalid storage key")?;
    let mut adapters = AdapterRegistry::new();
    if !args.durable.is_empty() {
        let client = rest
            .as_ref()
            .context("--durable needs --rest-url to locate the entity tables")?;
        for (key, table) in &args.durable {
            keys.register(key.clone())
                .with_context(|| format!("cannot register durable key {key}"))?;
            adapters.register(Arc::new(RestEntityAdapter::new(
                client.clone(),
                key.clone(),
                table.clone(),
            )));
        }
    }

    let tracker = Arc::new(SyncStateTracker::new(Arc::new(SystemClock)));
    let resolver = Arc::new(Resolver::new(
        ResolverDeps {
            identity: identity.clone(),
            local,
            fallback,
            adapters: Arc::new(adapters),
            tracker,
        },
        ResolverConfig {
            app_prefix: args.app_prefix.clone(),
            policy: args.policy,
            remote_timeout: timeout,
            ..ResolverConfig::default()
        },
    ));

    let sweeper = Arc::new(MigrationSweeper::new(
        Arc::clone(&resolver),
        Arc::new(keys),
        MigrationConfig::default(),
    ));
    let prober = Arc::new(StatusProber::new(
        ProbeTargets::from_resolver(&resolver),
        identity,
        ProbeConfig { timeout },
    ));

    Ok(Services {
        resolver,
        sweeper,
        prober,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);
    let services = build_services(&args)?;
    info!(adapters = services.resolver.adapters().len(), "storage tiers wired");

    match args.command {
        Command::Probe { json } => {
            let report = services.prober.probe().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
        }
        Command::Migrate => {
            let report = services
                .sweeper
                .migrate_current_user()
                .await
                .context("migration sweep refused")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve {
            host,
            port,
            cors_origins,
        } => {
            let state = PanelState {
                prober: services.prober,
                sweeper: services.sweeper,
                resolver: services.resolver,
                start_time: Instant::now(),
            };
            let mut panel = PanelModule::new(
                PanelConfig {
                    host,
                    port,
                    cors_origins,
                    ..PanelConfig::default()
                },
                state,
            );
            let bound = panel.start().await?;
            info!(port = bound, "diagnostics panel listening");
            panel
                .serve(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
    }
    Ok(())
}
