//! edudash - role-aware LMS dashboard
//!
//! Builds the dashboard a given LMS user is entitled to see and prints it
//! as Markdown or JSON, once or on a refresh interval.
//!
//! Exit codes:
//!   0 - Success (possibly with some sample data)
//!   1 - Runtime error (bad config, or a source with no usable data)
//!   2 - The LMS could not be reached at all; every figure is sample data

use anyhow::{Context, Result};
use edudash::cache::{FileStore, KeyValueStore, MemoryStore, TtlCache};
use edudash::cli::{Args, OutputFormat};
use edudash::clock::{Clock, SystemClock};
use edudash::config::{Config, CONFIG_FILE};
use edudash::dashboard::{spawn_refresh, DashboardData, DashboardService, DashboardState};
use edudash::lms::LmsClient;
use edudash::report;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("edudash v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .edudash.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Set [lms] endpoint and token (or EDUDASH_TOKEN) before running.");
    Ok(())
}

/// Initialize logging to stderr; `RUST_LOG` wins over the CLI verbosity.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    if config.lms.token.is_empty() {
        warn!("No LMS token configured; the web service will likely reject requests");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = build_cache(&config, Arc::clone(&clock))?;
    let lms = LmsClient::new(config.lms_client_config()).context("Failed to create LMS client")?;
    let service = Arc::new(DashboardService::new(
        Arc::new(lms),
        cache,
        config.dashboard_settings(),
        clock,
    ));

    if args.watch {
        return watch(service, &args, config.refresh_interval()).await;
    }

    let data = fetch_once(&service, args.user_id(), !args.quiet).await?;
    emit(&data, &args)?;

    if data.all_sources_failed {
        eprintln!("\n⛔ The LMS could not be reached; all figures are sample data.");
        return Ok(2);
    }
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn build_cache(config: &Config, clock: Arc<dyn Clock>) -> Result<Option<Arc<TtlCache>>> {
    if !config.cache.enabled {
        info!("Cache disabled");
        return Ok(None);
    }

    let store: Box<dyn KeyValueStore> = if config.cache.persist {
        let store = FileStore::open(&config.cache.directory).with_context(|| {
            format!(
                "Failed to open cache directory {}",
                config.cache.directory.display()
            )
        })?;
        Box::new(store)
    } else {
        Box::new(MemoryStore::new())
    };

    Ok(Some(Arc::new(TtlCache::new(
        store,
        config.cache.namespace.clone(),
        config.cache_ttl(),
        clock,
    ))))
}

/// One request with a spinner on stderr.
async fn fetch_once(
    service: &DashboardService,
    user_id: i64,
    show_progress: bool,
) -> Result<DashboardData> {
    let spinner = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Loading dashboard for user {}", user_id));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = service.get_role_scoped_dashboard_data(user_id).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    Ok(result?)
}

/// Render `data` in the requested format to the output file or stdout.
fn emit(data: &DashboardData, args: &Args) -> Result<()> {
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(data)?,
        OutputFormat::Markdown => report::generate_markdown_report(data),
    };

    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)?;
            if !args.quiet {
                eprintln!("✅ Dashboard saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    if data.is_degraded && !args.quiet {
        eprintln!(
            "⚠️  Sample data shown for: {}",
            data.view_model.degraded_sources.join(", ")
        );
    }

    Ok(())
}

/// Re-render on every refresh until Ctrl+C.
async fn watch(service: Arc<DashboardService>, args: &Args, interval: Duration) -> Result<i32> {
    let mut states = service.subscribe();
    let handle = spawn_refresh(Arc::clone(&service), args.user_id(), interval);
    info!("Refreshing every {}s; press Ctrl+C to stop", interval.as_secs());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, stopping refresh");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                match state {
                    DashboardState::Ready | DashboardState::ReadyDegraded => {
                        if let Some(data) = service.latest() {
                            emit(&data, args)?;
                        }
                    }
                    DashboardState::FatalError(message) => {
                        warn!("Refresh failed: {}", message);
                        if let Some(previous) = service.latest() {
                            info!(
                                "Last good dashboard is from {}",
                                previous.view_model.generated_at.format("%H:%M:%S")
                            );
                        }
                    }
                    DashboardState::Idle | DashboardState::Loading => {}
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(0)
}
