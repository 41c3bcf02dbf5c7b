// # distcheckd - DNS Distribution Monitor Daemon
//
// This daemon is a THIN integration layer over distcheck-core:
// - DO NOT add check, polling or cleanup logic here
// - All monitor logic lives in distcheck-core
// - Configuration is via environment variables (optionally seeded from a file)
//
// The distcheckd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering zone APIs and resolving the account
// 4. Running the monitor and the reporter until a shutdown signal
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Zone
// - `DISTCHECK_DOMAIN`: Zone to probe (required)
// - `DISTCHECK_TOKEN`: DNSimple API token (required)
// - `DISTCHECK_ACCOUNT_ID`: Account ID (optional, resolved via whoami)
// - `DISTCHECK_SANDBOX`: Use the DNSimple sandbox (`true`/`false`)
//
// ### Monitor
// - `DISTCHECK_INTERVAL`: Time between cycle starts (default `1m`)
// - `DISTCHECK_POLL`: Time between distribution checks (default `2s`)
// - `DISTCHECK_TIMEOUT`: Per-cycle deadline (default `10m`)
// - `DISTCHECK_CLEANUP_TIMEOUT`: Deadline for probe deletion (default `1m`)
// - `DISTCHECK_MAX_IN_FLIGHT`: Overlap bound, `0` for unbounded (default `0`)
// - `DISTCHECK_SHUTDOWN_GRACE`: Drain period on shutdown (default `30s`)
//
// ### Output
// - `DISTCHECK_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `DISTCHECK_LOG_FORMAT`: Result format, text or json (default `text`)
// - `DISTCHECK_SUMMARY_EVERY`: Log a summary every N results, `0` disables (default `60`)
//
// ### Config file
// - `DISTCHECK_CONFIG`: Path of a `KEY=VALUE` file (default `.config`, may be absent).
//   Variables already set in the environment win over the file.
//
// ## Example
//
// ```bash
// export DISTCHECK_DOMAIN=example.com
// export DISTCHECK_TOKEN=your_token
// export DISTCHECK_INTERVAL=30s
//
// distcheckd
// ```

use anyhow::{Context, Result};
use distcheck_core::config::{ApiConfig, MonitorConfig, ReportConfig, ReportFormat};
use distcheck_core::{ApiRegistry, Monitor, Reporter, ZoneApi};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Prefix of every configuration variable
const ENV_PREFIX: &str = "DISTCHECK_";

/// Config file used when `DISTCHECK_CONFIG` is unset
const DEFAULT_CONFIG_FILE: &str = ".config";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DistcheckExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DistcheckExitCode> for ExitCode {
    fn from(code: DistcheckExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Startup failures, split by the exit code they map to
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Application configuration
struct Config {
    monitor: MonitorConfig,
    report: ReportConfig,
    shutdown_grace: Duration,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Load configuration through a variable lookup (key without prefix)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let domain = get("DOMAIN").with_context(|| {
            format!(
                "{ENV_PREFIX}DOMAIN is required. \
                Set it via: export {ENV_PREFIX}DOMAIN=example.com"
            )
        })?;
        let token = get("TOKEN").with_context(|| {
            format!(
                "{ENV_PREFIX}TOKEN is required. \
                Set it via: export {ENV_PREFIX}TOKEN=your_token"
            )
        })?;

        let api = ApiConfig::Dnsimple {
            token,
            account_id: get("ACCOUNT_ID"),
            sandbox: parse_bool("SANDBOX", get("SANDBOX"))?.unwrap_or(false),
        };

        let mut monitor = MonitorConfig::new(domain.trim(), api);
        if let Some(interval) = parse_duration("INTERVAL", get("INTERVAL"))? {
            monitor = monitor.with_interval(interval);
        }
        if let Some(poll) = parse_duration("POLL", get("POLL"))? {
            monitor = monitor.with_poll(poll);
        }
        if let Some(timeout) = parse_duration("TIMEOUT", get("TIMEOUT"))? {
            monitor = monitor.with_timeout(timeout);
        }
        if let Some(cleanup) = parse_duration("CLEANUP_TIMEOUT", get("CLEANUP_TIMEOUT"))? {
            monitor = monitor.with_cleanup_timeout(cleanup);
        }
        if let Some(max) = parse_number("MAX_IN_FLIGHT", get("MAX_IN_FLIGHT"))? {
            monitor = monitor.with_max_in_flight(max);
        }

        let mut report = ReportConfig::default();
        if let Some(format) = get("LOG_FORMAT") {
            report.format = format
                .parse::<ReportFormat>()
                .with_context(|| format!("{ENV_PREFIX}LOG_FORMAT is not valid"))?;
        }
        if let Some(every) = parse_number("SUMMARY_EVERY", get("SUMMARY_EVERY"))? {
            report.summary_every = every;
        }

        Ok(Self {
            monitor,
            report,
            shutdown_grace: parse_duration("SHUTDOWN_GRACE", get("SHUTDOWN_GRACE"))?
                .unwrap_or(Duration::from_secs(30)),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Monitor settings are checked by distcheck-core; the daemon adds the
    /// checks for the settings it owns.
    fn validate(&self) -> Result<()> {
        self.monitor
            .validate()
            .context("Monitor configuration is not valid")?;

        if let ApiConfig::Dnsimple { token, .. } = &self.monitor.api {
            // Check for obvious placeholder tokens (common mistake)
            let token_lower = token.to_lowercase();
            if token_lower.contains("your_token")
                || token_lower.contains("replace_me")
                || token_lower == "token"
            {
                anyhow::bail!(
                    "{ENV_PREFIX}TOKEN appears to be a placeholder. \
                    Use an actual API token from your DNSimple account."
                );
            }
        }

        if self.shutdown_grace.is_zero() {
            anyhow::bail!("{ENV_PREFIX}SHUTDOWN_GRACE must be greater than zero");
        }

        parse_level(&self.log_level)?;

        Ok(())
    }
}

fn parse_duration(key: &str, value: Option<String>) -> Result<Option<Duration>> {
    value
        .map(|v| {
            humantime::parse_duration(v.trim()).with_context(|| {
                format!(
                    "{ENV_PREFIX}{key} must be a duration like '2s' or '10m'. Got: {}",
                    v
                )
            })
        })
        .transpose()
}

fn parse_number(key: &str, value: Option<String>) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.trim().parse::<usize>().with_context(|| {
                format!("{ENV_PREFIX}{key} must be a non-negative integer. Got: {}", v)
            })
        })
        .transpose()
}

fn parse_bool(key: &str, value: Option<String>) -> Result<Option<bool>> {
    value
        .map(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{ENV_PREFIX}{key} must be true or false. Got: {}", v),
        })
        .transpose()
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "{ENV_PREFIX}LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Seed the environment from the optional config file
///
/// Returns the path that was loaded, if any. Variables already present in
/// the environment are not overridden.
fn load_config_file() -> Result<Option<PathBuf>> {
    let path = env::var_os(format!("{ENV_PREFIX}CONFIG"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if !path.exists() {
        return Ok(None);
    }

    dotenvy::from_path(&path)
        .with_context(|| format!("Failed to load config file {}", path.display()))?;
    Ok(Some(path))
}

fn main() -> ExitCode {
    // Seed environment from the config file, if present
    let config_file = match load_config_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DistcheckExitCode::ConfigError.into();
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DistcheckExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DistcheckExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DistcheckExitCode::ConfigError.into();
    }

    info!("Starting distcheckd daemon");
    if let Some(path) = config_file {
        info!(path = %path.display(), "Loaded config file");
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DistcheckExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DistcheckExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                DistcheckExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                DistcheckExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<(), DaemonError> {
    let api = create_api(&config.monitor.api).map_err(DaemonError::Startup)?;

    // Account resolution failure is fatal: no cycle can succeed without it
    let account_id = api
        .whoami()
        .await
        .context("Failed to resolve DNSimple account")
        .map_err(DaemonError::Startup)?;

    info!(
        api = api.api_name(),
        account_id = %account_id,
        domain = %config.monitor.domain,
        interval = %humantime::format_duration(config.monitor.interval),
        poll = %humantime::format_duration(config.monitor.poll),
        timeout = %humantime::format_duration(config.monitor.timeout),
        "Configuration loaded"
    );

    let (monitor, results) = Monitor::new(api, account_id, &config.monitor)
        .context("Failed to create monitor")
        .map_err(DaemonError::Startup)?;

    let reporter = tokio::spawn(Reporter::new(config.report.clone()).run(results));

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(shutdown.clone()));

    info!("Starting distribution monitor");
    let run_result = monitor.run(shutdown.clone()).await;

    // Whatever ended the monitor, stop the signal watcher and let cycles clean up
    shutdown.cancel();
    signals.abort();

    if !monitor.drain(config.shutdown_grace).await {
        warn!(
            grace = %humantime::format_duration(config.shutdown_grace),
            "Shutdown grace period elapsed, abandoned remaining cleanups"
        );
    }

    // Dropping the monitor closes the result channel once all cycles published
    drop(monitor);
    match reporter.await {
        Ok(summary) => info!(
            total = summary.total,
            successes = summary.successes,
            leaked_probes = summary.leaked_probes,
            "Reporter finished"
        ),
        Err(e) => warn!("Reporter task failed: {}", e),
    }

    run_result
        .context("Monitor stopped unexpectedly")
        .map_err(DaemonError::Runtime)?;

    info!("Shutdown complete");
    Ok(())
}

/// Build the zone API for the configuration
fn create_api(api_config: &ApiConfig) -> Result<Arc<dyn ZoneApi>> {
    let registry = ApiRegistry::new();

    #[cfg(feature = "dnsimple")]
    distcheck_dnsimple::register(&registry);

    if !registry.has_api(api_config.type_name()) {
        anyhow::bail!(
            "Zone API '{}' is not available. Registered APIs: {:?}",
            api_config.type_name(),
            registry.list_apis()
        );
    }

    let api = registry
        .create_api(api_config)
        .context("Failed to create zone API")?;
    Ok(Arc::from(api))
}

/// Cancel `shutdown` on the first SIGTERM or SIGINT
#[cfg(unix)]
async fn cancel_on_signal(shutdown: CancellationToken) {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to setup signal handlers: {}", e);
                shutdown.cancel();
                return;
            }
        };

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = shutdown.cancelled() => return,
    };

    info!("Received shutdown signal: {}", signal);
    shutdown.cancel();
}

/// Cancel `shutdown` on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn cancel_on_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to wait for CTRL-C: {}", e);
            } else {
                info!("Received shutdown signal: SIGINT");
            }
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}
