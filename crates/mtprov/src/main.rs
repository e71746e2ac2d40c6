// # mtprov - RouterOS provisioning export
//
// CRITICAL RULES:
// - This is a THIN integration layer ONLY
// - DO NOT add validation, storage or rendering logic here
// - All provisioning logic MUST be in mtprov-core
//
// The mtprov binary is responsible for:
// 1. Reading configuration from environment variables and an optional file
// 2. Initializing logging and the runtime
// 3. Connecting the configured store
// 4. Writing stored resources to stdout as a RouterOS script
//
// ## Configuration
//
// - `MTPROV_CONFIG`: Path to a JSON configuration file (optional)
// - `MTPROV_DSN`: Overrides `database.dsn` (`memory://` or `file://<dir>`)
// - `MTPROV_EXPORT`: What to export (all, address-lists, static-dns)
// - `MTPROV_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
//
// Logs go to stderr so that stdout carries only the script.
//
// ## Example
//
// ```bash
// export MTPROV_DSN=file:///var/lib/mtprov
// export MTPROV_EXPORT=address-lists
//
// mtprov > address-lists.rsc
// ```

use anyhow::{Context, Result};
use mtprov_core::{ProvisioningConfig, ProvisioningService, rsc};
use std::env;
use std::io::Write;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Export written
/// - 1: Configuration or startup error
/// - 2: Runtime error (storage or output failure)
#[derive(Debug, Clone, Copy)]
enum MtprovExitCode {
    /// Export written
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<MtprovExitCode> for ExitCode {
    fn from(code: MtprovExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Which resources to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportTarget {
    All,
    AddressLists,
    StaticDns,
}

impl ExportTarget {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "address-lists" => Ok(Self::AddressLists),
            "static-dns" => Ok(Self::StaticDns),
            other => anyhow::bail!(
                "MTPROV_EXPORT '{}' is not valid. \
                Valid targets: all, address-lists, static-dns",
                other
            ),
        }
    }
}

/// Application configuration
struct Config {
    provisioning: ProvisioningConfig,
    export: ExportTarget,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut provisioning = match env::var("MTPROV_CONFIG") {
            Ok(path) => ProvisioningConfig::from_json_file(&path)
                .with_context(|| format!("loading MTPROV_CONFIG={path}"))?,
            Err(_) => ProvisioningConfig::default(),
        };

        if let Ok(dsn) = env::var("MTPROV_DSN") {
            provisioning.database.dsn = dsn;
        }

        Ok(Self {
            provisioning,
            export: ExportTarget::parse(&env::var("MTPROV_EXPORT").unwrap_or_else(|_| "all".to_string()))?,
            log_level: env::var("MTPROV_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.provisioning
            .validate()
            .context("invalid provisioning configuration")?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MTPROV_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return MtprovExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return MtprovExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MtprovExitCode::ConfigError.into();
    }

    info!("Starting mtprov export");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MtprovExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_export(config).await {
            error!("Export error: {:#}", e);
            MtprovExitCode::RuntimeError
        } else {
            MtprovExitCode::Success
        }
    });

    result.into()
}

/// Connect the store and write the requested resources to stdout
async fn run_export(config: Config) -> Result<()> {
    let database = &config.provisioning.database;
    let store = mtprov_core::connect(database)
        .await
        .context("failed to open store")?;
    let service = ProvisioningService::with_config(store, database);
    info!("Connected to {} store", service.backend_name());

    let mut script = String::new();

    if matches!(config.export, ExportTarget::All | ExportTarget::AddressLists) {
        let lists = service.get_all_address_lists(&service.context()).await?;
        info!("Exporting {} address list(s)", lists.len());
        script.push_str(&rsc::render_address_lists(&lists));
    }

    if matches!(config.export, ExportTarget::All | ExportTarget::StaticDns) {
        let entries = service.get_all_static_dns(&service.context()).await?;
        info!("Exporting {} static DNS entr(ies)", entries.len());
        script.push_str(&rsc::render_static_dns_entries(&entries));
    }

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(script.as_bytes())
        .and_then(|()| stdout.flush())
        .context("failed to write export")?;

    Ok(())
}
