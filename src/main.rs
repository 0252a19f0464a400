//! Gateway manager
//!
//! Control plane for an API gateway. Cluster and instance records live in a
//! hierarchical configuration store; this process serves them over a
//! management API and keeps each instance's `is_alive` flag current by
//! probing its health-check URL.
//!
//! ```text
//!                ┌──────────────────────── gateway-manager ─────────────────────────┐
//!                │                                                                   │
//!   operator ────┼─▶ admin (axum) ──▶ cluster service ──┐                            │
//!                │                                      ▼                            │
//!                │                              ┌──────────────┐   watch events      │
//!                │                              │ ConfigStore  │────────────────┐    │
//!                │                              │ etcd / memory│◀────┐          ▼    │
//!                │                              └──────────────┘     │   registry    │
//!                │                                                   │       │       │
//!                │                                   result writer ◀─┼─ scheduler    │
//!                │                                                   │       │       │
//!                │                                                   └── checker ────┼──▶ backend /health
//!                └───────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gateway_manager::config::loader::{read_config, ConfigError};
use gateway_manager::config::schema::StoreBackend;
use gateway_manager::config::validation::validate_config;
use gateway_manager::lifecycle::startup;
use gateway_manager::observability::logging::init_logging;
use gateway_manager::ManagerConfig;

#[derive(Parser, Debug)]
#[command(name = "gateway-manager", version, about = "Cluster registry and instance health monitor")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// etcd endpoint; repeat for several. Replaces the configured list.
    #[arg(long = "etcd-addr")]
    etcd_addr: Vec<String>,

    /// Management API bind address.
    #[arg(long)]
    addr: Option<String>,

    /// Use the in-process store instead of etcd.
    #[arg(long)]
    memory_store: bool,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(&self, config: &mut ManagerConfig) {
        if !self.etcd_addr.is_empty() {
            config.store.endpoints = self.etcd_addr.clone();
        }
        if let Some(addr) = &self.addr {
            config.admin.bind_address = addr.clone();
        }
        if self.memory_store {
            config.store.backend = StoreBackend::Memory;
        }
        if self.debug {
            config.observability.log_level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match read_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ManagerConfig::default(),
    };
    args.apply(&mut config);

    if let Err(errors) = validate_config(&config) {
        eprintln!("{}", ConfigError::Validation(errors));
        return ExitCode::FAILURE;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.store.backend,
        admin = %config.admin.bind_address,
        cadence_secs = config.health.cadence_secs,
        "gateway-manager starting"
    );

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gateway-manager failed");
            ExitCode::FAILURE
        }
    }
}
