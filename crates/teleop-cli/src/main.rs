//! `teleop` – relay server binary.
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.teleop/config.toml` plus `TELEOP_*` overrides, and the login
//!    users file.
//! 3. Serves the operator pages and the WebSocket relay on one port until
//!    Ctrl-C.
//!
//! `teleop --init` writes a default config file and exits.

mod config;
mod telemetry;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use teleop_core::{OperatorRegistry, Router, VehicleRegistry};
use teleop_server::{CredentialStore, RelayServer, Site};

fn main() -> ExitCode {
    let telemetry_guard = telemetry::init_tracing("teleop-relay");
    info!(otlp_export = telemetry_guard.is_exporting(), "logging initialised");

    if std::env::args().skip(1).any(|arg| arg == "--init") {
        return write_default_config();
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "config error; using defaults");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let credentials = match CredentialStore::load(&cfg.users_file) {
        Ok(store) => {
            info!(users = store.len(), path = %cfg.users_file.display(), "login accounts loaded");
            store
        }
        Err(e) => {
            error!(error = %e, "no login accounts loaded; every login will fail");
            CredentialStore::new()
        }
    };

    print_banner(&cfg);

    // ── Shutdown signal ───────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting the relay down …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop the process with a signal instead");
    }

    // ── Relay ─────────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let router = Arc::new(Router::new(VehicleRegistry::new(), OperatorRegistry::new()));
    let server = RelayServer::new(Arc::clone(&router))
        .with_bind_address(cfg.bind_address)
        .with_port(cfg.port)
        .with_site(Site::new(cfg.web_root.clone(), credentials));

    let result = runtime.block_on(server.run_until(async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    }));

    match result {
        Ok(()) => {
            let stats = router.stats();
            info!(
                vehicles = stats.vehicles,
                operators = stats.operators,
                bindings = stats.bindings,
                "relay stopped"
            );
            println!("{}", "  ✓ Relay stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "relay failed");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// --init
// ─────────────────────────────────────────────────────────────────────────────

fn write_default_config() -> ExitCode {
    let path = config::config_path();
    if path.exists() {
        println!(
            "  {} {} already exists; leaving it untouched.",
            "!".yellow().bold(),
            path.display().to_string().bold()
        );
        return ExitCode::SUCCESS;
    }
    match config::save_to(&config::Config::default(), &path) {
        Ok(()) => {
            println!(
                "  {} Config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Error writing config".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(cfg: &config::Config) {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║          Teleop Relay Server         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "teleop".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!(
        "  Listening on {}",
        format!("http://{}:{}", cfg.bind_address, cfg.port).bold()
    );
    println!("  Pages from   {}", cfg.web_root.display().to_string().dimmed());
    println!(
        "  Vehicles and operators connect over WebSocket on the same port."
    );
    println!("  Press {} to stop.", "Ctrl-C".bold().cyan());
    println!();
}
