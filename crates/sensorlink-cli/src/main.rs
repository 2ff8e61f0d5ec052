//! `sensorlink-cli` – sensorlink Command Line Interface
//!
//! Drives an emulator's compass and accelerometer over its WebSocket debug
//! channel. It:
//!
//! 1. Checks for `~/.sensorlink/config.toml`; runs a **First-Run Wizard**
//!    when the file is absent.
//! 2. Drops the user into an **interactive REPL** with slash-commands
//!    (`/connect`, `/compass`, `/accel`, `/replay`, `/settings`, `/help`).
//! 3. Intercepts **Ctrl-C** to close the emulator link and exit.

mod config;
mod repl;
mod session;
mod telemetry;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use session::Session;

fn main() {
    let _telemetry = telemetry::init_tracing("sensorlink");

    print_banner();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            println!("{}: {}", "Fatal".red().bold(), e);
            std::process::exit(1);
        }
    };
    let session = Arc::new(Session::new(runtime.handle().clone()));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = shutdown.clone();
    let session_ctrlc = session.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – closing the emulator link …".yellow().bold());
        session_ctrlc.shutdown();
        shutdown_ctrlc.store(true, Ordering::SeqCst);
        println!("{}", "  ✓ Exiting sensorlink.".green());
        // The REPL thread is parked in a blocking stdin read.
        std::process::exit(130);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the link will not be closed on Ctrl-C");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            println!("  Emulator: {}", cfg.emulator_addr().url().dimmed());
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
        }
    }

    println!();
    println!(
        "  Type {} to link up or {} for a list of commands.\n",
        "/connect".bold().cyan(),
        "/help".bold().cyan()
    );

    repl::run(shutdown, session);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║     sensorlink First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's point sensorlink at an emulator.\n");

    let mut cfg = config::Config::default();

    cfg.emulator_host = repl::prompt_str(
        &format!("  Emulator host [{}]: ", cfg.emulator_host),
        &cfg.emulator_host,
    );
    cfg.emulator_port = repl::prompt_u16(
        &format!("  Emulator WebSocket port [{}]: ", cfg.emulator_port),
        cfg.emulator_port,
    );

    let origin = repl::prompt_str("  Page origin to probe while connected (blank to skip): ", "");
    if !origin.is_empty() {
        cfg.page_origin = Some(origin);
    }

    let reversed = repl::prompt_str("  Reverse accelerometer axes? [y/N]: ", "n");
    cfg.reversed_axes = config::parse_flag(&reversed).unwrap_or(false);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"                              ___       __  "#.bold().cyan());
    println!("{}", r#"  ___ ___ ___  ___ ___  ____ / (_)__  / /__"#.bold().cyan());
    println!("{}", r#" (_-</ -_) _ \(_-</ _ \/ __// / / _ \/  '_/"#.bold().cyan());
    println!("{}", r#"/___/\__/_//_/___/\___/_/  /_/_/_//_/_/\_\ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "sensorlink".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Phone sensors to emulator bridge");
    println!();
}
