mod cli;
mod error_fmt;
mod logging;
mod ride;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};

fn load_config(path: &std::path::Path) -> eyre::Result<trainer_config::Config> {
    if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read config {}", path.display()))?;
        let cfg = trainer_config::load_toml(&text)
            .wrap_err_with(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    } else {
        // Simulated commands do not need real pins; fall back to the
        // shipped defaults.
        tracing::warn!(path = %path.display(), "config not found, using defaults");
        let cfg = trainer_config::load_toml(
            "[pins]\nmotor_step = 23\nmotor_dir = 24\nlimit_in = 17\nhall_in = 27\n",
        )
        .wrap_err("default config")?;
        Ok(cfg)
    }
}

fn run(args: Cli, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    let cfg = load_config(&args.config)?;

    match args.cmd {
        Commands::Ride {
            duration_s,
            speed_mph,
            mode,
            watts,
            grade,
            report_ms,
            settings_dir,
        } => ride::run_ride(
            &cfg,
            duration_s,
            speed_mph,
            mode,
            watts,
            grade,
            report_ms,
            settings_dir,
            shutdown,
            args.json,
        ),
        Commands::Home { start_steps } => ride::run_home(&cfg, start_steps, args.json),
        Commands::Lookup { table, speed, at } => ride::run_lookup(table, speed, at, args.json),
        Commands::SelfCheck => ride::run_self_check(&cfg, args.json),
    }
}

fn main() {
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error handler: {e}");
    }

    // Logging config lives in the TOML, but the subscriber must exist
    // before the config loads; bootstrap from CLI flags only and let the
    // file sink come from a second look at the config path.
    let logging = std::fs::read_to_string(&args.config)
        .ok()
        .and_then(|text| trainer_config::load_toml(&text).ok())
        .map(|cfg| cfg.logging)
        .unwrap_or_default();
    logging::init(&args.log_level, args.json, &logging);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
    }

    if let Err(err) = run(args, shutdown) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}
