//! Scriptload - load scripts in dependency order and bootstrap the app.

mod cli;

use anyhow::{Result, anyhow};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use scriptload::config::{ProjectConfig, find_config_file};
use scriptload::logger::{StatusLine, set_verbose};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    set_verbose(cli.verbose);

    let config_path = find_config_file(&cli.config)
        .ok_or_else(|| anyhow!("config file `{}` not found", cli.config.display()))?;
    let config = ProjectConfig::load(&config_path)?;

    let result = match &cli.command {
        Commands::Load { args } => cli::load::run_load(args, &config),
        Commands::Resolve { names } => cli::resolve::run_resolve(names, &config),
    };

    if let Err(e) = result {
        StatusLine::error("scriptload failed", &format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
