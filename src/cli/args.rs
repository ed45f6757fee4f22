//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Dependency-ordered script loader CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: scriptload.toml)
    #[arg(short = 'C', long, default_value = "scriptload.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Print lock and fetch activity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load scripts and bootstrap the application
    #[command(visible_alias = "l")]
    Load {
        #[command(flatten)]
        args: LoadArgs,
    },

    /// Print the address each name resolves to
    #[command(visible_alias = "r")]
    Resolve {
        /// Resource names to resolve
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Arguments of the `load` subcommand
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// Resource names loaded after the preload list
    pub names: Vec<String>,

    /// Load NAMES one after another instead of in parallel
    #[arg(short, long)]
    pub sequence: bool,

    /// Per-script timeout in milliseconds (overrides `app.timeout`)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Do not load the main module, even if `app.boot` is set
    #[arg(long)]
    pub no_boot: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load() {
        let cli = Cli::try_parse_from([
            "scriptload", "-v", "load", "jquery", "ngRoute", "--sequence", "-t", "500",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("scriptload.toml"));
        let Commands::Load { args } = cli.command else {
            panic!("expected load");
        };
        assert_eq!(args.names, vec!["jquery", "ngRoute"]);
        assert!(args.sequence);
        assert_eq!(args.timeout, Some(500));
        assert!(!args.no_boot);
    }

    #[test]
    fn test_parse_resolve_alias() {
        let cli = Cli::try_parse_from(["scriptload", "-C", "x.toml", "r", "app"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Commands::Resolve { names } if names == ["app"]));
    }

    #[test]
    fn test_resolve_requires_names() {
        assert!(Cli::try_parse_from(["scriptload", "resolve"]).is_err());
    }
}
