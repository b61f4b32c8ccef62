//! Vaultkeep command-line interface.

pub mod commands;
pub mod context;
pub mod render;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use vaultkeep_core::error::ConfigError;
use vaultkeep_core::Config;

/// Vaultkeep - zero-knowledge password vault
#[derive(Parser)]
#[command(name = "vaultkeep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "VAULTKEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Vault owner
    #[arg(short, long, env = "VAULTKEEP_USER", global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create the configuration and the vault's key derivation salt
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Add an item
    Add(commands::items::AddArgs),

    /// List items
    List(commands::items::ListArgs),

    /// Show one item
    Show(commands::items::ShowArgs),

    /// Change an item
    Update(commands::items::UpdateArgs),

    /// Delete an item
    Delete(commands::items::DeleteArgs),

    /// Search items
    Search(commands::items::SearchArgs),

    /// Run a security audit
    Audit(commands::audit::AuditArgs),

    /// Export the vault as plaintext JSON
    Export(commands::transfer::ExportArgs),

    /// Import items from an export
    Import(commands::transfer::ImportArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Run diagnostics
    Doctor(commands::doctor::DoctorArgs),

    /// Show version information
    Version,
}

/// Load the configuration from `path`, or the default location.
///
/// A missing file yields the defaults. Environment overrides are applied
/// either way.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Config::default(),
            Err(e) => return Err(e),
        },
        None => return Ok(Config::load_or_default()),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let ctx = context::Context::new(config, cli.config.clone(), cli.user.clone());

    match cli.command {
        Commands::Init { force } => commands::init::run(&ctx, force).await,
        Commands::Add(args) => commands::items::add(&ctx, args).await,
        Commands::List(args) => commands::items::list(&ctx, args).await,
        Commands::Show(args) => commands::items::show(&ctx, args).await,
        Commands::Update(args) => commands::items::update(&ctx, args).await,
        Commands::Delete(args) => commands::items::delete(&ctx, args).await,
        Commands::Search(args) => commands::items::search(&ctx, args).await,
        Commands::Audit(args) => commands::audit::run(&ctx, args).await,
        Commands::Export(args) => commands::transfer::export(&ctx, args).await,
        Commands::Import(args) => commands::transfer::import(&ctx, args).await,
        Commands::Config(args) => commands::config::run(&ctx, args).await,
        Commands::Doctor(args) => commands::doctor::run(&ctx, args).await,
        Commands::Version => {
            println!("vaultkeep {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["vaultkeep", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_parse_init_force() {
        let cli = Cli::try_parse_from(["vaultkeep", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Init { force } => assert!(force),
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_parse_add_login() {
        let cli = Cli::try_parse_from([
            "vaultkeep",
            "add",
            "GitHub",
            "--username",
            "octocat",
            "--url",
            "https://github.com",
            "--tag",
            "dev",
            "--tag",
            "work",
        ])
        .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.name, "GitHub");
                assert_eq!(args.category, vaultkeep_core::ItemCategory::Login);
                assert_eq!(args.username.as_deref(), Some("octocat"));
                assert_eq!(args.tags, vec!["dev", "work"]);
            }
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_parse_add_card() {
        let cli = Cli::try_parse_from([
            "vaultkeep", "add", "Visa", "--category", "card", "--cardholder", "Ada",
        ])
        .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.category, vaultkeep_core::ItemCategory::CreditCard);
                assert_eq!(args.cardholder.as_deref(), Some("Ada"));
            }
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_parse_search_exact() {
        let cli = Cli::try_parse_from([
            "vaultkeep", "search", "octocat", "--exact", "username",
        ])
        .unwrap();
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "octocat");
                assert!(matches!(args.exact, Some(commands::items::ExactField::Username)));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_parse_global_user() {
        let cli = Cli::try_parse_from(["vaultkeep", "list", "--user", "alice", "--json"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Commands::List(args) => assert!(args.json),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["vaultkeep", "config", "validate"]).unwrap();
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(args.command, commands::config::ConfigCommand::Validate));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("absent.json5"))).unwrap();
        assert_eq!(config.kdf.iterations, 310_000);
    }
}
