//! dirauth - LDAP authentication and group lookup
//!
//! Runs the login and groups queries from a configuration file against a
//! directory server, for testing a deployment's LDAP settings.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dirauth_core::config::DirauthConfig;
use dirauth_ldap::{group_finder, DirectoryRegistry, Ldap3Client};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirauth")]
#[command(author = "Dirauth Team")]
#[command(version = dirauth_core::VERSION)]
#[command(about = "LDAP authentication and group lookup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRAUTH_CONFIG")]
    config: Option<String>,

    /// Directory URI, overrides the configuration
    #[arg(long, global = true, env = "DIRAUTH_LDAP_URI")]
    uri: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRAUTH_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a login name and password
    Authenticate {
        login: String,

        #[arg(long, env = "DIRAUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// List the groups of a user DN
    Groups { user_dn: String },

    /// Validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DirauthConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => DirauthConfig::from_env(),
    };

    if let Some(uri) = cli.uri {
        config.ldap.uri = uri;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config);

    match cli.command {
        Commands::CheckConfig => {
            config.validate()?;
            println!("{}", render_config(&config.redacted())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Authenticate { login, password } => {
            authenticate(&config, &login, &password).await
        }
        Commands::Groups { user_dn } => groups(&config, &user_dn).await,
    }
}

fn init_logging(config: &DirauthConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn render_config(config: &DirauthConfig) -> anyhow::Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}

fn build_registry(config: &DirauthConfig) -> anyhow::Result<DirectoryRegistry> {
    let client = Arc::new(Ldap3Client::from_config(&config.ldap));
    let registry = DirectoryRegistry::from_config(&config.ldap, client)
        .context("Invalid LDAP configuration")?;
    debug!("Directory registry ready");
    Ok(registry)
}

async fn authenticate(
    config: &DirauthConfig,
    login: &str,
    password: &str,
) -> anyhow::Result<ExitCode> {
    let registry = build_registry(config)?;

    match registry.connector()?.authenticate(login, password).await? {
        Some(entry) => {
            info!("Authenticated {} as {}", login, entry.dn);
            println!("{}", serde_json::to_string_pretty(&entry)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Authentication failed for {}", login);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn groups(config: &DirauthConfig, user_dn: &str) -> anyhow::Result<ExitCode> {
    let registry = build_registry(config)?;

    match group_finder(user_dn, &registry).await? {
        Some(groups) => {
            for group in groups {
                println!("{}", group);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No groups resolvable for {}", user_dn);
            Ok(ExitCode::FAILURE)
        }
    }
}
