//! Keygate CLI - an authenticated API gateway
//!
//! Run `keygate --help` for usage information.

use clap::{Parser, Subcommand};
use keygate::config::{parse_http_url, Config, LogFormat, DEFAULT_CONFIG_TOML};
use keygate::credential::IdentityKey;
use keygate::crypto::seal;
use keygate::web::GatewayServer;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "keygate",
    about = "An authenticated API gateway that derives backend credentials from session identities",
    version
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// Address to bind to (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,

        /// Upstream API base URL (overrides upstream.base_url)
        #[arg(short, long)]
        upstream: Option<String>,
    },

    /// Encrypt a bearer token for storage in a session
    Seal {
        /// Identity key: a wallet address, or an email with --email
        #[arg(short, long)]
        key: String,

        /// Treat the key as an email and normalize it
        #[arg(long)]
        email: bool,

        /// Bearer token to encrypt
        token: String,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Init runs before loading, since the file may not exist yet
    if let Commands::Init { force } = cli.command {
        return init_config(cli.config, force).await;
    }

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path).await?
    } else {
        let default_path = Config::default_path();
        if default_path.exists() {
            Config::load(&default_path).await?
        } else {
            Config::default()
        }
    };

    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Serve { bind, upstream } => {
            run_server(config, bind, upstream).await?;
        }
        Commands::Seal { key, email, token } => {
            seal_token(key, email, token)?;
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// Setup logging from config, with -v flags taking precedence
fn init_logging(config: &Config, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::from_default_env().add_directive(Level::DEBUG.into()),
        _ => EnvFilter::from_default_env().add_directive(Level::TRACE.into()),
    };

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}

async fn run_server(
    mut config: Config,
    bind: Option<String>,
    upstream: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(upstream) = upstream {
        config.upstream.base_url = parse_http_url("--upstream", &upstream)?;
    }

    if config.upstream.preserve_host {
        warn!("preserve_host is enabled; upstream will see the gateway's inbound Host header");
    }

    let server = GatewayServer::from_config(config)?;
    info!(bind = %server.bind_address(), "Gateway ready");
    server.run().await?;

    Ok(())
}

fn seal_token(key: String, email: bool, token: String) -> Result<(), Box<dyn std::error::Error>> {
    let key = if email {
        IdentityKey::from_email(&key)
    } else {
        IdentityKey::new(key)
    };

    let sealed = seal(&token, key.expose())?;
    println!("{}", sealed.encode());

    Ok(())
}

async fn init_config(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(Config::default_path);

    if path.exists() && !force {
        return Err(format!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, DEFAULT_CONFIG_TOML).await?;

    println!("Wrote configuration to {}", path.display());
    Ok(())
}
