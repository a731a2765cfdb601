use anyhow::{Context, Result};
use callbridge_server::{DEFAULT_PORT, DEFAULT_RELAY_PATH, RelayServer, ServerConfig};
use clap::{Parser, Subcommand};
use colored::*;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "callbridge")]
#[command(about = "Signaling relay for one-to-one WebRTC calls")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay.
    Serve {
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        host: IpAddr,

        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Route of the WebSocket endpoint.
        #[arg(long, default_value = DEFAULT_RELAY_PATH)]
        path: String,

        /// Serve a built client bundle from this directory at `/`.
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            path,
            static_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                relay_path: normalize_path(&path),
                static_dir,
            };
            serve(config).await?;
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn serve(config: ServerConfig) -> Result<()> {
    let server = RelayServer::bind(&config)
        .await
        .with_context(|| format!("Failed to bind {}", config.socket_addr()))?;
    let addr = server.local_addr()?;

    println!("{}", "📞 callbridge relay is up".green().bold());
    println!("   🔌 Relay:  ws://{}{}", addr, config.relay_path);
    match &config.static_dir {
        Some(dir) => println!("   📂 Static: {} at http://{}/", dir.display(), addr),
        None => println!("   📂 Static: {}", "disabled".dimmed()),
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("Relay stopped with an error")?;

    println!("{}", "👋 Relay stopped".cyan());
    Ok(())
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{}", path)
    }
}
