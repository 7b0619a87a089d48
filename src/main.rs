use clap::{Parser, Subcommand};
use lostfound_cors::admin::{self, AdminCommands};
use lostfound_cors::config::{Config, LogFormat};
use lostfound_cors::error::AppResult;
use lostfound_cors::server;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// lostfound-cors - cross-origin policy for the Lost & Found backend
#[derive(Parser, Debug)]
#[command(name = "lostfound-cors")]
#[command(version)]
#[command(about = "Cross-origin policy for the Lost & Found backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server
    Server {
        /// Host to bind to (overrides SERVER_HOST env var)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides SERVER_PORT env var)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        admin_command: AdminCommands,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Load configuration first; it decides the log format
    let config = Config::from_env()?;
    init_tracing(config.logging.format);

    match cli.command {
        Commands::Server { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            let addr = config.server.bind_addr();
            server::run_server(config, addr).await
        }
        Commands::Admin { admin_command } => admin::run(config, admin_command),
    }
}
