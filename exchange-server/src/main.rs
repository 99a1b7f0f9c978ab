use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use exchange_server::{create_router, AppState, Config};

#[derive(Parser, Debug)]
#[command(name = "exchange-server")]
#[command(about = "Credential issuer and presentation verifier")]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Public URL of the server
    ///
    /// Used as the credential issuer identifier and in every link handed to wallets.
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<Url>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// JSON file persisting the schema registry
    #[arg(long, env = "SCHEMA_FILE")]
    schema_file: Option<PathBuf>,

    /// client_id placed in presentation requests
    #[arg(long, env = "CLIENT_ID")]
    client_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;

    let public_url = match cli.public_url.clone() {
        Some(url) => url,
        None => format!("http://{}:{}", cli.host, cli.port)
            .parse()
            .context("invalid host or port for the public URL")?,
    };

    let config = Config {
        public_url,
        port: cli.port,
        host: cli.host.clone(),
        schema_file: cli.schema_file.clone(),
        client_id: cli.client_id.clone(),
    };

    let state = Arc::new(AppState::new(config.clone())?);
    print_startup_banner(&config, &state.verifier.config().client_id);

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("exchange_server=debug".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower_http=info".parse()?);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();

    Ok(())
}

fn print_startup_banner(config: &Config, client_id: &str) {
    let base_url = config.public_url.as_str().trim_end_matches('/');
    let schemas = config
        .schema_file
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "in memory".to_string());

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                   Credential Exchange Server                     ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║                                                                  ║");
    println!("║  Public URL:           {:<40} ║", base_url);
    println!("║  Verifier client_id:   {:<40} ║", client_id);
    println!("║  Schemas:              {:<40} ║", schemas);
    println!("║                                                                  ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  Endpoints:                                                      ║");
    println!("║    GET  {}/.well-known/openid-credential-issuer", base_url);
    println!("║    POST {}/offers", base_url);
    println!("║    POST {}/token", base_url);
    println!("║    POST {}/credential", base_url);
    println!("║    POST {}/presentation-request", base_url);
    println!("║    POST {}/presentation-response", base_url);
    println!("║    GET  {}/health", base_url);
    println!("║                                                                  ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
}
