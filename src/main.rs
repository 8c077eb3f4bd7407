use anyhow::Result;
use clap::Parser;
use my_ai_agent::models::Config;
use my_ai_agent::server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "my-ai-agent")]
#[command(about = "Answer queries with search-augmented, multimodal generation")]
struct CliArgs {
    /// Address to bind (overrides HOST).
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on (overrides PORT).
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

impl CliArgs {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "my_ai_agent=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting my-ai-agent");

    let args = CliArgs::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    match server::serve(config).await {
        Ok(()) => {
            info!("Server stopped");
            Ok(())
        }
        Err(e) => {
            error!("Server failed: {}", e);
            std::process::exit(1);
        }
    }
}
