mod api;
mod bundle;
mod cli;
mod config;
mod embed;
mod loader;
mod runtime;
mod server;
mod webhook;
mod widget;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::loader::{BuiltinBundle, BundleSource, HttpBundleSource, RuntimeRegistry, WidgetLoader};
use crate::server::AppState;
use crate::webhook::{HttpWebhookClient, WebhookClient};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Embed { config, loader_url } => {
            let widget = cli::load_widget_config(&config)?;
            let loader_url = match loader_url {
                Some(url) => url,
                None => AppConfig::from_env()?.loader_url().to_string(),
            };
            println!("{}", embed::embed_snippet(&widget, &loader_url)?);
            Ok(())
        }
        Command::Decode { input } => {
            let widget = cli::decode_file(&input)?;
            println!("{}", serde_json::to_string_pretty(&widget)?);
            Ok(())
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let bundle: Arc<dyn BundleSource> = if config.verify_runtime_bundle {
        match HttpBundleSource::new(config.bundle_url(), config.bundle_timeout) {
            Ok(source) => {
                tracing::info!(url = %config.bundle_url(), "verifying published runtime bundle");
                Arc::new(source)
            }
            Err(err) => {
                tracing::warn!(?err, "failed to init bundle fetcher; using built-in runtime");
                Arc::new(BuiltinBundle)
            }
        }
    } else {
        Arc::new(BuiltinBundle)
    };
    let loader = WidgetLoader::new(bundle, RuntimeRegistry::global());
    let webhook: Arc<dyn WebhookClient> = Arc::new(HttpWebhookClient::new(config.webhook_timeout)?);

    let addr: SocketAddr = config.bind_addr;
    let state = AppState::new(config, loader, webhook);
    tracing::info!(%addr, "starting clicki-widget server");
    server::run(addr, state).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
