use crate::widget::WidgetConfig;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "clicki-widget", version, about = "Referral widget builder and embed tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Print the embed snippet for a widget config (.json or .toml).
    Embed {
        config: PathBuf,
        /// Overrides the loader URL derived from PUBLIC_BASE_URL.
        #[arg(long)]
        loader_url: Option<String>,
    },
    /// Print the config carried by a snippet or an encoded payload.
    Decode { input: PathBuf },
}

pub fn load_widget_config(path: &Path) -> anyhow::Result<WidgetConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading widget config {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw).with_context(|| format!("parsing toml {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("parsing json {}", path.display()))
    }
}

/// Reads a pasted snippet or bare payload and decodes the config it carries.
pub fn decode_file(path: &Path) -> anyhow::Result<WidgetConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading snippet {}", path.display()))?;
    crate::embed::decode_snippet_or_payload(&raw)
        .with_context(|| format!("decoding snippet {}", path.display()))
}
