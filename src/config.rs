use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://quickreferralwidgetwithbuilder.vercel.app/";

/// Runtime configuration for the builder server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Where `widget.js` and `widget-bundle.js` are published.
    pub public_base_url: Url,
    pub assets_dir: PathBuf,
    pub enable_cors: bool,
    pub webhook_timeout: Duration,
    /// Timeout for fetching the published bundle when verification is on.
    pub bundle_timeout: Duration,
    /// Fetch the published bundle instead of registering the built-in runtime.
    pub verify_runtime_bundle: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_base_url: Url::parse(DEFAULT_PUBLIC_BASE_URL).expect("default base url"),
            assets_dir: PathBuf::from("assets"),
            enable_cors: false,
            webhook_timeout: Duration::from_secs(10),
            bundle_timeout: Duration::from_secs(5),
            verify_runtime_bundle: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let public_base_url = parse_base_url(
            &std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string()),
        )?;

        let assets_dir =
            PathBuf::from(std::env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".to_string()));

        let enable_cors = env_flag("ENABLE_CORS");
        let verify_runtime_bundle = env_flag("VERIFY_RUNTIME_BUNDLE");

        let defaults = Self::default();
        let webhook_timeout = env_millis("WEBHOOK_TIMEOUT_MS").unwrap_or(defaults.webhook_timeout);
        let bundle_timeout = env_millis("BUNDLE_TIMEOUT_MS").unwrap_or(defaults.bundle_timeout);

        Ok(Self {
            bind_addr,
            public_base_url,
            assets_dir,
            enable_cors,
            webhook_timeout,
            bundle_timeout,
            verify_runtime_bundle,
        })
    }

    pub fn loader_url(&self) -> Url {
        self.asset_url("widget.js")
    }

    pub fn bundle_url(&self) -> Url {
        self.asset_url("widget-bundle.js")
    }

    fn asset_url(&self, file: &str) -> Url {
        self.public_base_url
            .join(file)
            .unwrap_or_else(|_| self.public_base_url.clone())
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key).ok().as_deref().and_then(parse_millis)
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_millis)
}

/// A base without a trailing slash would make `join` drop its last segment.
fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).with_context(|| format!("failed to parse PUBLIC_BASE_URL {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_urls_hang_off_the_base() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.loader_url().as_str(),
            "https://quickreferralwidgetwithbuilder.vercel.app/widget.js"
        );
        assert_eq!(
            cfg.bundle_url().as_str(),
            "https://quickreferralwidgetwithbuilder.vercel.app/widget-bundle.js"
        );
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let cfg = AppConfig {
            public_base_url: parse_base_url("https://cdn.example.com/clicki").unwrap(),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.loader_url().as_str(),
            "https://cdn.example.com/clicki/widget.js"
        );
    }

    #[test]
    fn bundle_and_webhook_timeouts_are_separate() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.webhook_timeout, Duration::from_secs(10));
        assert_eq!(cfg.bundle_timeout, Duration::from_secs(5));
        assert_eq!(parse_millis(" 2500 "), Some(Duration::from_millis(2500)));
        assert_eq!(parse_millis("soon"), None);
    }

    #[test]
    fn rejects_garbage_base_url() {
        assert!(parse_base_url("not a url").is_err());
    }
}
