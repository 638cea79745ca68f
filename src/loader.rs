use crate::embed::js_single_quoted;
use crate::runtime::Widget;
use crate::widget::WidgetConfig;
use async_trait::async_trait;
use kuchiki::NodeRef;
use kuchiki::traits::*;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

pub const CONTAINER_ID: &str = "clicki-widget-container";
pub const RUNTIME_GLOBAL: &str = "ClickiWidget";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("widget mount failed: {0}")]
    Mount(String),
    #[error("runtime bundle failed to load: {0}")]
    BundleFetch(String),
    #[error("runtime bundle did not register ClickiWidget")]
    MissingRuntime,
}

/// Script served as `widget.js`: defines `initClickiWidget` on the host page.
pub fn loader_script(bundle_url: &str) -> String {
    format!(
        r#"// Clicki widget loader
(function(global) {{
  var BUNDLE_URL = '{bundle}';
  var CONTAINER_ID = '{CONTAINER_ID}';
  var bundlePromise = null;

  function ensureContainer() {{
    var el = document.getElementById(CONTAINER_ID);
    if (!el) {{
      el = document.createElement('div');
      el.id = CONTAINER_ID;
      document.body.appendChild(el);
    }}
    return el;
  }}

  function loadBundle() {{
    if (typeof global.{RUNTIME_GLOBAL} !== 'undefined') {{
      return Promise.resolve();
    }}
    if (!bundlePromise) {{
      bundlePromise = new Promise(function(resolve, reject) {{
        var script = document.createElement('script');
        script.src = BUNDLE_URL;
        script.async = true;
        script.onload = function() {{ resolve(); }};
        script.onerror = function() {{ reject(new Error('failed to load ' + BUNDLE_URL)); }};
        document.body.appendChild(script);
      }});
    }}
    return bundlePromise;
  }}

  global.initClickiWidget = function(config) {{
    if (!document.body) {{
      console.error('Clicki widget container not found');
      return;
    }}
    ensureContainer();
    loadBundle().then(function() {{
      if (typeof global.{RUNTIME_GLOBAL} === 'undefined') {{
        console.error('{RUNTIME_GLOBAL} failed to load');
        return;
      }}
      new global.{RUNTIME_GLOBAL}(config);
    }}, function(err) {{
      console.error('{RUNTIME_GLOBAL} failed to load', err);
    }});
  }};
}})(window);
"#,
        bundle = js_single_quoted(bundle_url),
    )
}

pub type WidgetFactory = fn(WidgetConfig) -> Widget;

/// Holds the widget constructor once a runtime bundle has registered it.
#[derive(Default)]
pub struct RuntimeRegistry {
    factory: OnceLock<WidgetFactory>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by every loader in the server.
    pub fn global() -> &'static RuntimeRegistry {
        static GLOBAL: OnceLock<RuntimeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RuntimeRegistry::new)
    }

    /// Returns false when a factory was already registered; the first one wins.
    pub fn register(&self, factory: WidgetFactory) -> bool {
        let fresh = self.factory.set(factory).is_ok();
        if !fresh {
            debug!("widget runtime already registered; ignoring");
        }
        fresh
    }

    pub fn factory(&self) -> Option<WidgetFactory> {
        self.factory.get().copied()
    }
}

/// Where the runtime comes from.
#[async_trait]
pub trait BundleSource: Send + Sync {
    async fn load(&self, registry: &RuntimeRegistry) -> Result<(), LoadError>;
}

/// Registers the in-process runtime without any network activity.
#[derive(Clone, Default)]
pub struct BuiltinBundle;

#[async_trait]
impl BundleSource for BuiltinBundle {
    async fn load(&self, registry: &RuntimeRegistry) -> Result<(), LoadError> {
        registry.register(Widget::new);
        Ok(())
    }
}

/// Fetches the published bundle and only registers the runtime if the
/// script actually defines the expected global.
#[derive(Clone)]
pub struct HttpBundleSource {
    url: url::Url,
    client: reqwest::Client,
}

impl HttpBundleSource {
    pub fn new(url: url::Url, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl BundleSource for HttpBundleSource {
    async fn load(&self, registry: &RuntimeRegistry) -> Result<(), LoadError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| LoadError::BundleFetch(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::BundleFetch(format!(
                "{} responded with {status}",
                self.url
            )));
        }
        let script = resp
            .text()
            .await
            .map_err(|err| LoadError::BundleFetch(err.to_string()))?;
        if !defines_runtime_global(&script) {
            return Err(LoadError::MissingRuntime);
        }
        registry.register(Widget::new);
        Ok(())
    }
}

fn defines_runtime_global(script: &str) -> bool {
    static ASSIGN: OnceLock<Regex> = OnceLock::new();
    ASSIGN
        .get_or_init(|| {
            Regex::new(&format!(
                r"\b(?:window|globalThis|global|self)\.{RUNTIME_GLOBAL}\s*="
            ))
            .expect("static regex")
        })
        .is_match(script)
}

/// Host page parsed for mounting.
pub struct HostDocument {
    root: NodeRef,
}

impl HostDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchiki::parse_html().one(html),
        }
    }

    pub fn has_mount_point(&self) -> bool {
        self.mount_node().is_some()
    }

    /// Appends the container to `<body>` unless it already exists.
    pub fn ensure_mount_point(&mut self) -> Result<(), LoadError> {
        if self.has_mount_point() {
            return Ok(());
        }
        let body = self
            .root
            .select_first("body")
            .map_err(|_| LoadError::Mount("host document has no body".to_string()))?;
        for child in parse_fragment(&format!(r#"<div id="{CONTAINER_ID}"></div>"#))? {
            body.as_node().append(child);
        }
        Ok(())
    }

    /// Replaces the container's children with the rendered widget.
    pub fn mount(&mut self, widget_html: &str) -> Result<(), LoadError> {
        let node = self
            .mount_node()
            .ok_or_else(|| LoadError::Mount(format!("#{CONTAINER_ID} not found")))?;
        let existing: Vec<_> = node.children().collect();
        for child in existing {
            child.detach();
        }
        for child in parse_fragment(widget_html)? {
            node.append(child);
        }
        Ok(())
    }

    pub fn to_html(&self) -> String {
        self.root.to_string()
    }

    fn mount_node(&self) -> Option<NodeRef> {
        self.root
            .select_first(&format!("#{CONTAINER_ID}"))
            .ok()
            .map(|el| el.as_node().clone())
    }
}

fn parse_fragment(html: &str) -> Result<Vec<NodeRef>, LoadError> {
    let wrapper_html = format!(r#"<div id="__clicki_fragment_wrapper">{html}</div>"#);
    let doc = kuchiki::parse_html().one(wrapper_html);
    let wrapper = doc
        .select_first("#__clicki_fragment_wrapper")
        .map_err(|_| LoadError::Mount("widget markup could not be parsed".to_string()))?;
    Ok(wrapper.as_node().children().collect())
}

/// Widget rendered into a host page.
#[derive(Debug)]
pub struct MountedWidget {
    pub html: String,
    #[allow(dead_code)]
    pub widget: Widget,
}

/// Server-side counterpart of `initClickiWidget`.
///
/// The bundle is loaded at most once per loader; a failed load is remembered
/// and every later call reports the same error without fetching again.
pub struct WidgetLoader {
    bundle: Arc<dyn BundleSource>,
    registry: &'static RuntimeRegistry,
    loaded: OnceCell<Result<(), LoadError>>,
}

impl WidgetLoader {
    pub fn new(bundle: Arc<dyn BundleSource>, registry: &'static RuntimeRegistry) -> Self {
        Self {
            bundle,
            registry,
            loaded: OnceCell::new(),
        }
    }

    async fn runtime(&self) -> Result<WidgetFactory, LoadError> {
        self.loaded
            .get_or_init(|| async {
                let res = self.bundle.load(self.registry).await;
                if res.is_ok() {
                    info!("widget runtime loaded");
                }
                res
            })
            .await
            .clone()?;
        self.registry.factory().ok_or(LoadError::MissingRuntime)
    }

    pub async fn init(
        &self,
        host_html: &str,
        config: WidgetConfig,
        open: bool,
    ) -> Result<MountedWidget, LoadError> {
        let factory = self.runtime().await.inspect_err(|err| {
            error!(%err, "widget runtime unavailable; widget not mounted");
        })?;
        let mut document = HostDocument::parse(host_html);
        document.ensure_mount_point().inspect_err(|err| {
            error!(%err, "widget mount point unavailable");
        })?;
        let mut widget = factory(config);
        if open {
            widget.open();
        }
        document.mount(&widget.render()).inspect_err(|err| {
            error!(%err, "widget mount failed");
        })?;
        Ok(MountedWidget {
            html: document.to_html(),
            widget,
        })
    }
}
