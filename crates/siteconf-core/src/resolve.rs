//! Configuration resolution
//!
//! [`ConfigResolver::resolve`] turns a partial [`RawConfig`] into a
//! [`ResolvedConfig`] in which every field has a concrete value:
//!
//! 1. start from the defaults (`devToolbar.enabled = true`, `server.host = false`,
//!    `server.port = 4321`, no plugins, empty `vite` section)
//! 2. check top-level keys against the recognized set, per [`UnknownKeyPolicy`]
//! 3. overlay every field that is explicitly present, checking its domain
//! 4. invoke plugin factories in declaration order
//!
//! Any failure aborts resolution. Nothing is retried or skipped.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::plugin::{PluginDescriptor, PluginRegistry, PluginSpec};
use crate::raw::RawConfig;
use crate::value::Value;

/// Default dev-server port
pub const DEFAULT_PORT: u16 = 4321;

const DEV_TOOLBAR: &str = "devToolbar";
const SERVER: &str = "server";
const PLUGINS: &str = "plugins";
const VITE: &str = "vite";

/// Top-level keys the resolver understands
pub const RECOGNIZED_KEYS: &[&str] = &[DEV_TOOLBAR, SERVER, PLUGINS, VITE];

const DEV_TOOLBAR_FIELDS: &[&str] = &["enabled"];
const SERVER_FIELDS: &[&str] = &["host", "port"];

const PORT_DOMAIN: &str = "an integer in 1..=65535";

/// What to do with keys the resolver does not recognize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Reject the configuration
    #[default]
    Strict,
    /// Log a warning and ignore the key
    Lenient,
}

/// Options controlling resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Policy for unrecognized keys, at the top level and inside
    /// `devToolbar` and `server`
    pub unknown_keys: UnknownKeyPolicy,
}

impl ResolveOptions {
    pub fn lenient() -> Self {
        Self {
            unknown_keys: UnknownKeyPolicy::Lenient,
        }
    }
}

/// Address the dev server binds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    /// `true` binds all interfaces, `false` binds loopback only
    Flag(bool),
    /// A specific hostname or address
    Name(String),
}

impl Host {
    /// The address a listening socket should bind to
    pub fn bind_address(&self) -> &str {
        match self {
            Host::Flag(true) => "0.0.0.0",
            Host::Flag(false) => "localhost",
            Host::Name(name) => name,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Host::Flag(b) => Value::Bool(*b),
            Host::Name(name) => Value::String(name.clone()),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Flag(b) => write!(f, "{}", b),
            Host::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Dev-server network binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBinding {
    pub host: Host,
    pub port: u16,
}

impl ServerBinding {
    /// `host:port` suitable for `TcpListener::bind`; IPv6 literals are bracketed
    pub fn socket_address(&self) -> String {
        let host = self.host.bind_address();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl Default for ServerBinding {
    fn default() -> Self {
        Self {
            host: Host::Flag(false),
            port: DEFAULT_PORT,
        }
    }
}

/// Developer overlay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevToolbar {
    pub enabled: bool,
}

impl Default for DevToolbar {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Fully resolved configuration
///
/// Built once at startup and shared read-only with the dev server (which reads
/// `server`) and the bundler (which reads `plugins` and `vite`).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub dev_toolbar: DevToolbar,
    pub server: ServerBinding,
    /// Plugins in declaration order
    pub plugins: Vec<PluginDescriptor>,
    /// Bundler options, forwarded verbatim
    pub vite: Value,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            dev_toolbar: DevToolbar::default(),
            server: ServerBinding::default(),
            plugins: Vec::new(),
            vite: Value::empty_mapping(),
        }
    }
}

impl ResolvedConfig {
    /// Configuration form of the resolved descriptor
    ///
    /// Resolving this value again yields an equal `ResolvedConfig`.
    pub fn to_value(&self) -> Value {
        let mut dev_toolbar = IndexMap::new();
        dev_toolbar.insert("enabled".to_string(), Value::Bool(self.dev_toolbar.enabled));

        let mut server = IndexMap::new();
        server.insert("host".to_string(), self.server.host.to_value());
        server.insert("port".to_string(), Value::from(self.server.port));

        let mut root = IndexMap::new();
        root.insert(DEV_TOOLBAR.to_string(), Value::Mapping(dev_toolbar));
        root.insert(SERVER.to_string(), Value::Mapping(server));
        root.insert(
            PLUGINS.to_string(),
            Value::Sequence(self.plugins.iter().map(|p| p.spec().to_value()).collect()),
        );
        root.insert(VITE.to_string(), self.vite.clone());
        Value::Mapping(root)
    }
}

impl From<&ResolvedConfig> for RawConfig {
    fn from(resolved: &ResolvedConfig) -> Self {
        // to_value always produces a mapping root
        RawConfig::from_value(resolved.to_value()).unwrap_or_default()
    }
}

/// Merges authored configuration with defaults and builds the plugin pipeline
#[derive(Clone)]
pub struct ConfigResolver {
    registry: PluginRegistry,
    options: ResolveOptions,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver with the built-in plugin factories and strict key checking
    pub fn new() -> Self {
        Self {
            registry: PluginRegistry::with_builtins(),
            options: ResolveOptions::default(),
        }
    }

    /// Replace the plugin registry
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the resolve options
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve a raw configuration
    pub fn resolve(&self, raw: &RawConfig) -> Result<ResolvedConfig> {
        log::debug!(
            "Resolving configuration (unknown keys: {:?})",
            self.options.unknown_keys
        );

        self.check_keys("", raw.keys(), RECOGNIZED_KEYS)?;

        let mut resolved = ResolvedConfig::default();

        if let Some(section) = self.section(raw, DEV_TOOLBAR, DEV_TOOLBAR_FIELDS)? {
            if let Some(enabled) = field(section, "enabled") {
                resolved.dev_toolbar.enabled = enabled
                    .as_bool()
                    .ok_or_else(|| invalid("devToolbar.enabled", "a boolean", enabled))?;
            }
        }

        if let Some(section) = self.section(raw, SERVER, SERVER_FIELDS)? {
            if let Some(host) = field(section, "host") {
                resolved.server.host = parse_host(host)?;
            }
            if let Some(port) = field(section, "port") {
                resolved.server.port = parse_port(port)?;
            }
        }

        if let Some(vite) = raw.get(VITE).filter(|v| !v.is_null()) {
            resolved.vite = vite.clone();
        }

        // Every invocation is checked before any factory runs, so a malformed
        // entry late in the list never leaves earlier factories half-applied.
        let specs = parse_plugins(raw.get(PLUGINS))?;
        resolved.plugins = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                self.registry
                    .create(spec)
                    .map_err(|e| e.with_path(format!("{}[{}]", PLUGINS, i)))
            })
            .collect::<Result<_>>()?;

        log::debug!(
            "Resolved configuration: server {}, dev toolbar {}, {} plugin(s)",
            resolved.server.socket_address(),
            if resolved.dev_toolbar.enabled { "on" } else { "off" },
            resolved.plugins.len()
        );

        Ok(resolved)
    }

    /// Fetch a recognized section, checking that it is a mapping and that its
    /// fields are known. Absent and null sections both yield `None`.
    fn section<'a>(
        &self,
        raw: &'a RawConfig,
        name: &str,
        fields: &[&str],
    ) -> Result<Option<&'a IndexMap<String, Value>>> {
        let Some(value) = raw.get(name).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let map = value
            .as_mapping()
            .ok_or_else(|| invalid(name, "a mapping", value))?;
        self.check_keys(name, map.keys().map(String::as_str), fields)?;
        Ok(Some(map))
    }

    fn check_keys<'k>(
        &self,
        prefix: &str,
        keys: impl Iterator<Item = &'k str>,
        recognized: &[&str],
    ) -> Result<()> {
        for key in keys.filter(|k| !recognized.iter().any(|r| r == k)) {
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            };
            match self.options.unknown_keys {
                UnknownKeyPolicy::Strict => return Err(Error::unknown_option(path, recognized)),
                UnknownKeyPolicy::Lenient => {
                    log::warn!("Ignoring unrecognized configuration key '{}'", path)
                }
            }
        }
        Ok(())
    }
}

/// Resolve with the built-in plugins and default options
pub fn resolve(raw: &RawConfig) -> Result<ResolvedConfig> {
    ConfigResolver::new().resolve(raw)
}

/// A field that is explicitly set; null means "keep the default"
fn field<'a>(section: &'a IndexMap<String, Value>, name: &str) -> Option<&'a Value> {
    section.get(name).filter(|v| !v.is_null())
}

fn invalid(path: &str, expected: &str, got: &Value) -> Error {
    Error::invalid_option(path, expected, format!("{} ({})", got, got.type_name()))
}

fn parse_host(value: &Value) -> Result<Host> {
    const EXPECTED: &str = "a boolean or a hostname without surrounding whitespace";

    match value {
        Value::Bool(b) => Ok(Host::Flag(*b)),
        Value::String(name) if !name.is_empty() && name.trim() == name => {
            Ok(Host::Name(name.clone()))
        }
        other => Err(invalid("server.host", EXPECTED, other)),
    }
}

fn parse_port(value: &Value) -> Result<u16> {
    value
        .as_i64()
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| invalid("server.port", PORT_DOMAIN, value))
}

fn parse_plugins(value: Option<&Value>) -> Result<Vec<PluginSpec>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| PluginSpec::from_value(item, &format!("{}[{}]", PLUGINS, i)))
            .collect(),
        Some(other) => Err(invalid(PLUGINS, "a sequence of plugin invocations", other)),
    }
}
