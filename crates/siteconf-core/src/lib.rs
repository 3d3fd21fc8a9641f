//! siteconf-core: configuration resolution for static-site tooling
//!
//! This crate turns a partially specified site configuration (dev-server
//! binding, developer toolbar toggle, bundler plugins, bundler passthrough
//! options) into a fully resolved, immutable descriptor.
//!
//! # Example
//!
//! ```rust
//! use siteconf_core::{ConfigResolver, Host, RawConfig};
//!
//! let yaml = r#"
//! devToolbar:
//!   enabled: false
//! server:
//!   host: true
//!   port: 4321
//! plugins:
//!   - tailwindcss
//! "#;
//!
//! let raw = RawConfig::from_yaml(yaml).unwrap();
//! let resolved = ConfigResolver::new().resolve(&raw).unwrap();
//!
//! assert_eq!(resolved.server.host, Host::Flag(true));
//! assert_eq!(resolved.server.socket_address(), "0.0.0.0:4321");
//! assert_eq!(resolved.plugins[0].name(), "tailwindcss");
//! ```

pub mod error;
pub mod plugin;
pub mod schema;
pub mod value;

mod raw;
mod resolve;

pub use error::{ConfigError, Error, Result};
pub use plugin::{PluginDescriptor, PluginError, PluginFactory, PluginRegistry, PluginSpec};
pub use raw::{FileSpec, RawConfig};
pub use resolve::{
    resolve, ConfigResolver, DevToolbar, Host, ResolveOptions, ResolvedConfig, ServerBinding,
    UnknownKeyPolicy, DEFAULT_PORT, RECOGNIZED_KEYS,
};
pub use schema::Schema;
pub use value::Value;
