//! Bundler plugin factories
//!
//! A plugin is declared in configuration as an invocation: a factory name plus
//! zero or more arguments. The resolver looks the factory up in a
//! [`PluginRegistry`], calls it, and wraps whatever it returns in an opaque
//! [`PluginDescriptor`]. Only the bundler knows what the payload inside a
//! descriptor is; siteconf just keeps descriptors in declaration order.
//!
//! ```
//! use siteconf_core::{PluginRegistry, PluginSpec, Value};
//!
//! let mut registry = PluginRegistry::new();
//! registry.register_fn("banner", |args: &[Value]| {
//!     let text = args.first().and_then(Value::as_str).unwrap_or("built with siteconf");
//!     Ok(siteconf_core::plugin::handle(text.to_string()))
//! });
//!
//! let plugin = registry.create(&PluginSpec::new("banner")).unwrap();
//! assert_eq!(plugin.name(), "banner");
//! assert_eq!(plugin.downcast_ref::<String>().unwrap(), "built with siteconf");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// Type-erased plugin state produced by a factory
pub type PluginHandle = Arc<dyn Any + Send + Sync>;

/// Result type for plugin factories
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Wrap a concrete plugin value into a [`PluginHandle`]
pub fn handle<T: Any + Send + Sync>(plugin: T) -> PluginHandle {
    Arc::new(plugin)
}

/// Error raised by a plugin factory
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// More arguments than the factory accepts
    #[error("expected at most {max} argument(s), got {got}")]
    TooManyArguments { max: usize, got: usize },
    /// An argument has the wrong shape
    #[error("invalid argument {index}: {message}")]
    InvalidArgument { index: usize, message: String },
    /// Anything else the factory wants to report
    #[error("{0}")]
    Custom(String),
}

/// One plugin invocation as declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSpec {
    /// Name of the factory to invoke
    pub name: String,
    /// Arguments handed to the factory, in order
    pub args: Vec<Value>,
}

impl PluginSpec {
    /// An invocation without arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Parse an invocation from its configuration form
    ///
    /// Accepts a bare factory name (`"tailwindcss"`) or a mapping
    /// `{name: "tailwindcss", args: [...]}`. `path` is used for error reporting.
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        const EXPECTED: &str = "a plugin name or a mapping with `name` and optional `args`";

        match value {
            Value::String(name) if !name.is_empty() => Ok(Self::new(name.clone())),
            Value::Mapping(map) => {
                let name = match map.get("name") {
                    Some(Value::String(name)) if !name.is_empty() => name.clone(),
                    Some(other) => {
                        return Err(Error::invalid_option(
                            format!("{}.name", path),
                            "a non-empty string",
                            other.to_string(),
                        ))
                    }
                    None => {
                        return Err(Error::invalid_option(path, EXPECTED, value.to_string()))
                    }
                };
                let args = match map.get("args") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Sequence(args)) => args.clone(),
                    Some(other) => {
                        return Err(Error::invalid_option(
                            format!("{}.args", path),
                            "a sequence",
                            other.to_string(),
                        ))
                    }
                };
                if let Some(extra) = map.keys().find(|k| *k != "name" && *k != "args") {
                    return Err(Error::invalid_option(
                        format!("{}.{}", path, extra),
                        "only `name` and `args` keys",
                        extra.clone(),
                    ));
                }
                Ok(Self { name, args })
            }
            other => Err(Error::invalid_option(path, EXPECTED, other.to_string())),
        }
    }

    /// Configuration form of this invocation; the inverse of [`PluginSpec::from_value`]
    pub fn to_value(&self) -> Value {
        if self.args.is_empty() {
            return Value::String(self.name.clone());
        }
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("args".to_string(), Value::Sequence(self.args.clone()));
        Value::Mapping(map)
    }
}

/// Opaque handle to a constructed plugin
///
/// Equality compares the invocation that produced the plugin, never the payload.
#[derive(Clone)]
pub struct PluginDescriptor {
    spec: PluginSpec,
    payload: PluginHandle,
}

impl PluginDescriptor {
    pub fn new(spec: PluginSpec, payload: PluginHandle) -> Self {
        Self { spec, payload }
    }

    /// Factory name this plugin was built by
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The invocation this plugin was built from
    pub fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    /// The raw payload, for consumers that dispatch on type themselves
    pub fn payload(&self) -> &PluginHandle {
        &self.payload
    }

    /// Borrow the payload as a concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.spec.name)
            .field("args", &self.spec.args)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PluginDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

/// Trait for plugin factory implementations
pub trait PluginFactory: Send + Sync {
    /// Name the factory is referenced by in configuration
    fn name(&self) -> &str;

    /// Build a plugin from the declared arguments
    fn create(&self, args: &[Value]) -> PluginResult<PluginHandle>;
}

/// A simple function-based plugin factory
pub struct FnPluginFactory<F>
where
    F: Fn(&[Value]) -> PluginResult<PluginHandle> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnPluginFactory<F>
where
    F: Fn(&[Value]) -> PluginResult<PluginHandle> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> PluginFactory for FnPluginFactory<F>
where
    F: Fn(&[Value]) -> PluginResult<PluginHandle> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, args: &[Value]) -> PluginResult<PluginHandle> {
        (self.func)(args)
    }
}

/// Registry of available plugin factories
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in factories
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FnPluginFactory::new(
            TAILWINDCSS,
            tailwindcss_factory,
        )));
        registry
    }

    /// Register a factory, replacing any factory with the same name
    pub fn register(&mut self, factory: Arc<dyn PluginFactory>) {
        self.factories.insert(factory.name().to_string(), factory);
    }

    /// Register a factory with optional force overwrite.
    ///
    /// Returns an error if `force` is false and the name is already taken.
    pub fn register_with_force(&mut self, factory: Arc<dyn PluginFactory>, force: bool) -> Result<()> {
        let name = factory.name().to_string();
        if !force && self.factories.contains_key(&name) {
            return Err(Error::plugin_already_registered(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Register a function as a factory
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> PluginResult<PluginHandle> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnPluginFactory::new(name, func)));
    }

    /// Get a factory by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn PluginFactory>> {
        self.factories.get(name)
    }

    /// Check if a factory is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered factory names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke the factory named by `spec`
    ///
    /// Factory errors are surfaced as plugin init failures with the factory's
    /// error attached as the source.
    pub fn create(&self, spec: &PluginSpec) -> Result<PluginDescriptor> {
        let factory = self
            .factories
            .get(&spec.name)
            .ok_or_else(|| Error::unknown_plugin(&spec.name))?;

        log::trace!(
            "Invoking plugin factory '{}' with {} argument(s)",
            spec.name,
            spec.args.len()
        );

        let payload = factory
            .create(&spec.args)
            .map_err(|e| Error::plugin_init_failure(&spec.name, e))?;

        Ok(PluginDescriptor::new(spec.clone(), payload))
    }
}

/// Name of the built-in CSS bundler integration
pub const TAILWINDCSS: &str = "tailwindcss";

/// Options of the built-in Tailwind CSS bundler integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailwindCss {
    /// Optimize generated CSS in production builds
    pub optimize: bool,
    /// Minify the optimized CSS
    pub minify: bool,
}

impl Default for TailwindCss {
    fn default() -> Self {
        Self {
            optimize: true,
            minify: true,
        }
    }
}

/// Built-in Tailwind CSS factory
///
/// Usage:
///   plugins: [tailwindcss]
///   plugins: [{name: tailwindcss, args: [{optimize: false}]}]
///   plugins: [{name: tailwindcss, args: [{optimize: {minify: false}}]}]
fn tailwindcss_factory(args: &[Value]) -> PluginResult<PluginHandle> {
    let mut plugin = TailwindCss::default();

    let options = match args {
        [] => return Ok(handle(plugin)),
        [options] => options,
        _ => {
            return Err(PluginError::TooManyArguments {
                max: 1,
                got: args.len(),
            })
        }
    };

    let options = options.as_mapping().ok_or_else(|| PluginError::InvalidArgument {
        index: 0,
        message: format!("expected an options mapping, got {}", options.type_name()),
    })?;

    for (key, value) in options {
        match (key.as_str(), value) {
            ("optimize", Value::Bool(enabled)) => {
                plugin.optimize = *enabled;
                plugin.minify = *enabled;
            }
            ("optimize", Value::Mapping(opt)) => {
                plugin.optimize = true;
                match opt.get("minify") {
                    None => {}
                    Some(Value::Bool(minify)) => plugin.minify = *minify,
                    Some(other) => {
                        return Err(PluginError::InvalidArgument {
                            index: 0,
                            message: format!(
                                "`optimize.minify` must be a boolean, got {}",
                                other.type_name()
                            ),
                        })
                    }
                }
            }
            ("optimize", other) => {
                return Err(PluginError::InvalidArgument {
                    index: 0,
                    message: format!(
                        "`optimize` must be a boolean or a mapping, got {}",
                        other.type_name()
                    ),
                })
            }
            (unknown, _) => {
                return Err(PluginError::InvalidArgument {
                    index: 0,
                    message: format!("unknown option `{}`", unknown),
                })
            }
        }
    }

    Ok(handle(plugin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PluginErrorKind};
    use pretty_assertions::assert_eq;
    use std::error::Error as _;

    fn options(entries: Vec<(&str, Value)>) -> Value {
        Value::Mapping(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_spec_from_bare_name() {
        let spec = PluginSpec::from_value(&Value::from("tailwindcss"), "plugins[0]").unwrap();
        assert_eq!(spec, PluginSpec::new("tailwindcss"));
    }

    #[test]
    fn test_spec_from_mapping() {
        let value = options(vec![
            ("name", Value::from("tailwindcss")),
            ("args", Value::Sequence(vec![options(vec![("optimize", Value::Bool(false))])])),
        ]);
        let spec = PluginSpec::from_value(&value, "plugins[0]").unwrap();

        assert_eq!(spec.name, "tailwindcss");
        assert_eq!(spec.args.len(), 1);
        assert_eq!(PluginSpec::from_value(&spec.to_value(), "p").unwrap(), spec);
    }

    #[test]
    fn test_spec_rejects_bad_shapes() {
        let cases = vec![
            (Value::from(""), "plugins[0]"),
            (Value::from(3), "plugins[0]"),
            (options(vec![("args", Value::Sequence(vec![]))]), "plugins[0]"),
            (options(vec![("name", Value::from(true))]), "plugins[0].name"),
            (
                options(vec![("name", Value::from("x")), ("args", Value::from("y"))]),
                "plugins[0].args",
            ),
            (
                options(vec![("name", Value::from("x")), ("options", Value::Null)]),
                "plugins[0].options",
            ),
        ];

        for (value, path) in cases {
            let err = PluginSpec::from_value(&value, "plugins[0]").unwrap_err();
            assert!(err.is_invalid_option(), "{:?}", value);
            assert_eq!(err.path.as_deref(), Some(path));
        }
    }

    #[test]
    fn test_registry_builtins() {
        let registry = PluginRegistry::with_builtins();

        assert!(registry.contains(TAILWINDCSS));
        assert!(!registry.contains("nonexistent"));
        assert_eq!(registry.get(TAILWINDCSS).map(|f| f.name()), Some(TAILWINDCSS));
        assert_eq!(registry.names(), vec![TAILWINDCSS]);
    }

    #[test]
    fn test_register_with_force() {
        let mut registry = PluginRegistry::with_builtins();
        let factory = Arc::new(FnPluginFactory::new(TAILWINDCSS, |_: &[Value]| {
            Ok(handle(()))
        }));

        let err = registry.register_with_force(factory.clone(), false).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Plugin(PluginErrorKind::AlreadyRegistered {
                name: TAILWINDCSS.into()
            })
        );

        registry.register_with_force(factory, true).unwrap();
        let plugin = registry.create(&PluginSpec::new(TAILWINDCSS)).unwrap();
        assert!(plugin.downcast_ref::<TailwindCss>().is_none());
    }

    #[test]
    fn test_create_unknown_plugin() {
        let registry = PluginRegistry::new();
        let err = registry.create(&PluginSpec::new("missing")).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Plugin(PluginErrorKind::UnknownFactory {
                name: "missing".into()
            })
        );
    }

    #[test]
    fn test_factory_error_is_attached() {
        let mut registry = PluginRegistry::new();
        registry.register_fn("broken", |_: &[Value]| {
            Err(PluginError::Custom("missing peer dependency".into()))
        });

        let err = registry.create(&PluginSpec::new("broken")).unwrap_err();
        let source = err.source().unwrap();

        assert!(matches!(
            source.downcast_ref::<PluginError>(),
            Some(PluginError::Custom(msg)) if msg == "missing peer dependency"
        ));
    }

    #[test]
    fn test_tailwindcss_defaults() {
        let registry = PluginRegistry::with_builtins();
        let plugin = registry.create(&PluginSpec::new(TAILWINDCSS)).unwrap();

        assert_eq!(plugin.downcast_ref::<TailwindCss>(), Some(&TailwindCss::default()));
    }

    #[test]
    fn test_tailwindcss_options() {
        let registry = PluginRegistry::with_builtins();

        let off = PluginSpec::new(TAILWINDCSS).with_arg(options(vec![("optimize", Value::Bool(false))]));
        assert_eq!(
            registry.create(&off).unwrap().downcast_ref::<TailwindCss>(),
            Some(&TailwindCss {
                optimize: false,
                minify: false
            })
        );

        let no_minify = PluginSpec::new(TAILWINDCSS).with_arg(options(vec![(
            "optimize",
            options(vec![("minify", Value::Bool(false))]),
        )]));
        assert_eq!(
            registry.create(&no_minify).unwrap().downcast_ref::<TailwindCss>(),
            Some(&TailwindCss {
                optimize: true,
                minify: false
            })
        );
    }

    #[test]
    fn test_tailwindcss_rejects_bad_arguments() {
        let registry = PluginRegistry::with_builtins();

        let too_many = PluginSpec::new(TAILWINDCSS).with_arg(1).with_arg(2);
        let err = registry.create(&too_many).unwrap_err();
        assert!(matches!(
            err.source().unwrap().downcast_ref::<PluginError>(),
            Some(PluginError::TooManyArguments { max: 1, got: 2 })
        ));

        let unknown = PluginSpec::new(TAILWINDCSS).with_arg(options(vec![("mode", Value::from("jit"))]));
        assert!(registry.create(&unknown).is_err());

        let not_mapping = PluginSpec::new(TAILWINDCSS).with_arg("fast");
        assert!(registry.create(&not_mapping).is_err());
    }

    #[test]
    fn test_descriptor_equality_ignores_payload() {
        let a = PluginDescriptor::new(PluginSpec::new("x"), handle(1u8));
        let b = PluginDescriptor::new(PluginSpec::new("x"), handle("other"));
        let c = PluginDescriptor::new(PluginSpec::new("y"), handle(1u8));

        assert_eq!(a, b);
        assert!(a != c);
        assert!(a.payload().is::<u8>());
        assert!(format!("{:?}", a).contains("\"x\""));
    }
}
