//! User-authored configuration before resolution
//!
//! A [`RawConfig`] is a mapping of whatever the user wrote. Nothing is checked
//! here beyond "it parses and the root is a mapping"; domain checks belong to
//! the resolver.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::value::Value;

/// Specifies a file to load, either required or optional
///
/// ```ignore
/// use siteconf_core::{FileSpec, RawConfig};
///
/// let raw = RawConfig::load_merged(&[
///     FileSpec::required("site.yaml"),
///     FileSpec::optional("site.local.yaml"), // Won't error if missing
/// ])?;
/// ```
#[derive(Debug, Clone)]
pub enum FileSpec {
    /// A required file - error if not found
    Required(PathBuf),
    /// An optional file - silently skip if not found
    Optional(PathBuf),
}

impl FileSpec {
    /// Create a required file spec
    pub fn required(path: impl Into<PathBuf>) -> Self {
        FileSpec::Required(path.into())
    }

    /// Create an optional file spec
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        FileSpec::Optional(path.into())
    }

    /// Get the path for this file spec
    pub fn path(&self) -> &Path {
        match self {
            FileSpec::Required(p) | FileSpec::Optional(p) => p,
        }
    }

    /// Check if this file spec is optional
    pub fn is_optional(&self) -> bool {
        matches!(self, FileSpec::Optional(_))
    }
}

impl<P: Into<PathBuf>> From<P> for FileSpec {
    fn from(path: P) -> Self {
        FileSpec::Required(path.into())
    }
}

/// Partial configuration as authored
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfig {
    root: Value,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RawConfig {
    /// An empty configuration; resolves to all defaults
    pub fn new() -> Self {
        Self {
            root: Value::empty_mapping(),
        }
    }

    /// Wrap an existing value; the root must be a mapping (null counts as empty)
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Mapping(_) => Ok(Self { root: value }),
            other => Err(Error::parse(format!(
                "Configuration root must be a mapping, got {}",
                other.type_name()
            ))),
        }
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load configuration from a file
    ///
    /// `.json` files are parsed as JSON, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        Self::parse_file(path, &content)
    }

    /// Load and merge multiple files in order, later files overriding earlier ones
    ///
    /// Mappings are deep-merged, scalars and sequences replaced, and a null
    /// removes the key it overrides. Optional files that don't exist are
    /// skipped.
    pub fn load_merged(specs: &[FileSpec]) -> Result<Self> {
        let mut merged = Self::new();

        for spec in specs {
            let path = spec.path();
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) if spec.is_optional() && e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("Skipping missing optional config {}", path.display());
                    continue;
                }
                Err(e) => return Err(Error::io(path.display().to_string(), e)),
            };

            log::debug!("Merging config layer {}", path.display());
            merged.merge(Self::parse_file(path, &content)?);
        }

        Ok(merged)
    }

    fn parse_file(path: &Path, content: &str) -> Result<Self> {
        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(content),
            _ => Self::from_yaml(content),
        };
        parsed.map_err(|e| match e.cause.clone() {
            Some(cause) => Error::parse(format!("{}: {}", path.display(), cause)),
            None => e,
        })
    }

    /// Overlay another configuration on top of this one
    pub fn merge(&mut self, other: RawConfig) {
        self.root.merge(other.root);
    }

    /// Set a value at a dotted path, e.g. `raw.set("server.port", 8080)`
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.root.set_path(path, value.into())
    }

    /// Builder-style [`RawConfig::set`]
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(path, value)?;
        Ok(self)
    }

    /// Get the authored value at a path, if present
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.root.get_path(path).ok()
    }

    /// The authored tree
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Top-level keys in authored order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root
            .as_mapping()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("siteconf_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_from_yaml() {
        let raw = RawConfig::from_yaml(
            r#"
devToolbar:
  enabled: false
server:
  host: true
  port: 4321
"#,
        )
        .unwrap();

        assert_eq!(raw.get("devToolbar.enabled"), Some(&Value::Bool(false)));
        assert_eq!(raw.get("server.port"), Some(&Value::Integer(4321)));
        assert_eq!(raw.keys().collect::<Vec<_>>(), vec!["devToolbar", "server"]);
    }

    #[test]
    fn test_empty_document_is_empty_config() {
        assert_eq!(RawConfig::from_json("null").unwrap(), RawConfig::new());
        assert_eq!(RawConfig::from_yaml("{}").unwrap(), RawConfig::new());
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = RawConfig::from_json("[1, 2]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("got sequence"));
    }

    #[test]
    fn test_set_and_with() {
        let raw = RawConfig::new()
            .with("server.port", 8080u16)
            .and_then(|r| r.with("server.host", "127.0.0.1"))
            .unwrap();

        assert_eq!(raw.get("server.port").and_then(Value::as_i64), Some(8080));
        assert_eq!(raw.get("server.host").and_then(Value::as_str), Some("127.0.0.1"));
    }

    #[test]
    fn test_load_json_by_extension() {
        let dir = temp_dir("load_json");
        let path = dir.join("site.json");
        std::fs::write(&path, r#"{"server": {"port": 3000}}"#).unwrap();

        let raw = RawConfig::load(&path).unwrap();
        assert_eq!(raw.get("server.port"), Some(&Value::Integer(3000)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = RawConfig::load("/nonexistent/siteconf/site.yaml").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn test_load_parse_error_names_file() {
        let dir = temp_dir("load_parse_error");
        let path = dir.join("broken.yaml");
        std::fs::write(&path, "server: [unclosed").unwrap();

        let err = RawConfig::load(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("broken.yaml"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_merged_layers() {
        let dir = temp_dir("load_merged");
        let base = dir.join("site.yaml");
        let local = dir.join("site.local.yaml");
        std::fs::write(
            &base,
            r#"
server:
  host: false
  port: 4321
plugins: [tailwindcss]
"#,
        )
        .unwrap();
        std::fs::write(
            &local,
            r#"
server:
  host: true
plugins: []
"#,
        )
        .unwrap();

        let raw = RawConfig::load_merged(&[FileSpec::required(&base), FileSpec::optional(&local)])
            .unwrap();

        assert_eq!(raw.get("server.host"), Some(&Value::Bool(true)));
        assert_eq!(raw.get("server.port"), Some(&Value::Integer(4321)));
        assert_eq!(raw.get("plugins"), Some(&Value::Sequence(vec![])));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_merged_optional_missing() {
        let dir = temp_dir("load_merged_optional");
        let base = dir.join("site.yaml");
        std::fs::write(&base, "server:\n  port: 8080\n").unwrap();

        let raw = RawConfig::load_merged(&[
            FileSpec::from(&base),
            FileSpec::optional(dir.join("missing.yaml")),
        ])
        .unwrap();
        assert_eq!(raw.get("server.port"), Some(&Value::Integer(8080)));

        let err = RawConfig::load_merged(&[FileSpec::required(dir.join("missing.yaml"))]);
        assert!(err.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
