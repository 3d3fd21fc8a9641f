//! JSON Schema for the configuration format
//!
//! The resolver stops at the first problem. The schema reports every problem
//! in one pass, which is what an editor integration or the `check` command
//! wants.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

const BUILTIN_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "siteconf",
  "description": "Static-site build and dev-server configuration",
  "type": "object",
  "properties": {
    "devToolbar": {
      "type": ["object", "null"],
      "description": "In-browser developer overlay",
      "properties": {
        "enabled": { "type": ["boolean", "null"], "default": true }
      },
      "additionalProperties": false
    },
    "server": {
      "type": ["object", "null"],
      "description": "Dev-server network binding",
      "properties": {
        "host": {
          "description": "true binds all interfaces, false binds loopback, a string binds that address",
          "anyOf": [
            { "type": "boolean" },
            { "type": "string", "pattern": "^\\S([\\s\\S]*\\S)?$" },
            { "type": "null" }
          ],
          "default": false
        },
        "port": {
          "anyOf": [
            { "type": "integer", "minimum": 1, "maximum": 65535 },
            { "type": "null" }
          ],
          "default": 4321
        }
      },
      "additionalProperties": false
    },
    "plugins": {
      "type": ["array", "null"],
      "description": "Bundler plugins in application order",
      "items": {
        "anyOf": [
          { "type": "string", "minLength": 1 },
          {
            "type": "object",
            "properties": {
              "name": { "type": "string", "minLength": 1 },
              "args": { "type": ["array", "null"] }
            },
            "required": ["name"],
            "additionalProperties": false
          }
        ]
      }
    },
    "vite": {
      "description": "Bundler options, forwarded without validation"
    }
  },
  "additionalProperties": false
}"#;

/// Compiled configuration schema
#[derive(Debug, Clone)]
pub struct Schema {
    schema: serde_json::Value,
    compiled: Arc<jsonschema::Validator>,
}

impl Schema {
    /// The schema of the configuration format understood by the resolver
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SCHEMA)
    }

    /// Load a schema from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::parse(format!("Invalid JSON schema: {}", e)))?;
        let compiled = jsonschema::validator_for(&schema)
            .map_err(|e| Error::parse(format!("Invalid JSON Schema: {}", e)))?;
        Ok(Self {
            schema,
            compiled: Arc::new(compiled),
        })
    }

    /// Validate a value, failing on the first violation
    pub fn validate(&self, value: &Value) -> Result<()> {
        match self.validate_collect(value).into_iter().next() {
            Some(err) => Err(Error::validation(
                if err.path.is_empty() { "<root>" } else { err.path.as_str() },
                err.message,
            )),
            None => Ok(()),
        }
    }

    /// Validate and collect all violations
    pub fn validate_collect(&self, value: &Value) -> Vec<ValidationError> {
        let json_value = value.to_json();

        self.compiled
            .iter_errors(&json_value)
            .map(|e| ValidationError {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    /// Get the raw schema value
    pub fn as_value(&self) -> &serde_json::Value {
        &self.schema
    }
}

/// A single validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// JSON pointer to the invalid value (e.g., "/server/port")
    pub path: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawConfig;
    use crate::resolve::resolve;

    fn check(yaml: &str) -> Vec<ValidationError> {
        let raw = RawConfig::from_yaml(yaml).unwrap();
        Schema::builtin().unwrap().validate_collect(raw.as_value())
    }

    #[test]
    fn test_builtin_schema_compiles() {
        let schema = Schema::builtin().unwrap();
        assert_eq!(schema.as_value()["title"], "siteconf");
    }

    #[test]
    fn test_valid_config() {
        let errors = check(
            r#"
devToolbar: {enabled: false}
server: {host: true, port: 4321}
plugins: [tailwindcss, {name: tailwindcss, args: [{optimize: false}]}]
vite: {anything: [1, 2]}
"#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_collects_every_violation() {
        let errors = check(
            r#"
server: {host: 1, port: 70000}
devToolbar: {enabled: "yes"}
integrations: []
"#,
        );

        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/server/host"), "{:?}", paths);
        assert!(paths.contains(&"/server/port"), "{:?}", paths);
        assert!(paths.contains(&"/devToolbar/enabled"), "{:?}", paths);
        assert!(errors.len() >= 4);
    }

    #[test]
    fn test_padded_host_rejected() {
        let errors = check("server: {host: ' localhost '}");
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert_eq!(errors[0].path, "/server/host");

        assert!(check("server: {host: dev.local}").is_empty());
        assert!(check("server: {host: x}").is_empty());
    }

    #[test]
    fn test_validate_first_error() {
        let raw = RawConfig::from_yaml("server: {port: 0}").unwrap();
        let err = Schema::builtin().unwrap().validate(raw.as_value()).unwrap_err();

        assert_eq!(err.path.as_deref(), Some("/server/port"));
    }

    #[test]
    fn test_resolved_config_satisfies_schema() {
        let raw = RawConfig::from_yaml("server: {host: example.test}\nplugins: [tailwindcss]").unwrap();
        let resolved = resolve(&raw).unwrap();

        assert!(Schema::builtin().unwrap().validate(&resolved.to_value()).is_ok());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError {
            path: "/server/port".into(),
            message: "70000 is greater than the maximum of 65535".into(),
        };
        assert_eq!(
            err.to_string(),
            "/server/port: 70000 is greater than the maximum of 65535"
        );
    }
}
