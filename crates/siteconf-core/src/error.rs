//! Error types for siteconf
//!
//! Every failure carries the configuration path it concerns and, where there
//! is an obvious fix, a help line. Resolution never retries: an error here is
//! an authoring mistake that has to be fixed before the tool can start.

use std::fmt;
use std::sync::Arc;

/// Result type alias for siteconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Alias under which consumers usually refer to resolution failures
pub type ConfigError = Error;

/// Main error type for siteconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the config where the error occurred (e.g., "server.port")
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause as text
    pub cause: Option<String>,
    /// Originating error, kept intact for `source()` chains
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing YAML/JSON
    Parse,
    /// A recognized option holds a value outside its domain
    InvalidOption { expected: String, got: String },
    /// An unrecognized top-level key under the strict policy
    UnknownOption { key: String },
    /// Plugin construction or registration failed
    Plugin(PluginErrorKind),
    /// Schema validation failed
    Validation,
    /// Error accessing a path that doesn't exist
    PathNotFound,
    /// I/O error (file not found, etc.)
    Io,
}

/// Specific plugin error categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginErrorKind {
    /// A factory returned an error while building its plugin
    InitFailure { plugin: String },
    /// No factory is registered under this name
    UnknownFactory { name: String },
    /// A factory is already registered under this name
    AlreadyRegistered { name: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            help: None,
            cause: None,
            source: None,
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create an I/O error for a file that could not be read
    pub fn io(file: impl Into<String>, err: std::io::Error) -> Self {
        let file = file.into();
        Self {
            help: Some(format!("Check that '{}' exists and is readable", file)),
            cause: Some(format!("{}: {}", file, err)),
            source: Some(Arc::new(err)),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            help: Some(format!(
                "Check that '{}' exists in the configuration",
                path_str
            )),
            path: Some(path_str),
            ..Self::new(ErrorKind::PathNotFound)
        }
    }

    /// Create an invalid option error
    pub fn invalid_option(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        Self {
            path: Some(path.into()),
            help: Some(format!("Set this option to {}", expected)),
            ..Self::new(ErrorKind::InvalidOption {
                expected,
                got: got.into(),
            })
        }
    }

    /// Create an unknown option error
    pub fn unknown_option(key: impl Into<String>, recognized: &[&str]) -> Self {
        let key = key.into();
        Self {
            path: Some(key.clone()),
            help: Some(format!(
                "Recognized top-level keys are: {}. Remove '{}' or resolve with the lenient policy",
                recognized.join(", "),
                key
            )),
            ..Self::new(ErrorKind::UnknownOption { key })
        }
    }

    /// Create a plugin init failure, keeping the factory's error as the source
    pub fn plugin_init_failure(
        plugin: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let plugin = plugin.into();
        Self {
            help: Some(format!(
                "Fix the arguments passed to the '{}' plugin; resolution cannot continue without it",
                plugin
            )),
            cause: Some(err.to_string()),
            source: Some(Arc::new(err)),
            ..Self::new(ErrorKind::Plugin(PluginErrorKind::InitFailure { plugin }))
        }
    }

    /// Create an unknown plugin factory error
    pub fn unknown_plugin(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            help: Some(format!("Register the '{}' plugin factory or check for typos", name)),
            ..Self::new(ErrorKind::Plugin(PluginErrorKind::UnknownFactory { name }))
        }
    }

    /// Create a plugin already registered error
    pub fn plugin_already_registered(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            help: Some(format!(
                "Use register_with_force(..., true) to override the '{}' factory",
                name
            )),
            ..Self::new(ErrorKind::Plugin(PluginErrorKind::AlreadyRegistered { name }))
        }
    }

    /// Create a validation error
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            path: if p.is_empty() || p == "<root>" {
                None
            } else {
                Some(p)
            },
            help: Some("Fix the value to match the configuration schema".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Validation)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// True for failures the resolver raises on domain or key checks
    pub fn is_invalid_option(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidOption { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::InvalidOption { expected, got } => {
                write!(f, "Invalid option: expected {}, got {}", expected, got)?
            }
            ErrorKind::UnknownOption { key } => write!(f, "Unknown option: {}", key)?,
            ErrorKind::Plugin(p) => match p {
                PluginErrorKind::InitFailure { plugin } => {
                    write!(f, "Plugin '{}' failed to initialize", plugin)?
                }
                PluginErrorKind::UnknownFactory { name } => {
                    write!(f, "Unknown plugin: {}", name)?
                }
                PluginErrorKind::AlreadyRegistered { name } => {
                    write!(f, "Plugin factory '{}' is already registered", name)?
                }
            },
            ErrorKind::Validation => write!(f, "Validation error")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
