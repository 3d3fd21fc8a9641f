//! siteconf CLI - resolve and check static-site tool configuration
//!
//! Usage:
//!   siteconf resolve site.yaml site.local.yaml --format json
//!   siteconf resolve site.yaml --host --port 8080
//!   siteconf check site.yaml
//!   siteconf schema

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use siteconf_core::error::ErrorKind;
use siteconf_core::{
    ConfigResolver, FileSpec, RawConfig, ResolveOptions, ResolvedConfig, Schema, Value,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// siteconf - Resolve static-site build and dev-server configuration
#[derive(Parser, Debug)]
#[command(name = "siteconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve configuration files and print the resolved descriptor
    Resolve {
        /// Configuration file(s), merged in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Ignore unrecognized keys instead of rejecting them
        #[arg(long)]
        lenient: bool,

        #[command(flatten)]
        overrides: Overrides,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check configuration files against the schema and resolve them
    Check {
        /// Configuration file(s), merged in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Ignore unrecognized keys instead of rejecting them
        #[arg(long)]
        lenient: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only output errors (quiet mode)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the JSON Schema of the configuration format
    Schema {
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Command-line overrides applied on top of the merged files
#[derive(Args, Debug, Default, Clone)]
struct Overrides {
    /// Dev-server host; `--host` alone binds all interfaces
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "HOST")]
    host: Option<String>,

    /// Dev-server port
    #[arg(long)]
    port: Option<i64>,

    /// Disable the developer toolbar
    #[arg(long)]
    no_dev_toolbar: bool,
}

impl Overrides {
    fn apply(&self, raw: &mut RawConfig) -> siteconf_core::Result<()> {
        if let Some(host) = &self.host {
            let host = match host.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                name => Value::from(name),
            };
            raw.set("server.host", host)?;
        }
        if let Some(port) = self.port {
            raw.set("server.port", port)?;
        }
        if self.no_dev_toolbar {
            raw.set("devToolbar.enabled", false)?;
        }
        Ok(())
    }
}

/// Why a command could not produce a resolved configuration
#[derive(Debug)]
enum Failure {
    /// Files could not be read or parsed
    Load(String),
    /// The configuration was read but is not valid
    Invalid(siteconf_core::Error),
}

impl Failure {
    fn exit_code(&self) -> ExitCode {
        match self {
            Failure::Load(_) => ExitCode::from(2),
            Failure::Invalid(_) => ExitCode::from(1),
        }
    }

    fn report(&self) {
        match self {
            Failure::Load(msg) => eprintln!("{}", msg.red()),
            Failure::Invalid(e) => {
                eprintln!("{} Invalid configuration\n", "✗".red());
                eprintln!("{}", e);
            }
        }
    }
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli.command)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Also forwards `log` records from siteconf-core
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn execute(command: Commands) -> ExitCode {
    match command {
        Commands::Resolve {
            files,
            format,
            lenient,
            overrides,
            output,
        } => cmd_resolve(&files, &format, lenient, &overrides, output),

        Commands::Check {
            files,
            lenient,
            format,
            quiet,
        } => cmd_check(&files, lenient, &format, quiet),

        Commands::Schema { output } => cmd_schema(output),
    }
}

fn load_config(files: &[PathBuf]) -> Result<RawConfig, Failure> {
    if files.is_empty() {
        return Err(Failure::Load("No configuration files specified".to_string()));
    }

    let specs: Vec<FileSpec> = files.iter().map(FileSpec::required).collect();
    RawConfig::load_merged(&specs).map_err(|e| Failure::Load(format!("Failed to load config: {}", e)))
}

fn resolver(lenient: bool) -> ConfigResolver {
    let options = if lenient {
        ResolveOptions::lenient()
    } else {
        ResolveOptions::default()
    };
    ConfigResolver::new().with_options(options)
}

fn resolve_files(
    files: &[PathBuf],
    lenient: bool,
    overrides: &Overrides,
) -> Result<ResolvedConfig, Failure> {
    let mut raw = load_config(files)?;
    overrides.apply(&mut raw).map_err(Failure::Invalid)?;
    resolver(lenient).resolve(&raw).map_err(Failure::Invalid)
}

fn render(resolved: &ResolvedConfig, format: &str) -> Result<String, String> {
    let value = resolved.to_value();
    match format {
        "json" => serde_json::to_string_pretty(&value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::to_string(&value).map_err(|e| e.to_string()),
        other => Err(format!("Unsupported format: {}. Use yaml or json.", other)),
    }
}

fn write_output(content: &str, output: Option<PathBuf>) -> ExitCode {
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, content) {
                eprintln!("{}: {}", "Error writing file".red(), e);
                return ExitCode::from(2);
            }
            eprintln!("{} Wrote to {}", "✓".green(), path.display());
        }
        None => print!("{}", content),
    }
    ExitCode::SUCCESS
}

fn cmd_resolve(
    files: &[PathBuf],
    format: &str,
    lenient: bool,
    overrides: &Overrides,
    output: Option<PathBuf>,
) -> ExitCode {
    let resolved = match resolve_files(files, lenient, overrides) {
        Ok(r) => r,
        Err(failure) => {
            failure.report();
            return failure.exit_code();
        }
    };

    match render(&resolved, format) {
        Ok(content) => write_output(&content, output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

/// Everything wrong with a configuration, schema violations first
fn check_files(files: &[PathBuf], lenient: bool) -> Result<Vec<String>, Failure> {
    let raw = load_config(files)?;
    let schema = Schema::builtin().map_err(Failure::Invalid)?;

    let mut problems: Vec<String> = schema
        .validate_collect(raw.as_value())
        .iter()
        .filter(|e| !(lenient && e.message.contains("Additional properties")))
        .map(ToString::to_string)
        .collect();

    // Plugin failures are only visible by actually resolving. Anything else
    // the resolver rejects, the schema has already reported.
    if let Err(e) = resolver(lenient).resolve(&raw) {
        let line = e.to_string().lines().next().unwrap_or_default().to_string();
        let line = match &e.path {
            Some(path) => format!("{} ({})", line, path),
            None => line,
        };
        if problems.is_empty() || matches!(e.kind, ErrorKind::Plugin(_)) {
            problems.push(line);
        }
    }

    Ok(problems)
}

fn cmd_check(files: &[PathBuf], lenient: bool, format: &str, quiet: bool) -> ExitCode {
    let problems = match check_files(files, lenient) {
        Ok(p) => p,
        Err(failure) => {
            failure.report();
            return failure.exit_code();
        }
    };

    if format == "json" {
        let json = serde_json::json!({
            "valid": problems.is_empty(),
            "errors": problems,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        );
    } else if problems.is_empty() {
        if !quiet {
            let files_str: Vec<_> = files.iter().map(|f| f.display().to_string()).collect();
            println!("{} {} is valid", "✓".green(), files_str.join(", "));
        }
    } else {
        for problem in &problems {
            eprintln!("{} {}", "✗".red(), problem);
        }
    }

    if problems.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn cmd_schema(output: Option<PathBuf>) -> ExitCode {
    let schema = match Schema::builtin() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            return ExitCode::from(2);
        }
    };

    match serde_json::to_string_pretty(schema.as_value()) {
        Ok(json) => write_output(&(json + "\n"), output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteconf_core::Host;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("siteconf_cli_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn overrides(args: &[&str]) -> Overrides {
        let mut argv = vec!["siteconf", "resolve", "site.yaml"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Resolve { overrides, .. } => overrides,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_resolve_command() {
        let cli = Cli::try_parse_from([
            "siteconf", "-vv", "resolve", "a.yaml", "b.json", "--format", "json", "--lenient",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Resolve {
                files,
                format,
                lenient,
                ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.yaml"), PathBuf::from("b.json")]);
                assert_eq!(format, "json");
                assert!(lenient);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_requires_files() {
        assert!(Cli::try_parse_from(["siteconf", "resolve"]).is_err());
    }

    #[test]
    fn test_host_flag_without_value_binds_all() {
        let mut raw = RawConfig::new();
        overrides(&["--host"]).apply(&mut raw).unwrap();
        assert_eq!(raw.get("server.host"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_host_flag_with_name() {
        let mut raw = RawConfig::new();
        overrides(&["--host", "0.0.0.0", "--port", "8080", "--no-dev-toolbar"])
            .apply(&mut raw)
            .unwrap();

        assert_eq!(raw.get("server.host"), Some(&Value::from("0.0.0.0")));
        assert_eq!(raw.get("server.port"), Some(&Value::Integer(8080)));
        assert_eq!(raw.get("devToolbar.enabled"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_resolve_files_with_overrides() {
        let base = temp_file(
            "resolve_base.yaml",
            "devToolbar: {enabled: false}\nserver: {host: true, port: 4321}\nplugins: [tailwindcss]\n",
        );

        let resolved = resolve_files(&[base], false, &overrides(&["--port", "3000"])).unwrap();

        assert!(!resolved.dev_toolbar.enabled);
        assert_eq!(resolved.server.host, Host::Flag(true));
        assert_eq!(resolved.server.port, 3000);
        assert_eq!(resolved.plugins.len(), 1);
    }

    #[test]
    fn test_resolve_files_invalid_port_override() {
        let base = temp_file("resolve_invalid.yaml", "server: {port: 4321}\n");

        let failure =
            resolve_files(&[base], false, &overrides(&["--port", "70000"])).unwrap_err();
        assert!(matches!(failure, Failure::Invalid(ref e) if e.is_invalid_option()));
    }

    #[test]
    fn test_resolve_files_missing_file() {
        let failure = resolve_files(
            &[PathBuf::from("/nonexistent/siteconf.yaml")],
            false,
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(failure, Failure::Load(_)));
    }

    #[test]
    fn test_render_formats() {
        let resolved = siteconf_core::resolve(&RawConfig::new()).unwrap();

        let json = render(&resolved, "json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["server"]["port"], 4321);
        assert_eq!(parsed["server"]["host"], false);

        let yaml = render(&resolved, "yaml").unwrap();
        assert!(yaml.contains("port: 4321"));

        assert!(render(&resolved, "toml").is_err());
    }

    #[test]
    fn test_check_reports_all_problems() {
        let path = temp_file(
            "check_problems.yaml",
            "server: {host: 1, port: 0}\nintegrations: []\n",
        );

        let problems = check_files(&[path.clone()], false).unwrap();
        assert!(problems.len() >= 3, "{:?}", problems);

        let lenient = check_files(&[path], true).unwrap();
        assert!(lenient.len() < problems.len(), "{:?}", lenient);
    }

    #[test]
    fn test_check_reports_unknown_key_once() {
        let path = temp_file("check_unknown_key.yaml", "integrations: []\n");

        let problems = check_files(&[path], false).unwrap();
        assert_eq!(problems.len(), 1, "{:?}", problems);
        assert!(problems[0].contains("integrations"), "{:?}", problems);
    }

    #[test]
    fn test_check_reports_plugin_failures() {
        let path = temp_file("check_plugins.yaml", "plugins: [react]\n");

        let problems = check_files(&[path], false).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("Unknown plugin: react"), "{:?}", problems);
    }

    #[test]
    fn test_demo_site_config() {
        let demo = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/site.yaml");

        assert!(check_files(&[demo.clone()], false).unwrap().is_empty());

        let resolved = resolve_files(&[demo], false, &Overrides::default()).unwrap();
        assert!(!resolved.dev_toolbar.enabled);
        assert_eq!(resolved.server.socket_address(), "0.0.0.0:4321");
        assert_eq!(resolved.plugins[0].name(), "tailwindcss");
    }

    #[test]
    fn test_check_valid_config() {
        let path = temp_file("check_valid.yaml", "server: {host: true, port: 4321}\n");
        assert!(check_files(&[path], false).unwrap().is_empty());
    }
}
