#![deny(unsafe_code)]

//! fqapi CLI: issue requests to the FQ management API daemon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fqapi_config::{ChannelKind, ClientConfig};
use fqapi_core::{Client, Credentials, ErrorMessages, WrappingClient, build_info};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the remote channel password.
const PASSWORD_ENV: &str = "FQAPI_PASSWORD";

/// fqapi: talk to the FQ management API daemon.
#[derive(Debug, Parser)]
#[command(name = "fqapi", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "fqapi.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the remote channel against HOST.
    #[arg(long, value_name = "HOST", conflicts_with = "socket")]
    remote: Option<String>,

    /// Remote port.
    #[arg(long)]
    port: Option<u16>,

    /// Remote username.
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Use the local channel on this socket.
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Accept self-signed daemon certificates.
    #[arg(long)]
    insecure: bool,

    /// Treat this status code as success.
    #[arg(long = "allow", value_name = "CODE")]
    allow: Vec<u16>,

    /// Fail on CODE with MESSAGE (`{code}` and `{message}` are substituted).
    #[arg(long = "fail", value_name = "CODE=MESSAGE", value_parser = parse_fail)]
    fail: Vec<(u16, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// GET a resource.
    Get { path: String },

    /// DELETE a resource.
    Delete { path: String },

    /// PUT a JSON body (`-` reads it from stdin).
    Put { path: String, body: String },

    /// POST a JSON body (`-` reads it from stdin).
    Post { path: String, body: String },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Print version and build information.
    Version,
}

fn parse_fail(s: &str) -> Result<(u16, String), String> {
    let (code, message) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=MESSAGE, got {s:?}"))?;
    let code = code
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid status code {code:?}: {e}"))?;
    Ok((code, message.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).await?;
    let config = apply_overrides(config, &cli)?;

    // stdout carries only JSON payloads
    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Get { path } => {
            let client = connect(&config)?;
            print_payload(client.get(&path).await?)?;
        }
        Commands::Delete { path } => {
            let client = connect(&config)?;
            print_payload(client.delete(&path).await?)?;
        }
        Commands::Put { path, body } => {
            let body = read_body(&body).await?;
            let client = connect(&config)?;
            print_payload(client.put(&path, &body).await?)?;
        }
        Commands::Post { path, body } => {
            let body = read_body(&body).await?;
            let client = connect(&config)?;
            print_payload(client.post(&path, &body).await?)?;
        }
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Version => println!("fqapi {}", build_info::version_string()),
    }

    Ok(())
}

async fn load_config(path: &Path) -> Result<ClientConfig> {
    if path.exists() {
        ClientConfig::load(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))
    } else {
        Ok(ClientConfig::default())
    }
}

/// Fold command-line flags over the file configuration and re-validate.
fn apply_overrides(mut config: ClientConfig, cli: &Cli) -> Result<ClientConfig> {
    if let Some(socket) = &cli.socket {
        config.channel = ChannelKind::Local;
        config.local.socket_path = socket.display().to_string();
    }
    if let Some(host) = &cli.remote {
        config.channel = ChannelKind::Remote;
        config.remote.host = Some(host.clone());
    }
    if let Some(port) = cli.port {
        config.remote.port = port;
    }
    if let Some(user) = &cli.user {
        config.remote.username = Some(user.clone());
    }
    if cli.insecure {
        config.remote.accept_invalid_certs = true;
    }
    for code in &cli.allow {
        config.errors.messages.remove(&code.to_string());
        if !config.errors.suppress.contains(code) {
            config.errors.suppress.push(*code);
        }
    }
    for (code, message) in &cli.fail {
        config.errors.suppress.retain(|c| c != code);
        config
            .errors
            .messages
            .insert(code.to_string(), message.clone());
    }
    config.validate()?;
    Ok(config)
}

fn connect(config: &ClientConfig) -> Result<WrappingClient<fqapi_core::DaemonChannel>> {
    let credentials = match config.channel {
        ChannelKind::Local => None,
        ChannelKind::Remote => {
            let username = config.remote.username.as_deref().unwrap_or_default();
            let password = std::env::var(PASSWORD_ENV)
                .with_context(|| format!("{PASSWORD_ENV} must be set for the remote channel"))?;
            Some(Credentials::new(username, password))
        }
    };
    debug!(channel = ?config.channel, "connecting");

    let client = Client::from_config(config, credentials)?;
    let messages = ErrorMessages::from_config(&config.errors)?;
    Ok(WrappingClient::exiting(client, messages))
}

/// Parse BODY as JSON, reading it from stdin when it is `-`.
async fn read_body(arg: &str) -> Result<Value> {
    let text = if arg == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read body from stdin")?;
        buf
    } else {
        arg.to_string()
    };
    if text.trim().is_empty() {
        bail!("request body is empty");
    }
    serde_json::from_str(&text).context("request body is not valid JSON")
}

fn print_payload(payload: Option<Value>) -> Result<()> {
    if let Some(value) = payload {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn cmd_config(config_path: &Path, config: &ClientConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else if config_path.exists() {
        println!("Configuration at '{}' is valid.", config_path.display());
    } else {
        info!(path = %config_path.display(), "config file not found");
        println!(
            "No configuration at '{}'; defaults are valid.",
            config_path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fqapi").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fail() {
        assert_eq!(
            parse_fail("409=already exists").unwrap(),
            (409, "already exists".to_string())
        );
        assert_eq!(
            parse_fail("200=a=b").unwrap(),
            (200, "a=b".to_string())
        );
        assert!(parse_fail("409").is_err());
        assert!(parse_fail("abc=x").is_err());
    }

    #[test]
    fn test_socket_override_selects_local() {
        let cli = cli(&["--socket", "/tmp/fq.sock", "get", "/1/ftp"]);
        let config = apply_overrides(ClientConfig::default(), &cli).unwrap();
        assert_eq!(config.channel, ChannelKind::Local);
        assert_eq!(config.local.socket_path, "/tmp/fq.sock");
    }

    #[test]
    fn test_remote_overrides() {
        let cli = cli(&[
            "--remote",
            "cnc.example.com",
            "--port",
            "8987",
            "--user",
            "admin",
            "--insecure",
            "get",
            "/1/ftp",
        ]);
        let config = apply_overrides(ClientConfig::default(), &cli).unwrap();
        assert_eq!(config.channel, ChannelKind::Remote);
        assert_eq!(config.remote.host.as_deref(), Some("cnc.example.com"));
        assert_eq!(config.remote.port, 8987);
        assert_eq!(config.remote.username.as_deref(), Some("admin"));
        assert!(config.remote.accept_invalid_certs);
    }

    #[test]
    fn test_remote_without_user_is_rejected() {
        let cli = cli(&["--remote", "cnc.example.com", "get", "/1/ftp"]);
        assert!(apply_overrides(ClientConfig::default(), &cli).is_err());
    }

    #[test]
    fn test_allow_and_fail_replace_file_entries() {
        let mut config = ClientConfig::default();
        config.errors.suppress.push(409);
        config
            .errors
            .messages
            .insert("404".to_string(), "missing".to_string());

        let cli = cli(&["--allow", "404", "--fail", "409=exists", "get", "/1/ftp"]);
        let config = apply_overrides(config, &cli).unwrap();
        assert_eq!(config.errors.suppress, vec![404]);
        assert_eq!(config.errors.messages.len(), 1);
        assert_eq!(config.errors.messages.get("409").unwrap(), "exists");
    }

    #[test]
    fn test_socket_and_remote_conflict() {
        let result = Cli::try_parse_from([
            "fqapi",
            "--socket",
            "/tmp/fq.sock",
            "--remote",
            "h",
            "get",
            "/",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_body_inline() {
        let value = read_body(r#"{"name":"x","rw":"ro"}"#).await.unwrap();
        assert_eq!(value["rw"], "ro");
        assert_eq!(read_body("null").await.unwrap(), Value::Null);
        assert!(read_body("{oops").await.is_err());
        assert!(read_body("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.local.socket_path, fqapi_config::DEFAULT_SOCKET_PATH);
    }
}
