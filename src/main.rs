//! rust_ixe command line tool.
//!
//! Connects to the chassis named in the configuration, reserves ports, runs
//! one operation and releases everything again. With `--dry-run` the commands
//! go to an in-memory Tcl server and are printed instead.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_ixe::adapters::MockTclAdapter;
use rust_ixe::config::IxeConfig;
use rust_ixe::hardware::IxePort;
use rust_ixe::parameter::MemberValue;
use rust_ixe::{CapFileFormat, IxeApp};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rust_ixe", version, about = "IxExplorer traffic generator control")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/ixe.toml")]
    config: PathBuf,

    /// Print the Tcl commands instead of talking to a chassis
    #[arg(long)]
    dry_run: bool,

    /// Take ports owned by other users
    #[arg(long)]
    force: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reserve ports and reset them to factory defaults
    Reserve {
        /// Ports as chassis/card/port; defaults to the configured ports
        ports: Vec<String>,
        /// Keep the current port configuration
        #[arg(long)]
        no_clear: bool,
    },
    /// Start transmit on the given ports
    Start {
        ports: Vec<String>,
        /// Wait until transmit is done
        #[arg(long)]
        blocking: bool,
    },
    /// Stop transmit on the given ports
    Stop { ports: Vec<String> },
    /// Import a .prt or .str file into a port
    Load { port: String, file: PathBuf },
    /// Print port attributes as JSON
    Get {
        port: String,
        /// Single attribute; all attributes when omitted
        attribute: Option<String>,
    },
    /// Change one port attribute
    Set {
        port: String,
        attribute: String,
        value: String,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Capture for a number of seconds and export the buffers
    Capture {
        ports: Vec<String>,
        #[arg(long, default_value = "5")]
        seconds: u64,
        /// Output file prefix
        #[arg(long, default_value = "capture")]
        prefix: String,
        /// cap, enc, txt or mem
        #[arg(long, default_value = "enc")]
        format: CapFileFormat,
    },
}

fn init_tracing(config: &IxeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.application.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn member_json(value: &MemberValue) -> serde_json::Value {
    match value {
        MemberValue::Bool(b) => serde_json::Value::Bool(*b),
        MemberValue::Int(i) => serde_json::Value::from(*i),
        MemberValue::Mac(mac) => serde_json::Value::String(mac.to_string()),
        MemberValue::Str(s) => serde_json::Value::String(s.clone()),
    }
}

fn port_json(port: &IxePort, attribute: Option<&str>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for member in port.object().kind().members {
        if attribute.is_some_and(|a| a != member.name) {
            continue;
        }
        if let Some(value) = port.object().cached(member.name) {
            map.insert(member.name.to_string(), member_json(value));
        }
    }
    serde_json::Value::Object(map)
}

fn ports_or_configured(ports: &[String], config: &IxeConfig) -> Vec<String> {
    if ports.is_empty() {
        config.session.ports.clone()
    } else {
        ports.to_vec()
    }
}

async fn run(cli: &Cli, config: &IxeConfig, app: &mut IxeApp) -> Result<()> {
    app.connect().await?;
    let result = match app.session.login(&config.session.user_name).await {
        Ok(()) => execute(cli, config, app).await,
        Err(err) => Err(err.into()),
    };
    let closed = app.close().await;
    result.and(closed.map_err(Into::into))
}

async fn execute(cli: &Cli, config: &IxeConfig, app: &mut IxeApp) -> Result<()> {
    match &cli.command {
        // Handled before connecting.
        Command::Config => {}
        Command::Reserve { ports, no_clear } => {
            let ports = ports_or_configured(ports, config);
            let reserved = app
                .session
                .reserve_ports(&ports, cli.force, !no_clear)
                .await?;
            for port in reserved.values() {
                println!("{}", port);
            }
        }
        Command::Start { ports, blocking } => {
            let ports = ports_or_configured(ports, config);
            app.session.reserve_ports(&ports, cli.force, false).await?;
            app.session.start_transmit(*blocking, &ports).await?;
        }
        Command::Stop { ports } => {
            let ports = ports_or_configured(ports, config);
            app.session.reserve_ports(&ports, cli.force, false).await?;
            app.session.stop_transmit(&ports).await?;
        }
        Command::Load { port, file } => {
            app.session
                .reserve_ports(&[port], cli.force, false)
                .await?;
            let port = app
                .session
                .port_mut(port)
                .ok_or_else(|| anyhow!("port {} not reserved", port))?;
            port.load_config(file)
                .await
                .with_context(|| format!("loading {}", file.display()))?;
            println!("{} streams", port.streams().len());
        }
        Command::Get { port, attribute } => {
            app.session
                .reserve_ports(&[port], cli.force, false)
                .await?;
            let port = app
                .session
                .port_mut(port)
                .ok_or_else(|| anyhow!("port {} not reserved", port))?;
            port.get(attribute.as_deref(), true).await?;
            let json = port_json(port, attribute.as_deref());
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Set {
            port,
            attribute,
            value,
        } => {
            app.session
                .reserve_ports(&[port], cli.force, false)
                .await?;
            let port = app
                .session
                .port_mut(port)
                .ok_or_else(|| anyhow!("port {} not reserved", port))?;
            let member = port.object().member(attribute)?;
            let value = MemberValue::from_text(member.kind, value)
                .map_err(|reason| anyhow!("invalid value for {}: {}", attribute, reason))?;
            port.set(attribute, value).await?;
            port.write().await?;
        }
        Command::Capture {
            ports,
            seconds,
            prefix,
            format,
        } => {
            let ports = ports_or_configured(ports, config);
            app.session.reserve_ports(&ports, cli.force, false).await?;
            app.session.start_capture(&ports).await?;
            tokio::time::sleep(Duration::from_secs(*seconds)).await;
            let files = app.session.stop_capture(prefix, *format, &ports).await?;
            for (uri, path) in files {
                println!("{}: {}", uri, path.display());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = IxeConfig::load_from(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    init_tracing(&config);

    if matches!(cli.command, Command::Config) {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if cli.dry_run {
        let mock = MockTclAdapter::new();
        let mut app = IxeApp::with_transport(Box::new(mock.clone()), &config.chassis.host);
        let result = run(&cli, &config, &mut app).await;
        for command in mock.call_log() {
            println!("{}", command);
        }
        return result;
    }

    info!(
        "Connecting to {}:{} ({} API)",
        config.chassis.host, config.chassis.port, config.chassis.api
    );
    let mut app = IxeApp::from_config(&config)?;
    run(&cli, &config, &mut app).await
}
