#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! `repost` binary: `daemon` runs the supervisor loop forever, `server`
//! serves the read-only dashboard.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use repost_telemetry::LogFormat;

/// Default dashboard bind host when `--host` is not given.
const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

/// Default dashboard bind port when `--port` is not given.
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Parser)]
#[command(name = "repost", about = "RSS-sourced torrent republishing engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the supervisor loop (C3-C9) forever.
    Daemon {
        /// Path to the engine's configuration file.
        #[arg(long)]
        config_file: PathBuf,
        /// Log output format.
        #[arg(long, value_parser = parse_log_format)]
        log_format: Option<LogFormat>,
        /// `tracing` `EnvFilter` directive string.
        #[arg(long)]
        log_level: Option<String>,
    },
    /// Serve the read-only item dashboard.
    Server {
        /// Path to the engine's configuration file.
        #[arg(long)]
        config_file: PathBuf,
        /// Bind host.
        #[arg(long)]
        host: Option<IpAddr>,
        /// Bind port.
        #[arg(long)]
        port: Option<u16>,
        /// Log output format.
        #[arg(long, value_parser = parse_log_format)]
        log_format: Option<LogFormat>,
        /// `tracing` `EnvFilter` directive string.
        #[arg(long)]
        log_level: Option<String>,
    },
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err:?}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Daemon { config_file, log_format, log_level } => {
            init_logging(log_level, log_format)?;
            let config = repost_config::load(&config_file)?;
            let tick_interval = std::time::Duration::from_secs(
                u64::try_from(config.tick_interval.as_secs()).unwrap_or(30),
            );
            let ctx = repost_app::bootstrap(config).await?;
            repost_app::supervisor::run(ctx, tick_interval).await;
        }
        Command::Server { config_file, host, port, log_format, log_level } => {
            init_logging(log_level, log_format)?;
            let config = repost_config::load(&config_file)?;
            let ctx = repost_app::bootstrap(config).await?;
            let addr = SocketAddr::new(host.unwrap_or(DEFAULT_HOST), port.unwrap_or(DEFAULT_PORT));
            repost_api::ApiServer::new(ctx.store.clone()).serve(addr).await?;
        }
    }
    Ok(())
}

fn init_logging(log_level: Option<String>, log_format: Option<LogFormat>) -> anyhow::Result<()> {
    let logging = repost_telemetry::LoggingConfig::resolve(log_level, log_format);
    repost_telemetry::init_logging(&logging)?;
    Ok(())
}
