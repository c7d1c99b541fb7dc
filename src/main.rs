use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use fleet_monitor::bus::{
    BusListener, BusPublisher, ListenerOptions, MqttTransport, TransportOptions,
};
use fleet_monitor::config::Config;
use fleet_monitor::console::{self, ConsoleSession};
use fleet_monitor::producer::{self, Dispatcher, StaticRecordStore, TelemetryGenerator};
use fleet_monitor::protocol::{Channel, Role};

#[derive(Parser, Debug)]
#[command(version, about = "Device fleet / operator console bridge over a pub/sub bus")]
struct Args {
    /// Bus host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Bus port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the producer loop: periodic samples plus full status snapshots
    Monitor,
    /// Respond to control commands
    Command,
    /// Respond to query requests
    Query,
    /// Bind an operator console session and render incoming events
    Console,
    /// Write an example configuration file and exit
    #[command(name = "write-config")]
    WriteConfig {
        #[arg(default_value = "fleet-monitor.toml")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Mode::WriteConfig { path } = &args.mode {
        Config::save_example(path)?;
        println!("wrote example configuration to {path}");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            Config::from_file(path).with_context(|| format!("loading configuration {path}"))?
        }
        None => Config::default(),
    };
    if let Some(host) = &args.host {
        config.bus.host = host.clone();
    }
    if let Some(port) = args.port {
        config.bus.port = port;
    }

    init_tracing(&config);
    info!(
        host = %config.bus.host,
        port = config.bus.port,
        mode = ?args.mode,
        "starting"
    );

    match args.mode {
        Mode::Monitor => run_monitor(&config).await,
        Mode::Command => run_responder(&config, &[Channel::ControlCommands]).await,
        Mode::Query => run_responder(&config, &[Channel::QueryRequests]).await,
        Mode::Console => run_console(&config).await,
        Mode::WriteConfig { .. } => Ok(()),
    }
}

fn init_tracing(config: &Config) {
    let file = rolling::daily(&config.logging.directory, &config.logging.file);
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    let console_layer = fmt::layer()
        .pretty()
        .with_filter(EnvFilter::new(&config.logging.console_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn transport_options(config: &Config) -> TransportOptions {
    TransportOptions {
        host: config.bus.host.clone(),
        port: config.bus.port,
        keep_alive: Duration::from_secs(config.intervals.keep_alive_seconds),
        connect_timeout: Duration::from_secs(config.intervals.connect_timeout_seconds),
        queue_size: config.limits.transport_queue_size,
    }
}

fn listener_options(config: &Config) -> ListenerOptions {
    ListenerOptions {
        host: config.bus.host.clone(),
        port: config.bus.port,
        keep_alive: Duration::from_secs(config.intervals.keep_alive_seconds),
        connect_timeout: Duration::from_secs(config.intervals.connect_timeout_seconds),
        poll_idle: Duration::from_millis(config.intervals.poll_idle_ms),
        queue_size: config.limits.transport_queue_size,
    }
}

async fn run_monitor(config: &Config) -> anyhow::Result<()> {
    let (transport, driver) = MqttTransport::connect("producer", &transport_options(config))
        .await
        .context("connecting to the bus")?;
    let publisher = BusPublisher::new(transport, Role::Producer);
    let generator = TelemetryGenerator::with_reference_roster();
    info!(devices = generator.roster().len(), "monitor loop starting");

    tokio::select! {
        result = producer::run_monitor_loop(
            &publisher,
            &generator,
            Duration::from_secs(config.intervals.sample_seconds),
            config.intervals.status_every,
        ) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    driver.abort();
    Ok(())
}

async fn run_responder(config: &Config, channels: &[Channel]) -> anyhow::Result<()> {
    let (transport, driver) = MqttTransport::connect("responder", &transport_options(config))
        .await
        .context("connecting to the bus")?;
    let publisher = BusPublisher::new(transport, Role::Producer);
    let dispatcher = Dispatcher::new(
        TelemetryGenerator::with_reference_roster(),
        StaticRecordStore::with_audit_history(),
        publisher,
    );

    let listener = BusListener::new(listener_options(config));
    let (events_tx, mut events_rx) = mpsc::channel(config.limits.event_channel_size);
    listener
        .start(channels, events_tx)
        .await
        .context("starting the bus listener")?;
    info!(?channels, "responder listening");

    tokio::select! {
        _ = dispatcher.run(&mut events_rx) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    listener.stop().await;
    driver.abort();
    Ok(())
}

async fn run_console(config: &Config) -> anyhow::Result<()> {
    let (transport, driver) = MqttTransport::connect("console", &transport_options(config))
        .await
        .context("connecting to the bus")?;
    let mut session = ConsoleSession::new(transport, listener_options(config));

    let (events_tx, events_rx) = mpsc::channel(config.limits.event_channel_size);
    session
        .bind(events_tx)
        .await
        .context("binding the console session")?;
    info!("console session bound, rendering incoming events");

    tokio::select! {
        _ = console::render_events(events_rx) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, closing session"),
    }
    session.shutdown().await;
    driver.abort();
    Ok(())
}
