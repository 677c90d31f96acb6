use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tdswatch::chart::{render_chart, ChartLabels};
use tdswatch::{
    AlertGuard, Coordinator, CsvHistory, HistoryLog, MqttPublisher, Notifier, PushoverNotifier,
    ReadingBuffer, Settings, Supervisor, Timestamp,
};
use tdswatch_adapters::mqtt::MqttSession;
use tdswatch_adapters::pushover::PushoverClient;

#[derive(Parser, Debug)]
#[command(name = "tdswatch")]
#[command(about = "Average TDS readings from MQTT, log them and alert when nutrients run low")]
#[command(version)]
struct Args {
    /// Path to a TOML settings file (TDSWATCH_* variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to the sensor topic and run the pipeline (default)
    Run,

    /// Render the recent history to a PNG and exit
    Chart {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Read values from stdin and publish them to the sensor topic
    Publish,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(&settings).await,
        Command::Chart { out } => export_chart(&settings, &out),
        Command::Publish => publish(&settings).await,
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run the ingestion pipeline until Ctrl-C or a fatal error.
async fn run(settings: &Settings) -> Result<()> {
    let client = PushoverClient::builder()
        .endpoint(&settings.pushover.endpoint)
        .token(&settings.pushover.token)
        .user(&settings.pushover.user)
        .timeout(settings.pushover_timeout())
        .build()
        .context("Failed to build Pushover client")?;

    let notifier = Notifier::new(
        Box::new(PushoverNotifier::new(client)),
        &settings.data_save_dir,
    )
    .with_history_hours(settings.history_hours);

    let mut coordinator = Coordinator::new(
        ReadingBuffer::new(settings.window_capacity)?,
        AlertGuard::new(settings.alert_reset),
        Box::new(CsvHistory::new(settings.history_path())),
        notifier,
        settings.min_tds,
    );

    let session = MqttSession::builder()
        .host(&settings.mqtt.host)
        .port(settings.mqtt.port)
        .client_id(&settings.mqtt.client_id)
        .subscribe_to(&settings.mqtt.topic)
        .keep_alive(settings.keep_alive())
        .build();
    let mut supervisor = Supervisor::new(session, settings.retry_policy());

    info!(
        broker = %format!("{}:{}", settings.mqtt.host, settings.mqtt.port),
        topic = %settings.mqtt.topic,
        window = settings.window_capacity,
        threshold = settings.min_tds,
        log = %settings.history_path().display(),
        "Starting tdswatch"
    );

    tokio::select! {
        result = supervisor.run(&mut coordinator) => {
            if let Err(e) = &result {
                error!("Pipeline stopped: {}", e);
            }
            result.context("Pipeline stopped")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

/// Write a chart of the last `history_hours` to `out` without alerting.
fn export_chart(settings: &Settings, out: &Path) -> Result<()> {
    let history = CsvHistory::new(settings.history_path());
    let now = Timestamp::now();
    let records = history
        .query_since(now.hours_before(settings.history_hours as f64))
        .context("Failed to read history")?;

    let png = render_chart(
        records,
        now,
        settings.history_hours,
        &ChartLabels::tds(settings.history_hours),
    )
    .context("Failed to render chart")?;

    std::fs::write(out, png).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Chart written to {}", out.display());
    Ok(())
}

/// Publish readings from stdin to the sensor topic.
async fn publish(settings: &Settings) -> Result<()> {
    let session = MqttSession::builder()
        .host(&settings.mqtt.host)
        .port(settings.mqtt.port)
        .client_id(format!("{}-publisher", settings.mqtt.client_id))
        .keep_alive(settings.keep_alive())
        .build();

    let mut supervisor = Supervisor::new(session, settings.retry_policy());
    supervisor
        .establish()
        .await
        .context("Failed to connect to broker")?;

    let mut publisher = MqttPublisher::new(supervisor.into_session(), &settings.mqtt.topic);
    let stdin = BufReader::new(tokio::io::stdin());
    let count = tdswatch::publish_lines(stdin, &mut publisher)
        .await
        .context("Failed to read stdin")?;

    info!(count, topic = %settings.mqtt.topic, "Published readings");
    if let Err(e) = publisher.session_mut().disconnect().await {
        error!("Disconnect failed: {}", e);
    }
    Ok(())
}
