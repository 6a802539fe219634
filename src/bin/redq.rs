//! redq CLI: run a broker, queue messages, recover stranded work.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use redq::config::{BrokerConfig, Config};
use redq::{Broker, BrokerEvent, CommandListener, RedisStore};
use redq::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use tracing::info;

#[derive(Parser)]
#[command(name = "redq", about = "Reliable work-queue broker on Redis lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the broker until the process is stopped
    Serve {
        /// TOML file with a [broker] table
        #[arg(long)]
        config: Option<PathBuf>,
        /// Channel to watch; repeat for several, first has priority
        #[arg(long = "channel", short = 'c')]
        channels: Vec<String>,
        /// Drop a message after this many unacknowledged deliveries
        #[arg(long)]
        nesting_limit: Option<NonZeroU32>,
        /// Executable run per message (payload on stdin); exit 0 acknowledges
        #[arg(long)]
        exec: Option<PathBuf>,
        /// Executable run when a message hits the nesting limit
        #[arg(long)]
        on_nesting_limit: Option<PathBuf>,
    },
    /// Push a new message onto a channel
    Queue {
        /// Target channel
        channel: String,
        /// Message payload
        data: String,
    },
    /// Move stranded in-flight copies back onto their channels
    Recover {
        /// TOML file with a [broker] table
        #[arg(long)]
        config: Option<PathBuf>,
        /// Channel to recover; repeat for several
        #[arg(long = "channel", short = 'c')]
        channels: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "redq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let store = RedisStore::connect(config.redis_url.expose_secret()).await?;
    store.health_check().await?;
    let store = Arc::new(store);

    match cli.command {
        Command::Serve {
            config: file,
            channels,
            nesting_limit,
            exec,
            on_nesting_limit,
        } => {
            let settings = resolve_broker_config(
                &config,
                file,
                BrokerConfig {
                    channels,
                    nesting_limit,
                },
            )?;

            let mut broker = Broker::new(store, settings.channels);
            broker.set_nesting_limit(settings.nesting_limit);

            let dispatcher = broker.dispatcher_mut();
            match exec {
                Some(program) => dispatcher.add_listener(
                    BrokerEvent::MessageReceived,
                    CommandListener::new(BrokerEvent::MessageReceived, program),
                ),
                None => dispatcher.on(BrokerEvent::MessageReceived, |event| {
                    info!(
                        channel = event.channel(),
                        message_id = event.message_id(),
                        data = event.data(),
                        "message received"
                    );
                    event.acknowledge();
                    Ok(())
                }),
            }
            if let Some(program) = on_nesting_limit {
                dispatcher.add_listener(
                    BrokerEvent::NestingLimit,
                    CommandListener::new(BrokerEvent::NestingLimit, program),
                );
            }

            // Stopping mid-delivery is safe: the next start recovers the in-flight copy.
            tokio::select! {
                result = broker.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("interrupted, stopping broker"),
            }
            Ok(())
        }
        Command::Queue { channel, data } => {
            let broker = Broker::new(store, [channel.as_str()]);
            let message = broker.queue(data, &channel).await?;
            println!("{}", message.uuid());
            Ok(())
        }
        Command::Recover {
            config: file,
            channels,
        } => {
            let settings = resolve_broker_config(
                &config,
                file,
                BrokerConfig {
                    channels,
                    nesting_limit: None,
                },
            )?;
            let broker = Broker::new(store, settings.channels);
            let recovered = broker.flush_temporary().await?;
            println!("Recovered {recovered} message(s)");
            Ok(())
        }
    }
}

/// Environment, then config file, then command-line flags.
fn resolve_broker_config(
    config: &Config,
    file: Option<PathBuf>,
    flags: BrokerConfig,
) -> anyhow::Result<BrokerConfig> {
    let mut settings = config.broker.clone();
    if let Some(path) = file {
        settings = settings.merge(BrokerConfig::load_file(&path)?);
    }
    let settings = settings.merge(flags);
    settings.validate()?;
    Ok(settings)
}
