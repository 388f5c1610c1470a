mod telemetry;

use clap::Parser;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use telemetry::{reading_url, Telemetry};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const TOKEN_HEADER: &str = "X-Device-Token";

/// Pushes simulated temperature/humidity readings to the ingestor.
#[derive(Debug, Parser)]
#[command(name = "simulator", version)]
struct Args {
    /// Base URL of the ingestor
    #[arg(long, env = "INGESTOR_URL", default_value = "http://localhost:5000")]
    url: String,

    #[arg(long, env = "DEVICE_ID", default_value = "device-001")]
    device_id: String,

    /// Shared secret for the device
    #[arg(long, env = "DEVICE_TOKEN", hide_env_values = true)]
    token: String,

    /// Milliseconds between readings
    #[arg(long, env = "INTERVAL_MS", default_value_t = 10_000)]
    interval_ms: u64,

    /// Number of readings to send; 0 runs until interrupted
    #[arg(long, env = "COUNT", default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = reading_url(&args.url, &args.device_id);
    info!("Starting sensor simulator");
    info!(
        "Device: {}, target: {}, interval: {}ms",
        args.device_id, url, args.interval_ms
    );

    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let sent = run(&client, &args, &url, shutdown).await?;
    info!("Simulator stopped after {} readings", sent);
    Ok(())
}

/// Posts a reading every interval until `count` is reached or `shutdown` completes.
///
/// `shutdown` also interrupts a request that is still in flight.
async fn run<F>(client: &Client, args: &Args, url: &str, shutdown: F) -> anyhow::Result<u64>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut sent = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = ticker.tick() => {}
        }

        let telemetry = Telemetry::generate(&mut rand::thread_rng());
        let request = client
            .post(url)
            .header(TOKEN_HEADER, &args.token)
            .json(&telemetry)
            .send();

        let result = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            result = request => result,
        };

        match result {
            Ok(resp) if resp.status().is_success() => {
                sent += 1;
                info!(
                    temperature = telemetry.temperature,
                    humidity = telemetry.humidity,
                    "Reading accepted ({} sent)",
                    sent
                );
            }
            Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                error!("Ingestor rejected the device token for {}", args.device_id);
                anyhow::bail!("unauthorized device {}", args.device_id);
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!("Reading rejected with {}: {}", status, body);
            }
            Err(e) => {
                warn!("Failed to send reading: {}", e);
            }
        }

        if args.count > 0 && sent >= args.count {
            break;
        }
    }

    Ok(sent)
}
