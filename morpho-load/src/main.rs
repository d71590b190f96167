use anyhow::Context;
use clap::Parser;
use morpho_load::{ProjectUser, Swarm, SwarmCli, SwarmConfig};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "morpho_load=info".into()),
        )
        .init();

    let cli = SwarmCli::parse();

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Unable to install Prometheus exporter")?;
        info!("Serving metrics on {addr}");
    }

    let stats = Swarm::new(SwarmConfig::from(&cli))
        .run::<ProjectUser>()
        .await
        .context("Swarm failed to start")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
    }

    if stats.has_failures() {
        error!("Run finished with failures.");
        std::process::exit(1);
    }

    Ok(())
}
