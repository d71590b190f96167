use clap::Parser;
use mock_service::MockState;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Mock project/model API")]
struct Cli {
    #[arg(short, long, default_value_t = 3002)]
    port: u16,

    /// Number of projects served from /project/
    #[arg(long, default_value_t = 10)]
    projects: usize,

    /// Delay added to every response
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    let cli = Cli::parse();
    let state = MockState::with_projects(cli.projects);
    state.set_delay(Duration::from_millis(cli.delay_ms));

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!("Serving {} projects on {addr}", cli.projects);
    mock_service::run(addr, state).await
}
