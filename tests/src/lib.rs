//! Helpers shared by the integration tests.
use mock_service::MockState;
use morpho_load::HttpClient;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("morpho_load=debug,mock_service=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Starts a mock service serving `projects` and returns its state and base URL.
pub async fn mock<I, S>(projects: I) -> (MockState, String)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    init();
    let state = MockState::default();
    state.set_projects(projects);
    let addr = mock_service::spawn(state.clone())
        .await
        .expect("mock service failed to start");
    (state, format!("http://{addr}"))
}

pub fn client(host: &str) -> HttpClient {
    HttpClient::new(host, Duration::from_secs(5)).expect("invalid host")
}
