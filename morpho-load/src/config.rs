//! Swarm configuration and CLI
use clap::Parser;
use rand::Rng;
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

const DEFAULT_USERS: usize = 1;
const DEFAULT_SPAWN_RATE: f64 = 1.;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Time a user waits after each task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitTime {
    None,
    Constant(Duration),
    /// Uniformly random in `[min, max]`.
    Between(Duration, Duration),
}

impl WaitTime {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        match *self {
            WaitTime::None => Duration::ZERO,
            WaitTime::Constant(dur) => dur,
            WaitTime::Between(min, max) if min >= max => min,
            WaitTime::Between(min, max) => rng.gen_range(min..=max),
        }
    }
}

/// Configuration of a single swarm run
///
/// # Example
/// ```no_run
/// use morpho_load::prelude::*;
/// use std::time::Duration;
///
/// let config = SwarmConfig::new("http://127.0.0.1:8000")
///     .users(50)
///     .spawn_rate(10.)
///     .run_time(Duration::from_secs(120))
///     .wait(WaitTime::Between(Duration::from_millis(100), Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub host: String,
    pub users: NonZeroUsize,
    /// Users started per second.
    pub spawn_rate: f64,
    pub run_time: Option<Duration>,
    pub wait: WaitTime,
    /// Request rate cap across the whole swarm.
    pub max_rps: Option<NonZeroU32>,
    pub timeout: Duration,
    pub report_interval: Duration,
}

impl SwarmConfig {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            users: NonZeroUsize::MIN,
            spawn_rate: DEFAULT_SPAWN_RATE,
            run_time: None,
            wait: WaitTime::None,
            max_rps: None,
            timeout: DEFAULT_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    /// Number of concurrent users. Zero is bumped to one.
    pub fn users(mut self, users: usize) -> Self {
        self.users = NonZeroUsize::new(users).unwrap_or(NonZeroUsize::MIN);
        self
    }

    /// Users started per second. Non-positive values start every user at once.
    pub fn spawn_rate(mut self, spawn_rate: f64) -> Self {
        self.spawn_rate = spawn_rate;
        self
    }

    pub fn run_time(mut self, run_time: Duration) -> Self {
        self.run_time = Some(run_time);
        self
    }

    pub fn wait(mut self, wait: WaitTime) -> Self {
        self.wait = wait;
        self
    }

    pub fn max_rps(mut self, max_rps: NonZeroU32) -> Self {
        self.max_rps = Some(max_rps);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn report_interval(mut self, report_interval: Duration) -> Self {
        self.report_interval = report_interval;
        self
    }

    /// Delay between two consecutive user starts.
    pub(crate) fn spawn_interval(&self) -> Duration {
        if self.spawn_rate.is_finite() && self.spawn_rate > 0. {
            // NOTE: Tiny rates overflow Duration, those users are effectively never spawned.
            Duration::try_from_secs_f64(1. / self.spawn_rate).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

/// Command line arguments for a swarm run.
///
/// `-H`, `--host` base URL of the target service
///
/// `-u`, `--users` number of concurrent users (default `1`)
///
/// `-r`, `--spawn-rate` users started per second (default `1`)
///
/// `-t`, `--run-time` stop after the given time, e.g. `90s` or `5m` (default: run until Ctrl-C)
///
/// # Example
/// ```ignore
/// $ morpho-load -H http://127.0.0.1:8000 -u 100 -r 10 -t 5m
/// $ morpho-load -H http://127.0.0.1:8000 --wait-min 1s --wait-max 3s --json
/// ```
#[derive(Parser, Debug)]
#[command(name = "morpho-load", version, about = "Load test the project/model read API")]
pub struct SwarmCli {
    #[arg(short('H'), long)]
    pub host: String,

    #[arg(short, long, default_value_t = DEFAULT_USERS)]
    pub users: usize,

    #[arg(short('r'), long, default_value_t = DEFAULT_SPAWN_RATE)]
    pub spawn_rate: f64,

    #[arg(short('t'), long, value_parser = humantime::parse_duration)]
    pub run_time: Option<Duration>,

    /// Minimum wait after each task
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait_min: Option<Duration>,

    /// Maximum wait after each task
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait_max: Option<Duration>,

    /// Request rate cap across all users
    #[arg(long)]
    pub max_rps: Option<NonZeroU32>,

    /// Per-request timeout
    #[arg(long, value_parser = humantime::parse_duration, default_value = "60s")]
    pub timeout: Duration,

    /// Interval between progress reports
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub report_interval: Duration,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl SwarmCli {
    pub fn wait_time(&self) -> WaitTime {
        match (self.wait_min, self.wait_max) {
            (None, None) => WaitTime::None,
            (Some(dur), None) | (None, Some(dur)) => WaitTime::Constant(dur),
            (Some(min), Some(max)) if min == max => WaitTime::Constant(min),
            (Some(min), Some(max)) => WaitTime::Between(min.min(max), min.max(max)),
        }
    }
}

impl From<&SwarmCli> for SwarmConfig {
    fn from(cli: &SwarmCli) -> Self {
        let mut config = SwarmConfig::new(&cli.host)
            .users(cli.users)
            .spawn_rate(cli.spawn_rate)
            .wait(cli.wait_time())
            .timeout(cli.timeout)
            .report_interval(cli.report_interval);
        config.run_time = cli.run_time;
        config.max_rps = cli.max_rps;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn cli_maps_into_config() {
        let cli = SwarmCli::parse_from([
            "morpho-load",
            "-H",
            "http://127.0.0.1:3002",
            "-u",
            "20",
            "-r",
            "4",
            "-t",
            "90s",
            "--wait-min",
            "100ms",
            "--wait-max",
            "1s",
        ]);
        let config = SwarmConfig::from(&cli);

        assert_eq!(config.host, "http://127.0.0.1:3002");
        assert_eq!(config.users.get(), 20);
        assert_eq!(config.run_time, Some(Duration::from_secs(90)));
        assert_eq!(config.spawn_interval(), Duration::from_millis(250));
        assert_eq!(
            config.wait,
            WaitTime::Between(Duration::from_millis(100), Duration::from_secs(1))
        );
        assert_eq!(config.max_rps, None);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn zero_users_and_spawn_rate() {
        let config = SwarmConfig::new("http://localhost").users(0).spawn_rate(0.);
        assert_eq!(config.users.get(), 1);
        assert_eq!(config.spawn_interval(), Duration::ZERO);
    }

    #[test]
    fn tiny_spawn_rate_saturates() {
        let cli = SwarmCli::parse_from(["morpho-load", "-H", "http://127.0.0.1:1", "-r", "1e-30"]);
        let config = SwarmConfig::from(&cli);
        assert_eq!(config.spawn_interval(), Duration::MAX);
    }

    #[test]
    fn wait_time_sampling() {
        let mut rng = SmallRng::seed_from_u64(7);
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(20);

        assert_eq!(WaitTime::None.sample(&mut rng), Duration::ZERO);
        assert_eq!(WaitTime::Constant(min).sample(&mut rng), min);
        assert_eq!(WaitTime::Between(max, min).sample(&mut rng), max);
        for _ in 0..100 {
            let dur = WaitTime::Between(min, max).sample(&mut rng);
            assert!(dur >= min && dur <= max);
        }
    }
}
