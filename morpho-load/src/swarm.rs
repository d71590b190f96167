//! Swarm of simulated users
//!
//! A swarm spawns `users` copies of a [`User`] at the configured spawn rate. Each one loops
//! forever: pick a task at random (weighted by [`TaskInfo::weight`]), run it, wait. The swarm
//! stops once the run time elapses or on Ctrl-C and hands back the collected [`RunStatistics`].
use crate::client::HttpClient;
use crate::config::{SwarmConfig, WaitTime};
use crate::error::{SwarmError, TaskError};
use crate::stats::{RunStatistics, StatsRegistry};
use crate::task::{TaskData, TASK_HOOK};
use governor::{Quota, RateLimiter};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Name and relative weight of one of a user's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: &'static str,
    pub weight: u32,
}

impl TaskInfo {
    pub const fn new(name: &'static str, weight: u32) -> Self {
        Self { name, weight }
    }
}

/// A simulated user
///
/// One instance is created per simulated user and lives until the swarm stops; any state it
/// keeps is private to that user.
pub trait User: Sized + Send + 'static {
    const NAME: &'static str;

    /// Tasks in the order `run_task` indexes them.
    const TASKS: &'static [TaskInfo];

    fn on_start(client: HttpClient) -> Self;

    fn run_task(
        &mut self,
        index: usize,
    ) -> impl Future<Output = Result<(), TaskError>> + Send + '_;
}

/// Handler for running a swarm.
///
/// # Example
/// ```no_run
/// use morpho_load::prelude::*;
/// use morpho_load::ProjectUser;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), morpho_load::SwarmError> {
///     let stats = Swarm::new(
///         SwarmConfig::new("http://127.0.0.1:3002")
///             .users(10)
///             .run_time(Duration::from_secs(30)),
///     )
///     .run::<ProjectUser>()
///     .await?;
///
///     println!("{stats}");
///     Ok(())
/// }
/// ```
pub struct Swarm {
    config: SwarmConfig,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    #[instrument(name = "swarm", skip_all, fields(user = U::NAME, host = %self.config.host))]
    pub async fn run<U: User>(self) -> Result<RunStatistics, SwarmError> {
        let config = self.config;
        let weights = WeightedIndex::new(U::TASKS.iter().map(|task| task.weight))
            .map_err(|_| SwarmError::NoTasks(U::NAME))?;
        let client = HttpClient::new(&config.host, config.timeout)?;

        let data = TaskData {
            limiter: config
                .max_rps
                .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps)))),
            stats: Arc::new(StatsRegistry::new()),
        };

        info!("Running {} with config {:?}", U::NAME, &config);

        let reporter = tokio::spawn(
            report_task(data.stats.clone(), config.report_interval).in_current_span(),
        );

        let mut users: Vec<JoinHandle<()>> = Vec::with_capacity(config.users.get());
        let run_time = config.run_time;
        tokio::select! {
            _ = spawn_users::<U>(&mut users, &config, &client, &weights, &data) => {}
            _ = deadline(run_time) => info!("Run time elapsed."),
            _ = tokio::signal::ctrl_c() => warn!("Interrupted, stopping users."),
        }

        for handle in users.drain(..) {
            handle.abort();
        }
        reporter.abort();

        info!("Swarm complete");
        Ok(data.stats.snapshot())
    }
}

/// Spawns every user, then parks forever.
async fn spawn_users<U: User>(
    users: &mut Vec<JoinHandle<()>>,
    config: &SwarmConfig,
    client: &HttpClient,
    weights: &WeightedIndex<u32>,
    data: &TaskData,
) {
    let spawn_interval = config.spawn_interval();
    let count = config.users.get();

    for id in 0..count {
        let fut = user_task::<U>(
            id,
            client.clone(),
            weights.clone(),
            config.wait,
            data.stats.clone(),
        );
        users.push(tokio::spawn(
            TASK_HOOK.scope(data.clone(), fut).in_current_span(),
        ));

        if id + 1 < count && !spawn_interval.is_zero() {
            sleep(spawn_interval).await;
        }
    }

    info!("All {count} users spawned.");
    std::future::pending::<()>().await
}

async fn deadline(run_time: Option<Duration>) {
    match run_time {
        Some(run_time) => sleep(run_time).await,
        None => std::future::pending().await,
    }
}

#[instrument(name = "user", skip(client, weights, wait, stats))]
async fn user_task<U: User>(
    id: usize,
    client: HttpClient,
    weights: WeightedIndex<u32>,
    wait: WaitTime,
    stats: Arc<StatsRegistry>,
) {
    let mut rng = SmallRng::from_entropy();
    let mut user = U::on_start(client);
    stats.user_started();
    debug!("User started.");

    loop {
        let index = weights.sample(&mut rng);
        if let Err(err) = user.run_task(index).await {
            trace!("Task {} failed: {err}", U::TASKS[index].name);
        }

        let wait = wait.sample(&mut rng);
        if wait.is_zero() {
            // NOTE: Tasks that never await would otherwise starve the runtime.
            tokio::task::yield_now().await;
        } else {
            sleep(wait).await;
        }
    }
}

async fn report_task(stats: Arc<StatsRegistry>, report_interval: Duration) {
    if report_interval.is_zero() {
        return;
    }

    let mut interval = interval(report_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // NOTE: First tick completes instantly
    interval.tick().await;

    loop {
        interval.tick().await;
        let snapshot = stats.snapshot();
        if let Some(total) = snapshot.total_requests() {
            info!(
                "users={}, requests={}, failures={}, rps={:.2}, p50={:?}, p99={:?}",
                snapshot.users,
                total.requests,
                total.failures,
                total.rps,
                total.latency_p50,
                total.latency_p99,
            );
        }
    }
}
