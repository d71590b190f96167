//! Request and task statistics
//!
//! Every request and every task run by a swarm is recorded into a shared [`StatsRegistry`]. Counts
//! are plain atomics; latencies land in a lock-free bucket and are folded into a TDigest whenever a
//! snapshot is taken.
use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Name of the row summing up every request or task.
pub const AGGREGATED: &str = "Aggregated";

pub(crate) struct StatsRegistry {
    start: Instant,
    users: AtomicUsize,
    requests: Registry,
    tasks: Registry,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            users: AtomicUsize::new(0),
            requests: Registry::default(),
            tasks: Registry::default(),
        }
    }

    pub fn user_started(&self) {
        self.users.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, name: &str, elapsed: Duration, success: bool) {
        #[cfg(feature = "metrics")]
        {
            let outcome = if success { "success" } else { "failure" };
            metrics::counter!("morpho_load.request", "name" => name.to_string(), "outcome" => outcome)
                .increment(1);
            metrics::histogram!("morpho_load.request.latency", "name" => name.to_string())
                .record(elapsed.as_secs_f64());
        }

        self.requests.record(name, elapsed, success);
    }

    pub fn record_task(&self, name: &str, elapsed: Duration, success: bool) {
        #[cfg(feature = "metrics")]
        {
            let outcome = if success { "success" } else { "failure" };
            metrics::counter!("morpho_load.task", "name" => name.to_string(), "outcome" => outcome)
                .increment(1);
        }

        self.tasks.record(name, elapsed, success);
    }

    pub fn snapshot(&self) -> RunStatistics {
        let elapsed = self.start.elapsed();
        RunStatistics {
            elapsed,
            users: self.users.load(Ordering::Relaxed),
            requests: self.requests.collect(elapsed),
            tasks: self.tasks.collect(elapsed),
        }
    }
}

#[derive(Default)]
struct Registry {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    total: Entry,
}

impl Registry {
    fn record(&self, name: &str, elapsed: Duration, success: bool) {
        self.entry(name).record(elapsed, success);
        self.total.record(elapsed, success);
    }

    fn entry(&self, name: &str) -> Arc<Entry> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(name) {
                return entry.clone();
            }
        }

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn collect(&self, elapsed: Duration) -> Vec<EndpointStatistics> {
        let entries: Vec<(String, Arc<Entry>)> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        let mut rows: Vec<_> = entries
            .into_iter()
            .map(|(name, entry)| entry.statistics(name, elapsed))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows.push(self.total.statistics(AGGREGATED.to_string(), elapsed));
        rows
    }
}

struct Entry {
    success: AtomicU64,
    failure: AtomicU64,
    latency: AtomicBucket<Duration>,
    summary: Mutex<LatencySummary>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            latency: AtomicBucket::new(),
            summary: Mutex::new(LatencySummary::new()),
        }
    }
}

impl Entry {
    fn record(&self, elapsed: Duration, success: bool) {
        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
        }
        self.latency.push(elapsed);
    }

    fn statistics(&self, name: String, elapsed: Duration) -> EndpointStatistics {
        let mut summary = self.summary.lock().unwrap_or_else(PoisonError::into_inner);
        self.latency.clear_with(|durs| summary.populate(durs));

        let success = self.success.load(Ordering::Relaxed);
        let failures = self.failure.load(Ordering::Relaxed);
        let requests = success + failures;
        let secs = elapsed.as_secs_f64();

        EndpointStatistics {
            name,
            requests,
            failures,
            rps: if secs > 0. { requests as f64 / secs } else { 0. },
            latency_min: summary.min.unwrap_or_default(),
            latency_max: summary.max,
            latency_p50: summary.quantile(0.5),
            latency_p90: summary.quantile(0.9),
            latency_p99: summary.quantile(0.99),
        }
    }
}

struct LatencySummary {
    digest: TDigest<K1>,
    count: u64,
    min: Option<Duration>,
    max: Duration,
}

impl LatencySummary {
    fn new() -> Self {
        Self {
            digest: TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE),
            count: 0,
            min: None,
            max: Duration::ZERO,
        }
    }

    fn populate(&mut self, durs: &[Duration]) {
        for dur in durs {
            self.digest.insert(dur.as_secs_f64());
            self.count += 1;
            self.min = Some(self.min.map_or(*dur, |min| min.min(*dur)));
            self.max = self.max.max(*dur);
        }
    }

    fn quantile(&self, quantile: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let secs = self.digest.quantile(quantile);
        // NOTE: TDigest can hand back NaN for tiny inputs.
        if secs.is_finite() && secs >= 0. {
            Duration::from_secs_f64(secs)
        } else {
            error!("Non-finite latency quantile {quantile}.");
            Duration::ZERO
        }
    }
}

/// Statistics for a single request name or task name
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatistics {
    pub name: String,
    pub requests: u64,
    pub failures: u64,
    pub rps: f64,
    #[serde(serialize_with = "as_millis")]
    pub latency_min: Duration,
    #[serde(serialize_with = "as_millis")]
    pub latency_max: Duration,
    #[serde(serialize_with = "as_millis")]
    pub latency_p50: Duration,
    #[serde(serialize_with = "as_millis")]
    pub latency_p90: Duration,
    #[serde(serialize_with = "as_millis")]
    pub latency_p99: Duration,
}

impl EndpointStatistics {
    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            0.
        } else {
            self.failures as f64 / self.requests as f64
        }
    }
}

/// Statistics for a whole swarm run
///
/// Rows are sorted by name and the last row of each list is the [`AGGREGATED`] total.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub users: usize,
    pub requests: Vec<EndpointStatistics>,
    pub tasks: Vec<EndpointStatistics>,
}

impl RunStatistics {
    pub fn request(&self, name: &str) -> Option<&EndpointStatistics> {
        self.requests.iter().find(|row| row.name == name)
    }

    pub fn task(&self, name: &str) -> Option<&EndpointStatistics> {
        self.tasks.iter().find(|row| row.name == name)
    }

    pub fn total_requests(&self) -> Option<&EndpointStatistics> {
        self.requests.last()
    }

    /// True if any request or task failed.
    pub fn has_failures(&self) -> bool {
        self.requests
            .iter()
            .chain(self.tasks.iter())
            .any(|row| row.failures > 0)
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ran {} with {} users",
            humantime::format_duration(Duration::from_secs(self.elapsed.as_secs())),
            self.users
        )?;
        write_table(f, "Request", &self.requests)?;
        write_table(f, "Task", &self.tasks)
    }
}

fn write_table(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    rows: &[EndpointStatistics],
) -> fmt::Result {
    writeln!(
        f,
        "{:<32} {:>8} {:>8} {:>9} {:>10} {:>10} {:>10}",
        title, "# reqs", "# fails", "req/s", "p50", "p90", "p99"
    )?;
    for row in rows {
        writeln!(
            f,
            "{:<32} {:>8} {:>8} {:>9.2} {:>10} {:>10} {:>10}",
            row.name,
            row.requests,
            row.failures,
            row.rps,
            format_latency(row.latency_p50),
            format_latency(row.latency_p90),
            format_latency(row.latency_p99),
        )?;
    }
    Ok(())
}

fn format_latency(dur: Duration) -> String {
    format!("{:.1}ms", dur.as_secs_f64() * 1000.)
}

fn as_millis<S: Serializer>(dur: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(dur.as_secs_f64() * 1000.)
}
