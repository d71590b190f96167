#![doc = include_str!("../README.md")]

// Lets `#[task]` expand to `::morpho_load::...` paths inside this crate too.
extern crate self as morpho_load;

pub mod client;
pub mod config;
pub mod error;
pub mod stats;
pub mod swarm;
#[doc(hidden)]
pub mod task;
pub mod user;

pub use client::{HttpClient, Response};
pub use config::{SwarmCli, SwarmConfig, WaitTime};
pub use error::{SwarmError, TaskError};
pub use morpho_load_macros::task;
pub use stats::{EndpointStatistics, RunStatistics};
pub use swarm::{Swarm, TaskInfo, User};
pub use user::{ProjectCache, ProjectUser};

pub mod prelude {
    pub use crate::client::HttpClient;
    pub use crate::config::{SwarmConfig, WaitTime};
    pub use crate::error::TaskError;
    pub use crate::stats::RunStatistics;
    pub use crate::swarm::{Swarm, TaskInfo, User};
    pub use morpho_load_macros::task;
}
