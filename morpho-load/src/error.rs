use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single task iteration.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{path} returned {status}")]
    Status { path: String, status: StatusCode },

    #[error("Unable to parse body of {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid request path: {0}")]
    InvalidPath(String),
}

/// Failure to set up a swarm run.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Invalid host {host}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Host {0} cannot be used as a base URL.")]
    CannotBeABase(String),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("User {0} has no tasks with a non-zero weight.")]
    NoTasks(&'static str),
}
