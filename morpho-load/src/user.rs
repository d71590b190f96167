//! Simulated user of the project/model read API
use crate::client::HttpClient;
use crate::error::TaskError;
use crate::swarm::{TaskInfo, User};
use morpho_load_macros::task;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{Map, Value};
use std::future::Future;
use tracing::debug;

pub const PROJECTS_PATH: &str = "/project/";
/// Request name shared by every `/project/{id}/models/` request.
pub const MODELS_NAME: &str = "/project/[id]/models/";

/// Project listing cached by a user after its first successful `/project/` fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCache {
    projects: Map<String, Value>,
    keys: Vec<String>,
}

impl ProjectCache {
    /// Parses a `/project/` body, which must be a JSON object keyed by project id.
    pub fn from_slice(path: &str, body: &[u8]) -> Result<Self, TaskError> {
        let projects: Map<String, Value> =
            serde_json::from_slice(body).map_err(|source| TaskError::Parse {
                path: path.to_string(),
                source,
            })?;
        Ok(Self::new(projects))
    }

    pub fn new(projects: Map<String, Value>) -> Self {
        let keys = projects.keys().cloned().collect();
        Self { projects, keys }
    }

    pub fn projects(&self) -> &Map<String, Value> {
        &self.projects
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Uniformly random project id, `None` if the listing was empty.
    pub fn choose(&self, rng: &mut SmallRng) -> Option<&str> {
        self.keys.choose(rng).map(String::as_str)
    }
}

/// User hitting `/project/` and `/project/{id}/models/` with equal weight.
pub struct ProjectUser {
    client: HttpClient,
    rng: SmallRng,
    cache: Option<ProjectCache>,
}

impl ProjectUser {
    pub fn new(client: HttpClient) -> Self {
        Self::with_rng(client, SmallRng::from_entropy())
    }

    pub fn with_rng(client: HttpClient, rng: SmallRng) -> Self {
        Self {
            client,
            rng,
            cache: None,
        }
    }

    pub fn cache(&self) -> Option<&ProjectCache> {
        self.cache.as_ref()
    }

    /// Lists every project. The first successful listing is cached for the rest of the session.
    #[task]
    pub async fn test_project(&mut self) -> Result<(), TaskError> {
        let response = self.client.get(PROJECTS_PATH).await?;
        if self.cache.is_none() {
            let cache = ProjectCache::from_slice(&response.path, &response.body)?;
            debug!("Cached {} projects.", cache.keys().len());
            self.cache = Some(cache);
        }
        Ok(())
    }

    /// Lists the models of a random cached project. Does nothing until projects are cached.
    #[task]
    pub async fn test_solution(&mut self) -> Result<(), TaskError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        let Some(project) = cache.choose(&mut self.rng) else {
            return Ok(());
        };

        self.client
            .get_segments(&["project", project, "models", ""], MODELS_NAME)
            .await?;
        Ok(())
    }
}

impl User for ProjectUser {
    const NAME: &'static str = "ProjectUser";
    const TASKS: &'static [TaskInfo] = &[
        TaskInfo::new("test_project", 1),
        TaskInfo::new("test_solution", 1),
    ];

    fn on_start(client: HttpClient) -> Self {
        Self::new(client)
    }

    fn run_task(
        &mut self,
        index: usize,
    ) -> impl Future<Output = Result<(), TaskError>> + Send + '_ {
        async move {
            match index {
                0 => self.test_project().await,
                _ => self.test_solution().await,
            }
        }
    }
}
