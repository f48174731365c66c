//! Scriptable in-memory [`DevOpsApi`] for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::error::FetchError;
use super::traits::DevOpsApi;
use super::types::{Agent, AgentPool, Build, Project, PullRequest, Release, Repository};

#[derive(Default)]
pub(crate) struct MockApi {
    pub projects: Mutex<Vec<Project>>,
    pub repositories: Mutex<HashMap<String, Vec<Repository>>>,
    pub pull_requests: Mutex<HashMap<String, Vec<PullRequest>>>,
    pub builds: Mutex<HashMap<String, Vec<Build>>>,
    pub latest_builds: Mutex<HashMap<String, Vec<Build>>>,
    pub releases: Mutex<HashMap<String, Vec<Release>>>,
    pub pools: Mutex<Vec<AgentPool>>,
    pub agents: Mutex<HashMap<i64, Vec<Agent>>>,
    pub delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    agent_calls: Mutex<Vec<i64>>,
}

impl MockApi {
    pub fn with_projects(projects: Vec<Project>) -> Self {
        let api = Self::default();
        *api.projects.lock() = projects;
        api
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Pool ids `list_agents` was called with, in call order.
    pub fn agent_calls(&self) -> Vec<i64> {
        self.agent_calls.lock().clone()
    }

    async fn enter(&self) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 503,
                url: "mock://devops".to_string(),
            });
        }
        Ok(())
    }

    fn by_project<T: Clone>(map: &Mutex<HashMap<String, Vec<T>>>, project_id: &str) -> Vec<T> {
        map.lock().get(project_id).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DevOpsApi for MockApi {
    async fn list_projects(&self) -> Result<Vec<Project>, FetchError> {
        self.enter().await?;
        Ok(self.projects.lock().clone())
    }

    async fn list_repositories(&self, project_id: &str) -> Result<Vec<Repository>, FetchError> {
        self.enter().await?;
        Ok(Self::by_project(&self.repositories, project_id))
    }

    async fn list_pull_requests(&self, project_id: &str) -> Result<Vec<PullRequest>, FetchError> {
        self.enter().await?;
        Ok(Self::by_project(&self.pull_requests, project_id))
    }

    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, FetchError> {
        self.enter().await?;
        Ok(Self::by_project(&self.builds, project_id))
    }

    async fn list_latest_builds(&self, project_id: &str) -> Result<Vec<Build>, FetchError> {
        self.enter().await?;
        Ok(Self::by_project(&self.latest_builds, project_id))
    }

    async fn list_releases(&self, project_id: &str) -> Result<Vec<Release>, FetchError> {
        self.enter().await?;
        Ok(Self::by_project(&self.releases, project_id))
    }

    async fn list_agent_pools(&self) -> Result<Vec<AgentPool>, FetchError> {
        self.enter().await?;
        Ok(self.pools.lock().clone())
    }

    async fn list_agents(&self, pool_id: i64) -> Result<Vec<Agent>, FetchError> {
        self.agent_calls.lock().push(pool_id);
        self.enter().await?;
        Ok(self.agents.lock().get(&pool_id).cloned().unwrap_or_default())
    }
}
