//! Remote API capability consumed by producers.

use super::error::FetchError;
use super::types::{Agent, AgentPool, Build, Project, PullRequest, Release, Repository};

/// Read-only view of an Azure DevOps organisation.
///
/// Every call may fail with a [`FetchError`]. An empty list is a valid answer
/// and never an error.
#[async_trait::async_trait]
pub trait DevOpsApi: Send + Sync + 'static {
    /// All projects of the organisation.
    async fn list_projects(&self) -> Result<Vec<Project>, FetchError>;

    /// Git repositories of a project.
    async fn list_repositories(&self, project_id: &str) -> Result<Vec<Repository>, FetchError>;

    /// Active pull requests of a project.
    async fn list_pull_requests(&self, project_id: &str) -> Result<Vec<PullRequest>, FetchError>;

    /// Recent builds of a project, newest first.
    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, FetchError>;

    /// The latest build of every build definition of a project.
    async fn list_latest_builds(&self, project_id: &str) -> Result<Vec<Build>, FetchError>;

    /// Recent releases of a project.
    async fn list_releases(&self, project_id: &str) -> Result<Vec<Release>, FetchError>;

    /// All agent pools of the organisation.
    async fn list_agent_pools(&self) -> Result<Vec<AgentPool>, FetchError>;

    /// Agents registered in a pool, including their assigned job.
    async fn list_agents(&self, pool_id: i64) -> Result<Vec<Agent>, FetchError>;
}
