//! REST client for Azure DevOps.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::error::FetchError;
use super::traits::DevOpsApi;
use super::types::{Agent, AgentPool, Build, ListResponse, Project, PullRequest, Release, Repository};

/// Default organisation API endpoint.
pub const DEFAULT_API_URL: &str = "https://dev.azure.com";

/// Default release management API endpoint.
pub const DEFAULT_RELEASE_API_URL: &str = "https://vsrm.dev.azure.com";

/// REST API version sent with every request.
pub const API_VERSION: &str = "5.0";

/// Number of builds/releases requested per project.
const LIST_TOP: &str = "100";

/// Azure DevOps client authenticated with a personal access token.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct AzureDevOpsClient {
    http: Client,
    organisation: String,
    access_token: String,
    api_url: String,
    release_api_url: String,
}

impl AzureDevOpsClient {
    /// Create a client. `timeout` bounds every single request.
    pub fn new(
        organisation: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("azure-devops-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            organisation: organisation.into(),
            access_token: access_token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            release_api_url: DEFAULT_RELEASE_API_URL.to_string(),
        })
    }

    /// Override the organisation API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Override the release management API base URL.
    pub fn with_release_api_url(mut self, url: impl Into<String>) -> Self {
        self.release_api_url = url.into();
        self
    }

    fn url(&self, base: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            self.organisation,
            path.trim_start_matches('/')
        )
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, FetchError> {
        tracing::trace!(url = %url, "Requesting Azure DevOps list");

        let response = self
            .http
            .get(&url)
            .basic_auth("", Some(&self.access_token))
            .query(&[("api-version", API_VERSION)])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        let list: ListResponse<T> =
            serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                url: url.clone(),
                source,
            })?;
        Ok(list.value)
    }
}

impl std::fmt::Debug for AzureDevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsClient")
            .field("organisation", &self.organisation)
            .field("api_url", &self.api_url)
            .field("release_api_url", &self.release_api_url)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl DevOpsApi for AzureDevOpsClient {
    async fn list_projects(&self) -> Result<Vec<Project>, FetchError> {
        let url = self.url(&self.api_url, "_apis/projects");
        self.get_list(url, &[]).await
    }

    async fn list_repositories(&self, project_id: &str) -> Result<Vec<Repository>, FetchError> {
        let url = self.url(
            &self.api_url,
            &format!("{}/_apis/git/repositories", project_id),
        );
        self.get_list(url, &[]).await
    }

    async fn list_pull_requests(&self, project_id: &str) -> Result<Vec<PullRequest>, FetchError> {
        let url = self.url(
            &self.api_url,
            &format!("{}/_apis/git/pullrequests", project_id),
        );
        self.get_list(url, &[("searchCriteria.status", "active")])
            .await
    }

    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, FetchError> {
        let url = self.url(&self.api_url, &format!("{}/_apis/build/builds", project_id));
        self.get_list(
            url,
            &[("queryOrder", "queueTimeDescending"), ("$top", LIST_TOP)],
        )
        .await
    }

    async fn list_latest_builds(&self, project_id: &str) -> Result<Vec<Build>, FetchError> {
        let url = self.url(&self.api_url, &format!("{}/_apis/build/builds", project_id));
        self.get_list(
            url,
            &[
                ("queryOrder", "finishTimeDescending"),
                ("maxBuildsPerDefinition", "1"),
            ],
        )
        .await
    }

    async fn list_releases(&self, project_id: &str) -> Result<Vec<Release>, FetchError> {
        let url = self.url(
            &self.release_api_url,
            &format!("{}/_apis/release/releases", project_id),
        );
        self.get_list(url, &[("$top", LIST_TOP)]).await
    }

    async fn list_agent_pools(&self) -> Result<Vec<AgentPool>, FetchError> {
        let url = self.url(&self.api_url, "_apis/distributedtask/pools");
        self.get_list(url, &[]).await
    }

    async fn list_agents(&self, pool_id: i64) -> Result<Vec<Agent>, FetchError> {
        let url = self.url(
            &self.api_url,
            &format!("_apis/distributedtask/pools/{}/agents", pool_id),
        );
        self.get_list(url, &[("includeAssignedRequest", "true")])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Basic auth header for an empty user and the token "secret".
    const AUTH_HEADER: &str = "Basic OnNlY3JldA==";

    fn client(server: &MockServer) -> AzureDevOpsClient {
        AzureDevOpsClient::new("myorg", "secret", Duration::from_secs(5))
            .unwrap()
            .with_api_url(server.uri())
            .with_release_api_url(server.uri())
    }

    #[tokio::test]
    async fn test_list_projects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myorg/_apis/projects"))
            .and(query_param("api-version", API_VERSION))
            .and(header("authorization", AUTH_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2,
                "value": [
                    { "id": "1", "name": "P", "state": "wellFormed" },
                    { "id": "2", "name": "Q", "state": "wellFormed" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let projects = client(&server).list_projects().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0], Project::new("1", "P").with_state("wellFormed"));
    }

    #[tokio::test]
    async fn test_list_agents_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myorg/_apis/distributedtask/pools/7/agents"))
            .and(query_param("includeAssignedRequest", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "value": [{ "id": 1, "name": "agent-1", "status": "offline" }]
            })))
            .mount(&server)
            .await;

        let agents = client(&server).list_agents(7).await.unwrap();
        assert_eq!(agents.len(), 1);
        assert!(!agents[0].is_online());
    }

    #[tokio::test]
    async fn test_releases_use_release_api_url() {
        let server = MockServer::start().await;
        let release_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myorg/1/_apis/release/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0, "value": [] })))
            .expect(1)
            .mount(&release_server)
            .await;

        let client = client(&server).with_release_api_url(release_server.uri());
        let releases = client.list_releases("1").await.unwrap();
        assert!(releases.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_permanent_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myorg/_apis/projects"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).list_projects().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 401, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myorg/_apis/distributedtask/pools"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).list_agent_pools().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myorg/1/_apis/git/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>sign in</html>"))
            .mount(&server)
            .await;

        let err = client(&server).list_repositories("1").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = AzureDevOpsClient::new("myorg", "secret", Duration::from_secs(5)).unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("myorg"));
        assert!(!debug.contains("secret"));
    }
}
