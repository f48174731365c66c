//! Azure DevOps REST resource types.
//!
//! Only the fields the producers read are modelled. Everything not guaranteed by
//! the REST API is optional or defaulted so partial payloads still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{ "count": n, "value": [...] }` envelope of list endpoints; only `value` is read.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// A team project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            state: None,
            visibility: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// A git repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Short reference to a repository embedded in other resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A user or service identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
}

impl IdentityRef {
    /// Display name, falling back to the unique name.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.unique_name.as_deref())
            .unwrap_or_default()
    }
}

/// A pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_draft: bool,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub created_by: IdentityRef,
    #[serde(default)]
    pub source_ref_name: String,
    #[serde(default)]
    pub target_ref_name: String,
    #[serde(default)]
    pub repository: RepositoryRef,
}

/// Build or release definition reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRef {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Agent queue reference of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueRef {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A build run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i64,
    #[serde(default)]
    pub build_number: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub queue_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub definition: DefinitionRef,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub requested_by: IdentityRef,
    #[serde(default)]
    pub queue: Option<QueueRef>,
}

/// Numeric code of a build result.
///
/// `succeeded=0`, `partiallySucceeded=1`, `failed=2`, `canceled=3`, anything
/// else (including a running build) is `-1`.
pub fn build_result_code(result: Option<&str>) -> f64 {
    match result {
        Some("succeeded") => 0.0,
        Some("partiallySucceeded") => 1.0,
        Some("failed") => 2.0,
        Some("canceled") => 3.0,
        _ => -1.0,
    }
}

fn seconds_between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    let (from, to) = (from?, to?);
    Some((to - from).num_milliseconds() as f64 / 1000.0)
}

impl Build {
    pub fn new(id: i64, definition: DefinitionRef) -> Self {
        Self {
            id,
            build_number: id.to_string(),
            status: None,
            result: None,
            reason: None,
            queue_time: None,
            start_time: None,
            finish_time: None,
            definition,
            source_branch: None,
            requested_by: IdentityRef::default(),
            queue: None,
        }
    }

    /// Run time from start to finish, if the build finished.
    pub fn duration_seconds(&self) -> Option<f64> {
        seconds_between(self.start_time, self.finish_time)
    }

    /// Time spent waiting for an agent, if the build started.
    pub fn queue_seconds(&self) -> Option<f64> {
        seconds_between(self.queue_time, self.start_time)
    }

    pub fn result_code(&self) -> f64 {
        build_result_code(self.result.as_deref())
    }
}

/// A release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub release_definition: DefinitionRef,
    #[serde(default)]
    pub created_by: IdentityRef,
}

/// An agent pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPool {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub is_hosted: bool,
    #[serde(default)]
    pub pool_type: Option<String>,
}

impl AgentPool {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            size: 0,
            is_hosted: false,
            pool_type: None,
        }
    }
}

/// Job currently assigned to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub request_id: i64,
    #[serde(default)]
    pub assign_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub definition: Option<DefinitionRef>,
}

/// A build/release agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assigned_request: Option<JobRequest>,
}

impl Agent {
    pub fn is_online(&self) -> bool {
        self.status.as_deref() == Some("online")
    }
}
