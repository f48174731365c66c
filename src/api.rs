//! Azure DevOps API layer.
//!
//! - [`DevOpsApi`]: the capability producers fetch through
//! - [`AzureDevOpsClient`]: REST implementation on top of `reqwest`
//! - [`FetchError`]: transport, status and decode failures

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod traits;
mod types;

pub use client::{API_VERSION, AzureDevOpsClient, DEFAULT_API_URL, DEFAULT_RELEASE_API_URL};
pub use error::FetchError;
pub use traits::DevOpsApi;
pub use types::{
    Agent, AgentPool, Build, DefinitionRef, IdentityRef, JobRequest, Project, PullRequest,
    QueueRef, Release, Repository, RepositoryRef,
};
