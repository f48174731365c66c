//! Producers: fetch-and-aggregate strategies, one per metric group.
//!
//! Every variant fetches through [`DevOpsApi`] and writes into the
//! [`MetricFamilies`] it declares. They differ only in which endpoints they call,
//! how records map to label sets, and whether they tally (`record`) or set
//! absolute values (`record_value`).

mod agent_pool;
mod build;
mod general;
mod latest_build;
mod project;
mod pull_request;
mod release;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::api::{DevOpsApi, FetchError, Project};
use crate::metrics::{MetricDesc, MetricFamilies};

/// Inputs shared by every producer during one cycle.
#[derive(Clone, Copy)]
pub struct ProduceContext<'a> {
    pub api: &'a dyn DevOpsApi,
    /// Projects known at startup.
    pub projects: &'a [Project],
    /// Agent pool ids to report; empty means all pools.
    pub agent_pool_filter: &'a [i64],
}

/// The closed set of producers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Producer {
    General,
    Project,
    PullRequest,
    Build,
    LatestBuild,
    Release,
    AgentPool,
}

impl Producer {
    /// All producers, in registration order.
    pub const ALL: [Producer; 7] = [
        Producer::General,
        Producer::Project,
        Producer::PullRequest,
        Producer::LatestBuild,
        Producer::Build,
        Producer::Release,
        Producer::AgentPool,
    ];

    /// Metric families this producer writes.
    pub fn families(&self) -> &'static [&'static MetricDesc] {
        match self {
            Self::General => &general::FAMILIES,
            Self::Project => &project::FAMILIES,
            Self::PullRequest => &pull_request::FAMILIES,
            Self::Build => &build::FAMILIES,
            Self::LatestBuild => &latest_build::FAMILIES,
            Self::Release => &release::FAMILIES,
            Self::AgentPool => &agent_pool::FAMILIES,
        }
    }

    /// Run one fetch-and-aggregate pass into `out`.
    pub async fn produce(
        &self,
        ctx: ProduceContext<'_>,
        out: &MetricFamilies,
    ) -> Result<(), FetchError> {
        match self {
            Self::General => general::produce(ctx, out).await,
            Self::Project => project::produce(ctx, out).await,
            Self::PullRequest => pull_request::produce(ctx, out).await,
            Self::Build => build::produce(ctx, out).await,
            Self::LatestBuild => latest_build::produce(ctx, out).await,
            Self::Release => release::produce(ctx, out).await,
            Self::AgentPool => agent_pool::produce(ctx, out).await,
        }
    }
}

/// Seconds since the epoch with millisecond precision.
fn timestamp(ts: chrono::DateTime<chrono::Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}
