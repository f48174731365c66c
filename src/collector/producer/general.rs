//! General producer: one presence row per project.

use crate::api::FetchError;
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::ProduceContext;

static PROJECT_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_general_project_info",
    "Azure DevOps project presence",
    &["project_id", "project", "state"],
);

pub(super) static FAMILIES: [&MetricDesc; 1] = [&PROJECT_INFO];

/// Re-lists the organisation's projects so renamed or deleted projects show up
/// without a restart.
pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let projects = ctx.api.list_projects().await?;

    for project in projects {
        out.record_value(
            &PROJECT_INFO,
            labels([
                ("project_id", project.id),
                ("project", project.name),
                ("state", project.state.unwrap_or_default()),
            ]),
            1.0,
        );
    }
    Ok(())
}
