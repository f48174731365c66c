//! Release producer: recent releases per project.

use futures::future::try_join_all;

use crate::api::FetchError;
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::{ProduceContext, timestamp};

static RELEASE_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_release_info",
    "Azure DevOps release",
    &[
        "project_id",
        "release_id",
        "release",
        "definition_id",
        "definition",
        "status",
        "reason",
        "requested_by",
    ],
);

static RELEASE_CREATED: MetricDesc = MetricDesc::gauge(
    "azure_devops_release_created_timestamp",
    "Azure DevOps release creation time",
    &["project_id", "release_id"],
);

static RELEASE_COUNT: MetricDesc = MetricDesc::gauge(
    "azure_devops_release_count",
    "Azure DevOps releases by definition and status",
    &["project_id", "definition_id", "status"],
);

pub(super) static FAMILIES: [&MetricDesc; 3] = [&RELEASE_INFO, &RELEASE_CREATED, &RELEASE_COUNT];

pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let fetches = ctx.projects.iter().map(|project| async move {
        for release in ctx.api.list_releases(&project.id).await? {
            let release_id = release.id.to_string();
            let definition_id = release.release_definition.id.to_string();
            let status = release.status.clone().unwrap_or_default();

            out.record_value(
                &RELEASE_INFO,
                labels([
                    ("project_id", project.id.clone()),
                    ("release_id", release_id.clone()),
                    ("release", release.name.clone()),
                    ("definition_id", definition_id.clone()),
                    ("definition", release.release_definition.name.clone()),
                    ("status", status.clone()),
                    ("reason", release.reason.clone().unwrap_or_default()),
                    ("requested_by", release.created_by.name().to_string()),
                ]),
                1.0,
            );
            out.record_value(
                &RELEASE_CREATED,
                labels([("project_id", project.id.clone()), ("release_id", release_id)]),
                timestamp(release.created_on),
            );
            out.record(
                &RELEASE_COUNT,
                labels([
                    ("project_id", project.id.clone()),
                    ("definition_id", definition_id),
                    ("status", status),
                ]),
            );
        }
        Ok::<_, FetchError>(())
    });

    try_join_all(fetches).await?;
    Ok(())
}
