//! Latest build producer: the most recent finished build of each definition.

use futures::future::try_join_all;

use crate::api::FetchError;
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::{ProduceContext, timestamp};

static LATEST_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_latest_info",
    "Azure DevOps latest build of a definition",
    &[
        "project_id",
        "definition_id",
        "definition",
        "build_id",
        "build_number",
        "result",
        "source_branch",
    ],
);

static LATEST_STATUS: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_latest_status",
    "Azure DevOps latest build result (0 succeeded, 1 partially succeeded, 2 failed, 3 canceled, -1 other)",
    &["project_id", "definition_id"],
);

static LATEST_FINISHED: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_latest_finished_timestamp",
    "Azure DevOps latest build finish time",
    &["project_id", "definition_id"],
);

pub(super) static FAMILIES: [&MetricDesc; 3] = [&LATEST_INFO, &LATEST_STATUS, &LATEST_FINISHED];

pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let fetches = ctx.projects.iter().map(|project| async move {
        for build in ctx.api.list_latest_builds(&project.id).await? {
            let definition_id = build.definition.id.to_string();
            let per_definition = labels([
                ("project_id", project.id.clone()),
                ("definition_id", definition_id.clone()),
            ]);

            out.record_value(&LATEST_STATUS, per_definition.clone(), build.result_code());
            if let Some(finished) = build.finish_time {
                out.record_value(&LATEST_FINISHED, per_definition, timestamp(finished));
            }
            out.record_value(
                &LATEST_INFO,
                labels([
                    ("project_id", project.id.clone()),
                    ("definition_id", definition_id),
                    ("definition", build.definition.name),
                    ("build_id", build.id.to_string()),
                    ("build_number", build.build_number),
                    ("result", build.result.unwrap_or_default()),
                    ("source_branch", build.source_branch.unwrap_or_default()),
                ]),
                1.0,
            );
        }
        Ok::<_, FetchError>(())
    });

    try_join_all(fetches).await?;
    Ok(())
}
