//! Build producer: recent builds per project.

use futures::future::try_join_all;

use crate::api::FetchError;
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::ProduceContext;

static BUILD_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_info",
    "Azure DevOps build",
    &[
        "project_id",
        "definition_id",
        "definition",
        "build_id",
        "build_number",
        "status",
        "result",
        "reason",
        "source_branch",
        "requested_by",
        "agent_pool",
    ],
);

static BUILD_DURATION: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_duration_seconds",
    "Azure DevOps build run time",
    &["project_id", "definition_id", "build_id"],
);

static BUILD_QUEUE: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_queue_seconds",
    "Azure DevOps build time spent waiting for an agent",
    &["project_id", "definition_id", "build_id"],
);

static BUILD_COUNT: MetricDesc = MetricDesc::gauge(
    "azure_devops_build_count",
    "Azure DevOps builds by definition and result",
    &["project_id", "definition_id", "result"],
);

pub(super) static FAMILIES: [&MetricDesc; 4] =
    [&BUILD_INFO, &BUILD_DURATION, &BUILD_QUEUE, &BUILD_COUNT];

pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let fetches = ctx.projects.iter().map(|project| async move {
        for build in ctx.api.list_builds(&project.id).await? {
            let build_id = build.id.to_string();
            let definition_id = build.definition.id.to_string();
            let result = build.result.clone().unwrap_or_default();

            out.record_value(
                &BUILD_INFO,
                labels([
                    ("project_id", project.id.clone()),
                    ("definition_id", definition_id.clone()),
                    ("definition", build.definition.name.clone()),
                    ("build_id", build_id.clone()),
                    ("build_number", build.build_number.clone()),
                    ("status", build.status.clone().unwrap_or_default()),
                    ("result", result.clone()),
                    ("reason", build.reason.clone().unwrap_or_default()),
                    ("source_branch", build.source_branch.clone().unwrap_or_default()),
                    ("requested_by", build.requested_by.name().to_string()),
                    (
                        "agent_pool",
                        build.queue.as_ref().map(|q| q.name.clone()).unwrap_or_default(),
                    ),
                ]),
                1.0,
            );

            let timing = labels([
                ("project_id", project.id.clone()),
                ("definition_id", definition_id.clone()),
                ("build_id", build_id),
            ]);
            if let Some(seconds) = build.duration_seconds() {
                out.record_value(&BUILD_DURATION, timing.clone(), seconds);
            }
            if let Some(seconds) = build.queue_seconds() {
                out.record_value(&BUILD_QUEUE, timing, seconds);
            }

            out.record(
                &BUILD_COUNT,
                labels([
                    ("project_id", project.id.clone()),
                    ("definition_id", definition_id),
                    ("result", result),
                ]),
            );
        }
        Ok::<_, FetchError>(())
    });

    try_join_all(fetches).await?;
    Ok(())
}
