//! Pull request producer: active pull requests per repository.

use futures::future::try_join_all;

use crate::api::FetchError;
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::{ProduceContext, timestamp};

static PULL_REQUEST_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_pullrequest_info",
    "Azure DevOps pull request",
    &[
        "project_id",
        "repository_id",
        "pullrequest_id",
        "title",
        "status",
        "creator",
        "is_draft",
        "source_branch",
        "target_branch",
    ],
);

static PULL_REQUEST_CREATED: MetricDesc = MetricDesc::gauge(
    "azure_devops_pullrequest_created_timestamp",
    "Azure DevOps pull request creation time",
    &["project_id", "repository_id", "pullrequest_id"],
);

static PULL_REQUEST_COUNT: MetricDesc = MetricDesc::gauge(
    "azure_devops_pullrequest_count",
    "Azure DevOps pull requests by repository and status",
    &["project_id", "repository_id", "status"],
);

pub(super) static FAMILIES: [&MetricDesc; 3] =
    [&PULL_REQUEST_INFO, &PULL_REQUEST_CREATED, &PULL_REQUEST_COUNT];

pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let fetches = ctx.projects.iter().map(|project| async move {
        for pr in ctx.api.list_pull_requests(&project.id).await? {
            let id = pr.pull_request_id.to_string();

            out.record_value(
                &PULL_REQUEST_INFO,
                labels([
                    ("project_id", project.id.clone()),
                    ("repository_id", pr.repository.id.clone()),
                    ("pullrequest_id", id.clone()),
                    ("title", pr.title.clone()),
                    ("status", pr.status.clone()),
                    ("creator", pr.created_by.name().to_string()),
                    ("is_draft", pr.is_draft.to_string()),
                    ("source_branch", pr.source_ref_name.clone()),
                    ("target_branch", pr.target_ref_name.clone()),
                ]),
                1.0,
            );
            out.record_value(
                &PULL_REQUEST_CREATED,
                labels([
                    ("project_id", project.id.clone()),
                    ("repository_id", pr.repository.id.clone()),
                    ("pullrequest_id", id),
                ]),
                timestamp(pr.creation_date),
            );
            out.record(
                &PULL_REQUEST_COUNT,
                labels([
                    ("project_id", project.id.clone()),
                    ("repository_id", pr.repository.id),
                    ("status", pr.status),
                ]),
            );
        }
        Ok::<_, FetchError>(())
    });

    try_join_all(fetches).await?;
    Ok(())
}
