//! Project producer: project and repository inventory.

use futures::future::try_join_all;

use crate::api::FetchError;
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::ProduceContext;

static PROJECT_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_project_info",
    "Azure DevOps project",
    &["project_id", "project", "state", "visibility"],
);

static REPOSITORY_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_repository_info",
    "Azure DevOps git repository",
    &["project_id", "repository_id", "repository", "default_branch"],
);

static REPOSITORY_SIZE: MetricDesc = MetricDesc::gauge(
    "azure_devops_repository_size_bytes",
    "Azure DevOps git repository size in bytes",
    &["project_id", "repository_id"],
);

pub(super) static FAMILIES: [&MetricDesc; 3] = [&PROJECT_INFO, &REPOSITORY_INFO, &REPOSITORY_SIZE];

pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let fetches = ctx.projects.iter().map(|project| async move {
        out.record_value(
            &PROJECT_INFO,
            labels([
                ("project_id", project.id.clone()),
                ("project", project.name.clone()),
                ("state", project.state.clone().unwrap_or_default()),
                ("visibility", project.visibility.clone().unwrap_or_default()),
            ]),
            1.0,
        );

        for repository in ctx.api.list_repositories(&project.id).await? {
            out.record_value(
                &REPOSITORY_INFO,
                labels([
                    ("project_id", project.id.clone()),
                    ("repository_id", repository.id.clone()),
                    ("repository", repository.name),
                    ("default_branch", repository.default_branch.unwrap_or_default()),
                ]),
                1.0,
            );
            if let Some(size) = repository.size {
                out.record_value(
                    &REPOSITORY_SIZE,
                    labels([("project_id", project.id.clone()), ("repository_id", repository.id)]),
                    size as f64,
                );
            }
        }
        Ok::<_, FetchError>(())
    });

    try_join_all(fetches).await?;
    Ok(())
}
