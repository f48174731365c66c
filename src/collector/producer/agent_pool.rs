//! Agent pool producer: pools, their agents and running jobs.

use futures::future::try_join_all;

use crate::api::{AgentPool, FetchError};
use crate::metrics::{MetricDesc, MetricFamilies, labels};

use super::ProduceContext;

static POOL_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_agentpool_info",
    "Azure DevOps agent pool",
    &["agent_pool_id", "agent_pool", "pool_type", "is_hosted"],
);

static POOL_SIZE: MetricDesc = MetricDesc::gauge(
    "azure_devops_agentpool_size",
    "Azure DevOps agent pool size",
    &["agent_pool_id"],
);

static AGENT_INFO: MetricDesc = MetricDesc::gauge(
    "azure_devops_agentpool_agent_info",
    "Azure DevOps agent",
    &["agent_pool_id", "agent_id", "agent", "version", "enabled"],
);

static AGENT_STATUS: MetricDesc = MetricDesc::gauge(
    "azure_devops_agentpool_agent_status",
    "Azure DevOps agent status (1 online, 0 otherwise)",
    &["agent_pool_id", "agent_id", "status"],
);

static AGENT_JOB: MetricDesc = MetricDesc::gauge(
    "azure_devops_agentpool_agent_job_running",
    "Azure DevOps job currently assigned to an agent",
    &["agent_pool_id", "agent_id", "request_id", "definition"],
);

static AGENT_COUNT: MetricDesc = MetricDesc::gauge(
    "azure_devops_agentpool_agent_count",
    "Azure DevOps agents by pool and status",
    &["agent_pool_id", "status"],
);

pub(super) static FAMILIES: [&MetricDesc; 6] = [
    &POOL_INFO,
    &POOL_SIZE,
    &AGENT_INFO,
    &AGENT_STATUS,
    &AGENT_JOB,
    &AGENT_COUNT,
];

fn selected(pool: &AgentPool, filter: &[i64]) -> bool {
    filter.is_empty() || filter.contains(&pool.id)
}

pub(super) async fn produce(ctx: ProduceContext<'_>, out: &MetricFamilies) -> Result<(), FetchError> {
    let pools: Vec<AgentPool> = ctx
        .api
        .list_agent_pools()
        .await?
        .into_iter()
        .filter(|pool| selected(pool, ctx.agent_pool_filter))
        .collect();

    let fetches = pools.iter().map(|pool| async move {
        let pool_id = pool.id.to_string();

        out.record_value(
            &POOL_INFO,
            labels([
                ("agent_pool_id", pool_id.clone()),
                ("agent_pool", pool.name.clone()),
                ("pool_type", pool.pool_type.clone().unwrap_or_default()),
                ("is_hosted", pool.is_hosted.to_string()),
            ]),
            1.0,
        );
        out.record_value(
            &POOL_SIZE,
            labels([("agent_pool_id", pool_id.clone())]),
            pool.size as f64,
        );

        for agent in ctx.api.list_agents(pool.id).await? {
            let agent_id = agent.id.to_string();
            let status = agent.status.clone().unwrap_or_default();

            out.record_value(
                &AGENT_INFO,
                labels([
                    ("agent_pool_id", pool_id.clone()),
                    ("agent_id", agent_id.clone()),
                    ("agent", agent.name.clone()),
                    ("version", agent.version.clone().unwrap_or_default()),
                    ("enabled", agent.enabled.to_string()),
                ]),
                1.0,
            );
            out.record_value(
                &AGENT_STATUS,
                labels([
                    ("agent_pool_id", pool_id.clone()),
                    ("agent_id", agent_id.clone()),
                    ("status", status.clone()),
                ]),
                if agent.is_online() { 1.0 } else { 0.0 },
            );
            if let Some(job) = &agent.assigned_request {
                out.record_value(
                    &AGENT_JOB,
                    labels([
                        ("agent_pool_id", pool_id.clone()),
                        ("agent_id", agent_id),
                        ("request_id", job.request_id.to_string()),
                        (
                            "definition",
                            job.definition.as_ref().map(|d| d.name.clone()).unwrap_or_default(),
                        ),
                    ]),
                    1.0,
                );
            }
            out.record(
                &AGENT_COUNT,
                labels([("agent_pool_id", pool_id.clone()), ("status", status)]),
            );
        }
        Ok::<_, FetchError>(())
    });

    try_join_all(fetches).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::api::{Agent, JobRequest};
    use crate::collector::Producer;
    use crate::collector::producer::tests::run;

    fn agent(id: i64, status: &str, job: Option<i64>) -> Agent {
        Agent {
            id,
            name: format!("agent-{id}"),
            version: Some("3.220.0".to_string()),
            enabled: true,
            status: Some(status.to_string()),
            assigned_request: job.map(|request_id| JobRequest {
                request_id,
                assign_time: None,
                definition: None,
            }),
        }
    }

    fn api_with_pools() -> MockApi {
        let api = MockApi::default();
        *api.pools.lock() = vec![
            AgentPool::new(5, "Default"),
            AgentPool::new(6, "Hosted"),
            AgentPool::new(7, "Linux"),
        ];
        api.agents.lock().insert(
            7,
            vec![agent(1, "online", Some(99)), agent(2, "offline", None), agent(3, "online", None)],
        );
        api
    }

    #[tokio::test]
    async fn test_filter_limits_pools() {
        let api = api_with_pools();

        let snapshot = run(Producer::AgentPool, &api, &[], &[7]).await.unwrap();

        let pools = snapshot.rows(POOL_INFO.name);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].labels["agent_pool_id"], "7");
        assert_eq!(api.agent_calls(), vec![7]);
    }

    #[tokio::test]
    async fn test_empty_filter_reports_all_pools() {
        let api = api_with_pools();

        let snapshot = run(Producer::AgentPool, &api, &[], &[]).await.unwrap();

        assert_eq!(snapshot.rows(POOL_INFO.name).len(), 3);
        let mut calls = api.agent_calls();
        calls.sort();
        assert_eq!(calls, vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn test_agent_status_and_jobs() {
        let api = api_with_pools();

        let snapshot = run(Producer::AgentPool, &api, &[], &[7]).await.unwrap();

        let status = snapshot.rows(AGENT_STATUS.name);
        assert_eq!(status.len(), 3);
        let online: f64 = status.iter().map(|r| r.value).sum();
        assert_eq!(online, 2.0);

        let jobs = snapshot.rows(AGENT_JOB.name);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].labels["request_id"], "99");

        let counts = snapshot.rows(AGENT_COUNT.name);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].labels["status"], "offline");
        assert_eq!(counts[0].value, 1.0);
        assert_eq!(counts[1].value, 2.0);
    }
}
