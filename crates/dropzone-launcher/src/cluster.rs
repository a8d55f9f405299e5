use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;

use dropzone_permissions::{
    AccessRequest, CLUSTER_CONDITION_KEY, InvocationRole, PASS_ROLE, RUN_TASK, TAG_RESOURCE,
};
use dropzone_types::{Arn, ClusterRef, DropzoneError, MAX_TASKS_PER_CALL, Result, TaskTemplate};

use crate::request::{LaunchedTask, RunTaskOutput, RunTaskRequest};

/// The container-orchestration service the launcher calls.
#[async_trait]
pub trait ComputeCluster: Send + Sync {
    /// Start `request.count` tasks, acting as `caller`.
    async fn run_task(
        &self,
        caller: &InvocationRole,
        request: RunTaskRequest,
    ) -> Result<RunTaskOutput>;
}

/// A run-task call the in-memory cluster accepted.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedRequest {
    pub request: RunTaskRequest,
    pub tasks: Vec<LaunchedTask>,
}

/// Accepted calls kept by [`InMemoryCluster::new`].
pub const DEFAULT_TASK_HISTORY: usize = 1000;

#[derive(Default)]
struct History {
    recent: VecDeque<AcceptedRequest>,
    started: usize,
}

/// Single cluster that checks authorization the way the real service does
/// and records what it started instead of running anything.
///
/// Only the most recent accepted calls are kept; the started-task count
/// covers every call since construction.
pub struct InMemoryCluster {
    cluster: ClusterRef,
    templates: DashMap<String, TaskTemplate>,
    history: RwLock<History>,
    history_limit: usize,
}

impl InMemoryCluster {
    pub fn new(cluster: ClusterRef) -> Self {
        Self::with_history(cluster, DEFAULT_TASK_HISTORY)
    }

    /// Cluster that keeps at most `limit` accepted calls (at least one).
    pub fn with_history(cluster: ClusterRef, limit: usize) -> Self {
        Self {
            cluster,
            templates: DashMap::new(),
            history: RwLock::new(History::default()),
            history_limit: limit.max(1),
        }
    }

    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    pub fn register_template(&self, template: TaskTemplate) {
        self.templates.insert(template.arn.to_string(), template);
    }

    /// Retained accepted calls, oldest first.
    pub async fn accepted(&self) -> Vec<AcceptedRequest> {
        self.history.read().await.recent.iter().cloned().collect()
    }

    /// Tasks started since construction, including evicted calls.
    pub async fn task_count(&self) -> usize {
        self.history.read().await.started
    }

    fn authorize(&self, caller: &InvocationRole, request: AccessRequest) -> Result<()> {
        if caller.is_allowed(&request) {
            return Ok(());
        }
        tracing::error!(
            role = %caller.arn(),
            action = %request.action,
            resource = %request.resource,
            "run-task rejected: access denied"
        );
        Err(DropzoneError::AccessDenied {
            action: request.action,
            resource: request.resource,
        })
    }

    fn reject(&self, reason: String) -> DropzoneError {
        tracing::error!(cluster = %self.cluster.arn, %reason, "run-task rejected");
        DropzoneError::Invocation(reason)
    }
}

#[async_trait]
impl ComputeCluster for InMemoryCluster {
    async fn run_task(
        &self,
        caller: &InvocationRole,
        request: RunTaskRequest,
    ) -> Result<RunTaskOutput> {
        let cluster_arn = self.cluster.arn.to_string();
        if request.cluster != cluster_arn {
            return Err(self.reject(format!("cluster not found: {}", request.cluster)));
        }
        if request.role_arn != caller.arn().to_string() {
            return Err(self.reject(format!(
                "request signed for {} but made by {}",
                request.role_arn,
                caller.arn()
            )));
        }

        self.authorize(
            caller,
            AccessRequest::new(RUN_TASK, &request.task_definition)
                .with_context(CLUSTER_CONDITION_KEY, &cluster_arn),
        )?;

        let template = self
            .templates
            .get(&request.task_definition)
            .map(|t| t.value().clone())
            .ok_or_else(|| {
                self.reject(format!(
                    "task definition not registered: {}",
                    request.task_definition
                ))
            })?;

        for role in [&template.execution_role_arn, &template.task_role_arn] {
            self.authorize(caller, AccessRequest::new(PASS_ROLE, role))?;
        }

        for container in &request.overrides.container_overrides {
            if template.container(&container.name).is_none() {
                return Err(self.reject(format!(
                    "container '{}' is not defined in {}",
                    container.name, template.arn
                )));
            }
        }

        if request.count == 0 || request.count > MAX_TASKS_PER_CALL {
            return Err(self.reject(format!(
                "count must be between 1 and {MAX_TASKS_PER_CALL}, got {}",
                request.count
            )));
        }

        let now = Utc::now();
        let tasks: Vec<LaunchedTask> = (0..request.count)
            .map(|_| {
                let task_id = uuid::Uuid::new_v4().simple().to_string();
                let arn = Arn::ecs_task(
                    &self.cluster.arn.region,
                    &self.cluster.arn.account,
                    &self.cluster.name,
                    &task_id,
                );
                LaunchedTask {
                    task_arn: arn.to_string(),
                    task_definition_arn: request.task_definition.clone(),
                    created_at: now,
                }
            })
            .collect();

        if !request.tags.is_empty() {
            for task in &tasks {
                self.authorize(caller, AccessRequest::new(TAG_RESOURCE, &task.task_arn))?;
            }
        }

        let mut history = self.history.write().await;
        if history.recent.len() == self.history_limit {
            history.recent.pop_front();
        }
        history.started += tasks.len();
        history.recent.push_back(AcceptedRequest {
            request,
            tasks: tasks.clone(),
        });
        drop(history);
        Ok(RunTaskOutput { tasks })
    }
}
