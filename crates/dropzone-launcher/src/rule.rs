use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use dropzone_matcher::{
    EventMatcher, EventPattern, MatchCriteria, Mismatch, Rejection, first_mismatch,
};
use dropzone_permissions::{InvocationRole, RoleScope};
use dropzone_types::{DropzoneError, Result, StorageChangeEvent, TaskInvocationSpec};

use crate::cluster::ComputeCluster;
use crate::invocation::TaskInvocation;
use crate::request::RunTaskOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    Undecodable,
    NoMatch(Mismatch),
}

impl From<Rejection> for SkipReason {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Undecodable => SkipReason::Undecodable,
            Rejection::NoMatch(mismatch) => SkipReason::NoMatch(mismatch),
        }
    }
}

/// What a single delivery to a rule produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Skipped(SkipReason),
    Launched(RunTaskOutput),
}

/// Listing entry for a registered rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub name: String,
    pub state: RuleState,
    pub event_pattern: EventPattern,
    pub role_arn: String,
    pub task_definition: String,
    pub cluster: String,
}

/// An event rule bound to one task template.
///
/// Every delivered event that satisfies the criteria turns into exactly one
/// run-task call. Nothing is deduplicated, batched or retried.
pub struct TaskLauncher {
    name: String,
    matcher: EventMatcher,
    role: Arc<InvocationRole>,
    spec: Arc<TaskInvocationSpec>,
    cluster: Arc<dyn ComputeCluster>,
    enabled: AtomicBool,
}

impl TaskLauncher {
    /// Bind a rule. `role` must have been built for `spec`; a role scoped to
    /// another cluster or template is refused here rather than at the first
    /// denied launch.
    pub fn new(
        name: impl Into<String>,
        criteria: MatchCriteria,
        role: Arc<InvocationRole>,
        spec: Arc<TaskInvocationSpec>,
        cluster: Arc<dyn ComputeCluster>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DropzoneError::InvalidConfig("rule name is empty".into()));
        }
        if *role.scope() != RoleScope::for_spec(&spec) {
            return Err(DropzoneError::InvalidConfig(format!(
                "role {} is not scoped to task definition {}",
                role.arn(),
                spec.template().arn
            )));
        }
        role.audit()?;

        tracing::info!(
            rule = %name,
            bucket = %criteria.bucket_name,
            prefix = %criteria.key_prefix,
            task_definition = %spec.template().arn,
            "rule registered"
        );
        Ok(Self {
            name,
            matcher: EventMatcher::new(criteria),
            role,
            spec,
            cluster,
            enabled: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn criteria(&self) -> &MatchCriteria {
        self.matcher.criteria()
    }

    pub fn role(&self) -> &InvocationRole {
        &self.role
    }

    pub fn spec(&self) -> &TaskInvocationSpec {
        &self.spec
    }

    pub fn event_pattern(&self) -> EventPattern {
        EventPattern::from(self.matcher.criteria())
    }

    pub fn state(&self) -> RuleState {
        if self.enabled.load(Ordering::Acquire) {
            RuleState::Enabled
        } else {
            RuleState::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == RuleState::Enabled
    }

    pub fn enable(&self) {
        self.set_state(RuleState::Enabled);
    }

    pub fn disable(&self) {
        self.set_state(RuleState::Disabled);
    }

    pub fn set_state(&self, state: RuleState) {
        let enabled = state == RuleState::Enabled;
        if self.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            tracing::info!(rule = %self.name, ?state, "rule state changed");
        }
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            name: self.name.clone(),
            state: self.state(),
            event_pattern: self.event_pattern(),
            role_arn: self.role.arn().to_string(),
            task_definition: self.spec.template().arn.to_string(),
            cluster: self.spec.cluster().arn.to_string(),
        }
    }

    /// Decode a raw routed payload and deliver it.
    pub async fn deliver_raw(&self, payload: &serde_json::Value) -> Result<Delivery> {
        if !self.is_enabled() {
            tracing::debug!(rule = %self.name, "rule disabled");
            return Ok(Delivery::Skipped(SkipReason::Disabled));
        }
        match self.matcher.evaluate_raw(payload) {
            Ok(event) => self.launch(&event).await,
            Err(rejection) => {
                tracing::debug!(rule = %self.name, ?rejection, "skipping event");
                Ok(Delivery::Skipped(rejection.into()))
            }
        }
    }

    /// Launch the task for `event` if the rule is enabled and the event
    /// qualifies. A rejected run-task call is returned as is.
    pub async fn deliver(&self, event: &StorageChangeEvent) -> Result<Delivery> {
        if !self.is_enabled() {
            tracing::debug!(rule = %self.name, key = event.object_key(), "rule disabled");
            return Ok(Delivery::Skipped(SkipReason::Disabled));
        }
        if let Some(reason) = first_mismatch(event, self.matcher.criteria()) {
            tracing::debug!(rule = %self.name, key = event.object_key(), ?reason, "no match");
            return Ok(Delivery::Skipped(SkipReason::NoMatch(reason)));
        }
        self.launch(event).await
    }

    async fn launch(&self, event: &StorageChangeEvent) -> Result<Delivery> {
        let invocation = TaskInvocation::for_event(&self.name, &self.role, self.spec.clone(), event);
        match self.cluster.run_task(&self.role, invocation.to_request()).await {
            Ok(output) => {
                for task in &output.tasks {
                    tracing::info!(
                        rule = %self.name,
                        key = %invocation.object_key,
                        task = %task.task_arn,
                        "task launched"
                    );
                }
                Ok(Delivery::Launched(output))
            }
            Err(e) => {
                tracing::warn!(
                    rule = %self.name,
                    key = %invocation.object_key,
                    error = %e,
                    "task launch failed"
                );
                Err(e)
            }
        }
    }
}
