use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use dropzone_types::{DropzoneError, Result};

use crate::rule::{Delivery, RuleState, SkipReason, TaskLauncher};

/// Outcome of one event at one rule, as reported back to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Launched { task_arns: Vec<String> },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDelivery {
    pub rule: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

impl RuleDelivery {
    fn from_result(rule: String, result: Result<Delivery>) -> Self {
        let outcome = match result {
            Ok(Delivery::Launched(output)) => DeliveryOutcome::Launched {
                task_arns: output.tasks.into_iter().map(|t| t.task_arn).collect(),
            },
            Ok(Delivery::Skipped(reason)) => DeliveryOutcome::Skipped { reason },
            Err(e) => DeliveryOutcome::Failed {
                error: e.to_string(),
            },
        };
        Self { rule, outcome }
    }
}

/// The event-routing service: owns rules and fans published events out.
#[async_trait]
pub trait EventRouter: Send + Sync {
    fn register(&self, launcher: Arc<TaskLauncher>) -> Result<()>;

    /// Route one raw event to every enabled rule.
    async fn put_event(&self, payload: serde_json::Value) -> Vec<RuleDelivery>;
}

#[derive(Default)]
pub struct InMemoryEventBus {
    rules: DashMap<String, Arc<TaskLauncher>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(&self, name: &str) -> Result<Arc<TaskLauncher>> {
        self.rules
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| DropzoneError::RuleNotFound(name.to_string()))
    }

    /// Registered rules, sorted by name.
    pub fn rules(&self) -> Vec<Arc<TaskLauncher>> {
        let mut rules: Vec<_> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| a.name().cmp(b.name()));
        rules
    }

    pub fn set_state(&self, name: &str, state: RuleState) -> Result<()> {
        self.rule(name)?.set_state(state);
        Ok(())
    }
}

#[async_trait]
impl EventRouter for InMemoryEventBus {
    fn register(&self, launcher: Arc<TaskLauncher>) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.rules.entry(launcher.name().to_string()) {
            Entry::Occupied(e) => Err(DropzoneError::DuplicateRule(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(launcher);
                Ok(())
            }
        }
    }

    async fn put_event(&self, payload: serde_json::Value) -> Vec<RuleDelivery> {
        let payload = Arc::new(payload);
        let handles: Vec<_> = self
            .rules()
            .into_iter()
            .filter(|rule| rule.is_enabled())
            .map(|rule| {
                let payload = payload.clone();
                let name = rule.name().to_string();
                let handle = tokio::spawn(async move { rule.deliver_raw(&payload).await });
                (name, handle)
            })
            .collect();

        let mut deliveries = Vec::with_capacity(handles.len());
        for (rule, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(DropzoneError::Invocation(format!("delivery task failed: {e}"))),
            };
            deliveries.push(RuleDelivery::from_result(rule, result));
        }
        deliveries
    }
}
