use std::sync::Arc;

use serde::Serialize;

use dropzone_permissions::InvocationRole;
use dropzone_types::{Arn, StorageChangeEvent, TaskInvocationSpec};

use crate::request::{
    ContainerOverride, LAUNCH_TYPE, NetworkConfiguration, RunTaskRequest, TaskOverride,
};

/// One concrete task start, bound to the object that triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInvocation {
    pub rule_name: String,
    pub role_arn: Arn,
    pub object_key: String,
    pub command: Vec<String>,
    #[serde(skip)]
    spec: Arc<TaskInvocationSpec>,
}

impl TaskInvocation {
    pub fn for_event(
        rule_name: &str,
        role: &InvocationRole,
        spec: Arc<TaskInvocationSpec>,
        event: &StorageChangeEvent,
    ) -> Self {
        let object_key = event.object_key().to_string();
        Self {
            rule_name: rule_name.to_string(),
            role_arn: role.arn().clone(),
            command: spec.resolve_command(&object_key),
            object_key,
            spec,
        }
    }

    pub fn spec(&self) -> &TaskInvocationSpec {
        &self.spec
    }

    pub fn to_request(&self) -> RunTaskRequest {
        let spec = &self.spec;
        RunTaskRequest {
            cluster: spec.cluster().arn.to_string(),
            task_definition: spec.template().arn.to_string(),
            count: spec.invocation_count(),
            launch_type: LAUNCH_TYPE.to_string(),
            started_by: format!("events-rule/{}", self.rule_name),
            role_arn: self.role_arn.to_string(),
            overrides: TaskOverride {
                container_overrides: vec![ContainerOverride {
                    name: spec.container_name().to_string(),
                    command: self.command.clone(),
                }],
            },
            network_configuration: NetworkConfiguration::from(spec.network()),
            tags: spec.tags().to_vec(),
        }
    }
}
