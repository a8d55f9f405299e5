use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dropzone_types::{NetworkPlacement, Tag};

/// Launch type used for every started task; tasks run on serverless
/// capacity in the task's own network interface.
pub const LAUNCH_TYPE: &str = "FARGATE";

/// Body of a run-task call, in the compute service's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub count: u32,
    pub launch_type: String,
    pub started_by: String,
    /// Identity the routing service assumed to make the call.
    pub role_arn: String,
    pub overrides: TaskOverride,
    pub network_configuration: NetworkConfiguration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOverride {
    pub container_overrides: Vec<ContainerOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOverride {
    pub name: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub awsvpc_configuration: AwsVpcConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignPublicIp {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsVpcConfiguration {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: AssignPublicIp,
}

impl From<&NetworkPlacement> for NetworkConfiguration {
    fn from(placement: &NetworkPlacement) -> Self {
        Self {
            awsvpc_configuration: AwsVpcConfiguration {
                subnets: placement.subnet_ids.clone(),
                security_groups: placement.security_groups.clone(),
                assign_public_ip: if placement.assign_public_ip {
                    AssignPublicIp::Enabled
                } else {
                    AssignPublicIp::Disabled
                },
            },
        }
    }
}

/// A task the cluster accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedTask {
    pub task_arn: String,
    pub task_definition_arn: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTaskOutput {
    pub tasks: Vec<LaunchedTask>,
}
