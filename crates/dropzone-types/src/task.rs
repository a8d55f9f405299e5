use serde::{Deserialize, Serialize};

use crate::arn::Arn;
use crate::error::{DropzoneError, Result};

/// Task starts requested per matching event.
pub const DEFAULT_INVOCATION_COUNT: u32 = 1;

/// Upper bound the compute service puts on the task count of one run-task call.
pub const MAX_TASKS_PER_CALL: u32 = 10;

/// A compute cluster supplied by the deployment layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub name: String,
    pub arn: Arn,
}

impl ClusterRef {
    pub fn new(region: &str, account: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let arn = Arn::ecs_cluster(region, account, &name);
        Self { name, arn }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_essential")]
    pub essential: bool,
}

fn default_essential() -> bool {
    true
}

/// A registered task definition. Referenced, never owned, by the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub arn: Arn,
    pub containers: Vec<ContainerDefinition>,
    /// Identity the container agent uses to pull images and ship logs.
    pub execution_role_arn: Arn,
    /// Identity the running containers assume.
    pub task_role_arn: Arn,
}

impl TaskTemplate {
    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// First essential container, the one whose command is overridden by default.
    pub fn default_container(&self) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.essential)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetClass {
    Public,
    Private,
    Isolated,
}

/// Where launched tasks are placed on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPlacement {
    pub subnet_class: SubnetClass,
    pub subnet_ids: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: bool,
}

impl NetworkPlacement {
    pub fn validate(&self) -> Result<()> {
        if self.subnet_ids.is_empty() {
            return Err(DropzoneError::InvalidConfig(format!(
                "no subnets supplied for subnet class {:?}",
                self.subnet_class
            )));
        }
        if self.assign_public_ip && self.subnet_class != SubnetClass::Public {
            return Err(DropzoneError::InvalidConfig(
                "a public IP can only be assigned to tasks in public subnets".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// How to run the compute task when the rule fires. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskInvocationSpec {
    cluster: ClusterRef,
    template: TaskTemplate,
    container_name: String,
    base_command: Vec<String>,
    invocation_count: u32,
    network: NetworkPlacement,
    tags: Vec<Tag>,
}

impl TaskInvocationSpec {
    pub fn builder(cluster: ClusterRef, template: TaskTemplate) -> TaskInvocationSpecBuilder {
        TaskInvocationSpecBuilder {
            cluster,
            template,
            container_name: None,
            base_command: Vec::new(),
            invocation_count: DEFAULT_INVOCATION_COUNT,
            network: None,
            tags: Vec::new(),
        }
    }

    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    pub fn template(&self) -> &TaskTemplate {
        &self.template
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn base_command(&self) -> &[String] {
        &self.base_command
    }

    pub fn invocation_count(&self) -> u32 {
        self.invocation_count
    }

    pub fn network(&self) -> &NetworkPlacement {
        &self.network
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Base command with the object key appended as the final argument.
    pub fn resolve_command(&self, object_key: &str) -> Vec<String> {
        let mut command = Vec::with_capacity(self.base_command.len() + 1);
        command.extend(self.base_command.iter().cloned());
        command.push(object_key.to_string());
        command
    }
}

/// Collects the invocation settings and validates them all at `build()`,
/// so a bad container name or placement fails at setup, not at first event.
pub struct TaskInvocationSpecBuilder {
    cluster: ClusterRef,
    template: TaskTemplate,
    container_name: Option<String>,
    base_command: Vec<String>,
    invocation_count: u32,
    network: Option<NetworkPlacement>,
    tags: Vec<Tag>,
}

impl TaskInvocationSpecBuilder {
    /// Container whose command is overridden. Defaults to the template's
    /// first essential container.
    pub fn container(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    pub fn base_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn invocation_count(mut self, count: u32) -> Self {
        self.invocation_count = count;
        self
    }

    pub fn network(mut self, network: NetworkPlacement) -> Self {
        self.network = Some(network);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn build(self) -> Result<TaskInvocationSpec> {
        if self.cluster.arn.service != "ecs" || self.cluster.arn.resource_type() != "cluster" {
            return Err(DropzoneError::InvalidConfig(format!(
                "{} is not a cluster ARN",
                self.cluster.arn
            )));
        }
        if self.template.arn.service != "ecs"
            || self.template.arn.resource_type() != "task-definition"
        {
            return Err(DropzoneError::InvalidConfig(format!(
                "{} is not a task definition ARN",
                self.template.arn
            )));
        }

        let container_name = match self.container_name {
            Some(name) => name,
            None => self
                .template
                .default_container()
                .map(|c| c.name.clone())
                .ok_or_else(|| {
                    DropzoneError::InvalidConfig(format!(
                        "task definition {} has no essential container",
                        self.template.arn
                    ))
                })?,
        };
        if self.template.container(&container_name).is_none() {
            return Err(DropzoneError::UnknownContainer {
                container: container_name,
                task_definition: self.template.arn.to_string(),
            });
        }

        if !(1..=MAX_TASKS_PER_CALL).contains(&self.invocation_count) {
            return Err(DropzoneError::InvalidConfig(format!(
                "invocation count must be between 1 and {MAX_TASKS_PER_CALL}, got {}",
                self.invocation_count
            )));
        }

        let network = self.network.ok_or_else(|| {
            DropzoneError::InvalidConfig("network placement is required".into())
        })?;
        network.validate()?;

        Ok(TaskInvocationSpec {
            cluster: self.cluster,
            template: self.template,
            container_name,
            base_command: self.base_command,
            invocation_count: self.invocation_count,
            network,
            tags: self.tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: &str = "ap-northeast-1";
    const ACCOUNT: &str = "123456789012";

    fn template() -> TaskTemplate {
        TaskTemplate {
            arn: Arn::ecs_task_definition(REGION, ACCOUNT, "dz-task", 1),
            containers: vec![
                ContainerDefinition {
                    name: "log-router".into(),
                    image: None,
                    essential: false,
                },
                ContainerDefinition {
                    name: "app".into(),
                    image: Some("dz-app:latest".into()),
                    essential: true,
                },
            ],
            execution_role_arn: Arn::iam_role(ACCOUNT, "dz-exec"),
            task_role_arn: Arn::iam_role(ACCOUNT, "dz-task"),
        }
    }

    fn public_network() -> NetworkPlacement {
        NetworkPlacement {
            subnet_class: SubnetClass::Public,
            subnet_ids: vec!["subnet-1".into()],
            security_groups: vec!["sg-1".into()],
            assign_public_ip: true,
        }
    }

    fn cluster() -> ClusterRef {
        ClusterRef::new(REGION, ACCOUNT, "dz-cluster")
    }

    #[test]
    fn test_build_defaults_to_essential_container() {
        let spec = TaskInvocationSpec::builder(cluster(), template())
            .base_command(["/usr/src/app/lib/index.js"])
            .network(public_network())
            .build()
            .unwrap();
        assert_eq!(spec.container_name(), "app");
        assert_eq!(spec.invocation_count(), DEFAULT_INVOCATION_COUNT);
    }

    #[test]
    fn test_build_rejects_unknown_container() {
        let result = TaskInvocationSpec::builder(cluster(), template())
            .container("worker")
            .network(public_network())
            .build();
        assert!(matches!(
            result,
            Err(DropzoneError::UnknownContainer { container, .. }) if container == "worker"
        ));
    }

    #[test]
    fn test_build_rejects_zero_invocations() {
        let result = TaskInvocationSpec::builder(cluster(), template())
            .invocation_count(0)
            .network(public_network())
            .build();
        assert!(matches!(result, Err(DropzoneError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_bounds_invocation_count() {
        let at_limit = TaskInvocationSpec::builder(cluster(), template())
            .invocation_count(MAX_TASKS_PER_CALL)
            .network(public_network())
            .build();
        assert_eq!(at_limit.unwrap().invocation_count(), MAX_TASKS_PER_CALL);

        let over = TaskInvocationSpec::builder(cluster(), template())
            .invocation_count(MAX_TASKS_PER_CALL + 1)
            .network(public_network())
            .build();
        assert!(matches!(
            over,
            Err(DropzoneError::InvalidConfig(msg)) if msg.contains("between 1 and 10")
        ));
    }

    #[test]
    fn test_build_requires_network() {
        let result = TaskInvocationSpec::builder(cluster(), template()).build();
        assert!(matches!(result, Err(DropzoneError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_swapped_arns() {
        let mut bad = cluster();
        bad.arn = Arn::ecs_task_definition(REGION, ACCOUNT, "dz-task", 1);
        let result = TaskInvocationSpec::builder(bad, template())
            .network(public_network())
            .build();
        assert!(matches!(result, Err(DropzoneError::InvalidConfig(_))));
    }

    #[test]
    fn test_public_ip_requires_public_subnets() {
        let mut network = public_network();
        network.subnet_class = SubnetClass::Private;
        assert!(network.validate().is_err());

        network.assign_public_ip = false;
        assert!(network.validate().is_ok());

        network.subnet_ids.clear();
        assert!(network.validate().is_err());
    }

    #[test]
    fn test_resolve_command_appends_key() {
        let spec = TaskInvocationSpec::builder(cluster(), template())
            .base_command(["node", "/usr/src/app/lib/index.js"])
            .network(public_network())
            .build()
            .unwrap();
        assert_eq!(
            spec.resolve_command("input/report.csv"),
            vec!["node", "/usr/src/app/lib/index.js", "input/report.csv"]
        );
        // The base command itself is untouched.
        assert_eq!(spec.base_command().len(), 2);
    }
}
