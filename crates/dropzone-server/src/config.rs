use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use dropzone_launcher::DEFAULT_TASK_HISTORY;
use dropzone_matcher::MatchCriteria;
use dropzone_types::{
    Arn, ClusterRef, ContainerDefinition, NetworkPlacement, SubnetClass, TaskInvocationSpec,
    TaskTemplate,
};

/// Deployment settings for one drop-zone rule.
///
/// Everything the rule needs is derived from these fields: ARNs are built
/// from `account_id` and `region`, resource names from `name_prefix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropzoneConfig {
    /// Prefix for the rule (`<prefix>-rule`) and its role (`<prefix>-rule-role`).
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    pub account_id: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket whose uploads trigger the task.
    pub bucket_name: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    pub cluster_name: String,

    pub task_family: String,

    #[serde(default = "default_task_revision")]
    pub task_revision: u32,

    /// Containers in the task definition. The first one receives the command.
    #[serde(default = "default_container_names")]
    pub container_names: Vec<String>,

    #[serde(default)]
    pub container_image: Option<String>,

    pub execution_role_name: String,

    pub task_role_name: String,

    /// Script the container runs; the object key is appended as its argument.
    #[serde(default = "default_app_entry_file_path")]
    pub app_entry_file_path: String,

    #[serde(default = "default_subnet_class")]
    pub subnet_class: SubnetClass,

    pub subnet_ids: Vec<String>,

    #[serde(default)]
    pub security_group_ids: Vec<String>,

    #[serde(default = "default_assign_public_ip")]
    pub assign_public_ip: bool,

    #[serde(default)]
    pub task_tags: BTreeMap<String, String>,

    /// Accepted run-task calls kept for `GET /tasks`.
    #[serde(default = "default_task_history")]
    pub task_history: usize,
}

fn default_name_prefix() -> String {
    "dropzone".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_key_prefix() -> String {
    "input/".to_string()
}

fn default_task_revision() -> u32 {
    1
}

fn default_container_names() -> Vec<String> {
    vec!["app".to_string()]
}

fn default_app_entry_file_path() -> String {
    "/usr/src/app/lib/index.js".to_string()
}

fn default_subnet_class() -> SubnetClass {
    SubnetClass::Public
}

fn default_assign_public_ip() -> bool {
    true
}

fn default_task_history() -> usize {
    DEFAULT_TASK_HISTORY
}

impl DropzoneConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.name_prefix.is_empty() {
            bail!("name_prefix must not be empty");
        }
        if self.account_id.len() != 12 || !self.account_id.bytes().all(|b| b.is_ascii_digit()) {
            bail!("account_id must be 12 digits, got '{}'", self.account_id);
        }
        for (field, value) in [
            ("region", &self.region),
            ("bucket_name", &self.bucket_name),
            ("cluster_name", &self.cluster_name),
            ("task_family", &self.task_family),
            ("execution_role_name", &self.execution_role_name),
            ("task_role_name", &self.task_role_name),
            ("app_entry_file_path", &self.app_entry_file_path),
        ] {
            if value.is_empty() {
                bail!("{field} must not be empty");
            }
        }
        if self.container_names.is_empty() {
            bail!("container_names must list at least one container");
        }
        if self.task_revision == 0 {
            bail!("task_revision starts at 1");
        }
        if self.task_history == 0 {
            bail!("task_history must keep at least one call");
        }
        Ok(())
    }

    pub fn rule_name(&self) -> String {
        format!("{}-rule", self.name_prefix)
    }

    pub fn role_name(&self) -> String {
        format!("{}-rule-role", self.name_prefix)
    }

    pub fn criteria(&self) -> MatchCriteria {
        MatchCriteria::object_created(&self.bucket_name, &self.key_prefix)
    }

    pub fn cluster(&self) -> ClusterRef {
        ClusterRef::new(&self.region, &self.account_id, &self.cluster_name)
    }

    pub fn task_template(&self) -> TaskTemplate {
        TaskTemplate {
            arn: Arn::ecs_task_definition(
                &self.region,
                &self.account_id,
                &self.task_family,
                self.task_revision,
            ),
            containers: self
                .container_names
                .iter()
                .enumerate()
                .map(|(i, name)| ContainerDefinition {
                    name: name.clone(),
                    image: self.container_image.clone(),
                    essential: i == 0,
                })
                .collect(),
            execution_role_arn: Arn::iam_role(&self.account_id, &self.execution_role_name),
            task_role_arn: Arn::iam_role(&self.account_id, &self.task_role_name),
        }
    }

    pub fn network(&self) -> NetworkPlacement {
        NetworkPlacement {
            subnet_class: self.subnet_class,
            subnet_ids: self.subnet_ids.clone(),
            security_groups: self.security_group_ids.clone(),
            assign_public_ip: self.assign_public_ip,
        }
    }

    pub fn invocation_spec(&self) -> Result<TaskInvocationSpec> {
        let mut builder = TaskInvocationSpec::builder(self.cluster(), self.task_template())
            .base_command([self.app_entry_file_path.as_str()])
            .network(self.network());
        for (key, value) in &self.task_tags {
            builder = builder.tag(key, value);
        }
        builder.build().context("Invalid task invocation settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
        account_id = "123456789012"
        bucket_name = "dz-bucket"
        cluster_name = "dz-cluster"
        task_family = "dz-task"
        execution_role_name = "dz-exec"
        task_role_name = "dz-task"
        subnet_ids = ["subnet-a"]
    "#;

    fn minimal() -> DropzoneConfig {
        toml::from_str(MINIMAL).unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let config = minimal();
        assert_eq!(config.name_prefix, "dropzone");
        assert_eq!(config.key_prefix, "input/");
        assert_eq!(config.container_names, ["app"]);
        assert_eq!(config.subnet_class, SubnetClass::Public);
        assert!(config.assign_public_ip);
        assert_eq!(config.task_history, DEFAULT_TASK_HISTORY);
        assert_eq!(config.rule_name(), "dropzone-rule");
        assert_eq!(config.role_name(), "dropzone-rule-role");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dropzone.toml");
        let mut config = minimal();
        config.task_tags.insert("team".into(), "ingest".into());
        config.save(&path).unwrap();

        let loaded = DropzoneConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = DropzoneConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dropzone.toml");
        std::fs::write(&path, "account_id = \"123456789012\"\n").unwrap();
        assert!(DropzoneConfig::load(&path).is_err());
    }

    #[test]
    fn test_bad_account_id_is_rejected() {
        let mut config = minimal();
        config.account_id = "1234".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_task_history_is_rejected() {
        let mut config = minimal();
        config.task_history = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_resources() {
        let config = minimal();
        assert_eq!(
            config.cluster().arn.to_string(),
            "arn:aws:ecs:us-east-1:123456789012:cluster/dz-cluster"
        );
        let spec = config.invocation_spec().unwrap();
        assert_eq!(
            spec.template().arn.to_string(),
            "arn:aws:ecs:us-east-1:123456789012:task-definition/dz-task:1"
        );
        assert_eq!(spec.container_name(), "app");
        assert_eq!(
            spec.resolve_command("input/a.csv"),
            ["/usr/src/app/lib/index.js", "input/a.csv"]
        );
    }

    #[test]
    fn test_public_ip_on_private_subnets_is_rejected() {
        let mut config = minimal();
        config.subnet_class = SubnetClass::Private;
        assert!(config.invocation_spec().is_err());

        config.assign_public_ip = false;
        assert!(config.invocation_spec().is_ok());
    }
}
