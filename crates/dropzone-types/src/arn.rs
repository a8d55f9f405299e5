use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DropzoneError, Result};

/// Amazon Resource Name: `arn:partition:service:region:account:resource`.
///
/// The resource part may itself contain `:` and `/` (e.g.
/// `task-definition/family:3`), so only the first five separators are
/// significant when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl Arn {
    pub fn new(
        service: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: "aws".into(),
            service: service.into(),
            region: region.into(),
            account: account.into(),
            resource: resource.into(),
        }
    }

    pub fn ecs_cluster(region: &str, account: &str, cluster_name: &str) -> Self {
        Self::new("ecs", region, account, format!("cluster/{cluster_name}"))
    }

    pub fn ecs_task_definition(region: &str, account: &str, family: &str, revision: u32) -> Self {
        Self::new(
            "ecs",
            region,
            account,
            format!("task-definition/{family}:{revision}"),
        )
    }

    /// Pattern matching every task started on one cluster. The task id is
    /// the only wildcard since it is assigned at launch.
    pub fn ecs_task_pattern(region: &str, account: &str, cluster_name: &str) -> Self {
        Self::new("ecs", region, account, format!("task/{cluster_name}/*"))
    }

    pub fn ecs_task(region: &str, account: &str, cluster_name: &str, task_id: &str) -> Self {
        Self::new("ecs", region, account, format!("task/{cluster_name}/{task_id}"))
    }

    /// IAM is a global service, so role ARNs carry no region.
    pub fn iam_role(account: &str, role_name: &str) -> Self {
        Self::new("iam", "", account, format!("role/{role_name}"))
    }

    /// Resource type, e.g. `cluster` for `cluster/my-cluster`.
    pub fn resource_type(&self) -> &str {
        self.resource
            .split_once('/')
            .map(|(ty, _)| ty)
            .unwrap_or(&self.resource)
    }

    /// Last path segment of the resource, e.g. `my-cluster` or `family:3`.
    pub fn resource_name(&self) -> &str {
        self.resource
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.resource)
    }

    /// True when wildcards, if any, appear only in the final resource segment.
    pub fn wildcard_confined_to_resource_id(&self) -> bool {
        let prefix_fields = [&self.partition, &self.service, &self.region, &self.account];
        if prefix_fields.iter().any(|f| f.contains(['*', '?'])) {
            return false;
        }
        match self.resource.rsplit_once('/') {
            Some((path, _)) => !path.contains(['*', '?']),
            None => !self.resource.contains(['*', '?']),
        }
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = DropzoneError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| DropzoneError::InvalidArn {
            arn: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 {
            return Err(invalid("expected six ':'-separated fields"));
        }
        if parts[0] != "arn" {
            return Err(invalid("must start with 'arn'"));
        }
        if parts[1].is_empty() || parts[2].is_empty() {
            return Err(invalid("partition and service are required"));
        }
        if parts[5].is_empty() {
            return Err(invalid("resource is required"));
        }

        Ok(Self {
            partition: parts[1].into(),
            service: parts[2].into(),
            region: parts[3].into(),
            account: parts[4].into(),
            resource: parts[5].into(),
        })
    }
}

impl TryFrom<String> for Arn {
    type Error = DropzoneError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Arn> for String {
    fn from(arn: Arn) -> Self {
        arn.to_string()
    }
}
