use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dropzone_types::{Arn, DropzoneError, Result};

pub const POLICY_VERSION: &str = "2012-10-17";

pub const RUN_TASK: &str = "ecs:RunTask";
pub const PASS_ROLE: &str = "iam:PassRole";
pub const TAG_RESOURCE: &str = "ecs:TagResource";
pub const ASSUME_ROLE: &str = "sts:AssumeRole";

/// Condition key naming the cluster a run-task call targets.
pub const CLUSTER_CONDITION_KEY: &str = "ecs:cluster";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// An API operation name, `service:Operation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value == "*" {
            return Ok(Self(value));
        }
        match value.split_once(':') {
            Some((service, op)) if !service.is_empty() && !op.is_empty() => Ok(Self(value)),
            _ => Err(DropzoneError::PolicyViolation(format!(
                "action '{value}' is not of the form service:Operation"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `*`, `ecs:*`, `ecs:Run*` and the like.
    pub fn is_wildcard(&self) -> bool {
        self.0.contains(['*', '?'])
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Action {
    type Error = DropzoneError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.0
    }
}

/// The `Resource` element of a statement: either every resource or one ARN
/// (which may contain wildcards).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resource {
    Any,
    Arn(Arn),
}

impl Resource {
    /// Bounded means a concrete ARN whose wildcards are confined to the
    /// trailing resource id.
    pub fn is_bounded(&self) -> bool {
        match self {
            Resource::Any => false,
            Resource::Arn(arn) => arn.wildcard_confined_to_resource_id(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Any => f.write_str("*"),
            Resource::Arn(arn) => write!(f, "{arn}"),
        }
    }
}

impl FromStr for Resource {
    type Err = DropzoneError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "*" {
            Ok(Resource::Any)
        } else {
            Ok(Resource::Arn(s.parse()?))
        }
    }
}

impl TryFrom<String> for Resource {
    type Error = DropzoneError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resource> for String {
    fn from(resource: Resource) -> Self {
        resource.to_string()
    }
}

impl From<Arn> for Resource {
    fn from(arn: Arn) -> Self {
        Resource::Arn(arn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionOperator {
    ArnEquals,
    StringEquals,
}

/// `Condition` block: operator -> condition key -> accepted values.
pub type Conditions = BTreeMap<ConditionOperator, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: Vec<String>,
}

/// One scoped permission: an action set, the resources it applies to, and
/// optional extra conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: BTreeSet<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Resource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Conditions,
}

impl PolicyStatement {
    pub fn allow<I>(actions: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let action = actions
            .into_iter()
            .map(Action::new)
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action,
            resource: Vec::new(),
            condition: Conditions::new(),
        })
    }

    pub fn on(mut self, resource: impl Into<Resource>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn when(
        mut self,
        operator: ConditionOperator,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.condition
            .entry(operator)
            .or_default()
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.action.iter().any(|a| a.as_str() == action)
    }

    /// All values of one condition key under one operator.
    pub fn condition_values(&self, operator: ConditionOperator, key: &str) -> &[String] {
        self.condition
            .get(&operator)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A named IAM policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.into(),
            statement,
        }
    }
}
