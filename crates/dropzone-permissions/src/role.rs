use std::collections::BTreeMap;

use serde::Serialize;

use dropzone_types::{Arn, Result, TaskInvocationSpec};

use crate::audit;
use crate::evaluator::{self, AccessRequest, Decision};
use crate::statement::{
    ASSUME_ROLE, CLUSTER_CONDITION_KEY, ConditionOperator, PASS_ROLE, PolicyDocument,
    PolicyStatement, Principal, RUN_TASK, TAG_RESOURCE,
};

/// Service principal of the event-routing service, the only trusted caller.
pub const EVENTS_SERVICE_PRINCIPAL: &str = "events.amazonaws.com";

pub const RUN_TASK_POLICY: &str = "allow-run-task";
pub const PASS_ROLE_POLICY: &str = "allow-pass-role";
pub const TAG_RESOURCE_POLICY: &str = "allow-tag-resource";

/// What the role is allowed to touch. Derived once from the invocation spec
/// and kept so the grants can be re-audited at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleScope {
    pub cluster_arn: Arn,
    pub task_definition_arn: Arn,
    pub execution_role_arn: Arn,
    pub task_role_arn: Arn,
    pub task_pattern: Arn,
}

impl RoleScope {
    pub fn for_spec(spec: &TaskInvocationSpec) -> Self {
        let cluster = spec.cluster();
        let template = spec.template();
        Self {
            cluster_arn: cluster.arn.clone(),
            task_definition_arn: template.arn.clone(),
            execution_role_arn: template.execution_role_arn.clone(),
            task_role_arn: template.task_role_arn.clone(),
            task_pattern: Arn::ecs_task_pattern(
                &cluster.arn.region,
                &cluster.arn.account,
                &cluster.name,
            ),
        }
    }
}

/// The identity an event rule assumes to start tasks.
///
/// Built with an explicit list of three inline policies and nothing else:
/// there is no default policy slot to fill or strip. Construction runs the
/// least-privilege audit, so an `InvocationRole` value always carries exactly
/// the scoped grants. Never mutated after construction; share it behind `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRole {
    role_name: String,
    arn: Arn,
    trust_policy: PolicyDocument,
    policies: BTreeMap<String, PolicyDocument>,
    scope: RoleScope,
}

impl InvocationRole {
    /// Build the role that lets a rule start `spec`'s task template on
    /// `spec`'s cluster. The account comes from the cluster ARN.
    pub fn for_task_launch(role_name: impl Into<String>, spec: &TaskInvocationSpec) -> Result<Self> {
        let role_name = role_name.into();
        let scope = RoleScope::for_spec(spec);
        let arn = Arn::iam_role(&scope.cluster_arn.account, &role_name);

        let mut policies = BTreeMap::new();
        policies.insert(
            RUN_TASK_POLICY.to_string(),
            PolicyDocument::new(vec![
                PolicyStatement::allow([RUN_TASK])?
                    .on(scope.task_definition_arn.clone())
                    .when(
                        ConditionOperator::ArnEquals,
                        CLUSTER_CONDITION_KEY,
                        scope.cluster_arn.to_string(),
                    ),
            ]),
        );
        // A template may run both identities as one role; list it once.
        let mut pass_role =
            PolicyStatement::allow([PASS_ROLE])?.on(scope.execution_role_arn.clone());
        if scope.task_role_arn != scope.execution_role_arn {
            pass_role = pass_role.on(scope.task_role_arn.clone());
        }
        policies.insert(
            PASS_ROLE_POLICY.to_string(),
            PolicyDocument::new(vec![pass_role]),
        );
        policies.insert(
            TAG_RESOURCE_POLICY.to_string(),
            PolicyDocument::new(vec![
                PolicyStatement::allow([TAG_RESOURCE])?.on(scope.task_pattern.clone()),
            ]),
        );

        let mut assume = PolicyStatement::allow([ASSUME_ROLE])?;
        assume.principal = Some(Principal {
            service: vec![EVENTS_SERVICE_PRINCIPAL.to_string()],
        });

        let role = Self {
            role_name,
            arn,
            trust_policy: PolicyDocument::new(vec![assume]),
            policies,
            scope,
        };
        role.audit()?;

        tracing::debug!(role = %role.arn, "invocation role constructed");
        Ok(role)
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    pub fn scope(&self) -> &RoleScope {
        &self.scope
    }

    /// Inline policies by name.
    pub fn policy_documents(&self) -> &BTreeMap<String, PolicyDocument> {
        &self.policies
    }

    /// Every statement attached to the role, with the policy it belongs to.
    pub fn grants(&self) -> impl Iterator<Item = (&str, &PolicyStatement)> {
        self.policies
            .iter()
            .flat_map(|(name, doc)| doc.statement.iter().map(move |s| (name.as_str(), s)))
    }

    /// Assume-role policy admitting only the event-routing service.
    pub fn trust_policy(&self) -> &PolicyDocument {
        &self.trust_policy
    }

    /// Confirm the role still carries exactly its scoped grants.
    pub fn audit(&self) -> Result<()> {
        audit::audit_role(self)
    }

    pub fn evaluate(&self, request: &AccessRequest) -> Decision {
        evaluator::evaluate(self.grants().map(|(_, s)| s), request)
    }

    pub fn is_allowed(&self, request: &AccessRequest) -> bool {
        self.evaluate(request).is_allowed()
    }

    #[cfg(test)]
    pub(crate) fn policies_mut(&mut self) -> &mut BTreeMap<String, PolicyDocument> {
        &mut self.policies
    }
}
