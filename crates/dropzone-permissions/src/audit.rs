use std::collections::BTreeSet;

use dropzone_types::{Arn, DropzoneError, Result};

use crate::role::{
    EVENTS_SERVICE_PRINCIPAL, InvocationRole, PASS_ROLE_POLICY, RUN_TASK_POLICY,
    TAG_RESOURCE_POLICY,
};
use crate::statement::{
    CLUSTER_CONDITION_KEY, ConditionOperator, Effect, PASS_ROLE, PolicyDocument, PolicyStatement,
    RUN_TASK, Resource, TAG_RESOURCE,
};

fn violation(msg: impl Into<String>) -> DropzoneError {
    DropzoneError::PolicyViolation(msg.into())
}

/// Reject statements that grant an unbounded action set or resource.
pub fn check_bounded(policy: &str, statement: &PolicyStatement) -> Result<()> {
    if statement.action.is_empty() {
        return Err(violation(format!("{policy}: statement lists no actions")));
    }
    if let Some(action) = statement.action.iter().find(|a| a.is_wildcard()) {
        return Err(violation(format!("{policy}: wildcard action '{action}'")));
    }
    if statement.resource.is_empty() {
        return Err(violation(format!("{policy}: statement lists no resources")));
    }
    if let Some(resource) = statement.resource.iter().find(|r| !r.is_bounded()) {
        return Err(violation(format!("{policy}: unbounded resource '{resource}'")));
    }
    Ok(())
}

/// Verify the role carries exactly the run-task, pass-role and tag-resource
/// grants for its scope and nothing else.
pub fn audit_role(role: &InvocationRole) -> Result<()> {
    audit_trust(role)?;

    let expected: BTreeSet<&str> = [RUN_TASK_POLICY, PASS_ROLE_POLICY, TAG_RESOURCE_POLICY]
        .into_iter()
        .collect();
    let attached: BTreeSet<&str> = role.policy_documents().keys().map(String::as_str).collect();
    if let Some(extra) = attached.difference(&expected).next() {
        return Err(violation(format!("unexpected policy '{extra}' attached")));
    }
    if let Some(missing) = expected.difference(&attached).next() {
        return Err(violation(format!("required policy '{missing}' is missing")));
    }

    for (policy, statement) in role.grants() {
        if statement.effect != Effect::Allow {
            continue;
        }
        check_bounded(policy, statement)?;
    }

    let scope = role.scope();
    let docs = role.policy_documents();

    let run_task = single_allow(RUN_TASK_POLICY, &docs[RUN_TASK_POLICY])?;
    expect_actions(RUN_TASK_POLICY, run_task, RUN_TASK)?;
    expect_resources(
        RUN_TASK_POLICY,
        run_task,
        std::slice::from_ref(&scope.task_definition_arn),
    )?;
    audit_cluster_condition(run_task, &scope.cluster_arn)?;

    let pass_role = single_allow(PASS_ROLE_POLICY, &docs[PASS_ROLE_POLICY])?;
    expect_actions(PASS_ROLE_POLICY, pass_role, PASS_ROLE)?;
    expect_resources(
        PASS_ROLE_POLICY,
        pass_role,
        &[scope.execution_role_arn.clone(), scope.task_role_arn.clone()],
    )?;
    expect_no_conditions(PASS_ROLE_POLICY, pass_role)?;

    let tag = single_allow(TAG_RESOURCE_POLICY, &docs[TAG_RESOURCE_POLICY])?;
    expect_actions(TAG_RESOURCE_POLICY, tag, TAG_RESOURCE)?;
    expect_resources(
        TAG_RESOURCE_POLICY,
        tag,
        std::slice::from_ref(&scope.task_pattern),
    )?;
    expect_no_conditions(TAG_RESOURCE_POLICY, tag)?;

    Ok(())
}

fn audit_trust(role: &InvocationRole) -> Result<()> {
    let services: Vec<&str> = role
        .trust_policy()
        .statement
        .iter()
        .filter(|s| s.effect == Effect::Allow)
        .flat_map(|s| s.principal.iter().flat_map(|p| p.service.iter()))
        .map(String::as_str)
        .collect();
    if services != [EVENTS_SERVICE_PRINCIPAL] {
        return Err(violation(format!(
            "role must be assumable by {EVENTS_SERVICE_PRINCIPAL} only, found {services:?}"
        )));
    }
    Ok(())
}

fn single_allow<'a>(policy: &str, doc: &'a PolicyDocument) -> Result<&'a PolicyStatement> {
    match doc.statement.as_slice() {
        [statement] if statement.effect == Effect::Allow => Ok(statement),
        _ => Err(violation(format!(
            "{policy}: expected exactly one allow statement"
        ))),
    }
}

fn expect_actions(policy: &str, statement: &PolicyStatement, action: &str) -> Result<()> {
    if statement.action.len() != 1 || !statement.has_action(action) {
        return Err(violation(format!(
            "{policy}: must grant only {action}, found {:?}",
            statement.action
        )));
    }
    Ok(())
}

fn expect_resources(policy: &str, statement: &PolicyStatement, expected: &[Arn]) -> Result<()> {
    let expected: BTreeSet<Resource> = expected.iter().cloned().map(Resource::Arn).collect();
    let actual: BTreeSet<Resource> = statement.resource.iter().cloned().collect();
    if statement.resource.len() != expected.len() || actual != expected {
        return Err(violation(format!(
            "{policy}: resources must be exactly {expected:?}, found {:?}",
            statement.resource
        )));
    }
    Ok(())
}

fn expect_no_conditions(policy: &str, statement: &PolicyStatement) -> Result<()> {
    if !statement.condition.is_empty() {
        return Err(violation(format!("{policy}: unexpected conditions")));
    }
    Ok(())
}

fn audit_cluster_condition(statement: &PolicyStatement, cluster: &Arn) -> Result<()> {
    let only_cluster_key = statement.condition.len() == 1
        && statement
            .condition
            .get(&ConditionOperator::ArnEquals)
            .is_some_and(|keys| keys.len() == 1 && keys.contains_key(CLUSTER_CONDITION_KEY));
    let values = statement.condition_values(ConditionOperator::ArnEquals, CLUSTER_CONDITION_KEY);
    let cluster = cluster.to_string();
    if !only_cluster_key || values != [cluster.as_str()] {
        return Err(violation(format!(
            "{RUN_TASK_POLICY}: condition must pin {CLUSTER_CONDITION_KEY} to {cluster}, found {values:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ACCOUNT, REGION, spec, spec_with_roles};

    fn role() -> InvocationRole {
        InvocationRole::for_task_launch("dz-rule-role", &spec()).unwrap()
    }

    #[test]
    fn test_constructed_role_passes_audit() {
        assert!(role().audit().is_ok());
    }

    #[test]
    fn test_every_grant_is_bounded() {
        let role = role();
        for (policy, statement) in role.grants() {
            assert!(check_bounded(policy, statement).is_ok(), "{policy}");
            assert!(statement.action.iter().all(|a| a.as_str() != "*"));
            assert!(statement.resource.iter().all(|r| *r != Resource::Any));
        }
    }

    #[test]
    fn test_run_task_condition_names_configured_cluster() {
        let role = role();
        let run_task = &role.policy_documents()[RUN_TASK_POLICY].statement[0];
        let values =
            run_task.condition_values(ConditionOperator::ArnEquals, CLUSTER_CONDITION_KEY);
        assert_eq!(
            values,
            [Arn::ecs_cluster(REGION, ACCOUNT, "dz-cluster").to_string()]
        );
    }

    #[test]
    fn test_pass_role_has_exactly_two_resources() {
        let role = role();
        let pass_role = &role.policy_documents()[PASS_ROLE_POLICY].statement[0];
        assert_eq!(pass_role.resource.len(), 2);
        assert!(pass_role
            .resource
            .contains(&Resource::Arn(Arn::iam_role(ACCOUNT, "dz-exec"))));
        assert!(pass_role
            .resource
            .contains(&Resource::Arn(Arn::iam_role(ACCOUNT, "dz-task"))));
    }

    #[test]
    fn test_default_policy_is_a_violation() {
        let mut role = role();
        let broad = PolicyStatement::allow(["*"]).unwrap().on(Resource::Any);
        role.policies_mut()
            .insert("DefaultPolicy".into(), PolicyDocument::new(vec![broad]));
        let err = role.audit().unwrap_err();
        assert!(err.to_string().contains("DefaultPolicy"));
    }

    #[test]
    fn test_third_passable_role_is_a_violation() {
        let mut role = role();
        role.policies_mut()
            .get_mut(PASS_ROLE_POLICY)
            .unwrap()
            .statement[0]
            .resource
            .push(Resource::Arn(Arn::iam_role(ACCOUNT, "admin")));
        assert!(matches!(
            role.audit(),
            Err(DropzoneError::PolicyViolation(_))
        ));
    }

    #[test]
    fn test_second_cluster_in_condition_is_a_violation() {
        let mut role = role();
        let statement = &mut role.policies_mut().get_mut(RUN_TASK_POLICY).unwrap().statement[0];
        *statement = statement.clone().when(
            ConditionOperator::ArnEquals,
            CLUSTER_CONDITION_KEY,
            Arn::ecs_cluster(REGION, ACCOUNT, "prod").to_string(),
        );
        assert!(role.audit().is_err());
    }

    #[test]
    fn test_wildcard_action_is_a_violation() {
        let mut role = role();
        let statement = &mut role.policies_mut().get_mut(TAG_RESOURCE_POLICY).unwrap().statement[0];
        statement.action = PolicyStatement::allow(["ecs:*"]).unwrap().action;
        let err = role.audit().unwrap_err();
        assert!(err.to_string().contains("wildcard action"));
    }

    #[test]
    fn test_cluster_wide_wildcard_resource_is_a_violation() {
        let mut role = role();
        let statement = &mut role.policies_mut().get_mut(TAG_RESOURCE_POLICY).unwrap().statement[0];
        statement.resource = vec!["arn:aws:ecs:ap-northeast-1:123456789012:task/*/x"
            .parse()
            .unwrap()];
        let err = role.audit().unwrap_err();
        assert!(err.to_string().contains("unbounded resource"));
    }

    #[test]
    fn test_shared_role_listed_twice_is_a_violation() {
        let shared_spec = spec_with_roles("dz-shared", "dz-shared");
        let mut role = InvocationRole::for_task_launch("dz-rule-role", &shared_spec).unwrap();
        assert!(role.audit().is_ok());

        role.policies_mut()
            .get_mut(PASS_ROLE_POLICY)
            .unwrap()
            .statement[0]
            .resource
            .push(Resource::Arn(Arn::iam_role(ACCOUNT, "dz-shared")));
        assert!(matches!(
            role.audit(),
            Err(DropzoneError::PolicyViolation(_))
        ));
    }

    #[test]
    fn test_missing_policy_is_a_violation() {
        let mut role = role();
        role.policies_mut().remove(TAG_RESOURCE_POLICY);
        let err = role.audit().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
