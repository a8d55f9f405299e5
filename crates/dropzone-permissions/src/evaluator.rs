use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::statement::{ConditionOperator, Effect, PolicyStatement};

/// A single authorization question: may the caller perform `action` on
/// `resource`, given request `context` (condition keys like `ecs:cluster`)?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl AccessRequest {
    pub fn new(action: impl Into<String>, resource: impl ToString) -> Self {
        Self {
            action: action.into(),
            resource: resource.to_string(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    ExplicitDeny,
    ImplicitDeny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Evaluate statements the way the authorization service does: an explicit
/// deny wins, otherwise any matching allow grants, otherwise deny.
pub fn evaluate<'a, I>(statements: I, request: &AccessRequest) -> Decision
where
    I: IntoIterator<Item = &'a PolicyStatement>,
{
    let mut allowed = false;
    for statement in statements {
        if !statement_applies(statement, request) {
            continue;
        }
        match statement.effect {
            Effect::Deny => return Decision::ExplicitDeny,
            Effect::Allow => allowed = true,
        }
    }
    if allowed {
        Decision::Allow
    } else {
        Decision::ImplicitDeny
    }
}

fn statement_applies(statement: &PolicyStatement, request: &AccessRequest) -> bool {
    let action_matches = statement
        .action
        .iter()
        .any(|a| glob_match(&a.as_str().to_ascii_lowercase(), &request.action.to_ascii_lowercase()));
    if !action_matches {
        return false;
    }

    let resource_matches = statement
        .resource
        .iter()
        .any(|r| glob_match(&r.to_string(), &request.resource));
    if !resource_matches {
        return false;
    }

    statement.condition.iter().all(|(operator, keys)| {
        keys.iter().all(|(key, accepted)| {
            let Some(actual) = request.context.get(key) else {
                return false;
            };
            accepted.iter().any(|value| match operator {
                ConditionOperator::ArnEquals => glob_match(value, actual),
                ConditionOperator::StringEquals => value == actual,
            })
        })
    })
}

/// `*` matches any run of characters, `?` exactly one.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    let (mut pi, mut vi) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == v[vi]) {
            pi += 1;
            vi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, vi));
            pi += 1;
        } else if let Some((sp, sv)) = star {
            pi = sp + 1;
            vi = sv + 1;
            star = Some((sp, sv + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
