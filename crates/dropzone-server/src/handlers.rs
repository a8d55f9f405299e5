use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use dropzone_launcher::{AcceptedRequest, EventRouter, RuleDelivery, RuleState, RuleSummary};
use dropzone_permissions::PolicyDocument;
use dropzone_types::DropzoneError;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(put_event))
        .route("/rules", get(list_rules))
        .route("/rules/{name}/enable", post(enable_rule))
        .route("/rules/{name}/disable", post(disable_rule))
        .route("/rules/{name}/role", get(get_rule_role))
        .route("/tasks", get(list_tasks))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn error_response(err: DropzoneError) -> (StatusCode, String) {
    let status = match err {
        DropzoneError::RuleNotFound(_) => StatusCode::NOT_FOUND,
        DropzoneError::DuplicateRule(_) => StatusCode::CONFLICT,
        DropzoneError::Serialization(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

async fn put_event(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> (StatusCode, Json<Vec<RuleDelivery>>) {
    let deliveries = state.bus.put_event(payload).await;
    (StatusCode::ACCEPTED, Json(deliveries))
}

async fn list_rules(State(state): State<AppState>) -> Json<Vec<RuleSummary>> {
    Json(state.bus.rules().iter().map(|r| r.summary()).collect())
}

async fn enable_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RuleSummary>, (StatusCode, String)> {
    set_rule_state(&state, &name, RuleState::Enabled)
}

async fn disable_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RuleSummary>, (StatusCode, String)> {
    set_rule_state(&state, &name, RuleState::Disabled)
}

fn set_rule_state(
    state: &AppState,
    name: &str,
    rule_state: RuleState,
) -> Result<Json<RuleSummary>, (StatusCode, String)> {
    let rule = state.bus.rule(name).map_err(error_response)?;
    rule.set_state(rule_state);
    Ok(Json(rule.summary()))
}

#[derive(Serialize)]
struct RoleView {
    role_name: String,
    arn: String,
    trust_policy: PolicyDocument,
    policies: BTreeMap<String, PolicyDocument>,
}

async fn get_rule_role(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RoleView>, (StatusCode, String)> {
    let rule = state.bus.rule(&name).map_err(error_response)?;
    let role = rule.role();
    Ok(Json(RoleView {
        role_name: role.role_name().to_string(),
        arn: role.arn().to_string(),
        trust_policy: role.trust_policy().clone(),
        policies: role.policy_documents().clone(),
    }))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<AcceptedRequest>> {
    Json(state.cluster.accepted().await)
}
