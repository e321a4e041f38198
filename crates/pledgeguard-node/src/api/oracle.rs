//! Oracle node and verification request handlers

use axum::{
    extract::{Path, State},
    Json,
};
use pledgeguard_common::{OracleNode, OracleStats, Receipt, VerificationRequest};
use pledgeguard_escrow::Payout;
use pledgeguard_oracle::OracleParams;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{parse_uuid, ApiResult, AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct RegisterNodeBody {
    pub endpoint: String,
    pub stake: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct StakeBody {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub approve: bool,
}

/// Registers the caller as a node
pub async fn register_node(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<RegisterNodeBody>,
) -> ApiResult<Receipt<OracleNode>> {
    let receipt = state.record(
        "register_node",
        state
            .protocol
            .register_node(&caller, &body.endpoint, body.stake),
    )?;
    state.refresh_gauges();
    Ok(Json(receipt))
}

pub async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OracleNode> {
    let node = state.record("get_oracle_node", state.protocol.get_oracle_node(&id))?;
    Ok(Json(node))
}

pub async fn deactivate_node(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Receipt<OracleNode>> {
    let receipt = state.record(
        "deactivate_node",
        state.protocol.deactivate_node(&id, &caller),
    )?;
    state.refresh_gauges();
    Ok(Json(receipt))
}

pub async fn add_stake(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(body): Json<StakeBody>,
) -> ApiResult<Receipt<OracleNode>> {
    let receipt = state.record(
        "add_stake",
        state.protocol.add_stake(&id, body.amount, &caller),
    )?;
    state.refresh_gauges();
    Ok(Json(receipt))
}

pub async fn reclaim_stake(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Receipt<Payout>> {
    let receipt = state.record("reclaim_stake", state.protocol.reclaim_stake(&id, &caller))?;
    Ok(Json(receipt))
}

pub async fn stats(State(state): State<AppState>) -> Json<OracleStats> {
    Json(state.protocol.oracle_stats())
}

pub async fn params(State(state): State<AppState>) -> Json<OracleParams> {
    Json(state.protocol.oracle_params())
}

pub async fn get_verification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<VerificationRequest> {
    let id = parse_uuid(&id, "request")?;
    let request = state.record(
        "get_verification_request",
        state.protocol.get_verification_request(&id),
    )?;
    Ok(Json(request))
}

/// Votes as the calling node
pub async fn cast_vote(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(body): Json<VoteBody>,
) -> ApiResult<Receipt<VerificationRequest>> {
    let id = parse_uuid(&id, "request")?;
    let receipt = state.record(
        "cast_vote",
        state.protocol.cast_vote(&id, &caller, body.approve),
    )?;
    state.metrics.votes_total.inc();
    if receipt.state.is_completed {
        state.metrics.requests_resolved_total.inc();
    }
    Ok(Json(receipt))
}
