//! Campaign, private pledge, and account handlers

use axum::{
    extract::{Path, State},
    Json,
};
use pledgeguard_common::{
    types::hex32, Campaign, CommitmentOpening, CommitmentRecord, ContributionProof, Hash32,
    Milestone, Receipt,
};
use pledgeguard_escrow::{NewCampaign, Payout, RefundReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{parse_hash, parse_uuid, ApiResult, AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct ContributeBody {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PrivateContributeBody {
    #[serde(with = "hex32")]
    pub commitment: Hash32,
    pub proof: ContributionProof,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DeliverableBody {
    #[serde(with = "hex32")]
    pub deliverable_hash: Hash32,
}

#[derive(Debug, Deserialize)]
pub struct VerificationBody {
    #[serde(with = "hex32")]
    pub evidence_hash: Hash32,
}

#[derive(Debug, Deserialize)]
pub struct CommitmentBody {
    #[serde(with = "hex32")]
    pub commitment: Hash32,
    pub min_amount: Decimal,
    #[serde(with = "hex32")]
    pub nullifier_hash: Hash32,
}

#[derive(Debug, Deserialize)]
pub struct RefundClaimBody {
    pub opening: CommitmentOpening,
}

#[derive(Debug, Serialize)]
pub struct AccountBalance {
    pub identity: String,
    pub balance: Decimal,
}

pub async fn list_campaigns(State(state): State<AppState>) -> Json<Vec<Campaign>> {
    Json(state.protocol.list_campaigns())
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<NewCampaign>,
) -> ApiResult<Receipt<Campaign>> {
    let receipt = state.record(
        "create_campaign",
        state.protocol.create_campaign(&caller, body),
    )?;
    state.refresh_gauges();
    Ok(Json(receipt))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Campaign> {
    let id = parse_uuid(&id, "campaign")?;
    let campaign = state.record("get_campaign", state.protocol.get_campaign(&id))?;
    Ok(Json(campaign))
}

pub async fn get_milestone(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Milestone> {
    let id = parse_uuid(&id, "campaign")?;
    let milestone = state.record("get_milestone", state.protocol.get_milestone(&id, index))?;
    Ok(Json(milestone))
}

pub async fn contribute(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(body): Json<ContributeBody>,
) -> ApiResult<Receipt<Campaign>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "contribute",
        state.protocol.contribute(&id, body.amount, &caller),
    )?;
    state.metrics.contributions_total.inc();
    Ok(Json(receipt))
}

/// Anonymous: the commitment stands in for the contributor
pub async fn private_contribute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PrivateContributeBody>,
) -> ApiResult<Receipt<Campaign>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "private_contribute",
        state
            .protocol
            .private_contribute(&id, &body.commitment, &body.proof, body.amount),
    )?;
    state.metrics.contributions_total.inc();
    Ok(Json(receipt))
}

pub async fn submit_deliverable(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path((id, index)): Path<(String, usize)>,
    Json(body): Json<DeliverableBody>,
) -> ApiResult<Receipt<Campaign>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "submit_milestone_deliverable",
        state
            .protocol
            .submit_milestone_deliverable(&id, index, body.deliverable_hash, &caller),
    )?;
    Ok(Json(receipt))
}

pub async fn release_milestone(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Receipt<Campaign>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "release_milestone_funds",
        state.protocol.release_milestone_funds(&id, index),
    )?;
    state.metrics.releases_total.inc();
    Ok(Json(receipt))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Receipt<Payout>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record("withdraw_funds", state.protocol.withdraw_funds(&id, &caller))?;
    Ok(Json(receipt))
}

pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Receipt<RefundReport>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "refund_contributors",
        state.protocol.refund_contributors(&id),
    )?;
    state.metrics.refunds_total.inc();
    Ok(Json(receipt))
}

pub async fn request_verification(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(body): Json<VerificationBody>,
) -> ApiResult<Receipt<Campaign>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "request_campaign_verification",
        state
            .protocol
            .request_campaign_verification(&id, body.evidence_hash, &caller),
    )?;
    Ok(Json(receipt))
}

pub async fn register_commitment(
    State(state): State<AppState>,
    Json(body): Json<CommitmentBody>,
) -> ApiResult<Receipt<CommitmentRecord>> {
    let receipt = state.record(
        "register_commitment",
        state
            .protocol
            .register_commitment(body.commitment, body.min_amount, body.nullifier_hash),
    )?;
    Ok(Json(receipt))
}

pub async fn get_commitment(
    State(state): State<AppState>,
    Path(commitment): Path<String>,
) -> ApiResult<CommitmentRecord> {
    let commitment = parse_hash(&commitment)?;
    let record = state.record("get_commitment", state.protocol.get_commitment(&commitment))?;
    Ok(Json(record))
}

/// The caller receives the refund; the opening proves the claim
pub async fn claim_private_refund(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(commitment): Path<String>,
    Json(body): Json<RefundClaimBody>,
) -> ApiResult<Receipt<Payout>> {
    let commitment = parse_hash(&commitment)?;
    let receipt = state.record(
        "claim_private_refund",
        state
            .protocol
            .claim_private_refund(&commitment, &body.opening, &caller),
    )?;
    Ok(Json(receipt))
}

pub async fn account_balance(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Json<AccountBalance> {
    let balance = state.protocol.account_balance(&identity);
    Json(AccountBalance { identity, balance })
}
