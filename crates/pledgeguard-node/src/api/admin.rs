//! Administrative handlers

use axum::{
    extract::{Path, State},
    Json,
};
use pledgeguard_common::{Campaign, Receipt, VerificationRequest};
use pledgeguard_oracle::OracleParams;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{parse_uuid, ApiResult, AppState, Caller};

/// Partial parameter update; absent fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct OracleParamsUpdate {
    pub minimum_stake: Option<Decimal>,
    pub min_votes_required: Option<u32>,
    pub voting_period_ms: Option<i64>,
    pub consensus_threshold: Option<Decimal>,
    pub node_reputation_threshold: Option<u16>,
}

impl OracleParamsUpdate {
    fn apply(self, mut params: OracleParams) -> OracleParams {
        if let Some(v) = self.minimum_stake {
            params.minimum_stake = v;
        }
        if let Some(v) = self.min_votes_required {
            params.min_votes_required = v;
        }
        if let Some(v) = self.voting_period_ms {
            params.voting_period_ms = v;
        }
        if let Some(v) = self.consensus_threshold {
            params.consensus_threshold = v;
        }
        if let Some(v) = self.node_reputation_threshold {
            params.node_reputation_threshold = v;
        }
        params
    }
}

#[derive(Debug, Deserialize)]
pub struct EmergencyStopBody {
    pub stop: bool,
}

pub async fn update_oracle_params(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<OracleParamsUpdate>,
) -> ApiResult<Receipt<OracleParams>> {
    let params = body.apply(state.protocol.oracle_params());
    let receipt = state.record(
        "update_oracle_params",
        state.protocol.update_oracle_params(&caller, params),
    )?;
    // Threshold changes move nodes in and out of the active set
    state.refresh_gauges();
    Ok(Json(receipt))
}

/// Mounted under /admin but open to any caller past the voting deadline
pub async fn force_finalize(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Receipt<VerificationRequest>> {
    let id = parse_uuid(&id, "request")?;
    let receipt = state.record(
        "force_finalize_verification",
        state.protocol.force_finalize_verification(&id),
    )?;
    state.metrics.requests_resolved_total.inc();
    Ok(Json(receipt))
}

pub async fn emergency_stop(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(body): Json<EmergencyStopBody>,
) -> ApiResult<Receipt<Campaign>> {
    let id = parse_uuid(&id, "campaign")?;
    let receipt = state.record(
        "emergency_stop",
        state.protocol.emergency_stop(&id, body.stop, &caller),
    )?;
    tracing::warn!(campaign_id = %id, stop = body.stop, caller = %caller, "Emergency stop toggled");
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_keeps_unset_fields() {
        let current = OracleParams::default();
        let update = OracleParamsUpdate {
            min_votes_required: Some(5),
            ..Default::default()
        };
        let merged = update.apply(current.clone());
        assert_eq!(merged.min_votes_required, 5);
        assert_eq!(merged.voting_period_ms, current.voting_period_ms);
        assert_eq!(merged.minimum_stake, current.minimum_stake);
    }
}
