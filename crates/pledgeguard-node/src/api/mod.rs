//! HTTP API
//!
//! JSON over HTTP. Writes return the protocol's `{reference, state}` receipt;
//! the calling identity travels in the `x-identity` header.

mod admin;
mod campaigns;
mod error;
mod oracle;

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pledgeguard_common::{types::parse_hash32, Clock, Hash32, VERSION};
use pledgeguard_escrow::Protocol;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::metrics::NodeMetrics;

pub use error::ApiError;

/// Header carrying the authenticated caller identity
pub const IDENTITY_HEADER: &str = "x-identity";

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub protocol: Arc<Protocol>,
    pub metrics: Arc<NodeMetrics>,
}

impl AppState {
    pub fn new(protocol: Arc<Protocol>, metrics: Arc<NodeMetrics>) -> Self {
        Self { protocol, metrics }
    }

    /// Count the outcome of `operation` and lift protocol errors
    fn record<T>(
        &self,
        operation: &str,
        result: pledgeguard_common::Result<T>,
    ) -> Result<T, ApiError> {
        match result {
            Ok(value) => {
                self.metrics.observe(operation, "ok");
                Ok(value)
            }
            Err(e) => {
                self.metrics.observe(operation, e.kind());
                tracing::debug!(operation, error = %e, "Operation rejected");
                Err(e.into())
            }
        }
    }

    fn refresh_gauges(&self) {
        let stats = self.protocol.oracle_stats();
        self.metrics.active_nodes.set(stats.active_nodes as i64);
        self.metrics
            .campaigns
            .set(self.protocol.ledger().len() as i64);
    }
}

/// Identity taken from the `x-identity` header
#[derive(Debug, Clone)]
pub struct Caller(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
            .ok_or(ApiError::MissingIdentity)
    }
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what} id: {raw}")))
}

pub(crate) fn parse_hash(raw: &str) -> Result<Hash32, ApiError> {
    parse_hash32(raw).map_err(|e| ApiError::BadRequest(format!("invalid digest: {e}")))
}

/// Build the node router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(IDENTITY_HEADER),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        // Campaigns
        .route(
            "/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/campaigns/:id", get(campaigns::get_campaign))
        .route(
            "/campaigns/:id/contributions",
            post(campaigns::contribute),
        )
        .route(
            "/campaigns/:id/private-contributions",
            post(campaigns::private_contribute),
        )
        .route(
            "/campaigns/:id/milestones/:index",
            get(campaigns::get_milestone),
        )
        .route(
            "/campaigns/:id/milestones/:index/deliverable",
            post(campaigns::submit_deliverable),
        )
        .route(
            "/campaigns/:id/milestones/:index/release",
            post(campaigns::release_milestone),
        )
        .route("/campaigns/:id/withdraw", post(campaigns::withdraw))
        .route("/campaigns/:id/refund", post(campaigns::refund))
        .route(
            "/campaigns/:id/verification",
            post(campaigns::request_verification),
        )
        // Private pledges
        .route("/commitments", post(campaigns::register_commitment))
        .route("/commitments/:commitment", get(campaigns::get_commitment))
        .route(
            "/commitments/:commitment/refund-claims",
            post(campaigns::claim_private_refund),
        )
        .route("/accounts/:identity", get(campaigns::account_balance))
        // Oracle network
        .route("/oracle/nodes", post(oracle::register_node))
        .route("/oracle/nodes/:id", get(oracle::get_node))
        .route(
            "/oracle/nodes/:id/deactivate",
            post(oracle::deactivate_node),
        )
        .route("/oracle/nodes/:id/stake", post(oracle::add_stake))
        .route("/oracle/nodes/:id/reclaim", post(oracle::reclaim_stake))
        .route("/oracle/stats", get(oracle::stats))
        .route("/oracle/params", get(oracle::params))
        .route("/verifications/:id", get(oracle::get_verification))
        .route("/verifications/:id/votes", post(oracle::cast_vote))
        // Admin
        .route("/admin/oracle-params", post(admin::update_oracle_params))
        .route(
            "/admin/verifications/:id/finalize",
            post(admin::force_finalize),
        )
        .route(
            "/admin/campaigns/:id/emergency-stop",
            post(admin::emergency_stop),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": VERSION,
        "campaigns": state.protocol.ledger().len(),
        "now": state.protocol.clock().now_millis(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.refresh_gauges();
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests;
