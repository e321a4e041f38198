use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use pledgeguard_common::crypto::{AttestationVerifier, RangeAttester};
use pledgeguard_common::{CommitmentOpening, ManualClock};
use pledgeguard_escrow::{EscrowConfig, Protocol};
use pledgeguard_oracle::OracleParams;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

const START: i64 = 1_700_000_000_000;
const DAY: i64 = 24 * 60 * 60 * 1000;

struct TestApp {
    app: Router,
    protocol: Arc<Protocol>,
    attester: RangeAttester,
}

impl TestApp {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let attester = RangeAttester::generate();
        let protocol = Arc::new(
            Protocol::new(
                EscrowConfig::default().with_admins(["admin"]),
                OracleParams::default(),
                Arc::new(AttestationVerifier::new([attester.verifying_key()])),
                clock,
            )
            .unwrap(),
        );
        for node in ["n1", "n2", "n3"] {
            protocol
                .register_node(node, &format!("https://{node}.oracle"), dec!(100))
                .unwrap();
        }
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        Self {
            app: router(AppState::new(protocol.clone(), metrics)),
            protocol,
            attester,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        identity: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(id) = identity {
            req = req.header(IDENTITY_HEADER, id);
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        identity: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = self.send(method, uri, identity, body).await;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, value)
    }

    async fn create_campaign(&self) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/campaigns",
                Some("creator"),
                Some(json!({
                    "title": "Solar kiln",
                    "funding_goal": "10.0",
                    "deadline": START + 30 * DAY,
                    "milestones": [
                        {"description": "prototype", "fund_amount": "4.0", "deadline": START + 10 * DAY},
                        {"description": "batch", "fund_amount": "6.0", "deadline": START + 20 * DAY},
                    ],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["reference"].as_str().unwrap().to_string()
    }
}

fn amount(v: &Value) -> Decimal {
    v.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health() {
    let t = TestApp::new();
    let (status, body) = t.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["now"], START);
}

#[tokio::test]
async fn test_milestone_flow_over_http() {
    let t = TestApp::new();
    let id = t.create_campaign().await;

    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/contributions"),
            Some("alice"),
            Some(json!({"amount": "10.0"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["status"], "Funded");

    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/milestones/0/deliverable"),
            Some("creator"),
            Some(json!({"deliverable_hash": "ab".repeat(32)})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["reference"].as_str().unwrap().to_string();
    assert_eq!(body["state"]["milestones"][0]["status"], "Submitted");

    let mut last = Value::Null;
    for node in ["n1", "n2", "n3"] {
        let (status, body) = t
            .call(
                "POST",
                &format!("/verifications/{request_id}/votes"),
                Some(node),
                Some(json!({"approve": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        last = body;
    }
    assert_eq!(last["state"]["is_completed"], true);
    assert_eq!(last["state"]["result"], true);

    let (status, body) = t
        .call("GET", &format!("/campaigns/{id}/milestones/0"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Verified");

    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/milestones/0/release"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reference"], format!("{id}/0"));
    assert_eq!(amount(&body["state"]["escrow_balance"]), dec!(6));

    let (status, body) = t
        .call("POST", &format!("/campaigns/{id}/withdraw"), Some("creator"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&body["state"]["amount"]), dec!(4));

    let (_, body) = t.call("GET", "/accounts/creator", None, None).await;
    assert_eq!(amount(&body["balance"]), dec!(4));

    let (status, text) = t.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("pledgeguard_oracle_votes_total 3"));
    assert!(text.contains("pledgeguard_requests_resolved_total 1"));
    assert!(text.contains("pledgeguard_campaigns 1"));
}

#[tokio::test]
async fn test_error_statuses() {
    let t = TestApp::new();
    let id = t.create_campaign().await;

    // No identity
    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/contributions"),
            None,
            Some(json!({"amount": "1"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    // Validation
    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/contributions"),
            Some("alice"),
            Some(json!({"amount": "11"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    // Unknown and malformed ids
    let (status, _) = t
        .call("GET", &format!("/campaigns/{}", uuid::Uuid::now_v7()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = t.call("GET", "/campaigns/nope", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    // Wrong lifecycle state
    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/milestones/0/release"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "state");

    // Wrong caller
    let (status, body) = t
        .call(
            "POST",
            &format!("/admin/campaigns/{id}/emergency-stop"),
            Some("alice"),
            Some(json!({"stop": true})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "authorization");

    let (_, text) = t.send("GET", "/metrics", None, None).await;
    assert!(text.contains(
        "pledgeguard_operations_total{operation=\"emergency_stop\",outcome=\"authorization\"} 1"
    ));
}

#[tokio::test]
async fn test_admin_routes() {
    let t = TestApp::new();
    let id = t.create_campaign().await;

    let (status, body) = t
        .call(
            "POST",
            "/admin/oracle-params",
            Some("admin"),
            Some(json!({"min_votes_required": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["min_votes_required"], 5);

    let (_, params) = t.call("GET", "/oracle/params", None, None).await;
    assert_eq!(params["min_votes_required"], 5);
    assert_eq!(params["node_reputation_threshold"], 300);

    let (status, _) = t
        .call(
            "POST",
            "/admin/oracle-params",
            Some("n1"),
            Some(json!({"min_votes_required": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .call(
            "POST",
            &format!("/admin/campaigns/{id}/emergency-stop"),
            Some("admin"),
            Some(json!({"stop": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["emergency_stopped"], true);

    let (status, _) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/contributions"),
            Some("alice"),
            Some(json!({"amount": "1"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_oracle_node_routes() {
    let t = TestApp::new();

    let (status, body) = t
        .call(
            "POST",
            "/oracle/nodes",
            Some("n4"),
            Some(json!({"endpoint": "https://n4.oracle", "stake": "50"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "resource");

    let (status, body) = t
        .call(
            "POST",
            "/oracle/nodes",
            Some("n4"),
            Some(json!({"endpoint": "https://n4.oracle", "stake": "150"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reference"], "n4");

    let (_, stats) = t.call("GET", "/oracle/stats", None, None).await;
    assert_eq!(stats["active_nodes"], 4);

    let (status, _) = t
        .call(
            "POST",
            "/oracle/nodes/n4/stake",
            Some("n1"),
            Some(json!({"amount": "25"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .call(
            "POST",
            "/oracle/nodes/n4/stake",
            Some("n4"),
            Some(json!({"amount": "25"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&body["state"]["stake"]), dec!(175));

    let (status, _) = t
        .call("POST", "/oracle/nodes/n4/deactivate", Some("n1"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .call("POST", "/oracle/nodes/n4/deactivate", Some("n4"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["active"], false);

    let (status, body) = t
        .call("POST", "/oracle/nodes/n4/reclaim", Some("n4"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&body["state"]["amount"]), dec!(175));

    let (_, body) = t.call("GET", "/accounts/n4", None, None).await;
    assert_eq!(amount(&body["balance"]), dec!(175));

    let (status, _) = t.call("GET", "/oracle/nodes/ghost", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_private_contribution_over_http() {
    let t = TestApp::new();
    let id = t.create_campaign().await;

    let opening = CommitmentOpening::random(dec!(3));
    let commitment = hex::encode(opening.commitment());
    let proof = t.attester.attest(&opening, dec!(2.5)).unwrap();

    let (status, body) = t
        .call(
            "POST",
            "/commitments",
            None,
            Some(json!({
                "commitment": commitment,
                "min_amount": "2.5",
                "nullifier_hash": hex::encode(opening.nullifier_hash()),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reference"], commitment);

    let (status, body) = t
        .call(
            "POST",
            &format!("/campaigns/{id}/private-contributions"),
            None,
            Some(json!({
                "commitment": commitment,
                "proof": proof,
                "amount": "3",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(amount(&body["state"]["raised_amount"]), dec!(3));

    let (status, body) = t
        .call("GET", &format!("/commitments/{commitment}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["used"], true);

    let (status, _) = t.call("GET", "/commitments/xyz", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing refunded yet, so there is nothing to claim
    let (status, _) = t
        .call(
            "POST",
            &format!("/commitments/{commitment}/refund-claims"),
            Some("bob"),
            Some(json!({"opening": opening})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(t.protocol.get_campaign(&parse_uuid(&id, "campaign").unwrap()).is_ok());
}
