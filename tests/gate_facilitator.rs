//! End-to-end coverage of the Payment Gate against a mocked facilitator,
//! exercising the literal scenarios from spec.md §8.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use x402_paygate::gate::facilitator_client::FacilitatorClient;
use x402_paygate::gate::{PaymentGateConfig, PaymentGateLayer};
use x402_paygate::types::{PaymentRequirements, RequirementsExtra};

fn sample_requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: "exact".to_string(),
        network: "eip155:1030".to_string(),
        asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
        pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb".to_string(),
        amount: "10000".to_string(),
        resource: "/resource".to_string(),
        description: None,
        mime_type: None,
        max_timeout_seconds: 3600,
        extra: RequirementsExtra::Transfer {
            name: "USDT0".to_string(),
            version: "1".to_string(),
        },
    }
}

fn sample_payload_json() -> serde_json::Value {
    serde_json::json!({
        "x402Version": 2,
        "scheme": "exact",
        "network": "eip155:1030",
        "payload": {
            "signature": format!("0x{}", "ab".repeat(65)),
            "authorization": {
                "from": "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
                "to": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                "value": "10000",
                "validAfter": "0",
                "validBefore": "9999999999",
                "nonce": format!("0x{}", "cd".repeat(32)),
            }
        }
    })
}

async fn app(facilitator_url: String) -> Router {
    let config = PaymentGateConfig {
        requirements: sample_requirements(),
        facilitator: FacilitatorClient::new(facilitator_url, "test-secret"),
    };
    Router::new()
        .route("/resource", get(|| async { "protected content" }))
        .layer(PaymentGateLayer::new(config))
}

#[tokio::test]
async fn scenario_missing_signature_returns_402_with_array_header() {
    let mock_server = MockServer::start().await;
    let router = app(mock_server.uri()).await;

    let request = Request::builder()
        .uri("/resource")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let header = response
        .headers()
        .get("PAYMENT-REQUIRED")
        .unwrap()
        .to_str()
        .unwrap();
    let decoded = BASE64.decode(header).unwrap();
    let offers: Vec<PaymentRequirements> = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(offers.len(), 1, "header must decode to a JSON array");
    assert_eq!(offers[0].network, "eip155:1030");
}

#[tokio::test]
async fn scenario_a_happy_path_forwards_and_attaches_payment_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/x402/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "valid": true })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/x402/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "transaction": format!("0x{}", "11".repeat(32)),
            "payer": "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
            "scheme": "exact",
            "network": "eip155:1030",
            "x402Version": 2,
        })))
        .mount(&mock_server)
        .await;

    let router = app(mock_server.uri()).await;
    let header_value = BASE64.encode(serde_json::to_vec(&sample_payload_json()).unwrap());
    let request = Request::builder()
        .uri("/resource")
        .header("PAYMENT-SIGNATURE", header_value)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("PAYMENT-RESPONSE").is_some());
}

#[tokio::test]
async fn scenario_b_verify_rejects_underpayment() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/x402/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "valid": false,
            "reason": "Insufficient amount",
        })))
        .mount(&mock_server)
        .await;

    let router = app(mock_server.uri()).await;
    let header_value = BASE64.encode(serde_json::to_vec(&sample_payload_json()).unwrap());
    let request = Request::builder()
        .uri("/resource")
        .header("PAYMENT-SIGNATURE", header_value)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn scenario_e_nonce_reuse_fails_settle_with_500() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/x402/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "valid": true })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/x402/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "scheme": "exact",
            "network": "eip155:1030",
            "x402Version": 2,
            "error": "nonce already used",
        })))
        .mount(&mock_server)
        .await;

    let router = app(mock_server.uri()).await;
    let header_value = BASE64.encode(serde_json::to_vec(&sample_payload_json()).unwrap());
    let request = Request::builder()
        .uri("/resource")
        .header("PAYMENT-SIGNATURE", header_value)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn malformed_payment_signature_header_returns_400() {
    let mock_server = MockServer::start().await;
    let router = app(mock_server.uri()).await;

    let request = Request::builder()
        .uri("/resource")
        .header("PAYMENT-SIGNATURE", "not-valid-base64!!")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
