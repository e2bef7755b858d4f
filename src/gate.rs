//! Payment Gate: `tower::Layer`/`tower::Service` middleware that turns a 402
//! negotiation into calls against a local facilitator, per spec.md §4.3's
//! six-step algorithm. Wraps any Axum handler — the handler never sees an
//! unpaid request.

pub mod facilitator_client;

use crate::errors::X402Error;
use crate::types::{PaymentPayload, PaymentRequirements};
use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use facilitator_client::FacilitatorClient;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";
const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";
const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// Per-resource configuration the Gate needs: what to charge, and where the
/// facilitator lives.
#[derive(Clone)]
pub struct PaymentGateConfig {
    /// The requirements offered to unpaid requests, and checked against
    /// signed payloads.
    pub requirements: PaymentRequirements,
    /// Client for the loopback facilitator.
    pub facilitator: FacilitatorClient,
}

/// `tower::Layer` that wraps a handler with x402 payment mediation.
#[derive(Clone)]
pub struct PaymentGateLayer {
    config: Arc<PaymentGateConfig>,
}

impl PaymentGateLayer {
    /// Builds a new layer over the given resource configuration.
    pub fn new(config: PaymentGateConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for PaymentGateLayer {
    type Service = PaymentGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// The `tower::Service` produced by [`PaymentGateLayer`].
#[derive(Clone)]
pub struct PaymentGateService<S> {
    inner: S,
    config: Arc<PaymentGateConfig>,
}

impl<S> Service<Request<Body>> for PaymentGateService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = self.config.clone();
        Box::pin(async move {
            match mediate(&config, &req).await {
                Ok(Some(settlement_header)) => {
                    let mut response = inner.call(req).await?;
                    response
                        .headers_mut()
                        .insert(PAYMENT_RESPONSE_HEADER, settlement_header);
                    Ok(response)
                }
                Ok(None) => inner.call(req).await,
                Err(rejection) => Ok(rejection),
            }
        })
    }
}

/// Runs the gate algorithm. `Ok(None)` means "no payment was needed for this
/// call" (never happens in this crate — every wrapped route is paid — but
/// keeps the type honest). `Ok(Some(header))` means payment settled and the
/// caller should forward the request with that `PAYMENT-RESPONSE` value
/// attached to the response. `Err(response)` is a final rejection.
async fn mediate(
    config: &PaymentGateConfig,
    req: &Request<Body>,
) -> Result<Option<HeaderValue>, Response<Body>> {
    // Step 1: read PAYMENT-SIGNATURE.
    let header = match req.headers().get(PAYMENT_SIGNATURE_HEADER) {
        Some(h) => h,
        None => return Err(payment_required_response(&config.requirements)),
    };
    let header_str = header
        .to_str()
        .map_err(|e| invalid_payload_response(format!("non-ASCII header: {e}")))?;

    // Step 3: decode.
    let payload = match decode_payload(header_str) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "invalid payment header");
            return Err(invalid_payload_response(e.to_string()));
        }
    };

    tracing::info!(
        payer = %payload.payload.authorization.from,
        network = %payload.network,
        "payment attempt"
    );

    // Step 4: verify.
    let verdict = config
        .facilitator
        .verify(&payload, &config.requirements)
        .await
        .map_err(facilitator_unreachable_response)?;
    if !verdict.valid {
        let reason = verdict.reason.unwrap_or_else(|| "verification failed".to_string());
        tracing::warn!(payer = %payload.payload.authorization.from, %reason, "payment rejected");
        return Err(verify_failed_response(reason));
    }

    // Step 5: settle. A transport failure here is indistinguishable from a
    // settle the facilitator itself reports as failed — spec.md §4.3 step 5
    // treats both the same: 500 `X402_SETTLE_FAILED`. Retrying is never safe
    // once a settle call has been made (the on-chain tx may already be
    // broadcast), so this is a final rejection either way.
    let settlement = match config.facilitator.settle(&payload, &config.requirements).await {
        Ok(settlement) => settlement,
        Err(e) => {
            tracing::error!(payer = %payload.payload.authorization.from, error = %e, "settle call failed");
            return Err(settle_failed_response(e.to_string()));
        }
    };
    if !settlement.success {
        let reason = settlement.error.clone().unwrap_or_else(|| "settlement failed".to_string());
        tracing::error!(payer = %payload.payload.authorization.from, %reason, "settlement failed");
        return Err(settle_failed_response(reason));
    }

    // Step 6: encode PAYMENT-RESPONSE for the caller to attach.
    let json = serde_json::to_vec(&settlement).map_err(|e| {
        invalid_payload_response(format!("failed to encode settlement result: {e}"))
    })?;
    let encoded = BASE64.encode(json);
    let header_value = HeaderValue::from_str(&encoded)
        .map_err(|e| invalid_payload_response(format!("header encoding: {e}")))?;
    Ok(Some(header_value))
}

fn decode_payload(header_str: &str) -> crate::errors::Result<PaymentPayload> {
    let decoded = BASE64.decode(header_str.as_bytes())?;
    Ok(serde_json::from_slice(&decoded)?)
}

fn payment_required_response(requirements: &PaymentRequirements) -> Response<Body> {
    let offers = vec![requirements.clone()];
    let json = serde_json::to_vec(&offers).unwrap_or_default();
    let encoded = BASE64.encode(json);
    let body = json!({ "error": "X402_PAYMENT_REQUIRED", "message": "payment required" });
    let mut response = (StatusCode::PAYMENT_REQUIRED, axum::Json(body)).into_response();
    if let Ok(header_value) = HeaderValue::from_str(&encoded) {
        response.headers_mut().insert(PAYMENT_REQUIRED_HEADER, header_value);
    }
    response
}

fn invalid_payload_response(message: String) -> Response<Body> {
    X402Error::InvalidPayload(message).into_response()
}

fn verify_failed_response(reason: String) -> Response<Body> {
    X402Error::VerificationFailed(reason).into_response()
}

fn settle_failed_response(reason: String) -> Response<Body> {
    X402Error::SettlementError(reason).into_response()
}

fn facilitator_unreachable_response(err: X402Error) -> Response<Body> {
    X402Error::ConfigError(format!("facilitator unreachable: {err}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequirementsExtra;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "eip155:8453".to_string(),
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb".to_string(),
            amount: "10000".to_string(),
            resource: "/resource".to_string(),
            description: None,
            mime_type: None,
            max_timeout_seconds: 3600,
            extra: RequirementsExtra::Transfer {
                name: "USD Coin".to_string(),
                version: "2".to_string(),
            },
        }
    }

    #[test]
    fn payment_required_response_carries_header_as_array() {
        let response = payment_required_response(&sample_requirements());
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let header = response
            .headers()
            .get(PAYMENT_REQUIRED_HEADER)
            .unwrap()
            .to_str()
            .unwrap();
        let decoded = BASE64.decode(header).unwrap();
        let offers: Vec<PaymentRequirements> = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(offers.len(), 1);
    }

    #[test]
    fn decode_payload_rejects_garbage() {
        assert!(decode_payload("not valid base64!!").is_err());
    }
}
