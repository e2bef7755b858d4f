//! Facilitator HTTP surface: the six routes from spec.md §4.2, an
//! `X-API-Key`/`X-Facilitator-Key` auth layer, and the 1 MiB body cap.
//!
//! `/x402/verify` and `/x402/verify-transfer` (same for `settle`) share one
//! handler each — `FacilitatorCore::verify`/`::settle` already dispatch on
//! `requirements.extra`'s tag, so the second path is an alias kept for
//! clients that only ever send direct transfers and expect a
//! mode-specific URL.

use crate::chain::{ChainReader, ChainWriter};
use crate::errors::X402Error;
use crate::facilitator::core::FacilitatorCore;
use crate::types::{SettlementRequest, VerificationRequest};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

const API_KEY_HEADERS: [&str; 2] = ["x-api-key", "x-facilitator-key"];
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the facilitator's Axum router.
pub fn router<C>(core: Arc<FacilitatorCore<C>>) -> Router
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    let protected = Router::new()
        .route("/x402/verify", post(handle_verify::<C>))
        .route("/x402/verify-transfer", post(handle_verify::<C>))
        .route("/x402/settle", post(handle_settle::<C>))
        .route("/x402/settle-transfer", post(handle_settle::<C>))
        .route("/x402/demo-ai", post(crate::facilitator::demo::handle_demo_ai::<C>))
        .layer(middleware::from_fn_with_state(core.clone(), require_api_key::<C>));

    Router::new()
        .route("/x402/health", get(handle_health::<C>))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(core)
}

async fn require_api_key<C>(
    State(core): State<Arc<FacilitatorCore<C>>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    let expected = &core.config().facilitator_key;
    let provided = API_KEY_HEADERS.iter().find_map(|name| {
        request
            .headers()
            .get(*name)
            .and_then(|v| v.to_str().ok())
    });

    match provided {
        Some(key) if key == expected => next.run(request).await,
        _ => X402Error::Unauthorized.into_response(),
    }
}

async fn handle_health<C>(State(core): State<Arc<FacilitatorCore<C>>>) -> Response
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    match core.health().await {
        Ok(health) => Json(health).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_verify<C>(
    State(core): State<Arc<FacilitatorCore<C>>>,
    Json(request): Json<VerificationRequest>,
) -> Response
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    let verdict = core
        .verify(&request.payment_payload, &request.payment_requirements)
        .await;
    (StatusCode::OK, Json(verdict)).into_response()
}

async fn handle_settle<C>(
    State(core): State<Arc<FacilitatorCore<C>>>,
    Json(request): Json<SettlementRequest>,
) -> Response
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    let result = core
        .settle(&request.payment_payload, &request.payment_requirements)
        .await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result)).into_response()
}
