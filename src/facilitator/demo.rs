//! `/x402/demo-ai`: runs the full client flow server-side so a browser demo
//! never has to hold a private key (spec.md §4.2, "Demo-AI").

use crate::chain::{ChainReader, ChainWriter};
use crate::client::{self, X402ClientConfig};
use crate::errors::X402Error;
use crate::facilitator::core::FacilitatorCore;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Demo-AI request timeout: it chains a GET and a paid retry against the
/// seller (spec.md §5, "45 s for demo-AI").
const DEMO_AI_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Deserialize)]
pub struct DemoAiRequest {
    /// Resource path on the configured seller URL, e.g. `/weather?q=sf`.
    pub path: String,
}

#[derive(Serialize)]
pub struct DemoAiResponse {
    /// HTTP status the seller ultimately returned.
    pub status: u16,
    /// Raw response body text.
    pub body: String,
    /// Decoded `PAYMENT-RESPONSE`, if the seller attached one.
    pub settlement: Option<crate::types::SettlementResult>,
}

pub async fn handle_demo_ai<C>(
    State(core): State<Arc<FacilitatorCore<C>>>,
    Json(request): Json<DemoAiRequest>,
) -> Response
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    match run_demo(&core, &request.path).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn run_demo<C>(
    core: &FacilitatorCore<C>,
    path: &str,
) -> crate::errors::Result<DemoAiResponse>
where
    C: ChainReader + ChainWriter + Send + Sync + 'static,
{
    let config = core.config();
    let buyer_key = config
        .demo_buyer_key
        .as_ref()
        .ok_or_else(|| X402Error::ConfigError("demo-ai disabled: no buyer key configured".to_string()))?;
    let api_url = config
        .api_url
        .as_ref()
        .ok_or_else(|| X402Error::ConfigError("demo-ai disabled: no API_URL configured".to_string()))?;

    let http_client = Client::builder()
        .timeout(DEMO_AI_TIMEOUT)
        .build()
        .map_err(|e| X402Error::ConfigError(format!("failed to build demo HTTP client: {e}")))?;

    let chain_id = core.chain_id_for_demo().await?;
    let client_config = X402ClientConfig::new(buyer_key.clone(), chain_id).with_client(http_client);
    let url = format!("{}{}", api_url.trim_end_matches('/'), path);

    let outcome = client::get(&client_config, &url).await?;
    let status = outcome.response.status().as_u16();
    let body = outcome.response.text().await.unwrap_or_default();

    Ok(DemoAiResponse {
        status,
        body,
        settlement: outcome.settlement,
    })
}
