//! Thin HTTP client the Gate uses to reach the loopback facilitator.
//!
//! Every call carries `X-Facilitator-Key`; the facilitator rejects anything
//! else (spec.md §4.2/§6). Kept separate from `crate::client` — that module
//! is the *buyer's* reference client, this one is the *seller's* link to its
//! own local relayer process.

use crate::errors::{Result, X402Error};
use crate::types::{
    HealthResponse, PaymentPayload, PaymentRequirements, SettlementResult, VerificationResponse,
};
use reqwest::Client;
use serde_json::json;

const API_KEY_HEADER: &str = "X-Facilitator-Key";

/// Client for the facilitator's verify/settle/health routes.
#[derive(Clone)]
pub struct FacilitatorClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl FacilitatorClient {
    /// Builds a client pointed at `base_url` (e.g. `http://127.0.0.1:3849`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: Client::new(),
        }
    }

    /// `POST /x402/verify`.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerificationResponse> {
        self.post_json(
            "/x402/verify",
            &json!({ "paymentPayload": payload, "paymentRequirements": requirements }),
        )
        .await
    }

    /// `POST /x402/settle`.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettlementResult> {
        self.post_json(
            "/x402/settle",
            &json!({ "paymentPayload": payload, "paymentRequirements": requirements }),
        )
        .await
    }

    /// `GET /x402/health`. Unauthenticated on the facilitator side, but the
    /// key is still sent so a single client works against either route set.
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(format!("{}/x402/health", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(X402Error::Unauthorized);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(X402Error::Other(format!(
                "facilitator returned {status}: {text}"
            )));
        }
        Ok(response.json().await?)
    }
}
