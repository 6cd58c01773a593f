//! Swap quote client.
//!
//! Bearer-token HTTP client for a 1inch-style quoting API. The responder
//! only needs one call: given token addresses and an amount, fetch a quote
//! whose body contains a prepared transaction template (`tx.to`, `tx.data`,
//! `tx.value`).

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use intentmesh_protocol::SwapParams;

#[derive(Debug, Error)]
pub enum SwapError {
    /// Transport-level failure: DNS, connect, timeout.
    #[error("swap API request failed: {0}")]
    Http(String),

    /// The quote service answered with an error status.
    #[error("quote rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("unexpected quote response: {0}")]
    Malformed(String),
}

/// Prepared transaction template embedded in a quote response.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteTx {
    pub to: String,
    pub data: String,
    pub value: String,
}

/// A successful quote: the raw response body (forwarded verbatim to the
/// initiator) plus the extracted transaction template.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    pub raw: serde_json::Value,
    pub tx: QuoteTx,
}

/// The swap collaborator boundary.
#[async_trait]
pub trait SwapApi: Send + Sync {
    async fn quote(&self, params: &SwapParams) -> Result<SwapQuote, SwapError>;
}

// ============================================================================
// OneInchClient
// ============================================================================

pub struct OneInchClient {
    base: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl OneInchClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_owned(),
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SwapApi for OneInchClient {
    async fn quote(&self, params: &SwapParams) -> Result<SwapQuote, SwapError> {
        let url = format!("{}/quote", self.base);
        tracing::debug!(
            "Fetching swap quote {} -> {} amount={}",
            params.from_token,
            params.to_token,
            params.amount,
        );

        let mut req = self.http.get(&url).query(&[
            ("src", params.from_token.as_str()),
            ("dst", params.to_token.as_str()),
            ("amount", &params.amount.to_string()),
            ("slippage", &params.slippage.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SwapError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_else(|e| e.to_string());
            return Err(SwapError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SwapError::Malformed(e.to_string()))?;

        let tx: QuoteTx = serde_json::from_value(raw["tx"].clone())
            .map_err(|e| SwapError::Malformed(format!("missing tx template: {e}")))?;

        Ok(SwapQuote { raw, tx })
    }
}
