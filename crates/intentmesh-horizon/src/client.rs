//! Horizon HTTP client.
//!
//! Thin async client for the two Horizon endpoints the mesh needs:
//! transaction submission and account lookup. Submission failures are split
//! into transport errors (retryable, `HorizonError::Http`) and ledger
//! rejections (`HorizonError::Rejected`, carrying Horizon's result codes).

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::HorizonError;

/// Result of an accepted transaction submission.
#[derive(Debug, Clone, Deserialize)]
pub struct TxSubmission {
    /// Hex transaction hash (64 chars).
    pub hash: String,
    /// Ledger sequence the transaction was applied in.
    pub ledger: u64,
}

/// Account record, as returned by `GET /accounts/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRecord {
    pub account_id: String,
    /// Horizon serializes sequence numbers as strings.
    pub sequence: String,
}

impl AccountRecord {
    pub fn sequence_number(&self) -> Result<i64, HorizonError> {
        self.sequence
            .parse()
            .map_err(|e| HorizonError::Malformed(format!("bad sequence '{}': {e}", self.sequence)))
    }
}

/// The ledger collaborator boundary. The settlement orchestrator only sees
/// this trait, so tests can substitute a mock and the transport can change
/// without touching orchestration.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a base64 XDR transaction envelope.
    async fn submit(&self, xdr_b64: &str) -> Result<TxSubmission, HorizonError>;
}

// ============================================================================
// HorizonClient
// ============================================================================

pub struct HorizonClient {
    base: String,
    http: reqwest::Client,
}

/// Error body returned by Horizon on a rejected submission.
#[derive(Debug, Deserialize)]
struct ProblemResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct ProblemExtras {
    #[serde(default)]
    result_codes: Option<serde_json::Value>,
}

impl HorizonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch an account record (sequence number lookup for envelope builders).
    pub async fn load_account(&self, account_id: &str) -> Result<AccountRecord, HorizonError> {
        let url = format!("{}/accounts/{account_id}", self.base);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HorizonError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HorizonError::Rejected {
                status: status.as_u16(),
                detail: format!("account {account_id} lookup failed"),
            });
        }
        resp.json()
            .await
            .map_err(|e| HorizonError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Ledger for HorizonClient {
    async fn submit(&self, xdr_b64: &str) -> Result<TxSubmission, HorizonError> {
        let url = format!("{}/transactions", self.base);
        tracing::debug!("Submitting transaction to {url}");

        let resp = self
            .http
            .post(&url)
            .form(&[("tx", xdr_b64)])
            .send()
            .await
            .map_err(|e| HorizonError::Http(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            let submission: TxSubmission = resp
                .json()
                .await
                .map_err(|e| HorizonError::Malformed(e.to_string()))?;
            tracing::info!("Transaction accepted: {}", submission.hash);
            return Ok(submission);
        }

        // Horizon rejections carry result codes in the problem body.
        let detail = match resp.json::<ProblemResponse>().await {
            Ok(problem) => {
                let codes = problem
                    .extras
                    .and_then(|e| e.result_codes)
                    .map(|c| c.to_string());
                match (problem.title, codes) {
                    (Some(t), Some(c)) => format!("{t}: {c}"),
                    (Some(t), None) => t,
                    (None, Some(c)) => c,
                    (None, None) => "no detail".into(),
                }
            }
            Err(e) => format!("unparseable error body: {e}"),
        };

        Err(HorizonError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_parses() {
        let rec = AccountRecord {
            account_id: "GABC".into(),
            sequence: "123456789".into(),
        };
        assert_eq!(rec.sequence_number().unwrap(), 123_456_789);
    }

    #[test]
    fn bad_sequence_is_malformed() {
        let rec = AccountRecord {
            account_id: "GABC".into(),
            sequence: "not-a-number".into(),
        };
        assert!(matches!(
            rec.sequence_number(),
            Err(HorizonError::Malformed(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = HorizonClient::new("https://horizon-testnet.stellar.org/");
        assert_eq!(client.base, "https://horizon-testnet.stellar.org");
    }
}
