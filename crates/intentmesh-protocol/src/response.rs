use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

// ============================================================================
// Protocol responses
// ============================================================================

/// Response written back over the intent stream. The `status` field
/// discriminates the shape; every path produces exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    /// The intent was validated and settlement was attempted.
    #[serde(rename = "PROCESSED")]
    Processed { results: SettlementOutcome },

    /// The intent failed structural or signature validation;
    /// settlement was not attempted.
    #[serde(rename = "INVALID")]
    Invalid { reason: String },

    /// The payload could not be processed at all (decode failure,
    /// missing envelope).
    #[serde(rename = "ERROR")]
    Error { reason: String },

    /// The declared intent type is not handled by this responder.
    #[serde(rename = "UNSUPPORTED_INTENT_TYPE")]
    UnsupportedIntentType,
}

impl Response {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Json(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Json(e.to_string()))
    }
}

// ============================================================================
// Settlement outcome
// ============================================================================

/// Composed result of ledger submission plus the optional follow-on swap.
///
/// A failed submission short-circuits: no swap is attempted and the bare
/// error result is returned. A swap failure after successful settlement is
/// a partial success, reported alongside the settled ledger result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettlementOutcome {
    Settled {
        stellar: StellarResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        swap: Option<SwapResult>,
    },
    Failed(StellarResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum StellarResult {
    #[serde(rename = "SUCCESS")]
    Success { tx_hash: String, ledger: u64 },
    #[serde(rename = "ERROR")]
    Error { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SwapResult {
    /// Quote obtained; `tx` is the prepared swap transaction template.
    #[serde(rename = "SWAP_READY")]
    Ready { quote: Value, tx: SwapTx },
    #[serde(rename = "ERROR")]
    Error { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTx {
    pub to: String,
    pub data: String,
    pub value: String,
    pub gas: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
