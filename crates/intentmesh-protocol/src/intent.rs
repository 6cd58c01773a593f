use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{constants::DEFAULT_SWAP_DEADLINE_SECS, error::ProtocolError};

// ============================================================================
// Intent — the payload exchanged between agents
// ============================================================================

/// A structured request describing a desired Stellar payment and an
/// optional follow-on cross-chain swap.
///
/// `xdr` carries the signed transaction envelope in the ledger's native
/// base64 XDR encoding. It is modeled as `Option` so that a payload
/// missing it still deserializes and can be answered with a structured
/// error instead of a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Base64 XDR transaction envelope. Required for settlement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xdr: Option<String>,
    /// Intent metadata; `source` is the originating Stellar account.
    pub metadata: Metadata,
    /// Declared intent type tag (see `INTENT_TYPE_STELLAR_PAYMENT`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub intent_type: Option<String>,
    /// When true, a swap quote is requested after successful settlement.
    #[serde(default)]
    pub swap_required: bool,
    /// Parameters for the follow-on swap; required when `swap_required`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_params: Option<SwapRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Source account identifier (Stellar public key).
    pub source: String,
}

impl Intent {
    /// Decode an intent from raw request bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Json(e.to_string()))
    }

    /// Encode to compact JSON bytes for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Json(e.to_string()))
    }
}

// ============================================================================
// Swap parameters
// ============================================================================

/// Swap sub-object as it appears on the wire.
///
/// `amount` and `slippage` are accepted as either JSON strings or numbers;
/// senders in the wild use both. `resolve()` coerces them into typed
/// `SwapParams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    pub from_token: String,
    pub to_token: String,
    pub amount: Value,
    pub slippage: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<u64>,
}

/// Typed swap parameters used for the quote request.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapParams {
    /// Source token contract address.
    pub from_token: String,
    /// Destination token contract address.
    pub to_token: String,
    /// Amount in the token's smallest unit.
    pub amount: u128,
    /// Maximum acceptable slippage, percent.
    pub slippage: f64,
    /// Swap expiration, seconds.
    pub deadline: u64,
}

impl SwapRequest {
    /// Coerce the wire representation into typed parameters,
    /// defaulting the deadline if absent.
    pub fn resolve(&self) -> Result<SwapParams, ProtocolError> {
        let amount = coerce_u128(&self.amount).map_err(|reason| {
            ProtocolError::InvalidSwapParam { field: "amount", reason }
        })?;
        let slippage = coerce_f64(&self.slippage).map_err(|reason| {
            ProtocolError::InvalidSwapParam { field: "slippage", reason }
        })?;
        Ok(SwapParams {
            from_token: self.from_token.clone(),
            to_token: self.to_token.clone(),
            amount,
            slippage,
            deadline: self.deadline.unwrap_or(DEFAULT_SWAP_DEADLINE_SECS),
        })
    }
}

fn coerce_u128(v: &Value) -> Result<u128, String> {
    match v {
        Value::String(s) => s.parse().map_err(|e| format!("{e}")),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("not a non-negative integer: {n}")),
        other => Err(format!("expected string or number, got {other}")),
    }
}

fn coerce_f64(v: &Value) -> Result<f64, String> {
    match v {
        Value::String(s) => s.parse().map_err(|e| format!("{e}")),
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("not a number: {n}")),
        other => Err(format!("expected string or number, got {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INTENT_TYPE_STELLAR_PAYMENT;

    #[test]
    fn full_intent_decodes() {
        let raw = br#"{
            "xdr": "AAAA",
            "metadata": {"source": "GABC"},
            "type": "stellar_payment",
            "swap_required": true,
            "swap_params": {
                "from_token": "0xAAA",
                "to_token": "0xBBB",
                "amount": "1000",
                "slippage": "1"
            }
        }"#;
        let intent = Intent::from_bytes(raw).unwrap();
        assert_eq!(intent.xdr.as_deref(), Some("AAAA"));
        assert_eq!(intent.metadata.source, "GABC");
        assert_eq!(intent.intent_type.as_deref(), Some(INTENT_TYPE_STELLAR_PAYMENT));
        assert!(intent.swap_required);

        let params = intent.swap_params.unwrap().resolve().unwrap();
        assert_eq!(params.amount, 1000);
        assert_eq!(params.slippage, 1.0);
        assert_eq!(params.deadline, DEFAULT_SWAP_DEADLINE_SECS);
    }

    #[test]
    fn missing_xdr_still_decodes() {
        let raw = br#"{"metadata": {"source": "GABC"}, "type": "stellar_payment"}"#;
        let intent = Intent::from_bytes(raw).unwrap();
        assert!(intent.xdr.is_none());
        assert!(!intent.swap_required);
    }

    #[test]
    fn missing_metadata_rejected() {
        let raw = br#"{"xdr": "AAAA"}"#;
        assert!(matches!(
            Intent::from_bytes(raw),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            Intent::from_bytes(b"not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn numeric_swap_params_accepted() {
        let req: SwapRequest = serde_json::from_str(
            r#"{"from_token": "0xA", "to_token": "0xB", "amount": 5000, "slippage": 0.5, "deadline": 600}"#,
        )
        .unwrap();
        let params = req.resolve().unwrap();
        assert_eq!(params.amount, 5000);
        assert_eq!(params.slippage, 0.5);
        assert_eq!(params.deadline, 600);
    }

    #[test]
    fn bad_amount_rejected() {
        let req: SwapRequest = serde_json::from_str(
            r#"{"from_token": "0xA", "to_token": "0xB", "amount": "lots", "slippage": "1"}"#,
        )
        .unwrap();
        assert!(matches!(
            req.resolve(),
            Err(ProtocolError::InvalidSwapParam { field: "amount", .. })
        ));
    }
}
