//! Settlement orchestration.
//!
//! Given a validated intent, submit the envelope to the ledger and, when the
//! intent asks for it, fetch the follow-on swap quote. The sequencing
//! invariant is strict: no quote request is ever issued unless settlement
//! succeeded. A quote failure after successful settlement is reported as a
//! partial success, never rolled back.

use std::sync::Arc;

use intentmesh_horizon::Ledger;
use intentmesh_protocol::{
    Intent, SettlementOutcome, StellarResult, SwapResult, SwapTx, SWAP_GAS_ESTIMATE,
};

use crate::swap::SwapApi;

pub struct Settler {
    ledger: Arc<dyn Ledger>,
    swap: Arc<dyn SwapApi>,
}

impl Settler {
    pub fn new(ledger: Arc<dyn Ledger>, swap: Arc<dyn SwapApi>) -> Self {
        Self { ledger, swap }
    }

    pub async fn settle(&self, intent: &Intent) -> SettlementOutcome {
        // The responder checks for the envelope before calling us, but a
        // missing field here must still not reach the ledger client.
        let xdr = match &intent.xdr {
            Some(x) => x,
            None => {
                return SettlementOutcome::Failed(StellarResult::Error {
                    reason: "No XDR provided".into(),
                })
            }
        };

        let stellar = match self.ledger.submit(xdr).await {
            Ok(sub) => StellarResult::Success {
                tx_hash: sub.hash,
                ledger: sub.ledger,
            },
            Err(e) => {
                tracing::warn!("Settlement failed: {e}");
                return SettlementOutcome::Failed(StellarResult::Error {
                    reason: e.to_string(),
                });
            }
        };

        let swap = if intent.swap_required {
            Some(self.run_swap(intent).await)
        } else {
            None
        };

        SettlementOutcome::Settled { stellar, swap }
    }

    async fn run_swap(&self, intent: &Intent) -> SwapResult {
        let request = match &intent.swap_params {
            Some(req) => req,
            None => {
                return SwapResult::Error {
                    reason: "swap_required set but swap_params missing".into(),
                }
            }
        };

        let params = match request.resolve() {
            Ok(p) => p,
            Err(e) => return SwapResult::Error { reason: e.to_string() },
        };

        match self.swap.quote(&params).await {
            Ok(quote) => SwapResult::Ready {
                quote: quote.raw,
                tx: SwapTx {
                    to: quote.tx.to,
                    data: quote.tx.data,
                    value: quote.tx.value,
                    gas: SWAP_GAS_ESTIMATE,
                },
            },
            Err(e) => {
                tracing::warn!("Swap quote failed: {e}");
                SwapResult::Error { reason: e.to_string() }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
