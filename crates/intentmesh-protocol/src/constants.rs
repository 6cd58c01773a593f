// ============================================================================
// Protocol constants
// ============================================================================

/// libp2p stream protocol for intent request/response exchange.
pub const PROTOCOL_ID: &str = "/stellar/coordination/1.0.0";

/// Gossipsub topic for peer-address announcements.
pub const DISCOVERY_TOPIC: &str = "/stellar/peers/v0.1";

/// Intent type tag for a Stellar ledger payment. The only type the
/// responder currently settles; anything else is UNSUPPORTED_INTENT_TYPE.
pub const INTENT_TYPE_STELLAR_PAYMENT: &str = "stellar_payment";

// --- Transport --------------------------------------------------------------

/// Maximum framed intent request size in bytes.
pub const MAX_INTENT_SIZE: usize = 16_384;

/// Maximum framed response size in bytes.
pub const MAX_RESPONSE_SIZE: usize = 8_192;

// --- Timing -----------------------------------------------------------------

/// Interval between peer-address advertisements on the discovery topic.
pub const ADVERTISE_INTERVAL_SECS: u64 = 30;

/// Backoff after a failed advertise/subscribe attempt.
pub const RETRY_BACKOFF_SECS: u64 = 5;

/// Interval of the connection manager's fallback loop while disconnected.
pub const FALLBACK_INTERVAL_SECS: u64 = 10;

/// Bound applied to outbound requests so an unresponsive peer cannot
/// suspend the initiator indefinitely.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// --- Swap -------------------------------------------------------------------

/// Swap deadline applied when the intent's swap_params omits one (seconds).
pub const DEFAULT_SWAP_DEADLINE_SECS: u64 = 1_800;

/// Fixed gas estimate attached to prepared swap transactions.
pub const SWAP_GAS_ESTIMATE: u64 = 300_000;
