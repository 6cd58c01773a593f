use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("XDR decode error: {0}")]
    Xdr(String),

    #[error("unsupported envelope type: {0}")]
    UnsupportedEnvelopeType(u32),

    #[error("unsupported operation type: {0}")]
    UnsupportedOperation(u32),

    #[error("unsupported preconditions type: {0}")]
    UnsupportedPreconditions(u32),

    #[error("unknown key type: {0:#x}")]
    UnknownKeyType(u32),

    #[error("unknown memo type: {0}")]
    UnknownMemo(u32),

    #[error("unknown asset type: {0}")]
    UnknownAsset(u32),

    #[error("signature must be 64 bytes, got {0}")]
    BadSignatureLength(usize),

    #[error("No signatures present")]
    NoSignatures,

    #[error("no signature matches the source account key")]
    NoSourceSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid verifying key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum HorizonError {
    /// Transport-level failure: DNS, connect, timeout, malformed body.
    #[error("Horizon request failed: {0}")]
    Http(String),

    /// The ledger rejected the transaction.
    #[error("transaction rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("unexpected Horizon response: {0}")]
    Malformed(String),
}
