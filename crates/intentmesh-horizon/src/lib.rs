pub mod client;
pub mod envelope;
pub mod error;
pub mod xdr;

pub use client::{HorizonClient, Ledger, TxSubmission};
pub use envelope::{Network, TransactionEnvelope};
pub use error::{EnvelopeError, HorizonError};
