pub mod constants;
pub mod error;
pub mod intent;
pub mod response;
pub mod validation;

pub use constants::*;
pub use error::ProtocolError;
pub use intent::{Intent, SwapParams, SwapRequest};
pub use response::{Response, SettlementOutcome, StellarResult, SwapResult, SwapTx};
pub use validation::ValidationResult;
