//! Intent validation.
//!
//! Pure checks run before any side effect. The validator never panics and
//! never propagates an error to its caller: every failure folds into a
//! `ValidationResult` so one malformed intent cannot take down the
//! responder.

use intentmesh_horizon::{Network, TransactionEnvelope};
use intentmesh_protocol::{Intent, ValidationResult};

/// Validate a received intent against the expected network.
///
/// Checks in order, short-circuiting on the first failure:
/// envelope present → XDR parses → at least one signature → nonzero
/// sequence number → source-account signature verifies.
pub fn validate(intent: &Intent, network: &Network) -> ValidationResult {
    let xdr = match &intent.xdr {
        Some(x) => x,
        None => {
            return ValidationResult::Malformed("Missing XDR transaction envelope".into())
        }
    };

    let envelope = match TransactionEnvelope::from_xdr(xdr) {
        Ok(env) => env,
        Err(e) => return ValidationResult::Malformed(e.to_string()),
    };

    if envelope.signatures.is_empty() {
        return ValidationResult::Invalid("No signatures present".into());
    }

    if envelope.tx.sequence == 0 {
        return ValidationResult::Invalid("Invalid sequence number (0)".into());
    }

    if let Err(e) = envelope.verify(network) {
        return ValidationResult::Invalid(e.to_string());
    }

    ValidationResult::Valid
}

/// Validate from raw payload bytes: the standalone entry point that also
/// covers the "payload is an object" and JSON-decode checks.
pub fn validate_bytes(data: &[u8], network: &Network) -> ValidationResult {
    match Intent::from_bytes(data) {
        Ok(intent) => validate(&intent, network),
        Err(e) => ValidationResult::Malformed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use intentmesh_horizon::envelope::Transaction;
    use intentmesh_protocol::intent::Metadata;
    use rand::rngs::OsRng;

    fn intent_with_xdr(xdr: Option<String>) -> Intent {
        Intent {
            xdr,
            metadata: Metadata { source: "GABC".into() },
            intent_type: Some("stellar_payment".into()),
            swap_required: false,
            swap_params: None,
        }
    }

    fn signed_xdr(sequence: i64, sign: bool) -> String {
        let key = SigningKey::generate(&mut OsRng);
        let source = key.verifying_key().to_bytes();
        let tx = Transaction::payment(source, [7u8; 32], 10_000_000, sequence, 100);
        let mut env = TransactionEnvelope::new(tx);
        if sign {
            env.sign(&Network::testnet(), &key);
        }
        env.to_xdr()
    }

    #[test]
    fn valid_intent_passes() {
        let intent = intent_with_xdr(Some(signed_xdr(5, true)));
        assert_eq!(validate(&intent, &Network::testnet()), ValidationResult::Valid);
    }

    #[test]
    fn missing_envelope_is_malformed() {
        let intent = intent_with_xdr(None);
        assert_eq!(
            validate(&intent, &Network::testnet()),
            ValidationResult::Malformed("Missing XDR transaction envelope".into()),
        );
    }

    #[test]
    fn undecodable_envelope_is_malformed() {
        let intent = intent_with_xdr(Some("!!not-xdr!!".into()));
        assert!(matches!(
            validate(&intent, &Network::testnet()),
            ValidationResult::Malformed(_)
        ));
    }

    #[test]
    fn unsigned_envelope_is_invalid() {
        let intent = intent_with_xdr(Some(signed_xdr(5, false)));
        let result = validate(&intent, &Network::testnet());
        assert_eq!(
            result,
            ValidationResult::Invalid("No signatures present".into()),
        );
    }

    #[test]
    fn zero_sequence_is_invalid() {
        let intent = intent_with_xdr(Some(signed_xdr(0, true)));
        assert_eq!(
            validate(&intent, &Network::testnet()),
            ValidationResult::Invalid("Invalid sequence number (0)".into()),
        );
    }

    #[test]
    fn wrong_network_is_invalid() {
        let intent = intent_with_xdr(Some(signed_xdr(5, true)));
        let public = Network::new(Network::PUBLIC_PASSPHRASE);
        assert!(matches!(
            validate(&intent, &public),
            ValidationResult::Invalid(_)
        ));
    }

    #[test]
    fn validate_bytes_covers_decode() {
        let net = Network::testnet();
        assert!(matches!(
            validate_bytes(b"[1, 2, 3]", &net),
            ValidationResult::Malformed(_)
        ));
        assert!(matches!(
            validate_bytes(b"not json at all", &net),
            ValidationResult::Malformed(_)
        ));
    }
}
