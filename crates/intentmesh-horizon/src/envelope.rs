//! Stellar transaction-envelope codec.
//!
//! A faithful subset of the Stellar `TransactionEnvelope` XDR: v1 envelopes
//! (`ENVELOPE_TYPE_TX`) carrying create-account and payment operations.
//! Anything outside that subset decodes to a structured error so the
//! validator can report it as malformed instead of guessing.
//!
//! Encoding and signing are implemented as well so initiators and tests can
//! build signed envelopes without an external SDK. The transaction hash is
//! `sha256(network_id ‖ be32(ENVELOPE_TYPE_TX) ‖ tx_xdr)` and signatures are
//! Ed25519 over that hash, hint-matched by the trailing four bytes of the
//! signer's public key — the same scheme Horizon enforces.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::{
    error::EnvelopeError,
    xdr::{XdrReader, XdrWriter},
};

// --- XDR union discriminants ------------------------------------------------

const ENVELOPE_TYPE_TX: u32 = 2;

const KEY_TYPE_ED25519: u32 = 0;
const KEY_TYPE_MUXED_ED25519: u32 = 0x100;

const PRECOND_NONE: u32 = 0;
const PRECOND_TIME: u32 = 1;

const MEMO_NONE: u32 = 0;
const MEMO_TEXT: u32 = 1;
const MEMO_ID: u32 = 2;
const MEMO_HASH: u32 = 3;
const MEMO_RETURN: u32 = 4;

const OP_CREATE_ACCOUNT: u32 = 0;
const OP_PAYMENT: u32 = 1;

const ASSET_NATIVE: u32 = 0;
const ASSET_ALPHANUM4: u32 = 1;
const ASSET_ALPHANUM12: u32 = 2;

/// Stellar caps operations per transaction at 100.
const MAX_OPERATIONS: u32 = 100;
/// And signatures per envelope at 20.
const MAX_SIGNATURES: u32 = 20;

const MEMO_TEXT_MAX: usize = 28;
const SIGNATURE_LEN: usize = 64;

// ============================================================================
// Network
// ============================================================================

/// A Stellar network, identified by the SHA-256 of its passphrase.
/// The network id domain-separates transaction hashes between networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    id: [u8; 32],
}

impl Network {
    pub const TESTNET_PASSPHRASE: &'static str = "Test SDF Network ; September 2015";
    pub const PUBLIC_PASSPHRASE: &'static str =
        "Public Global Stellar Network ; September 2015";

    pub fn new(passphrase: &str) -> Self {
        Self {
            id: Sha256::digest(passphrase.as_bytes()).into(),
        }
    }

    pub fn testnet() -> Self {
        Self::new(Self::TESTNET_PASSPHRASE)
    }

    pub fn id(&self) -> &[u8; 32] {
        &self.id
    }
}

// ============================================================================
// Envelope data model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxedAccount {
    Ed25519([u8; 32]),
    Muxed { id: u64, key: [u8; 32] },
}

impl MuxedAccount {
    /// The underlying Ed25519 key regardless of muxing.
    pub fn key(&self) -> &[u8; 32] {
        match self {
            Self::Ed25519(k) => k,
            Self::Muxed { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preconditions {
    None,
    Time { min_time: u64, max_time: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Memo {
    None,
    Text(String),
    Id(u64),
    Hash([u8; 32]),
    Return([u8; 32]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Native,
    Alphanum4 { code: [u8; 4], issuer: [u8; 32] },
    Alphanum12 { code: [u8; 12], issuer: [u8; 32] },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationBody {
    CreateAccount {
        destination: [u8; 32],
        starting_balance: i64,
    },
    Payment {
        destination: MuxedAccount,
        asset: Asset,
        amount: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub source: Option<MuxedAccount>,
    pub body: OperationBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub source: MuxedAccount,
    pub fee: u32,
    pub sequence: i64,
    pub cond: Preconditions,
    pub memo: Memo,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedSignature {
    /// Trailing four bytes of the signer's public key.
    pub hint: [u8; 4],
    pub signature: [u8; 64],
}

/// A v1 transaction envelope: the transaction plus its signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

impl Transaction {
    /// Convenience constructor for a single native-asset payment.
    pub fn payment(
        source: [u8; 32],
        destination: [u8; 32],
        amount: i64,
        sequence: i64,
        fee: u32,
    ) -> Self {
        Self {
            source: MuxedAccount::Ed25519(source),
            fee,
            sequence,
            cond: Preconditions::None,
            memo: Memo::None,
            operations: vec![Operation {
                source: None,
                body: OperationBody::Payment {
                    destination: MuxedAccount::Ed25519(destination),
                    asset: Asset::Native,
                    amount,
                },
            }],
        }
    }
}

// ============================================================================
// Encode / decode
// ============================================================================

impl TransactionEnvelope {
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    /// Decode from the base64 XDR string carried in an intent's `xdr` field.
    pub fn from_xdr(b64: &str) -> Result<Self, EnvelopeError> {
        let bytes = BASE64
            .decode(b64.trim())
            .map_err(|e| EnvelopeError::Base64(e.to_string()))?;
        let mut r = XdrReader::new(&bytes);

        match r.read_u32()? {
            ENVELOPE_TYPE_TX => {}
            other => return Err(EnvelopeError::UnsupportedEnvelopeType(other)),
        }

        let tx = read_transaction(&mut r)?;

        let sig_count = r.read_u32()?;
        if sig_count > MAX_SIGNATURES {
            return Err(EnvelopeError::Xdr(format!(
                "too many signatures: {sig_count}"
            )));
        }
        let mut signatures = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            let hint = r.read_fixed::<4>()?;
            let sig_bytes = r.read_var_bytes(SIGNATURE_LEN)?;
            let signature: [u8; 64] = sig_bytes
                .as_slice()
                .try_into()
                .map_err(|_| EnvelopeError::BadSignatureLength(sig_bytes.len()))?;
            signatures.push(DecoratedSignature { hint, signature });
        }

        if !r.is_done() {
            return Err(EnvelopeError::Xdr("trailing bytes after envelope".into()));
        }

        Ok(Self { tx, signatures })
    }

    /// Encode to the base64 XDR wire form.
    pub fn to_xdr(&self) -> String {
        let mut w = XdrWriter::new();
        w.write_u32(ENVELOPE_TYPE_TX);
        write_transaction(&mut w, &self.tx);
        w.write_u32(self.signatures.len() as u32);
        for sig in &self.signatures {
            w.write_fixed(&sig.hint);
            w.write_var_bytes(&sig.signature);
        }
        BASE64.encode(w.into_bytes())
    }

    /// Transaction hash on the given network: the value that is signed and
    /// that Horizon reports as the transaction id.
    pub fn hash(&self, network: &Network) -> [u8; 32] {
        let mut tx_writer = XdrWriter::new();
        write_transaction(&mut tx_writer, &self.tx);

        let mut hasher = Sha256::new();
        hasher.update(network.id());
        hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
        hasher.update(tx_writer.into_bytes());
        hasher.finalize().into()
    }

    /// Append a decorated signature from `key` over the transaction hash.
    pub fn sign(&mut self, network: &Network, key: &SigningKey) {
        let hash = self.hash(network);
        let sig: Signature = key.sign(&hash);
        let pk = key.verifying_key().to_bytes();
        let hint: [u8; 4] = pk[28..32].try_into().unwrap();
        self.signatures.push(DecoratedSignature {
            hint,
            signature: sig.to_bytes(),
        });
    }

    /// The envelope's source-account Ed25519 key.
    pub fn source_key(&self) -> &[u8; 32] {
        self.tx.source.key()
    }

    /// Verify the envelope's signatures against the source account.
    ///
    /// Requires at least one signature whose hint matches the source key,
    /// and every hint-matching signature must verify over the transaction
    /// hash. Signatures with foreign hints (extra signers) are not checked
    /// here — multisig thresholds are a ledger concern.
    pub fn verify(&self, network: &Network) -> Result<(), EnvelopeError> {
        if self.signatures.is_empty() {
            return Err(EnvelopeError::NoSignatures);
        }

        let source = self.source_key();
        let vk = VerifyingKey::from_bytes(source)
            .map_err(|e| EnvelopeError::InvalidKey(e.to_string()))?;
        let hint: [u8; 4] = source[28..32].try_into().unwrap();
        let hash = self.hash(network);

        let mut matched = false;
        for sig in &self.signatures {
            if sig.hint != hint {
                continue;
            }
            matched = true;
            let signature = Signature::from_bytes(&sig.signature);
            vk.verify(&hash, &signature)
                .map_err(|_| EnvelopeError::InvalidSignature)?;
        }

        if !matched {
            return Err(EnvelopeError::NoSourceSignature);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transaction body codec
// ---------------------------------------------------------------------------

fn read_transaction(r: &mut XdrReader) -> Result<Transaction, EnvelopeError> {
    let source = read_muxed_account(r)?;
    let fee = r.read_u32()?;
    let sequence = r.read_i64()?;

    let cond = match r.read_u32()? {
        PRECOND_NONE => Preconditions::None,
        PRECOND_TIME => Preconditions::Time {
            min_time: r.read_u64()?,
            max_time: r.read_u64()?,
        },
        other => return Err(EnvelopeError::UnsupportedPreconditions(other)),
    };

    let memo = match r.read_u32()? {
        MEMO_NONE => Memo::None,
        MEMO_TEXT => Memo::Text(r.read_string(MEMO_TEXT_MAX)?),
        MEMO_ID => Memo::Id(r.read_u64()?),
        MEMO_HASH => Memo::Hash(r.read_fixed::<32>()?),
        MEMO_RETURN => Memo::Return(r.read_fixed::<32>()?),
        other => return Err(EnvelopeError::UnknownMemo(other)),
    };

    let op_count = r.read_u32()?;
    if op_count > MAX_OPERATIONS {
        return Err(EnvelopeError::Xdr(format!(
            "too many operations: {op_count}"
        )));
    }
    let mut operations = Vec::with_capacity(op_count as usize);
    for _ in 0..op_count {
        operations.push(read_operation(r)?);
    }

    // Transaction ext: reserved union, must be v0.
    match r.read_u32()? {
        0 => {}
        other => return Err(EnvelopeError::Xdr(format!("unknown tx ext: {other}"))),
    }

    Ok(Transaction {
        source,
        fee,
        sequence,
        cond,
        memo,
        operations,
    })
}

fn write_transaction(w: &mut XdrWriter, tx: &Transaction) {
    write_muxed_account(w, &tx.source);
    w.write_u32(tx.fee);
    w.write_i64(tx.sequence);

    match &tx.cond {
        Preconditions::None => w.write_u32(PRECOND_NONE),
        Preconditions::Time { min_time, max_time } => {
            w.write_u32(PRECOND_TIME);
            w.write_u64(*min_time);
            w.write_u64(*max_time);
        }
    }

    match &tx.memo {
        Memo::None => w.write_u32(MEMO_NONE),
        Memo::Text(s) => {
            w.write_u32(MEMO_TEXT);
            w.write_string(s);
        }
        Memo::Id(id) => {
            w.write_u32(MEMO_ID);
            w.write_u64(*id);
        }
        Memo::Hash(h) => {
            w.write_u32(MEMO_HASH);
            w.write_fixed(h);
        }
        Memo::Return(h) => {
            w.write_u32(MEMO_RETURN);
            w.write_fixed(h);
        }
    }

    w.write_u32(tx.operations.len() as u32);
    for op in &tx.operations {
        write_operation(w, op);
    }

    w.write_u32(0); // ext
}

fn read_operation(r: &mut XdrReader) -> Result<Operation, EnvelopeError> {
    let source = if r.read_bool()? {
        Some(read_muxed_account(r)?)
    } else {
        None
    };

    let body = match r.read_u32()? {
        OP_CREATE_ACCOUNT => OperationBody::CreateAccount {
            destination: read_account_id(r)?,
            starting_balance: r.read_i64()?,
        },
        OP_PAYMENT => OperationBody::Payment {
            destination: read_muxed_account(r)?,
            asset: read_asset(r)?,
            amount: r.read_i64()?,
        },
        other => return Err(EnvelopeError::UnsupportedOperation(other)),
    };

    Ok(Operation { source, body })
}

fn write_operation(w: &mut XdrWriter, op: &Operation) {
    match &op.source {
        Some(acc) => {
            w.write_bool(true);
            write_muxed_account(w, acc);
        }
        None => w.write_bool(false),
    }

    match &op.body {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        } => {
            w.write_u32(OP_CREATE_ACCOUNT);
            w.write_u32(KEY_TYPE_ED25519);
            w.write_fixed(destination);
            w.write_i64(*starting_balance);
        }
        OperationBody::Payment {
            destination,
            asset,
            amount,
        } => {
            w.write_u32(OP_PAYMENT);
            write_muxed_account(w, destination);
            write_asset(w, asset);
            w.write_i64(*amount);
        }
    }
}

fn read_muxed_account(r: &mut XdrReader) -> Result<MuxedAccount, EnvelopeError> {
    match r.read_u32()? {
        KEY_TYPE_ED25519 => Ok(MuxedAccount::Ed25519(r.read_fixed::<32>()?)),
        KEY_TYPE_MUXED_ED25519 => Ok(MuxedAccount::Muxed {
            id: r.read_u64()?,
            key: r.read_fixed::<32>()?,
        }),
        other => Err(EnvelopeError::UnknownKeyType(other)),
    }
}

fn write_muxed_account(w: &mut XdrWriter, acc: &MuxedAccount) {
    match acc {
        MuxedAccount::Ed25519(k) => {
            w.write_u32(KEY_TYPE_ED25519);
            w.write_fixed(k);
        }
        MuxedAccount::Muxed { id, key } => {
            w.write_u32(KEY_TYPE_MUXED_ED25519);
            w.write_u64(*id);
            w.write_fixed(key);
        }
    }
}

fn read_account_id(r: &mut XdrReader) -> Result<[u8; 32], EnvelopeError> {
    match r.read_u32()? {
        KEY_TYPE_ED25519 => r.read_fixed::<32>(),
        other => Err(EnvelopeError::UnknownKeyType(other)),
    }
}

fn read_asset(r: &mut XdrReader) -> Result<Asset, EnvelopeError> {
    match r.read_u32()? {
        ASSET_NATIVE => Ok(Asset::Native),
        ASSET_ALPHANUM4 => Ok(Asset::Alphanum4 {
            code: r.read_fixed::<4>()?,
            issuer: read_account_id(r)?,
        }),
        ASSET_ALPHANUM12 => Ok(Asset::Alphanum12 {
            code: r.read_fixed::<12>()?,
            issuer: read_account_id(r)?,
        }),
        other => Err(EnvelopeError::UnknownAsset(other)),
    }
}

fn write_asset(w: &mut XdrWriter, asset: &Asset) {
    match asset {
        Asset::Native => w.write_u32(ASSET_NATIVE),
        Asset::Alphanum4 { code, issuer } => {
            w.write_u32(ASSET_ALPHANUM4);
            w.write_fixed(code);
            w.write_u32(KEY_TYPE_ED25519);
            w.write_fixed(issuer);
        }
        Asset::Alphanum12 { code, issuer } => {
            w.write_u32(ASSET_ALPHANUM12);
            w.write_fixed(code);
            w.write_u32(KEY_TYPE_ED25519);
            w.write_fixed(issuer);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn test_key() -> SigningKey {
        SigningKey::generate(&mut OsRng)
    }

    fn signed_envelope(key: &SigningKey, sequence: i64) -> TransactionEnvelope {
        let source = key.verifying_key().to_bytes();
        let tx = Transaction::payment(source, [7u8; 32], 10_000_000, sequence, 100);
        let mut env = TransactionEnvelope::new(tx);
        env.sign(&Network::testnet(), key);
        env
    }

    #[test]
    fn round_trip_xdr() {
        let key = test_key();
        let env = signed_envelope(&key, 5);
        let b64 = env.to_xdr();
        let decoded = TransactionEnvelope::from_xdr(&b64).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn signed_envelope_verifies() {
        let key = test_key();
        let env = signed_envelope(&key, 5);
        env.verify(&Network::testnet()).unwrap();
    }

    #[test]
    fn unsigned_envelope_rejected() {
        let key = test_key();
        let source = key.verifying_key().to_bytes();
        let env = TransactionEnvelope::new(Transaction::payment(
            source, [7u8; 32], 1, 5, 100,
        ));
        assert!(matches!(
            env.verify(&Network::testnet()),
            Err(EnvelopeError::NoSignatures)
        ));
    }

    #[test]
    fn tampered_signature_rejected() {
        let key = test_key();
        let mut env = signed_envelope(&key, 5);
        env.signatures[0].signature[0] ^= 0xFF;
        assert!(matches!(
            env.verify(&Network::testnet()),
            Err(EnvelopeError::InvalidSignature)
        ));
    }

    #[test]
    fn foreign_signer_only_rejected() {
        let source_key = test_key();
        let other_key = test_key();
        let source = source_key.verifying_key().to_bytes();
        let mut env = TransactionEnvelope::new(Transaction::payment(
            source, [7u8; 32], 1, 5, 100,
        ));
        // Signed, but not by the source account.
        env.sign(&Network::testnet(), &other_key);
        assert!(matches!(
            env.verify(&Network::testnet()),
            Err(EnvelopeError::NoSourceSignature)
        ));
    }

    #[test]
    fn wrong_network_rejected() {
        let key = test_key();
        let env = signed_envelope(&key, 5);
        let public = Network::new(Network::PUBLIC_PASSPHRASE);
        assert!(matches!(
            env.verify(&public),
            Err(EnvelopeError::InvalidSignature)
        ));
    }

    #[test]
    fn hash_differs_per_network() {
        let key = test_key();
        let env = signed_envelope(&key, 5);
        assert_ne!(
            env.hash(&Network::testnet()),
            env.hash(&Network::new(Network::PUBLIC_PASSPHRASE)),
        );
    }

    #[test]
    fn memo_and_timebounds_round_trip() {
        let key = test_key();
        let source = key.verifying_key().to_bytes();
        let mut tx = Transaction::payment(source, [9u8; 32], 42, 11, 200);
        tx.memo = Memo::Text("intentmesh".into());
        tx.cond = Preconditions::Time {
            min_time: 0,
            max_time: 1_900_000_000,
        };
        tx.operations.push(Operation {
            source: Some(MuxedAccount::Muxed {
                id: 3,
                key: source,
            }),
            body: OperationBody::Payment {
                destination: MuxedAccount::Ed25519([1u8; 32]),
                asset: Asset::Alphanum4 {
                    code: *b"USDC",
                    issuer: [2u8; 32],
                },
                amount: 1,
            },
        });
        let env = TransactionEnvelope::new(tx);
        let decoded = TransactionEnvelope::from_xdr(&env.to_xdr()).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn unsupported_envelope_type_rejected() {
        let mut w = XdrWriter::new();
        w.write_u32(5); // ENVELOPE_TYPE_TX_FEE_BUMP
        let b64 = BASE64.encode(w.into_bytes());
        assert!(matches!(
            TransactionEnvelope::from_xdr(&b64),
            Err(EnvelopeError::UnsupportedEnvelopeType(5))
        ));
    }

    #[test]
    fn garbage_base64_rejected() {
        assert!(matches!(
            TransactionEnvelope::from_xdr("not base64!!"),
            Err(EnvelopeError::Base64(_))
        ));
    }

    #[test]
    fn truncated_envelope_rejected() {
        let key = test_key();
        let env = signed_envelope(&key, 5);
        let bytes = BASE64.decode(env.to_xdr()).unwrap();
        let b64 = BASE64.encode(&bytes[..bytes.len() - 8]);
        assert!(TransactionEnvelope::from_xdr(&b64).is_err());
    }
}
