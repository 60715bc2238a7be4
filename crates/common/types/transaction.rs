use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use secp256k1::{
    Message, SECP256K1, SecretKey,
    ecdsa::{RecoverableSignature, RecoveryId},
};
use thiserror::Error;

use ember_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::keccak;

/// Destination of a transaction: a message call or a contract creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

/// A signed transaction (homestead/spurious-dragon wire format).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature values")]
    InvalidValues,
    #[error("signature recovery failed: {0}")]
    Ecdsa(#[from] secp256k1::Error),
}

impl Transaction {
    pub fn compute_hash(&self) -> H256 {
        keccak(self.encode_to_vec())
    }

    /// Chain id bound by the signature per EIP-155, if any.
    pub fn chain_id(&self) -> Option<u64> {
        let v = self.v.as_u64();
        (v >= 35).then(|| (v - 35) / 2)
    }

    /// The recovery parity bit encoded in `v`.
    fn recovery_id(&self) -> Result<i32, SignatureError> {
        let v = self.v.as_u64();
        let parity = match v {
            27 | 28 => v - 27,
            v if v >= 35 => (v - 35) % 2,
            _ => return Err(SignatureError::InvalidValues),
        };
        Ok(parity as i32)
    }

    /// Hash of the unsigned transaction, chain-id bound when the signature
    /// was produced under EIP-155.
    pub fn signing_hash(&self) -> H256 {
        let mut buf = Vec::new();
        let encoder = Encoder::new(&mut buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data);
        match self.chain_id() {
            Some(chain_id) => encoder
                .encode_field(&chain_id)
                .encode_field(&0u8)
                .encode_field(&0u8)
                .finish(),
            None => encoder.finish(),
        }
        keccak(buf)
    }

    /// Recovers the sender address from the signature. Deterministic; the
    /// caller caches it across the block execution.
    pub fn sender(&self) -> Result<Address, SignatureError> {
        if self.r.is_zero() || self.s.is_zero() {
            return Err(SignatureError::InvalidValues);
        }
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r.to_big_endian());
        compact[32..].copy_from_slice(&self.s.to_big_endian());
        let recovery_id = RecoveryId::from_i32(self.recovery_id()?)?;
        let signature = RecoverableSignature::from_compact(&compact, recovery_id)?;
        let message = Message::from_digest(self.signing_hash().0);
        let public_key = SECP256K1.recover_ecdsa(&message, &signature)?;
        let hash = keccak(&public_key.serialize_uncompressed()[1..]);
        Ok(Address::from_slice(&hash.0[12..]))
    }

    /// Signs the transaction in place, binding it to `chain_id` when given
    /// (EIP-155).
    pub fn sign(mut self, secret_key: &SecretKey, chain_id: Option<u64>) -> Self {
        // Temporarily install v so signing_hash picks the right preimage
        self.v = match chain_id {
            Some(chain_id) => U256::from(chain_id * 2 + 35),
            None => U256::from(27),
        };
        let message = Message::from_digest(self.signing_hash().0);
        let signature = SECP256K1.sign_ecdsa_recoverable(&message, secret_key);
        let (recovery_id, compact) = signature.serialize_compact();
        let parity = recovery_id.to_i32() as u64;
        self.r = U256::from_big_endian(&compact[..32]);
        self.s = U256::from_big_endian(&compact[32..]);
        self.v = match chain_id {
            Some(chain_id) => U256::from(chain_id * 2 + 35 + parity),
            None => U256::from(27 + parity),
        };
        self
    }

    /// Maximum wei the sender commits to this transaction up front.
    pub fn up_front_cost(&self) -> U256 {
        self.gas_price
            .saturating_mul(U256::from(self.gas))
            .saturating_add(self.value)
    }

    pub fn is_contract_creation(&self) -> bool {
        matches!(self.to, TxKind::Create)
    }
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            TxKind::Call(address) => address.encode(buf),
            TxKind::Create => Bytes::new().encode(buf),
        }
    }
}

impl RLPDecode for TxKind {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest): (Bytes, _) = RLPDecode::decode_unfinished(rlp)?;
        match bytes.len() {
            0 => Ok((TxKind::Create, rest)),
            20 => Ok((TxKind::Call(Address::from_slice(&bytes)), rest)),
            _ => Err(RLPDecodeError::InvalidLength),
        }
    }
}

impl RLPEncode for Transaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPDecode for Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;
        let tx = Transaction {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            v,
            r,
            s,
        };
        Ok((tx, decoder.finish()?))
    }
}
