use tethys_codec::minicbor::{self, decode, to_vec, Decode, Encode};
use thiserror::Error;

pub use tethys_codec::utils::{
    Bytes, CborWrap, Cached, EmptyMap, Int, NonEmptySet, NonZeroInt, Nullable, OrderedMap,
    PositiveCoin, Seq, Set, TagWrap,
};
pub use tethys_crypto::Hash;

pub type AddrKeyhash = Hash<28>;
pub type ScriptHash = Hash<28>;
pub type PolicyId = ScriptHash;
pub type PoolKeyhash = Hash<28>;
pub type VrfKeyhash = Hash<32>;
pub type DatumHash = Hash<32>;
pub type TransactionId = Hash<32>;
pub type Coin = u64;
pub type Epoch = u64;
pub type Slot = u64;
pub type RewardAccount = Bytes;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cbor decoding failed: {0}")]
    Decoding(String),

    #[error("cbor encoding failed: {0}")]
    Encoding(String),

    #[error("unexpected cbor type: {0}")]
    UnexpectedCborType(String),

    #[error("invalid cbor value: {0}")]
    InvalidCborValue(String),

    #[error("invalid cbor array size: expected {expected}, found {found}")]
    InvalidCborArraySize { expected: u64, found: u64 },

    #[error("invalid cbor map size: expected {expected}, found {found}")]
    InvalidCborMapSize { expected: u64, found: u64 },

    #[error("invalid hash size: expected {expected} bytes, found {found}")]
    InvalidHashSize { expected: usize, found: usize },

    #[error("invalid ed25519 public key size: {0}")]
    InvalidEd25519PublicKeySize(usize),

    #[error("invalid ed25519 signature size: {0}")]
    InvalidEd25519SignatureSize(usize),

    #[error("metadatum can't be converted: {0}")]
    InvalidMetadatumConversion(String),

    #[error("metadatum byte string of {0} bytes exceeds the 64 byte limit")]
    MetadatumBoundedBytesSize(usize),

    #[error("metadatum text string of {0} bytes exceeds the 64 byte limit")]
    MetadatumTextStringSize(usize),

    #[error("invalid script language: {0}")]
    InvalidScriptLanguage(u64),

    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("loss of precision: {0}")]
    LossOfPrecision(String),
}

/// Uniform cbor entry point for every domain aggregate
pub trait Fragment<'a>
where
    Self: Sized,
{
    fn from_cbor(bytes: &'a [u8]) -> Result<Self, Error>;
    fn to_cbor(&self) -> Result<Vec<u8>, Error>;

    fn to_cbor_hex(&self) -> Result<String, Error> {
        self.to_cbor().map(hex::encode)
    }
}

impl<'a, T> Fragment<'a> for T
where
    T: Encode<()> + Decode<'a, ()> + Sized,
{
    fn from_cbor(bytes: &'a [u8]) -> Result<Self, Error> {
        decode(bytes).map_err(|e| Error::Decoding(e.to_string()))
    }

    fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        to_vec(self).map_err(|e| Error::Encoding(e.to_string()))
    }
}

/// The json rendering that cardano-node and the script evaluators expect
pub trait ToCanonicalJson {
    fn to_json(&self) -> serde_json::Value;
}

/// Network discriminant carried in transaction bodies
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
)]
#[cbor(index_only)]
pub enum NetworkId {
    #[n(0)]
    Testnet,

    #[n(1)]
    Mainnet,
}
