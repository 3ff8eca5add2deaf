//! On-chain primitives and cbor codec for Cardano transactions
//!
//! Handcrafted, idiomatic rust artifacts based on the ledger CDDL for the
//! current era. Every aggregate decodes isomorphically: whatever bytes
//! came in are the bytes that go back out, even when the source encoding
//! was not canonical.

mod framework;

pub mod certs;
pub mod crypto;
pub mod governance;
pub mod metadata;
pub mod plutus_data;
pub mod script;
pub mod tx;
pub mod value;
pub mod witness;

pub use framework::*;

pub use certs::{Anchor, Certificate, DRep, PoolMetadata, RationalNumber, Relay, StakeCredential};
pub use crypto::ToHash;
pub use governance::{
    Constitution, GovAction, GovActionId, ProposalProcedure, Vote, Voter, VotingProcedure,
    VotingProcedures,
};
pub use metadata::{AuxiliaryData, Metadata, Metadatum, PostAlonzoAuxiliaryData};
pub use plutus_data::{BigInt, BoundedBytes, Constr, PlutusData};
pub use script::{Language, NativeScript, PlutusScript};
pub use tx::{
    DatumOption, LegacyTransactionOutput, PostAlonzoTransactionOutput, ScriptRef,
    TransactionBody, TransactionInput, TransactionOutput, Tx,
};
pub use value::{value_from_entries, AssetId, AssetName, Mint, Multiasset, Value};
pub use witness::{
    BootstrapWitness, ExUnits, Redeemer, RedeemerTag, Redeemers, RedeemersKey, RedeemersValue,
    VKeyWitness, WitnessSet,
};
