use serde::{Deserialize, Serialize};
use tethys_codec::minicbor::{self, Decode, Encode};

use crate::{
    certs::Certificate,
    governance::{ProposalProcedure, VotingProcedures},
    script::{NativeScript, PlutusScript},
    value::{Mint, Value},
    witness::WitnessSet,
    AddrKeyhash, Bytes, Cached, CborWrap, Coin, DatumHash, Hash, NetworkId, NonEmptySet, Nullable,
    OrderedMap, PlutusData, PositiveCoin, RewardAccount, Set,
};

/// A pointer at an unspent output: which transaction, which output slot
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    Hash,
)]
pub struct TransactionInput {
    #[n(0)]
    pub transaction_id: crate::TransactionId,

    #[n(1)]
    pub index: u64,
}

// datum_option = [0, $hash32 // 1, data]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum DatumOption<'b> {
    Hash(DatumHash),
    Data(CborWrap<Cached<'b, PlutusData>>),
}

impl<'b, C> minicbor::decode::Decode<'b, C> for DatumOption<'b> {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;
        let variant = d.u16()?;

        match variant {
            0 => Ok(DatumOption::Hash(d.decode_with(ctx)?)),
            1 => Ok(DatumOption::Data(d.decode_with(ctx)?)),
            _ => Err(minicbor::decode::Error::message(
                "invalid variant id for datum option",
            )),
        }
    }
}

impl<'b, C> minicbor::encode::Encode<C> for DatumOption<'b> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            DatumOption::Hash(a) => {
                e.array(2)?;
                e.encode_with(0, ctx)?;
                e.encode_with(a, ctx)?;
            }
            DatumOption::Data(a) => {
                e.array(2)?;
                e.encode_with(1, ctx)?;
                e.encode_with(a, ctx)?;
            }
        }

        Ok(())
    }
}

// script = [0, native_script // 1, plutus_v1 // 2, plutus_v2 // 3, plutus_v3]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum ScriptRef<'b> {
    NativeScript(Cached<'b, NativeScript>),
    PlutusV1Script(PlutusScript<1>),
    PlutusV2Script(PlutusScript<2>),
    PlutusV3Script(PlutusScript<3>),
}

impl<'b, C> minicbor::decode::Decode<'b, C> for ScriptRef<'b> {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;
        let variant = d.u16()?;

        match variant {
            0 => Ok(ScriptRef::NativeScript(d.decode_with(ctx)?)),
            1 => Ok(ScriptRef::PlutusV1Script(d.decode_with(ctx)?)),
            2 => Ok(ScriptRef::PlutusV2Script(d.decode_with(ctx)?)),
            3 => Ok(ScriptRef::PlutusV3Script(d.decode_with(ctx)?)),
            _ => Err(minicbor::decode::Error::message(
                "invalid variant id for script ref",
            )),
        }
    }
}

impl<'b, C> minicbor::encode::Encode<C> for ScriptRef<'b> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            ScriptRef::NativeScript(a) => {
                e.array(2)?;
                e.encode_with(0, ctx)?;
                e.encode_with(a, ctx)?;
            }
            ScriptRef::PlutusV1Script(a) => {
                e.array(2)?;
                e.encode_with(1, ctx)?;
                e.encode_with(a, ctx)?;
            }
            ScriptRef::PlutusV2Script(a) => {
                e.array(2)?;
                e.encode_with(2, ctx)?;
                e.encode_with(a, ctx)?;
            }
            ScriptRef::PlutusV3Script(a) => {
                e.array(2)?;
                e.encode_with(3, ctx)?;
                e.encode_with(a, ctx)?;
            }
        }

        Ok(())
    }
}

/// The array-shaped output of the early eras; datum only by hash
#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct LegacyTransactionOutput {
    #[n(0)]
    pub address: Bytes,

    #[n(1)]
    pub amount: Value,

    #[n(2)]
    pub datum_hash: Option<DatumHash>,
}

/// The map-shaped output with integer keys; the only form able to carry
/// inline datums and script references
#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[cbor(map)]
pub struct PostAlonzoTransactionOutput<'b> {
    #[n(0)]
    pub address: Bytes,

    #[n(1)]
    pub value: Value,

    #[b(2)]
    pub datum_option: Option<Cached<'b, DatumOption<'b>>>,

    #[n(3)]
    pub script_ref: Option<CborWrap<ScriptRef<'b>>>,
}

/// Either output shape, dispatched on the cbor datatype
///
/// Some producers have been observed emitting the legacy array form with
/// an inline datum in the hash slot. That combination is invalid on
/// write, but it exists on-chain, so it is accepted here with a warning
/// and modelled as the post-Alonzo variant; the cache keeps the original
/// bytes for re-encoding.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum TransactionOutput<'b> {
    Legacy(Cached<'b, LegacyTransactionOutput>),
    PostAlonzo(Cached<'b, PostAlonzoTransactionOutput<'b>>),
}

impl<'b> TransactionOutput<'b> {
    /// Picks the minimal wire form supporting the present fields
    pub fn new(
        address: Bytes,
        value: Value,
        datum: Option<DatumOption<'b>>,
        script_ref: Option<ScriptRef<'b>>,
    ) -> Self {
        match (datum, script_ref) {
            (None, None) => TransactionOutput::Legacy(
                LegacyTransactionOutput {
                    address,
                    amount: value,
                    datum_hash: None,
                }
                .into(),
            ),
            (Some(DatumOption::Hash(hash)), None) => TransactionOutput::Legacy(
                LegacyTransactionOutput {
                    address,
                    amount: value,
                    datum_hash: Some(hash),
                }
                .into(),
            ),
            (datum, script_ref) => TransactionOutput::PostAlonzo(
                PostAlonzoTransactionOutput {
                    address,
                    value,
                    datum_option: datum.map(Cached::from),
                    script_ref: script_ref.map(CborWrap),
                }
                .into(),
            ),
        }
    }

    pub fn address(&self) -> &Bytes {
        match self {
            TransactionOutput::Legacy(x) => &x.address,
            TransactionOutput::PostAlonzo(x) => &x.address,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            TransactionOutput::Legacy(x) => &x.amount,
            TransactionOutput::PostAlonzo(x) => &x.value,
        }
    }

    pub fn datum_hash(&self) -> Option<&DatumHash> {
        match self {
            TransactionOutput::Legacy(x) => x.datum_hash.as_ref(),
            TransactionOutput::PostAlonzo(x) => match x.datum_option.as_deref() {
                Some(DatumOption::Hash(hash)) => Some(hash),
                _ => None,
            },
        }
    }

    pub fn inline_datum(&self) -> Option<&PlutusData> {
        match self {
            TransactionOutput::Legacy(_) => None,
            TransactionOutput::PostAlonzo(x) => match x.datum_option.as_deref() {
                Some(DatumOption::Data(wrap)) => Some(&wrap.0),
                _ => None,
            },
        }
    }

    pub fn datum_option(&self) -> Option<&DatumOption<'b>> {
        match self {
            TransactionOutput::Legacy(_) => None,
            TransactionOutput::PostAlonzo(x) => x.datum_option.as_deref(),
        }
    }

    pub fn script_ref(&self) -> Option<&ScriptRef<'b>> {
        match self {
            TransactionOutput::Legacy(_) => None,
            TransactionOutput::PostAlonzo(x) => x.script_ref.as_ref().map(|x| &x.0),
        }
    }
}

/// Peek whether an array-shaped output smuggles an inline datum in its
/// third slot instead of a 32-byte hash
fn array_output_has_inline_datum(d: &minicbor::Decoder<'_>) -> bool {
    let mut probe = d.clone();

    let Ok(len) = probe.array() else { return false };

    if len == Some(2) {
        return false;
    }

    if probe.skip().is_err() || probe.skip().is_err() {
        return false;
    }

    match probe.datatype() {
        Ok(minicbor::data::Type::Bytes) => probe.bytes().map(|b| b.len() != 32).unwrap_or(false),
        Ok(minicbor::data::Type::Break) => false,
        Ok(_) => true,
        Err(_) => false,
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for TransactionOutput<'b> {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            minicbor::data::Type::Map | minicbor::data::Type::MapIndef => {
                Ok(TransactionOutput::PostAlonzo(d.decode_with(ctx)?))
            }
            minicbor::data::Type::Array | minicbor::data::Type::ArrayIndef => {
                if !array_output_has_inline_datum(d) {
                    return Ok(TransactionOutput::Legacy(d.decode_with(ctx)?));
                }

                tracing::warn!("array-shaped output carries an inline datum");

                let all = d.input();
                let start = d.position();

                let len = d.array()?;
                let address = d.decode_with(ctx)?;
                let value = d.decode_with(ctx)?;

                let wrapped = d.datatype()? == minicbor::data::Type::Tag
                    && matches!(d.probe().tag(), Ok(t) if t.as_u64() == 24);

                let datum = if wrapped {
                    d.decode_with(ctx)?
                } else {
                    CborWrap(d.decode_with(ctx)?)
                };

                if len.is_none() {
                    if d.datatype()? != minicbor::data::Type::Break {
                        return Err(minicbor::decode::Error::message(
                            "array-shaped output with trailing items",
                        ));
                    }

                    d.set_position(d.position() + 1);
                }

                let inner = PostAlonzoTransactionOutput {
                    address,
                    value,
                    datum_option: Some(Cached::from(DatumOption::Data(datum))),
                    script_ref: None,
                };

                Ok(TransactionOutput::PostAlonzo(Cached::with_raw(
                    inner,
                    &all[start..d.position()],
                )))
            }
            _ => Err(minicbor::decode::Error::message(
                "unknown cbor data type for transaction output",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for TransactionOutput<'_> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            TransactionOutput::Legacy(x) => {
                e.encode_with(x, ctx)?;
            }
            TransactionOutput::PostAlonzo(x) => {
                e.encode_with(x, ctx)?;
            }
        }

        Ok(())
    }
}

pub type RequiredSigners = NonEmptySet<AddrKeyhash>;

pub type Withdrawals = OrderedMap<RewardAccount, Coin>;

/// Everything a transaction commits to, integer-keyed on the wire
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone)]
#[cbor(map)]
pub struct TransactionBody<'b> {
    #[n(0)]
    pub inputs: Set<TransactionInput>,

    #[b(1)]
    pub outputs: Vec<TransactionOutput<'b>>,

    #[n(2)]
    pub fee: Coin,

    #[n(3)]
    pub ttl: Option<u64>,

    #[n(4)]
    pub certificates: Option<NonEmptySet<Certificate>>,

    #[n(5)]
    pub withdrawals: Option<Withdrawals>,

    #[n(7)]
    pub auxiliary_data_hash: Option<Hash<32>>,

    #[n(8)]
    pub validity_interval_start: Option<u64>,

    #[n(9)]
    pub mint: Option<Mint>,

    #[n(11)]
    pub script_data_hash: Option<Hash<32>>,

    #[n(13)]
    pub collateral: Option<NonEmptySet<TransactionInput>>,

    #[n(14)]
    pub required_signers: Option<RequiredSigners>,

    #[n(15)]
    pub network_id: Option<NetworkId>,

    #[n(16)]
    pub collateral_return: Option<TransactionOutput<'b>>,

    #[n(17)]
    pub total_collateral: Option<Coin>,

    #[n(18)]
    pub reference_inputs: Option<NonEmptySet<TransactionInput>>,

    #[n(19)]
    pub voting_procedures: Option<VotingProcedures>,

    #[n(20)]
    pub proposal_procedures: Option<NonEmptySet<ProposalProcedure>>,

    #[n(21)]
    pub treasury_value: Option<Coin>,

    #[n(22)]
    pub donation: Option<PositiveCoin>,
}

impl Default for TransactionBody<'_> {
    fn default() -> Self {
        Self {
            inputs: Vec::new().into(),
            outputs: Vec::new(),
            fee: 0,
            ttl: None,
            certificates: None,
            withdrawals: None,
            auxiliary_data_hash: None,
            validity_interval_start: None,
            mint: None,
            script_data_hash: None,
            collateral: None,
            required_signers: None,
            network_id: None,
            collateral_return: None,
            total_collateral: None,
            reference_inputs: None,
            voting_procedures: None,
            proposal_procedures: None,
            treasury_value: None,
            donation: None,
        }
    }
}

/// A full transaction: body, witnesses, validity flag, auxiliary data
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Clone)]
pub struct Tx<'b> {
    #[b(0)]
    pub transaction_body: Cached<'b, TransactionBody<'b>>,

    #[b(1)]
    pub transaction_witness_set: Cached<'b, WitnessSet<'b>>,

    #[n(2)]
    pub success: bool,

    #[b(3)]
    pub auxiliary_data: Nullable<Cached<'b, crate::AuxiliaryData>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plutus_data::Constr, Fragment};

    fn address() -> Bytes {
        let mut raw = vec![0x61];
        raw.extend([7u8; 28]);
        raw.into()
    }

    #[test]
    fn minimal_output_picks_the_legacy_form() {
        let output = TransactionOutput::new(address(), Value::Coin(5), None, None);

        assert!(matches!(output, TransactionOutput::Legacy(_)));
        // array of two: address, coin
        assert!(output.to_cbor_hex().unwrap().starts_with("82"));
    }

    #[test]
    fn datum_hash_still_fits_the_legacy_form() {
        let output = TransactionOutput::new(
            address(),
            Value::Coin(5),
            Some(DatumOption::Hash(Hash::from([1; 32]))),
            None,
        );

        assert!(matches!(output, TransactionOutput::Legacy(_)));
        assert_eq!(output.datum_hash(), Some(&Hash::from([1; 32])));
    }

    #[test]
    fn inline_datum_forces_the_map_form() {
        let datum = PlutusData::Constr(Constr::from_alternative(0, vec![]));
        let output = TransactionOutput::new(
            address(),
            Value::Coin(5),
            Some(DatumOption::Data(CborWrap(datum.into()))),
            None,
        );

        assert!(matches!(output, TransactionOutput::PostAlonzo(_)));
        // map of three: address, value, datum option
        assert!(output.to_cbor_hex().unwrap().starts_with("a3"));

        let bytes = output.to_cbor().unwrap();
        let decoded = TransactionOutput::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, output);
        assert!(decoded.inline_datum().is_some());
    }

    #[test]
    fn script_ref_forces_the_map_form() {
        let script = ScriptRef::PlutusV2Script(vec![0xaa, 0xbb].into());
        let output = TransactionOutput::new(address(), Value::Coin(5), None, Some(script));

        assert!(matches!(output, TransactionOutput::PostAlonzo(_)));
        assert!(output.script_ref().is_some());

        let bytes = output.to_cbor().unwrap();
        assert_eq!(TransactionOutput::from_cbor(&bytes).unwrap(), output);
    }

    #[test]
    fn legacy_output_with_inline_datum_is_accepted_with_its_bytes() {
        // [address, 5, 121([])] instead of a datum hash
        let mut bytes = vec![0x83];
        bytes.push(0x58);
        bytes.push(29);
        bytes.extend(address().as_slice());
        bytes.push(0x05);
        bytes.extend(hex::decode("d87980").unwrap());

        let output = TransactionOutput::from_cbor(&bytes).unwrap();

        assert!(matches!(output, TransactionOutput::PostAlonzo(_)));
        assert!(output.inline_datum().is_some());

        // the odd source bytes survive re-encoding untouched
        assert_eq!(output.to_cbor().unwrap(), bytes);
    }

    #[test]
    fn body_with_optional_fields_roundtrips() {
        let input = TransactionInput {
            transaction_id: Hash::from([3; 32]),
            index: 1,
        };

        let body = TransactionBody {
            inputs: vec![input].into(),
            outputs: vec![TransactionOutput::new(address(), Value::Coin(7), None, None)],
            fee: 120,
            ttl: Some(500),
            reference_inputs: Some(vec![input].try_into().unwrap()),
            ..Default::default()
        };

        let bytes = body.to_cbor().unwrap();
        let decoded = TransactionBody::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, body);

        // absent optionals leave no key behind: inputs, outputs, fee,
        // ttl, reference inputs
        assert!(body.to_cbor_hex().unwrap().starts_with("a5"));
    }

    #[test]
    fn input_ordering_follows_id_then_index() {
        let a = TransactionInput {
            transaction_id: Hash::from([1; 32]),
            index: 9,
        };
        let b = TransactionInput {
            transaction_id: Hash::from([2; 32]),
            index: 0,
        };

        assert!(a < b);

        let set = Set::sorted(vec![b, a]);
        assert_eq!(set[0], a);
    }
}
