use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tethys_codec::minicbor::{self, data::Tag};

use crate::{Bytes, Int, OrderedMap, Seq, ToCanonicalJson};

/// Bignum tags from rfc 8949
const POS_BIGNUM_TAG: u64 = 2;
const NEG_BIGNUM_TAG: u64 = 3;

/// Constructor alternatives 0..=6 ride on tags 121..=127
const COMPACT_CONSTR_BASE: u64 = 121;

/// Constructor alternatives 7..=127 ride on tags 1280..=1400
const EXTENDED_CONSTR_BASE: u64 = 1280;

/// Anything beyond rides on tag 102 as `[alternative, fields]`
const GENERAL_CONSTR_TAG: u64 = 102;

fn is_constr_tag(tag: u64) -> bool {
    tag == GENERAL_CONSTR_TAG || (121..=127).contains(&tag) || (1280..=1400).contains(&tag)
}

/// Whether the pending item is an integer of any width
fn is_integer(ty: minicbor::data::Type) -> bool {
    use minicbor::data::Type;

    matches!(
        ty,
        Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::Int
    )
}

/// The algebraic datatype passed to and returned from Plutus scripts
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum PlutusData {
    Constr(Constr<PlutusData>),
    Map(OrderedMap<PlutusData, PlutusData>),
    BigInt(BigInt),
    BoundedBytes(BoundedBytes),
    Array(Seq<PlutusData>),
}

impl<'b, C> minicbor::decode::Decode<'b, C> for PlutusData {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        use minicbor::data::Type;

        match d.datatype()? {
            Type::Map | Type::MapIndef => Ok(Self::Map(d.decode_with(ctx)?)),
            Type::Array | Type::ArrayIndef => Ok(Self::Array(d.decode_with(ctx)?)),
            Type::Bytes | Type::BytesIndef => Ok(Self::BoundedBytes(d.decode_with(ctx)?)),
            Type::Tag => {
                let tag = d.probe().tag()?.as_u64();

                if is_constr_tag(tag) {
                    Ok(Self::Constr(d.decode_with(ctx)?))
                } else if tag == POS_BIGNUM_TAG || tag == NEG_BIGNUM_TAG {
                    Ok(Self::BigInt(d.decode_with(ctx)?))
                } else {
                    Err(minicbor::decode::Error::message(format!(
                        "tag {tag} does not begin any plutus data variant"
                    )))
                }
            }
            ty if is_integer(ty) => Ok(Self::BigInt(d.decode_with(ctx)?)),
            other => Err(minicbor::decode::Error::message(format!(
                "cbor type {other:?} does not map to plutus data"
            ))),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for PlutusData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Self::Constr(x) => x.encode(e, ctx),
            Self::Map(x) => x.encode(e, ctx),
            Self::BigInt(x) => x.encode(e, ctx),
            Self::BoundedBytes(x) => x.encode(e, ctx),
            Self::Array(x) => x.encode(e, ctx),
        }
    }
}

/// An integer of any width: a native cbor int on the wire whenever the
/// value fits, a tag 2/3 big-endian magnitude beyond 64 bits
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum BigInt {
    Int(Int),
    BigUInt(BoundedBytes),
    BigNInt(BoundedBytes),
}

impl BigInt {
    /// Picks the narrowest encoding: native ints up to 64 bits, a bignum
    /// magnitude beyond that. Explicitly built `BigUInt` / `BigNInt`
    /// values keep their form on the wire.
    pub fn from_i128(value: i128) -> Self {
        match minicbor::data::Int::try_from(value) {
            Ok(x) => BigInt::Int(x.into()),
            Err(_) if value >= 0 => BigInt::BigUInt(magnitude(value as u128).into()),
            Err(_) => BigInt::BigNInt(magnitude((-1 - value) as u128).into()),
        }
    }

    /// The numeric value, when it fits a signed 128-bit integer
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            BigInt::Int(x) => Some(i128::from(*x)),
            BigInt::BigUInt(m) => be_magnitude(m).and_then(|m| i128::try_from(m).ok()),
            BigInt::BigNInt(m) => be_magnitude(m)
                .and_then(|m| i128::try_from(m).ok())
                .map(|m| -1 - m),
        }
    }
}

fn magnitude(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(15);
    bytes[start..].to_vec()
}

fn be_magnitude(bytes: &[u8]) -> Option<u128> {
    let trimmed: &[u8] = {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        &bytes[start..]
    };

    if trimmed.len() > 16 {
        return None;
    }

    Some(
        trimmed
            .iter()
            .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)),
    )
}

impl From<i64> for BigInt {
    fn from(x: i64) -> Self {
        BigInt::Int(x.into())
    }
}

impl From<u64> for BigInt {
    fn from(x: u64) -> Self {
        BigInt::Int(x.into())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for BigInt {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        if is_integer(d.datatype()?) {
            return Ok(Self::Int(d.decode_with(ctx)?));
        }

        if d.datatype()? != minicbor::data::Type::Tag {
            return Err(minicbor::decode::Error::message(
                "expecting an int or a bignum tag",
            ));
        }

        match d.tag()?.as_u64() {
            POS_BIGNUM_TAG => Ok(Self::BigUInt(d.decode_with(ctx)?)),
            NEG_BIGNUM_TAG => Ok(Self::BigNInt(d.decode_with(ctx)?)),
            other => Err(minicbor::decode::Error::message(format!(
                "tag {other} is not a bignum tag"
            ))),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for BigInt {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            BigInt::Int(x) => x.encode(e, ctx),
            BigInt::BigUInt(m) => {
                e.tag(Tag::new(POS_BIGNUM_TAG))?;
                m.encode(e, ctx)
            }
            BigInt::BigNInt(m) => {
                e.tag(Tag::new(NEG_BIGNUM_TAG))?;
                m.encode(e, ctx)
            }
        }
    }
}

/// A constructor application: which alternative, and its fields
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct Constr<A> {
    pub tag: u64,
    pub any_constructor: Option<u64>,
    pub fields: Seq<A>,
}

impl<A> Constr<A> {
    pub fn from_alternative(alternative: u64, fields: Vec<A>) -> Self {
        let (tag, any_constructor) = match alternative {
            0..=6 => (COMPACT_CONSTR_BASE + alternative, None),
            7..=127 => (EXTENDED_CONSTR_BASE + alternative - 7, None),
            _ => (GENERAL_CONSTR_TAG, Some(alternative)),
        };

        Constr {
            tag,
            any_constructor,
            fields: fields.into(),
        }
    }

    /// The reverse of the tag windows above
    pub fn alternative(&self) -> Option<u64> {
        match self.tag {
            GENERAL_CONSTR_TAG => self.any_constructor,
            121..=127 => Some(self.tag - COMPACT_CONSTR_BASE),
            1280..=1400 => Some(self.tag - EXTENDED_CONSTR_BASE + 7),
            _ => None,
        }
    }
}

impl<'b, C, A> minicbor::decode::Decode<'b, C> for Constr<A>
where
    A: minicbor::decode::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let tag = d.tag()?.as_u64();

        if !is_constr_tag(tag) {
            return Err(minicbor::decode::Error::message(format!(
                "tag {tag} is not a constructor tag"
            )));
        }

        if tag != GENERAL_CONSTR_TAG {
            return Ok(Constr {
                tag,
                any_constructor: None,
                fields: d.decode_with(ctx)?,
            });
        }

        d.array()?;

        Ok(Constr {
            tag,
            any_constructor: Some(d.u64()?),
            fields: d.decode_with(ctx)?,
        })
    }
}

impl<C, A> minicbor::encode::Encode<C> for Constr<A>
where
    A: minicbor::encode::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.tag(Tag::new(self.tag))?;

        if self.tag == GENERAL_CONSTR_TAG {
            e.array(2)?;
            e.u64(self.any_constructor.unwrap_or_default())?;
        }

        self.fields.encode(e, ctx)
    }
}

/// Plutus byte strings; long ones go out as chunked indefinite strings
/// so hashes line up with the on-chain serializer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BoundedBytes(Bytes);

/// Chunk width the on-chain serializer splits long byte strings at
const BYTES_CHUNK_SIZE: usize = 64;

impl BoundedBytes {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Vec<u8>> for BoundedBytes {
    fn from(xs: Vec<u8>) -> Self {
        BoundedBytes(xs.into())
    }
}

impl From<BoundedBytes> for Vec<u8> {
    fn from(b: BoundedBytes) -> Self {
        b.0.into()
    }
}

impl Deref for BoundedBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl fmt::Display for BoundedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<C> minicbor::encode::Encode<C> for BoundedBytes {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let payload = self.as_slice();

        if payload.len() <= BYTES_CHUNK_SIZE {
            e.bytes(payload)?;
            return Ok(());
        }

        e.begin_bytes()?;

        for chunk in payload.chunks(BYTES_CHUNK_SIZE) {
            e.bytes(chunk)?;
        }

        e.end()?;
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for BoundedBytes {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        // chunk reassembly is the byte container's problem
        Ok(BoundedBytes(d.decode_with(ctx)?))
    }
}

// inferred from the script-data rendering in cardano-node
impl ToCanonicalJson for PlutusData {
    fn to_json(&self) -> serde_json::Value {
        match self {
            PlutusData::Constr(x) => {
                let fields: Vec<_> = x.fields.iter().map(|i| i.to_json()).collect();
                json!({ "constructor": x.alternative(), "fields": fields })
            }
            PlutusData::Map(x) => {
                let map: Vec<_> = x
                    .iter()
                    .map(|(k, v)| json!({ "k": k.to_json(), "v": v.to_json() }))
                    .collect();
                json!({ "map": map })
            }
            PlutusData::BigInt(x) => match x.as_i128() {
                Some(n) => json!({ "int": n }),
                None => match x {
                    BigInt::BigUInt(m) => json!({ "biguint": hex::encode(m.as_slice()) }),
                    BigInt::BigNInt(m) => json!({ "bignint": hex::encode(m.as_slice()) }),
                    BigInt::Int(_) => unreachable!("native ints always fit i128"),
                },
            },
            PlutusData::BoundedBytes(x) => json!({ "bytes": hex::encode(x.as_slice()) }),
            PlutusData::Array(x) => {
                let list: Vec<_> = x.iter().map(|i| i.to_json()).collect();
                json!({ "list": list })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fragment;
    use proptest::{prelude::*, strategy::Just};
    use test_case::test_case;

    #[test_case(0 => "d87980"; "alternative 0 rides on tag 121")]
    #[test_case(3 => "d87c80"; "alternative 3 rides on tag 124")]
    #[test_case(6 => "d87f80"; "alternative 6 rides on tag 127")]
    #[test_case(7 => "d9050080"; "alternative 7 rides on tag 1280")]
    #[test_case(10 => "d9050380"; "alternative 10 rides on tag 1283")]
    #[test_case(127 => "d9057880"; "alternative 127 rides on tag 1400")]
    fn constr_tag_mapping(alt: u64) -> String {
        let data = PlutusData::Constr(Constr::from_alternative(alt, vec![]));
        data.to_cbor_hex().unwrap()
    }

    #[test]
    fn large_alternatives_fall_back_to_tag_102() {
        let data = PlutusData::Constr(Constr::from_alternative(
            200,
            vec![PlutusData::BigInt(1u64.into())],
        ));

        // 102([200, [1]])
        assert_eq!(data.to_cbor_hex().unwrap(), "d8668218c88101");

        let decoded = PlutusData::from_cbor(&data.to_cbor().unwrap()).unwrap();
        match &decoded {
            PlutusData::Constr(c) => assert_eq!(c.alternative(), Some(200)),
            other => panic!("unexpected plutus data {other:?}"),
        }
    }

    #[test]
    fn alternative_is_the_inverse_of_from_alternative() {
        for alt in [0, 3, 6, 7, 66, 127, 128, 5000] {
            let constr = Constr::<PlutusData>::from_alternative(alt, vec![]);
            assert_eq!(constr.alternative(), Some(alt));
        }
    }

    #[test]
    fn long_byte_strings_chunk_at_64_bytes() {
        let data = PlutusData::BoundedBytes(BoundedBytes::from(vec![0xab; 65]));
        let bytes = data.to_cbor().unwrap();

        // indefinite header, one 64-byte chunk, one 1-byte chunk, break
        assert_eq!(bytes[0], 0x5f);
        assert_eq!(*bytes.last().unwrap(), 0xff);

        assert_eq!(PlutusData::from_cbor(&bytes).unwrap(), data);
    }

    #[test]
    fn bignum_tags_preserve_their_form() {
        // 2(h'010000000000000000') is u64::MAX + 1
        let bytes = hex::decode("c249010000000000000000").unwrap();
        let data = PlutusData::from_cbor(&bytes).unwrap();

        match &data {
            PlutusData::BigInt(x) => {
                assert_eq!(x.as_i128(), Some(1 + u64::MAX as i128));
            }
            other => panic!("unexpected plutus data {other:?}"),
        }

        assert_eq!(data.to_cbor().unwrap(), bytes);
    }

    #[test]
    fn from_i128_narrows_when_possible() {
        assert!(matches!(BigInt::from_i128(42), BigInt::Int(_)));
        assert!(matches!(BigInt::from_i128(-42), BigInt::Int(_)));
        assert!(matches!(
            BigInt::from_i128(i128::from(u64::MAX) + 1),
            BigInt::BigUInt(_)
        ));
        assert!(matches!(
            BigInt::from_i128(-2 - i128::from(u64::MAX)),
            BigInt::BigNInt(_)
        ));

        for value in [0i128, -1, 42, i128::from(u64::MAX) + 7, -3 - i128::from(u64::MAX)] {
            assert_eq!(BigInt::from_i128(value).as_i128(), Some(value));
        }
    }

    #[test]
    fn unassigned_tags_are_rejected() {
        // 31(0) is nobody's plutus data
        let bytes = hex::decode("d81f00").unwrap();
        assert!(PlutusData::from_cbor(&bytes).is_err());
    }

    #[test]
    fn canonical_json_shape() {
        let data = PlutusData::Constr(Constr::from_alternative(
            1,
            vec![
                PlutusData::BigInt(4u64.into()),
                PlutusData::BoundedBytes(BoundedBytes::from(vec![0xca, 0xfe])),
            ],
        ));

        assert_eq!(
            data.to_json(),
            json!({ "constructor": 1, "fields": [{ "int": 4 }, { "bytes": "cafe" }] })
        );
    }

    prop_compose! {
        fn any_bounded_bytes()(
            bytes in prop::collection::vec(any::<u8>(), 0..96),
        ) -> BoundedBytes {
            BoundedBytes::from(bytes)
        }
    }

    fn any_bigint() -> impl Strategy<Value = BigInt> {
        prop_oneof![
            any::<i64>().prop_map(|i| BigInt::Int(i.into())),
            any_bounded_bytes().prop_map(BigInt::BigUInt),
            any_bounded_bytes().prop_map(BigInt::BigNInt),
        ]
    }

    fn any_constr(depth: u8) -> impl Strategy<Value = Constr<PlutusData>> {
        let any_constr_tag = prop_oneof![
            (Just(102), any::<u64>().prop_map(Some)),
            (121_u64..=127, Just(None)),
            (1280_u64..=1400, Just(None))
        ];

        let any_fields = prop::collection::vec(any_plutus_data(depth - 1), 0..depth as usize);

        (any_constr_tag, any_fields, any::<bool>()).prop_map(
            |((tag, any_constructor), fields, is_def)| Constr {
                tag,
                any_constructor,
                fields: if is_def {
                    Seq::Def(fields)
                } else {
                    Seq::Indef(fields)
                },
            },
        )
    }

    fn any_plutus_data(depth: u8) -> BoxedStrategy<PlutusData> {
        let int = any_bigint().prop_map(PlutusData::BigInt);

        let bytes = any_bounded_bytes().prop_map(PlutusData::BoundedBytes);

        if depth > 0 {
            let constr = any_constr(depth).prop_map(PlutusData::Constr);

            let array = (
                any::<bool>(),
                prop::collection::vec(any_plutus_data(depth - 1), 0..depth as usize),
            )
                .prop_map(|(is_def, xs)| {
                    PlutusData::Array(if is_def { Seq::Def(xs) } else { Seq::Indef(xs) })
                });

            prop_oneof![int, bytes, constr, array].boxed()
        } else {
            prop_oneof![int, bytes].boxed()
        }
    }

    proptest! {
        #[test]
        fn cbor_roundtrip(original in any_plutus_data(3)) {
            let bytes = original.to_cbor().unwrap();
            let decoded = PlutusData::from_cbor(&bytes).unwrap();
            prop_assert_eq!(decoded, original);
        }
    }
}
