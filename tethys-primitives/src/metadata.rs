use serde_json::json;
use tethys_codec::minicbor::{self, data::Tag, Decode, Encode};

use crate::{
    script::{NativeScript, PlutusScript},
    Bytes, Error, Int, OrderedMap, Seq,
};

/// Auxiliary-data payloads: ints, bounded strings, lists and maps
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum Metadatum {
    Int(Int),
    Bytes(Bytes),
    Text(String),
    Array(Seq<Metadatum>),
    Map(OrderedMap<Metadatum, Metadatum>),
}

/// The ledger caps metadatum strings at 64 bytes, checked on write only;
/// oversized values that already exist on-chain still decode
pub const MAX_METADATUM_STRING_SIZE: usize = 64;

impl Metadatum {
    /// Walk the tree checking the string bounds the serializer enforces
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Metadatum::Int(_) => Ok(()),
            Metadatum::Bytes(b) => {
                if b.len() > MAX_METADATUM_STRING_SIZE {
                    return Err(Error::MetadatumBoundedBytesSize(b.len()));
                }

                Ok(())
            }
            Metadatum::Text(t) => {
                if t.len() > MAX_METADATUM_STRING_SIZE {
                    return Err(Error::MetadatumTextStringSize(t.len()));
                }

                Ok(())
            }
            Metadatum::Array(items) => items.iter().try_for_each(|x| x.validate()),
            Metadatum::Map(entries) => entries.iter().try_for_each(|(k, v)| {
                k.validate()?;
                v.validate()
            }),
        }
    }

    /// Bounds-checked serialization; this is the entry point that turns
    /// an oversized string into a typed size error instead of an opaque
    /// encoder message
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        self.validate()?;
        minicbor::to_vec(self).map_err(|e| Error::Encoding(e.to_string()))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Metadatum {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            minicbor::data::Type::U8
            | minicbor::data::Type::U16
            | minicbor::data::Type::U32
            | minicbor::data::Type::U64
            | minicbor::data::Type::I8
            | minicbor::data::Type::I16
            | minicbor::data::Type::I32
            | minicbor::data::Type::I64
            | minicbor::data::Type::Int => Ok(Metadatum::Int(d.decode_with(ctx)?)),
            minicbor::data::Type::Bytes | minicbor::data::Type::BytesIndef => {
                Ok(Metadatum::Bytes(d.decode_with(ctx)?))
            }
            minicbor::data::Type::String | minicbor::data::Type::StringIndef => {
                let mut text = String::new();

                for chunk in d.str_iter()? {
                    text.push_str(chunk?);
                }

                Ok(Metadatum::Text(text))
            }
            minicbor::data::Type::Array | minicbor::data::Type::ArrayIndef => {
                Ok(Metadatum::Array(d.decode_with(ctx)?))
            }
            minicbor::data::Type::Map | minicbor::data::Type::MapIndef => {
                Ok(Metadatum::Map(d.decode_with(ctx)?))
            }
            _ => Err(minicbor::decode::Error::message(
                "can't turn data type into metadatum",
            )),
        }
    }
}

impl<C> minicbor::Encode<C> for Metadatum {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Metadatum::Int(a) => {
                e.encode_with(a, ctx)?;
            }
            Metadatum::Bytes(a) => {
                if a.len() > MAX_METADATUM_STRING_SIZE {
                    return Err(minicbor::encode::Error::message(
                        "metadatum byte string exceeds the 64 byte limit",
                    ));
                }

                e.encode_with(a, ctx)?;
            }
            Metadatum::Text(a) => {
                if a.len() > MAX_METADATUM_STRING_SIZE {
                    return Err(minicbor::encode::Error::message(
                        "metadatum text string exceeds the 64 byte limit",
                    ));
                }

                e.encode_with(a, ctx)?;
            }
            Metadatum::Array(a) => {
                e.encode_with(a, ctx)?;
            }
            Metadatum::Map(a) => {
                e.encode_with(a, ctx)?;
            }
        };

        Ok(())
    }
}

pub type MetadatumLabel = u64;

pub type Metadata = OrderedMap<MetadatumLabel, Metadatum>;

const MAX_JSON_DEPTH: u32 = 256;

impl Metadatum {
    /// Json to metadatum: objects become maps with text keys, arrays
    /// become lists, integral numbers become ints, strings become text
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidJson(e.to_string()))?;

        Self::from_json_value(&value, 0)
    }

    pub fn from_json_value(value: &serde_json::Value, depth: u32) -> Result<Self, Error> {
        if depth > MAX_JSON_DEPTH {
            return Err(Error::Decoding(format!(
                "metadatum json nesting exceeds {MAX_JSON_DEPTH} levels"
            )));
        }

        match value {
            serde_json::Value::Object(entries) => {
                let converted: Result<Vec<_>, _> = entries
                    .iter()
                    .map(|(k, v)| {
                        Self::from_json_value(v, depth + 1)
                            .map(|v| (Metadatum::Text(k.clone()), v))
                    })
                    .collect();

                Ok(Metadatum::Map(converted?.into()))
            }
            serde_json::Value::Array(items) => {
                let converted: Result<Vec<_>, _> = items
                    .iter()
                    .map(|x| Self::from_json_value(x, depth + 1))
                    .collect();

                Ok(Metadatum::Array(converted?.into()))
            }
            serde_json::Value::String(s) => Ok(Metadatum::Text(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(x) = n.as_i64() {
                    Ok(Metadatum::Int(x.into()))
                } else if let Some(x) = n.as_u64() {
                    Ok(Metadatum::Int(x.into()))
                } else {
                    Err(Error::LossOfPrecision(format!(
                        "{n} is not an integral number"
                    )))
                }
            }
            other => Err(Error::InvalidJson(format!(
                "{other} has no metadatum equivalent"
            ))),
        }
    }

    /// Metadatum to json; byte strings have no json rendering and int
    /// map keys degrade to their decimal strings
    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        match self {
            Metadatum::Int(x) => {
                let value = i128::from(*x);

                if let Ok(v) = i64::try_from(value) {
                    Ok(json!(v))
                } else if let Ok(v) = u64::try_from(value) {
                    Ok(json!(v))
                } else {
                    Err(Error::LossOfPrecision(format!(
                        "{value} does not fit a json number"
                    )))
                }
            }
            Metadatum::Bytes(_) => Err(Error::InvalidMetadatumConversion(
                "byte strings have no json representation".into(),
            )),
            Metadatum::Text(t) => Ok(json!(t)),
            Metadatum::Array(items) => {
                let converted: Result<Vec<_>, _> = items.iter().map(|x| x.to_json()).collect();
                Ok(serde_json::Value::Array(converted?))
            }
            Metadatum::Map(entries) => {
                let mut out = serde_json::Map::new();

                for (key, value) in entries.iter() {
                    let key = match key {
                        Metadatum::Text(t) => t.clone(),
                        Metadatum::Int(i) => i.to_string(),
                        _ => {
                            return Err(Error::InvalidMetadatumConversion(
                                "map keys must be text or int".into(),
                            ))
                        }
                    };

                    out.insert(key, value.to_json()?);
                }

                Ok(serde_json::Value::Object(out))
            }
        }
    }
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, Clone)]
#[cbor(map)]
pub struct PostAlonzoAuxiliaryData {
    #[n(0)]
    pub metadata: Option<Metadata>,

    #[n(1)]
    pub native_scripts: Option<Vec<NativeScript>>,

    #[n(2)]
    pub plutus_v1_scripts: Option<Vec<PlutusScript<1>>>,

    #[n(3)]
    pub plutus_v2_scripts: Option<Vec<PlutusScript<2>>>,

    #[n(4)]
    pub plutus_v3_scripts: Option<Vec<PlutusScript<3>>>,
}

/// Tag applied to the map-shaped auxiliary data since Alonzo
const AUX_DATA_TAG: u64 = 259;

/// The three generations of auxiliary data, all still on-chain
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AuxiliaryData {
    Shelley(Metadata),
    ShelleyMa {
        transaction_metadata: Metadata,
        auxiliary_scripts: Option<Seq<NativeScript>>,
    },
    PostAlonzo(PostAlonzoAuxiliaryData),
}

impl<'b, C> minicbor::Decode<'b, C> for AuxiliaryData {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            minicbor::data::Type::Map | minicbor::data::Type::MapIndef => {
                Ok(AuxiliaryData::Shelley(d.decode_with(ctx)?))
            }
            minicbor::data::Type::Array | minicbor::data::Type::ArrayIndef => {
                d.array()?;
                let transaction_metadata = d.decode_with(ctx)?;
                let auxiliary_scripts = d.decode_with(ctx)?;

                Ok(AuxiliaryData::ShelleyMa {
                    transaction_metadata,
                    auxiliary_scripts,
                })
            }
            minicbor::data::Type::Tag => {
                let tag = d.tag()?;

                if tag.as_u64() != AUX_DATA_TAG {
                    return Err(minicbor::decode::Error::message(
                        "invalid tag for auxiliary data",
                    ));
                }

                Ok(AuxiliaryData::PostAlonzo(d.decode_with(ctx)?))
            }
            _ => Err(minicbor::decode::Error::message(
                "can't infer auxiliary data variant from data type",
            )),
        }
    }
}

impl<C> minicbor::Encode<C> for AuxiliaryData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            AuxiliaryData::Shelley(m) => {
                e.encode_with(m, ctx)?;
            }
            AuxiliaryData::ShelleyMa {
                transaction_metadata,
                auxiliary_scripts,
            } => {
                e.array(2)?;
                e.encode_with(transaction_metadata, ctx)?;
                e.encode_with(auxiliary_scripts, ctx)?;
            }
            AuxiliaryData::PostAlonzo(v) => {
                e.tag(Tag::new(AUX_DATA_TAG))?;
                e.encode_with(v, ctx)?;
            }
        };

        Ok(())
    }
}

// serde on auxiliary data rides on the cbor hex rather than a structural
// rendering, mirroring how wallets exchange it
impl serde::Serialize for AuxiliaryData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = minicbor::to_vec(self).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex::encode(bytes))
    }
}

impl<'de> serde::Deserialize<'de> for AuxiliaryData {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(text).map_err(serde::de::Error::custom)?;
        minicbor::decode(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fragment;

    #[test]
    fn oversized_strings_fail_on_write_not_read() {
        let long_text = Metadatum::Text("x".repeat(65));
        assert!(matches!(
            long_text.to_cbor(),
            Err(Error::MetadatumTextStringSize(65))
        ));

        let long_bytes = Metadatum::Bytes(vec![0; 65].into());
        assert!(matches!(
            long_bytes.to_cbor(),
            Err(Error::MetadatumBoundedBytesSize(65))
        ));

        // the same values already on-chain still decode
        let mut encoded = vec![0x78, 65];
        encoded.extend("x".repeat(65).as_bytes());
        let decoded = Metadatum::from_cbor(&encoded).unwrap();
        assert_eq!(decoded, Metadatum::Text("x".repeat(65)));
    }

    #[test]
    fn bound_is_inclusive_at_64() {
        let edge = Metadatum::Text("x".repeat(64));
        assert!(edge.to_cbor().is_ok());
    }

    #[test]
    fn json_bridge_roundtrips_nested_documents() {
        let doc = r#"{"k":[1,"two",{"nested":3}]}"#;
        let metadatum = Metadatum::from_json(doc).unwrap();

        match &metadatum {
            Metadatum::Map(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].0, Metadatum::Text("k".into()));
            }
            other => panic!("unexpected metadatum {other:?}"),
        }

        let rendered = metadatum.to_json().unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(doc).unwrap();
        assert_eq!(rendered, reparsed);
    }

    #[test]
    fn bytes_have_no_json_rendering() {
        let metadatum = Metadatum::Map(
            vec![(
                Metadatum::Text("blob".into()),
                Metadatum::Bytes(vec![1, 2, 3].into()),
            )]
            .into(),
        );

        assert!(matches!(
            metadatum.to_json(),
            Err(Error::InvalidMetadatumConversion(_))
        ));
    }

    #[test]
    fn json_floats_are_a_precision_loss() {
        assert!(matches!(
            Metadatum::from_json("1.5"),
            Err(Error::LossOfPrecision(_))
        ));
    }

    #[test]
    fn json_booleans_are_invalid() {
        assert!(matches!(
            Metadatum::from_json("true"),
            Err(Error::InvalidJson(_))
        ));
    }

    #[test]
    fn int_map_keys_render_as_decimal_strings() {
        let metadatum = Metadatum::Map(
            vec![(Metadatum::Int(7i64.into()), Metadatum::Text("seven".into()))].into(),
        );

        assert_eq!(metadatum.to_json().unwrap(), serde_json::json!({"7": "seven"}));
    }

    #[test]
    fn metadata_roundtrips_under_a_label() {
        let metadata: Metadata = vec![(
            674u64,
            Metadatum::Map(
                vec![(
                    Metadatum::Text("msg".into()),
                    Metadatum::Text("hello".into()),
                )]
                .into(),
            ),
        )]
        .into();

        let bytes = Fragment::to_cbor(&metadata).unwrap();
        assert_eq!(Metadata::from_cbor(&bytes).unwrap(), metadata);
    }

    #[test]
    fn post_alonzo_auxiliary_data_carries_tag_259() {
        let aux = AuxiliaryData::PostAlonzo(PostAlonzoAuxiliaryData {
            metadata: None,
            native_scripts: None,
            plutus_v1_scripts: None,
            plutus_v2_scripts: Some(vec![vec![0xaa].into()]),
            plutus_v3_scripts: None,
        });

        let bytes = Fragment::to_cbor(&aux).unwrap();
        assert!(hex::encode(&bytes).starts_with("d90103"));
        assert_eq!(AuxiliaryData::from_cbor(&bytes).unwrap(), aux);
    }
}
