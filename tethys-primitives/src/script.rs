use serde::{Deserialize, Serialize};
use serde_json::json;
use tethys_codec::minicbor::{self, Decode, Encode};

use crate::{AddrKeyhash, Bytes, Error, Seq, Slot, ToCanonicalJson};

/// The non-Turing-complete script family: signatures, time locks and
/// k-of-n combinators, `[type, payload...]` on the wire
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum NativeScript {
    ScriptPubkey(AddrKeyhash),
    ScriptAll(Seq<NativeScript>),
    ScriptAny(Seq<NativeScript>),
    ScriptNOfK(u32, Seq<NativeScript>),
    InvalidBefore(Slot),
    InvalidHereafter(Slot),
}

impl<'b, C> minicbor::decode::Decode<'b, C> for NativeScript {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;
        let variant = d.u32()?;

        match variant {
            0 => Ok(NativeScript::ScriptPubkey(d.decode_with(ctx)?)),
            1 => Ok(NativeScript::ScriptAll(d.decode_with(ctx)?)),
            2 => Ok(NativeScript::ScriptAny(d.decode_with(ctx)?)),
            3 => Ok(NativeScript::ScriptNOfK(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            )),
            4 => Ok(NativeScript::InvalidBefore(d.decode_with(ctx)?)),
            5 => Ok(NativeScript::InvalidHereafter(d.decode_with(ctx)?)),
            _ => Err(minicbor::decode::Error::message(
                "unknown variant id for native script",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for NativeScript {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            NativeScript::ScriptPubkey(v) => {
                e.array(2)?;
                e.encode_with(0, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::ScriptAll(v) => {
                e.array(2)?;
                e.encode_with(1, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::ScriptAny(v) => {
                e.array(2)?;
                e.encode_with(2, ctx)?;
                e.encode_with(v, ctx)?;
            }
            NativeScript::ScriptNOfK(n, scripts) => {
                e.array(3)?;
                e.encode_with(3, ctx)?;
                e.encode_with(n, ctx)?;
                e.encode_with(scripts, ctx)?;
            }
            NativeScript::InvalidBefore(slot) => {
                e.array(2)?;
                e.encode_with(4, ctx)?;
                e.encode_with(slot, ctx)?;
            }
            NativeScript::InvalidHereafter(slot) => {
                e.array(2)?;
                e.encode_with(5, ctx)?;
                e.encode_with(slot, ctx)?;
            }
        }

        Ok(())
    }
}

const MAX_JSON_DEPTH: u32 = 256;

impl NativeScript {
    /// Parse the json form the cli tooling and script evaluators use
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidJson(e.to_string()))?;

        Self::from_json_value(&value, 0)
    }

    fn from_json_value(value: &serde_json::Value, depth: u32) -> Result<Self, Error> {
        if depth > MAX_JSON_DEPTH {
            return Err(Error::Decoding(format!(
                "native script json nesting exceeds {MAX_JSON_DEPTH} levels"
            )));
        }

        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidJson("native script node must be an object".into()))?;

        let type_ = obj
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::InvalidJson("native script node is missing its type".into()))?;

        let scripts = |key: &str| -> Result<Seq<NativeScript>, Error> {
            let list = obj
                .get(key)
                .and_then(|s| s.as_array())
                .ok_or_else(|| Error::InvalidJson(format!("expecting a {key} array")))?;

            let parsed: Result<Vec<_>, _> = list
                .iter()
                .map(|x| Self::from_json_value(x, depth + 1))
                .collect();

            Ok(parsed?.into())
        };

        let slot = || -> Result<Slot, Error> {
            obj.get("slot")
                .and_then(|s| s.as_u64())
                .ok_or_else(|| Error::InvalidJson("expecting an unsigned slot number".into()))
        };

        match type_ {
            "sig" => {
                let key_hash = obj
                    .get("keyHash")
                    .and_then(|k| k.as_str())
                    .ok_or_else(|| Error::InvalidJson("expecting a keyHash string".into()))?;

                let key_hash = key_hash
                    .parse()
                    .map_err(|_| Error::InvalidJson("keyHash is not a 28 byte hex hash".into()))?;

                Ok(NativeScript::ScriptPubkey(key_hash))
            }
            "all" => Ok(NativeScript::ScriptAll(scripts("scripts")?)),
            "any" => Ok(NativeScript::ScriptAny(scripts("scripts")?)),
            "atLeast" => {
                let required = obj
                    .get("required")
                    .and_then(|n| n.as_u64())
                    .ok_or_else(|| Error::InvalidJson("expecting a required count".into()))?;

                Ok(NativeScript::ScriptNOfK(
                    required as u32,
                    scripts("scripts")?,
                ))
            }
            "after" => Ok(NativeScript::InvalidBefore(slot()?)),
            "before" => Ok(NativeScript::InvalidHereafter(slot()?)),
            other => Err(Error::InvalidJson(format!(
                "unknown native script type {other}"
            ))),
        }
    }
}

impl ToCanonicalJson for NativeScript {
    fn to_json(&self) -> serde_json::Value {
        match self {
            NativeScript::ScriptPubkey(x) => {
                json!({ "type": "sig", "keyHash": x.to_string() })
            }
            NativeScript::ScriptAll(x) => {
                let scripts: Vec<_> = x.iter().map(|i| i.to_json()).collect();
                json!({ "type": "all", "scripts": scripts })
            }
            NativeScript::ScriptAny(x) => {
                let scripts: Vec<_> = x.iter().map(|i| i.to_json()).collect();
                json!({ "type": "any", "scripts": scripts })
            }
            NativeScript::ScriptNOfK(n, scripts) => {
                let scripts: Vec<_> = scripts.iter().map(|i| i.to_json()).collect();
                json!({ "type": "atLeast", "required": n, "scripts": scripts })
            }
            NativeScript::InvalidBefore(slot) => json!({ "type": "after", "slot": slot }),
            NativeScript::InvalidHereafter(slot) => json!({ "type": "before", "slot": slot }),
        }
    }
}

/// The flat-encoded bytes of a compiled Plutus script
#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[cbor(transparent)]
pub struct PlutusScript<const VERSION: u8>(#[n(0)] pub Bytes);

impl<const VERSION: u8> AsRef<[u8]> for PlutusScript<VERSION> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl<const VERSION: u8> From<Vec<u8>> for PlutusScript<VERSION> {
    fn from(xs: Vec<u8>) -> Self {
        PlutusScript(xs.into())
    }
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[cbor(index_only)]
pub enum Language {
    #[n(0)]
    PlutusV1,

    #[n(1)]
    PlutusV2,

    #[n(2)]
    PlutusV3,
}

impl TryFrom<u64> for Language {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Language::PlutusV1),
            1 => Ok(Language::PlutusV2),
            2 => Ok(Language::PlutusV3),
            _ => Err(Error::InvalidScriptLanguage(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fragment, Hash};

    const AT_LEAST: &str = r#"{
        "type": "atLeast",
        "required": 2,
        "scripts": [
            {
                "type": "sig",
                "keyHash": "966e394a544f242081e41d1965137b1bb412ac230d40ed5407821c37"
            },
            {
                "type": "before",
                "slot": 4000
            }
        ]
    }"#;

    const AT_LEAST_WITH_EXTRA_CLAUSE: &str = r#"{
        "type": "atLeast",
        "required": 2,
        "scripts": [
            {
                "type": "after",
                "slot": 3000
            },
            {
                "type": "sig",
                "keyHash": "966e394a544f242081e41d1965137b1bb412ac230d40ed5407821c37"
            },
            {
                "type": "before",
                "slot": 4000
            }
        ]
    }"#;

    #[test]
    fn n_of_k_parses_from_json() {
        let script = NativeScript::from_json(AT_LEAST).unwrap();

        match &script {
            NativeScript::ScriptNOfK(required, scripts) => {
                assert_eq!(*required, 2);
                assert_eq!(scripts.len(), 2);
                assert_eq!(scripts[1], NativeScript::InvalidHereafter(4000));
            }
            other => panic!("unexpected script {other:?}"),
        }

        // parsing the same document twice gives equal scripts
        assert_eq!(script, NativeScript::from_json(AT_LEAST).unwrap());

        // a different document does not
        assert_ne!(
            script,
            NativeScript::from_json(AT_LEAST_WITH_EXTRA_CLAUSE).unwrap()
        );
    }

    #[test]
    fn json_rendering_inverts_the_parser() {
        let script = NativeScript::from_json(AT_LEAST).unwrap();
        let rendered = script.to_json();

        assert_eq!(rendered["type"], "atLeast");
        assert_eq!(rendered["required"], 2);
        assert_eq!(
            NativeScript::from_json(&rendered.to_string()).unwrap(),
            script
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            NativeScript::from_json("}"),
            Err(Error::InvalidJson(_))
        ));
        assert!(matches!(
            NativeScript::from_json(r#"{"key": "value"}"#),
            Err(Error::InvalidJson(_))
        ));
        assert!(matches!(
            NativeScript::from_json(r#"{"type": "value"}"#),
            Err(Error::InvalidJson(_))
        ));
    }

    #[test]
    fn deeply_nested_json_is_rejected() {
        let mut doc = String::new();
        for _ in 0..300 {
            doc.push_str(r#"{"type": "all", "scripts": ["#);
        }
        doc.push_str(r#"{"type": "after", "slot": 1}"#);
        for _ in 0..300 {
            doc.push_str("]}");
        }

        assert!(NativeScript::from_json(&doc).is_err());
    }

    #[test]
    fn n_of_k_wire_form_is_a_three_element_array() {
        let script = NativeScript::ScriptNOfK(
            2,
            vec![
                NativeScript::ScriptPubkey(Hash::from([0; 28])),
                NativeScript::InvalidBefore(4000),
            ]
            .into(),
        );

        let hex = script.to_cbor_hex().unwrap();
        assert!(hex.starts_with("830302"));

        let decoded = NativeScript::from_cbor(&script.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded, script);
    }

    #[test]
    fn unknown_language_index_is_rejected() {
        assert!(matches!(
            Language::try_from(7),
            Err(Error::InvalidScriptLanguage(7))
        ));
    }
}
