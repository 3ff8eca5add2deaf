use serde_json::{json, Map, Value as Json};
use tethys_primitives::{
    ExUnits, RedeemerTag, Redeemers, ScriptRef, ToCanonicalJson,
};

use crate::{utxo::Utxo, Error};

fn script_json(script: &ScriptRef<'_>) -> Json {
    match script {
        ScriptRef::NativeScript(native) => json!({
            "language": "native",
            "json": native.to_json(),
        }),
        ScriptRef::PlutusV1Script(s) => json!({
            "language": "plutus:v1",
            "cbor": hex::encode(s.as_ref()),
        }),
        ScriptRef::PlutusV2Script(s) => json!({
            "language": "plutus:v2",
            "cbor": hex::encode(s.as_ref()),
        }),
        ScriptRef::PlutusV3Script(s) => json!({
            "language": "plutus:v3",
            "cbor": hex::encode(s.as_ref()),
        }),
    }
}

fn value_json(value: &tethys_primitives::Value) -> Json {
    let mut out = Map::new();
    out.insert("ada".into(), json!({ "lovelace": value.coin() }));

    for (policy, assets) in value.canonical_assets() {
        let mut per_policy = Map::new();

        for (name, quantity) in assets {
            per_policy.insert(hex::encode(name.as_slice()), json!(quantity));
        }

        out.insert(policy.to_string(), Json::Object(per_policy));
    }

    Json::Object(out)
}

/// Build the body of a script-evaluation request: the transaction bytes
/// plus any extra utxos the evaluator would not find on-chain
pub fn eval_request(tx_cbor: &[u8], additional: &[Utxo]) -> Json {
    let additional_utxo: Vec<Json> = additional
        .iter()
        .map(|utxo| {
            let mut entry = Map::new();

            entry.insert(
                "transaction".into(),
                json!({ "id": utxo.input.transaction_id.to_string() }),
            );
            entry.insert("index".into(), json!(utxo.input.index));
            entry.insert("address".into(), json!(utxo.address_text));
            entry.insert("value".into(), value_json(utxo.output.value()));

            if let Some(script) = utxo.output.script_ref() {
                entry.insert("script".into(), script_json(script));
            }

            match utxo.output.datum_option() {
                Some(tethys_primitives::DatumOption::Data(wrap)) => {
                    // prefer the cached on-chain bytes over a re-encode
                    let bytes = match wrap.0.raw_cbor() {
                        Some(raw) => raw.to_vec(),
                        None => tethys_codec::minicbor::to_vec(&wrap.0)
                            .expect("plutus data encoding is infallible"),
                    };

                    entry.insert("datum".into(), json!(hex::encode(bytes)));
                }
                _ => {
                    if let Some(hash) = utxo.output.datum_hash() {
                        entry.insert("datumHash".into(), json!(hash.to_string()));
                    }
                }
            }

            Json::Object(entry)
        })
        .collect();

    json!({
        "cbor": hex::encode(tx_cbor),
        "additionalUtxo": additional_utxo,
    })
}

fn redeemer_tag(text: &str) -> Option<RedeemerTag> {
    match text {
        "spend" => Some(RedeemerTag::Spend),
        "mint" => Some(RedeemerTag::Mint),
        "certificate" => Some(RedeemerTag::Cert),
        "withdrawal" => Some(RedeemerTag::Reward),
        "vote" => Some(RedeemerTag::Vote),
        "propose" => Some(RedeemerTag::Propose),
        _ => None,
    }
}

/// Copy the measured budgets of an evaluation response onto the matching
/// redeemers
///
/// Result keys look like `"spend:0"`; keys with an unrecognized tag are
/// skipped, as are budgets for redeemers the transaction doesn't carry.
/// An `EvaluationFailure` payload surfaces as an error.
pub fn apply_evaluation(body: &str, redeemers: &mut Redeemers) -> Result<(), Error> {
    let parsed: Json =
        serde_json::from_str(body).map_err(|e| Error::InvalidJson(e.to_string()))?;

    let result = parsed
        .get("result")
        .ok_or(Error::MissingField("result"))?;

    if let Some(failure) = result.get("EvaluationFailure") {
        return Err(Error::ScriptEvaluationFailure(failure.to_string()));
    }

    let evaluations = result
        .get("EvaluationResult")
        .and_then(|r| r.as_object())
        .ok_or(Error::MissingField("EvaluationResult"))?;

    for (key, budget) in evaluations {
        let Some((tag, index)) = key.split_once(':') else {
            continue;
        };

        let Some(tag) = redeemer_tag(tag) else {
            continue;
        };

        let Ok(index) = index.parse::<u64>() else {
            continue;
        };

        let (Some(mem), Some(steps)) = (
            budget.get("memory").and_then(|m| m.as_u64()),
            budget.get("steps").and_then(|s| s.as_u64()),
        ) else {
            continue;
        };

        redeemers.set_ex_units(tag, index, ExUnits { mem, steps });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethys_primitives::{
        plutus_data::Constr, PlutusData, Redeemer, TransactionInput, TransactionOutput, Value,
    };

    fn spend_redeemer(index: u64) -> Redeemer {
        Redeemer {
            tag: RedeemerTag::Spend,
            index,
            data: PlutusData::Constr(Constr::from_alternative(0, vec![])),
            ex_units: ExUnits::default(),
        }
    }

    #[test]
    fn evaluation_result_sets_matching_ex_units() {
        let mut redeemers = Redeemers::List(vec![spend_redeemer(0)]);

        let body = r#"{"result":{"EvaluationResult":{
            "spend:0":{"memory":2000,"steps":500000}
        }}}"#;

        apply_evaluation(body, &mut redeemers).unwrap();

        assert_eq!(
            redeemers.ex_units_of(RedeemerTag::Spend, 0),
            Some(ExUnits {
                mem: 2000,
                steps: 500_000
            })
        );
    }

    #[test]
    fn unknown_tags_are_skipped_silently() {
        let mut redeemers = Redeemers::List(vec![spend_redeemer(0)]);

        let body = r#"{"result":{"EvaluationResult":{
            "unknown:7":{"memory":1,"steps":1},
            "spend:0":{"memory":9,"steps":9}
        }}}"#;

        apply_evaluation(body, &mut redeemers).unwrap();

        assert_eq!(
            redeemers.ex_units_of(RedeemerTag::Spend, 0),
            Some(ExUnits { mem: 9, steps: 9 })
        );
    }

    #[test]
    fn evaluation_failure_is_an_error() {
        let mut redeemers = Redeemers::List(vec![]);

        let body = r#"{"result":{"EvaluationFailure":{"why":"script says no"}}}"#;

        assert!(matches!(
            apply_evaluation(body, &mut redeemers),
            Err(Error::ScriptEvaluationFailure(_))
        ));
    }

    #[test]
    fn request_payload_carries_tx_and_extra_utxos() {
        let utxo = Utxo {
            input: TransactionInput {
                transaction_id: tethys_primitives::Hash::from([0x11; 32]),
                index: 1,
            },
            output: TransactionOutput::new(
                vec![0x61; 10].into(),
                Value::Coin(2_000_000),
                None,
                None,
            ),
            address_text: "addr_test1xyz".into(),
        };

        let request = eval_request(&[0x84, 0xa0], &[utxo]);

        assert_eq!(request["cbor"], "84a0");
        assert_eq!(request["additionalUtxo"][0]["index"], 1);
        assert_eq!(request["additionalUtxo"][0]["address"], "addr_test1xyz");
        assert_eq!(
            request["additionalUtxo"][0]["value"]["ada"]["lovelace"],
            2_000_000
        );
        assert_eq!(
            request["additionalUtxo"][0]["transaction"]["id"],
            "11".repeat(32)
        );
    }
}
