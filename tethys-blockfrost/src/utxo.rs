use bech32::FromBase32;
use serde_json::Value as Json;
use tethys_codec::minicbor;
use tethys_primitives::{
    value_from_entries, AssetId, CborWrap, Cached, DatumOption, Hash, PlutusData, ScriptRef,
    TransactionInput, TransactionOutput,
};

use crate::Error;

/// One unspent output as the provider reports it
#[derive(Debug, Clone)]
pub struct Utxo {
    pub input: TransactionInput,
    pub output: TransactionOutput<'static>,

    /// The bech32 address string as received, kept around because the
    /// evaluation request wants it back in text form
    pub address_text: String,
}

fn field<'a>(obj: &'a Json, name: &'static str) -> Result<&'a Json, Error> {
    obj.get(name).ok_or(Error::MissingField(name))
}

fn string_field<'a>(obj: &'a Json, name: &'static str) -> Result<&'a str, Error> {
    field(obj, name)?
        .as_str()
        .ok_or(Error::MissingField(name))
}

fn decode_address(text: &str) -> Result<Vec<u8>, Error> {
    let (_hrp, data, _variant) =
        bech32::decode(text).map_err(|e| Error::InvalidAddress(e.to_string()))?;

    Vec::<u8>::from_base32(&data).map_err(|e| Error::InvalidAddress(e.to_string()))
}

fn parse_amount(amount: &Json) -> Result<tethys_primitives::Value, Error> {
    let items = amount
        .as_array()
        .ok_or(Error::MissingField("amount"))?;

    let mut entries = Vec::new();

    for item in items {
        let unit = string_field(item, "unit")?;
        let quantity = string_field(item, "quantity")?;

        let asset = if unit == "lovelace" {
            AssetId::Lovelace
        } else {
            AssetId::from_hex(unit)?
        };

        let quantity: i64 = quantity
            .parse()
            .map_err(|_| Error::InvalidJson(format!("quantity {quantity} is not an integer")))?;

        entries.push((asset, quantity));
    }

    Ok(value_from_entries(entries)?)
}

fn parse_inline_datum(hex_text: &str) -> Result<DatumOption<'static>, Error> {
    let bytes = hex::decode(hex_text).map_err(|e| Error::InvalidHex(e.to_string()))?;

    let data: PlutusData =
        minicbor::decode(&bytes).map_err(|e| Error::InvalidJson(e.to_string()))?;

    // keep the fetched bytes as the cache so later hashing sees exactly
    // what the chain saw
    Ok(DatumOption::Data(CborWrap(Cached::with_owned_raw(
        data, bytes,
    ))))
}

/// Parse the utxo listing for an address into (input, output) pairs
///
/// `resolve_script` maps a `reference_script_hash` to the script itself;
/// the provider implements it with a second endpoint lookup and may
/// legitimately come back empty-handed.
pub fn parse_utxos<F>(body: &str, mut resolve_script: F) -> Result<Vec<Utxo>, Error>
where
    F: FnMut(&str) -> Result<Option<ScriptRef<'static>>, Error>,
{
    let parsed: Json =
        serde_json::from_str(body).map_err(|e| Error::InvalidJson(e.to_string()))?;

    let items = parsed
        .as_array()
        .ok_or_else(|| Error::InvalidJson("utxo response is not an array".into()))?;

    let mut out = Vec::with_capacity(items.len());

    for item in items {
        let address_text = string_field(item, "address")?.to_string();
        let address = decode_address(&address_text)?;

        let tx_hash = string_field(item, "tx_hash")?;
        let transaction_id: Hash<32> = tx_hash
            .parse()
            .map_err(|_| Error::InvalidHex(format!("tx_hash {tx_hash}")))?;

        let index = field(item, "output_index")?
            .as_u64()
            .ok_or(Error::MissingField("output_index"))?;

        let value = parse_amount(field(item, "amount")?)?;

        let datum = match item.get("inline_datum").and_then(|d| d.as_str()) {
            Some(inline) => Some(parse_inline_datum(inline)?),
            None => match item.get("data_hash").and_then(|d| d.as_str()) {
                Some(hash) => Some(DatumOption::Hash(hash.parse().map_err(|_| {
                    Error::InvalidHex(format!("data_hash {hash}"))
                })?)),
                None => None,
            },
        };

        let script_ref = match item.get("reference_script_hash").and_then(|s| s.as_str()) {
            Some(hash) => resolve_script(hash)?,
            None => None,
        };

        out.push(Utxo {
            input: TransactionInput {
                transaction_id,
                index,
            },
            output: TransactionOutput::new(address.into(), value, datum, script_ref),
            address_text,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bech32::ToBase32;
    use tethys_primitives::Fragment;

    fn bech32_address(payload: &[u8]) -> String {
        bech32::encode("addr", payload.to_base32(), bech32::Variant::Bech32).unwrap()
    }

    fn utxo_json(address: &str, extra: &str) -> String {
        format!(
            r#"[{{
                "address": "{address}",
                "tx_hash": "{}",
                "output_index": 2,
                "amount": [
                    {{"unit": "lovelace", "quantity": "1500000"}},
                    {{"unit": "{}6675656c", "quantity": "9"}}
                ]{extra}
            }}]"#,
            "11".repeat(32),
            "22".repeat(28),
        )
    }

    #[test]
    fn utxo_listing_parses_inputs_and_values() {
        let address = bech32_address(&[0x61; 10]);
        let body = utxo_json(&address, "");

        let utxos = parse_utxos(&body, |_| Ok(None)).unwrap();
        assert_eq!(utxos.len(), 1);

        let utxo = &utxos[0];
        assert_eq!(utxo.input.transaction_id, Hash::from([0x11; 32]));
        assert_eq!(utxo.input.index, 2);
        assert_eq!(utxo.output.value().coin(), 1_500_000);
        assert_eq!(
            utxo.output.value().quantity_of(
                &Hash::from([0x22; 28]),
                &"6675656c".parse().unwrap()
            ),
            9
        );
        assert_eq!(utxo.output.address().as_slice(), &[0x61; 10]);
        assert_eq!(utxo.address_text, address);
    }

    #[test]
    fn data_hash_and_inline_datum_map_to_datum_options() {
        let address = bech32_address(&[0x61; 10]);

        let with_hash = utxo_json(
            &address,
            &format!(r#", "data_hash": "{}""#, "33".repeat(32)),
        );
        let utxos = parse_utxos(&with_hash, |_| Ok(None)).unwrap();
        assert_eq!(
            utxos[0].output.datum_hash(),
            Some(&Hash::from([0x33; 32]))
        );

        let with_inline = utxo_json(&address, r#", "inline_datum": "d87980""#);
        let utxos = parse_utxos(&with_inline, |_| Ok(None)).unwrap();
        assert!(utxos[0].output.inline_datum().is_some());

        // the fetched datum bytes survive re-encoding of the output
        let encoded = utxos[0].output.to_cbor().unwrap();
        assert!(hex::encode(encoded).contains("d87980"));
    }

    #[test]
    fn reference_scripts_resolve_through_the_callback() {
        let address = bech32_address(&[0x61; 10]);
        let body = utxo_json(
            &address,
            &format!(r#", "reference_script_hash": "{}""#, "44".repeat(28)),
        );

        let mut asked_for = Vec::new();
        let utxos = parse_utxos(&body, |hash| {
            asked_for.push(hash.to_string());
            Ok(Some(ScriptRef::PlutusV2Script(vec![0xaa].into())))
        })
        .unwrap();

        assert_eq!(asked_for, vec!["44".repeat(28)]);
        assert!(utxos[0].output.script_ref().is_some());
    }

    #[test]
    fn malformed_payloads_surface_typed_errors() {
        assert!(matches!(
            parse_utxos("{", |_| Ok(None)),
            Err(Error::InvalidJson(_))
        ));

        assert!(matches!(
            parse_utxos(r#"[{"address": "not-bech32"}]"#, |_| Ok(None)),
            Err(Error::MissingField("tx_hash")) | Err(Error::InvalidAddress(_))
        ));
    }
}
