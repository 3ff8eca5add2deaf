use serde::{Deserialize, Serialize};
use tethys_codec::minicbor::{self, Decode, Encode};

use crate::{
    script::{NativeScript, PlutusScript},
    Bytes, Cached, NonEmptySet, OrderedMap, PlutusData,
};

/// An ed25519 key and a signature made with it
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct VKeyWitness {
    pub vkey: Bytes,
    pub signature: Bytes,
}

pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;
pub const ED25519_SIGNATURE_SIZE: usize = 64;

impl<'b, C> minicbor::decode::Decode<'b, C> for VKeyWitness {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;

        let vkey: Bytes = d.decode_with(ctx)?;

        if vkey.len() != ED25519_PUBLIC_KEY_SIZE {
            return Err(minicbor::decode::Error::message(
                "invalid ed25519 public key size in vkey witness",
            ));
        }

        let signature: Bytes = d.decode_with(ctx)?;

        if signature.len() != ED25519_SIGNATURE_SIZE {
            return Err(minicbor::decode::Error::message(
                "invalid ed25519 signature size in vkey witness",
            ));
        }

        Ok(VKeyWitness { vkey, signature })
    }
}

impl<C> minicbor::encode::Encode<C> for VKeyWitness {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(&self.vkey, ctx)?;
        e.encode_with(&self.signature, ctx)?;

        Ok(())
    }
}

/* bootstrap_witness =
[ public_key : $vkey
, signature  : $signature
, chain_code : bytes .size 32
, attributes : bytes
] */

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct BootstrapWitness {
    #[n(0)]
    pub public_key: Bytes,

    #[n(1)]
    pub signature: Bytes,

    #[n(2)]
    pub chain_code: Bytes,

    #[n(3)]
    pub attributes: Bytes,
}

/// Execution budget: memory units and cpu steps
#[derive(
    Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default,
)]
pub struct ExUnits {
    #[n(0)]
    pub mem: u64,

    #[n(1)]
    pub steps: u64,
}

#[derive(
    Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord,
)]
#[cbor(index_only)]
pub enum RedeemerTag {
    #[n(0)]
    Spend,

    #[n(1)]
    Mint,

    #[n(2)]
    Cert,

    #[n(3)]
    Reward,

    #[n(4)]
    Vote,

    #[n(5)]
    Propose,
}

/// A witness unlocking one scripted action, with its cost accounting
#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Redeemer {
    #[n(0)]
    pub tag: RedeemerTag,

    #[n(1)]
    pub index: u64,

    #[n(2)]
    pub data: PlutusData,

    #[n(3)]
    pub ex_units: ExUnits,
}

#[derive(
    Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord,
)]
pub struct RedeemersKey {
    #[n(0)]
    pub tag: RedeemerTag,

    #[n(1)]
    pub index: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct RedeemersValue {
    #[n(0)]
    pub data: PlutusData,

    #[n(1)]
    pub ex_units: ExUnits,
}

/// Redeemers come in two wire shapes: the historical flat list and the
/// keyed map; both survive round-trips unchanged
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum Redeemers {
    List(Vec<Redeemer>),
    Map(OrderedMap<RedeemersKey, RedeemersValue>),
}

impl Redeemers {
    pub fn len(&self) -> usize {
        match self {
            Redeemers::List(x) => x.len(),
            Redeemers::Map(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ex_units_of(&self, tag: RedeemerTag, index: u64) -> Option<ExUnits> {
        match self {
            Redeemers::List(items) => items
                .iter()
                .find(|r| r.tag == tag && r.index == index)
                .map(|r| r.ex_units),
            Redeemers::Map(items) => items
                .lookup(&RedeemersKey { tag, index })
                .map(|v| v.ex_units),
        }
    }

    /// Copy a measured budget onto the matching redeemer; reports whether
    /// one was found
    pub fn set_ex_units(&mut self, tag: RedeemerTag, index: u64, ex_units: ExUnits) -> bool {
        match self {
            Redeemers::List(items) => {
                for redeemer in items.iter_mut() {
                    if redeemer.tag == tag && redeemer.index == index {
                        redeemer.ex_units = ex_units;
                        return true;
                    }
                }

                false
            }
            Redeemers::Map(items) => {
                let entries = match items {
                    OrderedMap::Def(x) => x,
                    OrderedMap::Indef(x) => x,
                };

                for (key, value) in entries.iter_mut() {
                    if key.tag == tag && key.index == index {
                        value.ex_units = ex_units;
                        return true;
                    }
                }

                false
            }
        }
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for Redeemers {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            minicbor::data::Type::Array | minicbor::data::Type::ArrayIndef => {
                Ok(Redeemers::List(d.decode_with(ctx)?))
            }
            minicbor::data::Type::Map | minicbor::data::Type::MapIndef => {
                Ok(Redeemers::Map(d.decode_with(ctx)?))
            }
            _ => Err(minicbor::decode::Error::message(
                "unknown cbor data type for redeemers",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for Redeemers {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Redeemers::List(x) => {
                e.encode_with(x, ctx)?;
            }
            Redeemers::Map(x) => {
                e.encode_with(x, ctx)?;
            }
        }

        Ok(())
    }
}

/// Everything that can vouch for a transaction, integer-keyed on the wire
///
/// Each set-valued field remembers on its own whether the source bytes
/// carried tag 258, and the plutus data and redeemer fields additionally
/// keep their raw bytes, since script data hashes are computed over the
/// exact on-chain encoding.
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Clone)]
#[cbor(map)]
pub struct WitnessSet<'b> {
    #[n(0)]
    pub vkeywitness: Option<NonEmptySet<VKeyWitness>>,

    #[b(1)]
    pub native_script: Option<NonEmptySet<Cached<'b, NativeScript>>>,

    #[n(2)]
    pub bootstrap_witness: Option<NonEmptySet<BootstrapWitness>>,

    #[n(3)]
    pub plutus_v1_script: Option<NonEmptySet<PlutusScript<1>>>,

    #[b(4)]
    pub plutus_data: Option<Cached<'b, NonEmptySet<Cached<'b, PlutusData>>>>,

    #[b(5)]
    pub redeemer: Option<Cached<'b, Redeemers>>,

    #[n(6)]
    pub plutus_v2_script: Option<NonEmptySet<PlutusScript<2>>>,

    #[n(7)]
    pub plutus_v3_script: Option<NonEmptySet<PlutusScript<3>>>,
}

impl Default for WitnessSet<'_> {
    fn default() -> Self {
        Self {
            vkeywitness: None,
            native_script: None,
            bootstrap_witness: None,
            plutus_v1_script: None,
            plutus_data: None,
            redeemer: None,
            plutus_v2_script: None,
            plutus_v3_script: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plutus_data::Constr, Fragment};

    fn spend_redeemer(index: u64) -> Redeemer {
        Redeemer {
            tag: RedeemerTag::Spend,
            index,
            data: PlutusData::Constr(Constr::from_alternative(0, vec![])),
            ex_units: ExUnits::default(),
        }
    }

    #[test]
    fn vkey_witness_sizes_are_checked_on_decode() {
        // 31-byte key
        let mut bytes = vec![0x82, 0x58, 31];
        bytes.extend([0u8; 31]);
        bytes.push(0x58);
        bytes.push(64);
        bytes.extend([0u8; 64]);

        assert!(VKeyWitness::from_cbor(&bytes).is_err());

        let good = VKeyWitness {
            vkey: vec![1; 32].into(),
            signature: vec![2; 64].into(),
        };

        let decoded = VKeyWitness::from_cbor(&good.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded, good);
    }

    #[test]
    fn set_ex_units_targets_one_redeemer() {
        let mut redeemers = Redeemers::List(vec![spend_redeemer(0), spend_redeemer(1)]);

        let budget = ExUnits {
            mem: 2000,
            steps: 500_000,
        };

        assert!(redeemers.set_ex_units(RedeemerTag::Spend, 1, budget));
        assert!(!redeemers.set_ex_units(RedeemerTag::Mint, 0, budget));

        assert_eq!(
            redeemers.ex_units_of(RedeemerTag::Spend, 1),
            Some(budget)
        );
        assert_eq!(
            redeemers.ex_units_of(RedeemerTag::Spend, 0),
            Some(ExUnits::default())
        );
    }

    #[test]
    fn redeemers_keep_their_wire_shape() {
        let as_list = Redeemers::List(vec![spend_redeemer(0)]);
        let bytes = as_list.to_cbor().unwrap();
        assert!(matches!(
            Redeemers::from_cbor(&bytes).unwrap(),
            Redeemers::List(_)
        ));

        let as_map = Redeemers::Map(
            vec![(
                RedeemersKey {
                    tag: RedeemerTag::Spend,
                    index: 0,
                },
                RedeemersValue {
                    data: PlutusData::Constr(Constr::from_alternative(0, vec![])),
                    ex_units: ExUnits::default(),
                },
            )]
            .into(),
        );

        let bytes = as_map.to_cbor().unwrap();
        assert!(matches!(
            Redeemers::from_cbor(&bytes).unwrap(),
            Redeemers::Map(_)
        ));
    }

    #[test]
    fn witness_set_restores_the_set_tag_per_field() {
        let witness = VKeyWitness {
            vkey: vec![1; 32].into(),
            signature: vec![2; 64].into(),
        };

        // {0: 258([witness])}
        let mut tagged = vec![0xa1, 0x00, 0xd9, 0x01, 0x02];
        tagged.extend(minicbor::to_vec(vec![witness.clone()]).unwrap());

        // {0: [witness]}
        let mut plain = vec![0xa1, 0x00];
        plain.extend(minicbor::to_vec(vec![witness]).unwrap());

        let from_tagged = WitnessSet::from_cbor(&tagged).unwrap();
        let from_plain = WitnessSet::from_cbor(&plain).unwrap();

        assert_eq!(from_tagged.to_cbor().unwrap(), tagged);
        assert_eq!(from_plain.to_cbor().unwrap(), plain);
    }

    #[test]
    fn plutus_data_keeps_its_original_bytes() {
        // {4: 258([121([])])}
        let bytes = hex::decode("a104d9010281d87980").unwrap();
        let witness_set = WitnessSet::from_cbor(&bytes).unwrap();

        assert_eq!(witness_set.to_cbor().unwrap(), bytes);

        let data = witness_set.plutus_data.as_ref().unwrap();
        assert_eq!(data.raw_cbor(), Some(&bytes[2..]));
    }
}
