use std::{collections::BTreeMap, fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};
use tethys_codec::minicbor;

use crate::{Bytes, Coin, Error, NonZeroInt, OrderedMap, PolicyId};

/// An asset name, at most 32 bytes long
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct AssetName(Bytes);

pub const MAX_ASSET_NAME_SIZE: usize = 32;

impl AssetName {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl TryFrom<Vec<u8>> for AssetName {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        if value.len() > MAX_ASSET_NAME_SIZE {
            return Err(Error::InvalidCborValue(format!(
                "asset name of {} bytes exceeds the 32 byte limit",
                value.len()
            )));
        }

        Ok(AssetName(value.into()))
    }
}

impl FromStr for AssetName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidCborValue(e.to_string()))?;
        Self::try_from(bytes)
    }
}

impl Deref for AssetName {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AssetName {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes: Bytes = d.decode_with(ctx)?;

        if bytes.len() > MAX_ASSET_NAME_SIZE {
            return Err(minicbor::decode::Error::message(
                "asset name exceeds the 32 byte limit",
            ));
        }

        Ok(AssetName(bytes))
    }
}

impl<C> minicbor::Encode<C> for AssetName {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with(&self.0, ctx)?;
        Ok(())
    }
}

pub type Multiasset<A> = OrderedMap<PolicyId, OrderedMap<AssetName, A>>;

pub type Mint = Multiasset<NonZeroInt>;

/// A coin amount plus the non-ADA tokens riding along with it
///
/// Decoding accepts any policy/asset ordering; encoding recomputes the
/// canonical one (policies and names in lexicographic order, zero
/// quantities and empty policies dropped, the whole multi-asset collapsed
/// away when nothing is left). Exact bytes of a non-canonical source are
/// the concern of the cache wrapper at the output level, not of this type.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Value {
    Coin(Coin),
    Multiasset(Coin, Multiasset<i64>),
}

impl Value {
    pub fn coin(&self) -> Coin {
        match self {
            Value::Coin(c) => *c,
            Value::Multiasset(c, _) => *c,
        }
    }

    pub fn set_coin(&mut self, coin: Coin) {
        match self {
            Value::Coin(c) => *c = coin,
            Value::Multiasset(c, _) => *c = coin,
        }
    }

    pub fn multiasset(&self) -> Option<&Multiasset<i64>> {
        match self {
            Value::Coin(_) => None,
            Value::Multiasset(_, ma) => Some(ma),
        }
    }

    /// The quantity of one asset, zero when absent
    pub fn quantity_of(&self, policy: &PolicyId, name: &AssetName) -> i64 {
        self.multiasset()
            .and_then(|ma| ma.lookup(policy))
            .and_then(|assets| assets.lookup(name))
            .copied()
            .unwrap_or(0)
    }

    fn flatten(&self) -> BTreeMap<(PolicyId, AssetName), i64> {
        let mut out = BTreeMap::new();

        if let Value::Multiasset(_, ma) = self {
            for (policy, assets) in ma.iter() {
                for (name, quantity) in assets.iter() {
                    *out.entry((*policy, name.clone())).or_insert(0) += quantity;
                }
            }
        }

        out
    }

    fn from_flat(coin: Coin, flat: BTreeMap<(PolicyId, AssetName), i64>) -> Value {
        if flat.is_empty() {
            return Value::Coin(coin);
        }

        let mut grouped: BTreeMap<PolicyId, Vec<(AssetName, i64)>> = BTreeMap::new();

        for ((policy, name), quantity) in flat {
            grouped.entry(policy).or_default().push((name, quantity));
        }

        let multiasset = grouped
            .into_iter()
            .map(|(policy, assets)| (policy, OrderedMap::Def(assets)))
            .collect::<Vec<_>>();

        Value::Multiasset(coin, OrderedMap::Def(multiasset))
    }

    /// Componentwise sum; quantities that cancel out stay in place as
    /// zeroes until [Value::normalize] prunes them
    pub fn add(&self, other: &Value) -> Value {
        let mut flat = self.flatten();

        for (key, quantity) in other.flatten() {
            *flat.entry(key).or_insert(0) += quantity;
        }

        Value::from_flat(self.coin().saturating_add(other.coin()), flat)
    }

    /// Componentwise difference; quantities may go negative, which is
    /// what minting arithmetic relies on
    pub fn subtract(&self, other: &Value) -> Value {
        let mut flat = self.flatten();

        for (key, quantity) in other.flatten() {
            *flat.entry(key).or_insert(0) -= quantity;
        }

        Value::from_flat(self.coin().saturating_sub(other.coin()), flat)
    }

    /// Drop zero quantities and empty policies, sort what remains
    pub fn normalize(&self) -> Value {
        let mut flat = self.flatten();
        flat.retain(|_, quantity| *quantity != 0);

        Value::from_flat(self.coin(), flat)
    }

    /// The multi-asset content in canonical order, zero quantities and
    /// empty policies dropped; this is what the serializer writes
    pub fn canonical_assets(&self) -> Vec<(PolicyId, Vec<(AssetName, i64)>)> {
        let mut flat = self.flatten();
        flat.retain(|_, quantity| *quantity != 0);

        let mut grouped: BTreeMap<PolicyId, Vec<(AssetName, i64)>> = BTreeMap::new();

        for ((policy, name), quantity) in flat {
            grouped.entry(policy).or_default().push((name, quantity));
        }

        grouped.into_iter().collect()
    }
}

impl From<Coin> for Value {
    fn from(coin: Coin) -> Self {
        Value::Coin(coin)
    }
}

// a value with an empty multi-asset is the same money as the bare coin
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.coin() == other.coin() && self.canonical_assets() == other.canonical_assets()
    }
}

impl Eq for Value {}

impl<'b, C> minicbor::decode::Decode<'b, C> for Value {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            minicbor::data::Type::U8
            | minicbor::data::Type::U16
            | minicbor::data::Type::U32
            | minicbor::data::Type::U64 => Ok(Value::Coin(d.u64()?)),
            minicbor::data::Type::Array | minicbor::data::Type::ArrayIndef => {
                d.array()?;
                let coin = d.u64()?;
                let multiasset = d.decode_with(ctx)?;
                Ok(Value::Multiasset(coin, multiasset))
            }
            _ => Err(minicbor::decode::Error::message(
                "unknown cbor data type for value",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for Value {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let entries = self.canonical_assets();

        if entries.is_empty() {
            e.u64(self.coin())?;
            return Ok(());
        }

        e.array(2)?;
        e.u64(self.coin())?;
        e.map(entries.len() as u64)?;

        for (policy, assets) in entries {
            e.encode_with(policy, ctx)?;
            e.map(assets.len() as u64)?;

            for (name, quantity) in assets {
                e.encode_with(name, ctx)?;
                e.i64(quantity)?;
            }
        }

        Ok(())
    }
}

/// Either the ADA pseudo-asset or a concrete (policy, name) pair
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetId {
    Lovelace,
    Asset(PolicyId, AssetName),
}

impl AssetId {
    /// Parse the `policy || name` hex concatenation used by indexers
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidCborValue(e.to_string()))?;

        if bytes.len() < 28 {
            return Err(Error::InvalidHashSize {
                expected: 28,
                found: bytes.len(),
            });
        }

        let policy = PolicyId::try_from(&bytes[..28]).map_err(|_| Error::InvalidHashSize {
            expected: 28,
            found: bytes.len(),
        })?;
        let name = AssetName::try_from(bytes[28..].to_vec())?;

        Ok(AssetId::Asset(policy, name))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Lovelace => f.write_str("lovelace"),
            AssetId::Asset(policy, name) => write!(f, "{policy}{name}"),
        }
    }
}

/// Build a value out of (asset, quantity) pairs, the shape indexer
/// responses come in
pub fn value_from_entries(
    entries: impl IntoIterator<Item = (AssetId, i64)>,
) -> Result<Value, Error> {
    let mut coin: Coin = 0;
    let mut flat = BTreeMap::new();

    for (asset, quantity) in entries {
        match asset {
            AssetId::Lovelace => {
                coin = u64::try_from(quantity)
                    .map_err(|_| Error::InvalidCborValue("negative lovelace amount".into()))?;
            }
            AssetId::Asset(policy, name) => {
                *flat.entry((policy, name)).or_insert(0) += quantity;
            }
        }
    }

    Ok(Value::from_flat(coin, flat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fragment;
    use proptest::prelude::*;

    fn policy(byte: u8) -> PolicyId {
        PolicyId::from([byte; 28])
    }

    fn name(bytes: &[u8]) -> AssetName {
        AssetName::try_from(bytes.to_vec()).unwrap()
    }

    fn single(coin: u64, p: u8, n: &[u8], q: i64) -> Value {
        Value::Multiasset(
            coin,
            OrderedMap::Def(vec![(
                policy(p),
                OrderedMap::Def(vec![(name(n), q)]),
            )]),
        )
    }

    #[test]
    fn empty_multiasset_encodes_as_bare_coin() {
        let value = Value::Multiasset(42, OrderedMap::Def(vec![]));
        assert_eq!(value.to_cbor().unwrap(), hex::decode("182a").unwrap());
    }

    #[test]
    fn zero_quantities_are_dropped_on_write() {
        let value = single(5, 1, b"a", 0);
        assert_eq!(value.to_cbor().unwrap(), hex::decode("05").unwrap());
    }

    #[test]
    fn policies_and_names_are_sorted_on_write() {
        let unsorted = Value::Multiasset(
            1,
            OrderedMap::Def(vec![
                (
                    policy(2),
                    OrderedMap::Def(vec![(name(b"b"), 2), (name(b"a"), 1)]),
                ),
                (policy(1), OrderedMap::Def(vec![(name(b"z"), 3)])),
            ]),
        );

        let sorted = Value::Multiasset(
            1,
            OrderedMap::Def(vec![
                (policy(1), OrderedMap::Def(vec![(name(b"z"), 3)])),
                (
                    policy(2),
                    OrderedMap::Def(vec![(name(b"a"), 1), (name(b"b"), 2)]),
                ),
            ]),
        );

        assert_eq!(unsorted.to_cbor().unwrap(), sorted.to_cbor().unwrap());
    }

    #[test]
    fn decode_accepts_non_canonical_order() {
        let unsorted = Value::Multiasset(
            1,
            OrderedMap::Def(vec![
                (policy(2), OrderedMap::Def(vec![(name(b"b"), 2)])),
                (policy(1), OrderedMap::Def(vec![(name(b"z"), 3)])),
            ]),
        );

        // hand-roll the non-canonical encoding: the codec would sort it
        let mut bytes = vec![0x82, 0x01, 0xa2];
        for (p, n, q) in [(2u8, b"b", 2u8), (1u8, b"z", 3u8)] {
            bytes.push(0x58);
            bytes.push(28);
            bytes.extend([p; 28]);
            bytes.push(0xa1);
            bytes.push(0x41);
            bytes.extend(n);
            bytes.push(q);
        }

        let decoded = Value::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, unsorted);
    }

    #[test]
    fn add_merges_disjoint_policies() {
        let a = single(2, 1, b"a", 10);
        let b = single(3, 2, b"b", 5);

        let sum = a.add(&b);
        assert_eq!(sum.coin(), 5);
        assert_eq!(sum.quantity_of(&policy(1), &name(b"a")), 10);
        assert_eq!(sum.quantity_of(&policy(2), &name(b"b")), 5);
    }

    #[test]
    fn subtract_can_go_negative_until_normalized() {
        let a = single(10, 1, b"a", 3);
        let b = single(4, 1, b"a", 5);

        let diff = a.subtract(&b);
        assert_eq!(diff.coin(), 6);
        assert_eq!(diff.quantity_of(&policy(1), &name(b"a")), -2);

        let cancelled = a.subtract(&a);
        assert_eq!(cancelled.quantity_of(&policy(1), &name(b"a")), 0);
        assert_eq!(cancelled.normalize(), Value::Coin(0));
    }

    #[test]
    fn asset_name_rejects_more_than_32_bytes() {
        assert!(AssetName::try_from(vec![0; 33]).is_err());

        let mut bytes = vec![0x58, 33];
        bytes.extend([0u8; 33]);
        assert!(AssetName::from_cbor(&bytes).is_err());
    }

    #[test]
    fn asset_id_from_hex_splits_policy_and_name() {
        let policy_hex = "00".repeat(28);
        let id = AssetId::from_hex(&format!("{policy_hex}6675656c")).unwrap();

        match id {
            AssetId::Asset(p, n) => {
                assert_eq!(p, policy(0));
                assert_eq!(n.as_slice(), b"fuel");
            }
            _ => panic!("expected a concrete asset"),
        }

        assert!(AssetId::from_hex("beef").is_err());
    }

    fn any_value() -> impl Strategy<Value = Value> {
        let any_asset = (0u8..4, prop::collection::vec(any::<u8>(), 0..4), -100i64..100);

        (
            0u64..1_000_000,
            prop::collection::vec(any_asset, 0..6),
        )
            .prop_map(|(coin, assets)| {
                let entries = assets
                    .into_iter()
                    .map(|(p, n, q)| ((policy(p), name(&n)), q))
                    .collect();
                Value::from_flat(coin, entries)
            })
    }

    proptest! {
        #[test]
        fn addition_is_commutative(a in any_value(), b in any_value()) {
            prop_assert_eq!(a.add(&b), b.add(&a));
        }

        #[test]
        fn zero_is_the_identity(a in any_value()) {
            prop_assert_eq!(a.add(&Value::Coin(0)), a.clone());
        }

        #[test]
        fn add_then_subtract_is_identity(a in any_value(), b in any_value()) {
            prop_assert_eq!(a.add(&b).subtract(&b).normalize(), a.normalize());
        }

        #[test]
        fn cbor_roundtrip(a in any_value()) {
            let bytes = a.to_cbor().unwrap();
            let decoded = Value::from_cbor(&bytes).unwrap();
            prop_assert_eq!(decoded, a);
        }
    }
}
