use tethys_crypto::{Hash, Hasher};

use crate::{
    metadata::AuxiliaryData,
    plutus_data::PlutusData,
    script::{NativeScript, PlutusScript},
    tx::TransactionBody,
    Cached,
};

impl NativeScript {
    /// Script hash: Blake2b-224 over a zero prefix byte plus the encoding
    pub fn compute_hash(&self) -> Hash<28> {
        Hasher::<28>::hash_tagged_cbor(self, 0)
    }
}

impl<const VERSION: u8> PlutusScript<VERSION> {
    /// Script hash: Blake2b-224 with the language discriminant prefix
    pub fn compute_hash(&self) -> Hash<28> {
        Hasher::<28>::hash_tagged(self.as_ref(), VERSION)
    }
}

impl PlutusData {
    pub fn compute_hash(&self) -> Hash<32> {
        Hasher::<32>::hash_cbor(self)
    }
}

impl TransactionBody<'_> {
    pub fn compute_hash(&self) -> Hash<32> {
        Hasher::<32>::hash_cbor(self)
    }
}

impl AuxiliaryData {
    pub fn compute_hash(&self) -> Hash<32> {
        Hasher::<32>::hash_cbor(self)
    }
}

/// Blake2b-256 digest of a value's cbor encoding
pub trait ToHash {
    fn compute_hash(&self) -> Hash<32>;
}

// hashing a cached value feeds the cache bytes to the hasher, so the
// digest matches what exists on-chain even for non-canonical sources
impl<T> ToHash for Cached<'_, T>
where
    T: tethys_codec::minicbor::Encode<()>,
{
    fn compute_hash(&self) -> Hash<32> {
        Hasher::<32>::hash_cbor(self)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::{
        plutus_data::{BigInt, Constr},
        Fragment, Seq,
    };

    #[test]
    fn native_script_hashes_as_cardano_cli() {
        // an arbitrary script whose hash was produced by the cardano-cli
        let script = NativeScript::ScriptAll(Seq::Def(vec![
            NativeScript::ScriptPubkey(
                Hash::<28>::from_str("4d04380dcb9fbad5aff8e2f4e19394ef4e5e11b37932838f01984a12")
                    .unwrap(),
            ),
            NativeScript::InvalidBefore(112500819),
        ]));

        assert_eq!(
            script.compute_hash().to_string(),
            "d6a8ced01ecdfbb26c90850010a06fbc20a7c23632fc92f531667f36"
        );
    }

    #[test]
    fn plutus_data_hashes_as_cardano_cli() {
        // an arbitrary complex datum, hash produced by the cardano-cli
        let data = PlutusData::Constr(Constr::<PlutusData> {
            tag: 1280,
            any_constructor: None,
            fields: Seq::Indef(vec![
                PlutusData::BigInt(BigInt::Int(4i64.into())),
                PlutusData::Constr(Constr::<PlutusData> {
                    tag: 124,
                    any_constructor: None,
                    fields: Seq::Indef(vec![
                        PlutusData::BigInt(BigInt::Int((-4i64).into())),
                        PlutusData::Constr(Constr::<PlutusData> {
                            tag: 102,
                            any_constructor: Some(453),
                            fields: Seq::Indef(vec![
                                PlutusData::BigInt(BigInt::Int(2i64.into())),
                                PlutusData::BigInt(BigInt::Int(3434i64.into())),
                            ]),
                        }),
                        PlutusData::BigInt(BigInt::Int((-11828293i64).into())),
                    ]),
                }),
                PlutusData::BigInt(BigInt::Int(11828293i64.into())),
            ]),
        });

        assert_eq!(
            data.compute_hash().to_string(),
            "d9bc0eb6ac664286155f70d720cafd2af16277fbd9014a930997431a2ffbe554"
        );
    }

    #[test]
    fn cached_plutus_data_hashes_its_source_bytes() {
        // 121([]) with a pointlessly indefinite field list
        let canonical = hex::decode("d87980").unwrap();
        let indefinite = hex::decode("d8799fff").unwrap();

        let a: Cached<PlutusData> = Cached::from_cbor(&canonical).unwrap();
        let b: Cached<PlutusData> = Cached::from_cbor(&indefinite).unwrap();

        // structurally different framings, so the caches differ
        assert_eq!(a.compute_hash(), Hasher::<32>::hash(&canonical));
        assert_eq!(b.compute_hash(), Hasher::<32>::hash(&indefinite));
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn plutus_script_hash_prefixes_the_language() {
        let bytes = vec![0x4d, 0x01];
        let v1 = PlutusScript::<1>::from(bytes.clone());
        let v2 = PlutusScript::<2>::from(bytes);

        assert_ne!(v1.compute_hash(), v2.compute_hash());
    }
}
