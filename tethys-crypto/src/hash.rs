use std::{fmt, ops::Deref, str::FromStr};

use cryptoxide::blake2b::Blake2b;
use cryptoxide::digest::Digest;
use tethys_codec::minicbor;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid hash size, expected {expected} bytes, found {found}")]
    InvalidSize { expected: usize, found: usize },

    #[error("invalid hex in hash literal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A cryptographic digest of `BYTES` length
///
/// Cardano uses 28-byte digests (Blake2b-224, key hashes and script
/// hashes) and 32-byte digests (Blake2b-256, transaction ids, datum
/// hashes, anchors).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const BYTES: usize>([u8; BYTES]);

impl<const BYTES: usize> Hash<BYTES> {
    #[inline]
    pub const fn new(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }
}

impl<const BYTES: usize> From<[u8; BYTES]> for Hash<BYTES> {
    #[inline]
    fn from(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }
}

impl<const BYTES: usize> TryFrom<&[u8]> for Hash<BYTES> {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; BYTES] = value.try_into().map_err(|_| Error::InvalidSize {
            expected: BYTES,
            found: value.len(),
        })?;

        Ok(Self(bytes))
    }
}

impl<const BYTES: usize> AsRef<[u8]> for Hash<BYTES> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const BYTES: usize> Deref for Hash<BYTES> {
    type Target = [u8; BYTES];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const BYTES: usize> fmt::Debug for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("Hash<{BYTES}>"))
            .field(&hex::encode(self))
            .finish()
    }
}

impl<const BYTES: usize> fmt::Display for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self))
    }
}

impl<const BYTES: usize> FromStr for Hash<BYTES> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BYTES * 2 {
            return Err(Error::InvalidSize {
                expected: BYTES,
                found: s.len() / 2,
            });
        }

        let mut bytes = [0; BYTES];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl<const BYTES: usize> serde::Serialize for Hash<BYTES> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self))
    }
}

impl<'de, const BYTES: usize> serde::Deserialize<'de> for Hash<BYTES> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<C, const BYTES: usize> minicbor::Encode<C> for Hash<BYTES> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

impl<'b, C, const BYTES: usize> minicbor::Decode<'b, C> for Hash<BYTES> {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes = d.bytes()?;

        Self::try_from(bytes)
            .map_err(|_| minicbor::decode::Error::message("invalid size for hash byte string"))
    }
}

/// Incremental Blake2b hasher with a `SIZE`-byte digest
///
/// The state is generic over the output width, so the 28 and 32 byte
/// digests Cardano asks for come out of one impl. The hasher also acts
/// as a minicbor write sink: hashing an encoding streams straight
/// through it, and whatever bytes the codec emits (cached originals
/// included) are exactly what gets digested.
pub struct Hasher<const SIZE: usize> {
    state: Blake2b,
}

impl<const SIZE: usize> Hasher<SIZE> {
    pub fn new() -> Self {
        Self {
            state: Blake2b::new(SIZE),
        }
    }

    /// Feed more bytes into the running digest
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        self.state.input(bytes);
    }

    /// Consume the hasher and return the digest
    pub fn digest(mut self) -> Hash<SIZE> {
        let mut out = [0; SIZE];
        self.state.result(&mut out);
        Hash::new(out)
    }

    /// One-shot digest of a byte slice
    pub fn hash(bytes: &[u8]) -> Hash<SIZE> {
        let mut hasher = Self::new();
        hasher.update(bytes);
        hasher.digest()
    }

    /// One-shot digest of a discriminant byte followed by the payload,
    /// the scheme Cardano uses to separate script languages
    pub fn hash_tagged(bytes: &[u8], tag: u8) -> Hash<SIZE> {
        let mut hasher = Self::new();
        hasher.update(&[tag]);
        hasher.update(bytes);
        hasher.digest()
    }

    /// Digest of a value's cbor encoding, streamed with no intermediate
    /// buffer
    pub fn hash_cbor(data: &impl minicbor::Encode<()>) -> Hash<SIZE> {
        let mut hasher = Self::new();
        let () = minicbor::encode(data, &mut hasher).expect("writing into a hasher can't fail");
        hasher.digest()
    }

    /// [Hasher::hash_tagged] over a cbor encoding
    pub fn hash_tagged_cbor(data: &impl minicbor::Encode<()>, tag: u8) -> Hash<SIZE> {
        let mut hasher = Self::new();
        hasher.update(&[tag]);
        let () = minicbor::encode(data, &mut hasher).expect("writing into a hasher can't fail");
        hasher.digest()
    }
}

impl<const SIZE: usize> Default for Hasher<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> minicbor::encode::Write for &mut Hasher<SIZE> {
    type Error = std::convert::Infallible;

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.update(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digests() {
        // reference digests of the empty string, per the blake2 test suite
        assert_eq!(
            Hasher::<32>::hash(b"").to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn abc_digest() {
        assert_eq!(
            Hasher::<32>::hash(b"abc").to_string(),
            "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319"
        );
    }

    #[test]
    fn incremental_and_one_shot_agree() {
        let mut hasher = Hasher::<28>::new();
        hasher.update(b"stake");
        hasher.update(b"pool");

        assert_eq!(hasher.digest(), Hasher::<28>::hash(b"stakepool"));
    }

    #[test]
    fn tagging_is_plain_concatenation() {
        let payload = b"compiled script";

        let mut prefixed = vec![2u8];
        prefixed.extend_from_slice(payload);

        assert_eq!(
            Hasher::<28>::hash_tagged(payload, 2),
            Hasher::<28>::hash(&prefixed)
        );
    }

    #[test]
    fn hash_cbor_matches_hashing_the_encoding() {
        let value = 123456u64;
        let direct = Hasher::<32>::hash(&minicbor::to_vec(value).unwrap());
        let streamed = Hasher::<32>::hash_cbor(&value);

        assert_eq!(direct, streamed);
    }

    #[test]
    fn digest_widths_are_independent() {
        let wide = Hasher::<32>::hash(b"x");
        let narrow = Hasher::<28>::hash(b"x");

        assert_ne!(wide.as_ref()[..28], *narrow.as_ref());
    }

    #[test]
    fn parses_hex_literals_of_the_right_size() {
        let _: Hash<28> = "276fd18711931e2c0e21430192dbeac0e458093cd9d1fcd7210f64b3"
            .parse()
            .unwrap();

        let _: Hash<32> = "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
            .parse()
            .unwrap();

        let short: Result<Hash<32>, _> = "0e5751c0".parse();
        assert!(short.is_err());
    }

    #[test]
    fn cbor_rejects_wrong_lengths() {
        // 4-byte string where a 28-byte digest is expected
        let bytes = hex::decode("44deadbeef").unwrap();
        let result: Result<Hash<28>, _> = minicbor::decode(&bytes);
        assert!(result.is_err());
    }
}
