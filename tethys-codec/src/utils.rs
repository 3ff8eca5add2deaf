use std::{borrow::Cow, fmt, ops::Deref, str::FromStr};

use minicbor::{data::IanaTag, data::Tag, Decode, Encode};
use serde::{Deserialize, Serialize};

/// CBOR tag marking a finite set (draft-bormann-cbor-notable-tags)
pub const SET_TAG: u64 = 258;

/// An owned byte string with hex-based text representations
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(into = "String")]
#[serde(try_from = "String")]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(xs: Vec<u8>) -> Self {
        Bytes(xs)
    }
}

impl From<&[u8]> for Bytes {
    fn from(xs: &[u8]) -> Self {
        Bytes(xs.to_vec())
    }
}

impl From<Bytes> for Vec<u8> {
    fn from(b: Bytes) -> Self {
        b.0
    }
}

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<String> for Bytes {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Bytes(hex::decode(value)?))
    }
}

impl FromStr for Bytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Bytes(hex::decode(s)?))
    }
}

impl From<Bytes> for String {
    fn from(b: Bytes) -> Self {
        hex::encode(b.0)
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Bytes {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let mut out = Vec::new();

        for chunk in d.bytes_iter()? {
            out.extend_from_slice(chunk?);
        }

        Ok(Bytes(out))
    }
}

impl<C> minicbor::Encode<C> for Bytes {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

/// A 65-bit CBOR integer (the full major type 0 / 1 range)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Int(minicbor::data::Int);

impl Deref for Int {
    type Target = minicbor::data::Int;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<minicbor::data::Int> for Int {
    fn from(x: minicbor::data::Int) -> Self {
        Int(x)
    }
}

impl From<i32> for Int {
    fn from(x: i32) -> Self {
        Int(minicbor::data::Int::from(x))
    }
}

impl From<i64> for Int {
    fn from(x: i64) -> Self {
        Int(minicbor::data::Int::from(x))
    }
}

impl From<u64> for Int {
    fn from(x: u64) -> Self {
        Int(minicbor::data::Int::from(x))
    }
}

impl From<Int> for i128 {
    fn from(x: Int) -> Self {
        i128::from(x.0)
    }
}

impl TryFrom<Int> for i64 {
    type Error = std::num::TryFromIntError;

    fn try_from(value: Int) -> Result<Self, Self::Error> {
        i64::try_from(i128::from(value.0))
    }
}

impl TryFrom<Int> for u64 {
    type Error = std::num::TryFromIntError;

    fn try_from(value: Int) -> Result<Self, Self::Error> {
        u64::try_from(i128::from(value.0))
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i128::from(self.0))
    }
}

impl Serialize for Int {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i128(i128::from(self.0))
    }
}

impl<'de> Deserialize<'de> for Int {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let x = i128::deserialize(deserializer)?;
        let inner = minicbor::data::Int::try_from(x)
            .map_err(|_| serde::de::Error::custom("integer out of the 65-bit cbor range"))?;

        Ok(Int(inner))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Int {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Int(d.int()?))
    }
}

impl<C> minicbor::Encode<C> for Int {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.int(self.0)?;
        Ok(())
    }
}

/// Order-preserving map of key-value pairs
///
/// There is no guarantee that the entries of an on-chain map follow the
/// canonical order of the standard. To implement an isomorphic codec we
/// keep the entries in a Vec, in decoded order, instead of reaching for a
/// BTreeMap. The variant records whether the source framing was definite
/// or indefinite. Duplicate keys are rejected at decode.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum OrderedMap<K, V> {
    Def(Vec<(K, V)>),
    Indef(Vec<(K, V)>),
}

impl<K, V> OrderedMap<K, V> {
    pub fn to_vec(self) -> Vec<(K, V)> {
        match self {
            OrderedMap::Def(x) => x,
            OrderedMap::Indef(x) => x,
        }
    }

    pub fn lookup(&self, key: &K) -> Option<&V>
    where
        K: PartialEq,
    {
        self.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<K, V> Deref for OrderedMap<K, V> {
    type Target = Vec<(K, V)>;

    fn deref(&self) -> &Self::Target {
        match self {
            OrderedMap::Def(x) => x,
            OrderedMap::Indef(x) => x,
        }
    }
}

impl<K, V> From<Vec<(K, V)>> for OrderedMap<K, V> {
    fn from(xs: Vec<(K, V)>) -> Self {
        OrderedMap::Def(xs)
    }
}

impl<'b, C, K, V> minicbor::decode::Decode<'b, C> for OrderedMap<K, V>
where
    K: Decode<'b, C> + PartialEq,
    V: Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let datatype = d.datatype()?;

        let items: Result<Vec<_>, _> = d.map_iter_with::<C, K, V>(ctx)?.collect();
        let items = items?;

        for (idx, (k, _)) in items.iter().enumerate() {
            if items.iter().skip(idx + 1).any(|(other, _)| other == k) {
                return Err(minicbor::decode::Error::message(
                    "duplicate key in cbor map",
                ));
            }
        }

        match datatype {
            minicbor::data::Type::Map => Ok(OrderedMap::Def(items)),
            minicbor::data::Type::MapIndef => Ok(OrderedMap::Indef(items)),
            _ => Err(minicbor::decode::Error::message(
                "invalid data type for ordered map",
            )),
        }
    }
}

impl<C, K, V> minicbor::encode::Encode<C> for OrderedMap<K, V>
where
    K: Encode<C>,
    V: Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            OrderedMap::Def(x) => {
                e.map(x.len() as u64)?;

                for (k, v) in x.iter() {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }
            }
            OrderedMap::Indef(x) => {
                e.begin_map()?;

                for (k, v) in x.iter() {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }

                e.end()?;
            }
        }

        Ok(())
    }
}

/// An array that remembers whether the source framing was definite or not
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum Seq<A> {
    Def(Vec<A>),
    Indef(Vec<A>),
}

impl<A> Seq<A> {
    pub fn to_vec(self) -> Vec<A> {
        match self {
            Seq::Def(x) => x,
            Seq::Indef(x) => x,
        }
    }
}

impl<A> Deref for Seq<A> {
    type Target = Vec<A>;

    fn deref(&self) -> &Self::Target {
        match self {
            Seq::Def(x) => x,
            Seq::Indef(x) => x,
        }
    }
}

impl<A> From<Vec<A>> for Seq<A> {
    fn from(xs: Vec<A>) -> Self {
        Seq::Def(xs)
    }
}

impl<'b, C, A> minicbor::decode::Decode<'b, C> for Seq<A>
where
    A: minicbor::decode::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let datatype = d.datatype()?;

        match datatype {
            minicbor::data::Type::Array => Ok(Self::Def(d.decode_with(ctx)?)),
            minicbor::data::Type::ArrayIndef => Ok(Self::Indef(d.decode_with(ctx)?)),
            _ => Err(minicbor::decode::Error::message(
                "unknown data type for cbor sequence",
            )),
        }
    }
}

impl<C, A> minicbor::encode::Encode<C> for Seq<A>
where
    A: minicbor::encode::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Seq::Def(x) => {
                e.encode_with(x, ctx)?;
            }
            Seq::Indef(x) => {
                e.begin_array()?;

                for v in x.iter() {
                    e.encode_with(v, ctx)?;
                }

                e.end()?;
            }
        };

        Ok(())
    }
}

/// An order-preserving collection of unique elements
///
/// On-chain sets may or may not carry tag 258. The tag has to be restored
/// on re-encode for hashing equivalence, so each instance records whether
/// its source encoding was tagged. Duplicate elements are rejected at
/// decode. Values built in memory start out untagged.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum Set<T> {
    Tagged(Vec<T>),
    Plain(Vec<T>),
}

impl<T> Set<T> {
    pub fn to_vec(self) -> Vec<T> {
        match self {
            Set::Tagged(x) => x,
            Set::Plain(x) => x,
        }
    }

    /// Lexicographic order for sets built in memory, as the ledger expects
    pub fn sorted(mut items: Vec<T>) -> Self
    where
        T: Ord,
    {
        items.sort();
        Set::Plain(items)
    }
}

impl<T> Deref for Set<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        match self {
            Set::Tagged(x) => x,
            Set::Plain(x) => x,
        }
    }
}

impl<T> From<Vec<T>> for Set<T> {
    fn from(xs: Vec<T>) -> Self {
        Set::Plain(xs)
    }
}

fn check_unique<T: PartialEq>(items: &[T]) -> Result<(), minicbor::decode::Error> {
    for (idx, item) in items.iter().enumerate() {
        if items.iter().skip(idx + 1).any(|other| other == item) {
            return Err(minicbor::decode::Error::message(
                "duplicate element in cbor set",
            ));
        }
    }

    Ok(())
}

impl<'b, C, T> minicbor::decode::Decode<'b, C> for Set<T>
where
    T: Decode<'b, C> + PartialEq,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let tagged = matches!(d.probe().tag(), Ok(t) if t.as_u64() == SET_TAG);

        if tagged {
            d.tag()?;
        }

        let items: Vec<T> = d.decode_with(ctx)?;
        check_unique(&items)?;

        if tagged {
            Ok(Set::Tagged(items))
        } else {
            Ok(Set::Plain(items))
        }
    }
}

impl<C, T> minicbor::encode::Encode<C> for Set<T>
where
    T: Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Set::Tagged(x) => {
                e.tag(Tag::new(SET_TAG))?;
                e.encode_with(x, ctx)?;
            }
            Set::Plain(x) => {
                e.encode_with(x, ctx)?;
            }
        }

        Ok(())
    }
}

/// A [Set] that refuses to decode without at least one element
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct NonEmptySet<T>(Set<T>);

impl<T> NonEmptySet<T> {
    pub fn to_vec(self) -> Vec<T> {
        self.0.to_vec()
    }
}

impl<T> Deref for NonEmptySet<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> TryFrom<Vec<T>> for NonEmptySet<T> {
    type Error = &'static str;

    fn try_from(xs: Vec<T>) -> Result<Self, Self::Error> {
        if xs.is_empty() {
            return Err("empty vec can't be turned into a non-empty set");
        }

        Ok(NonEmptySet(Set::Plain(xs)))
    }
}

impl<'b, C, T> minicbor::decode::Decode<'b, C> for NonEmptySet<T>
where
    T: Decode<'b, C> + PartialEq,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let inner: Set<T> = d.decode_with(ctx)?;

        if inner.is_empty() {
            return Err(minicbor::decode::Error::message(
                "decoding empty set as a non-empty set",
            ));
        }

        Ok(NonEmptySet(inner))
    }
}

impl<C, T> minicbor::encode::Encode<C> for NonEmptySet<T>
where
    T: Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with(&self.0, ctx)?;
        Ok(())
    }
}

/// A tri-state value matching the CBOR null / undefined simple values
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum Nullable<T> {
    Some(T),
    Null,
    Undefined,
}

impl<T> Nullable<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Nullable::Some(x) => Some(x),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(x: Option<T>) -> Self {
        match x {
            Some(x) => Nullable::Some(x),
            None => Nullable::Null,
        }
    }
}

impl<'b, C, T> minicbor::Decode<'b, C> for Nullable<T>
where
    T: minicbor::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            minicbor::data::Type::Null => {
                d.skip()?;
                Ok(Self::Null)
            }
            minicbor::data::Type::Undefined => {
                d.skip()?;
                Ok(Self::Undefined)
            }
            _ => Ok(Self::Some(d.decode_with(ctx)?)),
        }
    }
}

impl<C, T> minicbor::Encode<C> for Nullable<T>
where
    T: minicbor::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Nullable::Some(x) => {
                e.encode_with(x, ctx)?;
            }
            Nullable::Null => {
                e.null()?;
            }
            Nullable::Undefined => {
                e.undefined()?;
            }
        }

        Ok(())
    }
}

/// A signed quantity that can't be zero
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, Default,
)]
#[serde(into = "i64", try_from = "i64")]
pub struct NonZeroInt(i64);

impl TryFrom<i64> for NonZeroInt {
    type Error = &'static str;

    fn try_from(x: i64) -> Result<Self, Self::Error> {
        if x == 0 {
            return Err("zero is not a valid non-zero int");
        }

        Ok(NonZeroInt(x))
    }
}

impl From<NonZeroInt> for i64 {
    fn from(x: NonZeroInt) -> Self {
        x.0
    }
}

impl<'b, C> minicbor::Decode<'b, C> for NonZeroInt {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let x = d.i64()?;

        if x == 0 {
            return Err(minicbor::decode::Error::message(
                "decoding zero as a non-zero int",
            ));
        }

        Ok(NonZeroInt(x))
    }
}

impl<C> minicbor::Encode<C> for NonZeroInt {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i64(self.0)?;
        Ok(())
    }
}

/// An unsigned coin quantity that can't be zero
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, Default,
)]
#[serde(into = "u64", try_from = "u64")]
pub struct PositiveCoin(u64);

impl TryFrom<u64> for PositiveCoin {
    type Error = &'static str;

    fn try_from(x: u64) -> Result<Self, Self::Error> {
        if x == 0 {
            return Err("zero is not a valid positive coin");
        }

        Ok(PositiveCoin(x))
    }
}

impl From<PositiveCoin> for u64 {
    fn from(x: PositiveCoin) -> Self {
        x.0
    }
}

impl<'b, C> minicbor::Decode<'b, C> for PositiveCoin {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let x = d.u64()?;

        if x == 0 {
            return Err(minicbor::decode::Error::message(
                "decoding zero as a positive coin",
            ));
        }

        Ok(PositiveCoin(x))
    }
}

impl<C> minicbor::Encode<C> for PositiveCoin {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?;
        Ok(())
    }
}

/// A decoded value that remembers the exact bytes it came from
///
/// Ledger rules hash the bytes that exist on-chain, and upstream sources
/// occasionally ship non-canonical encodings. When decoding, this wrapper
/// captures the raw slice of the item so that re-encoding emits it
/// verbatim. Values built in memory carry no cache and encode canonically;
/// mutating a decoded value goes through [Cached::unwrap] and back, which
/// drops the stale cache.
#[derive(Clone, Debug)]
pub struct Cached<'b, T> {
    raw: Option<Cow<'b, [u8]>>,
    inner: T,
}

impl<'b, T> Cached<'b, T> {
    /// The captured source bytes, if this value came from a decoder
    pub fn raw_cbor(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    pub fn unwrap(self) -> T {
        self.inner
    }

    /// Attach an explicit cache; the caller asserts the bytes decode to `inner`
    pub fn with_raw(inner: T, raw: &'b [u8]) -> Self {
        Cached {
            raw: Some(Cow::Borrowed(raw)),
            inner,
        }
    }

    /// Like [Cached::with_raw] but owning the bytes
    pub fn with_owned_raw(inner: T, raw: Vec<u8>) -> Self {
        Cached {
            raw: Some(Cow::Owned(raw)),
            inner,
        }
    }
}

impl<T> From<T> for Cached<'_, T> {
    fn from(inner: T) -> Self {
        Cached { raw: None, inner }
    }
}

impl<T> Deref for Cached<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

// equality is structural; the cache is a serialization detail
impl<T: PartialEq> PartialEq for Cached<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: Eq> Eq for Cached<'_, T> {}

impl<'b, C, T> minicbor::Decode<'b, C> for Cached<'b, T>
where
    T: minicbor::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let all = d.input();
        let start = d.position();
        let inner = d.decode_with(ctx)?;
        let end = d.position();

        Ok(Cached {
            raw: Some(Cow::Borrowed(&all[start..end])),
            inner,
        })
    }
}

impl<C, T> minicbor::Encode<C> for Cached<'_, T>
where
    T: minicbor::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match &self.raw {
            Some(raw) => e
                .writer_mut()
                .write_all(raw)
                .map_err(minicbor::encode::Error::write),
            None => e.encode_with(&self.inner, ctx).map(|_| ()),
        }
    }
}

impl<T: Serialize> Serialize for Cached<'_, T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Cached<'_, T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Cached {
            raw: None,
            inner: T::deserialize(deserializer)?,
        })
    }
}

/// Wraps a struct so that it is encoded/decoded as tag 24 cbor-in-bytes
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct CborWrap<T>(pub T);

impl<'b, C, T> minicbor::Decode<'b, C> for CborWrap<T>
where
    T: minicbor::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let tag = d.tag()?;

        if tag != IanaTag::Cbor.tag() {
            return Err(minicbor::decode::Error::message(
                "invalid tag for cbor-wrapped value",
            ));
        }

        let cbor = d.bytes()?;
        let wrapped = minicbor::decode_with(cbor, ctx)?;

        Ok(CborWrap(wrapped))
    }
}

impl<C, T> minicbor::Encode<C> for CborWrap<T>
where
    T: minicbor::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let buf = minicbor::to_vec_with(&self.0, ctx).map_err(|_| {
            minicbor::encode::Error::message("error encoding cbor-wrapped structure")
        })?;

        e.tag(IanaTag::Cbor)?;
        e.bytes(&buf)?;

        Ok(())
    }
}

impl<T> Deref for CborWrap<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A value prefixed by a known cbor tag
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct TagWrap<I, const T: u64>(I);

impl<I, const T: u64> TagWrap<I, T> {
    pub fn new(inner: I) -> Self {
        TagWrap(inner)
    }
}

impl<I, const T: u64> Deref for TagWrap<I, T> {
    type Target = I;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'b, C, I, const T: u64> minicbor::Decode<'b, C> for TagWrap<I, T>
where
    I: minicbor::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let tag = d.tag()?;

        if tag.as_u64() != T {
            return Err(minicbor::decode::Error::message(
                "unexpected tag for tag-wrapped value",
            ));
        }

        Ok(TagWrap(d.decode_with(ctx)?))
    }
}

impl<C, I, const T: u64> minicbor::Encode<C> for TagWrap<I, T>
where
    I: minicbor::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.tag(Tag::new(T))?;
        e.encode_with(&self.0, ctx)?;

        Ok(())
    }
}

/// An empty map, two bytes on the wire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyMap;

impl<'b, C> minicbor::decode::Decode<'b, C> for EmptyMap {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.map()? {
            Some(0) => Ok(EmptyMap),
            _ => Err(minicbor::decode::Error::message(
                "expecting map with zero entries",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for EmptyMap {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.map(0)?;

        Ok(())
    }
}
