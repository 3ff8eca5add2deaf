use minicbor::data::Type;
use thiserror::Error;

use crate::utils::Int;

/// What the next read will find, without consuming anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    UnsignedInt,
    NegativeInt,
    ByteString,
    StartIndefiniteByteString,
    TextString,
    StartIndefiniteTextString,
    StartArray,
    StartMap,
    Tag,
    Boolean,
    Null,
    Undefined,
    Float,
    Simple,
    EndArray,
    EndMap,
    Finished,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("unexpected end of cbor input")]
    OutOfBoundsRead,

    #[error("{context}: unexpected cbor type")]
    UnexpectedType { context: String },

    #[error("{context}: invalid value for {field}, expected {expected}, found {found}")]
    InvalidValue {
        context: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("{context}: invalid cbor array size, expected {expected}, found {found}")]
    InvalidArraySize {
        context: String,
        expected: u64,
        found: u64,
    },

    #[error("{context}: invalid cbor map size, expected {expected}, found {found}")]
    InvalidMapSize {
        context: String,
        expected: u64,
        found: u64,
    },

    #[error("{context}: invalid cbor tag, expected {expected}, found {found}")]
    InvalidTag {
        context: String,
        expected: u64,
        found: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Array,
    Map,
}

/// One open container; `remaining` counts pending items (None = indefinite)
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    remaining: Option<u64>,
}

/// Single-pass streaming cbor decoder with look-ahead
///
/// A thin state-tracking layer over [minicbor::Decoder]: the caller peeks
/// the state of the next item and then consumes it with one of the typed
/// reads. Opened arrays and maps are tracked on a stack so that misuse
/// (closing a container with items remaining) surfaces as an error rather
/// than silent corruption. On any error the cursor stays put at the
/// offending byte, so a failed read never half-consumes an item.
#[derive(Clone)]
pub struct CborReader<'b> {
    decoder: minicbor::Decoder<'b>,
    frames: Vec<Frame>,
}

impl<'b> CborReader<'b> {
    pub fn new(input: &'b [u8]) -> Self {
        Self {
            decoder: minicbor::Decoder::new(input),
            frames: Vec::new(),
        }
    }

    /// Byte offset of the cursor within the input
    pub fn position(&self) -> usize {
        self.decoder.position()
    }

    fn at_end(&self) -> bool {
        self.decoder.position() >= self.decoder.input().len()
    }

    /// Account for one fully consumed item at the current nesting level
    fn note_item(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(n) = frame.remaining.as_mut() {
                *n = n.saturating_sub(1);
            }
        }
    }

    /// Run a raw decoder operation, restoring the cursor on failure
    fn with_restore<T>(
        &mut self,
        f: impl FnOnce(&mut minicbor::Decoder<'b>) -> Result<T, minicbor::decode::Error>,
    ) -> Result<T, Error> {
        let checkpoint = self.decoder.position();

        match f(&mut self.decoder) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.decoder.set_position(checkpoint);

                if e.is_end_of_input() {
                    Err(Error::OutOfBoundsRead)
                } else {
                    Err(Error::Decoding(e.to_string()))
                }
            }
        }
    }

    pub fn peek_state(&self) -> Result<State, Error> {
        if let Some(frame) = self.frames.last() {
            if frame.remaining == Some(0) {
                return Ok(match frame.kind {
                    FrameKind::Array => State::EndArray,
                    FrameKind::Map => State::EndMap,
                });
            }
        }

        if self.at_end() {
            return if self.frames.is_empty() {
                Ok(State::Finished)
            } else {
                Err(Error::OutOfBoundsRead)
            };
        }

        let mut fork = self.decoder.clone();
        let datatype = fork.datatype().map_err(|e| Error::Decoding(e.to_string()))?;

        let state = match datatype {
            Type::Break => match self.frames.last() {
                Some(frame) if frame.remaining.is_none() => match frame.kind {
                    FrameKind::Array => State::EndArray,
                    FrameKind::Map => State::EndMap,
                },
                _ => {
                    return Err(Error::Decoding(
                        "break byte outside an indefinite container".into(),
                    ))
                }
            },
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => State::UnsignedInt,
            Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::Int => State::NegativeInt,
            Type::Bytes => State::ByteString,
            Type::BytesIndef => State::StartIndefiniteByteString,
            Type::String => State::TextString,
            Type::StringIndef => State::StartIndefiniteTextString,
            Type::Array | Type::ArrayIndef => State::StartArray,
            Type::Map | Type::MapIndef => State::StartMap,
            Type::Tag => State::Tag,
            Type::Bool => State::Boolean,
            Type::Null => State::Null,
            Type::Undefined => State::Undefined,
            Type::F16 | Type::F32 | Type::F64 => State::Float,
            Type::Simple => State::Simple,
            Type::Unknown(byte) => {
                return Err(Error::Decoding(format!("unknown cbor type byte {byte:#04x}")))
            }
            other => {
                return Err(Error::Decoding(format!(
                    "unsupported cbor type {other:?}"
                )))
            }
        };

        Ok(state)
    }

    /// The tag at the cursor, without consuming it
    pub fn peek_tag(&self) -> Result<u64, Error> {
        let mut fork = self.decoder.clone();

        fork.tag()
            .map(|t| t.as_u64())
            .map_err(|e| Error::Decoding(e.to_string()))
    }

    pub fn read_uint(&mut self) -> Result<u64, Error> {
        let v = self.with_restore(|d| d.u64())?;
        self.note_item();
        Ok(v)
    }

    pub fn read_int(&mut self) -> Result<Int, Error> {
        let v = self.with_restore(|d| d.int())?;
        self.note_item();
        Ok(v.into())
    }

    /// Reads definite byte strings whole; indefinite ones chunk by chunk
    pub fn read_bytestring(&mut self) -> Result<Vec<u8>, Error> {
        let v = self.with_restore(|d| {
            let mut out = Vec::new();

            for chunk in d.bytes_iter()? {
                out.extend_from_slice(chunk?);
            }

            Ok(out)
        })?;

        self.note_item();
        Ok(v)
    }

    pub fn read_textstring(&mut self) -> Result<String, Error> {
        let v = self.with_restore(|d| {
            let mut out = String::new();

            for chunk in d.str_iter()? {
                out.push_str(chunk?);
            }

            Ok(out)
        })?;

        self.note_item();
        Ok(v)
    }

    /// Returns the declared length, or None for an indefinite array
    pub fn read_start_array(&mut self) -> Result<Option<u64>, Error> {
        let len = self.with_restore(|d| d.array())?;
        self.note_item();
        self.frames.push(Frame {
            kind: FrameKind::Array,
            remaining: len,
        });

        Ok(len)
    }

    pub fn read_end_array(&mut self) -> Result<(), Error> {
        self.read_end(FrameKind::Array)
    }

    /// Returns the declared entry count, or None for an indefinite map
    pub fn read_start_map(&mut self) -> Result<Option<u64>, Error> {
        let len = self.with_restore(|d| d.map())?;
        self.note_item();
        self.frames.push(Frame {
            kind: FrameKind::Map,
            // each entry is a key item plus a value item
            remaining: len.map(|n| n.saturating_mul(2)),
        });

        Ok(len)
    }

    pub fn read_end_map(&mut self) -> Result<(), Error> {
        self.read_end(FrameKind::Map)
    }

    fn read_end(&mut self, expected: FrameKind) -> Result<(), Error> {
        let frame = match self.frames.last() {
            Some(frame) if frame.kind == expected => *frame,
            _ => {
                return Err(Error::Decoding(format!(
                    "no open {} to close at this point",
                    match expected {
                        FrameKind::Array => "array",
                        FrameKind::Map => "map",
                    }
                )))
            }
        };

        match frame.remaining {
            Some(0) => {
                self.frames.pop();
                Ok(())
            }
            Some(n) => Err(Error::Decoding(format!(
                "container still has {n} pending items"
            ))),
            None => {
                match self.decoder.datatype() {
                    Ok(Type::Break) => {
                        let pos = self.decoder.position();
                        self.decoder.set_position(pos + 1);
                        self.frames.pop();
                        Ok(())
                    }
                    Ok(_) => Err(Error::Decoding(
                        "indefinite container not at its break byte".into(),
                    )),
                    Err(_) => Err(Error::OutOfBoundsRead),
                }
            }
        }
    }

    pub fn read_tag(&mut self) -> Result<u64, Error> {
        // the tag head is part of the item that follows, so no item is
        // accounted for here
        self.with_restore(|d| d.tag()).map(|t| t.as_u64())
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        let v = self.with_restore(|d| d.bool())?;
        self.note_item();
        Ok(v)
    }

    pub fn read_null(&mut self) -> Result<(), Error> {
        self.with_restore(|d| d.null())?;
        self.note_item();
        Ok(())
    }

    pub fn read_float(&mut self) -> Result<f64, Error> {
        let v = self.with_restore(|d| match d.datatype()? {
            Type::F16 => d.f16().map(f64::from),
            Type::F32 => d.f32().map(f64::from),
            _ => d.f64(),
        })?;

        self.note_item();
        Ok(v)
    }

    /// Consume the next complete item, however deeply nested
    pub fn skip_value(&mut self) -> Result<(), Error> {
        self.with_restore(|d| d.skip())?;
        self.note_item();
        Ok(())
    }

    /// The raw bytes of the next complete item, consumed
    pub fn read_encoded_value(&mut self) -> Result<Vec<u8>, Error> {
        let start = self.decoder.position();
        self.with_restore(|d| d.skip())?;
        let end = self.decoder.position();
        self.note_item();

        Ok(self.decoder.input()[start..end].to_vec())
    }

    /// Decode any codec-aware value through the reader's cursor
    pub fn decode<T>(&mut self) -> Result<T, Error>
    where
        T: minicbor::Decode<'b, ()>,
    {
        let v = self.with_restore(|d| d.decode())?;
        self.note_item();
        Ok(v)
    }

    pub fn validate_array_of_n_elements(&mut self, name: &str, n: u64) -> Result<(), Error> {
        match self.read_start_array()? {
            Some(len) if len == n => Ok(()),
            Some(len) => Err(Error::InvalidArraySize {
                context: name.to_string(),
                expected: n,
                found: len,
            }),
            None => Err(Error::Decoding(format!(
                "{name}: expecting definite array of {n} elements"
            ))),
        }
    }

    pub fn validate_end_array(&mut self, name: &str) -> Result<(), Error> {
        self.read_end_array().map_err(|e| match e {
            Error::Decoding(msg) => Error::Decoding(format!("{name}: {msg}")),
            other => other,
        })
    }

    pub fn validate_tag(&mut self, name: &str, expected: u64) -> Result<(), Error> {
        let found = self.read_tag()?;

        if found != expected {
            return Err(Error::InvalidTag {
                context: name.to_string(),
                expected,
                found,
            });
        }

        Ok(())
    }

    /// Read an enum discriminant and check it against the expected value,
    /// rendering both through `to_string` for the diagnostic
    pub fn validate_enum_value(
        &mut self,
        name: &str,
        field: &str,
        expected: u64,
        to_string: fn(u64) -> &'static str,
    ) -> Result<u64, Error> {
        let found = self.read_uint()?;

        if found != expected {
            return Err(Error::InvalidValue {
                context: name.to_string(),
                field: field.to_string(),
                expected: format!("{} ({expected})", to_string(expected)),
                found: format!("{} ({found})", to_string(found)),
            });
        }

        Ok(found)
    }
}
