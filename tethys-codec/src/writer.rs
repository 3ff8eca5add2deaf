use minicbor::data::{IanaTag, Tag};
use thiserror::Error;

use crate::utils::Int;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid writer state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Array,
    Map,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    remaining: Option<u64>,
}

/// Streaming cbor encoder into an owned growable buffer
///
/// The dual of [crate::CborReader]: typed writes, shortest-form integer
/// headers (courtesy of minicbor), definite containers preferred. Open
/// containers are tracked so that a mismatched close surfaces as an error.
pub struct CborWriter {
    encoder: minicbor::Encoder<Vec<u8>>,
    frames: Vec<Frame>,
}

impl Default for CborWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CborWriter {
    pub fn new() -> Self {
        Self {
            encoder: minicbor::Encoder::new(Vec::new()),
            frames: Vec::new(),
        }
    }

    fn note_item(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(n) = frame.remaining.as_mut() {
                *n = n.saturating_sub(1);
            }
        }
    }

    fn map_err<T>(
        result: Result<T, minicbor::encode::Error<std::convert::Infallible>>,
    ) -> Result<(), Error> {
        result.map(|_| ()).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn write_uint(&mut self, value: u64) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.u64(value))?;
        self.note_item();
        Ok(self)
    }

    /// Major type 0 or 1 is picked by the sign
    pub fn write_signed_int(&mut self, value: i64) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.i64(value))?;
        self.note_item();
        Ok(self)
    }

    pub fn write_int(&mut self, value: Int) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.int(*value))?;
        self.note_item();
        Ok(self)
    }

    /// Encode an unsigned big-endian magnitude in its narrowest form: a
    /// plain uint when it fits 64 bits, a tag 2 bignum otherwise
    pub fn write_big_uint(&mut self, magnitude: &[u8]) -> Result<&mut Self, Error> {
        let trimmed = trim_leading_zeros(magnitude);

        if trimmed.len() <= 8 {
            return self.write_uint(be_bytes_to_u64(trimmed));
        }

        Self::map_err(self.encoder.tag(IanaTag::PosBignum))?;
        Self::map_err(self.encoder.bytes(trimmed))?;
        self.note_item();
        Ok(self)
    }

    /// Encode `-1 - magnitude` in its narrowest form: a native negative
    /// int when it fits the 65-bit range, a tag 3 bignum otherwise
    pub fn write_big_nint(&mut self, magnitude: &[u8]) -> Result<&mut Self, Error> {
        let trimmed = trim_leading_zeros(magnitude);

        if trimmed.len() <= 8 {
            let value = -1i128 - i128::from(be_bytes_to_u64(trimmed));
            let narrow = minicbor::data::Int::try_from(value)
                .map_err(|_| Error::Encoding("negative bignum out of native range".into()))?;
            return self.write_int(narrow.into());
        }

        Self::map_err(self.encoder.tag(IanaTag::NegBignum))?;
        Self::map_err(self.encoder.bytes(trimmed))?;
        self.note_item();
        Ok(self)
    }

    pub fn write_bytestring(&mut self, value: &[u8]) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.bytes(value))?;
        self.note_item();
        Ok(self)
    }

    pub fn write_textstring(&mut self, value: &str) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.str(value))?;
        self.note_item();
        Ok(self)
    }

    /// None opens an indefinite array that must be closed by
    /// [CborWriter::write_end_array]
    pub fn write_start_array(&mut self, len: Option<u64>) -> Result<&mut Self, Error> {
        match len {
            Some(n) => Self::map_err(self.encoder.array(n))?,
            None => Self::map_err(self.encoder.begin_array())?,
        }

        self.note_item();
        self.frames.push(Frame {
            kind: FrameKind::Array,
            remaining: len,
        });

        Ok(self)
    }

    pub fn write_end_array(&mut self) -> Result<&mut Self, Error> {
        self.write_end(FrameKind::Array)
    }

    pub fn write_start_map(&mut self, len: Option<u64>) -> Result<&mut Self, Error> {
        match len {
            Some(n) => Self::map_err(self.encoder.map(n))?,
            None => Self::map_err(self.encoder.begin_map())?,
        }

        self.note_item();
        self.frames.push(Frame {
            kind: FrameKind::Map,
            remaining: len.map(|n| n.saturating_mul(2)),
        });

        Ok(self)
    }

    pub fn write_end_map(&mut self) -> Result<&mut Self, Error> {
        self.write_end(FrameKind::Map)
    }

    fn write_end(&mut self, expected: FrameKind) -> Result<&mut Self, Error> {
        let frame = match self.frames.last() {
            Some(frame) if frame.kind == expected => *frame,
            _ => {
                return Err(Error::InvalidState(format!(
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
                Ok(self)
            }
            Some(n) => Err(Error::InvalidState(format!(
                "container still expects {n} items"
            ))),
            None => {
                Self::map_err(self.encoder.end())?;
                self.frames.pop();
                Ok(self)
            }
        }
    }

    pub fn write_tag(&mut self, tag: u64) -> Result<&mut Self, Error> {
        // the tagged value that follows is the item, not the tag head
        Self::map_err(self.encoder.tag(Tag::new(tag)))?;
        Ok(self)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.bool(value))?;
        self.note_item();
        Ok(self)
    }

    pub fn write_null(&mut self) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.null())?;
        self.note_item();
        Ok(self)
    }

    pub fn write_float(&mut self, value: f64) -> Result<&mut Self, Error> {
        Self::map_err(self.encoder.f64(value))?;
        self.note_item();
        Ok(self)
    }

    /// Splice an already encoded item into the output verbatim
    pub fn write_encoded(&mut self, raw: &[u8]) -> Result<&mut Self, Error> {
        self.encoder
            .writer_mut()
            .extend_from_slice(raw);
        self.note_item();
        Ok(self)
    }

    /// Encode any codec-aware value through the writer's buffer
    pub fn encode<T>(&mut self, value: &T) -> Result<&mut Self, Error>
    where
        T: minicbor::Encode<()>,
    {
        Self::map_err(self.encoder.encode(value))?;
        self.note_item();
        Ok(self)
    }

    /// Length of the hex rendering of the bytes written so far
    pub fn get_hex_size(&self) -> usize {
        self.encoder.writer().len() * 2
    }

    pub fn encode_hex(self) -> String {
        hex::encode(self.encoder.into_writer())
    }

    pub fn encode_bytes(self) -> Vec<u8> {
        self.encoder.into_writer()
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn be_bytes_to_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_shortest_form_headers() {
        let mut w = CborWriter::new();
        w.write_uint(0).unwrap();
        w.write_uint(23).unwrap();
        w.write_uint(24).unwrap();
        w.write_uint(500).unwrap();

        assert_eq!(w.encode_hex(), "001718181901f4");
    }

    #[test]
    fn signed_int_picks_the_major_type() {
        let mut w = CborWriter::new();
        w.write_signed_int(1).unwrap();
        w.write_signed_int(-1).unwrap();
        w.write_signed_int(-500).unwrap();

        assert_eq!(w.encode_hex(), "01203901f3");
    }

    #[test]
    fn big_uint_narrows_when_it_fits() {
        let mut w = CborWriter::new();
        w.write_big_uint(&[0, 0, 0xff]).unwrap();
        assert_eq!(w.encode_hex(), "18ff");

        // nine significant bytes force the tag 2 form
        let mut w = CborWriter::new();
        w.write_big_uint(&[1, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(w.encode_hex(), "c249010000000000000000");
    }

    #[test]
    fn big_nint_narrows_when_it_fits() {
        // -1 - 255 = -256
        let mut w = CborWriter::new();
        w.write_big_nint(&[0xff]).unwrap();
        assert_eq!(w.encode_hex(), "38ff");
    }

    #[test]
    fn definite_containers_check_their_counts() {
        let mut w = CborWriter::new();
        w.write_start_array(Some(2)).unwrap();
        w.write_uint(1).unwrap();

        assert!(w.write_end_array().is_err());

        w.write_uint(2).unwrap();
        w.write_end_array().unwrap();
        assert_eq!(w.encode_hex(), "820102");
    }

    #[test]
    fn indefinite_containers_emit_a_break() {
        let mut w = CborWriter::new();
        w.write_start_array(None).unwrap();
        w.write_uint(1).unwrap();
        w.write_uint(2).unwrap();
        w.write_end_array().unwrap();

        assert_eq!(w.encode_hex(), "9f0102ff");
    }

    #[test]
    fn write_encoded_splices_verbatim() {
        let mut w = CborWriter::new();
        w.write_start_array(Some(1)).unwrap();
        w.write_encoded(&hex::decode("1800").unwrap()).unwrap();
        w.write_end_array().unwrap();

        assert_eq!(w.encode_hex(), "811800");
    }

    #[test]
    fn hex_size_tracks_the_buffer() {
        let mut w = CborWriter::new();
        w.write_uint(500).unwrap();
        assert_eq!(w.get_hex_size(), 6);
    }
}
