use crate::errors::ParseError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Structural inverse of [`Serialize`]
///
/// Every field is read back in the exact order `serialize` wrote it. Unlike the write side,
/// reading can fail on malformed input, so the error type is [`ParseError`] instead of a plain
/// I/O error.
pub trait Deserialize: Sized {
    /// Read the construct from a binary input stream
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Serialize for i16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for u8 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_u8()?)
    }
}

impl Deserialize for u16 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_u16::<BigEndian>()?)
    }
}

impl Deserialize for u32 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_u32::<BigEndian>()?)
    }
}

impl Deserialize for i8 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_i8()?)
    }
}

impl Deserialize for i16 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_i16::<BigEndian>()?)
    }
}

impl Deserialize for i32 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_i32::<BigEndian>()?)
    }
}

impl Deserialize for i64 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_i64::<BigEndian>()?)
    }
}

impl Deserialize for f32 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_f32::<BigEndian>()?)
    }
}

impl Deserialize for f64 {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        Ok(reader.read_f64::<BigEndian>()?)
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, ParseError> {
        let len = u16::parse(reader)?;
        let mut elems = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elems.push(A::parse(reader)?);
        }
        Ok(elems)
    }
}
