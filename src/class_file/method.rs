use crate::access_flags::MethodAccessFlags;
use crate::binary::{Deserialize, Serialize};
use crate::class_file::attribute::Attribute;
use crate::class_file::constants::{Constant, Utf8ConstantIndex};
use crate::errors::ParseError;
use crate::util::OffsetVec;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug, PartialEq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Method {
    pub fn parse_with_pool<R: ReadBytesExt>(
        reader: &mut R,
        constants: &OffsetVec<Constant>,
    ) -> Result<Method, ParseError> {
        let access_flags = MethodAccessFlags::parse(reader)?;
        let name_index = Utf8ConstantIndex::parse(reader)?;
        let descriptor_index = Utf8ConstantIndex::parse(reader)?;

        let attribute_count = u16::parse(reader)?;
        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            attributes.push(Attribute::parse_with_pool(reader, constants)?);
        }

        Ok(Method {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
