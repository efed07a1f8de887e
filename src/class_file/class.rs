use crate::access_flags::ClassAccessFlags;
use crate::binary::{Deserialize, Serialize};
use crate::class_file::attribute::Attribute;
use crate::class_file::constants::{ClassConstantIndex, Constant};
use crate::class_file::field::Field;
use crate::class_file::method::Method;
use crate::class_file::version::Version;
use crate::errors::ParseError;
use crate::util::OffsetVec;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs;
use std::path::Path;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, PartialEq)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Save the class file to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> std::io::Result<()> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut class_file = fs::File::create(path)?;
        self.serialize(&mut class_file)
    }

    /// Read a class file back from its binary format
    ///
    /// The constant pool comes first in the stream, so everything after it (attribute names in
    /// particular) can be resolved against it as parsing goes.
    pub fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<ClassFile, ParseError> {
        let magic = u32::parse(reader)?;
        if magic.to_be_bytes() != ClassFile::MAGIC {
            return Err(ParseError::BadMagic(magic));
        }

        let version = Version::parse(reader)?;
        let constants: OffsetVec<Constant> = Deserialize::parse(reader)?;
        let access_flags = ClassAccessFlags::parse(reader)?;
        let this_class = ClassConstantIndex::parse(reader)?;
        let super_class = ClassConstantIndex::parse(reader)?;
        let interfaces: Vec<ClassConstantIndex> = Vec::parse(reader)?;

        let field_count = u16::parse(reader)?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(Field::parse_with_pool(reader, &constants)?);
        }

        let method_count = u16::parse(reader)?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(Method::parse_with_pool(reader, &constants)?);
        }

        let attribute_count = u16::parse(reader)?;
        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            attributes.push(Attribute::parse_with_pool(reader, &constants)?);
        }

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Parse a class file from a byte slice
    pub fn parse_bytes(bytes: &[u8]) -> Result<ClassFile, ParseError> {
        let mut cursor = std::io::Cursor::new(bytes);
        ClassFile::parse(&mut cursor)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class_file::ConstantPool;

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52];
        assert!(matches!(
            ClassFile::parse_bytes(&bytes),
            Err(ParseError::BadMagic(0xDEADBEEF))
        ));
    }

    #[test]
    fn minimal_class_round_trips() {
        let mut constants = ConstantPool::new();
        let this_class = constants.get_class_of("me/Example").unwrap();
        let super_class = constants.get_class_of("java/lang/Object").unwrap();

        let class = ClassFile {
            version: Version::JAVA8,
            constants: constants.into_offset_vec(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        };

        let mut bytes = vec![];
        class.serialize(&mut bytes).unwrap();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

        let reparsed = ClassFile::parse_bytes(&bytes).unwrap();
        assert_eq!(reparsed, class);
    }
}
