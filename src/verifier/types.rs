use crate::binary::{Deserialize, Serialize};
use crate::class_file::ClassConstantIndex;
use crate::errors::ParseError;
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Verification type, as found in stack map frames
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.10.1.2
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VerificationType {
    /// Unusable slot (the upper half of a category-2 value, or a local killed by an overlapping
    /// store)
    Top,

    Integer,
    Float,
    Double,
    Long,

    /// Result of `aconst_null`, assignable to any reference type
    Null,

    /// `this` in a constructor, before the superclass constructor has run
    UninitializedThis,

    /// Object reference of the given class
    Object(ClassConstantIndex),

    /// Result of a `new` whose constructor has not yet run, identified by the bytecode offset of
    /// the `new` instruction
    Uninitialized(u16),
}

impl VerificationType {
    /// Subtype check, as far as it can go without a class hierarchy
    ///
    /// `Null` is assignable to every reference type and everything is assignable to `Top`.
    /// Distinct `Object` entries are only known to be assignable when they are equal.
    pub fn is_assignable(sub_type: &Self, super_type: &Self) -> bool {
        match (sub_type, super_type) {
            (_, VerificationType::Top) => true,
            (VerificationType::Null, VerificationType::Object(_)) => true,
            (t1, t2) => t1 == t2,
        }
    }
}

/// Category-2 types (`long` and `double`) occupy two slots in locals and on the stack
impl Width for VerificationType {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl Serialize for VerificationType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(class) => {
                7u8.serialize(writer)?;
                class.serialize(writer)?;
            }
            VerificationType::Uninitialized(offset) => {
                8u8.serialize(writer)?;
                offset.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<VerificationType, ParseError> {
        Ok(match u8::parse(reader)? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(ClassConstantIndex::parse(reader)?),
            8 => VerificationType::Uninitialized(u16::parse(reader)?),
            tag => return Err(ParseError::UnknownVerificationTag(tag)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class_file::ConstantIndex;

    #[test]
    fn assignability() {
        let object = VerificationType::Object(ClassConstantIndex(ConstantIndex(2)));
        let other = VerificationType::Object(ClassConstantIndex(ConstantIndex(3)));

        assert!(VerificationType::is_assignable(&VerificationType::Null, &object));
        assert!(VerificationType::is_assignable(&object, &object));
        assert!(!VerificationType::is_assignable(&object, &other));
        assert!(VerificationType::is_assignable(&VerificationType::Long, &VerificationType::Top));
        assert!(!VerificationType::is_assignable(
            &VerificationType::Integer,
            &VerificationType::Float
        ));
    }

    #[test]
    fn category_two_types_are_wide() {
        assert_eq!(VerificationType::Long.width(), 2);
        assert_eq!(VerificationType::Double.width(), 2);
        assert_eq!(VerificationType::Null.width(), 1);
        assert_eq!(VerificationType::Top.width(), 1);
    }
}
