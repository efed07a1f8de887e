use crate::binary::{Deserialize, Serialize};
use crate::errors::ParseError;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Class file version
///
/// The version determines which features the JVM running the class file must support. Note that
/// the minor version comes before the major version in the serialized format.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-B.2
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Version {
    pub minor_version: u16,
    pub major_version: u16,
}

impl Version {
    /// Java 8 (the earliest version with `invokedynamic` and `StackMapTable` both settled)
    pub const JAVA8: Version = Version {
        minor_version: 0,
        major_version: 52,
    };

    pub const JAVA11: Version = Version {
        minor_version: 0,
        major_version: 55,
    };
}

impl Default for Version {
    fn default() -> Version {
        Version::JAVA8
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<Version, ParseError> {
        Ok(Version {
            minor_version: u16::parse(reader)?,
            major_version: u16::parse(reader)?,
        })
    }
}
