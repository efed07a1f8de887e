use crate::binary::{Deserialize, Serialize};
use crate::class_file::constants::{utf8_at, ClassConstantIndex, Constant, ConstantIndex, Utf8ConstantIndex};
use crate::code::RawInstruction;
use crate::errors::ParseError;
use crate::util::OffsetVec;
use crate::verifier::VerificationType;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// The name index and the `u4` body length are written here; the body itself is a typed
/// [`AttributeInfo`]. Keeping the info structured (instead of a raw byte vector) is what lets
/// parsed class files round-trip through the model.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Debug, PartialEq)]
pub struct Attribute {
    pub name_index: Utf8ConstantIndex,
    pub info: AttributeInfo,
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name_index.serialize(writer)?;

        // The body must be buffered: its length in bytes comes first
        let mut info: Vec<u8> = vec![];
        self.info.serialize(&mut info)?;
        (info.len() as u32).serialize(writer)?;
        writer.write_all(&info)?;

        Ok(())
    }
}

impl Attribute {
    /// Read an attribute, resolving its name against the constant pool
    ///
    /// The entire declared body is read up front, then decoded according to the name. A body
    /// that decodes short or long of its declared length is an error, as is a name this parser
    /// does not know.
    pub fn parse_with_pool<R: ReadBytesExt>(
        reader: &mut R,
        constants: &OffsetVec<Constant>,
    ) -> Result<Attribute, ParseError> {
        let name_index = Utf8ConstantIndex::parse(reader)?;
        let name = utf8_at(constants, name_index)?.to_string();

        let declared = u32::parse(reader)?;
        let mut body = vec![0u8; declared as usize];
        reader.read_exact(&mut body)?;
        let mut body = Cursor::new(body);

        let info = match name.as_str() {
            "Code" => AttributeInfo::Code(Code::parse_with_pool(&mut body, constants)?),
            "StackMapTable" => AttributeInfo::StackMapTable(StackMapTable::parse(&mut body)?),
            "ConstantValue" => {
                AttributeInfo::ConstantValue(ConstantValue(ConstantIndex::parse(&mut body)?))
            }
            "Exceptions" => AttributeInfo::Exceptions(Exceptions(Vec::parse(&mut body)?)),
            "BootstrapMethods" => {
                AttributeInfo::BootstrapMethods(BootstrapMethods(Vec::parse(&mut body)?))
            }
            "SourceFile" => {
                AttributeInfo::SourceFile(SourceFile(Utf8ConstantIndex::parse(&mut body)?))
            }
            "Signature" => AttributeInfo::Signature(Signature {
                signature: Utf8ConstantIndex::parse(&mut body)?,
            }),
            "LineNumberTable" => {
                AttributeInfo::LineNumberTable(LineNumberTable(Vec::parse(&mut body)?))
            }
            "LocalVariableTable" => {
                AttributeInfo::LocalVariableTable(LocalVariableTable(Vec::parse(&mut body)?))
            }
            _ => return Err(ParseError::UnknownAttribute(name)),
        };

        let consumed = body.position() as u32;
        if consumed != declared {
            return Err(ParseError::AttributeLengthMismatch {
                attribute: name,
                declared,
                consumed,
            });
        }

        Ok(Attribute { name_index, info })
    }
}

/// Typed attribute bodies
///
/// This is a closed set: attribute names outside it are rejected at parse time.
#[derive(Debug, PartialEq)]
pub enum AttributeInfo {
    Code(Code),
    StackMapTable(StackMapTable),
    ConstantValue(ConstantValue),
    Exceptions(Exceptions),
    BootstrapMethods(BootstrapMethods),
    SourceFile(SourceFile),
    Signature(Signature),
    LineNumberTable(LineNumberTable),
    LocalVariableTable(LocalVariableTable),
}

impl AttributeInfo {
    /// The name under which this body is stored (and interned into the constant pool)
    pub fn name(&self) -> &'static str {
        match self {
            AttributeInfo::Code(_) => "Code",
            AttributeInfo::StackMapTable(_) => "StackMapTable",
            AttributeInfo::ConstantValue(_) => "ConstantValue",
            AttributeInfo::Exceptions(_) => "Exceptions",
            AttributeInfo::BootstrapMethods(_) => "BootstrapMethods",
            AttributeInfo::SourceFile(_) => "SourceFile",
            AttributeInfo::Signature(_) => "Signature",
            AttributeInfo::LineNumberTable(_) => "LineNumberTable",
            AttributeInfo::LocalVariableTable(_) => "LocalVariableTable",
        }
    }
}

impl Serialize for AttributeInfo {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            AttributeInfo::Code(code) => code.serialize(writer),
            AttributeInfo::StackMapTable(table) => table.serialize(writer),
            AttributeInfo::ConstantValue(value) => value.0.serialize(writer),
            AttributeInfo::Exceptions(exceptions) => exceptions.0.serialize(writer),
            AttributeInfo::BootstrapMethods(methods) => methods.0.serialize(writer),
            AttributeInfo::SourceFile(source_file) => source_file.0.serialize(writer),
            AttributeInfo::Signature(signature) => signature.signature.serialize(writer),
            AttributeInfo::LineNumberTable(table) => table.0.serialize(writer),
            AttributeInfo::LocalVariableTable(table) => table.0.serialize(writer),
        }
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: OffsetVec<RawInstruction>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;

        // Code length is a `u4`, unlike almost every other length in the format
        let mut code: Vec<u8> = vec![];
        for (_, _, insn) in self.code.iter() {
            insn.serialize(&mut code)?;
        }
        (code.len() as u32).serialize(writer)?;
        writer.write_all(&code)?;

        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Code {
    pub fn parse_with_pool<R: ReadBytesExt>(
        reader: &mut R,
        constants: &OffsetVec<Constant>,
    ) -> Result<Code, ParseError> {
        let max_stack = u16::parse(reader)?;
        let max_locals = u16::parse(reader)?;

        let code_length = u32::parse(reader)?;
        let mut bytes = vec![0u8; code_length as usize];
        reader.read_exact(&mut bytes)?;

        let mut code: OffsetVec<RawInstruction> = OffsetVec::new();
        let mut cursor = Cursor::new(bytes);
        while (cursor.position() as usize) < code_length as usize {
            let offset = cursor.position() as usize;
            let insn = RawInstruction::parse(&mut cursor, offset)?;
            code.push(insn);
        }

        let exception_table = Vec::parse(reader)?;

        let attribute_count = u16::parse(reader)?;
        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            attributes.push(Attribute::parse_with_pool(reader, constants)?);
        }

        Ok(Code {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the covered range (inclusive)
    pub start_pc: u16,

    /// End of the covered range (exclusive)
    pub end_pc: u16,

    /// Start of the exception handler
    pub handler_pc: u16,

    /// Class of exceptions covered (index 0 catches everything)
    pub catch_type: ClassConstantIndex,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ExceptionHandler {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<ExceptionHandler, ParseError> {
        Ok(ExceptionHandler {
            start_pc: u16::parse(reader)?,
            end_pc: u16::parse(reader)?,
            handler_pc: u16::parse(reader)?,
            catch_type: ClassConstantIndex::parse(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, PartialEq)]
pub struct StackMapTable(pub Vec<StackMapFrame>);

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for StackMapTable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<StackMapTable, ParseError> {
        Ok(StackMapTable(Vec::parse(reader)?))
    }
}

#[derive(Debug, PartialEq)]
pub enum StackMapFrame {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack {
        offset_delta: u16,
        stack: VerificationType,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<VerificationType>,
    },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

impl Serialize for StackMapFrame {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                assert!(
                    0 < *chopped_k && *chopped_k < 4,
                    "ChopLocalsNoStack chops 1-3 locals"
                );
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                let added_k = locals.len();
                assert!(
                    0 < added_k && added_k < 4,
                    "AppendLocalsNoStack adds 1-3 locals"
                );
                (251 + added_k as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for StackMapFrame {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<StackMapFrame, ParseError> {
        Ok(match u8::parse(reader)? {
            tag @ 0..=63 => StackMapFrame::SameLocalsNoStack {
                offset_delta: tag as u16,
            },
            tag @ 64..=127 => StackMapFrame::SameLocalsOneStack {
                offset_delta: (tag - 64) as u16,
                stack: VerificationType::parse(reader)?,
            },
            247 => StackMapFrame::SameLocalsOneStack {
                offset_delta: u16::parse(reader)?,
                stack: VerificationType::parse(reader)?,
            },
            tag @ 248..=250 => StackMapFrame::ChopLocalsNoStack {
                offset_delta: u16::parse(reader)?,
                chopped_k: 251 - tag,
            },
            251 => StackMapFrame::SameLocalsNoStack {
                offset_delta: u16::parse(reader)?,
            },
            tag @ 252..=254 => {
                let offset_delta = u16::parse(reader)?;
                let added_k = tag - 251;
                let mut locals = Vec::with_capacity(added_k as usize);
                for _ in 0..added_k {
                    locals.push(VerificationType::parse(reader)?);
                }
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            255 => StackMapFrame::Full {
                offset_delta: u16::parse(reader)?,
                locals: Vec::parse(reader)?,
                stack: Vec::parse(reader)?,
            },
            tag => return Err(ParseError::UnknownFrameTag(tag)),
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.2
#[derive(Debug, PartialEq, Eq)]
pub struct ConstantValue(pub ConstantIndex);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.5
#[derive(Debug, PartialEq, Eq)]
pub struct Exceptions(pub Vec<ClassConstantIndex>);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.23
#[derive(Debug, PartialEq, Eq)]
pub struct BootstrapMethods(pub Vec<BootstrapMethod>);

#[derive(Debug, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub bootstrap_method: ConstantIndex,
    pub bootstrap_arguments: Vec<ConstantIndex>,
}

impl Serialize for BootstrapMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bootstrap_method.serialize(writer)?;
        self.bootstrap_arguments.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for BootstrapMethod {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<BootstrapMethod, ParseError> {
        Ok(BootstrapMethod {
            bootstrap_method: ConstantIndex::parse(reader)?,
            bootstrap_arguments: Vec::parse(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.10
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile(pub Utf8ConstantIndex);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.9
#[derive(Debug, PartialEq, Eq)]
pub struct Signature {
    pub signature: Utf8ConstantIndex,
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.12
#[derive(Debug, PartialEq, Eq)]
pub struct LineNumberTable(pub Vec<LineNumber>);

#[derive(Debug, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.line_number.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LineNumber {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<LineNumber, ParseError> {
        Ok(LineNumber {
            start_pc: u16::parse(reader)?,
            line_number: u16::parse(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.13
#[derive(Debug, PartialEq, Eq)]
pub struct LocalVariableTable(pub Vec<LocalVariable>);

#[derive(Debug, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub index: u16,
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.index.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LocalVariable {
    fn parse<R: ReadBytesExt>(reader: &mut R) -> Result<LocalVariable, ParseError> {
        Ok(LocalVariable {
            start_pc: u16::parse(reader)?,
            length: u16::parse(reader)?,
            name_index: Utf8ConstantIndex::parse(reader)?,
            descriptor_index: Utf8ConstantIndex::parse(reader)?,
            index: u16::parse(reader)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn serialized(frame: &StackMapFrame) -> Vec<u8> {
        let mut buffer = vec![];
        frame.serialize(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn small_deltas_use_compact_frame_tags() {
        assert_eq!(
            serialized(&StackMapFrame::SameLocalsNoStack { offset_delta: 5 }),
            vec![5]
        );
        assert_eq!(
            serialized(&StackMapFrame::SameLocalsOneStack {
                offset_delta: 5,
                stack: VerificationType::Integer,
            }),
            vec![69, 1]
        );
    }

    #[test]
    fn large_deltas_use_extended_frame_tags() {
        assert_eq!(
            serialized(&StackMapFrame::SameLocalsNoStack { offset_delta: 64 }),
            vec![251, 0, 64]
        );
        assert_eq!(
            serialized(&StackMapFrame::SameLocalsOneStack {
                offset_delta: 100,
                stack: VerificationType::Null,
            }),
            vec![247, 0, 100, 5]
        );
    }

    #[test]
    fn chop_and_append_tags() {
        assert_eq!(
            serialized(&StackMapFrame::ChopLocalsNoStack {
                offset_delta: 2,
                chopped_k: 3,
            }),
            vec![248, 0, 2]
        );
        assert_eq!(
            serialized(&StackMapFrame::AppendLocalsNoStack {
                offset_delta: 2,
                locals: vec![VerificationType::Long],
            }),
            vec![252, 0, 2, 4]
        );
    }

    #[test]
    fn frames_parse_back() {
        let frames = vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 63 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 64 },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 0,
                stack: VerificationType::Integer,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 8,
                chopped_k: 2,
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 90,
                locals: vec![VerificationType::Integer, VerificationType::Double],
            },
            StackMapFrame::Full {
                offset_delta: 17,
                locals: vec![VerificationType::Top, VerificationType::Float],
                stack: vec![VerificationType::Null],
            },
        ];

        for frame in frames {
            let mut cursor = Cursor::new(serialized(&frame));
            assert_eq!(StackMapFrame::parse(&mut cursor).unwrap(), frame);
        }
    }

    #[test]
    fn reserved_frame_tags_are_rejected() {
        let mut cursor = Cursor::new(vec![200u8]);
        assert!(matches!(
            StackMapFrame::parse(&mut cursor),
            Err(ParseError::UnknownFrameTag(200))
        ));
    }
}
