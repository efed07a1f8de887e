use crate::class_file::{Constant, ConstantIndex};
use crate::code::Label;
use crate::util::Offset;
use std::fmt;

/// Errors raised while assembling a class file
///
/// These all indicate a malformed input handed to the assembler (or an I/O failure in the
/// underlying sink). Assembly is deterministic, so none of these are transient: a failed build
/// must be discarded, not retried.
#[derive(Debug)]
pub enum Error {
    /// Adding this constant would push the pool past the `u16` index space
    ConstantPoolOverflow { constant: Constant, offset: usize },

    IoError(std::io::Error),

    /// An instruction tried to pop from an empty simulated operand stack
    OperandStackUnderflow,

    /// A stack operation expected an operand of a different category width
    InvalidOperandWidth { expected: usize, found: usize },

    /// A branch or exception handler refers to a label that was never placed
    UnboundLabel(Label),

    /// The same label was placed twice
    DuplicateLabel(Label),

    /// A local variable access before any store/parameter seeded that slot
    InvalidLocalIndex(u16),

    /// The constant is not of the kind the instruction requires (eg. `ldc` of a `long`)
    NotLoadableConstant(Constant),

    /// An instruction refers to a constant pool index with no entry behind it
    MissingConstant(ConstantIndex),

    /// A field or method descriptor string failed to parse
    BadDescriptor(String),

    /// A resolved branch target does not fit in a signed 16-bit relative offset
    BranchOffsetOverflow { at: Offset, target: Offset },

    /// Method body larger than the `u16` program counter space
    MethodCodeOverflow(Offset),
    MethodCodeMaxStackOverflow(Offset),
    MethodCodeMaxLocalsOverflow(Offset),

    /// A `CatchRangeStart` marker was never closed by a matching `CatchRangeEnd`
    UnclosedCatchRange(Label),

    /// A `CatchRangeEnd` marker with no `CatchRangeStart` still open
    CatchRangeEndWithoutStart,

    /// Two distinct frames were recorded for the same bytecode offset
    ConflictingFrames(Offset),

    /// The given value cannot be represented by any form of the instruction
    InvalidImmediate {
        instruction: &'static str,
        value: i64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { constant, offset } => write!(
                f,
                "constant pool overflow adding {constant:?} at index {offset}"
            ),
            Error::IoError(err) => write!(f, "i/o error: {err}"),
            Error::OperandStackUnderflow => write!(f, "operand stack underflow"),
            Error::InvalidOperandWidth { expected, found } => write!(
                f,
                "operand of width {found} where width {expected} is required"
            ),
            Error::UnboundLabel(label) => write!(f, "label {label:?} is never placed"),
            Error::DuplicateLabel(label) => write!(f, "label {label:?} placed twice"),
            Error::InvalidLocalIndex(index) => write!(f, "invalid local variable index {index}"),
            Error::NotLoadableConstant(constant) => {
                write!(f, "constant {constant:?} cannot be loaded here")
            }
            Error::MissingConstant(index) => {
                write!(f, "no constant pool entry at index {}", index.0)
            }
            Error::BadDescriptor(descriptor) => write!(f, "bad descriptor '{descriptor}'"),
            Error::BranchOffsetOverflow { at, target } => write!(
                f,
                "branch at {} to {} does not fit in a signed 16-bit offset",
                at.0, target.0
            ),
            Error::MethodCodeOverflow(offset) => {
                write!(f, "method code size {} overflows a u16", offset.0)
            }
            Error::MethodCodeMaxStackOverflow(offset) => {
                write!(f, "max stack {} overflows a u16", offset.0)
            }
            Error::MethodCodeMaxLocalsOverflow(offset) => {
                write!(f, "max locals {} overflows a u16", offset.0)
            }
            Error::UnclosedCatchRange(label) => {
                write!(f, "catch range with handler {label:?} is never closed")
            }
            Error::CatchRangeEndWithoutStart => {
                write!(f, "catch range end marker with no open catch range")
            }
            Error::ConflictingFrames(offset) => {
                write!(f, "conflicting stack map frames at offset {}", offset.0)
            }
            Error::InvalidImmediate { instruction, value } => {
                write!(f, "immediate {value} out of range for {instruction}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

/// Errors raised while parsing a class file
///
/// Parsing aborts on the first structural error; no partial class model is returned.
#[derive(Debug)]
pub enum ParseError {
    /// Input ended before the structure it declared was complete
    UnexpectedEof,

    Io(std::io::Error),

    /// Stream does not start with `0xCAFEBABE`
    BadMagic(u32),

    UnknownConstantTag(u8),

    UnknownHandleKind(u8),

    UnknownOpcode { opcode: u8, offset: usize },

    /// Attribute whose name this parser does not understand
    UnknownAttribute(String),

    /// Verification type tag outside 0..=8
    UnknownVerificationTag(u8),

    /// Stack map frame tag in the reserved range
    UnknownFrameTag(u8),

    /// Attribute body shorter or longer than its declared `u4` length
    AttributeLengthMismatch {
        attribute: String,
        declared: u32,
        consumed: u32,
    },

    /// `tableswitch` whose declared bounds are inverted
    InvertedSwitchBounds { low: i32, high: i32, offset: usize },

    /// `lookupswitch` declaring a negative number of match pairs
    NegativeSwitchPairs { count: i32, offset: usize },

    /// The last pool entry's second slot extends past the declared pool count
    ConstantPoolCountMismatch { declared: u16, found: usize },

    /// Index that points past the pool or into the unusable slot after a `long`/`double`
    BadConstantIndex(u16),

    /// The referenced pool entry is of the wrong kind (eg. a `Class` where `Utf8` is required)
    WrongConstantKind { index: u16, expected: &'static str },

    /// Ill-formed modified UTF-8 in a `Utf8` pool entry
    ModifiedUtf8(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseError::Io(err) => write!(f, "i/o error: {err}"),
            ParseError::BadMagic(magic) => write!(f, "bad magic 0x{magic:08x}"),
            ParseError::UnknownConstantTag(tag) => write!(f, "unknown constant pool tag {tag}"),
            ParseError::UnknownHandleKind(kind) => write!(f, "unknown method handle kind {kind}"),
            ParseError::UnknownOpcode { opcode, offset } => {
                write!(f, "unknown opcode 0x{opcode:02x} at code offset {offset}")
            }
            ParseError::UnknownAttribute(name) => write!(f, "unknown attribute '{name}'"),
            ParseError::UnknownVerificationTag(tag) => {
                write!(f, "unknown verification type tag {tag}")
            }
            ParseError::UnknownFrameTag(tag) => write!(f, "unknown stack map frame tag {tag}"),
            ParseError::AttributeLengthMismatch {
                attribute,
                declared,
                consumed,
            } => write!(
                f,
                "attribute '{attribute}' declared {declared} bytes but contains {consumed}"
            ),
            ParseError::InvertedSwitchBounds { low, high, offset } => write!(
                f,
                "tableswitch at code offset {offset} has low {low} greater than high {high}"
            ),
            ParseError::NegativeSwitchPairs { count, offset } => write!(
                f,
                "lookupswitch at code offset {offset} declares {count} match pairs"
            ),
            ParseError::ConstantPoolCountMismatch { declared, found } => write!(
                f,
                "constant pool uses {found} index slots but declares {declared}"
            ),
            ParseError::BadConstantIndex(index) => {
                write!(f, "bad constant pool index {index}")
            }
            ParseError::WrongConstantKind { index, expected } => {
                write!(f, "constant pool index {index} is not a {expected}")
            }
            ParseError::ModifiedUtf8(msg) => write!(f, "modified utf-8 error: {msg}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> ParseError {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseError::UnexpectedEof
        } else {
            ParseError::Io(err)
        }
    }
}
