use crate::binary::Serialize;
use crate::class_file::{
    ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, InvokeDynamicConstantIndex,
    MethodRefConstantIndex,
};
use crate::descriptors::BaseType;
use crate::errors::ParseError;
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Fully resolved JVM bytecode instruction
///
/// At this stage every operand is a concrete value: branch targets are relative byte offsets,
/// constant references are pool indices, and switch padding has been fixed. The instruction knows
/// its own width, so an `OffsetVec<RawInstruction>` models a code array exactly.
///
/// Instructions with several encodings (`ldc` vs. `ldc_w`, the short/byte/wide forms of loads and
/// stores, `iinc` vs. `wide iinc`) are single variants here; the narrowest encoding that fits the
/// operand is chosen at write time and the same rule makes widths deterministic.
///
/// `jsr`, `ret`, and `multianewarray` are intentionally absent.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-6.html
#[derive(Clone, Debug, PartialEq)]
pub enum RawInstruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantIndex),  // covers both `ldc` and `ldc_w`
    Ldc2(ConstantIndex), // always wide, unlike `ldc` vs. `ldc_w`
    ILoad(u16),
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16),
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType),
    LSh(ShiftType),
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode),
    DCmp(CompareMode),
    If(OrdComparison, i16), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, i16), // covers `if_icmpeq` through `if_icmple`
    IfACmp(EqComparison, i16), // covers `if_acmpeq` and `if_acmpne`
    IfNull(EqComparison, i16), // covers `ifnull` and `ifnonnull`
    Goto(i16),
    GotoW(i32),
    TableSwitch {
        padding: u8,
        default: i32,
        low: i32,
        targets: Vec<i32>,
    },
    LookupSwitch {
        padding: u8,
        default: i32,
        targets: Vec<(i32, i32)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRefConstantIndex),
    PutStatic(FieldRefConstantIndex),
    GetField(FieldRefConstantIndex),
    PutField(FieldRefConstantIndex),
    InvokeVirtual(MethodRefConstantIndex),
    InvokeSpecial(MethodRefConstantIndex),
    InvokeStatic(MethodRefConstantIndex),
    /// The `u8` is the historical argument slot count operand
    InvokeInterface(MethodRefConstantIndex, u8),
    InvokeDynamic(InvokeDynamicConstantIndex),
    New(ClassConstantIndex),
    NewArray(BaseType),
    ANewArray(ClassConstantIndex),
    ArrayLength,
    AThrow,
    CheckCast(ClassConstantIndex),
    InstanceOf(ClassConstantIndex),
    MonitorEnter,
    MonitorExit,
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Branch comparisons against zero or between two `int` operands
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

/// Branch comparisons that only make sense as equality checks
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Size of the instruction in the code array, in bytes
///
/// Variable-length encodings report the width of the form their operands force, so offsets
/// accumulated over an `OffsetVec<RawInstruction>` match the serialized byte positions exactly.
impl Width for RawInstruction {
    fn width(&self) -> usize {
        use RawInstruction::*;
        match self {
            BiPush(_) | NewArray(_) => 2,
            SiPush(_) => 3,
            Ldc(ConstantIndex(idx)) => {
                if *idx <= u8::MAX as u16 {
                    2
                } else {
                    3
                }
            }
            Ldc2(_) => 3,
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) | IStore(idx)
            | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) => match idx {
                0..=3 => 1,
                4..=255 => 2,
                _ => 4,
            },
            IInc(idx, diff) => {
                if *idx <= u8::MAX as u16 && i8::try_from(*diff).is_ok() {
                    3
                } else {
                    6
                }
            }
            If(_, _) | IfICmp(_, _) | IfACmp(_, _) | IfNull(_, _) | Goto(_) => 3,
            GotoW(_) => 5,
            TableSwitch {
                padding, targets, ..
            } => 1 + *padding as usize + 4 * (3 + targets.len()),
            LookupSwitch {
                padding, targets, ..
            } => 1 + *padding as usize + 8 * (1 + targets.len()),
            GetStatic(_) | PutStatic(_) | GetField(_) | PutField(_) | InvokeVirtual(_)
            | InvokeSpecial(_) | InvokeStatic(_) | New(_) | ANewArray(_) | CheckCast(_)
            | InstanceOf(_) => 3,
            InvokeInterface(_, _) | InvokeDynamic(_) => 5,
            _ => 1,
        }
    }
}

impl Serialize for RawInstruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `iload` plus a byte operand
         *   - wide form (255-65535) use `wide iload` plus two byte operands
         */
        fn serialize_load_or_store<W: WriteBytesExt>(
            idx: u16,
            short_form_start: u8,
            normal_form: u8,
            writer: &mut W,
        ) -> Result<()> {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => (short_form_start + n).serialize(writer),
                Ok(n) => {
                    normal_form.serialize(writer)?;
                    n.serialize(writer)
                }
                Err(_) => {
                    0xC4u8.serialize(writer)?;
                    normal_form.serialize(writer)?;
                    idx.serialize(writer)
                }
            }
        }

        match self {
            RawInstruction::Nop => 0x00u8.serialize(writer)?,
            RawInstruction::AConstNull => 0x01u8.serialize(writer)?,
            RawInstruction::IConstM1 => 0x02u8.serialize(writer)?,
            RawInstruction::IConst0 => 0x03u8.serialize(writer)?,
            RawInstruction::IConst1 => 0x04u8.serialize(writer)?,
            RawInstruction::IConst2 => 0x05u8.serialize(writer)?,
            RawInstruction::IConst3 => 0x06u8.serialize(writer)?,
            RawInstruction::IConst4 => 0x07u8.serialize(writer)?,
            RawInstruction::IConst5 => 0x08u8.serialize(writer)?,
            RawInstruction::LConst0 => 0x09u8.serialize(writer)?,
            RawInstruction::LConst1 => 0x0au8.serialize(writer)?,
            RawInstruction::FConst0 => 0x0bu8.serialize(writer)?,
            RawInstruction::FConst1 => 0x0cu8.serialize(writer)?,
            RawInstruction::FConst2 => 0x0du8.serialize(writer)?,
            RawInstruction::DConst0 => 0x0eu8.serialize(writer)?,
            RawInstruction::DConst1 => 0x0fu8.serialize(writer)?,
            RawInstruction::BiPush(b) => {
                0x10u8.serialize(writer)?;
                b.serialize(writer)?;
            }
            RawInstruction::SiPush(s) => {
                0x11u8.serialize(writer)?;
                s.serialize(writer)?;
            }
            RawInstruction::Ldc(ConstantIndex(idx)) => match u8::try_from(*idx) {
                Ok(b) => {
                    0x12u8.serialize(writer)?;
                    b.serialize(writer)?;
                }
                Err(_) => {
                    0x13u8.serialize(writer)?;
                    idx.serialize(writer)?;
                }
            },
            RawInstruction::Ldc2(ConstantIndex(idx)) => {
                0x14u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::ILoad(idx) => serialize_load_or_store(*idx, 0x1A, 0x15, writer)?,
            RawInstruction::LLoad(idx) => serialize_load_or_store(*idx, 0x1E, 0x16, writer)?,
            RawInstruction::FLoad(idx) => serialize_load_or_store(*idx, 0x22, 0x17, writer)?,
            RawInstruction::DLoad(idx) => serialize_load_or_store(*idx, 0x26, 0x18, writer)?,
            RawInstruction::ALoad(idx) => serialize_load_or_store(*idx, 0x2A, 0x19, writer)?,
            RawInstruction::IALoad => 0x2eu8.serialize(writer)?,
            RawInstruction::LALoad => 0x2fu8.serialize(writer)?,
            RawInstruction::FALoad => 0x30u8.serialize(writer)?,
            RawInstruction::DALoad => 0x31u8.serialize(writer)?,
            RawInstruction::AALoad => 0x32u8.serialize(writer)?,
            RawInstruction::BALoad => 0x33u8.serialize(writer)?,
            RawInstruction::CALoad => 0x34u8.serialize(writer)?,
            RawInstruction::SALoad => 0x35u8.serialize(writer)?,
            RawInstruction::IStore(idx) => serialize_load_or_store(*idx, 0x3B, 0x36, writer)?,
            RawInstruction::LStore(idx) => serialize_load_or_store(*idx, 0x3F, 0x37, writer)?,
            RawInstruction::FStore(idx) => serialize_load_or_store(*idx, 0x43, 0x38, writer)?,
            RawInstruction::DStore(idx) => serialize_load_or_store(*idx, 0x47, 0x39, writer)?,
            RawInstruction::AStore(idx) => serialize_load_or_store(*idx, 0x4B, 0x3A, writer)?,
            RawInstruction::IAStore => 0x4fu8.serialize(writer)?,
            RawInstruction::LAStore => 0x50u8.serialize(writer)?,
            RawInstruction::FAStore => 0x51u8.serialize(writer)?,
            RawInstruction::DAStore => 0x52u8.serialize(writer)?,
            RawInstruction::AAStore => 0x53u8.serialize(writer)?,
            RawInstruction::BAStore => 0x54u8.serialize(writer)?,
            RawInstruction::CAStore => 0x55u8.serialize(writer)?,
            RawInstruction::SAStore => 0x56u8.serialize(writer)?,
            RawInstruction::Pop => 0x57u8.serialize(writer)?,
            RawInstruction::Pop2 => 0x58u8.serialize(writer)?,
            RawInstruction::Dup => 0x59u8.serialize(writer)?,
            RawInstruction::DupX1 => 0x5au8.serialize(writer)?,
            RawInstruction::DupX2 => 0x5bu8.serialize(writer)?,
            RawInstruction::Dup2 => 0x5cu8.serialize(writer)?,
            RawInstruction::Dup2X1 => 0x5du8.serialize(writer)?,
            RawInstruction::Dup2X2 => 0x5eu8.serialize(writer)?,
            RawInstruction::Swap => 0x5fu8.serialize(writer)?,
            RawInstruction::IAdd => 0x60u8.serialize(writer)?,
            RawInstruction::LAdd => 0x61u8.serialize(writer)?,
            RawInstruction::FAdd => 0x62u8.serialize(writer)?,
            RawInstruction::DAdd => 0x63u8.serialize(writer)?,
            RawInstruction::ISub => 0x64u8.serialize(writer)?,
            RawInstruction::LSub => 0x65u8.serialize(writer)?,
            RawInstruction::FSub => 0x66u8.serialize(writer)?,
            RawInstruction::DSub => 0x67u8.serialize(writer)?,
            RawInstruction::IMul => 0x68u8.serialize(writer)?,
            RawInstruction::LMul => 0x69u8.serialize(writer)?,
            RawInstruction::FMul => 0x6au8.serialize(writer)?,
            RawInstruction::DMul => 0x6bu8.serialize(writer)?,
            RawInstruction::IDiv => 0x6cu8.serialize(writer)?,
            RawInstruction::LDiv => 0x6du8.serialize(writer)?,
            RawInstruction::FDiv => 0x6eu8.serialize(writer)?,
            RawInstruction::DDiv => 0x6fu8.serialize(writer)?,
            RawInstruction::IRem => 0x70u8.serialize(writer)?,
            RawInstruction::LRem => 0x71u8.serialize(writer)?,
            RawInstruction::FRem => 0x72u8.serialize(writer)?,
            RawInstruction::DRem => 0x73u8.serialize(writer)?,
            RawInstruction::INeg => 0x74u8.serialize(writer)?,
            RawInstruction::LNeg => 0x75u8.serialize(writer)?,
            RawInstruction::FNeg => 0x76u8.serialize(writer)?,
            RawInstruction::DNeg => 0x77u8.serialize(writer)?,
            RawInstruction::ISh(ShiftType::Left) => 0x78u8.serialize(writer)?,
            RawInstruction::LSh(ShiftType::Left) => 0x79u8.serialize(writer)?,
            RawInstruction::ISh(ShiftType::ArithmeticRight) => 0x7au8.serialize(writer)?,
            RawInstruction::LSh(ShiftType::ArithmeticRight) => 0x7bu8.serialize(writer)?,
            RawInstruction::ISh(ShiftType::LogicalRight) => 0x7cu8.serialize(writer)?,
            RawInstruction::LSh(ShiftType::LogicalRight) => 0x7du8.serialize(writer)?,
            RawInstruction::IAnd => 0x7eu8.serialize(writer)?,
            RawInstruction::LAnd => 0x7fu8.serialize(writer)?,
            RawInstruction::IOr => 0x80u8.serialize(writer)?,
            RawInstruction::LOr => 0x81u8.serialize(writer)?,
            RawInstruction::IXor => 0x82u8.serialize(writer)?,
            RawInstruction::LXor => 0x83u8.serialize(writer)?,
            RawInstruction::IInc(idx, diff) => {
                match (u8::try_from(*idx), i8::try_from(*diff)) {
                    (Ok(b), Ok(d)) => {
                        0x84u8.serialize(writer)?;
                        b.serialize(writer)?;
                        d.serialize(writer)?;
                    }
                    _ => {
                        0xc4u8.serialize(writer)?;
                        0x84u8.serialize(writer)?;
                        idx.serialize(writer)?;
                        diff.serialize(writer)?;
                    }
                }
            }
            RawInstruction::I2L => 0x85u8.serialize(writer)?,
            RawInstruction::I2F => 0x86u8.serialize(writer)?,
            RawInstruction::I2D => 0x87u8.serialize(writer)?,
            RawInstruction::L2I => 0x88u8.serialize(writer)?,
            RawInstruction::L2F => 0x89u8.serialize(writer)?,
            RawInstruction::L2D => 0x8au8.serialize(writer)?,
            RawInstruction::F2I => 0x8bu8.serialize(writer)?,
            RawInstruction::F2L => 0x8cu8.serialize(writer)?,
            RawInstruction::F2D => 0x8du8.serialize(writer)?,
            RawInstruction::D2I => 0x8eu8.serialize(writer)?,
            RawInstruction::D2L => 0x8fu8.serialize(writer)?,
            RawInstruction::D2F => 0x90u8.serialize(writer)?,
            RawInstruction::I2B => 0x91u8.serialize(writer)?,
            RawInstruction::I2C => 0x92u8.serialize(writer)?,
            RawInstruction::I2S => 0x93u8.serialize(writer)?,
            RawInstruction::LCmp => 0x94u8.serialize(writer)?,
            RawInstruction::FCmp(CompareMode::L) => 0x95u8.serialize(writer)?,
            RawInstruction::FCmp(CompareMode::G) => 0x96u8.serialize(writer)?,
            RawInstruction::DCmp(CompareMode::L) => 0x97u8.serialize(writer)?,
            RawInstruction::DCmp(CompareMode::G) => 0x98u8.serialize(writer)?,
            RawInstruction::If(comp, offset) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x99,
                    OrdComparison::NE => 0x9a,
                    OrdComparison::LT => 0x9b,
                    OrdComparison::GE => 0x9c,
                    OrdComparison::GT => 0x9d,
                    OrdComparison::LE => 0x9e,
                };
                opcode.serialize(writer)?;
                offset.serialize(writer)?;
            }
            RawInstruction::IfICmp(comp, offset) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x9f,
                    OrdComparison::NE => 0xa0,
                    OrdComparison::LT => 0xa1,
                    OrdComparison::GE => 0xa2,
                    OrdComparison::GT => 0xa3,
                    OrdComparison::LE => 0xa4,
                };
                opcode.serialize(writer)?;
                offset.serialize(writer)?;
            }
            RawInstruction::IfACmp(comp, offset) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xa5,
                    EqComparison::NE => 0xa6,
                };
                opcode.serialize(writer)?;
                offset.serialize(writer)?;
            }
            RawInstruction::Goto(offset) => {
                0xa7u8.serialize(writer)?;
                offset.serialize(writer)?;
            }
            RawInstruction::TableSwitch {
                padding,
                default,
                low,
                targets,
            } => {
                0xaau8.serialize(writer)?;
                for _ in 0..*padding {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                low.serialize(writer)?;
                (low + targets.len() as i32 - 1).serialize(writer)?;
                for target in targets {
                    target.serialize(writer)?;
                }
            }
            RawInstruction::LookupSwitch {
                padding,
                default,
                targets,
            } => {
                0xabu8.serialize(writer)?;
                for _ in 0..*padding {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                (targets.len() as i32).serialize(writer)?;
                for (key, target) in targets {
                    key.serialize(writer)?;
                    target.serialize(writer)?;
                }
            }
            RawInstruction::IReturn => 0xacu8.serialize(writer)?,
            RawInstruction::LReturn => 0xadu8.serialize(writer)?,
            RawInstruction::FReturn => 0xaeu8.serialize(writer)?,
            RawInstruction::DReturn => 0xafu8.serialize(writer)?,
            RawInstruction::AReturn => 0xb0u8.serialize(writer)?,
            RawInstruction::Return => 0xb1u8.serialize(writer)?,
            RawInstruction::GetStatic(idx) => {
                0xb2u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::PutStatic(idx) => {
                0xb3u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::GetField(idx) => {
                0xb4u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::PutField(idx) => {
                0xb5u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::InvokeVirtual(idx) => {
                0xb6u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::InvokeSpecial(idx) => {
                0xb7u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::InvokeStatic(idx) => {
                0xb8u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::InvokeInterface(idx, count) => {
                0xb9u8.serialize(writer)?;
                idx.serialize(writer)?;
                count.serialize(writer)?;
                0u8.serialize(writer)?;
            }
            RawInstruction::InvokeDynamic(idx) => {
                0xbau8.serialize(writer)?;
                idx.serialize(writer)?;
                0u16.serialize(writer)?;
            }
            RawInstruction::New(idx) => {
                0xbbu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::NewArray(basetype) => {
                let atype: u8 = match basetype {
                    BaseType::Boolean => 4,
                    BaseType::Char => 5,
                    BaseType::Float => 6,
                    BaseType::Double => 7,
                    BaseType::Byte => 8,
                    BaseType::Short => 9,
                    BaseType::Int => 10,
                    BaseType::Long => 11,
                };
                0xbcu8.serialize(writer)?;
                atype.serialize(writer)?;
            }
            RawInstruction::ANewArray(idx) => {
                0xbdu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::ArrayLength => 0xbeu8.serialize(writer)?,
            RawInstruction::AThrow => 0xbfu8.serialize(writer)?,
            RawInstruction::CheckCast(idx) => {
                0xc0u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::InstanceOf(idx) => {
                0xc1u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            RawInstruction::MonitorEnter => 0xc2u8.serialize(writer)?,
            RawInstruction::MonitorExit => 0xc3u8.serialize(writer)?,
            RawInstruction::IfNull(comp, offset) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                opcode.serialize(writer)?;
                offset.serialize(writer)?;
            }
            RawInstruction::GotoW(offset) => {
                0xc8u8.serialize(writer)?;
                offset.serialize(writer)?;
            }
        }
        Ok(())
    }
}

impl RawInstruction {
    /// Decode one instruction
    ///
    /// The instruction's offset in the code array must be supplied, both for the alignment
    /// padding of the switch instructions and for error reporting. Short load/store forms decode
    /// into the canonical index-carrying variants.
    pub fn parse<R: ReadBytesExt>(
        reader: &mut R,
        offset: usize,
    ) -> std::result::Result<RawInstruction, ParseError> {
        use crate::binary::Deserialize;

        let opcode = u8::parse(reader)?;
        let insn = match opcode {
            0x00 => RawInstruction::Nop,
            0x01 => RawInstruction::AConstNull,
            0x02 => RawInstruction::IConstM1,
            0x03 => RawInstruction::IConst0,
            0x04 => RawInstruction::IConst1,
            0x05 => RawInstruction::IConst2,
            0x06 => RawInstruction::IConst3,
            0x07 => RawInstruction::IConst4,
            0x08 => RawInstruction::IConst5,
            0x09 => RawInstruction::LConst0,
            0x0a => RawInstruction::LConst1,
            0x0b => RawInstruction::FConst0,
            0x0c => RawInstruction::FConst1,
            0x0d => RawInstruction::FConst2,
            0x0e => RawInstruction::DConst0,
            0x0f => RawInstruction::DConst1,
            0x10 => RawInstruction::BiPush(i8::parse(reader)?),
            0x11 => RawInstruction::SiPush(i16::parse(reader)?),
            0x12 => RawInstruction::Ldc(ConstantIndex(u8::parse(reader)? as u16)),
            0x13 => RawInstruction::Ldc(ConstantIndex::parse(reader)?),
            0x14 => RawInstruction::Ldc2(ConstantIndex::parse(reader)?),
            0x15 => RawInstruction::ILoad(u8::parse(reader)? as u16),
            0x16 => RawInstruction::LLoad(u8::parse(reader)? as u16),
            0x17 => RawInstruction::FLoad(u8::parse(reader)? as u16),
            0x18 => RawInstruction::DLoad(u8::parse(reader)? as u16),
            0x19 => RawInstruction::ALoad(u8::parse(reader)? as u16),
            op @ 0x1a..=0x1d => RawInstruction::ILoad((op - 0x1a) as u16),
            op @ 0x1e..=0x21 => RawInstruction::LLoad((op - 0x1e) as u16),
            op @ 0x22..=0x25 => RawInstruction::FLoad((op - 0x22) as u16),
            op @ 0x26..=0x29 => RawInstruction::DLoad((op - 0x26) as u16),
            op @ 0x2a..=0x2d => RawInstruction::ALoad((op - 0x2a) as u16),
            0x2e => RawInstruction::IALoad,
            0x2f => RawInstruction::LALoad,
            0x30 => RawInstruction::FALoad,
            0x31 => RawInstruction::DALoad,
            0x32 => RawInstruction::AALoad,
            0x33 => RawInstruction::BALoad,
            0x34 => RawInstruction::CALoad,
            0x35 => RawInstruction::SALoad,
            0x36 => RawInstruction::IStore(u8::parse(reader)? as u16),
            0x37 => RawInstruction::LStore(u8::parse(reader)? as u16),
            0x38 => RawInstruction::FStore(u8::parse(reader)? as u16),
            0x39 => RawInstruction::DStore(u8::parse(reader)? as u16),
            0x3a => RawInstruction::AStore(u8::parse(reader)? as u16),
            op @ 0x3b..=0x3e => RawInstruction::IStore((op - 0x3b) as u16),
            op @ 0x3f..=0x42 => RawInstruction::LStore((op - 0x3f) as u16),
            op @ 0x43..=0x46 => RawInstruction::FStore((op - 0x43) as u16),
            op @ 0x47..=0x4a => RawInstruction::DStore((op - 0x47) as u16),
            op @ 0x4b..=0x4e => RawInstruction::AStore((op - 0x4b) as u16),
            0x4f => RawInstruction::IAStore,
            0x50 => RawInstruction::LAStore,
            0x51 => RawInstruction::FAStore,
            0x52 => RawInstruction::DAStore,
            0x53 => RawInstruction::AAStore,
            0x54 => RawInstruction::BAStore,
            0x55 => RawInstruction::CAStore,
            0x56 => RawInstruction::SAStore,
            0x57 => RawInstruction::Pop,
            0x58 => RawInstruction::Pop2,
            0x59 => RawInstruction::Dup,
            0x5a => RawInstruction::DupX1,
            0x5b => RawInstruction::DupX2,
            0x5c => RawInstruction::Dup2,
            0x5d => RawInstruction::Dup2X1,
            0x5e => RawInstruction::Dup2X2,
            0x5f => RawInstruction::Swap,
            0x60 => RawInstruction::IAdd,
            0x61 => RawInstruction::LAdd,
            0x62 => RawInstruction::FAdd,
            0x63 => RawInstruction::DAdd,
            0x64 => RawInstruction::ISub,
            0x65 => RawInstruction::LSub,
            0x66 => RawInstruction::FSub,
            0x67 => RawInstruction::DSub,
            0x68 => RawInstruction::IMul,
            0x69 => RawInstruction::LMul,
            0x6a => RawInstruction::FMul,
            0x6b => RawInstruction::DMul,
            0x6c => RawInstruction::IDiv,
            0x6d => RawInstruction::LDiv,
            0x6e => RawInstruction::FDiv,
            0x6f => RawInstruction::DDiv,
            0x70 => RawInstruction::IRem,
            0x71 => RawInstruction::LRem,
            0x72 => RawInstruction::FRem,
            0x73 => RawInstruction::DRem,
            0x74 => RawInstruction::INeg,
            0x75 => RawInstruction::LNeg,
            0x76 => RawInstruction::FNeg,
            0x77 => RawInstruction::DNeg,
            0x78 => RawInstruction::ISh(ShiftType::Left),
            0x79 => RawInstruction::LSh(ShiftType::Left),
            0x7a => RawInstruction::ISh(ShiftType::ArithmeticRight),
            0x7b => RawInstruction::LSh(ShiftType::ArithmeticRight),
            0x7c => RawInstruction::ISh(ShiftType::LogicalRight),
            0x7d => RawInstruction::LSh(ShiftType::LogicalRight),
            0x7e => RawInstruction::IAnd,
            0x7f => RawInstruction::LAnd,
            0x80 => RawInstruction::IOr,
            0x81 => RawInstruction::LOr,
            0x82 => RawInstruction::IXor,
            0x83 => RawInstruction::LXor,
            0x84 => RawInstruction::IInc(u8::parse(reader)? as u16, i8::parse(reader)? as i16),
            0x85 => RawInstruction::I2L,
            0x86 => RawInstruction::I2F,
            0x87 => RawInstruction::I2D,
            0x88 => RawInstruction::L2I,
            0x89 => RawInstruction::L2F,
            0x8a => RawInstruction::L2D,
            0x8b => RawInstruction::F2I,
            0x8c => RawInstruction::F2L,
            0x8d => RawInstruction::F2D,
            0x8e => RawInstruction::D2I,
            0x8f => RawInstruction::D2L,
            0x90 => RawInstruction::D2F,
            0x91 => RawInstruction::I2B,
            0x92 => RawInstruction::I2C,
            0x93 => RawInstruction::I2S,
            0x94 => RawInstruction::LCmp,
            0x95 => RawInstruction::FCmp(CompareMode::L),
            0x96 => RawInstruction::FCmp(CompareMode::G),
            0x97 => RawInstruction::DCmp(CompareMode::L),
            0x98 => RawInstruction::DCmp(CompareMode::G),
            0x99 => RawInstruction::If(OrdComparison::EQ, i16::parse(reader)?),
            0x9a => RawInstruction::If(OrdComparison::NE, i16::parse(reader)?),
            0x9b => RawInstruction::If(OrdComparison::LT, i16::parse(reader)?),
            0x9c => RawInstruction::If(OrdComparison::GE, i16::parse(reader)?),
            0x9d => RawInstruction::If(OrdComparison::GT, i16::parse(reader)?),
            0x9e => RawInstruction::If(OrdComparison::LE, i16::parse(reader)?),
            0x9f => RawInstruction::IfICmp(OrdComparison::EQ, i16::parse(reader)?),
            0xa0 => RawInstruction::IfICmp(OrdComparison::NE, i16::parse(reader)?),
            0xa1 => RawInstruction::IfICmp(OrdComparison::LT, i16::parse(reader)?),
            0xa2 => RawInstruction::IfICmp(OrdComparison::GE, i16::parse(reader)?),
            0xa3 => RawInstruction::IfICmp(OrdComparison::GT, i16::parse(reader)?),
            0xa4 => RawInstruction::IfICmp(OrdComparison::LE, i16::parse(reader)?),
            0xa5 => RawInstruction::IfACmp(EqComparison::EQ, i16::parse(reader)?),
            0xa6 => RawInstruction::IfACmp(EqComparison::NE, i16::parse(reader)?),
            0xa7 => RawInstruction::Goto(i16::parse(reader)?),
            0xaa => {
                let padding = switch_padding(offset);
                skip_padding(reader, padding)?;
                let default = i32::parse(reader)?;
                let low = i32::parse(reader)?;
                let high = i32::parse(reader)?;
                if high < low {
                    return Err(ParseError::InvertedSwitchBounds { low, high, offset });
                }
                // The declared count can be up to 2^32; cap the preallocation and let oversized
                // counts run into the end of the input.
                let count = (high as i64 - low as i64 + 1) as usize;
                let mut targets = Vec::with_capacity(count.min(u16::MAX as usize));
                for _ in 0..count {
                    targets.push(i32::parse(reader)?);
                }
                RawInstruction::TableSwitch {
                    padding,
                    default,
                    low,
                    targets,
                }
            }
            0xab => {
                let padding = switch_padding(offset);
                skip_padding(reader, padding)?;
                let default = i32::parse(reader)?;
                let npairs = i32::parse(reader)?;
                if npairs < 0 {
                    return Err(ParseError::NegativeSwitchPairs {
                        count: npairs,
                        offset,
                    });
                }
                let count = npairs as usize;
                let mut targets = Vec::with_capacity(count.min(u16::MAX as usize));
                for _ in 0..count {
                    targets.push((i32::parse(reader)?, i32::parse(reader)?));
                }
                RawInstruction::LookupSwitch {
                    padding,
                    default,
                    targets,
                }
            }
            0xac => RawInstruction::IReturn,
            0xad => RawInstruction::LReturn,
            0xae => RawInstruction::FReturn,
            0xaf => RawInstruction::DReturn,
            0xb0 => RawInstruction::AReturn,
            0xb1 => RawInstruction::Return,
            0xb2 => RawInstruction::GetStatic(FieldRefConstantIndex::parse(reader)?),
            0xb3 => RawInstruction::PutStatic(FieldRefConstantIndex::parse(reader)?),
            0xb4 => RawInstruction::GetField(FieldRefConstantIndex::parse(reader)?),
            0xb5 => RawInstruction::PutField(FieldRefConstantIndex::parse(reader)?),
            0xb6 => RawInstruction::InvokeVirtual(MethodRefConstantIndex::parse(reader)?),
            0xb7 => RawInstruction::InvokeSpecial(MethodRefConstantIndex::parse(reader)?),
            0xb8 => RawInstruction::InvokeStatic(MethodRefConstantIndex::parse(reader)?),
            0xb9 => {
                let idx = MethodRefConstantIndex::parse(reader)?;
                let count = u8::parse(reader)?;
                let _zero = u8::parse(reader)?;
                RawInstruction::InvokeInterface(idx, count)
            }
            0xba => {
                let idx = InvokeDynamicConstantIndex::parse(reader)?;
                let _zero = u16::parse(reader)?;
                RawInstruction::InvokeDynamic(idx)
            }
            0xbb => RawInstruction::New(ClassConstantIndex::parse(reader)?),
            0xbc => {
                let basetype = match u8::parse(reader)? {
                    4 => BaseType::Boolean,
                    5 => BaseType::Char,
                    6 => BaseType::Float,
                    7 => BaseType::Double,
                    8 => BaseType::Byte,
                    9 => BaseType::Short,
                    10 => BaseType::Int,
                    11 => BaseType::Long,
                    _ => return Err(ParseError::UnknownOpcode { opcode, offset }),
                };
                RawInstruction::NewArray(basetype)
            }
            0xbd => RawInstruction::ANewArray(ClassConstantIndex::parse(reader)?),
            0xbe => RawInstruction::ArrayLength,
            0xbf => RawInstruction::AThrow,
            0xc0 => RawInstruction::CheckCast(ClassConstantIndex::parse(reader)?),
            0xc1 => RawInstruction::InstanceOf(ClassConstantIndex::parse(reader)?),
            0xc2 => RawInstruction::MonitorEnter,
            0xc3 => RawInstruction::MonitorExit,
            0xc4 => match u8::parse(reader)? {
                0x15 => RawInstruction::ILoad(u16::parse(reader)?),
                0x16 => RawInstruction::LLoad(u16::parse(reader)?),
                0x17 => RawInstruction::FLoad(u16::parse(reader)?),
                0x18 => RawInstruction::DLoad(u16::parse(reader)?),
                0x19 => RawInstruction::ALoad(u16::parse(reader)?),
                0x36 => RawInstruction::IStore(u16::parse(reader)?),
                0x37 => RawInstruction::LStore(u16::parse(reader)?),
                0x38 => RawInstruction::FStore(u16::parse(reader)?),
                0x39 => RawInstruction::DStore(u16::parse(reader)?),
                0x3a => RawInstruction::AStore(u16::parse(reader)?),
                0x84 => RawInstruction::IInc(u16::parse(reader)?, i16::parse(reader)?),
                wide_opcode => {
                    return Err(ParseError::UnknownOpcode {
                        opcode: wide_opcode,
                        offset,
                    })
                }
            },
            0xc6 => RawInstruction::IfNull(EqComparison::EQ, i16::parse(reader)?),
            0xc7 => RawInstruction::IfNull(EqComparison::NE, i16::parse(reader)?),
            0xc8 => RawInstruction::GotoW(i32::parse(reader)?),

            // `jsr`, `ret`, `multianewarray`, `jsr_w`, and anything undefined
            _ => return Err(ParseError::UnknownOpcode { opcode, offset }),
        };
        Ok(insn)
    }
}

/// Zero padding between a switch opcode and its 4-byte-aligned operands
pub(crate) fn switch_padding(opcode_offset: usize) -> u8 {
    ((4 - (opcode_offset + 1) % 4) % 4) as u8
}

fn skip_padding<R: ReadBytesExt>(reader: &mut R, padding: u8) -> std::result::Result<(), ParseError> {
    for _ in 0..padding {
        let _ = reader.read_u8()?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn bytes_of(insn: &RawInstruction) -> Vec<u8> {
        let mut buffer = vec![];
        insn.serialize(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn widths_match_serialized_sizes() {
        let cases = vec![
            RawInstruction::Nop,
            RawInstruction::BiPush(-3),
            RawInstruction::SiPush(300),
            RawInstruction::Ldc(ConstantIndex(5)),
            RawInstruction::Ldc(ConstantIndex(300)),
            RawInstruction::Ldc2(ConstantIndex(5)),
            RawInstruction::ILoad(2),
            RawInstruction::ILoad(10),
            RawInstruction::ILoad(1000),
            RawInstruction::IInc(1, 1),
            RawInstruction::IInc(1000, 1),
            RawInstruction::IInc(1, 200),
            RawInstruction::Goto(-4),
            RawInstruction::GotoW(70000),
            RawInstruction::InvokeDynamic(InvokeDynamicConstantIndex(ConstantIndex(9))),
            RawInstruction::InvokeInterface(MethodRefConstantIndex(ConstantIndex(4)), 2),
            RawInstruction::NewArray(BaseType::Int),
        ];
        for insn in cases {
            assert_eq!(bytes_of(&insn).len(), insn.width(), "width of {insn:?}");
        }
    }

    #[test]
    fn load_store_forms() {
        assert_eq!(bytes_of(&RawInstruction::ILoad(2)), vec![0x1c]);
        assert_eq!(bytes_of(&RawInstruction::ILoad(10)), vec![0x15, 10]);
        assert_eq!(
            bytes_of(&RawInstruction::ILoad(1000)),
            vec![0xc4, 0x15, 0x03, 0xe8]
        );
        assert_eq!(bytes_of(&RawInstruction::AStore(0)), vec![0x4b]);
    }

    #[test]
    fn iinc_forms() {
        assert_eq!(bytes_of(&RawInstruction::IInc(1, 1)), vec![0x84, 1, 1]);
        assert_eq!(
            bytes_of(&RawInstruction::IInc(1000, 1)),
            vec![0xc4, 0x84, 0x03, 0xe8, 0x00, 0x01]
        );
    }

    #[test]
    fn ldc_forms() {
        assert_eq!(bytes_of(&RawInstruction::Ldc(ConstantIndex(7))), vec![0x12, 7]);
        assert_eq!(
            bytes_of(&RawInstruction::Ldc(ConstantIndex(300))),
            vec![0x13, 0x01, 0x2c]
        );
    }

    #[test]
    fn table_switch_padding_and_bounds() {
        let insn = RawInstruction::TableSwitch {
            padding: 3,
            default: 20,
            low: 1,
            targets: vec![10, 14],
        };
        assert_eq!(
            bytes_of(&insn),
            vec![
                0xaa, 0, 0, 0, // opcode plus padding
                0, 0, 0, 20, // default
                0, 0, 0, 1, // low
                0, 0, 0, 2, // high = low + targets - 1
                0, 0, 0, 10, 0, 0, 0, 14,
            ]
        );
        assert_eq!(insn.width(), bytes_of(&insn).len());
    }

    #[test]
    fn parse_inverts_serialize() {
        let cases = vec![
            RawInstruction::IConst2,
            RawInstruction::SiPush(-200),
            RawInstruction::Ldc(ConstantIndex(300)),
            RawInstruction::ILoad(1000),
            RawInstruction::IInc(5, -1),
            RawInstruction::IInc(1000, 1),
            RawInstruction::IfICmp(OrdComparison::LE, 12),
            RawInstruction::IfNull(EqComparison::NE, -8),
            RawInstruction::GotoW(100000),
            RawInstruction::InvokeInterface(MethodRefConstantIndex(ConstantIndex(4)), 3),
            RawInstruction::InvokeDynamic(InvokeDynamicConstantIndex(ConstantIndex(11))),
            RawInstruction::NewArray(BaseType::Double),
            RawInstruction::LookupSwitch {
                padding: 3,
                default: 24,
                targets: vec![(1, 12), (5, 18)],
            },
        ];
        for insn in cases {
            let mut cursor = Cursor::new(bytes_of(&insn));
            assert_eq!(RawInstruction::parse(&mut cursor, 0).unwrap(), insn);
        }
    }

    #[test]
    fn short_forms_decode_to_canonical_variants() {
        let mut cursor = Cursor::new(vec![0x1cu8]);
        assert_eq!(
            RawInstruction::parse(&mut cursor, 0).unwrap(),
            RawInstruction::ILoad(2)
        );
    }

    #[test]
    fn discontinued_opcodes_are_rejected() {
        for opcode in [0xa8u8, 0xa9, 0xc5, 0xc9] {
            let mut cursor = Cursor::new(vec![opcode, 0, 0, 0, 0]);
            assert!(matches!(
                RawInstruction::parse(&mut cursor, 2),
                Err(ParseError::UnknownOpcode { offset: 2, .. })
            ));
        }
    }

    #[test]
    fn inverted_table_switch_bounds_are_rejected() {
        // Offset 3 needs no padding: opcode, default, low, then high = -2
        let bytes = vec![
            0xaau8, 0, 0, 0, 0, // default
            0, 0, 0, 0, // low
            0xff, 0xff, 0xff, 0xfe, // high
        ];
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            RawInstruction::parse(&mut cursor, 3),
            Err(ParseError::InvertedSwitchBounds {
                low: 0,
                high: -2,
                offset: 3,
            })
        ));
    }

    #[test]
    fn negative_lookup_switch_pair_count_is_rejected() {
        let bytes = vec![
            0xabu8, 0, 0, 0, 0, // default
            0xff, 0xff, 0xff, 0xff, // npairs = -1
        ];
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            RawInstruction::parse(&mut cursor, 3),
            Err(ParseError::NegativeSwitchPairs {
                count: -1,
                offset: 3,
            })
        ));
    }

    #[test]
    fn switch_padding_aligns_operands() {
        assert_eq!(switch_padding(0), 3);
        assert_eq!(switch_padding(1), 2);
        assert_eq!(switch_padding(3), 0);
        assert_eq!(switch_padding(4), 3);
    }
}
