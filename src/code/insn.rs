use crate::class_file::{
    ClassConstantIndex, Constant, ConstantIndex, ConstantPool, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex,
};
use crate::code::context::MethodContext;
use crate::code::label::Label;
use crate::code::raw::{switch_padding, CompareMode, EqComparison, OrdComparison, RawInstruction, ShiftType};
use crate::descriptors::{BaseType, FieldType, MethodDescriptor, ParseDescriptor, RenderDescriptor};
use crate::errors::Error;
use crate::util::Offset;
use crate::verifier::VerificationType;

/// Symbolic JVM bytecode instruction
///
/// This is the form method bodies are written in: branch targets are [`Label`]s, constant
/// operands are pool indices obtained from a [`ConstantPool`], and a handful of variants are
/// assembly directives rather than instructions (they emit no bytes):
///
///   * `PlaceLabel` binds a label to the current position
///   * `CatchRangeStart`/`CatchRangeEnd` bracket an exception handler's covered range
///   * `Block` splices a pre-built instruction sequence in place
///
/// Instructions that exist in several encodings (`ldc`/`ldc_w`, short and wide loads, `iinc`)
/// appear once here; the form is chosen during assembly from the operand values.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    // Assembly directives
    Block(Vec<Instruction>),
    PlaceLabel(Label),
    CatchRangeStart {
        handler: Label,
        /// `None` catches everything
        catch_type: Option<ClassConstantIndex>,
    },
    CatchRangeEnd,

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
    Ldc(ConstantIndex),
    Ldc2(ConstantIndex),
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
    IInc(u16, i16),
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
    If(OrdComparison, Label),
    IfICmp(OrdComparison, Label),
    IfACmp(EqComparison, Label),
    IfNull(EqComparison, Label),
    Goto(Label),
    GotoW(Label),
    TableSwitch {
        default: Label,
        low: i32,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        targets: Vec<(i32, Label)>,
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
    InvokeInterface(MethodRefConstantIndex),
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

impl Instruction {
    /// Push an `int` constant using the narrowest instruction that holds it
    pub fn iconst(value: i32) -> Result<Instruction, Error> {
        Ok(match value {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            value => {
                if let Ok(byte) = i8::try_from(value) {
                    Instruction::BiPush(byte)
                } else if let Ok(short) = i16::try_from(value) {
                    Instruction::SiPush(short)
                } else {
                    return Err(Error::InvalidImmediate {
                        instruction: "iconst",
                        value: value as i64,
                    });
                }
            }
        })
    }

    /// Size this instruction will occupy when placed at the given bytecode offset
    ///
    /// Directives occupy no bytes; the switch instructions depend on the offset through their
    /// alignment padding.
    pub fn width_at(&self, offset: usize) -> usize {
        use Instruction::*;
        match self {
            Block(_) | PlaceLabel(_) | CatchRangeStart { .. } | CatchRangeEnd => 0,
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
            TableSwitch { targets, .. } => {
                1 + switch_padding(offset) as usize + 4 * (3 + targets.len())
            }
            LookupSwitch { targets, .. } => {
                1 + switch_padding(offset) as usize + 8 * (1 + targets.len())
            }
            GetStatic(_) | PutStatic(_) | GetField(_) | PutField(_) | InvokeVirtual(_)
            | InvokeSpecial(_) | InvokeStatic(_) | New(_) | ANewArray(_) | CheckCast(_)
            | InstanceOf(_) => 3,
            InvokeInterface(_) | InvokeDynamic(_) => 5,
            _ => 1,
        }
    }

    /// First assembly pass: advance offsets, bind labels, and simulate the instruction's effect
    /// on the operand stack and locals
    pub fn preprocess(
        &self,
        constants: &mut ConstantPool,
        context: &mut MethodContext,
    ) -> Result<(), Error> {
        use Instruction::*;
        use VerificationType::{Double, Float, Integer, Long, Null, Object, Uninitialized};

        // Directives never advance the offset
        match self {
            Block(body) => {
                for insn in body {
                    insn.preprocess(constants, context)?;
                }
                return Ok(());
            }
            PlaceLabel(label) => return context.place_label(*label),
            CatchRangeStart {
                handler,
                catch_type,
            } => {
                let caught_class = match catch_type {
                    Some(class) => *class,
                    None => constants.get_class_of("java/lang/Throwable")?,
                };
                let table_entry = catch_type.unwrap_or(ClassConstantIndex::CATCH_ALL);
                context.open_catch_range(*handler, table_entry, Object(caught_class));
                return Ok(());
            }
            CatchRangeEnd => return context.close_catch_range(),
            _ => (),
        }

        let offset = context.cur_offset();

        match self {
            Nop => (),
            AConstNull => context.push(Null),
            IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | BiPush(_)
            | SiPush(_) => context.push(Integer),
            LConst0 | LConst1 => context.push(Long),
            FConst0 | FConst1 | FConst2 => context.push(Float),
            DConst0 | DConst1 => context.push(Double),

            Ldc(index) => {
                let constant = context_constant(constants, *index)?;
                let vtype = match constant {
                    Constant::Integer(_) => Integer,
                    Constant::Float(_) => Float,
                    Constant::String(_) => Object(constants.get_class_of("java/lang/String")?),
                    Constant::Class(_) => Object(constants.get_class_of("java/lang/Class")?),
                    Constant::MethodHandle { .. } => {
                        Object(constants.get_class_of("java/lang/invoke/MethodHandle")?)
                    }
                    Constant::MethodType { .. } => {
                        Object(constants.get_class_of("java/lang/invoke/MethodType")?)
                    }
                    other => return Err(Error::NotLoadableConstant(other)),
                };
                context.push(vtype);
            }
            Ldc2(index) => {
                let constant = context_constant(constants, *index)?;
                match constant {
                    Constant::Long(_) => context.push(Long),
                    Constant::Double(_) => context.push(Double),
                    other => return Err(Error::NotLoadableConstant(other)),
                }
            }

            ILoad(idx) => {
                context.local(*idx)?;
                context.push(Integer);
            }
            LLoad(idx) => {
                context.local(*idx)?;
                context.push(Long);
            }
            FLoad(idx) => {
                context.local(*idx)?;
                context.push(Float);
            }
            DLoad(idx) => {
                context.local(*idx)?;
                context.push(Double);
            }
            ALoad(idx) => {
                let vtype = context.local(*idx)?;
                context.push(vtype);
            }

            IALoad | BALoad | CALoad | SALoad => {
                context.pop()?;
                context.pop()?;
                context.push(Integer);
            }
            LALoad => {
                context.pop()?;
                context.pop()?;
                context.push(Long);
            }
            FALoad => {
                context.pop()?;
                context.pop()?;
                context.push(Float);
            }
            DALoad => {
                context.pop()?;
                context.pop()?;
                context.push(Double);
            }
            AALoad => {
                context.pop()?;
                let arrayref = context.pop()?;
                let element = array_element_type(constants, arrayref)?;
                context.push(element);
            }

            IStore(idx) => {
                context.pop()?;
                context.set_local(*idx, Integer);
            }
            LStore(idx) => {
                context.pop()?;
                context.set_local(*idx, Long);
            }
            FStore(idx) => {
                context.pop()?;
                context.set_local(*idx, Float);
            }
            DStore(idx) => {
                context.pop()?;
                context.set_local(*idx, Double);
            }
            AStore(idx) => {
                let vtype = context.pop()?;
                context.set_local(*idx, vtype);
            }

            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                context.pop()?;
                context.pop()?;
                context.pop()?;
            }

            Pop => {
                context.pop_cat1()?;
            }
            Pop2 => {
                context.pop_slot_pair()?;
            }
            Dup => {
                let v1 = context.pop_cat1()?;
                context.push(v1);
                context.push(v1);
            }
            DupX1 => {
                let v1 = context.pop_cat1()?;
                let v2 = context.pop_cat1()?;
                context.push(v1);
                context.push(v2);
                context.push(v1);
            }
            DupX2 => {
                let v1 = context.pop_cat1()?;
                let below = context.pop_slot_pair()?;
                context.push(v1);
                for vtype in below {
                    context.push(vtype);
                }
                context.push(v1);
            }
            Dup2 => {
                let pair = context.pop_slot_pair()?;
                for vtype in &pair {
                    context.push(*vtype);
                }
                for vtype in pair {
                    context.push(vtype);
                }
            }
            Dup2X1 => {
                let pair = context.pop_slot_pair()?;
                let v3 = context.pop_cat1()?;
                for vtype in &pair {
                    context.push(*vtype);
                }
                context.push(v3);
                for vtype in pair {
                    context.push(vtype);
                }
            }
            Dup2X2 => {
                let top = context.pop_slot_pair()?;
                let below = context.pop_slot_pair()?;
                for vtype in &top {
                    context.push(*vtype);
                }
                for vtype in below {
                    context.push(vtype);
                }
                for vtype in top {
                    context.push(vtype);
                }
            }
            Swap => {
                let v1 = context.pop_cat1()?;
                let v2 = context.pop_cat1()?;
                context.push(v1);
                context.push(v2);
            }

            IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor => {
                context.pop()?;
                context.pop()?;
                context.push(Integer);
            }
            LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => {
                context.pop()?;
                context.pop()?;
                context.push(Long);
            }
            FAdd | FSub | FMul | FDiv | FRem => {
                context.pop()?;
                context.pop()?;
                context.push(Float);
            }
            DAdd | DSub | DMul | DDiv | DRem => {
                context.pop()?;
                context.pop()?;
                context.push(Double);
            }
            INeg => {
                context.pop()?;
                context.push(Integer);
            }
            LNeg => {
                context.pop()?;
                context.push(Long);
            }
            FNeg => {
                context.pop()?;
                context.push(Float);
            }
            DNeg => {
                context.pop()?;
                context.push(Double);
            }
            ISh(_) => {
                context.pop()?;
                context.pop()?;
                context.push(Integer);
            }
            LSh(_) => {
                context.pop()?; // shift amount is an int
                context.pop()?;
                context.push(Long);
            }
            IInc(idx, _) => {
                context.local(*idx)?;
            }

            I2L | F2L | D2L => {
                context.pop()?;
                context.push(Long);
            }
            I2F | L2F | D2F => {
                context.pop()?;
                context.push(Float);
            }
            I2D | L2D | F2D => {
                context.pop()?;
                context.push(Double);
            }
            L2I | F2I | D2I | I2B | I2C | I2S => {
                context.pop()?;
                context.push(Integer);
            }

            LCmp | FCmp(_) | DCmp(_) => {
                context.pop()?;
                context.pop()?;
                context.push(Integer);
            }

            If(_, target) | IfNull(_, target) => {
                context.pop()?;
                context.add_jump_target(*target);
            }
            IfICmp(_, target) | IfACmp(_, target) => {
                context.pop()?;
                context.pop()?;
                context.add_jump_target(*target);
            }
            Goto(target) | GotoW(target) => {
                context.add_jump_target(*target);
                context.mark_terminated();
            }
            TableSwitch {
                default, targets, ..
            } => {
                context.pop()?;
                context.add_jump_target(*default);
                for target in targets {
                    context.add_jump_target(*target);
                }
                context.mark_terminated();
            }
            LookupSwitch { default, targets } => {
                context.pop()?;
                context.add_jump_target(*default);
                for (_, target) in targets {
                    context.add_jump_target(*target);
                }
                context.mark_terminated();
            }

            IReturn | LReturn | FReturn | DReturn | AReturn | AThrow => {
                context.pop()?;
                context.mark_terminated();
            }
            Return => context.mark_terminated(),

            GetStatic(index) => {
                let vtype = field_type_of(constants, *index)?;
                context.push(vtype);
            }
            PutStatic(_) => {
                context.pop()?;
            }
            GetField(index) => {
                context.pop()?;
                let vtype = field_type_of(constants, *index)?;
                context.push(vtype);
            }
            PutField(_) => {
                context.pop()?;
                context.pop()?;
            }

            InvokeVirtual(index) | InvokeInterface(index) => {
                simulate_invoke(constants, context, *index, true, false)?;
            }
            InvokeSpecial(index) => {
                simulate_invoke(constants, context, *index, true, true)?;
            }
            InvokeStatic(index) => {
                simulate_invoke(constants, context, *index, false, false)?;
            }
            InvokeDynamic(index) => {
                let descriptor = constants.invoke_dynamic_descriptor(*index)?.to_string();
                let descriptor = MethodDescriptor::parse(&descriptor)?;
                for _ in 0..descriptor.parameters.len() {
                    context.pop()?;
                }
                if let Some(return_type) = &descriptor.return_type {
                    let vtype = return_type.verification_type(constants)?;
                    context.push(vtype);
                }
            }

            New(_) => context.push(Uninitialized(offset.0 as u16)),
            NewArray(base) => {
                context.pop()?;
                let mut descriptor = String::from("[");
                base.render_to(&mut descriptor);
                context.push(Object(constants.get_class_of(&descriptor)?));
            }
            ANewArray(class) => {
                context.pop()?;
                let array_class = array_class_of(constants, *class)?;
                context.push(Object(array_class));
            }
            ArrayLength => {
                context.pop()?;
                context.push(Integer);
            }
            CheckCast(class) => {
                context.pop()?;
                context.push(Object(*class));
            }
            InstanceOf(_) => {
                context.pop()?;
                context.push(Integer);
            }
            MonitorEnter | MonitorExit => {
                context.pop()?;
            }

            Block(_) | PlaceLabel(_) | CatchRangeStart { .. } | CatchRangeEnd => unreachable!(),
        }

        context.advance(self.width_at(offset.0));
        context.update_maximums();
        Ok(())
    }

    /// Second assembly pass: resolve labels into relative offsets and pick concrete encodings
    ///
    /// Directives yield `None`. `Block` is not handled here (the assembler recurses into it
    /// before encoding).
    pub fn encode(
        &self,
        constants: &ConstantPool,
        context: &MethodContext,
        offset: Offset,
    ) -> Result<Option<RawInstruction>, Error> {
        use Instruction as I;
        use RawInstruction as R;

        let raw = match self {
            I::Block(_) | I::PlaceLabel(_) | I::CatchRangeStart { .. } | I::CatchRangeEnd => {
                return Ok(None)
            }

            I::Nop => R::Nop,
            I::AConstNull => R::AConstNull,
            I::IConstM1 => R::IConstM1,
            I::IConst0 => R::IConst0,
            I::IConst1 => R::IConst1,
            I::IConst2 => R::IConst2,
            I::IConst3 => R::IConst3,
            I::IConst4 => R::IConst4,
            I::IConst5 => R::IConst5,
            I::LConst0 => R::LConst0,
            I::LConst1 => R::LConst1,
            I::FConst0 => R::FConst0,
            I::FConst1 => R::FConst1,
            I::FConst2 => R::FConst2,
            I::DConst0 => R::DConst0,
            I::DConst1 => R::DConst1,
            I::BiPush(b) => R::BiPush(*b),
            I::SiPush(s) => R::SiPush(*s),
            I::Ldc(idx) => R::Ldc(*idx),
            I::Ldc2(idx) => R::Ldc2(*idx),
            I::ILoad(idx) => R::ILoad(*idx),
            I::LLoad(idx) => R::LLoad(*idx),
            I::FLoad(idx) => R::FLoad(*idx),
            I::DLoad(idx) => R::DLoad(*idx),
            I::ALoad(idx) => R::ALoad(*idx),
            I::IALoad => R::IALoad,
            I::LALoad => R::LALoad,
            I::FALoad => R::FALoad,
            I::DALoad => R::DALoad,
            I::AALoad => R::AALoad,
            I::BALoad => R::BALoad,
            I::CALoad => R::CALoad,
            I::SALoad => R::SALoad,
            I::IStore(idx) => R::IStore(*idx),
            I::LStore(idx) => R::LStore(*idx),
            I::FStore(idx) => R::FStore(*idx),
            I::DStore(idx) => R::DStore(*idx),
            I::AStore(idx) => R::AStore(*idx),
            I::IAStore => R::IAStore,
            I::LAStore => R::LAStore,
            I::FAStore => R::FAStore,
            I::DAStore => R::DAStore,
            I::AAStore => R::AAStore,
            I::BAStore => R::BAStore,
            I::CAStore => R::CAStore,
            I::SAStore => R::SAStore,
            I::Pop => R::Pop,
            I::Pop2 => R::Pop2,
            I::Dup => R::Dup,
            I::DupX1 => R::DupX1,
            I::DupX2 => R::DupX2,
            I::Dup2 => R::Dup2,
            I::Dup2X1 => R::Dup2X1,
            I::Dup2X2 => R::Dup2X2,
            I::Swap => R::Swap,
            I::IAdd => R::IAdd,
            I::LAdd => R::LAdd,
            I::FAdd => R::FAdd,
            I::DAdd => R::DAdd,
            I::ISub => R::ISub,
            I::LSub => R::LSub,
            I::FSub => R::FSub,
            I::DSub => R::DSub,
            I::IMul => R::IMul,
            I::LMul => R::LMul,
            I::FMul => R::FMul,
            I::DMul => R::DMul,
            I::IDiv => R::IDiv,
            I::LDiv => R::LDiv,
            I::FDiv => R::FDiv,
            I::DDiv => R::DDiv,
            I::IRem => R::IRem,
            I::LRem => R::LRem,
            I::FRem => R::FRem,
            I::DRem => R::DRem,
            I::INeg => R::INeg,
            I::LNeg => R::LNeg,
            I::FNeg => R::FNeg,
            I::DNeg => R::DNeg,
            I::ISh(shift) => R::ISh(*shift),
            I::LSh(shift) => R::LSh(*shift),
            I::IAnd => R::IAnd,
            I::LAnd => R::LAnd,
            I::IOr => R::IOr,
            I::LOr => R::LOr,
            I::IXor => R::IXor,
            I::LXor => R::LXor,
            I::IInc(idx, diff) => R::IInc(*idx, *diff),
            I::I2L => R::I2L,
            I::I2F => R::I2F,
            I::I2D => R::I2D,
            I::L2I => R::L2I,
            I::L2F => R::L2F,
            I::L2D => R::L2D,
            I::F2I => R::F2I,
            I::F2L => R::F2L,
            I::F2D => R::F2D,
            I::D2I => R::D2I,
            I::D2L => R::D2L,
            I::D2F => R::D2F,
            I::I2B => R::I2B,
            I::I2C => R::I2C,
            I::I2S => R::I2S,
            I::LCmp => R::LCmp,
            I::FCmp(mode) => R::FCmp(*mode),
            I::DCmp(mode) => R::DCmp(*mode),

            I::If(comp, target) => R::If(*comp, relative_16(context, *target, offset)?),
            I::IfICmp(comp, target) => R::IfICmp(*comp, relative_16(context, *target, offset)?),
            I::IfACmp(comp, target) => R::IfACmp(*comp, relative_16(context, *target, offset)?),
            I::IfNull(comp, target) => R::IfNull(*comp, relative_16(context, *target, offset)?),
            I::Goto(target) => R::Goto(relative_16(context, *target, offset)?),
            I::GotoW(target) => R::GotoW(relative_32(context, *target, offset)?),
            I::TableSwitch {
                default,
                low,
                targets,
            } => R::TableSwitch {
                padding: switch_padding(offset.0),
                default: relative_32(context, *default, offset)?,
                low: *low,
                targets: targets
                    .iter()
                    .map(|target| relative_32(context, *target, offset))
                    .collect::<Result<_, _>>()?,
            },
            I::LookupSwitch { default, targets } => R::LookupSwitch {
                padding: switch_padding(offset.0),
                default: relative_32(context, *default, offset)?,
                targets: targets
                    .iter()
                    .map(|(key, target)| Ok((*key, relative_32(context, *target, offset)?)))
                    .collect::<Result<_, Error>>()?,
            },

            I::IReturn => R::IReturn,
            I::LReturn => R::LReturn,
            I::FReturn => R::FReturn,
            I::DReturn => R::DReturn,
            I::AReturn => R::AReturn,
            I::Return => R::Return,
            I::GetStatic(idx) => R::GetStatic(*idx),
            I::PutStatic(idx) => R::PutStatic(*idx),
            I::GetField(idx) => R::GetField(*idx),
            I::PutField(idx) => R::PutField(*idx),
            I::InvokeVirtual(idx) => R::InvokeVirtual(*idx),
            I::InvokeSpecial(idx) => R::InvokeSpecial(*idx),
            I::InvokeStatic(idx) => R::InvokeStatic(*idx),
            I::InvokeInterface(idx) => {
                let descriptor = constants.method_ref_parts(*idx)?.2;
                let descriptor = MethodDescriptor::parse(descriptor)?;
                // Receiver plus argument slots, as required by the historical count operand
                R::InvokeInterface(*idx, 1 + descriptor.parameter_slots() as u8)
            }
            I::InvokeDynamic(idx) => R::InvokeDynamic(*idx),
            I::New(idx) => R::New(*idx),
            I::NewArray(base) => R::NewArray(*base),
            I::ANewArray(idx) => R::ANewArray(*idx),
            I::ArrayLength => R::ArrayLength,
            I::AThrow => R::AThrow,
            I::CheckCast(idx) => R::CheckCast(*idx),
            I::InstanceOf(idx) => R::InstanceOf(*idx),
            I::MonitorEnter => R::MonitorEnter,
            I::MonitorExit => R::MonitorExit,
        };
        Ok(Some(raw))
    }
}

fn relative_16(context: &MethodContext, target: Label, at: Offset) -> Result<i16, Error> {
    let target_offset = context.label_offset(target)?;
    i16::try_from(target_offset - at).map_err(|_| Error::BranchOffsetOverflow {
        at,
        target: target_offset,
    })
}

fn relative_32(context: &MethodContext, target: Label, at: Offset) -> Result<i32, Error> {
    let target_offset = context.label_offset(target)?;
    i32::try_from(target_offset - at).map_err(|_| Error::BranchOffsetOverflow {
        at,
        target: target_offset,
    })
}

fn context_constant(constants: &ConstantPool, index: ConstantIndex) -> Result<Constant, Error> {
    constants
        .get(index)
        .cloned()
        .ok_or(Error::MissingConstant(index))
}

fn field_type_of(
    constants: &mut ConstantPool,
    index: FieldRefConstantIndex,
) -> Result<VerificationType, Error> {
    let descriptor = constants.field_ref_parts(index)?.2.to_string();
    FieldType::parse(&descriptor)?.verification_type(constants)
}

fn class_name(constants: &ConstantPool, class: ClassConstantIndex) -> Result<String, Error> {
    match constants.get(class.into()) {
        Some(Constant::Class(utf8)) => Ok(constants.utf8_text(*utf8)?.to_string()),
        _ => Err(Error::MissingConstant(class.into())),
    }
}

/// Element type of a value loaded out of the given array reference
fn array_element_type(
    constants: &mut ConstantPool,
    arrayref: VerificationType,
) -> Result<VerificationType, Error> {
    match arrayref {
        VerificationType::Null => Ok(VerificationType::Null),
        VerificationType::Object(class) => {
            let name = class_name(constants, class)?;
            match name.strip_prefix('[') {
                Some(element_descriptor) => {
                    FieldType::parse(element_descriptor)?.verification_type(constants)
                }
                None => Ok(VerificationType::Object(
                    constants.get_class_of(FieldType::OBJECT)?,
                )),
            }
        }
        _ => Ok(VerificationType::Object(
            constants.get_class_of(FieldType::OBJECT)?,
        )),
    }
}

/// Class constant for an array whose elements are of the given class
fn array_class_of(
    constants: &mut ConstantPool,
    element: ClassConstantIndex,
) -> Result<ClassConstantIndex, Error> {
    let name = class_name(constants, element)?;
    let descriptor = if name.starts_with('[') {
        format!("[{name}")
    } else {
        format!("[L{name};")
    };
    constants.get_class_of(&descriptor)
}

fn simulate_invoke(
    constants: &mut ConstantPool,
    context: &mut MethodContext,
    index: MethodRefConstantIndex,
    has_receiver: bool,
    is_special: bool,
) -> Result<(), Error> {
    let (class, name, descriptor) = {
        let (class, name, descriptor) = constants.method_ref_parts(index)?;
        (class, name.to_string(), descriptor.to_string())
    };
    let descriptor = MethodDescriptor::parse(&descriptor)?;

    for _ in 0..descriptor.parameters.len() {
        context.pop()?;
    }
    if has_receiver {
        let receiver = context.pop()?;
        if is_special && name == "<init>" {
            match receiver {
                VerificationType::Uninitialized(_) | VerificationType::UninitializedThis => {
                    context.replace_all(receiver, VerificationType::Object(class));
                }
                _ => (),
            }
        }
    }
    if let Some(return_type) = &descriptor.return_type {
        let vtype = return_type.verification_type(constants)?;
        context.push(vtype);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iconst_picks_the_narrowest_form() {
        assert_eq!(Instruction::iconst(-1).unwrap(), Instruction::IConstM1);
        assert_eq!(Instruction::iconst(5).unwrap(), Instruction::IConst5);
        assert_eq!(Instruction::iconst(6).unwrap(), Instruction::BiPush(6));
        assert_eq!(Instruction::iconst(-129).unwrap(), Instruction::SiPush(-129));
        assert_eq!(Instruction::iconst(300).unwrap(), Instruction::SiPush(300));
        assert!(matches!(
            Instruction::iconst(1 << 20),
            Err(Error::InvalidImmediate {
                instruction: "iconst",
                ..
            })
        ));
    }

    #[test]
    fn directives_have_no_width() {
        assert_eq!(Instruction::CatchRangeEnd.width_at(7), 0);
        assert_eq!(Instruction::PlaceLabel(Label::START).width_at(7), 0);
    }

    #[test]
    fn switch_width_depends_on_position() {
        let switch = Instruction::TableSwitch {
            default: Label::START,
            low: 0,
            targets: vec![Label::START],
        };
        // At offset 3 the operands are already aligned
        assert_eq!(switch.width_at(3), 1 + 16);
        assert_eq!(switch.width_at(0), 1 + 3 + 16);
    }
}
