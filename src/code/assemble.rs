use crate::class_file::{
    AttributeInfo, Code, ConstantPool, ExceptionHandler, StackMapFrame, StackMapTable,
};
use crate::code::context::MethodContext;
use crate::code::insn::Instruction;
use crate::code::raw::RawInstruction;
use crate::errors::Error;
use crate::util::{Offset, OffsetVec};
use crate::verifier::{Frame, VerificationType};
use std::collections::BTreeSet;

/// Assemble a method body into a `Code` attribute
///
/// `initial_locals` holds the verification types the local variables start out with (the
/// receiver, if any, followed by the parameter types). Assembly runs in two passes: the first
/// walks the instructions simulating their effect on the operand stack and locals, binding labels
/// to offsets and snapshotting a frame at each one; the second resolves every branch to a
/// relative offset and picks concrete encodings. A `StackMapTable` attribute is attached whenever
/// at least one instruction is a jump target.
pub fn assemble(
    instructions: &[Instruction],
    constants: &mut ConstantPool,
    initial_locals: OffsetVec<VerificationType>,
) -> Result<Code, Error> {
    let mut context = MethodContext::new(initial_locals);
    for instruction in instructions {
        instruction.preprocess(constants, &mut context)?;
    }

    if let Some(open) = context.open_ranges.last() {
        return Err(Error::UnclosedCatchRange(open.handler));
    }

    let code_length = context.cur_offset();
    if code_length.0 > u16::MAX as usize {
        return Err(Error::MethodCodeOverflow(code_length));
    }
    if context.max_stack.0 > u16::MAX as usize {
        return Err(Error::MethodCodeMaxStackOverflow(context.max_stack));
    }
    if context.max_locals.0 > u16::MAX as usize {
        return Err(Error::MethodCodeMaxLocalsOverflow(context.max_locals));
    }

    let mut code: OffsetVec<RawInstruction> = OffsetVec::new();
    encode_into(instructions, constants, &context, &mut code)?;

    let mut exception_table = Vec::with_capacity(context.closed_ranges.len());
    for range in &context.closed_ranges {
        let handler_pc = context.label_offset(range.handler)?;
        exception_table.push(ExceptionHandler {
            start_pc: range.start.0 as u16,
            end_pc: range.end.0 as u16,
            handler_pc: handler_pc.0 as u16,
            catch_type: range.catch_type,
        });
    }

    let mut attributes = vec![];
    let frames = stack_map_frames(&context)?;
    if !frames.is_empty() {
        attributes.push(constants.get_attribute(AttributeInfo::StackMapTable(StackMapTable(frames)))?);
    }

    log::trace!(
        "Assembled {} bytes of bytecode (max stack {}, max locals {})",
        code_length.0,
        context.max_stack.0,
        context.max_locals.0,
    );

    Ok(Code {
        max_stack: context.max_stack.0 as u16,
        max_locals: context.max_locals.0 as u16,
        code,
        exception_table,
        attributes,
    })
}

fn encode_into(
    instructions: &[Instruction],
    constants: &ConstantPool,
    context: &MethodContext,
    code: &mut OffsetVec<RawInstruction>,
) -> Result<(), Error> {
    for instruction in instructions {
        if let Instruction::Block(body) = instruction {
            encode_into(body, constants, context, code)?;
            continue;
        }
        if let Some(raw) = instruction.encode(constants, context, code.offset_len())? {
            code.push(raw);
        }
    }
    Ok(())
}

/// Stack map frames for every jump target, in offset order
///
/// The first frame's delta is its offset; every following frame's delta is the distance from the
/// previous frame minus one. Compression against the previous frame starts from the method entry
/// frame.
fn stack_map_frames(context: &MethodContext) -> Result<Vec<StackMapFrame>, Error> {
    let mut target_offsets: BTreeSet<Offset> = BTreeSet::new();
    for label in &context.jump_targets {
        target_offsets.insert(context.label_offset(*label)?);
    }

    let mut frames = Vec::with_capacity(target_offsets.len());
    let mut previous_frame: &Frame = &context.entry_frame;
    let mut previous_offset: Option<Offset> = None;
    for (offset, frame) in &context.frames {
        if !target_offsets.contains(offset) {
            continue;
        }
        let offset_delta = match previous_offset {
            None => offset.0,
            Some(previous) => offset.0 - previous.0 - 1,
        };
        frames.push(frame.stack_map_frame(offset_delta as u16, previous_frame));
        previous_offset = Some(*offset);
        previous_frame = frame;
    }
    Ok(frames)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::binary::Serialize;
    use crate::code::label::LabelGenerator;
    use crate::code::raw::OrdComparison;

    fn code_bytes(code: &Code) -> Vec<u8> {
        let mut bytes = vec![];
        for (_, _, insn) in code.code.iter() {
            insn.serialize(&mut bytes).unwrap();
        }
        bytes
    }

    #[test]
    fn straight_line_method_assembles() {
        let mut constants = ConstantPool::new();
        let instructions = [
            Instruction::iconst(2).unwrap(),
            Instruction::IStore(1),
            Instruction::IInc(1, 1),
            Instruction::Return,
        ];
        let code = assemble(&instructions, &mut constants, OffsetVec::new()).unwrap();

        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 2);
        assert_eq!(code_bytes(&code), vec![0x05, 0x3C, 0x84, 0x01, 0x01, 0xB1]);
        assert!(code.exception_table.is_empty());
        assert!(code.attributes.is_empty());
    }

    #[test]
    fn forward_branch_resolves_and_gets_a_frame() {
        let mut constants = ConstantPool::new();
        let mut labels = LabelGenerator::new();
        let end = labels.fresh_label();

        let instructions = [
            Instruction::IConst0,
            Instruction::If(OrdComparison::EQ, end),
            Instruction::IConst1,
            Instruction::IReturn,
            Instruction::PlaceLabel(end),
            Instruction::IConst0,
            Instruction::IReturn,
        ];
        let code = assemble(&instructions, &mut constants, OffsetVec::new()).unwrap();

        // `ifeq` sits at offset 1 and its target at offset 6
        assert_eq!(
            code_bytes(&code),
            vec![0x03, 0x99, 0x00, 0x05, 0x04, 0xAC, 0x03, 0xAC]
        );

        assert_eq!(code.attributes.len(), 1);
        let info = &code.attributes[0].info;
        assert_eq!(
            *info,
            AttributeInfo::StackMapTable(StackMapTable(vec![StackMapFrame::SameLocalsNoStack {
                offset_delta: 6
            }]))
        );
    }

    #[test]
    fn catch_range_produces_handler_entry() {
        let mut constants = ConstantPool::new();
        let mut labels = LabelGenerator::new();
        let handler = labels.fresh_label();

        let instructions = [
            Instruction::CatchRangeStart {
                handler,
                catch_type: None,
            },
            Instruction::IConst0,
            Instruction::Pop,
            Instruction::CatchRangeEnd,
            Instruction::Return,
            Instruction::PlaceLabel(handler),
            Instruction::Pop,
            Instruction::Return,
        ];
        let code = assemble(&instructions, &mut constants, OffsetVec::new()).unwrap();

        assert_eq!(code.exception_table.len(), 1);
        let entry = &code.exception_table[0];
        assert_eq!(entry.start_pc, 0);
        assert_eq!(entry.end_pc, 2);
        assert_eq!(entry.handler_pc, 3);
        assert_eq!(entry.catch_type, crate::class_file::ClassConstantIndex::CATCH_ALL);

        // The handler entry frame holds exactly the caught exception
        let throwable = constants.get_class_of("java/lang/Throwable").unwrap();
        assert_eq!(
            code.attributes[0].info,
            AttributeInfo::StackMapTable(StackMapTable(vec![
                StackMapFrame::SameLocalsOneStack {
                    offset_delta: 3,
                    stack: VerificationType::Object(throwable),
                }
            ]))
        );
    }

    #[test]
    fn blocks_splice_in_place() {
        let mut constants = ConstantPool::new();
        let instructions = [
            Instruction::Block(vec![Instruction::IConst0, Instruction::IConst1]),
            Instruction::IAdd,
            Instruction::IReturn,
        ];
        let code = assemble(&instructions, &mut constants, OffsetVec::new()).unwrap();
        assert_eq!(code_bytes(&code), vec![0x03, 0x04, 0x60, 0xAC]);
        assert_eq!(code.max_stack, 2);
    }

    #[test]
    fn unbound_branch_target_is_an_error() {
        let mut constants = ConstantPool::new();
        let mut labels = LabelGenerator::new();
        let nowhere = labels.fresh_label();

        let instructions = [Instruction::Goto(nowhere)];
        assert!(matches!(
            assemble(&instructions, &mut constants, OffsetVec::new()),
            Err(Error::UnboundLabel(_))
        ));
    }

    #[test]
    fn unclosed_catch_range_is_an_error() {
        let mut constants = ConstantPool::new();
        let mut labels = LabelGenerator::new();
        let handler = labels.fresh_label();

        let instructions = [
            Instruction::CatchRangeStart {
                handler,
                catch_type: None,
            },
            Instruction::Return,
        ];
        assert!(matches!(
            assemble(&instructions, &mut constants, OffsetVec::new()),
            Err(Error::UnclosedCatchRange(_))
        ));
    }

    #[test]
    fn stack_underflow_is_caught_during_preprocessing() {
        let mut constants = ConstantPool::new();
        let instructions = [Instruction::Pop];
        assert!(matches!(
            assemble(&instructions, &mut constants, OffsetVec::new()),
            Err(Error::OperandStackUnderflow)
        ));
    }
}
