//! Assembling method bodies
//!
//! Method bodies are written as sequences of symbolic [`Instruction`]s, which reference positions
//! through [`Label`]s instead of bytecode offsets. [`assemble`] turns such a sequence into a
//! `Code` attribute: it simulates the operand stack and local variables to compute the maximums
//! and the stack map frames, resolves labels, and picks the concrete encoding of each
//! instruction ([`RawInstruction`]).

mod assemble;
mod context;
mod insn;
mod label;
mod raw;

pub use assemble::assemble;
pub use context::MethodContext;
pub use insn::Instruction;
pub use label::{Label, LabelGenerator};
pub use raw::{CompareMode, EqComparison, OrdComparison, RawInstruction, ShiftType};
