use crate::class_file::ClassConstantIndex;
use crate::code::label::Label;
use crate::errors::Error;
use crate::util::{Offset, OffsetVec, Width};
use crate::verifier::{Frame, VerificationType};
use std::collections::{BTreeMap, HashMap, HashSet};

/// State threaded through the assembly of one method body
///
/// The context tracks the current bytecode offset, the simulated operand stack and local
/// variables (as verification types), the running stack/locals maximums, label bindings, pending
/// and completed catch ranges, and the frame snapshot taken at every placed label.
pub struct MethodContext {
    pub(crate) stack: OffsetVec<VerificationType>,
    pub(crate) locals: OffsetVec<VerificationType>,

    cur_offset: Offset,
    pub(crate) max_stack: Offset,
    pub(crate) max_locals: Offset,

    label_offsets: HashMap<Label, Offset>,
    pub(crate) jump_targets: HashSet<Label>,

    /// Verification type an exception handler's stack starts with (the caught class)
    handler_types: HashMap<Label, VerificationType>,

    pub(crate) open_ranges: Vec<OpenCatchRange>,
    pub(crate) closed_ranges: Vec<CatchRange>,

    pub(crate) frames: BTreeMap<Offset, Frame>,
    pub(crate) entry_frame: Frame,

    /// Set right after an instruction that never falls through
    terminated: bool,
}

pub(crate) struct OpenCatchRange {
    pub(crate) start: Offset,
    pub(crate) handler: Label,
    pub(crate) catch_type: ClassConstantIndex,
}

pub(crate) struct CatchRange {
    pub(crate) start: Offset,
    pub(crate) end: Offset,
    pub(crate) handler: Label,
    pub(crate) catch_type: ClassConstantIndex,
}

impl MethodContext {
    /// Start assembling a method whose locals initially hold the given types (the receiver, if
    /// any, followed by the parameters)
    pub fn new(initial_locals: OffsetVec<VerificationType>) -> MethodContext {
        let entry_frame = Frame {
            locals: initial_locals.clone(),
            stack: OffsetVec::new(),
        };
        let max_locals = initial_locals.offset_len();
        MethodContext {
            stack: OffsetVec::new(),
            locals: initial_locals,
            cur_offset: Offset(0),
            max_stack: Offset(0),
            max_locals,
            label_offsets: HashMap::new(),
            jump_targets: HashSet::new(),
            handler_types: HashMap::new(),
            open_ranges: vec![],
            closed_ranges: vec![],
            frames: BTreeMap::new(),
            entry_frame,
            terminated: false,
        }
    }

    pub fn cur_offset(&self) -> Offset {
        self.cur_offset
    }

    pub(crate) fn advance(&mut self, width: usize) {
        self.cur_offset.0 += width;
    }

    pub(crate) fn update_maximums(&mut self) {
        self.max_stack.0 = self.max_stack.0.max(self.stack.offset_len().0);
        self.max_locals.0 = self.max_locals.0.max(self.locals.offset_len().0);
    }

    pub(crate) fn mark_terminated(&mut self) {
        self.terminated = true;
    }

    pub(crate) fn push(&mut self, vtype: VerificationType) {
        self.stack.push(vtype);
    }

    pub(crate) fn pop(&mut self) -> Result<VerificationType, Error> {
        match self.stack.pop() {
            Some((_, vtype)) => Ok(vtype),
            None => Err(Error::OperandStackUnderflow),
        }
    }

    /// Pop a category-1 operand
    pub(crate) fn pop_cat1(&mut self) -> Result<VerificationType, Error> {
        let vtype = self.pop()?;
        if vtype.width() != 1 {
            return Err(Error::InvalidOperandWidth {
                expected: 1,
                found: vtype.width(),
            });
        }
        Ok(vtype)
    }

    /// Pop two slots worth of operands: either one category-2 value or two category-1 values
    ///
    /// Returned bottom-first, so pushing the elements back in order restores the stack.
    pub(crate) fn pop_slot_pair(&mut self) -> Result<Vec<VerificationType>, Error> {
        let top = self.pop()?;
        if top.width() == 2 {
            Ok(vec![top])
        } else {
            let below = self.pop_cat1()?;
            Ok(vec![below, top])
        }
    }

    /// Type currently stored in the local variable at the given slot index
    pub(crate) fn local(&self, idx: u16) -> Result<VerificationType, Error> {
        match self.locals.get_offset(Offset(idx as usize)) {
            Some((_, vtype)) => Ok(*vtype),
            None => Err(Error::InvalidLocalIndex(idx)),
        }
    }

    /// Store a type into a local variable slot
    ///
    /// Locals between the current end and the target slot are filled with `Top`, and any wide
    /// value this store overlaps gets invalidated to `Top`.
    pub(crate) fn set_local(&mut self, idx: u16, vtype: VerificationType) {
        #[derive(Copy, Clone, PartialEq)]
        enum Slot {
            Value(VerificationType),
            /// Upper half of the category-2 value starting one slot lower
            Continuation,
        }

        let idx = idx as usize;
        let width = vtype.width();

        let mut slots: Vec<Slot> = Vec::with_capacity(self.locals.offset_len().0);
        for (_, _, t) in self.locals.iter() {
            slots.push(Slot::Value(*t));
            if t.width() == 2 {
                slots.push(Slot::Continuation);
            }
        }
        while slots.len() < idx + width {
            slots.push(Slot::Value(VerificationType::Top));
        }

        for slot in idx..idx + width {
            match slots[slot] {
                Slot::Continuation => {
                    slots[slot - 1] = Slot::Value(VerificationType::Top);
                }
                Slot::Value(t) if t.width() == 2 => {
                    slots[slot + 1] = Slot::Value(VerificationType::Top);
                }
                Slot::Value(_) => (),
            }
            slots[slot] = Slot::Value(VerificationType::Top);
        }

        slots[idx] = Slot::Value(vtype);
        if width == 2 {
            slots[idx + 1] = Slot::Continuation;
        }

        let mut collapsed: OffsetVec<VerificationType> = OffsetVec::new();
        for slot in slots {
            if let Slot::Value(t) = slot {
                collapsed.push(t);
            }
        }
        self.locals = collapsed;
    }

    /// Replace every stack and local entry equal to `from` with `to`
    ///
    /// This is how the result of a `new` stops being `Uninitialized` once its constructor runs.
    pub(crate) fn replace_all(&mut self, from: VerificationType, to: VerificationType) {
        self.stack = self
            .stack
            .iter()
            .map(|(_, _, t)| if *t == from { to } else { *t })
            .collect();
        self.locals = self
            .locals
            .iter()
            .map(|(_, _, t)| if *t == from { to } else { *t })
            .collect();
    }

    /// Bind a label to the current offset and snapshot the frame there
    pub(crate) fn place_label(&mut self, label: Label) -> Result<(), Error> {
        if self.label_offsets.contains_key(&label) {
            return Err(Error::DuplicateLabel(label));
        }
        let offset = self.cur_offset;
        self.label_offsets.insert(label, offset);
        log::trace!("Placed {:?} at offset {}", label, offset.0);

        // Simulation resumes here after an instruction that never falls through; handler entry
        // points always start with exactly the caught exception on the stack.
        if self.terminated {
            self.stack = OffsetVec::new();
        }
        if let Some(catch_type) = self.handler_types.get(&label) {
            let mut stack = OffsetVec::new();
            stack.push(*catch_type);
            self.stack = stack;
        }
        self.terminated = false;

        let frame = Frame {
            locals: self.locals.clone(),
            stack: self.stack.clone(),
        };
        match self.frames.get(&offset) {
            Some(existing) if *existing != frame => Err(Error::ConflictingFrames(offset)),
            _ => {
                self.frames.insert(offset, frame);
                Ok(())
            }
        }
    }

    pub(crate) fn add_jump_target(&mut self, label: Label) {
        self.jump_targets.insert(label);
    }

    /// Offset a label was placed at
    pub fn label_offset(&self, label: Label) -> Result<Offset, Error> {
        self.label_offsets
            .get(&label)
            .copied()
            .ok_or(Error::UnboundLabel(label))
    }

    pub(crate) fn open_catch_range(
        &mut self,
        handler: Label,
        catch_type: ClassConstantIndex,
        caught: VerificationType,
    ) {
        self.handler_types.insert(handler, caught);
        self.jump_targets.insert(handler);
        self.open_ranges.push(OpenCatchRange {
            start: self.cur_offset,
            handler,
            catch_type,
        });
    }

    /// Close the most recently opened catch range
    pub(crate) fn close_catch_range(&mut self) -> Result<(), Error> {
        let open = self
            .open_ranges
            .pop()
            .ok_or(Error::CatchRangeEndWithoutStart)?;
        self.closed_ranges.push(CatchRange {
            start: open.start,
            end: self.cur_offset,
            handler: open.handler,
            catch_type: open.catch_type,
        });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pops_on_an_empty_stack_underflow() {
        let mut context = MethodContext::new(OffsetVec::new());
        assert!(matches!(context.pop(), Err(Error::OperandStackUnderflow)));
    }

    #[test]
    fn category_checks_on_stack_operands() {
        let mut context = MethodContext::new(OffsetVec::new());
        context.push(VerificationType::Long);
        assert!(matches!(
            context.pop_cat1(),
            Err(Error::InvalidOperandWidth {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn slot_pair_pops_one_wide_or_two_narrow() {
        let mut context = MethodContext::new(OffsetVec::new());
        context.push(VerificationType::Double);
        assert_eq!(
            context.pop_slot_pair().unwrap(),
            vec![VerificationType::Double]
        );

        context.push(VerificationType::Integer);
        context.push(VerificationType::Float);
        assert_eq!(
            context.pop_slot_pair().unwrap(),
            vec![VerificationType::Integer, VerificationType::Float]
        );
    }

    #[test]
    fn storing_into_a_gap_pads_with_top() {
        let mut context = MethodContext::new(OffsetVec::new());
        context.set_local(2, VerificationType::Integer);
        assert_eq!(context.local(0).unwrap(), VerificationType::Top);
        assert_eq!(context.local(1).unwrap(), VerificationType::Top);
        assert_eq!(context.local(2).unwrap(), VerificationType::Integer);
    }

    #[test]
    fn overlapping_store_invalidates_a_wide_local() {
        let mut context = MethodContext::new(OffsetVec::new());
        context.set_local(0, VerificationType::Long);
        // Storing into the upper half kills the long
        context.set_local(1, VerificationType::Integer);
        assert_eq!(context.local(0).unwrap(), VerificationType::Top);
        assert_eq!(context.local(1).unwrap(), VerificationType::Integer);
    }

    #[test]
    fn wide_local_occupies_two_slots() {
        let mut context = MethodContext::new(OffsetVec::new());
        context.set_local(0, VerificationType::Double);
        context.set_local(2, VerificationType::Integer);
        assert_eq!(context.local(0).unwrap(), VerificationType::Double);
        assert!(context.local(1).is_err());
        assert_eq!(context.local(2).unwrap(), VerificationType::Integer);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut context = MethodContext::new(OffsetVec::new());
        let label = crate::code::LabelGenerator::new().fresh_label();
        context.place_label(label).unwrap();
        assert!(matches!(
            context.place_label(label),
            Err(Error::DuplicateLabel(_))
        ));
    }
}
