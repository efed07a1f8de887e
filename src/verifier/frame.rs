use crate::class_file::StackMapFrame;
use crate::util::OffsetVec;
use crate::verifier::VerificationType;

/// Snapshot of the local variables and operand stack at a point in the bytecode
///
/// Frames are recorded at every label and every exception handler entry; consecutive frames then
/// get turned into the compressed entries of the `StackMapTable` attribute.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType>,

    /// Types of values on the stack, bottom first
    pub stack: OffsetVec<VerificationType>,
}

impl Frame {
    /// Compute the most compact stack map frame encoding the transition from the previous frame
    ///
    /// This falls back to the `Full` option using [`Self::full_stack_map_frame`] only if none of
    /// the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Frame) -> StackMapFrame {
        match self.stack.len() {
            0 => {
                let this_locals_len = self.locals.len();
                let prev_locals_len = previous_frame.locals.len();

                if this_locals_len <= prev_locals_len {
                    let len_difference = prev_locals_len - this_locals_len;
                    if len_difference < 4 {
                        let this_is_prefix_of_prev = self
                            .locals
                            .iter()
                            .zip(previous_frame.locals.iter())
                            .all(|((_, _, t1), (_, _, t2))| t1 == t2);

                        if this_is_prefix_of_prev {
                            if len_difference == 0 {
                                return StackMapFrame::SameLocalsNoStack { offset_delta };
                            } else {
                                return StackMapFrame::ChopLocalsNoStack {
                                    offset_delta,
                                    chopped_k: len_difference as u8,
                                };
                            }
                        }
                    }
                } else if this_locals_len - prev_locals_len < 4 {
                    let mut this_iter = self.locals.iter().map(|(_, _, t)| t);
                    let mut prev_is_prefix_of_this = true;
                    for (_, _, t1) in previous_frame.locals.iter() {
                        let t2 = this_iter.next().unwrap();
                        if t1 != t2 {
                            prev_is_prefix_of_this = false;
                            break;
                        }
                    }

                    if prev_is_prefix_of_this {
                        return StackMapFrame::AppendLocalsNoStack {
                            offset_delta,
                            locals: this_iter.copied().collect(),
                        };
                    }
                }
            }
            1 if self.locals == previous_frame.locals => {
                return StackMapFrame::SameLocalsOneStack {
                    offset_delta,
                    stack: self.stack.iter().map(|(_, _, t)| *t).next().unwrap(),
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.iter().map(|(_, _, t)| *t).collect(),
            locals: self.locals.iter().map(|(_, _, t)| *t).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(locals: Vec<VerificationType>, stack: Vec<VerificationType>) -> Frame {
        Frame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    #[test]
    fn identical_frames_compress_to_same() {
        let prev = frame(vec![VerificationType::Integer], vec![]);
        let this = prev.clone();
        assert_eq!(
            this.stack_map_frame(10, &prev),
            StackMapFrame::SameLocalsNoStack { offset_delta: 10 }
        );
    }

    #[test]
    fn extra_locals_compress_to_append() {
        let prev = frame(vec![VerificationType::Integer], vec![]);
        let this = frame(
            vec![
                VerificationType::Integer,
                VerificationType::Long,
                VerificationType::Float,
            ],
            vec![],
        );
        assert_eq!(
            this.stack_map_frame(3, &prev),
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 3,
                locals: vec![VerificationType::Long, VerificationType::Float],
            }
        );
    }

    #[test]
    fn dropped_locals_compress_to_chop() {
        let prev = frame(
            vec![VerificationType::Integer, VerificationType::Float],
            vec![],
        );
        let this = frame(vec![VerificationType::Integer], vec![]);
        assert_eq!(
            this.stack_map_frame(7, &prev),
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 7,
                chopped_k: 1,
            }
        );
    }

    #[test]
    fn single_stack_entry_compresses_to_same_locals_one_stack() {
        let prev = frame(vec![VerificationType::Integer], vec![]);
        let this = frame(vec![VerificationType::Integer], vec![VerificationType::Null]);
        assert_eq!(
            this.stack_map_frame(0, &prev),
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 0,
                stack: VerificationType::Null,
            }
        );
    }

    #[test]
    fn unrelated_locals_fall_back_to_full() {
        let prev = frame(vec![VerificationType::Integer], vec![]);
        let this = frame(vec![VerificationType::Float], vec![]);
        assert_eq!(
            this.stack_map_frame(5, &prev),
            StackMapFrame::Full {
                offset_delta: 5,
                locals: vec![VerificationType::Float],
                stack: vec![],
            }
        );
    }

    #[test]
    fn more_than_three_appended_locals_fall_back_to_full() {
        let prev = frame(vec![], vec![]);
        let this = frame(vec![VerificationType::Integer; 4], vec![]);
        assert!(matches!(
            this.stack_map_frame(0, &prev),
            StackMapFrame::Full { .. }
        ));
    }
}
