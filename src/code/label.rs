use std::fmt;

/// Opaque label marking a position in a method body
///
/// Labels are placed with `Instruction::PlaceLabel` and referenced by branch instructions and
/// catch ranges. The numeric payload is only an identity; offsets are computed during assembly.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct Label(usize);

impl Label {
    /// Label conventionally used for the start of the method
    pub const START: Label = Label(0);

    fn next(&self) -> Label {
        Label(self.0 + 1)
    }
}

/// Generates fresh labels
///
/// Cloning does not split the generator source. The cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone)]
pub struct LabelGenerator(Label);

impl LabelGenerator {
    pub fn new() -> LabelGenerator {
        LabelGenerator(Label::START)
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> Label {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

impl Default for LabelGenerator {
    fn default() -> LabelGenerator {
        LabelGenerator::new()
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generator_produces_distinct_labels() {
        let mut generator = LabelGenerator::new();
        let first = generator.fresh_label();
        let second = generator.fresh_label();
        assert_eq!(first, Label::START);
        assert_ne!(first, second);
    }

    #[test]
    fn cloned_generator_replays_the_sequence() {
        let mut generator = LabelGenerator::new();
        let _ = generator.fresh_label();
        let mut replay = generator.clone();
        assert_eq!(generator.fresh_label(), replay.fresh_label());
    }
}
