use std::fmt::{Debug, Error, Formatter};
use std::iter::{Enumerate, Extend, FromIterator};
use std::ops::Sub;
use std::slice::Iter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// This sort of structure ends up being convenient in several places when modelling class files:
///
///   - constant pool and indices (most entries have width 1, but `long`/`double` have width 2)
///   - method code and jump targets (different instructions have different byte sizes)
///   - local variables and operand stacks (category-2 types occupy two slots)
///
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl Sub for Offset {
    type Output = isize;

    fn sub(self, other: Offset) -> isize {
        (self.0 as isize) - (other.0 as isize)
    }
}

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset (usually 0, but the constant pool
    /// starts indexing at 1)
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next element to be added (aka. the total width so far)
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning the offset it was placed at
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));

        offset
    }

    /// Remove an entry from the back
    pub fn pop(&mut self) -> Option<(Offset, T)> {
        self.entries.pop().map(|(off, elem)| {
            self.offset_len = off;
            (off, elem)
        })
    }

    /// Get an entry (and its index) by its offset in the vector
    ///
    /// Returns `None` if the offset is out of bounds or falls in the middle of a wide element.
    ///
    /// Note: this uses binary search to find the offset
    pub fn get_offset(&self, offset: Offset) -> Option<(usize, &T)> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Ok(found_idx) => Some((found_idx, &self.entries[found_idx].1)),
            Err(_) => None,
        }
    }

    /// Get an entry (and its offset) by its position in the vector
    pub fn get_index(&self, index: usize) -> Option<(Offset, &T)> {
        self.entries.get(index).map(|(offset, t)| (*offset, t))
    }

    /// Last entry, along with its offset
    pub fn last(&self) -> Option<(Offset, &T)> {
        self.entries.last().map(|(offset, t)| (*offset, t))
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

/// Iterator for owned `OffsetVec`
pub struct OffsetVecIntoIter<T>(Enumerate<std::vec::IntoIter<(Offset, T)>>);

impl<T> Iterator for OffsetVecIntoIter<T> {
    type Item = (Offset, usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (off, idx, elem))
    }
}

impl<T> IntoIterator for OffsetVec<T> {
    type Item = (Offset, usize, T);
    type IntoIter = OffsetVecIntoIter<T>;

    fn into_iter(self) -> OffsetVecIntoIter<T> {
        OffsetVecIntoIter(self.entries.into_iter().enumerate())
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        for elem in elems {
            offset_vec.push(elem);
        }
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        OneWide(u8),
        TwoWide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::OneWide(_) => 1,
                Slot::TwoWide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_accumulate_widths() {
        let slots: OffsetVec<Slot> = vec![
            Slot::OneWide(1),
            Slot::TwoWide(2),
            Slot::TwoWide(3),
            Slot::OneWide(4),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            slots.into_iter().collect::<Vec<_>>(),
            vec![
                (Offset(0), 0, Slot::OneWide(1)),
                (Offset(1), 1, Slot::TwoWide(2)),
                (Offset(3), 2, Slot::TwoWide(3)),
                (Offset(5), 3, Slot::OneWide(4)),
            ]
        );
    }

    #[test]
    fn initial_offset_shifts_everything() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        assert_eq!(slots.push(Slot::TwoWide(1)), Offset(1));
        assert_eq!(slots.push(Slot::OneWide(2)), Offset(3));
        assert_eq!(slots.offset_len(), Offset(4));
    }

    #[test]
    fn offset_lookup_rejects_interior_offsets() {
        let slots: OffsetVec<Slot> = vec![Slot::OneWide(1), Slot::TwoWide(2)]
            .into_iter()
            .collect();
        assert_eq!(slots.get_offset(Offset(1)), Some((1, &Slot::TwoWide(2))));
        assert_eq!(slots.get_offset(Offset(2)), None);
        assert_eq!(slots.get_offset(Offset(3)), None);
    }

    #[test]
    fn pop_rewinds_the_offset() {
        let mut slots: OffsetVec<Slot> = vec![Slot::OneWide(1), Slot::TwoWide(2)]
            .into_iter()
            .collect();
        assert_eq!(slots.pop(), Some((Offset(1), Slot::TwoWide(2))));
        assert_eq!(slots.offset_len(), Offset(1));
    }
}
