// Ordered sibling sequence with relative, saturating positional inserts.
use crate::core::error::{Error, ErrorKind};

/// Index-addressed ordered sequence used for a table's columns and a
/// context's tables.
///
/// Positions are plain indices; inserting or unlinking shifts the indices of
/// the members after the affected position.
#[derive(Clone, Debug)]
pub struct Chain<T> {
    items: Vec<T>,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Chain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn position(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }

    /// Links `item` after the current tail and returns its index.
    pub fn push_back(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    /// Inserts `item` relative to the member at `anchor`.
    ///
    /// Walks `offset` steps forward (positive) or backward (negative) from the
    /// anchor, stopping early at either end of the chain, then splices `item`
    /// after the reached member when the remaining offset is non-negative and
    /// before it otherwise. Returns the index `item` ended up at.
    pub fn insert_sibling(&mut self, anchor: usize, offset: isize, item: T) -> Result<usize, Error> {
        if anchor >= self.items.len() {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "sibling anchor {anchor} out of range for chain of length {}",
                self.items.len()
            )));
        }

        let mut at = anchor;
        let mut remaining = offset;
        while remaining < 0 && at > 0 {
            at -= 1;
            remaining += 1;
        }
        while remaining > 0 && at + 1 < self.items.len() {
            at += 1;
            remaining -= 1;
        }

        let index = if remaining >= 0 { at + 1 } else { at };
        self.items.insert(index, item);
        Ok(index)
    }

    /// Removes the member at `index` from the chain, closing the gap.
    pub fn unlink(&mut self, index: usize) -> Option<T> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }
}

impl<T> IntoIterator for Chain<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Chain<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
