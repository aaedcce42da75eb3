//! Replicated list of values, the storage behind [`CollaborativeList`].
//!
//! [`CollaborativeList`]: crate::list::CollaborativeList

use crate::sequence::{Edit, ElementId, Sequence, SequenceDelta};

pub type ListId = ElementId;
pub type RGAListDelta<T> = SequenceDelta<T>;
pub type ListEdit<T> = Edit<T>;

#[derive(Clone, Debug)]
pub struct RGAList<T> {
    sequence: Sequence<T>,
}

impl<T: Clone> RGAList<T> {
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self {
            sequence: Sequence::new(replica_id),
        }
    }

    pub fn replica_id(&self) -> &str {
        self.sequence.replica_id()
    }

    pub fn insert(&mut self, index: usize, value: T) {
        self.insert_many(index, std::iter::once(value));
    }

    /// Insert `values` in order starting at `index`.
    pub fn insert_many(&mut self, index: usize, values: impl IntoIterator<Item = T>) {
        self.sequence.insert_run(index, values);
    }

    pub fn insert_after(&mut self, after: &ListId, value: T) -> ListId {
        self.sequence.insert_after(after, value)
    }

    pub fn push_back(&mut self, value: T) {
        let len = self.len();
        self.insert(len, value);
    }

    pub fn delete(&mut self, index: usize) -> Option<T> {
        let id = self.sequence.id_at(index)?.clone();
        self.sequence.remove(&id)
    }

    /// Remove the values in `start..end` and return them in order.
    pub fn delete_range(&mut self, start: usize, end: usize) -> Vec<T> {
        self.sequence.remove_range(start, end)
    }

    pub fn delete_by_id(&mut self, id: &ListId) -> Option<T> {
        self.sequence.remove(id)
    }

    /// Move the value at `from` in front of the value currently at `to`.
    /// Returns false if `from` is out of range.
    pub fn move_element(&mut self, from: usize, to: usize) -> bool {
        let Some(value) = self.delete(from) else {
            return false;
        };
        let to = if to > from { to - 1 } else { to };
        self.insert(to, value);
        true
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.sequence.get(index)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.sequence.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn index_of_id(&self, id: &ListId) -> Option<usize> {
        self.sequence.position(id)
    }

    pub fn take_delta(&mut self) -> Option<RGAListDelta<T>> {
        self.sequence.take_delta()
    }

    pub fn apply_delta(&mut self, delta: &RGAListDelta<T>) {
        self.sequence.integrate(delta);
    }

    /// Integrate `delta` and report the visible edits it caused.
    pub fn apply_delta_indexed(&mut self, delta: &RGAListDelta<T>) -> Vec<ListEdit<T>> {
        self.sequence.integrate(delta)
    }
}

impl<T: Clone + PartialEq> PartialEq for RGAList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<T: Clone> Default for RGAList<T> {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync(a: &mut RGAList<i32>, b: &mut RGAList<i32>) {
        let from_a = a.take_delta().unwrap_or_default();
        let from_b = b.take_delta().unwrap_or_default();
        a.apply_delta(&from_b);
        b.apply_delta(&from_a);
    }

    #[test]
    fn test_push_and_insert() {
        let mut list = RGAList::new("r1");
        list.push_back(2);
        list.push_back(4);
        list.insert(0, 1);
        list.insert(2, 3);

        assert_eq!(list.to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(list.get(3), Some(&4));
        assert_eq!(list.get(4), None);
    }

    #[test]
    fn test_insert_many_then_delete_range() {
        let mut list = RGAList::new("r1");
        list.insert_many(0, [10, 40]);
        list.insert_many(1, [20, 30]);
        assert_eq!(list.to_vec(), vec![10, 20, 30, 40]);

        assert_eq!(list.delete_range(1, 3), vec![20, 30]);
        assert_eq!(list.to_vec(), vec![10, 40]);
        assert!(list.delete_range(5, 9).is_empty());
    }

    #[test]
    fn test_move_element_both_directions() {
        let mut list = RGAList::new("r1");
        list.insert_many(0, [1, 2, 3, 4]);

        assert!(list.move_element(0, 3));
        assert_eq!(list.to_vec(), vec![2, 3, 1, 4]);
        assert!(list.move_element(3, 0));
        assert_eq!(list.to_vec(), vec![4, 2, 3, 1]);
        assert!(!list.move_element(9, 0));
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let mut a = RGAList::new("r1");
        let mut b = RGAList::new("r2");
        a.insert_many(0, [1, 2, 3]);
        sync(&mut a, &mut b);

        a.delete(1);
        a.push_back(4);
        b.insert(1, 9);
        b.delete(2);
        sync(&mut a, &mut b);

        assert_eq!(a, b);
        assert_eq!(a.to_vec(), vec![1, 9, 3, 4]);
    }

    #[test]
    fn test_ids_follow_values() {
        let mut list = RGAList::new("r1");
        list.push_back(1);
        let id = list.insert_after(&ListId::head(), 0);
        assert_eq!(list.index_of_id(&id), Some(0));

        assert_eq!(list.delete_by_id(&id), Some(0));
        assert_eq!(list.index_of_id(&id), None);
        assert_eq!(list.delete_by_id(&id), None);
    }

    #[test]
    fn test_remote_replace_reports_delete_then_insert() {
        let mut a = RGAList::new("r1");
        let mut b = RGAList::new("r2");
        a.insert_many(0, ['a', 'b', 'c']);
        b.apply_delta(&a.take_delta().unwrap());

        a.delete(1);
        a.insert(1, 'z');
        let edits = b.apply_delta_indexed(&a.take_delta().unwrap());

        assert_eq!(
            edits,
            vec![
                ListEdit::Deleted { index: 1, value: 'b' },
                ListEdit::Inserted { index: 1, value: 'z' },
            ]
        );
        assert_eq!(b.to_vec(), vec!['a', 'z', 'c']);
    }
}
