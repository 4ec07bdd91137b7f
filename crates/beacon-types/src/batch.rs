/// How many items a [`Batch::take`] call claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeCount {
    /// Claim up to n items and mark them taken.
    Some(usize),
    /// Return every live item without marking (observation mode).
    All,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    /// Scheduled for removal at the next flush boundary.
    pending_delete: bool,
    /// Claimed by an in-flight send; excluded from the next take.
    taken: bool,
}

/// Ordered container of one entity type; the unit of batching.
///
/// Deletion is two-phase: items are first flagged pending-delete so an
/// in-flight send can still reference them, and physically removed only at
/// [`Batch::flush_deleted`], a boundary owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct Batch<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Batch<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Append an item in insertion order.
    pub fn push(&mut self, item: T) {
        self.slots.push(Slot {
            item,
            pending_delete: false,
            taken: false,
        });
    }

    /// Physically remove the item at `index`.
    pub fn erase(&mut self, index: usize) -> Option<T> {
        if index >= self.slots.len() {
            return None;
        }
        Some(self.slots.remove(index).item)
    }

    /// Flag the first `n` items pending-delete without removing them.
    pub fn remove_range(&mut self, n: usize) {
        for slot in self.slots.iter_mut().take(n) {
            slot.pending_delete = true;
        }
    }

    /// Flag every item pending-delete.
    pub fn remove_all_range(&mut self) {
        for slot in &mut self.slots {
            slot.pending_delete = true;
        }
    }

    /// Physically drop all pending-delete items.
    pub fn flush_deleted(&mut self) {
        self.slots.retain(|slot| !slot.pending_delete);
    }

    /// Items neither pending-delete nor taken. Always <= [`Batch::len`].
    pub fn count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !slot.pending_delete && !slot.taken)
            .count()
    }

    /// Raw length, including flagged and taken items.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Claim items for a send.
    ///
    /// `TakeCount::Some(n)` returns up to n live items and marks them taken;
    /// `TakeCount::All` returns every live item without marking, so direct
    /// observation never perturbs batching state.
    pub fn take(&mut self, count: TakeCount) -> Vec<&T> {
        match count {
            TakeCount::Some(n) => {
                let mut indices = Vec::new();
                for (index, slot) in self.slots.iter_mut().enumerate() {
                    if indices.len() == n {
                        break;
                    }
                    if !slot.pending_delete && !slot.taken {
                        slot.taken = true;
                        indices.push(index);
                    }
                }
                indices
                    .into_iter()
                    .map(|index| &self.slots[index].item)
                    .collect()
            }
            TakeCount::All => self
                .slots
                .iter()
                .filter(|slot| !slot.pending_delete && !slot.taken)
                .map(|slot| &slot.item)
                .collect(),
        }
    }

    /// Return claimed items to the pool after a failed send.
    pub fn release_taken(&mut self) {
        for slot in &mut self.slots {
            slot.taken = false;
        }
    }

    /// Flag every currently-taken item pending-delete (confirmed send).
    pub fn discard_taken(&mut self) {
        for slot in &mut self.slots {
            if slot.taken {
                slot.pending_delete = true;
                slot.taken = false;
            }
        }
    }

    /// Iterate live items in insertion order.
    pub fn iter_live(&self) -> impl Iterator<Item = &T> {
        self.slots
            .iter()
            .filter(|slot| !slot.pending_delete)
            .map(|slot| &slot.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> Batch<usize> {
        let mut batch = Batch::new();
        for i in 0..n {
            batch.push(i);
        }
        batch
    }

    #[test]
    fn test_take_some_claims_and_marks() {
        let mut batch = filled(10);
        let claimed: Vec<usize> = batch.take(TakeCount::Some(4)).into_iter().copied().collect();
        assert_eq!(claimed, vec![0, 1, 2, 3]);
        assert_eq!(batch.count(), 6);
        assert_eq!(batch.len(), 10);
    }

    #[test]
    fn test_take_all_does_not_mark() {
        let mut batch = filled(3);
        assert_eq!(batch.take(TakeCount::All).len(), 3);
        assert_eq!(batch.count(), 3);
    }

    #[test]
    fn test_take_skips_taken_and_flagged() {
        let mut batch = filled(5);
        batch.take(TakeCount::Some(2));
        batch.remove_range(3);
        // Items 0,1 taken; 0,1,2 flagged; only 3,4 remain takeable.
        let claimed: Vec<usize> = batch.take(TakeCount::Some(5)).into_iter().copied().collect();
        assert_eq!(claimed, vec![3, 4]);
    }

    #[test]
    fn test_count_never_exceeds_len() {
        let mut batch = filled(6);
        batch.take(TakeCount::Some(2));
        batch.remove_range(1);
        assert!(batch.count() <= batch.len());
    }

    #[test]
    fn test_flush_deleted_is_the_physical_boundary() {
        let mut batch = filled(4);
        batch.remove_range(2);
        assert_eq!(batch.len(), 4);
        batch.flush_deleted();
        assert_eq!(batch.len(), 2);
        let remaining: Vec<usize> = batch.iter_live().copied().collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn test_release_taken_returns_items() {
        let mut batch = filled(3);
        batch.take(TakeCount::Some(3));
        assert_eq!(batch.count(), 0);
        batch.release_taken();
        assert_eq!(batch.count(), 3);
    }

    #[test]
    fn test_discard_taken_flags_confirmed_items() {
        let mut batch = filled(3);
        batch.take(TakeCount::Some(2));
        batch.discard_taken();
        assert_eq!(batch.count(), 1);
        batch.flush_deleted();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_erase_removes_physically() {
        let mut batch = filled(3);
        assert_eq!(batch.erase(1), Some(1));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.erase(9), None);
    }
}
