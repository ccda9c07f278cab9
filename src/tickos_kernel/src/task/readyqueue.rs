//! Ready Queue Set
//!
//! Holds one ready list per priority level and a bitmap whose bit `p` is set
//! iff the ready list of priority `p` is non-empty. Larger priority values
//! are more urgent.
use alloc::vec::Vec;
use core::fmt;
use num_traits::Bounded;

use crate::{
    error::{InsertError, RemoveError, SelectError},
    utils::{
        intrusive_list::{ListArena, ListId, NodeId},
        PrioBitmap,
    },
};

/// The set of ready lists.
pub struct ReadyQueue<Bitmap> {
    lists: Vec<ListId>,
    bitmap: Bitmap,
}

impl<Bitmap: PrioBitmap> ReadyQueue<Bitmap> {
    /// Allocate `num_priorities` empty ready lists in `arena`.
    ///
    /// # Panics
    ///
    /// Panics if `num_priorities` exceeds `Bitmap::LEN`.
    pub fn new<Key, Owner>(arena: &mut ListArena<Key, Owner>, num_priorities: usize) -> Self
    where
        Key: Copy + Ord + Default + Bounded,
        Owner: Copy,
    {
        assert!(
            num_priorities <= Bitmap::LEN,
            "the bitmap can't hold {num_priorities} priority levels"
        );
        Self {
            lists: (0..num_priorities).map(|_| arena.new_list()).collect(),
            bitmap: Bitmap::INIT,
        }
    }

    /// Get the number of priority levels.
    #[inline]
    pub fn num_priorities(&self) -> usize {
        self.lists.len()
    }

    /// Get the ready list of `priority`.
    #[inline]
    pub fn list(&self, priority: usize) -> ListId {
        self.lists[priority]
    }

    #[inline]
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Return a flag indicating whether `priority` is marked as having a
    /// Ready task.
    #[inline]
    pub fn is_priority_ready(&self, priority: usize) -> bool {
        self.bitmap.get(priority)
    }

    /// Mark `priority` as having a Ready task.
    #[inline]
    pub fn mark_ready(&mut self, priority: usize) {
        self.bitmap.set(priority);
    }

    /// Clear the bit of `priority` if its ready list is empty.
    pub fn clear_ready_if_empty<Key, Owner>(
        &mut self,
        arena: &ListArena<Key, Owner>,
        priority: usize,
    ) where
        Key: Copy + Ord + Default + Bounded,
        Owner: Copy,
    {
        if arena.is_empty(self.lists[priority]) {
            self.bitmap.clear(priority);
        }
    }

    /// Append `node` to the ready list of `priority` and mark the priority
    /// ready.
    pub fn push_back<Key, Owner>(
        &mut self,
        arena: &mut ListArena<Key, Owner>,
        priority: usize,
        node: NodeId,
    ) -> Result<(), InsertError>
    where
        Key: Copy + Ord + Default + Bounded,
        Owner: Copy,
    {
        arena.insert_end(self.lists[priority], node)?;
        self.mark_ready(priority);
        Ok(())
    }

    /// Unlink `node` from its list and clear the bit of `priority` if its
    /// ready list has become empty. Returns the number of nodes remaining in
    /// the list `node` was removed from.
    pub fn remove<Key, Owner>(
        &mut self,
        arena: &mut ListArena<Key, Owner>,
        priority: usize,
        node: NodeId,
    ) -> Result<usize, RemoveError>
    where
        Key: Copy + Ord + Default + Bounded,
        Owner: Copy,
    {
        debug_assert_eq!(arena[node].container(), Some(self.lists[priority]));
        let remaining = arena.remove(node)?;
        self.clear_ready_if_empty(arena, priority);
        Ok(remaining)
    }

    /// Get the most urgent priority having a Ready task.
    #[inline]
    pub fn highest_ready_priority(&self) -> Result<usize, SelectError> {
        self.bitmap
            .find_highest_set()
            .ok_or(SelectError::NoReadyTask)
    }

    /// Advance the round-robin cursor of the most urgent non-empty ready list
    /// and return the owner of the node it lands on.
    pub fn select_next<Key, Owner>(
        &mut self,
        arena: &mut ListArena<Key, Owner>,
    ) -> Result<Owner, SelectError>
    where
        Key: Copy + Ord + Default + Bounded,
        Owner: Copy,
    {
        let priority = self.highest_ready_priority()?;
        arena
            .advance_cursor(self.lists[priority])
            .ok_or(SelectError::NoReadyTask)
    }
}

impl<Bitmap: PrioBitmap> fmt::Debug for ReadyQueue<Bitmap> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReadyQueue")
            .field("bitmap", &self.bitmap)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::PrioBitmap8;
    use quickcheck_macros::quickcheck;

    type Arena = ListArena<u32, char>;

    fn setup(num_priorities: usize) -> (Arena, ReadyQueue<PrioBitmap8>) {
        let mut arena = Arena::new();
        let rq = ReadyQueue::new(&mut arena, num_priorities);
        (arena, rq)
    }

    fn add(arena: &mut Arena, rq: &mut ReadyQueue<PrioBitmap8>, priority: usize, owner: char) -> NodeId {
        let node = arena.new_node(owner);
        rq.push_back(arena, priority, node).unwrap();
        node
    }

    #[test]
    fn empty() {
        let (mut arena, mut rq) = setup(5);
        assert_eq!(rq.highest_ready_priority(), Err(SelectError::NoReadyTask));
        assert_eq!(rq.select_next(&mut arena), Err(SelectError::NoReadyTask));
    }

    #[test]
    #[should_panic]
    fn too_many_priorities() {
        let _ = setup(9);
    }

    #[test]
    fn highest_then_round_robin() {
        let (mut arena, mut rq) = setup(5);
        add(&mut arena, &mut rq, 1, 'a');
        let b = add(&mut arena, &mut rq, 3, 'b');
        add(&mut arena, &mut rq, 3, 'c');
        add(&mut arena, &mut rq, 3, 'd');

        let picks: Vec<_> = (0..7).map(|_| rq.select_next(&mut arena).unwrap()).collect();
        assert_eq!(picks, ['b', 'c', 'd', 'b', 'c', 'd', 'b']);

        // `b` is under the cursor; removing it keeps the rotation going
        rq.remove(&mut arena, 3, b).unwrap();
        let picks: Vec<_> = (0..4).map(|_| rq.select_next(&mut arena).unwrap()).collect();
        assert_eq!(picks, ['c', 'd', 'c', 'd']);
    }

    #[test]
    fn bit_follows_list() {
        let (mut arena, mut rq) = setup(5);
        let a = add(&mut arena, &mut rq, 4, 'a');
        add(&mut arena, &mut rq, 2, 'b');
        assert_eq!(rq.highest_ready_priority(), Ok(4));

        assert_eq!(rq.remove(&mut arena, 4, a), Ok(0));
        assert!(!rq.is_priority_ready(4));
        assert_eq!(rq.highest_ready_priority(), Ok(2));
        assert_eq!(rq.select_next(&mut arena), Ok('b'));

        // Stale bit left by a direct list manipulation
        rq.mark_ready(3);
        rq.clear_ready_if_empty(&arena, 3);
        assert!(!rq.is_priority_ready(3));
        rq.clear_ready_if_empty(&arena, 2);
        assert!(rq.is_priority_ready(2));
    }

    #[test]
    fn double_insert() {
        let (mut arena, mut rq) = setup(5);
        let a = add(&mut arena, &mut rq, 1, 'a');
        assert_eq!(
            rq.push_back(&mut arena, 2, a),
            Err(InsertError::AlreadyLinked)
        );
        assert!(!rq.is_priority_ready(2));
    }

    /// Apply random insertions and removals and check that the bitmap always
    /// mirrors the ready lists and that the highest priority wins.
    #[quickcheck]
    fn bitmap_mirrors_lists(ops: Vec<(bool, u8)>) {
        let _ = env_logger::builder().is_test(true).try_init();
        const NUM_PRIORITIES: usize = 6;
        let (mut arena, mut rq) = setup(NUM_PRIORITIES);
        let mut linked: Vec<(NodeId, usize)> = Vec::new();

        for (insert, x) in ops {
            let x = x as usize;
            if insert || linked.is_empty() {
                let priority = x % NUM_PRIORITIES;
                log::trace!("push_back at {priority}");
                let node = add(&mut arena, &mut rq, priority, 'x');
                linked.push((node, priority));
            } else {
                let (node, priority) = linked.swap_remove(x % linked.len());
                log::trace!("remove {node:?} at {priority}");
                rq.remove(&mut arena, priority, node).unwrap();
            }

            for priority in 0..NUM_PRIORITIES {
                assert_eq!(
                    rq.is_priority_ready(priority),
                    !arena.is_empty(rq.list(priority))
                );
            }

            let expected = linked.iter().map(|&(_, p)| p).max();
            assert_eq!(rq.highest_ready_priority().ok(), expected);
        }
    }
}
