//! Intrusive circular doubly linked lists whose nodes and headers are stored
//! in an arena ([`ListArena`]) and addressed by index.
//!
//! Every node carries its own links, the identifier of the object it
//! represents (its *owner*), and a back-reference to the list currently
//! holding it (its *container*), so a node can be unlinked in constant time
//! without knowing which list it's in.
//!
//! Each list embeds a sentinel, represented by [`Position::End`]. The sentinel
//! never moves, is never counted, and compares as the maximum key.
use alloc::vec::Vec;
use core::{fmt, ops};
use num_traits::Bounded;

use crate::error::{InsertError, RemoveError};

/// Identifies a node in a [`ListArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Identifies a list in a [`ListArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Debug for ListId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ListId({})", self.0)
    }
}

/// A position in a list: either a node or the list's sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// The sentinel of the list.
    End,
    Node(NodeId),
}

impl Position {
    #[inline]
    pub fn node(self) -> Option<NodeId> {
        match self {
            Self::End => None,
            Self::Node(n) => Some(n),
        }
    }
}

/// Links to neighbor items.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Link {
    pub prev: Position,
    pub next: Position,
}

impl Link {
    /// A link pointing at the sentinel in both directions.
    const END: Self = Self {
        prev: Position::End,
        next: Position::End,
    };
}

/// A list element.
#[derive(Debug, Clone)]
pub struct ListNode<Key, Owner> {
    key: Key,
    link: Link,
    owner: Option<Owner>,
    /// Invariant: `Some(l)` iff the node is reachable from the sentinel of
    /// `l`
    container: Option<ListId>,
}

impl<Key: Copy, Owner: Copy> ListNode<Key, Owner> {
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    #[inline]
    pub fn owner(&self) -> Option<Owner> {
        self.owner
    }

    #[inline]
    pub fn container(&self) -> Option<ListId> {
        self.container
    }

    #[inline]
    pub fn link(&self) -> Link {
        self.link
    }
}

/// Circular linked list header.
#[derive(Debug, Clone)]
pub struct List {
    /// The number of nodes, not including the sentinel.
    count: usize,
    /// The sentinel's links. `end.next` is the head and `end.prev` is the
    /// tail. Both are `Position::End` iff the list is empty.
    end: Link,
    /// The round-robin cursor used by [`ListArena::advance_cursor`].
    cursor: Position,
}

impl List {
    const INIT: Self = Self {
        count: 0,
        end: Link::END,
        cursor: Position::End,
    };

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn cursor(&self) -> Position {
        self.cursor
    }
}

/// Storage for lists and the nodes linked into them.
pub struct ListArena<Key, Owner> {
    nodes: Vec<ListNode<Key, Owner>>,
    lists: Vec<List>,
}

impl<Key, Owner> Default for ListArena<Key, Owner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Key, Owner> ListArena<Key, Owner> {
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            lists: Vec::new(),
        }
    }

    /// Construct an arena that can hold the specified numbers of lists and
    /// nodes without reallocation.
    pub fn with_capacity(num_lists: usize, num_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(num_nodes),
            lists: Vec::with_capacity(num_lists),
        }
    }

    /// Get the number of nodes allocated in the arena.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

impl<Key, Owner> ops::Index<NodeId> for ListArena<Key, Owner> {
    type Output = ListNode<Key, Owner>;

    #[inline]
    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl<Key, Owner> ops::Index<ListId> for ListArena<Key, Owner> {
    type Output = List;

    #[inline]
    fn index(&self, index: ListId) -> &Self::Output {
        &self.lists[index.0]
    }
}

impl<Key, Owner> ListArena<Key, Owner>
where
    Key: Copy + Ord + Default + Bounded,
    Owner: Copy,
{
    /// Allocate an empty list.
    pub fn new_list(&mut self) -> ListId {
        let id = ListId(self.lists.len());
        self.lists.push(List::INIT);
        id
    }

    /// Reset `list` to the empty state. Any nodes still linked into it are
    /// detached.
    pub fn init(&mut self, list: ListId) {
        let mut pos = self.lists[list.0].end.next;
        while let Position::Node(n) = pos {
            let node = &mut self.nodes[n.0];
            pos = node.link.next;
            node.link = Link::END;
            node.container = None;
        }
        self.lists[list.0] = List::INIT;
    }

    /// Allocate a detached node representing `owner`.
    pub fn new_node(&mut self, owner: Owner) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ListNode {
            key: Key::default(),
            link: Link::END,
            owner: Some(owner),
            container: None,
        });
        id
    }

    /// Clear the key, links, container, and owner of `node`.
    ///
    /// Fails with `AlreadyLinked` if the node is still in a list.
    pub fn init_node(&mut self, node: NodeId) -> Result<(), InsertError> {
        let node = &mut self.nodes[node.0];
        if node.container.is_some() {
            return Err(InsertError::AlreadyLinked);
        }
        node.key = Key::default();
        node.link = Link::END;
        node.owner = None;
        Ok(())
    }

    pub fn set_owner(&mut self, node: NodeId, owner: Option<Owner>) {
        self.nodes[node.0].owner = owner;
    }

    /// Set the sort key of `node`. The node must not be in a sorted list.
    pub fn set_key(&mut self, node: NodeId, key: Key) {
        self.nodes[node.0].key = key;
    }

    /// Get the key at `pos`. The sentinel's key is the maximum value.
    #[inline]
    pub fn key_at(&self, pos: Position) -> Key {
        match pos {
            Position::End => Key::max_value(),
            Position::Node(n) => self.nodes[n.0].key,
        }
    }

    #[inline]
    pub fn len(&self, list: ListId) -> usize {
        self.lists[list.0].count
    }

    #[inline]
    pub fn is_empty(&self, list: ListId) -> bool {
        self.lists[list.0].count == 0
    }

    /// Get the position following the sentinel. This is the sentinel itself
    /// if the list is empty.
    #[inline]
    pub fn head(&self, list: ListId) -> Position {
        self.lists[list.0].end.next
    }

    /// Get the position preceding the sentinel.
    #[inline]
    pub fn tail(&self, list: ListId) -> Position {
        self.lists[list.0].end.prev
    }

    /// Get the first node of the list, if any.
    #[inline]
    pub fn first(&self, list: ListId) -> Option<NodeId> {
        self.head(list).node()
    }

    /// Get the position following `pos` in `list`, wrapping through the
    /// sentinel.
    #[inline]
    pub fn next(&self, list: ListId, pos: Position) -> Position {
        match pos {
            Position::End => self.lists[list.0].end.next,
            Position::Node(n) => {
                debug_assert_eq!(self.nodes[n.0].container, Some(list));
                self.nodes[n.0].link.next
            }
        }
    }

    /// Get the position preceding `pos` in `list`, wrapping through the
    /// sentinel.
    #[inline]
    pub fn prev(&self, list: ListId, pos: Position) -> Position {
        match pos {
            Position::End => self.lists[list.0].end.prev,
            Position::Node(n) => {
                debug_assert_eq!(self.nodes[n.0].container, Some(list));
                self.nodes[n.0].link.prev
            }
        }
    }

    /// Get an iterator over the nodes of `list`, from the head to the tail.
    pub fn iter(&self, list: ListId) -> Iter<'_, Key, Owner> {
        Iter {
            arena: self,
            list,
            pos: self.head(list),
        }
    }

    fn set_next(&mut self, list: ListId, at: Position, next: Position) {
        match at {
            Position::End => self.lists[list.0].end.next = next,
            Position::Node(n) => self.nodes[n.0].link.next = next,
        }
    }

    fn set_prev(&mut self, list: ListId, at: Position, prev: Position) {
        match at {
            Position::End => self.lists[list.0].end.prev = prev,
            Position::Node(n) => self.nodes[n.0].link.prev = prev,
        }
    }

    /// Link the detached `node` immediately before `at`.
    fn insert_before(&mut self, list: ListId, at: Position, node: NodeId) {
        let prev = self.prev(list, at);
        let new = Position::Node(node);

        let node_ref = &mut self.nodes[node.0];
        node_ref.link = Link { prev, next: at };
        node_ref.container = Some(list);

        self.set_next(list, prev, new);
        self.set_prev(list, at, new);
        self.lists[list.0].count += 1;
    }

    /// Insert `node` so that the list remains in non-decreasing key order.
    /// The node is placed after all existing nodes with an equal key.
    pub fn insert_sorted(&mut self, list: ListId, node: NodeId) -> Result<(), InsertError> {
        if self.nodes[node.0].container.is_some() {
            return Err(InsertError::AlreadyLinked);
        }

        let key = self.nodes[node.0].key;
        let mut pos = self.head(list);
        while let Position::Node(n) = pos {
            if self.nodes[n.0].key > key {
                break;
            }
            pos = self.nodes[n.0].link.next;
        }

        self.insert_before(list, pos, node);
        Ok(())
    }

    /// Insert `node` immediately before the sentinel regardless of its key.
    pub fn insert_end(&mut self, list: ListId, node: NodeId) -> Result<(), InsertError> {
        if self.nodes[node.0].container.is_some() {
            return Err(InsertError::AlreadyLinked);
        }

        self.insert_before(list, Position::End, node);
        Ok(())
    }

    /// Unlink `node` from its container. Returns the number of nodes
    /// remaining in that list.
    ///
    /// If the container's cursor points at `node`, the cursor is moved to the
    /// preceding position so that the next [`Self::advance_cursor`] call
    /// visits the node that followed `node`.
    pub fn remove(&mut self, node: NodeId) -> Result<usize, RemoveError> {
        let list = self.nodes[node.0]
            .container
            .ok_or(RemoveError::NotInContainer)?;
        let Link { prev, next } = self.nodes[node.0].link;

        self.set_next(list, prev, next);
        self.set_prev(list, next, prev);

        let node_ref = &mut self.nodes[node.0];
        node_ref.link = Link::END;
        node_ref.container = None;

        let list_ref = &mut self.lists[list.0];
        if list_ref.cursor == Position::Node(node) {
            list_ref.cursor = prev;
        }
        list_ref.count -= 1;
        Ok(list_ref.count)
    }

    /// Move the cursor of `list` to the next node, skipping the sentinel, and
    /// return that node's owner. Returns `None` if the list is empty.
    pub fn advance_cursor(&mut self, list: ListId) -> Option<Owner> {
        let list_ref = &self.lists[list.0];
        if list_ref.count == 0 {
            return None;
        }

        let mut pos = self.next(list, list_ref.cursor);
        if pos == Position::End {
            pos = self.next(list, pos);
        }

        self.lists[list.0].cursor = pos;
        pos.node().and_then(|n| self.nodes[n.0].owner)
    }
}

/// Iterator over the nodes of a list. Created by [`ListArena::iter`].
pub struct Iter<'a, Key, Owner> {
    arena: &'a ListArena<Key, Owner>,
    list: ListId,
    pos: Position,
}

impl<Key, Owner> Iterator for Iter<'_, Key, Owner>
where
    Key: Copy + Ord + Default + Bounded,
    Owner: Copy,
{
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.pos.node()?;
        self.pos = self.arena.next(self.list, self.pos);
        Some(node)
    }
}

impl<Key: fmt::Debug, Owner: fmt::Debug> fmt::Debug for ListArena<Key, Owner> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ListArena")
            .field("lists", &self.lists)
            .field("nodes", &self.nodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    type Arena = ListArena<u32, usize>;

    fn keys(arena: &Arena, list: ListId) -> Vec<u32> {
        arena.iter(list).map(|n| arena[n].key()).collect()
    }

    fn owners(arena: &Arena, list: ListId) -> Vec<usize> {
        arena.iter(list).map(|n| arena[n].owner().unwrap()).collect()
    }

    /// Check the structural invariants of `list`.
    fn check_list(arena: &Arena, list: ListId) {
        let count = arena.len(list);

        // Following `next` from the sentinel `count + 1` times returns to the
        // sentinel
        let mut pos = Position::End;
        for i in 0..=count {
            pos = arena.next(list, pos);
            if i < count {
                let n = pos.node().expect("reached the sentinel too early");
                assert_eq!(arena[n].container(), Some(list));
            }
        }
        assert_eq!(pos, Position::End);

        // Ditto for `prev`
        let mut pos = Position::End;
        for _ in 0..=count {
            pos = arena.prev(list, pos);
        }
        assert_eq!(pos, Position::End);

        assert_eq!(arena.iter(list).count(), count);
    }

    #[test]
    fn sorted_insert_ties_are_fifo() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        let nodes: Vec<_> = (0..3).map(|i| arena.new_node(i)).collect();
        arena.set_key(nodes[0], 5);
        arena.set_key(nodes[1], 3);
        arena.set_key(nodes[2], 5);

        for &n in &nodes {
            arena.insert_sorted(list, n).unwrap();
        }

        assert_eq!(keys(&arena, list), [3, 5, 5]);
        assert_eq!(owners(&arena, list), [1, 0, 2]);
        check_list(&arena, list);
    }

    #[test]
    fn insert_end_ignores_key() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        let a = arena.new_node(0);
        let b = arena.new_node(1);
        arena.set_key(a, 10);
        arena.set_key(b, 1);
        arena.insert_end(list, a).unwrap();
        arena.insert_end(list, b).unwrap();

        assert_eq!(keys(&arena, list), [10, 1]);
        assert_eq!(arena.head(list), Position::Node(a));
        assert_eq!(arena.tail(list), Position::Node(b));
        check_list(&arena, list);
    }

    #[test]
    fn double_remove() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        let other = arena.new_list();
        let a = arena.new_node(0);
        let b = arena.new_node(1);
        let c = arena.new_node(2);
        arena.insert_end(list, a).unwrap();
        arena.insert_end(list, b).unwrap();
        arena.insert_end(other, c).unwrap();

        assert_eq!(arena.remove(a), Ok(1));
        assert_eq!(arena[a].container(), None);
        assert_eq!(arena.remove(a), Err(RemoveError::NotInContainer));

        assert_eq!(arena.len(list), 1);
        assert_eq!(arena.len(other), 1);
        check_list(&arena, list);
        check_list(&arena, other);
    }

    #[test]
    fn already_linked() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        let other = arena.new_list();
        let a = arena.new_node(0);
        arena.insert_end(list, a).unwrap();

        assert_eq!(arena.insert_end(other, a), Err(InsertError::AlreadyLinked));
        assert_eq!(arena.insert_sorted(list, a), Err(InsertError::AlreadyLinked));
        assert_eq!(arena.init_node(a), Err(InsertError::AlreadyLinked));
        assert_eq!(arena.len(list), 1);
        assert!(arena.is_empty(other));

        arena.remove(a).unwrap();
        arena.init_node(a).unwrap();
        assert_eq!(arena[a].owner(), None);
        assert_eq!(arena[a].key(), 0);
    }

    #[test]
    fn empty_list() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        assert!(arena.is_empty(list));
        assert_eq!(arena.head(list), Position::End);
        assert_eq!(arena.next(list, Position::End), Position::End);
        assert_eq!(arena.key_at(arena.head(list)), u32::MAX);
        assert_eq!(arena.advance_cursor(list), None);
        check_list(&arena, list);
    }

    #[test]
    fn init_detaches_nodes() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        let a = arena.new_node(0);
        let b = arena.new_node(1);
        arena.insert_end(list, a).unwrap();
        arena.insert_end(list, b).unwrap();
        arena.advance_cursor(list);

        arena.init(list);
        arena.init(list);

        assert!(arena.is_empty(list));
        assert_eq!(arena[list].cursor(), Position::End);
        assert_eq!(arena[a].container(), None);
        assert_eq!(arena[b].container(), None);
        arena.insert_end(list, b).unwrap();
        check_list(&arena, list);
    }

    #[test]
    fn round_robin() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        for i in 0..3 {
            let n = arena.new_node(i);
            arena.insert_end(list, n).unwrap();
        }

        let picked: Vec<_> = (0..7).map(|_| arena.advance_cursor(list).unwrap()).collect();
        assert_eq!(picked, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn remove_under_cursor_keeps_rotation() {
        let mut arena = Arena::new();
        let list = arena.new_list();
        let nodes: Vec<_> = (0..4)
            .map(|i| {
                let n = arena.new_node(i);
                arena.insert_end(list, n).unwrap();
                n
            })
            .collect();

        assert_eq!(arena.advance_cursor(list), Some(0));
        assert_eq!(arena.advance_cursor(list), Some(1));

        // The cursor is on node 1; removing it must not skip node 2
        arena.remove(nodes[1]).unwrap();
        assert_eq!(arena.advance_cursor(list), Some(2));
        assert_eq!(arena.advance_cursor(list), Some(3));
        assert_eq!(arena.advance_cursor(list), Some(0));

        // Removing the head while the cursor is on it moves the cursor to
        // the sentinel
        arena.remove(nodes[0]).unwrap();
        assert_eq!(arena[list].cursor(), Position::End);
        assert_eq!(arena.advance_cursor(list), Some(2));
        check_list(&arena, list);
    }

    /// A modifying operation on `ListArena`.
    #[derive(Debug)]
    enum Cmd {
        InsertSorted { list: usize, node: usize, key: u32 },
        InsertEnd { list: usize, node: usize },
        Remove { node: usize },
        Advance { list: usize },
    }

    const NUM_LISTS: usize = 3;
    const NUM_NODES: usize = 8;

    /// Map random bytes to operations on `ListArena`.
    fn interpret(bytecode: &[u8]) -> impl Iterator<Item = Cmd> + '_ {
        bytecode.chunks_exact(3).map(|instr| {
            let list = instr[1] as usize % NUM_LISTS;
            let node = instr[2] as usize % NUM_NODES;
            match instr[0] % 4 {
                0 => Cmd::InsertSorted {
                    list,
                    node,
                    key: (instr[1] / 8) as u32 % 4,
                },
                1 => Cmd::InsertEnd { list, node },
                2 => Cmd::Remove { node },
                _ => Cmd::Advance { list },
            }
        })
    }

    #[quickcheck]
    fn matches_reference(bytecode: Vec<u8>) {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut arena = Arena::with_capacity(NUM_LISTS, NUM_NODES);
        let lists: Vec<_> = (0..NUM_LISTS).map(|_| arena.new_list()).collect();
        let nodes: Vec<_> = (0..NUM_NODES).map(|i| arena.new_node(i)).collect();

        // `reference[l]` is the list of node indices in `lists[l]`
        let mut reference: Vec<Vec<usize>> = vec![Vec::new(); NUM_LISTS];
        let mut key_of = [0u32; NUM_NODES];
        let mut container_of: [Option<usize>; NUM_NODES] = [None; NUM_NODES];

        for cmd in interpret(&bytecode) {
            log::trace!("    {cmd:?}");
            match cmd {
                Cmd::InsertSorted { list, node, key } => {
                    if container_of[node].is_some() {
                        assert_eq!(
                            arena.insert_sorted(lists[list], nodes[node]),
                            Err(InsertError::AlreadyLinked)
                        );
                        continue;
                    }
                    arena.set_key(nodes[node], key);
                    key_of[node] = key;
                    arena.insert_sorted(lists[list], nodes[node]).unwrap();

                    let at = reference[list]
                        .iter()
                        .position(|&i| key_of[i] > key)
                        .unwrap_or(reference[list].len());
                    reference[list].insert(at, node);
                    container_of[node] = Some(list);
                }
                Cmd::InsertEnd { list, node } => {
                    if container_of[node].is_some() {
                        assert_eq!(
                            arena.insert_end(lists[list], nodes[node]),
                            Err(InsertError::AlreadyLinked)
                        );
                        continue;
                    }
                    arena.insert_end(lists[list], nodes[node]).unwrap();
                    reference[list].push(node);
                    container_of[node] = Some(list);
                }
                Cmd::Remove { node } => match container_of[node].take() {
                    Some(list) => {
                        reference[list].retain(|&i| i != node);
                        assert_eq!(arena.remove(nodes[node]), Ok(reference[list].len()));
                    }
                    None => {
                        assert_eq!(arena.remove(nodes[node]), Err(RemoveError::NotInContainer));
                    }
                },
                Cmd::Advance { list } => {
                    let owner = arena.advance_cursor(lists[list]);
                    assert_eq!(owner.is_some(), !reference[list].is_empty());
                    if let Some(owner) = owner {
                        assert_eq!(container_of[owner], Some(list));
                    }
                }
            }

            for (l, &list) in lists.iter().enumerate() {
                check_list(&arena, list);
                assert_eq!(owners(&arena, list), reference[l]);
            }
            for (i, &node) in nodes.iter().enumerate() {
                assert_eq!(arena[node].container(), container_of[i].map(|l| lists[l]));
            }
        }
    }
}
