//! Intrusive doubly linked list used as the ordering backbone of
//! [`CountingLruMap`](crate::lru_map::CountingLruMap) and
//! [`BoundedHistory`](crate::history::BoundedHistory).
//!
//! The list owns its nodes through raw pointers so that the owning map can
//! keep a `key -> *mut Node<T>` index and detach or reorder a node in O(1).
//! Two sentinel nodes bracket the live nodes:
//!
//! ```text
//!   head ⇄ newest ⇄ ... ⇄ oldest ⇄ tail
//! ```
//!
//! New values are pushed right after `head`; the oldest value sits right
//! before `tail`. Iteration with [`List::iter_oldest_first`] walks from the
//! tail towards the head, which is the order callers observe as "insertion
//! order".

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

/// A node in the doubly linked list.
pub(crate) struct Node<T> {
    /// Uninitialized for the two sentinels, initialized for every other node.
    val: mem::MaybeUninit<T>,
    prev: *mut Node<T>,
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn new(val: T) -> Self {
        Node {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    fn new_sentinel() -> Self {
        Node {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Returns the stored value.
    ///
    /// # Safety
    ///
    /// Must not be called on a sentinel. Every node handed out by [`List`]
    /// is a value node.
    pub(crate) unsafe fn value(&self) -> &T {
        // SAFETY: caller guarantees this is not a sentinel
        unsafe { self.val.assume_init_ref() }
    }

    /// Returns the stored value mutably.
    ///
    /// # Safety
    ///
    /// Same contract as [`Node::value`].
    pub(crate) unsafe fn value_mut(&mut self) -> &mut T {
        // SAFETY: caller guarantees this is not a sentinel
        unsafe { self.val.assume_init_mut() }
    }

    /// Consumes a detached value node and returns its value.
    ///
    /// # Safety
    ///
    /// `node` must be a detached value node allocated by [`List`].
    unsafe fn into_value(node: *mut Node<T>) -> T {
        // SAFETY: the caller hands over a value node, so `val` is
        // initialized. Dropping the box afterwards does not touch the value
        // because `MaybeUninit` never drops its contents.
        unsafe {
            let boxed = Box::from_raw(node);
            boxed.val.assume_init_read()
        }
    }
}

/// An unbounded doubly linked list with O(1) push, detach and reorder.
pub(crate) struct List<T> {
    len: usize,
    head: *mut Node<T>,
    tail: *mut Node<T>,
}

impl<T> List<T> {
    /// Creates an empty list with linked sentinels.
    pub(crate) fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Node::new_sentinel()));
        let tail = Box::into_raw(Box::new(Node::new_sentinel()));

        // SAFETY: head and tail are freshly allocated and valid
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }

        List { len: 0, head, tail }
    }

    /// Returns the number of value nodes.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list holds no values.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pushes `v` to the newest position and returns a pointer to its node.
    ///
    /// The pointer stays valid until the node is removed or the list is
    /// cleared or dropped.
    pub(crate) fn push_front(&mut self, v: T) -> *mut Node<T> {
        let node = Box::into_raw(Box::new(Node::new(v)));
        // SAFETY: node is newly allocated and not part of any list yet
        unsafe { self.attach(node) };
        self.len += 1;
        node
    }

    /// Removes and returns the oldest value.
    pub(crate) fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is not empty so tail.prev is a value node
        unsafe {
            let last = (*self.tail).prev;
            self.detach(last);
            self.len -= 1;
            Some(Node::into_value(last))
        }
    }

    /// Returns the oldest value without removing it.
    pub(crate) fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is not empty so tail.prev is a live value node
        unsafe { Some((*(*self.tail).prev).value()) }
    }

    /// Detaches `node`, frees it and returns its value.
    ///
    /// # Safety
    ///
    /// `node` must be a value node currently linked into this list.
    pub(crate) unsafe fn remove(&mut self, node: *mut Node<T>) -> T {
        debug_assert!(!node.is_null() && node != self.head && node != self.tail);
        // SAFETY: caller guarantees node belongs to this list
        unsafe {
            self.detach(node);
            self.len -= 1;
            Node::into_value(node)
        }
    }

    /// Moves `node` to the newest position.
    ///
    /// # Safety
    ///
    /// `node` must be a value node currently linked into this list.
    pub(crate) unsafe fn move_to_front(&mut self, node: *mut Node<T>) {
        // SAFETY: caller guarantees node belongs to this list
        unsafe {
            if (*self.head).next == node {
                return;
            }
            self.detach(node);
            self.attach(node);
        }
    }

    /// Iterates values from the oldest to the newest.
    pub(crate) fn iter_oldest_first(&self) -> IterOldestFirst<'_, T> {
        // SAFETY: tail is a valid sentinel for the lifetime of self
        let cursor = unsafe { (*self.tail).prev };
        IterOldestFirst {
            cursor,
            head: self.head,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Drops every value node, leaving the sentinels linked.
    pub(crate) fn clear(&mut self) {
        while self.pop_back().is_some() {}
    }

    /// # Safety
    ///
    /// `node` must be a value node linked into this list.
    unsafe fn detach(&mut self, node: *mut Node<T>) {
        // SAFETY: a linked node always has valid prev and next neighbours
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// # Safety
    ///
    /// `node` must be valid and not linked into any list.
    unsafe fn attach(&mut self, node: *mut Node<T>) {
        // SAFETY: head is valid for the lifetime of self; caller guarantees node
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*self.head).next = node;
            (*(*node).next).prev = node;
        }
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: the sentinels were created with Box::into_raw in `new` and
        // are freed exactly once here. Their values are uninitialized and
        // MaybeUninit does not drop them.
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        List::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter_oldest_first()).finish()
    }
}

/// Iterator over list values from oldest to newest.
pub(crate) struct IterOldestFirst<'a, T> {
    cursor: *mut Node<T>,
    head: *mut Node<T>,
    remaining: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for IterOldestFirst<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.head {
            return None;
        }
        // SAFETY: the cursor walks value nodes of a list borrowed for 'a,
        // stopping at the head sentinel
        unsafe {
            let node = &*self.cursor;
            self.cursor = node.prev;
            self.remaining -= 1;
            Some(node.value())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &List<u32>) -> Vec<u32> {
        list.iter_oldest_first().copied().collect()
    }

    #[test]
    fn test_push_front_orders_oldest_first() {
        let mut list = List::new();
        assert!(list.is_empty());
        list.push_front(1);
        list.push_front(2);
        list.push_front(3);
        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list), vec![1, 2, 3]);
        assert_eq!(list.back(), Some(&1));
    }

    #[test]
    fn test_pop_back() {
        let mut list = List::new();
        list.push_front(10);
        list.push_front(20);

        assert_eq!(list.pop_back(), Some(10));
        assert_eq!(list.pop_back(), Some(20));
        assert!(list.pop_back().is_none());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_remove_middle_node() {
        let mut list = List::new();
        list.push_front(1);
        let middle = list.push_front(2);
        list.push_front(3);

        let removed = unsafe { list.remove(middle) };
        assert_eq!(removed, 2);
        assert_eq!(collect(&list), vec![1, 3]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_move_to_front() {
        let mut list = List::new();
        let first = list.push_front(1);
        list.push_front(2);
        let third = list.push_front(3);

        unsafe { list.move_to_front(first) };
        assert_eq!(collect(&list), vec![2, 3, 1]);

        // already newest
        unsafe { list.move_to_front(first) };
        assert_eq!(collect(&list), vec![2, 3, 1]);

        unsafe { list.move_to_front(third) };
        assert_eq!(collect(&list), vec![2, 1, 3]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_value_mut() {
        let mut list = List::new();
        let node = list.push_front(String::from("two"));
        unsafe { (*node).value_mut().push_str("_modified") };
        assert_eq!(unsafe { (*node).value() }, "two_modified");
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut list = List::new();
        for i in 0..5 {
            list.push_front(i);
        }
        list.clear();
        assert!(list.is_empty());
        assert!(list.back().is_none());
        assert_eq!(list.iter_oldest_first().count(), 0);

        list.push_front(7);
        assert_eq!(collect(&list), vec![7]);
    }

    #[test]
    fn test_drop_releases_values() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        {
            let mut list = List::new();
            list.push_front(Rc::clone(&tracker));
            list.push_front(Rc::clone(&tracker));
            assert_eq!(Rc::strong_count(&tracker), 3);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
