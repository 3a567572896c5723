//! Array-backed binary min-heap with a pluggable comparator.
//!
//! The heap knows nothing about tasks: it orders whatever it stores by the
//! comparator it was built with. `pop` always yields the element the
//! comparator ranks first. Elements comparing `Equal` come out in an
//! unspecified order; callers that need FIFO among equals must encode it in
//! the comparator.

use std::cmp::Ordering;
use std::fmt;

/// Comparator type used by [`PriorityQueue::new`].
pub type NaturalOrder<T> = fn(&T, &T) -> Ordering;

/// Binary min-heap ordered by a comparator.
///
/// `push` and `pop` are O(log n); `peek`, `len` and `is_empty` are O(1).
pub struct PriorityQueue<T, C = NaturalOrder<T>> {
    heap: Vec<T>,
    comparator: C,
}

impl<T: Ord> PriorityQueue<T> {
    /// Create an empty queue ordered by `T`'s natural ordering (smallest first).
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            comparator: Ord::cmp,
        }
    }
}

impl<T: Ord> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> PriorityQueue<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Create an empty queue ordered by `comparator`.
    ///
    /// `comparator(a, b) == Ordering::Less` means `a` is popped before `b`.
    pub const fn with_comparator(comparator: C) -> Self {
        Self {
            heap: Vec::new(),
            comparator,
        }
    }

    /// Create an empty queue with room for `capacity` elements.
    pub fn with_capacity_and_comparator(capacity: usize, comparator: C) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            comparator,
        }
    }

    /// Insert an element.
    pub fn push(&mut self, item: T) {
        self.heap.push(item);
        self.sift_up(self.heap.len() - 1);
    }

    /// Remove and return the element ranked first, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    /// The element `pop` would return next, without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Keep only the elements matching `keep`, returning how many were removed.
    ///
    /// Rebuilds the heap in O(n).
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.heap.len();
        self.heap.retain(|item| keep(item));
        let removed = before - self.heap.len();
        if removed > 0 {
            self.rebuild();
        }
        removed
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Drain the queue into a vector in pop order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(item) = self.pop() {
            out.push(item);
        }
        out
    }

    fn precedes(&self, a: usize, b: usize) -> bool {
        (self.comparator)(&self.heap[a], &self.heap[b]) == Ordering::Less
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.precedes(idx, parent) {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;

            if left < len && self.precedes(left, smallest) {
                smallest = left;
            }
            if right < len && self.precedes(right, smallest) {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn rebuild(&mut self) {
        for idx in (0..self.heap.len() / 2).rev() {
            self.sift_down(idx);
        }
    }
}

impl<T, C> Extend<T> for PriorityQueue<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T: Ord> FromIterator<T> for PriorityQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.heap.extend(iter);
        queue.rebuild();
        queue
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PriorityQueue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("len", &self.heap.len())
            .field("peek", &self.heap.first())
            .finish()
    }
}
