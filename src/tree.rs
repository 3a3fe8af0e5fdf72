//! The public index type and its operation handles.

use alloc::vec::Vec;
use core::fmt;

use crate::raw::RawLacedTree;

/// An ordered index keyed by `i64`.
///
/// `LacedTree` is a B+ tree in which every node carries a back-reference to
/// its parent, every level is threaded into a doubly-linked sibling list, and
/// internal nodes cache the smallest key of their subtree next to separator
/// keys that are per-child subtree maxima. Structural maintenance ascends
/// those back-references directly instead of re-walking from the root.
///
/// Values are opaque to the tree: it stores them, hands out references
/// through [`Handle`]s, and drops them on removal, but never inspects them.
/// The intended payloads are pointer-sized.
///
/// Point operations return a [`Handle`] carrying either a reference to the
/// affected value or the end marker; soft failures (missing key on
/// [`find`](LacedTree::find)/[`update`](LacedTree::update)/
/// [`remove`](LacedTree::remove), duplicate key on
/// [`insert`](LacedTree::insert)) are signalled through end handles and
/// `false` returns, never through panics.
///
/// # Examples
///
/// ```
/// use laced_tree::LacedTree;
///
/// let mut index = LacedTree::new();
/// for key in [2, 9, 4, 7] {
///     index.insert(key, key * 100);
/// }
///
/// assert_eq!(index.len(), 4);
/// assert_eq!(index.find(9).value(), Some(&900));
/// assert!(index.find(3).at_end());
///
/// let mut keys = Vec::new();
/// index.collect_keys(&mut keys, true);
/// assert_eq!(keys, [9, 7, 4, 2]);
/// ```
pub struct LacedTree<V> {
    raw: RawLacedTree<V>,
}

/// Handle returned by the point operations of [`LacedTree`].
///
/// A handle is a small value-semantics object: either it references the value
/// a point operation touched, or it is the *end* handle signalling that the
/// operation did not take effect. It is not a cursor: it cannot advance, and
/// it does not survive mutation of the tree (the borrow rules enforce this).
#[derive(Debug)]
pub struct Handle<'a, V> {
    value: Option<&'a V>,
}

// Handles are copyable regardless of the value type; they only hold a
// reference.
impl<V> Clone for Handle<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Handle<'_, V> {}

impl<'a, V> Handle<'a, V> {
    /// Returns true if this is the end handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use laced_tree::LacedTree;
    ///
    /// let mut index = LacedTree::new();
    /// index.insert(1, ());
    /// assert!(!index.find(1).at_end());
    /// assert!(index.find(2).at_end());
    /// ```
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the referenced value, or `None` for the end handle.
    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.value
    }
}

impl<V> LacedTree<V> {
    /// Creates an empty index: a single empty leaf as root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawLacedTree::new(),
        }
    }

    /// Number of keys in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns true if the index holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The end handle, as returned by point operations that did not take
    /// effect.
    #[must_use]
    pub fn end(&self) -> Handle<'_, V> {
        Handle { value: None }
    }

    /// Looks up `key`, returning a handle to its value or the end handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use laced_tree::LacedTree;
    ///
    /// let mut index = LacedTree::new();
    /// index.insert(8, "eight");
    /// assert_eq!(index.find(8).value(), Some(&"eight"));
    /// assert!(index.find(9).at_end());
    /// ```
    #[must_use]
    pub fn find(&self, key: i64) -> Handle<'_, V> {
        Handle {
            value: self.raw.get(key),
        }
    }

    /// Overwrites the value for `key` if present. Returns whether a value was
    /// overwritten; an absent key leaves the index untouched.
    pub fn update(&mut self, key: i64, value: V) -> bool {
        self.raw.update(key, value).is_ok()
    }

    /// Inserts `key` if absent, returning a handle to the stored value. A
    /// duplicate key leaves the index untouched, drops the offered value, and
    /// returns the end handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use laced_tree::LacedTree;
    ///
    /// let mut index = LacedTree::new();
    /// assert_eq!(index.insert(3, "first").value(), Some(&"first"));
    /// assert!(index.insert(3, "second").at_end());
    /// assert_eq!(index.find(3).value(), Some(&"first"));
    /// ```
    pub fn insert(&mut self, key: i64, value: V) -> Handle<'_, V> {
        match self.raw.insert(key, value) {
            Ok(position) => Handle {
                value: Some(self.raw.value_at(position)),
            },
            Err(_rejected) => Handle { value: None },
        }
    }

    /// Inserts `key` or overwrites its value, returning a handle to the
    /// stored value. Never returns the end handle.
    pub fn upsert(&mut self, key: i64, value: V) -> Handle<'_, V> {
        let position = self.raw.upsert(key, value);
        Handle {
            value: Some(self.raw.value_at(position)),
        }
    }

    /// Removes `key` and drops its value. Returns whether the key was
    /// present.
    pub fn remove(&mut self, key: i64) -> bool {
        self.raw.remove(key).is_some()
    }

    /// Appends every key to `out`, ascending, or descending when
    /// `backwards`. The buffer is not cleared first.
    ///
    /// # Examples
    ///
    /// ```
    /// use laced_tree::LacedTree;
    ///
    /// let mut index = LacedTree::new();
    /// for key in [5, 1, 3] {
    ///     index.insert(key, ());
    /// }
    /// let mut keys = Vec::new();
    /// index.collect_keys(&mut keys, false);
    /// index.collect_keys(&mut keys, true);
    /// assert_eq!(keys, [1, 3, 5, 5, 3, 1]);
    /// ```
    pub fn collect_keys(&self, out: &mut Vec<i64>, backwards: bool) {
        self.raw.collect_keys(out, backwards);
    }
}

impl<V> Default for LacedTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for LacedTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.raw.for_each_entry(|key, value| {
            map.entry(&key, value);
        });
        map.finish()
    }
}
