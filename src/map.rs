extern crate alloc;

use alloc::boxed::Box;
use core::{borrow::Borrow, fmt, marker::PhantomPinned, mem, pin::Pin, ptr::NonNull};

use cordyceps::Linked;

use crate::{entry::Entry, iter, AvlTree, Links, TreeNode};

/// An ordered map based on an [AVL tree].
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlMap<K: Ord + fmt::Debug, V> {
    tree: AvlTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

impl<K, V> MapNode<K, V> {
    fn new(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        })
    }

    fn parts_mut<'a>(self: Pin<&'a mut Self>) -> (&'a K, &'a mut V) {
        // SAFETY: Pinning is not structural for `key` or `value`, and `links` is not handed out.
        let node = unsafe { self.get_unchecked_mut() };
        (&node.key, &mut node.value)
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord + fmt::Debug, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// The error returned by [`AvlMap::try_insert`] when the key is already present.
///
/// Holds the key and value already in the map along with the value that was not inserted.
#[derive(Debug, thiserror::Error)]
#[error("failed to insert {value:?}: key {key:?} already maps to {existing:?}")]
pub struct OccupiedError<'a, K: fmt::Debug, V: fmt::Debug> {
    pub key: &'a K,
    pub existing: &'a mut V,
    pub value: V,
}

impl<K: Ord + fmt::Debug, V> AvlMap<K, V> {
    /// Creates a new, empty `AvlMap`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // SAFETY: only the value is exposed; the key and links stay untouched.
        unsafe { self.tree.get_mut(key) }.map(|node| node.parts_mut().1)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains `key`, its value is overwritten in place and the old value is
    /// returned; the key itself and the shape of the tree are left untouched.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.entry(&key) {
            Entry::Occupied(mut occupied) => {
                // SAFETY: only the value is written.
                let (_, existing) = unsafe { occupied.get_mut() }.parts_mut();
                Some(mem::replace(existing, value))
            }

            Entry::Vacant(vacant) => {
                // SAFETY: the node's key is the key used to find the entry.
                unsafe { vacant.insert(MapNode::new(key, value)) };
                None
            }
        }
    }

    /// Inserts a key-value pair into the map if `key` is not already present.
    ///
    /// Returns a mutable reference to the inserted value, or an [`OccupiedError`] carrying the
    /// rejected value if the key is occupied.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<&mut V, OccupiedError<'_, K, V>>
    where
        V: fmt::Debug,
    {
        match self.tree.entry(&key) {
            Entry::Occupied(occupied) => {
                // SAFETY: the key is only exposed immutably.
                let (key, existing) = unsafe { occupied.into_mut() }.parts_mut();
                Err(OccupiedError {
                    key,
                    existing,
                    value,
                })
            }

            Entry::Vacant(vacant) => {
                // SAFETY: the node's key is the key used to find the entry.
                let node = unsafe { vacant.insert(MapNode::new(key, value)) };
                Ok(node.parts_mut().1)
            }
        }
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree
            .first()
            .map(|node| (&node.get_ref().key, &node.get_ref().value))
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(MapNode::into_pair)
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree
            .last()
            .map(|node| (&node.get_ref().key, &node.get_ref().value))
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(MapNode::into_pair)
    }

    /// Removes the value associated with `key` from the map.
    ///
    /// Removing an absent key is a no-op and returns `None`.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|node| node.value)
    }

    /// Returns an iterator over the key-value pairs of the map, in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Returns an iterator over the keys of the map, in order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values of the map, in key order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Writes a Graphviz rendering of the underlying tree to `w`.
    pub fn dotgraph<W: fmt::Write>(&self, name: &str, w: W) -> fmt::Result
    where
        K: fmt::Display,
    {
        self.tree.dotgraph(name, w)
    }
}

impl<K, V> MapNode<K, V> {
    #[allow(clippy::boxed_local)]
    fn into_pair(node: Box<Self>) -> (K, V) {
        let MapNode { key, value, .. } = *node;
        (key, value)
    }
}

/// An iterator over the key-value pairs of an [`AvlMap`].
pub struct Iter<'a, K: Ord + fmt::Debug, V> {
    inner: iter::Iter<'a, MapNode<K, V>>,
}

impl<'a, K: Ord + fmt::Debug, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| (&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: Ord + fmt::Debug, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|node| (&node.key, &node.value))
    }
}

impl<'a, K: Ord + fmt::Debug, V> ExactSizeIterator for Iter<'a, K, V> {}

impl<'a, K: Ord + fmt::Debug, V> IntoIterator for &'a AvlMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Ord + fmt::Debug, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + fmt::Debug, V> Extend<(K, V)> for AvlMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord + fmt::Debug, V> FromIterator<(K, V)> for AvlMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AvlMap::new();
        map.extend(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut map: AvlMap<u32, &str> = [(2, "two"), (1, "one"), (3, "three")]
            .into_iter()
            .collect();

        let root_before = map.tree.root;

        assert_eq!(map.insert(2, "deux"), Some("two"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&2), Some(&"deux"));
        assert_eq!(map.tree.root, root_before);
        map.assert_invariants();
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut map: AvlMap<u32, u32> = (0..10).map(|k| (k, k * 10)).collect();

        assert_eq!(map.remove(&42), None);
        assert_eq!(map.len(), 10);
        map.assert_invariants();

        let mut empty: AvlMap<u32, u32> = AvlMap::new();
        assert_eq!(empty.remove(&0), None);
        assert!(empty.is_empty());
    }

    #[test]
    fn try_insert_reports_occupied() {
        let mut map = AvlMap::new();

        assert_eq!(map.try_insert("a", 1).copied().ok(), Some(1));

        let err = map.try_insert("a", 2).unwrap_err();
        assert_eq!(*err.key, "a");
        assert_eq!(*err.existing, 1);
        assert_eq!(err.value, 2);
        assert_eq!(
            err.to_string(),
            "failed to insert 2: key \"a\" already maps to 1"
        );

        *err.existing = 7;
        assert_eq!(map.get("a"), Some(&7));
    }

    #[test]
    fn get_mut_and_pops() {
        let mut map: AvlMap<i32, String> = (-3..=3).map(|k| (k, k.to_string())).collect();

        map.get_mut(&0).unwrap().push('!');
        assert_eq!(map.get(&0).map(String::as_str), Some("0!"));

        assert_eq!(map.first_key_value(), Some((&-3, &"-3".to_string())));
        assert_eq!(map.last_key_value(), Some((&3, &"3".to_string())));
        assert_eq!(map.pop_first(), Some((-3, "-3".to_string())));
        assert_eq!(map.pop_last(), Some((3, "3".to_string())));
        assert_eq!(map.len(), 5);
        map.assert_invariants();

        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![-2, -1, 0, 1, 2]);
        assert_eq!(map.values().rev().next().map(String::as_str), Some("2"));

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.height(), 0);
    }

    #[test]
    fn debug_lists_entries_in_order() {
        let map: AvlMap<u8, char> = [(3, 'c'), (1, 'a'), (2, 'b')].into_iter().collect();
        assert_eq!(format!("{map:?}"), "{1: 'a', 2: 'b', 3: 'c'}");
    }
}
