//! An intrusive AVL tree.
//!
//! Conventions used in comments:
//! - The height of a missing child is `-1`; the height of a leaf is `0`.
//! - The balance factor of a node `x` is `b(x) = h(right(x)) - h(left(x))`.
//! - A node is left-heavy if `b(x) < 0` and right-heavy if `b(x) > 0`.
//!
//! The fundamental invariants of an AVL tree are:
//! 1. For every node, all keys in its left subtree are less than its key and all keys in its right
//!    subtree are greater.
//! 2. For every node, `b(x) ∈ {-1, 0, 1}`.
//!
//! During a rebalance walk, exactly one node may have `b(x) ∈ {-2, 2}`. That node is always
//! resolved by a single or double rotation before the walk moves past it.
//!
//! Corollary: a tree of `n` nodes has height at most `~1.44 * log2(n + 2)`.

use core::{
    cell::UnsafeCell,
    fmt,
    marker::PhantomPinned,
    mem,
    ops::Not,
    pin::Pin,
    ptr::{self, NonNull},
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod bst;
mod cursor;
mod debug;
mod entry;
pub mod equal_paths;
mod iter;
pub mod map;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use iter::Iter;
pub use map::{AvlMap, OccupiedError};

use entry::InsertAs;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Nodes are owned by the tree through their [`Linked::Handle`] and are never moved in memory
/// while linked: rotations and removals only rewrite links and balance factors.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    // The change to a node's balance factor when the subtree on this side grows by one.
    #[inline]
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

// Node identity is the address alone; metadata of unsized nodes is ignored.
#[inline]
fn same_node<T: ?Sized>(a: NonNull<T>, b: NonNull<T>) -> bool {
    ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of nodes on the longest path from the root to a leaf.
    ///
    /// The height is derived from the stored balance factors by following the taller child at
    /// each level, so this completes in _O(log(n))_ time.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            height += 1;

            unsafe {
                let links = T::links(cur).as_ref();
                opt_cur = if links.balance() > 0 {
                    links.right()
                } else {
                    links.left()
                };
            }
        }

        height
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root {
            unsafe {
                assert_eq!(
                    T::links(root).as_ref().parent(),
                    None,
                    "root must not have a parent"
                );
                self.assert_invariants_at(root, None, None, &mut count);
            }
        }

        assert_eq!(count, self.len, "node count does not match `len`");
    }

    // Checks the subtree rooted at `node` and returns its height, counting a leaf as 1.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
        count: &mut usize,
    ) -> isize {
        unsafe {
            *count += 1;

            let key = node.as_ref().key();
            if let Some(lower) = lower {
                assert!(lower < key, "{lower:?} must be less than {key:?}");
            }
            if let Some(upper) = upper {
                assert!(key < upper, "{key:?} must be less than {upper:?}");
            }

            let mut heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert!(same_node(node, parent), "child must link back to its parent");

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    heights[dir as usize] = self.assert_invariants_at(child, lower, upper, count);
                }
            }

            let balance = T::links(node).as_ref().balance();
            let actual = heights[Dir::Right as usize] - heights[Dir::Left as usize];

            assert_eq!(
                isize::from(balance),
                actual,
                "stored balance of {key:?} does not match subtree heights"
            );
            assert!(
                (-1..=1).contains(&balance),
                "{key:?} is out of balance: {balance}"
            );

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.find(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that neither the links nor the key of the mutably borrowed node are
    /// modified, as doing so may result in undefined behavior.
    pub unsafe fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.find(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        unsafe { Some(self.remove_at(first)) }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        unsafe { Some(self.remove_at(last)) }
    }

    /// Returns the entry corresponding to `key`, which may be vacant or occupied.
    pub fn entry<Q>(&mut self, key: &Q) -> Entry<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Ok(node) => unsafe { Entry::occupied(self, node) },
            Err(insert_as) => unsafe { Entry::vacant(self, insert_as) },
        }
    }

    /// Returns an iterator over the elements of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing to the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing to the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns an editing cursor pointing to the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns an editing cursor pointing to the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with an equal key, `item` takes its place (and its
    /// balance factor) without changing the shape of the tree, and the previous item is returned.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe {
            match self.search(ptr.as_ref().key()) {
                Ok(existing) => {
                    self.replace_at(existing, ptr);
                    Some(T::from_ptr(existing))
                }
                Err(InsertAs::Root) => {
                    self.insert_as_root(ptr);
                    None
                }
                Err(InsertAs::Child { parent, dir }) => {
                    self.insert_as_child(parent, dir, ptr);
                    None
                }
            }
        }
    }

    /// Removes the item corresponding to `key` from the tree.
    ///
    /// Returns `None`, leaving the tree unchanged, if no such item exists.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.find(key)?;
        unsafe { Some(self.remove_at(node)) }
    }

    // Links `node` into the empty tree as its root.
    pub(crate) unsafe fn insert_as_root(&mut self, node: NonNull<T>) {
        debug_assert!(self.root.is_none());

        unsafe { T::links(node).as_mut().clear() };

        self.root = Some(node);
        self.len += 1;
    }

    // Links `node` as the `dir` child of `parent` and restores the balance of its ancestors.
    //
    // The `dir` child of `parent` must be vacant, and `node`'s key must belong in that slot.
    pub(crate) unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, node: NonNull<T>) {
        unsafe {
            debug_assert!(T::links(parent).as_ref().child(dir).is_none());

            let links = T::links(node).as_mut();
            links.clear();
            links.set_parent(Some(parent));

            T::links(parent).as_mut().set_child(dir, Some(node));
        }

        self.len += 1;

        unsafe { self.rebalance_after_insert(parent, node) };
    }

    // Performs a bottom-up rebalance of the tree after `node` was linked as a new leaf below
    // `parent`.
    //
    // Each step accounts for the growth of the subtree rooted at `node` in `parent`'s balance:
    // - A parent that becomes 0 absorbed the growth; its height is unchanged.
    // - A parent that becomes ±1 grew by one; the walk ascends.
    // - A parent that becomes ±2 is rotated. After an insertion, a single (or double) rotation
    //   restores the subtree to its height before the insertion, so the walk ends.
    unsafe fn rebalance_after_insert(&mut self, mut parent: NonNull<T>, mut node: NonNull<T>) {
        loop {
            unsafe {
                let dir = self.which_child(parent, node);
                let sign = dir.sign();

                match self.update_balance(parent, sign) {
                    0 => return,

                    -1 | 1 => match T::links(parent).as_ref().parent() {
                        Some(grandparent) => (parent, node) = (grandparent, parent),
                        None => return,
                    },

                    -2 | 2 => {
                        if self.balance(node) != -sign {
                            // `node` leans the same way as `parent` (it cannot be balanced after
                            // an insertion, but either way a single rotation suffices).
                            self.rotate(parent, !dir);
                            self.set_balance(parent, 0);
                            self.set_balance(node, 0);
                        } else {
                            self.rotate_zig_zag(parent, node, dir);
                        }

                        log::trace!(
                            "insert rebalanced at {:?}",
                            T::links(parent).as_ref().parent().map(|p| p.as_ref().key())
                        );

                        return;
                    }

                    balance => unreachable!("balance factor out of range: {balance}"),
                }
            }
        }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // If `node` has two children, it trades places (and balance factors) with its in-order
        // predecessor. The predecessor is the maximum of `node`'s left subtree and so has no right
        // child; after the swap, `node` sits in the predecessor's old position with at most one
        // child, and the tree is still ordered once `node` is unlinked.
        unsafe {
            if let (Some(left), Some(_)) = (
                T::links(node).as_ref().left(),
                T::links(node).as_ref().right(),
            ) {
                let predecessor = self.max_in_subtree(left);
                self.swap_nodes(node, predecessor);
            }

            let links = T::links(node).as_ref();
            let parent = links.parent();
            let child = links.left().or(links.right());

            self.maybe_set_parent(child, parent);

            match parent {
                Some(parent) => {
                    let dir = self.which_child(parent, node);
                    T::links(parent).as_mut().set_child(dir, child);

                    // The `dir` subtree of `parent` shrank by one.
                    self.rebalance_after_remove(parent, -dir.sign());
                }

                None => self.root = child,
            }

            T::links(node).as_mut().clear();
            self.len -= 1;

            T::from_ptr(node)
        }
    }

    // Performs a bottom-up rebalance of the tree after one of `node`'s subtrees shrank by one.
    //
    // `diff` is the resulting change to `node`'s balance: `1` if its left subtree shrank, `-1`
    // if its right subtree did.
    //
    // Each step applies `diff`:
    // - A node that becomes ±1 was balanced before; its height is unchanged and the walk ends.
    // - A node that becomes 0 lost height; the walk ascends.
    // - A node that becomes ±2 is rotated. Unlike insertion, the rotated subtree may still be
    //   one shorter than before, in which case the walk continues from its parent.
    unsafe fn rebalance_after_remove(&mut self, node: NonNull<T>, diff: i8) {
        let mut opt_node = Some(node);
        let mut diff = diff;

        while let Some(node) = opt_node {
            unsafe {
                // The rotations below move `node` down a level, so record where it hangs first.
                let parent = T::links(node).as_ref().parent();
                let next_diff = parent
                    .map(|p| -self.which_child(p, node).sign())
                    .unwrap_or(0);

                match self.update_balance(node, diff) {
                    -1 | 1 => return,

                    0 => (),

                    balance @ (-2 | 2) => {
                        let heavy = if balance < 0 { Dir::Left } else { Dir::Right };
                        let sign = heavy.sign();

                        let child = T::links(node)
                            .as_ref()
                            .child(heavy)
                            .expect("heavy side of an unbalanced node must not be empty");

                        match self.balance(child) {
                            0 => {
                                // The subtree keeps its height; the rotation ends the walk.
                                self.rotate(node, !heavy);
                                self.set_balance(node, sign);
                                self.set_balance(child, -sign);

                                log::trace!(
                                    "remove rebalanced at {:?}, height preserved",
                                    child.as_ref().key()
                                );

                                return;
                            }

                            b if b == sign => {
                                self.rotate(node, !heavy);
                                self.set_balance(node, 0);
                                self.set_balance(child, 0);
                            }

                            _ => self.rotate_zig_zag(node, child, heavy),
                        }
                    }

                    balance => unreachable!("balance factor out of range: {balance}"),
                }

                opt_node = parent;
                diff = next_diff;
            }
        }
    }

    // Resolves an imbalance at `node` whose `heavy` child leans the other way, by a double
    // rotation through the child's inner grandchild. The grandchild ends up as the subtree root
    // with balance 0.
    unsafe fn rotate_zig_zag(&mut self, node: NonNull<T>, child: NonNull<T>, heavy: Dir) {
        unsafe {
            let sign = heavy.sign();

            // A child leaning away from `heavy` has a non-empty inner subtree.
            let grandchild = T::links(child)
                .as_ref()
                .child(!heavy)
                .expect("zig-zag grandchild must exist");
            let grandchild_balance = self.balance(grandchild);

            self.rotate(child, heavy);
            self.rotate(node, !heavy);

            // `node` inherits the grandchild's outer subtree and `child` its inner one; whichever
            // of the two was shorter leaves its new parent leaning the other way.
            let (node_balance, child_balance) = match grandchild_balance {
                0 => (0, 0),
                b if b == sign => (-sign, 0),
                _ => (0, sign),
            };

            self.set_balance(node, node_balance);
            self.set_balance(child, child_balance);
            self.set_balance(grandchild, 0);
        }
    }

    /// Performs a left rotation at `node`: its right child takes its place and `node` becomes
    /// that child's left child.
    ///
    /// Balance factors are not updated.
    #[cfg_attr(not(test), allow(dead_code))]
    unsafe fn rotate_left(&mut self, node: NonNull<T>) {
        unsafe { self.rotate(node, Dir::Left) }
    }

    /// Performs a right rotation at `node`: its left child takes its place and `node` becomes
    /// that child's right child.
    ///
    /// Balance factors are not updated.
    #[cfg_attr(not(test), allow(dead_code))]
    unsafe fn rotate_right(&mut self, node: NonNull<T>) {
        unsafe { self.rotate(node, Dir::Right) }
    }

    // Performs a rotation moving `down` down in direction `dir`. Its `!dir` child, the pivot,
    // moves up into `down`'s place.
    //
    // The balance factors of affected nodes are not updated.
    unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) {
        unsafe {
            let up = T::links(down)
                .as_ref()
                .child(!dir)
                .expect("rotation requires a pivot child");

            log::trace!("rotate {:?} at {:?}", dir, down.as_ref().key());

            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        if self.root.is_some() {
            log::debug!("clearing tree of {} elements", self.len);
        }

        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.min_in_subtree(cur);
                let parent = T::links(cur).as_ref().parent();
                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None). Balance factors are left
                // stale; every node is about to be dropped.
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn balance(&self, node: NonNull<T>) -> i8 {
        unsafe { T::links(node).as_ref().balance() }
    }

    #[inline]
    unsafe fn set_balance(&mut self, node: NonNull<T>, balance: i8) {
        unsafe { T::links(node).as_mut().set_balance(balance) }
    }

    // Adds `diff` to the balance of `node`, returning the new balance.
    #[inline]
    unsafe fn update_balance(&mut self, node: NonNull<T>, diff: i8) -> i8 {
        unsafe {
            let inner = T::links(node).as_mut().inner.get_mut();
            inner.balance = inner.balance.checked_add(diff).unwrap();
            inner.balance
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|node| node.key())).finish()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns the balance factor stored in these links.
    #[inline]
    pub fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) {
        self.inner.get_mut().balance = balance;
    }

    // Resets the links to the unlinked state.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
