//! Plain binary search tree primitives.
//!
//! Nothing in this module looks at or restores balance, with the single exception of
//! [`AvlTree::swap_nodes`], which carries each node's balance factor along with its position.

use core::{borrow::Borrow, cmp::Ordering, ptr::NonNull};

use crate::{entry::InsertAs, same_node, AvlTree, Dir, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    // Returns the node corresponding to `key`, if any.
    pub(crate) fn find<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key).ok()
    }

    // Descends the tree looking for `key`.
    //
    // Returns the matching node, or the vacant slot where a node with `key` would be linked.
    pub(crate) fn search<Q>(&self, key: &Q) -> Result<NonNull<T>, InsertAs<T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut cur) = self.root else {
            return Err(InsertAs::Root);
        };

        loop {
            let dir = unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => Dir::Left,
                    Ordering::Equal => return Ok(cur),
                    Ordering::Greater => Dir::Right,
                }
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => return Err(InsertAs::Child { parent: cur, dir }),
            }
        }
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.min_in_subtree(root) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.max_in_subtree(root) })
    }

    // Returns the minimum node in the subtree rooted at `root`.
    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Left) }
    }

    // Returns the maximum node in the subtree rooted at `root`.
    #[inline]
    pub(crate) unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Right) }
    }

    #[inline]
    unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(child) = unsafe { T::links(cur).as_ref().child(dir) } {
            cur = child;
        }

        cur
    }

    // Returns the in-order successor of `node`.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    // Returns the in-order predecessor of `node`.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    // Returns the in-order neighbor of `node` in direction `dir`.
    unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            // If the `dir` subtree is non-empty, the neighbor is its nearest element.
            if let Some(child) = T::links(node).as_ref().child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            // Otherwise, ascend until arriving from the `!dir` side.
            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if self.which_child(parent, cur) == !dir {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    #[inline]
    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        let left = unsafe { T::links(parent).as_ref().left() };

        if left.is_some_and(|left| same_node(left, child)) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    #[inline]
    pub(crate) unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    pub(crate) unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            if cfg!(debug_assertions) {
                assert!(
                    T::links(parent)
                        .as_ref()
                        .child(dir)
                        .is_some_and(|child| same_node(child, old_child)),
                    "`old_child` must be a child of `parent`"
                );

                let sibling = T::links(parent).as_ref().child(!dir);
                if let (Some(new), Some(sibling)) = (new_child, sibling) {
                    assert!(
                        !same_node(new, sibling),
                        "`new_child` must not be a child of `parent`"
                    );
                }
            }

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    // Exchanges the positions of `a` and `b` in the tree, including their balance factors.
    //
    // The nodes themselves stay where they are in memory, so their keys and payloads travel with
    // them: only links are rewritten. This handles the case where one node is the parent of the
    // other as well as the case where both share a parent.
    pub(crate) unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if same_node(a, b) {
            return;
        }

        // After the swap, every link that pointed at `a` points at `b` and vice versa.
        let swapped = |link: Link<T>| match link {
            Some(n) if same_node(n, a) => Some(b),
            Some(n) if same_node(n, b) => Some(a),
            other => other,
        };

        unsafe {
            let a_parent = T::links(a).as_ref().parent();
            let a_left = T::links(a).as_ref().left();
            let a_right = T::links(a).as_ref().right();
            let a_dir = a_parent.map(|p| self.which_child(p, a));

            let b_parent = T::links(b).as_ref().parent();
            let b_left = T::links(b).as_ref().left();
            let b_right = T::links(b).as_ref().right();
            let b_dir = b_parent.map(|p| self.which_child(p, b));

            // Point the surrounding nodes at their new neighbors.
            match (a_parent, a_dir) {
                (Some(p), Some(dir)) if !same_node(p, b) => {
                    T::links(p).as_mut().set_child(dir, Some(b));
                }
                (None, _) => self.root = Some(b),
                _ => (),
            }

            match (b_parent, b_dir) {
                (Some(p), Some(dir)) if !same_node(p, a) => {
                    T::links(p).as_mut().set_child(dir, Some(a));
                }
                (None, _) => self.root = Some(a),
                _ => (),
            }

            for child in [a_left, a_right].into_iter().flatten() {
                if !same_node(child, b) {
                    T::links(child).as_mut().set_parent(Some(b));
                }
            }

            for child in [b_left, b_right].into_iter().flatten() {
                if !same_node(child, a) {
                    T::links(child).as_mut().set_parent(Some(a));
                }
            }

            // Exchange the nodes' own links.
            let a_links = T::links(a).as_mut();
            a_links.set_parent(swapped(b_parent));
            a_links.set_left(swapped(b_left));
            a_links.set_right(swapped(b_right));

            let b_links = T::links(b).as_mut();
            b_links.set_parent(swapped(a_parent));
            b_links.set_left(swapped(a_left));
            b_links.set_right(swapped(a_right));

            let a_balance = T::links(a).as_ref().balance();
            let b_balance = T::links(b).as_ref().balance();
            T::links(a).as_mut().set_balance(b_balance);
            T::links(b).as_mut().set_balance(a_balance);
        }
    }

    // Links `new` into the tree in place of `old`, which is left unlinked.
    //
    // `new` takes over `old`'s parent, children and balance factor, so the shape of the tree is
    // unchanged.
    //
    // # Safety
    //
    // `new` must not be linked into any tree, and its key must be equal to `old`'s.
    pub(crate) unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) {
        unsafe {
            log::debug!("replacing node with key {:?}", old.as_ref().key());
            debug_assert!(old.as_ref().key() == new.as_ref().key());

            let old_links = T::links(old).as_ref();
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();
            let balance = old_links.balance();

            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            let new_links = T::links(new).as_mut();
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_balance(balance);

            T::links(old).as_mut().clear();
        }
    }
}
