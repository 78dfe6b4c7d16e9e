extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;
use rand::{seq::SliceRandom, SeedableRng};

use crate::model::{self, TestNode};

use super::*;

fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

fn tree_of(keys: impl IntoIterator<Item = u32>) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn in_order_keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn root_key(tree: &AvlTree<TestNode>) -> Option<u32> {
    tree.root.map(|root| unsafe { root.as_ref().key })
}

// Returns every ordering of `0..n`.
fn permutations(n: u32) -> Vec<Vec<u32>> {
    fn go(prefix: &mut Vec<u32>, rest: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
        if rest.is_empty() {
            out.push(prefix.clone());
            return;
        }

        for i in 0..rest.len() {
            let key = rest.remove(i);
            prefix.push(key);
            go(prefix, rest, out);
            prefix.pop();
            rest.insert(i, key);
        }
    }

    let mut out = Vec::new();
    go(&mut Vec::new(), &mut (0..n).collect(), &mut out);
    out
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys.iter().copied());

    for key in keys {
        let node = tree.find(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    assert_eq!(tree.len(), keys.len());
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys.iter().copied());

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        assert!(!tree.contains_key(key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
    assert!(tree.root.is_none());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.find(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn permutations_find() {
    for n in 2..=6 {
        for keys in permutations(n) {
            insert_find_all(&keys);
        }
    }
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn permutations_remove() {
    for n in 2..=6 {
        for keys in permutations(n) {
            insert_remove_all(&keys);
        }
    }
}

// Removes each key of a full tree of every insertion order, one key at a time, so that every
// position (root, inner node with two children, leaf) gets removed from every shape.
#[test]
fn permutations_remove_each_position() {
    for keys in permutations(7) {
        for removed in 0..7 {
            let mut tree = tree_of(keys.iter().copied());

            assert_eq!(tree.remove(&removed).map(|node| node.key), Some(removed));
            tree.assert_invariants();

            let expected: Vec<u32> = (0..7).filter(|&k| k != removed).collect();
            assert_eq!(in_order_keys(&tree), expected);
        }
    }
}

#[test]
fn scenario_mixed_insertions() {
    let tree = tree_of([5, 3, 8, 1, 4]);

    assert_eq!(tree.height(), 3);
    assert_eq!(root_key(&tree), Some(5));
    assert_eq!(in_order_keys(&tree), vec![1, 3, 4, 5, 8]);
}

#[test]
fn ascending_insertions_rotate() {
    init_logging();

    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(1));
    tree.insert(TestNode::new(2));
    assert_eq!(root_key(&tree), Some(1));

    // The third key of a monotonic run unbalances the root.
    tree.insert(TestNode::new(3));
    assert_eq!(root_key(&tree), Some(2));
    tree.assert_invariants();

    for key in 4..=7 {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    assert_eq!(tree.height(), 3);
    assert_eq!(root_key(&tree), Some(4));
}

#[test]
fn remove_root_of_ascending_run() {
    let mut tree = tree_of(1..=7);

    let removed = tree.remove(&4).expect("root should be present");
    assert_eq!(removed.key, 4);

    tree.assert_invariants();
    assert!(tree.get(&4).is_none());
    assert_eq!(in_order_keys(&tree), vec![1, 2, 3, 5, 6, 7]);

    // The predecessor took the root's place.
    assert_eq!(root_key(&tree), Some(3));
}

#[test]
fn remove_absent_is_noop() {
    let mut tree = tree_of([2, 1, 3]);

    assert!(tree.remove(&7).is_none());
    assert_eq!(tree.len(), 3);
    tree.assert_invariants();

    let mut empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.remove(&0).is_none());
    assert!(empty.pop_first().is_none());
    assert!(empty.pop_last().is_none());
}

#[test]
fn duplicate_insert_replaces_in_place() {
    init_logging();

    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [4, 2, 6, 1, 3, 5, 7] {
        tree.insert(TestNode::with_value(key, key * 10));
    }

    let shape_before = {
        let mut s = String::new();
        tree.dotgraph("before", &mut s).unwrap();
        s
    };

    let old = tree
        .insert(TestNode::with_value(2, 99))
        .expect("key 2 was present");
    assert_eq!((old.key, old.value), (2, 20));

    let shape_after = {
        let mut s = String::new();
        tree.dotgraph("before", &mut s).unwrap();
        s
    };

    assert_eq!(shape_before, shape_after);
    assert_eq!(tree.len(), 7);
    assert_eq!(tree.get(&2).map(|node| node.value), Some(99));
    tree.assert_invariants();
}

#[test]
fn round_trip_shuffled() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);

    for n in [1, 2, 10, 100, 1000] {
        let mut keys: Vec<u32> = (0..n).collect();
        keys.shuffle(&mut rng);

        let mut tree = tree_of(keys.iter().copied());
        assert_eq!(tree.len(), n as usize);

        keys.shuffle(&mut rng);
        for key in &keys {
            assert!(tree.remove(key).is_some());
            tree.assert_invariants();
        }

        assert!(tree.is_empty());
        assert!(tree.root.is_none());
    }
}

#[test]
fn height_bound() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    let mut ascending = AvlTree::<TestNode>::new();
    let mut shuffled = AvlTree::<TestNode>::new();

    let mut keys: Vec<u32> = (0..4096).collect();
    keys.shuffle(&mut rng);

    for n in 1..=4096u32 {
        ascending.insert(TestNode::new(n - 1));
        shuffled.insert(TestNode::new(keys[n as usize - 1]));

        let bound = 1.4405 * f64::from(n + 2).log2() - 0.3277;
        assert!(ascending.height() as f64 <= bound, "n = {n}");
        assert!(shuffled.height() as f64 <= bound, "n = {n}");
    }

    ascending.assert_invariants();
    shuffled.assert_invariants();
}

#[test]
fn rotations_relink_without_rebalancing() {
    let mut tree = tree_of([2, 1, 4, 3, 5]);
    let two = tree.find(&2).unwrap();
    let four = tree.find(&4).unwrap();

    unsafe {
        tree.rotate_left(two);

        assert_eq!(tree.root, Some(four));
        assert_eq!(links_of(four).parent(), None);
        assert_eq!(links_of(four).left(), Some(two));
        assert_eq!(links_of(two).parent(), Some(four));
        assert_eq!(links_of(two).right().map(|n| n.as_ref().key), Some(3));
        assert_eq!(in_order_keys(&tree), vec![1, 2, 3, 4, 5]);

        // Balance factors are the caller's responsibility.
        assert_eq!(links_of(two).balance(), 1);

        tree.rotate_right(four);

        assert_eq!(tree.root, Some(two));
        assert_eq!(links_of(two).right(), Some(four));
        assert_eq!(links_of(four).left().map(|n| n.as_ref().key), Some(3));
    }

    tree.assert_invariants();
}

unsafe fn links_of<'a>(node: NonNull<TestNode>) -> &'a Links<TestNode> {
    unsafe { TestNode::links(node).as_ref() }
}

#[test]
fn swap_nodes_exchanges_positions_and_balance() {
    //       4
    //     /   \
    //    2     6
    //   / \     \
    //  1   3     7
    let mut tree = tree_of([4, 2, 6, 1, 3, 7]);

    unsafe {
        // Non-adjacent, including the root.
        let four = tree.find(&4).unwrap();
        let three = tree.find(&3).unwrap();
        let (four_balance, three_balance) = (links_of(four).balance(), links_of(three).balance());

        tree.swap_nodes(four, three);

        assert_eq!(tree.root, Some(three));
        assert_eq!(links_of(four).parent().map(|n| n.as_ref().key), Some(2));
        assert_eq!(links_of(four).left(), None);
        assert_eq!(links_of(three).balance(), four_balance);
        assert_eq!(links_of(four).balance(), three_balance);

        tree.swap_nodes(three, four);
        tree.assert_invariants();

        // Parent and child.
        let six = tree.find(&6).unwrap();
        let seven = tree.find(&7).unwrap();

        tree.swap_nodes(six, seven);

        assert_eq!(links_of(seven).right(), Some(six));
        assert_eq!(links_of(six).parent(), Some(seven));
        assert_eq!(links_of(seven).parent(), Some(four));

        tree.swap_nodes(seven, six);
        tree.assert_invariants();

        // Siblings.
        let one = tree.find(&1).unwrap();
        let two = tree.find(&2).unwrap();

        tree.swap_nodes(one, three);

        assert_eq!(links_of(two).left(), Some(three));
        assert_eq!(links_of(two).right(), Some(one));

        tree.swap_nodes(three, one);
    }

    tree.assert_invariants();
    assert_eq!(in_order_keys(&tree), vec![1, 2, 3, 4, 6, 7]);
}

#[test]
fn neighbors() {
    let tree = tree_of([4, 2, 6, 1, 3, 5, 7]);

    unsafe {
        for key in 1..=7 {
            let node = tree.find(&key).unwrap();

            let prev = tree.predecessor_raw(node).map(|n| n.as_ref().key);
            let next = tree.successor_raw(node).map(|n| n.as_ref().key);

            assert_eq!(prev, (key > 1).then(|| key - 1));
            assert_eq!(next, (key < 7).then(|| key + 1));
        }
    }

    assert_eq!(tree.first().map(|n| n.key), Some(1));
    assert_eq!(tree.last().map(|n| n.key), Some(7));
    assert_eq!(
        tree.iter().rev().map(|n| n.key).collect::<Vec<_>>(),
        vec![7, 6, 5, 4, 3, 2, 1]
    );
}

#[test]
fn entry_api() {
    let mut tree = tree_of([1, 3]);

    match tree.entry(&2) {
        Entry::Vacant(vacant) => {
            let node = unsafe { vacant.insert(TestNode::with_value(2, 20)) };
            assert_eq!(node.value, 20);
        }
        Entry::Occupied(_) => panic!("2 should be vacant"),
    }
    tree.assert_invariants();

    match tree.entry(&3) {
        Entry::Occupied(mut occupied) => {
            assert_eq!(occupied.get().key, 3);
            let old = unsafe { occupied.insert(TestNode::with_value(3, 30)) };
            assert_eq!(old.value, 0);
            assert_eq!(occupied.get().value, 30);
        }
        Entry::Vacant(_) => panic!("3 should be occupied"),
    }
    tree.assert_invariants();

    match tree.entry(&1) {
        Entry::Occupied(occupied) => assert_eq!(occupied.remove().key, 1),
        Entry::Vacant(_) => panic!("1 should be occupied"),
    }
    tree.assert_invariants();

    assert_eq!(in_order_keys(&tree), vec![2, 3]);
}

#[test]
fn pinned_mutation_of_payload_keeps_order() {
    let mut tree = tree_of(0..8);

    // Only the payload is written through each pinned reference.
    unsafe {
        let node = tree.get_mut(&3).expect("3 is present");
        node.get_unchecked_mut().value = 30;

        match tree.entry(&5) {
            Entry::Occupied(mut occupied) => occupied.get_mut().get_unchecked_mut().value = 50,
            Entry::Vacant(_) => panic!("5 should be occupied"),
        }

        let mut cursor = tree.cursor_last_mut();
        cursor.get_mut().expect("tree is not empty").get_unchecked_mut().value = 70;
    }

    tree.assert_invariants();
    assert_eq!(in_order_keys(&tree), (0..8).collect::<Vec<_>>());
    assert_eq!(
        tree.iter().map(|node| node.value).collect::<Vec<_>>(),
        vec![0, 0, 0, 30, 0, 50, 0, 70]
    );
}

#[test]
fn cursor_walks_and_removes() {
    let mut tree = tree_of(0..10);

    let cursor = tree.cursor_last();
    assert_eq!(cursor.get().map(|n| n.key), Some(9));
    assert_eq!(cursor.peek_prev().map(|n| n.key), Some(8));
    assert!(cursor.peek_next().is_none());

    let mut cursor = tree.cursor_first_mut();
    while let Some(node) = cursor.get() {
        if node.key % 2 == 0 {
            cursor.remove_current();
        } else {
            cursor.move_next();
        }
    }

    tree.assert_invariants();
    assert_eq!(in_order_keys(&tree), vec![1, 3, 5, 7, 9]);
}

#[test]
fn clear_and_drop() {
    let mut tree = tree_of(0..100);
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);

    tree.insert(TestNode::new(1));
    assert_eq!(tree.height(), 1);
    drop(tree);
}

#[test]
fn dotgraph_labels_balance() {
    let tree = tree_of([1, 2]);
    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();

    assert!(out.contains("\"t-1\" [label=\"1:1\"]"));
    assert!(out.contains("\"t-2\" [label=\"2:0\"]"));
    assert!(out.contains("\"t-1\" -> \"t-2\";"));
}

#[test]
fn btree_equivalence_with_repeated_keys() {
    use model::{ItemValue, Op};

    init_logging();

    // Indices pick keys already present, so most inserts collide and replace nodes in place.
    let mut ops: Vec<Op> = (0..64)
        .map(|i| Op::Insert(ItemValue::Random(i % 16)))
        .collect();
    ops.extend((0..64).map(|i| Op::Insert(ItemValue::Index(i * 7))));
    ops.extend((0..16).map(|i| Op::TryInsert(ItemValue::Index(i))));
    ops.extend([Op::First, Op::Last, Op::PopFirst, Op::PopLast]);
    ops.extend((0..32).map(|i| Op::Remove(ItemValue::Index(i * 3))));
    ops.extend((0..8).map(|i| Op::Insert(ItemValue::Random(i))));

    model::run_btree_equivalence(ops);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..500, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }

    #[test]
    fn insert_then_remove_all(keys in proptest::collection::btree_set(any::<u32>(), 0..200)) {
        let mut keys: Vec<u32> = keys.into_iter().collect();
        let mut tree = tree_of(keys.iter().copied());

        keys.reverse();
        for key in &keys {
            prop_assert!(tree.remove(key).is_some());
        }

        tree.assert_invariants();
        prop_assert!(tree.is_empty());
    }
}
