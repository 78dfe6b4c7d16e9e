//! Equal-depth checks for plain, unbalanced binary trees.
//!
//! A node with both children present requires its two subtrees to have the same depth; a node
//! with a single child imposes no constraint at its own level. Either way the check recurses
//! into every child.

/// A node of an owned, unbalanced binary tree with no payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryNode {
    pub left: Option<Box<BinaryNode>>,
    pub right: Option<Box<BinaryNode>>,
}

impl BinaryNode {
    /// Returns a node with no children.
    pub fn leaf() -> Box<BinaryNode> {
        Box::default()
    }

    /// Returns a node with the given children.
    pub fn with_children(
        left: Option<Box<BinaryNode>>,
        right: Option<Box<BinaryNode>>,
    ) -> Box<BinaryNode> {
        Box::new(BinaryNode { left, right })
    }

    /// Returns the number of nodes on the longest path from this node down to a leaf.
    pub fn depth(&self) -> usize {
        1 + depth(self.left.as_deref()).max(depth(self.right.as_deref()))
    }
}

fn depth(node: Option<&BinaryNode>) -> usize {
    node.map_or(0, BinaryNode::depth)
}

/// Returns `true` if every node with two children has subtrees of equal depth.
///
/// An empty tree and a lone leaf trivially satisfy the check.
pub fn equal_paths(root: Option<&BinaryNode>) -> bool {
    let Some(node) = root else {
        return true;
    };

    let (left, right) = (node.left.as_deref(), node.right.as_deref());

    if left.is_some() && right.is_some() && depth(left) != depth(right) {
        return false;
    }

    equal_paths(left) && equal_paths(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(left: Option<Box<BinaryNode>>, right: Option<Box<BinaryNode>>) -> Option<Box<BinaryNode>> {
        Some(BinaryNode::with_children(left, right))
    }

    fn leaf() -> Option<Box<BinaryNode>> {
        Some(BinaryNode::leaf())
    }

    #[test]
    fn empty_and_single() {
        assert!(equal_paths(None));
        assert!(equal_paths(Some(&BinaryNode::default())));
    }

    #[test]
    fn full_tree_is_equal() {
        let root = node(node(leaf(), leaf()), node(leaf(), leaf())).unwrap();
        assert_eq!(root.depth(), 3);
        assert!(equal_paths(Some(&root)));
    }

    #[test]
    fn siblings_of_different_depth() {
        // Left leaf at depth 2 under a unary node, right leaf at depth 1.
        let root = node(node(leaf(), None), leaf()).unwrap();
        assert!(!equal_paths(Some(&root)));
    }

    #[test]
    fn unary_chain_is_not_compared() {
        let root = node(node(None, node(leaf(), None)), None).unwrap();
        assert!(equal_paths(Some(&root)));
    }

    #[test]
    fn mismatch_deeper_in_the_tree() {
        // The root's subtrees have equal depth, but the left child's do not.
        let left = node(node(leaf(), None), leaf());
        let right = node(node(leaf(), None), node(leaf(), None));
        let root = node(left, right).unwrap();

        assert_eq!(root.left.as_ref().unwrap().depth(), root.right.as_ref().unwrap().depth());
        assert!(!equal_paths(Some(&root)));
    }
}
