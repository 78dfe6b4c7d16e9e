use core::{
    fmt::{self, Write as _},
    ptr::NonNull,
};
use std::collections::VecDeque;

use crate::{AvlTree, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    /// Writes a Graphviz rendering of the tree to `w`.
    ///
    /// Nodes are laid out one rank per tree level and labelled `key:balance`; missing children are
    /// drawn as points so that left and right stay distinguishable.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        let Some(root) = self.root else {
            return write!(w, "digraph \"graph-{name}\" {{}}");
        };

        enum Item<T: ?Sized> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        writeln!(w, "digraph \"graph-{name}\" {{")?;
        writeln!(w, " subgraph \"subgraph-{name}\" {{")?;

        let mut missing = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            w.write_str("  {rank=same; ")?;

            for _ in 0..queue.len() {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let node = match item {
                    Item::Node(node) => node,
                    Item::Missing(id) => {
                        write!(w, "\"{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let (key, links) = unsafe { (node.as_ref().key(), T::links(node).as_ref()) };
                write!(w, "\"{name}-{key}\" [label=\"{key}:{}\"]; ", links.balance())?;

                for child in [links.left(), links.right()] {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };
                            writeln!(edges, "  \"{name}-{key}\" -> \"{name}-{child_key}\";")?;
                            queue.push_back(Item::Node(child));
                        }
                        None => {
                            writeln!(edges, "  \"{name}-{key}\" -> \"{name}-missing{missing}\";")?;
                            queue.push_back(Item::Missing(missing));
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;

        w.write_str(" }\n}\n")
    }
}
