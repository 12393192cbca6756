//! Depth check for plain, unbalanced binary trees.

/// A node of a plain binary tree with owned children.
///
/// # Examples
///
/// ```
/// use avl_collections::equal_paths::{equal_paths, BinaryNode};
///
/// let root = BinaryNode::new(1, Some(BinaryNode::leaf(2)), Some(BinaryNode::leaf(3)));
/// assert!(equal_paths(Some(&root)));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BinaryNode<T> {
    pub value: T,
    pub left: Option<Box<BinaryNode<T>>>,
    pub right: Option<Box<BinaryNode<T>>>,
}

impl<T> BinaryNode<T> {
    pub fn new(value: T, left: Option<BinaryNode<T>>, right: Option<BinaryNode<T>>) -> Self {
        BinaryNode {
            value,
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }

    pub fn leaf(value: T) -> Self {
        Self::new(value, None, None)
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Returns `true` if every path from the root ends at the same depth. A path ends at a leaf, and
/// also at any node missing one of its children, so a node with a single child always makes the
/// paths unequal. An empty tree trivially satisfies this.
///
/// # Examples
///
/// ```
/// use avl_collections::equal_paths::{equal_paths, BinaryNode};
///
/// assert!(equal_paths::<u32>(None));
///
/// let root = BinaryNode::new(1, Some(BinaryNode::leaf(2)), None);
/// assert!(!equal_paths(Some(&root)));
/// ```
pub fn equal_paths<T>(root: Option<&BinaryNode<T>>) -> bool {
    let mut leaf_depth = None;
    root.map_or(true, |node| check(node, 0, &mut leaf_depth))
}

fn check<T>(node: &BinaryNode<T>, depth: usize, leaf_depth: &mut Option<usize>) -> bool {
    match (&node.left, &node.right) {
        (Some(left), Some(right)) => {
            check(left, depth + 1, leaf_depth) && check(right, depth + 1, leaf_depth)
        },
        (None, None) => *leaf_depth.get_or_insert(depth) == depth,
        _ => false,
    }
}
