use crate::arena::Handle;
use crate::entry::Entry;

/// Which child slot of a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// The change in balance factor caused by the subtree on this side growing by one level.
    pub fn delta(self) -> i8 {
        match self {
            Side::Left => -1,
            Side::Right => 1,
        }
    }
}

/// The role a rotation plays in a rebalance.
///
/// `Line` is a single rotation or the outer half of a double rotation. `Cross` is the inner half
/// of a double rotation, where the rotated node hangs off its parent on the side opposite to the
/// child being promoted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Shape {
    Line,
    Cross,
}

/// A struct representing an internal node of an avl tree.
///
/// `balance` is the height of the right subtree minus the height of the left subtree.
pub struct Node<T, U> {
    pub entry: Entry<T, U>,
    pub balance: i8,
    pub parent: Option<Handle>,
    pub left: Option<Handle>,
    pub right: Option<Handle>,
}

impl<T, U> Node<T, U> {
    pub fn new(key: T, value: U, parent: Option<Handle>) -> Self {
        Node {
            entry: Entry::new(key, value),
            balance: 0,
            parent,
            left: None,
            right: None,
        }
    }

    pub fn child(&self, side: Side) -> Option<Handle> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set_child(&mut self, side: Side, child: Option<Handle>) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }
}
