//! Self-balancing binary search tree where the heights of the two child subtrees of any node
//! differ by at most one.
//!
//! Every node stores its balance factor (height of the right subtree minus height of the left
//! subtree) and a handle to its parent, so rebalancing walks upward from the modified node
//! instead of recursing down from the root.

mod map;
mod node;
mod set;
mod tree;

pub use self::map::{AvlMap, AvlMapIntoIter, AvlMapIter, AvlMapIterMut, AvlMapKeys, AvlMapValues};
pub use self::set::{AvlSet, AvlSetIntoIter, AvlSetIter};

use std::error;
use std::fmt;
use std::result;

/// Errors returned by lookups that require the key to be present.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    KeyNotFound,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::KeyNotFound => write!(f, "key does not exist"),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
