//! An arena-backed AVL tree map and set that keep explicit balance factors and parent handles,
//! plus a depth check for plain binary trees.

mod entry;
pub mod arena;
pub mod avl_tree;
pub mod equal_paths;
