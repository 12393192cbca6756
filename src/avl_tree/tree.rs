use crate::arena::{Arena, Handle};
use crate::avl_tree::node::{Node, Shape, Side};
use crate::entry::Entry;
use log::trace;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::mem;

/// The arena-backed tree behind `AvlMap` and `AvlSet`.
pub struct Tree<T, U> {
    pub arena: Arena<Node<T, U>>,
    pub root: Option<Handle>,
}

impl<T, U> Tree<T, U> {
    pub fn new() -> Self {
        Tree {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Tree {
            arena: Arena::with_capacity(capacity),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
    }

    pub fn entry(&self, handle: Handle) -> &Entry<T, U> {
        &self.arena[handle].entry
    }

    pub fn entry_mut(&mut self, handle: Handle) -> &mut Entry<T, U> {
        &mut self.arena[handle].entry
    }

    /// Height of the tree, found by following the taller child at every level.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut curr = self.root;
        while let Some(handle) = curr {
            let node = &self.arena[handle];
            height += 1;
            curr = if node.balance > 0 { node.right } else { node.left };
        }
        height
    }

    fn side_of(&self, parent: Handle, child: Handle) -> Side {
        if self.arena[parent].left == Some(child) {
            Side::Left
        } else {
            Side::Right
        }
    }

    fn extreme(&self, mut handle: Handle, side: Side) -> Handle {
        while let Some(child) = self.arena[handle].child(side) {
            handle = child;
        }
        handle
    }

    /// Returns the in-order neighbour of a node: its predecessor for `Side::Left` and its
    /// successor for `Side::Right`.
    fn neighbor(&self, handle: Handle, side: Side) -> Option<Handle> {
        if let Some(child) = self.arena[handle].child(side) {
            return Some(self.extreme(child, side.opposite()));
        }
        let mut curr = handle;
        while let Some(parent) = self.arena[curr].parent {
            if self.side_of(parent, curr) != side {
                return Some(parent);
            }
            curr = parent;
        }
        None
    }

    pub fn first(&self) -> Option<Handle> {
        self.root.map(|root| self.extreme(root, Side::Left))
    }

    pub fn last(&self) -> Option<Handle> {
        self.root.map(|root| self.extreme(root, Side::Right))
    }

    pub fn next(&self, handle: Handle) -> Option<Handle> {
        self.neighbor(handle, Side::Right)
    }

    pub fn prev(&self, handle: Handle) -> Option<Handle> {
        self.neighbor(handle, Side::Left)
    }

    /// Handles of every node in ascending key order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut ret = Vec::with_capacity(self.len());
        let mut curr = self.first();
        while let Some(handle) = curr {
            ret.push(handle);
            curr = self.next(handle);
        }
        ret
    }

    // precondition: the child of `node` on the `promoted` side exists
    fn rotate(&mut self, node: Handle, promoted: Side, shape: Shape) -> bool {
        let child = match self.arena[node].child(promoted) {
            Some(child) => child,
            None => unreachable!(),
        };
        let inner = self.arena[child].child(promoted.opposite());
        let parent = self.arena[node].parent;
        let slot = parent.map(|parent| self.side_of(parent, node));
        debug_assert!(shape == Shape::Line || slot == Some(promoted.opposite()));
        trace!("rotating {:?} around {:?} ({:?})", promoted.opposite(), node, shape);

        self.arena[node].set_child(promoted, inner);
        if let Some(inner) = inner {
            self.arena[inner].parent = Some(node);
        }
        self.arena[child].set_child(promoted.opposite(), Some(node));
        self.arena[node].parent = Some(child);
        self.arena[child].parent = parent;

        match (parent, slot) {
            (Some(parent), Some(slot)) => {
                self.arena[parent].set_child(slot, Some(child));
                false
            },
            _ => {
                self.root = Some(child);
                true
            },
        }
    }

    /// Promotes the right child of `node` into its place. Returns `true` if the promoted child
    /// became the root of the tree.
    pub fn rotate_left(&mut self, node: Handle, shape: Shape) -> bool {
        self.rotate(node, Side::Right, shape)
    }

    /// Promotes the left child of `node` into its place. Returns `true` if the promoted child
    /// became the root of the tree.
    pub fn rotate_right(&mut self, node: Handle, shape: Shape) -> bool {
        self.rotate(node, Side::Left, shape)
    }

    fn rotate_toward(&mut self, node: Handle, promoted: Side, shape: Shape) -> bool {
        match promoted {
            Side::Left => self.rotate_right(node, shape),
            Side::Right => self.rotate_left(node, shape),
        }
    }

    // Balance factors after a double rotation that lifted `pivot` above `outer` (the node that
    // was unbalanced towards `side`) and `middle` (its child on that side).
    fn settle_double_rotation(&mut self, outer: Handle, middle: Handle, pivot: Handle, side: Side) {
        let lean = self.arena[pivot].balance;
        let (outer_balance, middle_balance) = if lean == side.delta() {
            (-lean, 0)
        } else if lean == -side.delta() {
            (0, -lean)
        } else {
            (0, 0)
        };
        self.arena[outer].balance = outer_balance;
        self.arena[middle].balance = middle_balance;
        self.arena[pivot].balance = 0;
    }

    pub fn find<V>(&self, key: &V) -> Option<Handle>
    where
        T: Borrow<V>,
        V: Ord + ?Sized,
    {
        let mut curr = self.root;
        while let Some(handle) = curr {
            let node = &self.arena[handle];
            curr = match key.cmp(node.entry.key.borrow()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(handle),
            };
        }
        None
    }

    pub fn floor<V>(&self, key: &V) -> Option<Handle>
    where
        T: Borrow<V>,
        V: Ord + ?Sized,
    {
        let mut curr = self.root;
        let mut ret = None;
        while let Some(handle) = curr {
            let node = &self.arena[handle];
            curr = match key.cmp(node.entry.key.borrow()) {
                Ordering::Less => node.left,
                Ordering::Greater => {
                    ret = Some(handle);
                    node.right
                },
                Ordering::Equal => return Some(handle),
            };
        }
        ret
    }

    pub fn ceil<V>(&self, key: &V) -> Option<Handle>
    where
        T: Borrow<V>,
        V: Ord + ?Sized,
    {
        let mut curr = self.root;
        let mut ret = None;
        while let Some(handle) = curr {
            let node = &self.arena[handle];
            curr = match key.cmp(node.entry.key.borrow()) {
                Ordering::Less => {
                    ret = Some(handle);
                    node.left
                },
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(handle),
            };
        }
        ret
    }

    /// Inserts a key-value pair. If the key already exists, only its value is replaced and the
    /// old value is returned.
    pub fn insert(&mut self, key: T, value: U) -> Option<U>
    where
        T: Ord,
    {
        let mut parent = None;
        let mut side = Side::Left;
        let mut curr = self.root;
        while let Some(handle) = curr {
            let node = &mut self.arena[handle];
            side = match key.cmp(&node.entry.key) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => return Some(mem::replace(&mut node.entry.value, value)),
            };
            parent = Some(handle);
            curr = node.child(side);
        }

        let leaf = self.arena.allocate(Node::new(key, value, parent));
        let parent = match parent {
            Some(parent) => parent,
            None => {
                self.root = Some(leaf);
                return None;
            },
        };
        self.arena[parent].set_child(side, Some(leaf));

        // a parent that already had one child is now balanced and no taller
        if self.arena[parent].balance != 0 {
            self.arena[parent].balance = 0;
        } else {
            self.arena[parent].balance = side.delta();
            self.insert_fix(side, parent, leaf);
        }
        None
    }

    // `parent` just grew taller on `child_side`, where `child` hangs.
    fn insert_fix(&mut self, mut child_side: Side, mut parent: Handle, mut child: Handle) {
        while let Some(grandparent) = self.arena[parent].parent {
            let side = self.side_of(grandparent, parent);
            self.arena[grandparent].balance += side.delta();
            match self.arena[grandparent].balance {
                0 => return,
                -1 | 1 => {
                    child_side = side;
                    child = parent;
                    parent = grandparent;
                },
                _ => {
                    if side == child_side {
                        trace!("insert: single rotation at {:?}", grandparent);
                        self.rotate_toward(grandparent, side, Shape::Line);
                        self.arena[grandparent].balance = 0;
                        self.arena[parent].balance = 0;
                    } else {
                        trace!("insert: double rotation at {:?} through {:?}", grandparent, child);
                        self.rotate_toward(parent, child_side, Shape::Cross);
                        self.rotate_toward(grandparent, side, Shape::Line);
                        self.settle_double_rotation(grandparent, parent, child, side);
                    }
                    return;
                },
            }
        }
    }

    // Exchanges the tree positions of two nodes. Balance factors describe positions, so they
    // stay where they were.
    fn swap_nodes(&mut self, a: Handle, b: Handle) {
        let remap = |link: Option<Handle>| {
            link.map(|handle| {
                if handle == a {
                    b
                } else if handle == b {
                    a
                } else {
                    handle
                }
            })
        };
        let a_slot = self.arena[a].parent.map(|parent| self.side_of(parent, a));
        let b_slot = self.arena[b].parent.map(|parent| self.side_of(parent, b));
        let (a_parent, a_left, a_right, a_balance) = {
            let node = &self.arena[a];
            (node.parent, node.left, node.right, node.balance)
        };
        let (b_parent, b_left, b_right, b_balance) = {
            let node = &self.arena[b];
            (node.parent, node.left, node.right, node.balance)
        };

        {
            let node = &mut self.arena[a];
            node.parent = remap(b_parent);
            node.left = remap(b_left);
            node.right = remap(b_right);
            node.balance = b_balance;
        }
        {
            let node = &mut self.arena[b];
            node.parent = remap(a_parent);
            node.left = remap(a_left);
            node.right = remap(a_right);
            node.balance = a_balance;
        }

        for &(handle, slot) in &[(a, b_slot), (b, a_slot)] {
            let (parent, left, right) = {
                let node = &self.arena[handle];
                (node.parent, node.left, node.right)
            };
            match (parent, slot) {
                (Some(parent), Some(slot)) => {
                    if parent != a && parent != b {
                        self.arena[parent].set_child(slot, Some(handle));
                    }
                },
                _ => self.root = Some(handle),
            }
            for child in left.into_iter().chain(right) {
                if child != a && child != b {
                    self.arena[child].parent = Some(handle);
                }
            }
        }
    }

    /// Removes a key from the tree, returning its entry if it was present.
    pub fn remove<V>(&mut self, key: &V) -> Option<Entry<T, U>>
    where
        T: Borrow<V>,
        V: Ord + ?Sized,
    {
        let target = self.find(key)?;
        if self.arena[target].left.is_some() && self.arena[target].right.is_some() {
            let predecessor = match self.prev(target) {
                Some(predecessor) => predecessor,
                None => unreachable!(),
            };
            self.swap_nodes(target, predecessor);
        }

        let (parent, child) = {
            let node = &self.arena[target];
            (node.parent, node.left.or(node.right))
        };
        if let Some(child) = child {
            self.arena[child].parent = parent;
        }
        let diff = match parent {
            Some(parent) => {
                let side = self.side_of(parent, target);
                self.arena[parent].set_child(side, child);
                -side.delta()
            },
            None => {
                self.root = child;
                0
            },
        };

        let Node { entry, .. } = self.arena.free(&target);
        self.remove_fix(parent, diff);
        Some(entry)
    }

    // `diff` is the change to `parent`'s balance factor caused by one of its subtrees getting
    // shorter: +1 when the left subtree shrank, -1 when the right one did.
    fn remove_fix(&mut self, mut parent: Option<Handle>, mut diff: i8) {
        while let Some(curr) = parent {
            let next = self.arena[curr]
                .parent
                .map(|grandparent| (grandparent, -self.side_of(grandparent, curr).delta()));
            let new_balance = self.arena[curr].balance + diff;

            match new_balance {
                -2 | 2 => {
                    let side = if diff > 0 { Side::Right } else { Side::Left };
                    let heavy = match self.arena[curr].child(side) {
                        Some(heavy) => heavy,
                        None => unreachable!(),
                    };
                    let heavy_balance = self.arena[heavy].balance;
                    if heavy_balance == side.delta() {
                        trace!("remove: single rotation at {:?}", curr);
                        self.rotate_toward(curr, side, Shape::Line);
                        self.arena[curr].balance = 0;
                        self.arena[heavy].balance = 0;
                    } else if heavy_balance == 0 {
                        trace!("remove: single rotation at {:?}, height unchanged", curr);
                        self.rotate_toward(curr, side, Shape::Line);
                        self.arena[curr].balance = side.delta();
                        self.arena[heavy].balance = -side.delta();
                        return;
                    } else {
                        let grandchild = match self.arena[heavy].child(side.opposite()) {
                            Some(grandchild) => grandchild,
                            None => unreachable!(),
                        };
                        trace!("remove: double rotation at {:?} through {:?}", curr, grandchild);
                        self.rotate_toward(heavy, side.opposite(), Shape::Cross);
                        self.rotate_toward(curr, side, Shape::Line);
                        self.settle_double_rotation(curr, heavy, grandchild, side);
                    }
                },
                0 => self.arena[curr].balance = 0,
                _ => {
                    self.arena[curr].balance = new_balance;
                    return;
                },
            }

            match next {
                Some((grandparent, next_diff)) => {
                    parent = Some(grandparent);
                    diff = next_diff;
                },
                None => return,
            }
        }
    }
}

#[cfg(test)]
impl<T, U> Tree<T, U>
where
    T: Ord,
{
    /// Recomputes every subtree height from scratch and checks it against the stored balance
    /// factors, parent links, key order and size. Returns the height.
    pub fn validate(&self) -> usize {
        fn check<T, U>(
            tree: &Tree<T, U>,
            handle: Option<Handle>,
            parent: Option<Handle>,
            count: &mut usize,
        ) -> usize {
            let handle = match handle {
                Some(handle) => handle,
                None => return 0,
            };
            let node = &tree.arena[handle];
            assert_eq!(node.parent, parent, "broken parent link at {:?}", handle);
            *count += 1;
            let left_height = check(tree, node.left, Some(handle), count) as i64;
            let right_height = check(tree, node.right, Some(handle), count) as i64;
            assert_eq!(i64::from(node.balance), right_height - left_height, "stale balance at {:?}", handle);
            assert!(node.balance.abs() <= 1, "unbalanced node at {:?}", handle);
            left_height.max(right_height) as usize + 1
        }

        let mut count = 0;
        let height = check(self, self.root, None, &mut count);
        assert_eq!(count, self.len());

        let handles = self.handles();
        assert_eq!(handles.len(), count);
        for pair in handles.windows(2) {
            assert!(self.entry(pair[0]).key < self.entry(pair[1]).key);
        }

        assert_eq!(self.height(), height);
        height
    }

    pub fn keys(&self) -> Vec<&T> {
        self.handles().into_iter().map(|handle| &self.entry(handle).key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Tree;
    use crate::avl_tree::node::{Shape, Side};
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeMap;

    fn permutations(n: u32) -> Vec<Vec<u32>> {
        fn permute(prefix: &mut Vec<u32>, rest: &mut Vec<u32>, ret: &mut Vec<Vec<u32>>) {
            if rest.is_empty() {
                ret.push(prefix.clone());
                return;
            }
            for i in 0..rest.len() {
                let key = rest.remove(i);
                prefix.push(key);
                permute(prefix, rest, ret);
                prefix.pop();
                rest.insert(i, key);
            }
        }

        let mut ret = Vec::new();
        permute(&mut Vec::new(), &mut (0..n).collect(), &mut ret);
        ret
    }

    fn build(keys: &[u32]) -> Tree<u32, u32> {
        let mut tree = Tree::new();
        for &key in keys {
            tree.insert(key, key * 10);
            tree.validate();
        }
        tree
    }

    fn height_bound(len: usize) -> usize {
        (1.44 * ((len + 2) as f64).log2()).ceil() as usize
    }

    #[test]
    fn test_rotate_left_at_root() {
        let mut tree = Tree::new();
        tree.insert(1, ());
        tree.insert(2, ());
        let root = tree.root.unwrap();

        assert!(tree.rotate_left(root, Shape::Line));
        assert_eq!(tree.entry(tree.root.unwrap()).key, 2);
        assert_eq!(tree.arena[root].parent, tree.root);
        assert_eq!(tree.keys(), vec![&1, &2]);
    }

    #[test]
    fn test_rotate_below_root() {
        let mut tree = build(&[2, 1, 3, 4]);
        let three = tree.find(&3).unwrap();
        let two = tree.root.unwrap();

        assert!(!tree.rotate_left(three, Shape::Line));
        let four = tree.find(&4).unwrap();
        assert_eq!(tree.arena[two].child(Side::Right), Some(four));
        assert_eq!(tree.arena[four].parent, Some(two));
        assert_eq!(tree.arena[three].parent, Some(four));
        assert_eq!(tree.keys(), vec![&1, &2, &3, &4]);

        assert!(!tree.rotate_right(four, Shape::Line));
        assert_eq!(tree.arena[two].right, Some(three));
        assert_eq!(tree.keys(), vec![&1, &2, &3, &4]);
    }

    #[test]
    fn test_rotation_leaves_balances_alone() {
        let mut tree = build(&[1, 2]);
        let root = tree.root.unwrap();
        let before = tree.arena[root].balance;
        tree.rotate_left(root, Shape::Line);
        assert_eq!(tree.arena[root].balance, before);
    }

    #[test]
    fn test_ascending_insert_is_complete() {
        let tree = build(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(tree.validate(), 3);
        assert_eq!(tree.entry(tree.root.unwrap()).key, 4);
        for handle in tree.handles() {
            assert_eq!(tree.arena[handle].balance, 0);
        }
    }

    #[test]
    fn test_insert_double_rotations() {
        let tree = build(&[3, 1, 2]);
        assert_eq!(tree.entry(tree.root.unwrap()).key, 2);
        assert_eq!(tree.validate(), 2);

        let tree = build(&[1, 3, 2]);
        assert_eq!(tree.entry(tree.root.unwrap()).key, 2);
        assert_eq!(tree.validate(), 2);

        let tree = build(&[5, 2, 8, 1, 4, 3]);
        assert_eq!(tree.entry(tree.root.unwrap()).key, 4);
        assert_eq!(tree.validate(), 3);
    }

    #[test]
    fn test_insert_existing_key_keeps_shape() {
        let mut tree = build(&[2, 1, 3]);
        let root = tree.root;
        assert_eq!(tree.insert(1, 100), Some(10));
        assert_eq!(tree.root, root);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.entry(tree.find(&1).unwrap()).value, 100);
    }

    #[test]
    fn test_remove_two_child_node() {
        let mut tree = build(&[5, 3, 8, 1, 4, 7, 9]);
        let entry = tree.remove(&3).unwrap();
        assert_eq!((entry.key, entry.value), (3, 30));
        tree.validate();
        assert_eq!(tree.keys(), vec![&1, &4, &5, &7, &8, &9]);
    }

    #[test]
    fn test_remove_adjacent_predecessor() {
        let mut tree = build(&[2, 1, 3]);
        tree.remove(&2);
        tree.validate();
        assert_eq!(tree.entry(tree.root.unwrap()).key, 1);
        assert_eq!(tree.keys(), vec![&1, &3]);
    }

    #[test]
    fn test_remove_root_predecessor_deep() {
        let mut tree = build(&[8, 4, 12, 2, 6, 10, 14, 1, 3, 5, 7]);
        tree.remove(&8);
        tree.validate();
        assert_eq!(tree.entry(tree.root.unwrap()).key, 7);
    }

    #[test]
    fn test_remove_missing_key() {
        let mut tree = build(&[2, 1, 3]);
        let shape: Vec<_> = tree.handles().iter().map(|&h| (h, tree.arena[h].balance)).collect();
        assert!(tree.remove(&4).is_none());
        assert_eq!(tree.len(), 3);
        let after: Vec<_> = tree.handles().iter().map(|&h| (h, tree.arena[h].balance)).collect();
        assert_eq!(shape, after);
    }

    #[test]
    fn test_remove_rotation_without_height_change() {
        // removing 1 leaves 2 right-heavy with a balanced right child
        let mut tree = build(&[2, 1, 4, 3, 5]);
        tree.remove(&1);
        assert_eq!(tree.validate(), 3);
        assert_eq!(tree.entry(tree.root.unwrap()).key, 4);
    }

    #[test]
    fn test_remove_double_rotation() {
        let mut tree = build(&[5, 2, 8, 1, 7]);
        tree.remove(&1);
        tree.remove(&2);
        assert_eq!(tree.validate(), 2);
        assert_eq!(tree.entry(tree.root.unwrap()).key, 7);
    }

    #[test]
    fn test_remove_all_insertion_orders() {
        for order in permutations(7) {
            let tree = build(&order);
            for key in 0..7 {
                let mut tree = build(&order);
                assert!(tree.remove(&key).is_some());
                tree.validate();
                assert!(tree.find(&key).is_none());
                assert_eq!(tree.len(), 6);
            }
            assert_eq!(tree.len(), 7);
        }
    }

    #[test]
    fn test_all_removal_orders() {
        let orders = permutations(5);
        for insert_order in &orders {
            for remove_order in &orders {
                let mut tree = build(insert_order);
                for key in remove_order {
                    assert!(tree.remove(key).is_some());
                    tree.validate();
                }
                assert!(tree.root.is_none());
                assert!(tree.arena.is_empty());
            }
        }
    }

    #[test]
    fn test_height_bound() {
        let mut tree = Tree::new();
        for key in 0..1000u32 {
            tree.insert(key, ());
            assert!(tree.height() <= height_bound(tree.len()));
        }
        for key in (0..1000u32).filter(|key| key % 3 != 0) {
            tree.remove(&key);
            assert!(tree.height() <= height_bound(tree.len()));
        }
        tree.validate();
    }

    #[test]
    fn test_neighbors() {
        let tree = build(&[4, 2, 6, 1, 3, 5, 7]);
        let three = tree.find(&3).unwrap();
        assert_eq!(tree.entry(tree.next(three).unwrap()).key, 4);
        assert_eq!(tree.entry(tree.prev(three).unwrap()).key, 2);
        assert!(tree.prev(tree.first().unwrap()).is_none());
        assert!(tree.next(tree.last().unwrap()).is_none());
    }

    #[quickcheck]
    fn prop_matches_btreemap(ops: Vec<(bool, u8, u16)>) -> bool {
        let mut tree = Tree::new();
        let mut expected = BTreeMap::new();
        for (is_insert, key, value) in ops {
            if is_insert {
                if tree.insert(key, value) != expected.insert(key, value) {
                    return false;
                }
            } else {
                let removed = tree.remove(&key).map(|entry| entry.into_pair());
                if removed != expected.remove(&key).map(|value| (key, value)) {
                    return false;
                }
            }
            let height = tree.validate();
            if height > height_bound(tree.len()) {
                return false;
            }
        }
        tree.handles()
            .into_iter()
            .map(|handle| tree.entry(handle).as_pair())
            .eq(expected.iter())
    }

    #[quickcheck]
    fn prop_insert_then_remove_all_empties(keys: Vec<u16>, seed: u16) -> bool {
        let mut tree = Tree::new();
        for &key in &keys {
            tree.insert(key, ());
        }
        let mut order = keys.clone();
        order.sort_by_key(|key| key.wrapping_mul(seed | 1).rotate_left(5));
        for key in &order {
            tree.remove(key);
            tree.validate();
        }
        tree.root.is_none() && tree.arena.is_empty()
    }
}
