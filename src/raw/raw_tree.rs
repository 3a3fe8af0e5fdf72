use alloc::vec::Vec;

use super::arena::Arena;
use super::node::{MIN_ENTRIES, Node, ORDER, Payload, SearchResult, Slots};
use super::node_id::NodeId;

/// The core tree backing `LacedTree`.
///
/// Every structural edge is a [`NodeId`] into the arena: owning links from
/// internal entries to children, plus non-owning back-references (`parent`)
/// and level sibling links (`prev`/`next`). Separator keys are per-child
/// subtree maxima; internal nodes additionally cache their subtree minimum.
/// Keeping separators, minima, parent fields, and the sibling lists on both
/// affected levels consistent is the whole job of every mutation here.
pub(crate) struct RawLacedTree<V> {
    nodes: Arena<Node<V>>,
    /// Never dangling; an empty tree is a single empty leaf.
    root: NodeId,
    len: usize,
}

impl<V> RawLacedTree<V> {
    pub(crate) fn new() -> Self {
        let mut nodes = Arena::new();
        let root = nodes.alloc(Node::new_leaf());
        Self { nodes, root, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn node(&self, id: NodeId) -> &Node<V> {
        self.nodes.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn value_at(&self, position: (NodeId, usize)) -> &V {
        self.node(position.0).value(position.1)
    }

    /// Descends to the leaf that could hold `key`, failing fast when the key
    /// falls below a cached minimum or beyond the last separator.
    fn find_leaf(&self, key: i64) -> Option<NodeId> {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return Some(current);
            }
            if key < node.min_key() {
                return None;
            }
            let index = node.search_child(key);
            if index == node.entry_count() {
                return None;
            }
            current = node.child(index);
        }
    }

    /// Descends to the leaf an insertion of `key` belongs in. Unlike lookup
    /// descent this never fails: keys below every minimum go to child 0, keys
    /// beyond every separator go to the last child.
    fn find_leaf_for_insert(&self, key: i64) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return current;
            }
            current = if key < node.min_key() {
                node.child(0)
            } else {
                let index = node.search_child(key);
                if index < node.entry_count() {
                    node.child(index)
                } else {
                    node.child(node.entry_count() - 1)
                }
            };
        }
    }

    /// Locates `key`, returning its leaf and in-leaf index.
    pub(crate) fn search(&self, key: i64) -> Option<(NodeId, usize)> {
        let leaf = self.find_leaf(key)?;
        match self.node(leaf).search(key) {
            SearchResult::Found(index) => Some((leaf, index)),
            SearchResult::NotFound(_) => None,
        }
    }

    pub(crate) fn get(&self, key: i64) -> Option<&V> {
        let (leaf, index) = self.search(key)?;
        Some(self.node(leaf).value(index))
    }

    /// Overwrites the value for `key` if present; hands the value back
    /// otherwise.
    pub(crate) fn update(&mut self, key: i64, value: V) -> Result<(NodeId, usize), V> {
        let Some((leaf, index)) = self.search(key) else {
            return Err(value);
        };
        *self.node_mut(leaf).value_mut(index) = value;
        Ok((leaf, index))
    }

    /// Inserts `key`, failing with the offered value if the key is present.
    pub(crate) fn insert(&mut self, key: i64, value: V) -> Result<(NodeId, usize), V> {
        let leaf = self.find_leaf_for_insert(key);
        let position = self.insert_value_in_leaf(leaf, key, value)?;
        self.len += 1;
        #[cfg(debug_assertions)]
        self.verify_integrity();
        Ok(position)
    }

    /// Overwrites `key`'s value if present, inserts it otherwise.
    pub(crate) fn upsert(&mut self, key: i64, value: V) -> (NodeId, usize) {
        let leaf = self.find_leaf_for_insert(key);
        match self.node(leaf).search(key) {
            SearchResult::Found(index) => {
                *self.node_mut(leaf).value_mut(index) = value;
                (leaf, index)
            }
            SearchResult::NotFound(_) => {
                let Ok(position) = self.insert_value_in_leaf(leaf, key, value) else {
                    unreachable!("`RawLacedTree::upsert()` - key appeared between search and insert!")
                };
                self.len += 1;
                #[cfg(debug_assertions)]
                self.verify_integrity();
                position
            }
        }
    }

    /// Removes `key` and returns its value.
    pub(crate) fn remove(&mut self, key: i64) -> Option<V> {
        let leaf = self.find_leaf(key)?;
        let index = self.node(leaf).index_of_key(key)?;
        let (_, value) = self.node_mut(leaf).remove_value(index);
        self.finish_removal(leaf, key, index);
        self.len -= 1;
        #[cfg(debug_assertions)]
        self.verify_integrity();
        Some(value)
    }

    /// Leftmost leaf, the head of the leaf-level sibling list.
    fn leftmost_leaf(&self) -> NodeId {
        let mut current = self.root;
        while self.node(current).is_internal() {
            current = self.node(current).child(0);
        }
        current
    }

    /// Rightmost leaf, the tail of the leaf-level sibling list.
    fn rightmost_leaf(&self) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return current;
            }
            current = node.child(node.entry_count() - 1);
        }
    }

    /// Appends every key in ascending order, or descending when `backwards`,
    /// by walking the leaf-level sibling list.
    pub(crate) fn collect_keys(&self, out: &mut Vec<i64>, backwards: bool) {
        let mut current = Some(if backwards {
            self.rightmost_leaf()
        } else {
            self.leftmost_leaf()
        });
        while let Some(id) = current {
            let node = self.node(id);
            if backwards {
                out.extend(node.keys().iter().rev().copied());
            } else {
                out.extend(node.keys().iter().copied());
            }
            current = if backwards { node.prev() } else { node.next() };
        }
    }

    /// Visits every entry in key order.
    pub(crate) fn for_each_entry<F: FnMut(i64, &V)>(&self, mut visit: F) {
        let mut current = Some(self.leftmost_leaf());
        while let Some(id) = current {
            let node = self.node(id);
            for index in 0..node.entry_count() {
                visit(node.key(index), node.value(index));
            }
            current = node.next();
        }
    }

    /// Inserts a `(key, value)` entry into a leaf, splitting first when full.
    fn insert_value_in_leaf(&mut self, leaf: NodeId, key: i64, value: V) -> Result<(NodeId, usize), V> {
        let mut index = match self.node(leaf).search(key) {
            SearchResult::Found(_) => return Err(value),
            SearchResult::NotFound(index) => index,
        };
        let mut leaf = leaf;

        if self.node(leaf).entry_count() == ORDER {
            let (half, adjusted) = self.split_for_insert(leaf, index);
            leaf = half;
            index = adjusted;
        }

        let (count, parent) = {
            let node = self.node(leaf);
            (node.entry_count(), node.parent())
        };
        if index == count && parent.is_some() {
            // The new key extends this leaf's maximum; the separators above
            // must follow it up.
            let old_key = self.node(leaf).largest_key();
            self.update_parent_separator(leaf, old_key, key);
        }
        if index == 0 {
            // New smallest key on this leaf's left edge.
            self.propagate_min_key(parent, key);
        }

        self.node_mut(leaf).insert_value(index, key, value);
        Ok((leaf, index))
    }

    /// Inserts a `(separator, child)` entry into an internal node, splitting
    /// first when full. Only ever called with a fresh separator.
    fn insert_child_in_node(&mut self, node: NodeId, key: i64, child: NodeId) {
        let mut index = self.node(node).search_child(key);
        debug_assert!(
            index == self.node(node).entry_count() || self.node(node).key(index) != key,
            "`RawLacedTree::insert_child_in_node()` - separator already present!"
        );
        let mut node = node;

        if self.node(node).entry_count() == ORDER {
            let (half, adjusted) = self.split_for_insert(node, index);
            node = half;
            index = adjusted;
            // The pending child belongs under whichever half receives it.
            self.node_mut(child).set_parent(Some(node));
        }

        let (count, parent) = {
            let target = self.node(node);
            (target.entry_count(), target.parent())
        };
        if index == count && parent.is_some() {
            let old_key = self.node(node).largest_key();
            self.update_parent_separator(node, old_key, key);
        }
        if index == 0 {
            let min = self.node(child).smallest_key();
            self.node_mut(node).set_min_key(min);
            self.propagate_min_key(parent, min);
        }

        self.node_mut(node).insert_child(index, key, child);
    }

    /// Splits a full node so an insertion at `insert_index` can land. Returns
    /// the half that should receive the pending entry and the index adjusted
    /// into it.
    fn split_for_insert(&mut self, node: NodeId, insert_index: usize) -> (NodeId, usize) {
        debug_assert_eq!(self.node(node).entry_count(), ORDER);

        // Entries [0, split_index] stay; [split_index + 1, ORDER) move right.
        // Biasing by the pending insertion keeps both halves at or above the
        // fill floor once it lands.
        let mut split_index = ORDER / 2;
        if insert_index <= split_index {
            split_index -= 1;
        }

        let right = self.node_mut(node).split_off(split_index + 1);
        let right_is_internal = right.is_internal();
        let right_id = self.nodes.alloc(right);

        // The moved children hang under the new sibling now.
        if right_is_internal {
            for index in 0..self.node(right_id).entry_count() {
                let child = self.node(right_id).child(index);
                self.node_mut(child).set_parent(Some(right_id));
            }
        }

        // Splice the new sibling into this level's list, right of `node`.
        let old_next = self.node(node).next();
        {
            let right = self.node_mut(right_id);
            right.set_prev(Some(node));
            right.set_next(old_next);
        }
        self.node_mut(node).set_next(Some(right_id));
        if let Some(after) = old_next {
            self.node_mut(after).set_prev(Some(right_id));
        }

        if right_is_internal {
            let first_child = self.node(right_id).child(0);
            let min = self.node(first_child).smallest_key();
            self.node_mut(right_id).set_min_key(min);
        }

        match self.node(node).parent() {
            None => {
                // The root split: promote a new root over both halves.
                let left_key = self.node(node).largest_key();
                let right_key = self.node(right_id).largest_key();
                let mut root = Node::new_internal(self.node(node).smallest_key());
                root.push_entry(left_key, Payload::Child(node));
                root.push_entry(right_key, Payload::Child(right_id));
                let root_id = self.nodes.alloc(root);
                self.node_mut(node).set_parent(Some(root_id));
                self.node_mut(right_id).set_parent(Some(root_id));
                self.root = root_id;
            }
            Some(parent) => {
                // The old separator for `node` was its pre-split maximum,
                // which now tops the right half. Shrink it to the left half's
                // maximum, then hand the parent the new sibling under the old
                // separator.
                let old_separator = self.node(right_id).largest_key();
                let new_separator = self.node(node).largest_key();
                self.update_parent_separator(node, old_separator, new_separator);
                self.insert_child_in_node(parent, old_separator, right_id);
            }
        }

        if insert_index > split_index {
            (right_id, insert_index - split_index - 1)
        } else {
            (node, insert_index)
        }
    }

    /// Rewrites the separator for `node` in its parent after `node`'s largest
    /// key changed from `old_key` to `new_key`, continuing upward while the
    /// rewritten separator was the rightmost (the ancestor's own maximum
    /// changed with it).
    fn update_parent_separator(&mut self, node: NodeId, old_key: i64, new_key: i64) {
        let mut child = node;
        let mut current = self.node(child).parent();
        while let Some(parent) = current {
            let index = self
                .node(parent)
                .index_of_key(old_key)
                .expect("`RawLacedTree::update_parent_separator()` - separator is missing!");
            debug_assert_eq!(self.node(parent).child(index), child);
            self.node_mut(parent).set_key(index, new_key);
            if index + 1 != self.node(parent).entry_count() {
                break;
            }
            child = parent;
            current = self.node(parent).parent();
        }
    }

    /// Lowers cached minima from `start` toward the root, stopping at the
    /// first ancestor whose minimum already sits at or below `key`.
    fn propagate_min_key(&mut self, start: Option<NodeId>, key: i64) {
        let mut current = start;
        while let Some(id) = current {
            let node = self.node_mut(id);
            if key >= node.min_key() {
                break;
            }
            node.set_min_key(key);
            current = node.parent();
        }
    }

    /// Removes the separator `key` and its child slot from an internal node
    /// during a merge; the freed child has already been absorbed elsewhere.
    fn remove_separator(&mut self, node: NodeId, key: i64) {
        let index = self
            .node(node)
            .index_of_key(key)
            .expect("`RawLacedTree::remove_separator()` - separator is missing!");
        let _ = self.node_mut(node).remove_child(index);
        self.finish_removal(node, key, index);
    }

    /// Shared post-removal protocol: minimum and separator propagation, then
    /// rebalancing and root collapse. `index` is the slot the entry occupied;
    /// the entry itself is already gone.
    fn finish_removal(&mut self, node: NodeId, removed_key: i64, index: usize) {
        let (count, parent) = {
            let n = self.node(node);
            (n.entry_count(), n.parent())
        };

        // An emptied node skips propagation; the rebalance below disposes of
        // it. Only the root can empty out, and it has nothing above it.
        if count > 0 {
            if let Some(parent) = parent {
                if index == 0 {
                    let smallest = self.node(node).smallest_key();
                    self.propagate_min_key(Some(parent), smallest);
                }
                if index == count {
                    // The rightmost entry went away; ancestors still using it
                    // as a separator switch to the new maximum.
                    let new_key = self.node(node).largest_key();
                    let mut current = Some(parent);
                    while let Some(ancestor) = current {
                        let Some(sep) = self.node(ancestor).index_of_key(removed_key) else {
                            break;
                        };
                        self.node_mut(ancestor).set_key(sep, new_key);
                        if sep + 1 != self.node(ancestor).entry_count() {
                            break;
                        }
                        current = self.node(ancestor).parent();
                    }
                }
            }
        }

        if node != self.root && count < MIN_ENTRIES {
            self.rebalance(node);
            // `node` may have merged away; only its id may be inspected now.
        }

        if node == self.root {
            let root = self.node(self.root);
            if root.is_internal() && root.entry_count() == 1 {
                // A single-child internal root collapses into its child.
                let child = root.child(0);
                self.node_mut(child).set_parent(None);
                self.nodes.free(self.root);
                self.root = child;
            }
        }
    }

    /// Refills an underfull node from a same-parent sibling, or merges with
    /// one. Siblings across a parent boundary are ignored even though the
    /// level list continues through them.
    fn rebalance(&mut self, node: NodeId) {
        debug_assert!(self.node(node).entry_count() < MIN_ENTRIES);
        let (parent, prev, next) = {
            let n = self.node(node);
            (n.parent(), n.prev(), n.next())
        };

        if let Some(prev) = prev.filter(|&p| self.node(p).parent() == parent) {
            let old_separator = self.node(prev).largest_key();
            if self.node(prev).entry_count() > MIN_ENTRIES {
                self.borrow_from_prev(node, prev, old_separator);
            } else {
                self.merge_into_prev(node, prev, old_separator);
            }
        } else if let Some(next) = next.filter(|&s| self.node(s).parent() == parent) {
            let old_separator = self.node(node).largest_key();
            if self.node(next).entry_count() > MIN_ENTRIES {
                self.borrow_from_next(node, next, old_separator);
            } else {
                self.merge_from_next(node, next, old_separator);
            }
        } else {
            panic!("`RawLacedTree::rebalance()` - underfull node has no same-parent sibling; tree is corrupt!");
        }
    }

    /// Steals the left sibling's last entry into slot 0 of `node`.
    fn borrow_from_prev(&mut self, node: NodeId, prev: NodeId, old_separator: i64) {
        let (key, payload) = self.node_mut(prev).pop_entry();
        if let Payload::Child(child) = &payload {
            self.node_mut(*child).set_parent(Some(node));
        }
        self.node_mut(node).push_front_entry(key, payload);

        let new_separator = self.node(prev).largest_key();
        self.update_parent_separator(prev, old_separator, new_separator);

        if self.node(node).is_internal() {
            let first_child = self.node(node).child(0);
            let min = self.node(first_child).smallest_key();
            self.propagate_min_key(Some(node), min);
        }
    }

    /// Appends the right sibling's first entry to `node`.
    fn borrow_from_next(&mut self, node: NodeId, next: NodeId, old_separator: i64) {
        let (key, payload) = self.node_mut(next).pop_front_entry();
        if let Payload::Child(child) = &payload {
            self.node_mut(*child).set_parent(Some(node));
        }
        self.node_mut(node).push_entry(key, payload);

        // The right sibling's cached minimum stays a valid lower bound.
        let new_separator = self.node(node).largest_key();
        self.update_parent_separator(node, old_separator, new_separator);
    }

    /// Merges `node` into its left sibling and removes the sibling's old
    /// separator from the parent; the cascade may rebalance the parent in
    /// turn. `old_separator` is the left sibling's pre-merge maximum.
    fn merge_into_prev(&mut self, node: NodeId, prev: NodeId, old_separator: i64) {
        let parent = self
            .node(node)
            .parent()
            .expect("`RawLacedTree::merge_into_prev()` - merged node has no parent!");

        // Retarget the separator pointing at `node` before its entries move.
        let node_key = self.node(node).largest_key();
        let index = self
            .node(parent)
            .index_of_key(node_key)
            .expect("`RawLacedTree::merge_into_prev()` - separator is missing!");
        debug_assert_eq!(self.node(parent).child(index), node);
        self.node_mut(parent).set_child(index, prev);

        let (keys, slots) = self.node_mut(node).take_entries();
        if let Slots::Internal { children, .. } = &slots {
            for &child in children {
                self.node_mut(child).set_parent(Some(prev));
            }
        }
        self.node_mut(prev).extend_entries(keys, slots);

        self.remove_separator(parent, old_separator);

        self.unlink_sibling(node);
        self.nodes.free(node);
    }

    /// Absorbs the right sibling into `node` and removes `node`'s old
    /// separator from the parent. `old_separator` is `node`'s pre-merge
    /// maximum.
    fn merge_from_next(&mut self, node: NodeId, next: NodeId, old_separator: i64) {
        let parent = self
            .node(node)
            .parent()
            .expect("`RawLacedTree::merge_from_next()` - merged node has no parent!");

        let next_key = self.node(next).largest_key();
        let index = self
            .node(parent)
            .index_of_key(next_key)
            .expect("`RawLacedTree::merge_from_next()` - separator is missing!");
        debug_assert_eq!(self.node(parent).child(index), next);
        self.node_mut(parent).set_child(index, node);

        let (keys, slots) = self.node_mut(next).take_entries();
        if let Slots::Internal { children, .. } = &slots {
            for &child in children {
                self.node_mut(child).set_parent(Some(node));
            }
        }
        self.node_mut(node).extend_entries(keys, slots);

        self.remove_separator(parent, old_separator);

        self.unlink_sibling(next);
        self.nodes.free(next);
    }

    /// Splices a node out of its level's doubly-linked list.
    fn unlink_sibling(&mut self, node: NodeId) {
        let (prev, next) = {
            let n = self.node(node);
            (n.prev(), n.next())
        };
        if let Some(prev) = prev {
            self.node_mut(prev).set_next(next);
        }
        if let Some(next) = next {
            self.node_mut(next).set_prev(prev);
        }
    }

    /// Walks the whole tree and asserts every structural invariant. A
    /// violation is a bug in the tree itself, never a recoverable condition.
    ///
    /// Runs automatically after each structure-changing mutation when debug
    /// assertions are enabled; tests also call it directly.
    pub(crate) fn verify_integrity(&self) {
        let root = self.node(self.root);
        assert!(root.parent().is_none(), "`verify_integrity` - root has a parent!");
        assert!(
            root.prev().is_none() && root.next().is_none(),
            "`verify_integrity` - root has siblings!"
        );

        if root.is_leaf() && root.entry_count() == 0 {
            assert_eq!(self.len, 0, "`verify_integrity` - empty root but nonzero size!");
            assert_eq!(self.nodes.len(), 1, "`verify_integrity` - empty tree holds extra nodes!");
            return;
        }

        let mut leaf_depth = None;
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        let (_, _, total) = self.verify_node(self.root, None, 0, &mut leaf_depth, &mut levels);

        assert_eq!(self.len, total, "`verify_integrity` - size counter diverges from leaf entries!");
        let reachable: usize = levels.iter().map(Vec::len).sum();
        assert_eq!(self.nodes.len(), reachable, "`verify_integrity` - arena holds unreachable nodes!");

        // Each level's sibling list must thread exactly its nodes, in order.
        for level in &levels {
            for (position, &id) in level.iter().enumerate() {
                let node = self.node(id);
                let expected_prev = if position > 0 { Some(level[position - 1]) } else { None };
                assert_eq!(node.prev(), expected_prev, "`verify_integrity` - sibling list prev link is wrong!");
                assert_eq!(
                    node.next(),
                    level.get(position + 1).copied(),
                    "`verify_integrity` - sibling list next link is wrong!"
                );
            }
        }
    }

    /// Recursive arm of the checker. Returns the subtree's smallest key,
    /// largest key, and total entry count over its leaves.
    fn verify_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        levels: &mut Vec<Vec<NodeId>>,
    ) -> (i64, i64, usize) {
        if levels.len() == depth {
            levels.push(Vec::new());
        }
        levels[depth].push(id);

        let node = self.node(id);
        assert_eq!(node.parent(), parent, "`verify_integrity` - parent back-reference is wrong!");

        let count = node.entry_count();
        if parent.is_some() {
            assert!(count >= MIN_ENTRIES, "`verify_integrity` - non-root node is underfull!");
        }
        assert!(count <= ORDER, "`verify_integrity` - node is overfull!");
        for index in 1..count {
            assert!(
                node.key(index - 1) < node.key(index),
                "`verify_integrity` - keys are not strictly ascending!"
            );
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) => {
                    assert_eq!(depth, expected, "`verify_integrity` - leaves sit at different depths!");
                }
            }
            return (node.key(0), node.key(count - 1), count);
        }

        if parent.is_none() {
            assert!(count >= 2, "`verify_integrity` - internal root has fewer than two children!");
        }

        let mut total = 0;
        let mut subtree_min = i64::MAX;
        let mut prev_max = None;
        for index in 0..count {
            let child = node.child(index);
            let (child_min, child_max, child_total) = self.verify_node(child, Some(id), depth + 1, leaf_depth, levels);
            assert_eq!(
                child_max,
                node.key(index),
                "`verify_integrity` - separator is not the child's subtree maximum!"
            );
            if let Some(prev_max) = prev_max {
                assert!(
                    child_min > prev_max,
                    "`verify_integrity` - child subtree overlaps the previous separator!"
                );
            }
            prev_max = Some(child_max);
            if index == 0 {
                subtree_min = child_min;
            }
            total += child_total;
        }

        // The cached minimum is a lower bound, exact under insert-only
        // workloads, and always strictly below the first separator.
        assert!(
            node.min_key() <= subtree_min,
            "`verify_integrity` - cached minimum exceeds the subtree minimum!"
        );
        assert!(
            node.min_key() < node.key(0),
            "`verify_integrity` - cached minimum reaches the first separator!"
        );

        (subtree_min, node.key(count - 1), total)
    }
}
