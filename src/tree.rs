use crate::distance::{DistanceCache, DistanceFn};
use crate::node::{AddResult, ChildItem, Children, Entry, Node, RemoveResult, TreeItem};
use crate::query::Query;
use crate::split::SplitFunction;
use thiserror::Error;

/// The minimum node capacity used by [`MTree::new`].
pub const DEFAULT_MIN_NODE_CAPACITY: usize = 50;

/// Rejected tree configuration; raised at construction time only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("min_node_capacity must be at least 2 (got {0})")]
    MinNodeCapacity(usize),
    #[error("max_node_capacity must be at least 2 * min_node_capacity - 1 (got {max} with min {min})")]
    MaxNodeCapacity { min: usize, max: usize },
}

/// A dynamic metric-space index (M-Tree): indexes arbitrary data
/// objects under a caller-supplied metric, with incremental insertion
/// and removal and lazy nearest-neighbor queries.
///
/// Two objects that are equal under the metric must not both be
/// indexed; this is not validated.
pub struct MTree<T> {
    min_node_capacity: usize,
    max_node_capacity: usize,
    pub(crate) distance: DistanceFn<T>,
    split: SplitFunction<T>,
    pub(crate) root: Option<Node<T>>,
    len: usize,
}

impl<T: Clone + PartialEq> MTree<T> {
    /// Creates a tree with the default node capacities
    /// (`DEFAULT_MIN_NODE_CAPACITY` and `2 * min - 1`).
    #[must_use]
    pub fn new<F>(distance: F) -> Self
    where
        F: Fn(&T, &T) -> f64 + 'static,
    {
        MTree {
            min_node_capacity: DEFAULT_MIN_NODE_CAPACITY,
            max_node_capacity: 2 * DEFAULT_MIN_NODE_CAPACITY - 1,
            distance: Box::new(distance),
            split: SplitFunction::default(),
            root: None,
            len: 0,
        }
    }

    /// Creates a tree with the given minimum node capacity; the maximum
    /// defaults to `2 * min_node_capacity - 1`.
    pub fn with_capacity<F>(min_node_capacity: usize, distance: F) -> Result<Self, ConfigError>
    where
        F: Fn(&T, &T) -> f64 + 'static,
    {
        if min_node_capacity < 2 {
            return Err(ConfigError::MinNodeCapacity(min_node_capacity));
        }
        Self::with_config(
            min_node_capacity,
            2 * min_node_capacity - 1,
            distance,
            SplitFunction::default(),
        )
    }

    /// Creates a tree with explicit capacities and split strategy.
    ///
    /// `max_node_capacity` must be at least `2 * min_node_capacity - 1`:
    /// an overflowed node splits its `max + 1` children into two halves,
    /// and both halves must reach the minimum.
    pub fn with_config<F>(
        min_node_capacity: usize,
        max_node_capacity: usize,
        distance: F,
        split: SplitFunction<T>,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&T, &T) -> f64 + 'static,
    {
        if min_node_capacity < 2 {
            return Err(ConfigError::MinNodeCapacity(min_node_capacity));
        }
        if max_node_capacity < 2 * min_node_capacity - 1 {
            return Err(ConfigError::MaxNodeCapacity {
                min: min_node_capacity,
                max: max_node_capacity,
            });
        }
        Ok(MTree {
            min_node_capacity,
            max_node_capacity,
            distance: Box::new(distance),
            split,
            root: None,
            len: 0,
        })
    }

    /// The number of indexed data objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds and indexes a data object.
    pub fn insert(&mut self, data: T) {
        match self.root.take() {
            None => {
                let mut root = Node::new_leaf(data.clone());
                self.do_add_data(&mut root, data, 0.0);
                self.root = Some(root);
            }
            Some(mut root) => {
                let distance = (self.distance)(&data, &root.data);
                match self.add_data(&mut root, data, distance) {
                    AddResult::Ok => self.root = Some(root),
                    AddResult::Split(first, second) => {
                        // The tree grows one level: the old root's data
                        // becomes the pivot of a fresh internal root
                        // holding the two replacement nodes.
                        let mut new_root = Node::new_internal(root.data);
                        let distance = (self.distance)(&new_root.data, &first.data);
                        self.add_node_child(&mut new_root, first, distance);
                        let distance = (self.distance)(&new_root.data, &second.data);
                        self.add_node_child(&mut new_root, second, distance);
                        self.root = Some(new_root);
                    }
                }
            }
        }
        self.len += 1;
    }

    /// Removes a data object; returns whether it was found.
    pub fn remove(&mut self, data: &T) -> bool {
        let Some(mut root) = self.root.take() else {
            return false;
        };
        let distance = (self.distance)(data, &root.data);
        match self.remove_data(&mut root, data, distance) {
            RemoveResult::NotFound => {
                self.root = Some(root);
                false
            }
            RemoveResult::Removed => {
                self.len -= 1;
                self.root = match root.children {
                    // A lone leaf root that lost its last entry empties
                    // the tree.
                    Children::Entries(ref entries) if entries.is_empty() => None,
                    // An internal root left with a single child drops a
                    // level: the child keeps its own data as pivot, so
                    // every grandchild distance stays valid.
                    Children::Nodes(ref mut nodes) if nodes.len() < 2 => {
                        nodes.pop().map(|mut child| {
                            child.distance_to_parent = f64::NAN;
                            child
                        })
                    }
                    _ => Some(root),
                };
                true
            }
        }
    }

    /// Nearest-neighbor query constrained by both distance and count,
    /// yielding results in non-decreasing distance order. Each call
    /// builds an independent traversal.
    #[must_use]
    pub fn query(&self, query: T, range: f64, limit: usize) -> Query<'_, T> {
        Query::new(self, query, range, limit)
    }

    /// Nearest-neighbor query constrained by distance.
    #[must_use]
    pub fn query_by_range(&self, query: T, range: f64) -> Query<'_, T> {
        self.query(query, range, usize::MAX)
    }

    /// Nearest-neighbor query constrained by the number of neighbors.
    #[must_use]
    pub fn query_by_limit(&self, query: T, limit: usize) -> Query<'_, T> {
        self.query(query, f64::INFINITY, limit)
    }

    fn add_data(&self, node: &mut Node<T>, data: T, distance: f64) -> AddResult<T> {
        self.do_add_data(node, data, distance);
        self.check_max_capacity(node)
    }

    fn do_add_data(&self, node: &mut Node<T>, data: T, distance: f64) {
        let replacements = match &mut node.children {
            Children::Entries(entries) => {
                entries.push(Entry::new(data, distance));
                node.radius = node.radius.max(distance);
                None
            }
            Children::Nodes(children) => {
                let (chosen, chosen_distance) = Self::choose_subtree(&self.distance, children, &data);
                match self.add_data(&mut children[chosen], data, chosen_distance) {
                    AddResult::Ok => {
                        let cover = children[chosen].distance_to_parent + children[chosen].radius;
                        node.radius = node.radius.max(cover);
                        None
                    }
                    AddResult::Split(first, second) => {
                        // Drop the drained node; its replacements are
                        // re-attached below with fresh distances.
                        children.swap_remove(chosen);
                        Some((first, second))
                    }
                }
            }
        };
        if let Some((first, second)) = replacements {
            let distance = (self.distance)(&node.data, &first.data);
            self.add_node_child(node, first, distance);
            let distance = (self.distance)(&node.data, &second.data);
            self.add_node_child(node, second, distance);
        }
    }

    /// Picks the child to descend into: the nearest child whose ball
    /// already covers the new object, or failing that the child whose
    /// radius grows the least.
    fn choose_subtree(distance: &DistanceFn<T>, children: &[Node<T>], data: &T) -> (usize, f64) {
        let mut covering = (0, f64::INFINITY);
        let mut has_covering = false;
        let mut expanding = (0, f64::INFINITY);
        let mut min_increase = f64::INFINITY;
        for (i, child) in children.iter().enumerate() {
            let d = distance(&child.data, data);
            if d <= child.radius {
                has_covering = true;
                if d < covering.1 {
                    covering = (i, d);
                }
            } else {
                let increase = d - child.radius;
                if increase < min_increase {
                    min_increase = increase;
                    expanding = (i, d);
                }
            }
        }
        if has_covering {
            covering
        } else {
            expanding
        }
    }

    /// Splits `node`'s children into two replacement nodes if it
    /// overflowed, leaving `node` as a drained husk for the caller to
    /// discard.
    fn check_max_capacity(&self, node: &mut Node<T>) -> AddResult<T> {
        if node.len() <= self.max_node_capacity {
            return AddResult::Ok;
        }
        let (first, second) = match std::mem::take(&mut node.children) {
            Children::Entries(entries) => self.split_items(entries, Children::Entries),
            Children::Nodes(nodes) => self.split_items(nodes, Children::Nodes),
        };
        AddResult::Split(first, second)
    }

    fn split_node(&self, node: Node<T>) -> (Node<T>, Node<T>) {
        match node.children {
            Children::Entries(entries) => self.split_items(entries, Children::Entries),
            Children::Nodes(nodes) => self.split_items(nodes, Children::Nodes),
        }
    }

    /// Promotes two pivots, partitions the items between them, and
    /// builds the two replacement nodes with exact child distances and
    /// tight radii.
    fn split_items<I, W>(&self, items: Vec<I>, wrap: W) -> (Node<T>, Node<T>)
    where
        I: TreeItem<T>,
        W: Fn(Vec<I>) -> Children<T>,
    {
        let candidates: Vec<T> = items.iter().map(|item| item.data().clone()).collect();
        let mut cache = DistanceCache::new(&self.distance, &candidates);
        let ((first, partition1), (second, partition2)) = self.split.split(&candidates, &mut cache);

        let mut slots: Vec<Option<I>> = items.into_iter().map(Some).collect();
        let first = Self::collect_partition(first, &partition1, &candidates, &mut slots, &mut cache, &wrap);
        let second = Self::collect_partition(second, &partition2, &candidates, &mut slots, &mut cache, &wrap);
        debug_assert!(
            slots.iter().all(Option::is_none),
            "partition function must assign every candidate"
        );
        (first, second)
    }

    fn collect_partition<I, W>(
        pivot: usize,
        partition: &[usize],
        candidates: &[T],
        slots: &mut [Option<I>],
        cache: &mut DistanceCache<'_, T>,
        wrap: &W,
    ) -> Node<T>
    where
        I: TreeItem<T>,
        W: Fn(Vec<I>) -> Children<T>,
    {
        let data = candidates[pivot].clone();
        let mut radius = 0.0_f64;
        let mut items = Vec::with_capacity(partition.len());
        for &index in partition {
            if let Some(mut item) = slots[index].take() {
                let distance = cache.distance(pivot, index);
                item.set_distance_to_parent(distance);
                radius = radius.max(distance + item.radius());
                items.push(item);
            }
        }
        Node::with_children(data, radius, wrap(items))
    }

    /// Attaches a node child, merging on key collision (a lower-level
    /// split can promote a pivot equal to an existing sibling key).
    /// The merged-into child may overflow, in which case it is split
    /// and its replacements re-queued.
    fn add_node_child(&self, node: &mut Node<T>, child: Node<T>, distance: f64) {
        let mut pending = vec![(child, distance)];
        while let Some((mut child, distance)) = pending.pop() {
            let collision = node.nodes_mut().iter().position(|c| c.data == child.data);
            let Some(pos) = collision else {
                child.distance_to_parent = distance;
                node.cover(distance, child.radius);
                node.nodes_mut().push(child);
                continue;
            };

            match std::mem::take(&mut child.children) {
                Children::Entries(entries) => {
                    let target = &mut node.nodes_mut()[pos];
                    for entry in entries {
                        Self::add_entry_child(target, entry);
                    }
                }
                Children::Nodes(grandchildren) => {
                    let target = &mut node.nodes_mut()[pos];
                    for grandchild in grandchildren {
                        let d = grandchild.distance_to_parent;
                        self.add_node_child(target, grandchild, d);
                    }
                }
            }

            let (dtp, radius, overflowed) = {
                let target = &node.nodes_mut()[pos];
                (
                    target.distance_to_parent,
                    target.radius,
                    target.len() > self.max_node_capacity,
                )
            };
            if overflowed {
                let source = node.nodes_mut().swap_remove(pos);
                let (first, second) = self.split_node(source);
                let d = (self.distance)(&node.data, &first.data);
                pending.push((first, d));
                let d = (self.distance)(&node.data, &second.data);
                pending.push((second, d));
            } else {
                node.cover(dtp, radius);
            }
        }
    }

    fn add_entry_child(node: &mut Node<T>, entry: Entry<T>) {
        node.cover(entry.distance_to_parent, 0.0);
        node.entries_mut().push(entry);
    }

    fn remove_data(&self, node: &mut Node<T>, data: &T, distance: f64) -> RemoveResult {
        let children = match &mut node.children {
            Children::Entries(entries) => {
                return match entries.iter().position(|entry| entry.data == *data) {
                    Some(pos) => {
                        entries.swap_remove(pos);
                        RemoveResult::Removed
                    }
                    None => RemoveResult::NotFound,
                };
            }
            Children::Nodes(children) => children,
        };

        let mut removed_at = None;
        for (i, child) in children.iter_mut().enumerate() {
            // Triangle-inequality prune first, exact containment second.
            if (distance - child.distance_to_parent).abs() > child.radius {
                continue;
            }
            let distance_to_child = (self.distance)(data, &child.data);
            if distance_to_child > child.radius {
                continue;
            }
            if let RemoveResult::Removed = self.remove_data(child, data, distance_to_child) {
                removed_at = Some(i);
                break;
            }
            // Not in this child; a sibling ball may still contain it.
        }

        let Some(removed_at) = removed_at else {
            return RemoveResult::NotFound;
        };
        if children[removed_at].len() < self.min_node_capacity {
            self.balance_children(node, removed_at);
        } else {
            let (dtp, radius) = (
                children[removed_at].distance_to_parent,
                children[removed_at].radius,
            );
            node.cover(dtp, radius);
        }
        RemoveResult::Removed
    }

    /// Restores the minimum capacity of an underflowed child: borrow a
    /// grandchild from the nearest sibling with spare capacity, or
    /// merge the child into its nearest sibling.
    fn balance_children(&self, node: &mut Node<T>, underflowed: usize) {
        let mut nearest_donor: Option<(usize, f64)> = None;
        let mut nearest_merge: Option<(usize, f64)> = None;
        {
            let children = node.nodes();
            for (i, sibling) in children.iter().enumerate() {
                if i == underflowed {
                    continue;
                }
                let distance = (self.distance)(&children[underflowed].data, &sibling.data);
                if sibling.len() > self.min_node_capacity {
                    if nearest_donor.map_or(true, |(_, best)| distance < best) {
                        nearest_donor = Some((i, distance));
                    }
                } else if nearest_merge.map_or(true, |(_, best)| distance < best) {
                    nearest_merge = Some((i, distance));
                }
            }
        }

        if let Some((donor, _)) = nearest_donor {
            self.donate(node, donor, underflowed);
        } else if let Some((target, _)) = nearest_merge {
            self.merge(node, underflowed, target);
        } else {
            unreachable!("an underflowed child always has at least one sibling");
        }
    }

    /// Moves the donor's grandchild nearest to the underflowed child
    /// into it.
    fn donate(&self, node: &mut Node<T>, donor: usize, underflowed: usize) {
        let children = node.nodes_mut();
        let (nearest, nearest_distance) = {
            let mut best = (0, f64::INFINITY);
            let target_data = &children[underflowed].data;
            match &children[donor].children {
                Children::Entries(entries) => {
                    for (i, entry) in entries.iter().enumerate() {
                        let d = (self.distance)(&entry.data, target_data);
                        if d < best.1 {
                            best = (i, d);
                        }
                    }
                }
                Children::Nodes(nodes) => {
                    for (i, grandchild) in nodes.iter().enumerate() {
                        let d = (self.distance)(&grandchild.data, target_data);
                        if d < best.1 {
                            best = (i, d);
                        }
                    }
                }
            }
            best
        };

        match children[donor].take_child(nearest) {
            ChildItem::Entry(mut entry) => {
                entry.distance_to_parent = nearest_distance;
                Self::add_entry_child(&mut children[underflowed], entry);
            }
            ChildItem::Node(grandchild) => {
                self.add_node_child(&mut children[underflowed], grandchild, nearest_distance);
            }
        }

        let (dtp, radius) = (
            children[underflowed].distance_to_parent,
            children[underflowed].radius,
        );
        node.cover(dtp, radius);
    }

    /// Transfers every grandchild of the underflowed child into the
    /// merge target (at recomputed distances) and discards the child.
    /// The target held at most `min` children (it was no donor) and
    /// gains at most `min - 1`, so it stays within `max`.
    fn merge(&self, node: &mut Node<T>, underflowed: usize, target: usize) {
        let children = node.nodes_mut();
        let under = children.swap_remove(underflowed);
        // swap_remove moved the last child into the vacated slot.
        let target = if target == children.len() {
            underflowed
        } else {
            target
        };

        match under.children {
            Children::Entries(entries) => {
                for mut entry in entries {
                    let d = (self.distance)(&entry.data, &children[target].data);
                    entry.distance_to_parent = d;
                    Self::add_entry_child(&mut children[target], entry);
                }
            }
            Children::Nodes(grandchildren) => {
                for grandchild in grandchildren {
                    let d = (self.distance)(&grandchild.data, &children[target].data);
                    self.add_node_child(&mut children[target], grandchild, d);
                }
            }
        }

        let (dtp, radius) = (
            children[target].distance_to_parent,
            children[target].radius,
        );
        node.cover(dtp, radius);
    }

    /// Recursively verifies the structural invariants, panicking on any
    /// violation. A test oracle, not meant for production use.
    pub fn check_invariants(&self) {
        let Some(root) = &self.root else { return };
        assert!(
            root.distance_to_parent.is_nan(),
            "the root has no parent distance"
        );
        match &root.children {
            Children::Entries(entries) => {
                assert!(!entries.is_empty(), "a leaf root holds at least one entry");
            }
            Children::Nodes(nodes) => {
                assert!(
                    nodes.len() >= 2,
                    "an internal root holds at least two children"
                );
            }
        }
        self.check_node(root, true);
    }

    #[allow(clippy::float_cmp)] // parent distances are stored exactly
    fn check_node(&self, node: &Node<T>, is_root: bool) -> usize {
        assert!(node.radius >= 0.0, "radius is non-negative");
        if !is_root {
            assert!(
                node.distance_to_parent >= 0.0,
                "non-root nodes have a valid parent distance"
            );
            assert!(
                node.len() >= self.min_node_capacity,
                "non-root nodes respect the minimum capacity"
            );
        }
        assert!(
            node.len() <= self.max_node_capacity,
            "nodes respect the maximum capacity"
        );

        match &node.children {
            Children::Entries(entries) => {
                for entry in entries {
                    let distance = (self.distance)(&entry.data, &node.data);
                    assert!(
                        entry.distance_to_parent == distance,
                        "entry parent distances are exact"
                    );
                    assert!(
                        entry.distance_to_parent <= node.radius,
                        "the covering radius bounds every entry"
                    );
                }
                1
            }
            Children::Nodes(children) => {
                let mut child_height = None;
                for child in children {
                    let distance = (self.distance)(&child.data, &node.data);
                    assert!(
                        child.distance_to_parent == distance,
                        "child parent distances are exact"
                    );
                    assert!(
                        child.distance_to_parent + child.radius <= node.radius,
                        "the covering radius bounds every child ball"
                    );
                    let height = self.check_node(child, false);
                    match child_height {
                        None => child_height = Some(height),
                        Some(expected) => {
                            assert_eq!(expected, height, "all leaves sit at the same depth");
                        }
                    }
                }
                child_height.map_or(1, |height| height + 1)
            }
        }
    }
}
