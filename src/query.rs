use crate::node::{Children, Node};
use crate::tree::MTree;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// One query answer: the indexed object and its distance to the query
/// object.
#[derive(Debug)]
pub struct ResultItem<'a, T> {
    pub data: &'a T,
    pub distance: f64,
}

/// A subtree that may still contribute answers, keyed by the smallest
/// distance any object inside it can have to the query object.
struct PendingItem<'a, T> {
    min_distance: OrderedFloat<f64>,
    distance: f64,
    node: &'a Node<T>,
}

impl<T> PartialEq for PendingItem<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.min_distance == other.min_distance
    }
}

impl<T> Eq for PendingItem<'_, T> {}

impl<T> PartialOrd for PendingItem<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for PendingItem<'_, T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so the max-heap pops the nearest subtree first.
        other.min_distance.cmp(&self.min_distance)
    }
}

/// A data object already known to lie within range, waiting until no
/// unexplored subtree can beat its distance.
struct NearestItem<'a, T> {
    distance: OrderedFloat<f64>,
    data: &'a T,
}

impl<T> PartialEq for NearestItem<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl<T> Eq for NearestItem<'_, T> {}

impl<T> PartialOrd for NearestItem<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for NearestItem<'_, T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.distance.cmp(&self.distance)
    }
}

/// Best-first traversal yielding indexed objects in non-decreasing
/// distance order. Lazy: a subtree is only expanded once a cheaper
/// answer can no longer be ruled out.
pub struct Query<'a, T> {
    tree: &'a MTree<T>,
    query: T,
    range: f64,
    limit: usize,
    yielded: usize,
    pending: BinaryHeap<PendingItem<'a, T>>,
    nearest: BinaryHeap<NearestItem<'a, T>>,
}

impl<'a, T> Query<'a, T> {
    pub(crate) fn new(tree: &'a MTree<T>, query: T, range: f64, limit: usize) -> Self {
        let mut pending = BinaryHeap::new();
        if let Some(root) = &tree.root {
            let distance = (tree.distance)(&query, &root.data);
            let min_distance = (distance - root.radius).max(0.0);
            if min_distance <= range {
                pending.push(PendingItem {
                    min_distance: OrderedFloat(min_distance),
                    distance,
                    node: root,
                });
            }
        }
        Query {
            tree,
            query,
            range,
            limit,
            yielded: 0,
            pending,
            nearest: BinaryHeap::new(),
        }
    }

    fn expand(&mut self, item: PendingItem<'a, T>) {
        match &item.node.children {
            Children::Entries(entries) => {
                for entry in entries {
                    // The stored parent distance prunes without an
                    // evaluation; survivors get the exact check.
                    if (item.distance - entry.distance_to_parent).abs() > self.range {
                        continue;
                    }
                    let distance = (self.tree.distance)(&self.query, &entry.data);
                    if distance <= self.range {
                        self.nearest.push(NearestItem {
                            distance: OrderedFloat(distance),
                            data: &entry.data,
                        });
                    }
                }
            }
            Children::Nodes(children) => {
                for child in children {
                    if (item.distance - child.distance_to_parent).abs() - child.radius > self.range
                    {
                        continue;
                    }
                    let distance = (self.tree.distance)(&self.query, &child.data);
                    let min_distance = (distance - child.radius).max(0.0);
                    if min_distance <= self.range {
                        self.pending.push(PendingItem {
                            min_distance: OrderedFloat(min_distance),
                            distance,
                            node: child,
                        });
                    }
                }
            }
        }
    }
}

impl<'a, T> Iterator for Query<'a, T> {
    type Item = ResultItem<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.limit {
            return None;
        }
        loop {
            let next_pending = self
                .pending
                .peek()
                .map_or(f64::INFINITY, |item| item.min_distance.0);
            let ready = self
                .nearest
                .peek()
                .map_or(false, |best| best.distance.0 <= next_pending);
            if ready {
                if let Some(best) = self.nearest.pop() {
                    self.yielded += 1;
                    return Some(ResultItem {
                        data: best.data,
                        distance: best.distance.0,
                    });
                }
            }
            let item = self.pending.pop()?;
            self.expand(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NearestItem, PendingItem};
    use crate::node::Node;
    use ordered_float::OrderedFloat;
    use std::collections::BinaryHeap;

    #[test]
    fn pending_heap_pops_nearest_subtree_first() {
        let near = Node::new_leaf(1.0);
        let far = Node::new_leaf(9.0);
        let mut heap = BinaryHeap::new();
        heap.push(PendingItem {
            min_distance: OrderedFloat(8.0),
            distance: 9.0,
            node: &far,
        });
        heap.push(PendingItem {
            min_distance: OrderedFloat(0.5),
            distance: 1.0,
            node: &near,
        });

        let popped = heap.pop().expect("heap is not empty");
        assert_eq!(popped.min_distance, OrderedFloat(0.5));
    }

    #[test]
    fn nearest_heap_pops_smallest_distance_first() {
        let mut heap = BinaryHeap::new();
        for distance in [3.0, 1.0, 2.0] {
            heap.push(NearestItem {
                distance: OrderedFloat(distance),
                data: &(),
            });
        }

        let order: Vec<f64> = std::iter::from_fn(|| heap.pop().map(|item| item.distance.0))
            .collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
    }
}
