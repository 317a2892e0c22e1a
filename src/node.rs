/// One indexed data object, stored at the leaf level. Its covering
/// radius is identically zero, so no field is kept for it.
pub(crate) struct Entry<T> {
    pub data: T,
    pub distance_to_parent: f64,
}

impl<T> Entry<T> {
    pub fn new(data: T, distance_to_parent: f64) -> Entry<T> {
        Entry {
            data,
            distance_to_parent,
        }
    }
}

/// A routing node whose ball (centered at `data`, with `radius`) covers
/// every data object in its subtree. `distance_to_parent` is NaN for
/// the root.
pub(crate) struct Node<T> {
    pub data: T,
    pub radius: f64,
    pub distance_to_parent: f64,
    pub children: Children<T>,
}

/// Children of a node: either leaf entries or nodes, never mixed.
/// Keys (the children's own data) are unique within one node.
pub(crate) enum Children<T> {
    Entries(Vec<Entry<T>>),
    Nodes(Vec<Node<T>>),
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Children::Entries(Vec::new())
    }
}

impl<T> Node<T> {
    pub fn new_leaf(data: T) -> Node<T> {
        Node::with_children(data, 0.0, Children::Entries(Vec::new()))
    }

    pub fn new_internal(data: T) -> Node<T> {
        Node::with_children(data, 0.0, Children::Nodes(Vec::new()))
    }

    pub fn with_children(data: T, radius: f64, children: Children<T>) -> Node<T> {
        Node {
            data,
            radius,
            distance_to_parent: f64::NAN,
            children,
        }
    }

    pub fn len(&self) -> usize {
        match &self.children {
            Children::Entries(entries) => entries.len(),
            Children::Nodes(nodes) => nodes.len(),
        }
    }

    /// Grows the radius to cover a child ball at the given distance.
    /// Radii never shrink; removals leave them loose.
    pub fn cover(&mut self, distance: f64, child_radius: f64) {
        self.radius = self.radius.max(distance + child_radius);
    }

    // Children as nodes or entries. These panic on the wrong kind;
    // callers have already established it.
    pub fn nodes(&self) -> &[Node<T>] {
        match &self.children {
            Children::Nodes(nodes) => nodes,
            Children::Entries(_) => unreachable!("internal node expected"),
        }
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<Node<T>> {
        match &mut self.children {
            Children::Nodes(nodes) => nodes,
            Children::Entries(_) => unreachable!("internal node expected"),
        }
    }

    pub fn entries_mut(&mut self) -> &mut Vec<Entry<T>> {
        match &mut self.children {
            Children::Entries(entries) => entries,
            Children::Nodes(_) => unreachable!("leaf node expected"),
        }
    }

    /// Detaches and returns the child at `index`, in swap-remove order.
    pub fn take_child(&mut self, index: usize) -> ChildItem<T> {
        match &mut self.children {
            Children::Entries(entries) => ChildItem::Entry(entries.swap_remove(index)),
            Children::Nodes(nodes) => ChildItem::Node(nodes.swap_remove(index)),
        }
    }
}

/// A child detached from its node, preserving its kind.
pub(crate) enum ChildItem<T> {
    Entry(Entry<T>),
    Node(Node<T>),
}

/// `Split` carries the two nodes replacing the overflowed one; the
/// caller re-attaches them.
pub(crate) enum AddResult<T> {
    Ok,
    Split(Node<T>, Node<T>),
}

/// Underflow is not signaled here: the caller owns the child and
/// inspects its arity directly.
pub(crate) enum RemoveResult {
    Removed,
    NotFound,
}

/// Common surface of entries and nodes, used by the split path to
/// re-parent both kinds the same way.
pub(crate) trait TreeItem<T> {
    fn data(&self) -> &T;
    fn radius(&self) -> f64;
    fn set_distance_to_parent(&mut self, distance: f64);
}

impl<T> TreeItem<T> for Entry<T> {
    fn data(&self) -> &T {
        &self.data
    }

    fn radius(&self) -> f64 {
        0.0
    }

    fn set_distance_to_parent(&mut self, distance: f64) {
        self.distance_to_parent = distance;
    }
}

impl<T> TreeItem<T> for Node<T> {
    fn data(&self) -> &T {
        &self.data
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn set_distance_to_parent(&mut self, distance: f64) {
        self.distance_to_parent = distance;
    }
}
