use mtree::{euclidean, MTree};

#[test]
fn basic_usage() {
    let mut tree = MTree::with_capacity(4, euclidean).expect("valid capacity");

    // Index some points
    tree.insert([1.0, 1.0]);
    tree.insert([2.0, 2.0]);
    tree.insert([3.0, 3.0]);
    tree.insert([20.0, 20.0]);

    // Query for the three nearest neighbors of the origin
    let neighbors: Vec<[f64; 2]> = tree
        .query_by_limit([0.0, 0.0], 3)
        .map(|result| *result.data)
        .collect();
    assert_eq!(neighbors, vec![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);

    // Remove a point and query again (it should not come back)
    assert!(tree.remove(&[3.0, 3.0]));
    let neighbors: Vec<[f64; 2]> = tree
        .query_by_limit([0.0, 0.0], 3)
        .map(|result| *result.data)
        .collect();
    assert_eq!(neighbors, vec![[1.0, 1.0], [2.0, 2.0], [20.0, 20.0]]);
}

#[test]
fn range_and_limit_compose() {
    let mut tree = MTree::with_capacity(4, euclidean).expect("valid capacity");
    for i in 0..10 {
        tree.insert([f64::from(i), 0.0]);
    }

    // Both constraints apply at once: the range admits six points, the
    // limit cuts the answer to the nearest three.
    let results: Vec<(f64, f64)> = tree
        .query([0.0, 0.0], 5.0, 3)
        .map(|result| (result.data[0], result.distance))
        .collect();
    assert_eq!(results, vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
}

#[test]
fn results_arrive_in_distance_order() {
    let mut tree = MTree::with_capacity(4, euclidean).expect("valid capacity");
    for i in 0..100 {
        let angle = f64::from(i) * 0.7;
        tree.insert([angle.cos() * f64::from(i), angle.sin() * f64::from(i)]);
    }

    let distances: Vec<f64> = tree
        .query_by_range([3.0, -2.0], f64::INFINITY)
        .map(|result| result.distance)
        .collect();
    assert_eq!(distances.len(), 100);
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn interleaved_queries_are_independent() {
    let mut tree = MTree::with_capacity(4, euclidean).expect("valid capacity");
    let n = 50;
    for i in 0..n {
        tree.insert([f64::from(i), 0.0]);
    }

    // Two traversals over the same tree, advanced in lockstep, each
    // behave as if they were running alone.
    let mut ascending = tree.query_by_range([0.0, 0.0], f64::INFINITY);
    let mut descending = tree.query_by_range([f64::from(n - 1), 0.0], f64::INFINITY);
    for i in 0..n {
        let from_left = ascending.next().expect("traversal is not exhausted");
        let from_right = descending.next().expect("traversal is not exhausted");
        assert_eq!(from_left.data[0], f64::from(i));
        assert_eq!(from_right.data[0], f64::from(n - 1 - i));
    }
    assert!(ascending.next().is_none());
    assert!(descending.next().is_none());
}

#[test]
fn queries_are_lazy() {
    // Count distance evaluations: pulling one neighbor out of a large
    // tree must not compare the query object against every entry.
    use std::cell::Cell;
    use std::rc::Rc;

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let mut tree = MTree::with_capacity(4, move |a: &[f64; 2], b: &[f64; 2]| {
        counter.set(counter.get() + 1);
        euclidean(a, b)
    })
    .expect("valid capacity");

    let n = 1000;
    for i in 0..n {
        tree.insert([f64::from(i % 97), f64::from(i / 97)]);
    }

    let before = calls.get();
    let nearest = tree
        .query_by_limit([50.0, 5.0], 1)
        .next()
        .expect("tree is not empty");
    assert_eq!(nearest.distance, 0.0);
    assert!(calls.get() - before < n);
}
