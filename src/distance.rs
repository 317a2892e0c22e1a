use std::collections::HashMap;

/// The distance function injected at tree construction. It must be
/// symmetric, non-negative and satisfy the triangle inequality; the
/// tree's pruning is unsound otherwise.
pub type DistanceFn<T> = Box<dyn Fn(&T, &T) -> f64>;

#[must_use]
pub fn euclidean<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += (x - y).powi(2);
    }
    sum.sqrt()
}

/// Memoizes distance evaluations between split candidates, which are
/// addressed by index into the candidate slice. One cache is created
/// per split call and discarded with it.
pub struct DistanceCache<'a, T> {
    distance: &'a DistanceFn<T>,
    candidates: &'a [T],
    cache: HashMap<(usize, usize), f64>,
}

impl<'a, T> DistanceCache<'a, T> {
    pub(crate) fn new(distance: &'a DistanceFn<T>, candidates: &'a [T]) -> Self {
        DistanceCache {
            distance,
            candidates,
            cache: HashMap::new(),
        }
    }

    /// The distance between candidates `a` and `b`, evaluated at most
    /// once per unordered pair.
    pub fn distance(&mut self, a: usize, b: usize) -> f64 {
        // The distance function is symmetric, so one key serves both
        // orders.
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(&distance) = self.cache.get(&key) {
            return distance;
        }
        let distance = (self.distance)(&self.candidates[key.0], &self.candidates[key.1]);
        self.cache.insert(key, distance);
        distance
    }
}
