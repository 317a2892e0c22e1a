use crate::distance::DistanceCache;
use ordered_float::OrderedFloat;
use rand::Rng;

/// Selects two pivots to seed a node split. Implementations must
/// return two distinct indices into `candidates`.
pub trait PromotionFunction<T> {
    fn promote(&self, candidates: &[T], cache: &mut DistanceCache<'_, T>) -> (usize, usize);
}

/// Partitions the split candidates between two pivots. Every candidate
/// index (the pivots included) must land in exactly one of the two
/// returned partitions, and neither may be empty.
pub trait PartitionFunction<T> {
    fn partition(
        &self,
        first: usize,
        second: usize,
        candidates: &[T],
        cache: &mut DistanceCache<'_, T>,
    ) -> (Vec<usize>, Vec<usize>);
}

/// Promotes two distinct candidates chosen uniformly at random, without
/// any distance evaluations.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPromotion;

impl<T> PromotionFunction<T> for RandomPromotion {
    fn promote(&self, candidates: &[T], _cache: &mut DistanceCache<'_, T>) -> (usize, usize) {
        let mut rng = rand::thread_rng();
        let first = rng.gen_range(0..candidates.len());
        let mut second = rng.gen_range(0..candidates.len() - 1);
        if second >= first {
            second += 1;
        }
        (first, second)
    }
}

/// Alternately lets each pivot claim its nearest not-yet-claimed
/// candidate, keeping the partition sizes within one of each other.
#[derive(Clone, Copy, Debug, Default)]
pub struct BalancedPartition;

impl<T> PartitionFunction<T> for BalancedPartition {
    fn partition(
        &self,
        first: usize,
        second: usize,
        candidates: &[T],
        cache: &mut DistanceCache<'_, T>,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut queue1: Vec<usize> = (0..candidates.len()).collect();
        queue1.sort_by_key(|&i| OrderedFloat(cache.distance(first, i)));
        let mut queue2: Vec<usize> = (0..candidates.len()).collect();
        queue2.sort_by_key(|&i| OrderedFloat(cache.distance(second, i)));

        let mut claimed = vec![false; candidates.len()];
        let mut partition1 = Vec::new();
        let mut partition2 = Vec::new();
        let (mut i1, mut i2) = (0, 0);
        while i1 < queue1.len() || i2 < queue2.len() {
            while let Some(&candidate) = queue1.get(i1) {
                i1 += 1;
                if !claimed[candidate] {
                    claimed[candidate] = true;
                    partition1.push(candidate);
                    break;
                }
            }
            while let Some(&candidate) = queue2.get(i2) {
                i2 += 1;
                if !claimed[candidate] {
                    claimed[candidate] = true;
                    partition2.push(candidate);
                    break;
                }
            }
        }

        (partition1, partition2)
    }
}

/// The operation invoked when a node overflows: promotion composed
/// with partition.
pub struct SplitFunction<T> {
    promotion: Box<dyn PromotionFunction<T>>,
    partition: Box<dyn PartitionFunction<T>>,
}

impl<T> SplitFunction<T> {
    #[must_use]
    pub fn new(
        promotion: Box<dyn PromotionFunction<T>>,
        partition: Box<dyn PartitionFunction<T>>,
    ) -> Self {
        SplitFunction {
            promotion,
            partition,
        }
    }

    /// Returns the two promoted pivots, each paired with the candidate
    /// indices assigned to it.
    pub(crate) fn split(
        &self,
        candidates: &[T],
        cache: &mut DistanceCache<'_, T>,
    ) -> ((usize, Vec<usize>), (usize, Vec<usize>)) {
        let (first, second) = self.promotion.promote(candidates, cache);
        let (partition1, partition2) = self.partition.partition(first, second, candidates, cache);
        ((first, partition1), (second, partition2))
    }
}

impl<T> Default for SplitFunction<T> {
    fn default() -> Self {
        SplitFunction::new(Box::new(RandomPromotion), Box::new(BalancedPartition))
    }
}

#[cfg(test)]
mod tests {
    use super::{BalancedPartition, PartitionFunction, PromotionFunction, RandomPromotion};
    use crate::distance::{DistanceCache, DistanceFn};

    #[test]
    fn random_promotion_picks_distinct_pivots() {
        let distance: DistanceFn<f64> = Box::new(|a, b| (a - b).abs());
        let candidates = [0.0, 1.0, 2.0, 3.0];
        let mut cache = DistanceCache::new(&distance, &candidates);
        for _ in 0..100 {
            let (first, second) = RandomPromotion.promote(&candidates, &mut cache);
            assert_ne!(first, second);
            assert!(first < candidates.len());
            assert!(second < candidates.len());
        }
    }

    #[test]
    fn balanced_partition_is_balanced() {
        // Pivot 0 is central; without alternation it would claim
        // almost everything.
        let distance: DistanceFn<f64> = Box::new(|a, b| (a - b).abs());
        let candidates = [5.0, 100.0, 4.0, 6.0, 3.0, 7.0, 2.0, 8.0];
        let mut cache = DistanceCache::new(&distance, &candidates);

        let (partition1, partition2) =
            BalancedPartition.partition(0, 1, &candidates, &mut cache);

        assert_eq!(partition1.len(), 4);
        assert_eq!(partition2.len(), 4);
        assert!(partition1.contains(&0));
        assert!(partition2.contains(&1));

        let mut all: Vec<usize> = partition1.iter().chain(&partition2).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..candidates.len()).collect::<Vec<_>>());
    }
}
