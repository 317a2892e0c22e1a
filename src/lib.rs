mod distance;
mod node;
mod query;
mod split;
mod tree;

pub use distance::{euclidean, DistanceCache, DistanceFn};
pub use query::{Query, ResultItem};
pub use split::{
    BalancedPartition, PartitionFunction, PromotionFunction, RandomPromotion, SplitFunction,
};
pub use tree::{ConfigError, MTree, DEFAULT_MIN_NODE_CAPACITY};
