pub mod post;
pub mod statistics;

pub use post::{
    normalize_hashtag, normalize_hashtags, EventKind, InteractionKind, NewPost, Post, PostType,
    PostUpdate, User,
};
pub use statistics::{Bucket, DateRange, Granularity, MetricKind, SparseCount, StatisticsRequest};
