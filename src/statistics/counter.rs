//! Per-metric counter sources
//!
//! All four metrics share one grouping/counting contract; they differ only in
//! which event table the backend reads, so a single `CounterSource` is
//! parameterized by its `MetricKind`.

use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::models::{DateRange, Granularity, MetricKind, SparseCount};
use crate::storage::EventCountBackend;

#[derive(Clone)]
pub struct CounterSource {
    metric: MetricKind,
    backend: Arc<dyn EventCountBackend>,
}

impl CounterSource {
    pub fn new(metric: MetricKind, backend: Arc<dyn EventCountBackend>) -> Self {
        Self { metric, backend }
    }

    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    /// Sparse per-bucket counts for `post_ids`.
    ///
    /// An empty id set returns an empty result without touching the backend.
    pub async fn query(
        &self,
        post_ids: &BTreeSet<i64>,
        range: &DateRange,
        granularity: Granularity,
    ) -> Result<Vec<SparseCount>> {
        if post_ids.is_empty() {
            debug!(metric = %self.metric, "no posts to count, skipping backend query");
            return Ok(Vec::new());
        }

        self.backend
            .count_by_bucket(self.metric.event_kind(), post_ids, range, granularity)
            .await
    }
}

/// One counter source per metric kind
#[derive(Clone)]
pub struct CounterSources {
    post_count: CounterSource,
    like_count: CounterSource,
    view_count: CounterSource,
    share_count: CounterSource,
}

impl CounterSources {
    /// All four metrics answered by the same event store
    pub fn new(backend: Arc<dyn EventCountBackend>) -> Self {
        Self::with_backends(
            Arc::clone(&backend),
            Arc::clone(&backend),
            Arc::clone(&backend),
            backend,
        )
    }

    /// Separate event stores per metric
    pub fn with_backends(
        posts: Arc<dyn EventCountBackend>,
        likes: Arc<dyn EventCountBackend>,
        views: Arc<dyn EventCountBackend>,
        shares: Arc<dyn EventCountBackend>,
    ) -> Self {
        Self {
            post_count: CounterSource::new(MetricKind::PostCount, posts),
            like_count: CounterSource::new(MetricKind::LikeCount, likes),
            view_count: CounterSource::new(MetricKind::ViewCount, views),
            share_count: CounterSource::new(MetricKind::ShareCount, shares),
        }
    }

    pub fn for_metric(&self, metric: MetricKind) -> &CounterSource {
        match metric {
            MetricKind::PostCount => &self.post_count,
            MetricKind::LikeCount => &self.like_count,
            MetricKind::ViewCount => &self.view_count,
            MetricKind::ShareCount => &self.share_count,
        }
    }
}
