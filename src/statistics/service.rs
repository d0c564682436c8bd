use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Bucket, Granularity, MetricKind, StatisticsRequest};
use crate::statistics::{build_template, merge, CounterSources, StatisticsError, StatisticsLimits};
use crate::storage::{EventCountBackend, HashtagResolver};

/// End-to-end statistics pipeline: validate, resolve, count, template, merge
#[derive(Clone)]
pub struct StatisticsService {
    resolver: Arc<dyn HashtagResolver>,
    counters: CounterSources,
    limits: StatisticsLimits,
}

impl StatisticsService {
    pub fn new(
        resolver: Arc<dyn HashtagResolver>,
        counters: CounterSources,
        limits: StatisticsLimits,
    ) -> Self {
        Self {
            resolver,
            counters,
            limits,
        }
    }

    /// Service whose hashtag index and event counts come from the same store
    pub fn from_store<S>(store: Arc<S>, limits: StatisticsLimits) -> Self
    where
        S: HashtagResolver + EventCountBackend + 'static,
    {
        let resolver: Arc<dyn HashtagResolver> = store.clone();
        let backend: Arc<dyn EventCountBackend> = store;
        Self::new(resolver, CounterSources::new(backend), limits)
    }

    /// Dense, chronologically ordered series of `metric` for posts tagged `hashtag`.
    ///
    /// The range is checked before any data access. Backend failures abort the
    /// whole request; an unknown hashtag yields an all-zero series.
    pub async fn get_statistics(
        &self,
        hashtag: &str,
        metric: MetricKind,
        granularity: Granularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bucket>, StatisticsError> {
        info!(hashtag, %metric, %granularity, %start, %end, "statistics requested");

        let range = self.limits.validate(granularity, start, end)?;

        let post_ids = self.resolver.resolve(hashtag).await?;
        debug!(hashtag, posts = post_ids.len(), "resolved hashtag");

        let sparse = self
            .counters
            .for_metric(metric)
            .query(&post_ids, &range, granularity)
            .await?;
        debug!(%metric, rows = sparse.len(), "fetched sparse counts");

        let template = build_template(granularity, &range);

        Ok(merge(&template, &sparse))
    }

    /// Answer a caller-facing request; a missing hashtag falls back to `caller_account`
    pub async fn handle(
        &self,
        request: &StatisticsRequest,
        caller_account: &str,
    ) -> Result<Vec<Bucket>, StatisticsError> {
        let hashtag = request.resolve_hashtag(caller_account);
        self.get_statistics(
            &hashtag,
            request.metric,
            request.granularity,
            request.start,
            request.end,
        )
        .await
    }
}
