//! End-to-end statistics tests over an in-memory SQLite store

use chrono::NaiveDate;
use socialhub::models::{
    Bucket, Granularity, InteractionKind, MetricKind, NewPost, PostType, StatisticsRequest,
};
use socialhub::statistics::{StatisticsError, StatisticsLimits, StatisticsService};
use socialhub::storage::{SqliteStorage, Storage};
use std::sync::Arc;

fn ts(y: i32, m: u32, d: u32, h: u32) -> i64 {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pairs(series: &[Bucket]) -> Vec<(&str, u64)> {
    series.iter().map(|b| (b.label.as_str(), b.value)).collect()
}

/// Two `#demo` posts on 08-01, one unrelated post, and engagement on 08-02
async fn seeded_service() -> (Arc<SqliteStorage>, StatisticsService) {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    let storage = Arc::new(storage);

    let alice = storage.create_user("alice", "alice@example.com").await.unwrap();
    let bob = storage.create_user("bob", "bob@example.com").await.unwrap();
    storage.create_user("carol", "carol@example.com").await.unwrap();

    let mut demo_ids = Vec::new();
    for title in ["one", "two"] {
        let post = storage
            .create_post(&NewPost {
                author_id: alice.id,
                post_type: PostType::Instagram,
                title: title.to_string(),
                content: "hello".to_string(),
                hashtags: vec!["#demo".to_string()],
                created_at: ts(2024, 8, 1, 10),
            })
            .await
            .unwrap();
        demo_ids.push(post.id);
    }
    let unrelated = storage
        .create_post(&NewPost {
            author_id: bob.id,
            post_type: PostType::Twitter,
            title: "unrelated".to_string(),
            content: "hi".to_string(),
            hashtags: vec!["#other".to_string()],
            created_at: ts(2024, 8, 2, 10),
        })
        .await
        .unwrap();

    for (i, post_id) in [demo_ids[0], demo_ids[1], demo_ids[1], demo_ids[0]]
        .into_iter()
        .enumerate()
    {
        storage
            .record_interaction(InteractionKind::Like, post_id, Some(i as i64), ts(2024, 8, 2, 9))
            .await
            .unwrap();
    }
    storage
        .record_interaction(InteractionKind::Like, unrelated.id, None, ts(2024, 8, 2, 9))
        .await
        .unwrap();
    storage
        .record_interaction(InteractionKind::View, demo_ids[0], None, ts(2024, 8, 2, 21))
        .await
        .unwrap();

    let service = StatisticsService::from_store(Arc::clone(&storage), StatisticsLimits::default());
    (storage, service)
}

#[tokio::test]
async fn test_like_count_daily_series() {
    let (_storage, service) = seeded_service().await;

    let series = service
        .get_statistics(
            "#demo",
            MetricKind::LikeCount,
            Granularity::Day,
            date(2024, 8, 1),
            date(2024, 8, 2),
        )
        .await
        .unwrap();

    assert_eq!(pairs(&series), vec![("2024-08-01", 0), ("2024-08-02", 4)]);
}

#[tokio::test]
async fn test_post_count_and_view_count() {
    let (_storage, service) = seeded_service().await;

    let posts = service
        .get_statistics(
            "demo",
            MetricKind::PostCount,
            Granularity::Day,
            date(2024, 7, 31),
            date(2024, 8, 2),
        )
        .await
        .unwrap();
    assert_eq!(
        pairs(&posts),
        vec![("2024-07-31", 0), ("2024-08-01", 2), ("2024-08-02", 0)]
    );

    let views = service
        .get_statistics(
            "#demo",
            MetricKind::ViewCount,
            Granularity::Hour,
            date(2024, 8, 2),
            date(2024, 8, 2),
        )
        .await
        .unwrap();
    assert_eq!(views.len(), 24);
    assert_eq!(views[21], Bucket { label: "2024-08-02 21:00".to_string(), value: 1 });
    assert_eq!(views.iter().map(|b| b.value).sum::<u64>(), 1);
}

#[tokio::test]
async fn test_unknown_hashtag_is_zero_filled() {
    let (_storage, service) = seeded_service().await;

    let series = service
        .get_statistics(
            "#nothing",
            MetricKind::ShareCount,
            Granularity::Day,
            date(2024, 8, 1),
            date(2024, 8, 31),
        )
        .await
        .unwrap();

    assert_eq!(series.len(), 31);
    assert!(series.iter().all(|b| b.value == 0));
    assert_eq!(series[30].label, "2024-08-31");
}

#[tokio::test]
async fn test_range_limits_enforced() {
    let (_storage, service) = seeded_service().await;

    let err = service
        .get_statistics(
            "#demo",
            MetricKind::LikeCount,
            Granularity::Day,
            date(2024, 8, 1),
            date(2024, 9, 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StatisticsError::InvalidDateRange(_)));
    assert_eq!(err.code(), "STATISTICS_INVALID_DATE_RANGE_TOO_LONG_DATE");
}

#[tokio::test]
async fn test_request_defaults_to_caller_account() {
    let (storage, service) = seeded_service().await;
    let carol = storage.get_user("carol").await.unwrap().unwrap();
    storage
        .create_post(&NewPost {
            author_id: carol.id,
            post_type: PostType::Threads,
            title: "mine".to_string(),
            content: "tagged with my account".to_string(),
            hashtags: vec!["carol".to_string()],
            created_at: ts(2024, 8, 3, 12),
        })
        .await
        .unwrap();

    let request = StatisticsRequest {
        hashtag: None,
        metric: MetricKind::PostCount,
        granularity: Granularity::Day,
        start: date(2024, 8, 3),
        end: date(2024, 8, 3),
    };

    let series = service.handle(&request, "carol").await.unwrap();
    assert_eq!(pairs(&series), vec![("2024-08-03", 1)]);
}

#[tokio::test]
async fn test_repeated_requests_match() {
    let (_storage, service) = seeded_service().await;

    let mut results = Vec::new();
    for _ in 0..2 {
        results.push(
            service
                .get_statistics(
                    "#demo",
                    MetricKind::LikeCount,
                    Granularity::Hour,
                    date(2024, 8, 1),
                    date(2024, 8, 3),
                )
                .await
                .unwrap(),
        );
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].len(), 72);
}
