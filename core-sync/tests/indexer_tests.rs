//! Integration tests for the indexing phase
//!
//! These tests verify:
//! - Records and year/month paths created from catalog pages
//! - Idempotent re-runs
//! - Filename disambiguation
//! - Watermark advancement and bounded scans
//! - Refresh of modified items and malformed descriptor handling
//! - Periodic checkpoints and resuming after a failed page

mod common;

use chrono::NaiveDate;
use common::{at, photo, test_store, video, CheckpointingStore, FakeCatalog};
use core_library::MediaRepository;
use core_sync::{IndexOptions, Indexer, SyncError};
use tokio_util::sync::CancellationToken;

fn options() -> IndexOptions {
    IndexOptions {
        page_size: 2,
        ..IndexOptions::default()
    }
}

fn three_items() -> Vec<bridge_traits::RemoteMediaItem> {
    vec![
        photo("1", "a.jpg", "2023-01-01T10:00:00Z"),
        photo("2", "b.jpg", "2023-01-02T10:00:00Z"),
        photo("3", "c.jpg", "2023-01-03T10:00:00Z"),
    ]
}

#[tokio::test]
async fn test_index_creates_records_and_watermark() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;

    let stats = Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.pages, 2);
    assert_eq!(store.count().await.unwrap(), 3);
    assert_eq!(
        store.get_watermark().await.unwrap(),
        Some(at("2023-01-03T10:00:00Z"))
    );

    let record = store.get_by_path("photos/2023/01", "b.jpg").await.unwrap().unwrap();
    assert_eq!(record.id, "2");
    assert!(!record.downloaded);

    // Unfiltered first scan walks the whole library
    assert_eq!(catalog.list_calls(), 2);
    assert!(catalog.search_calls().is_empty());
}

#[tokio::test]
async fn test_index_twice_creates_no_duplicates() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;

    Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    let rescan = IndexOptions {
        rescan: true,
        ..options()
    };
    let stats = Indexer::new(catalog.clone(), store.clone(), rescan)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.unchanged, 3);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_incremental_scan_starts_at_watermark() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;

    Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    catalog.add(photo("4", "d.jpg", "2023-01-05T08:00:00Z"));
    let stats = Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(store.count().await.unwrap(), 4);
    assert_eq!(
        store.get_watermark().await.unwrap(),
        Some(at("2023-01-05T08:00:00Z"))
    );

    let query = catalog.search_calls()[0];
    assert_eq!(query.date_range.start, NaiveDate::from_ymd_opt(2023, 1, 3));
    assert_eq!(query.date_range.end, None);
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;
    store.set_watermark(at("2024-06-01T00:00:00Z")).await.unwrap();

    let rescan = IndexOptions {
        rescan: true,
        ..options()
    };
    let stats = Indexer::new(catalog, store.clone(), rescan).run().await.unwrap();

    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.watermark, Some(at("2024-06-01T00:00:00Z")));
    assert_eq!(
        store.get_watermark().await.unwrap(),
        Some(at("2024-06-01T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_bounded_scan_keeps_watermark() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;

    Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    catalog.add(photo("5", "e.jpg", "2023-03-10T08:00:00Z"));
    let bounded = IndexOptions {
        start_date: NaiveDate::from_ymd_opt(2023, 3, 1),
        end_date: NaiveDate::from_ymd_opt(2023, 3, 31),
        ..options()
    };
    let stats = Indexer::new(catalog, store.clone(), bounded).run().await.unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(
        store.get_watermark().await.unwrap(),
        Some(at("2023-01-03T10:00:00Z"))
    );
}

#[tokio::test]
async fn test_same_name_in_same_month_is_disambiguated() {
    let catalog = FakeCatalog::new(vec![
        photo("1", "IMG.jpg", "2023-01-01T10:00:00Z"),
        photo("2", "IMG.jpg", "2023-01-15T10:00:00Z"),
        photo("3", "IMG.jpg", "2023-01-20T10:00:00Z"),
        photo("4", "IMG.jpg", "2023-02-01T10:00:00Z"),
    ]);
    let store = test_store().await;

    Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    let first = store.find_by_id("1").await.unwrap().unwrap();
    let second = store.find_by_id("2").await.unwrap().unwrap();
    let third = store.find_by_id("3").await.unwrap().unwrap();
    let other_month = store.find_by_id("4").await.unwrap().unwrap();

    assert_eq!(first.filename, "IMG.jpg");
    assert_eq!(second.filename, "IMG (1).jpg");
    assert_eq!(third.filename, "IMG (2).jpg");
    assert!(first.duplicate_number < second.duplicate_number);
    assert!(second.duplicate_number < third.duplicate_number);
    assert_eq!(other_month.filename, "IMG.jpg");
    assert_eq!(other_month.relative_folder, "photos/2023/02");

    // Re-indexing keeps every item on its own path
    let rescan = IndexOptions {
        rescan: true,
        ..options()
    };
    let stats = Indexer::new(catalog, store.clone(), rescan).run().await.unwrap();
    assert_eq!(stats.inserted, 0);
    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_modified_item_is_refreshed() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;

    Indexer::new(catalog.clone(), store.clone(), options())
        .run()
        .await
        .unwrap();

    let mut edited = photo("3", "c.jpg", "2023-01-03T10:00:00Z");
    edited.modified_at = Some(at("2023-05-01T00:00:00Z"));
    edited.description = Some("edited".to_string());
    let catalog = FakeCatalog::new(vec![edited]);

    let stats = Indexer::new(catalog, store.clone(), options()).run().await.unwrap();

    assert_eq!(stats.updated, 1);
    let record = store.find_by_id("3").await.unwrap().unwrap();
    assert_eq!(record.description.as_deref(), Some("edited"));
    assert_eq!(record.created_at, at("2023-01-03T10:00:00Z"));
}

#[tokio::test]
async fn test_malformed_descriptor_is_skipped() {
    let mut broken = photo("2", "b.jpg", "2023-01-02T10:00:00Z");
    broken.created_at = None;
    let catalog = FakeCatalog::new(vec![photo("1", "a.jpg", "2023-01-01T10:00:00Z"), broken]);
    let store = test_store().await;

    let stats = Indexer::new(catalog, store.clone(), options()).run().await.unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.malformed, 1);
    assert!(store.find_by_id("2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_photos_only_scan_uses_search() {
    let catalog = FakeCatalog::new(vec![
        photo("1", "a.jpg", "2023-01-01T10:00:00Z"),
        video("2", "b.mp4", "2023-01-02T10:00:00Z"),
    ]);
    let store = test_store().await;

    let photos_only = IndexOptions {
        include_video: false,
        ..options()
    };
    let stats = Indexer::new(catalog.clone(), store.clone(), photos_only)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(catalog.list_calls(), 0);
    assert!(store.find_by_id("2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_index_stops_before_first_page() {
    let catalog = FakeCatalog::new(three_items());
    let store = test_store().await;
    let token = CancellationToken::new();
    token.cancel();

    let result = Indexer::new(catalog.clone(), store.clone(), options())
        .with_cancellation(token)
        .run()
        .await;

    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert_eq!(catalog.list_calls(), 0);
    assert_eq!(store.count().await.unwrap(), 0);
}

fn five_items() -> Vec<bridge_traits::RemoteMediaItem> {
    (1..=5)
        .map(|n| photo(&n.to_string(), &format!("{n}.jpg"), &format!("2023-01-0{n}T10:00:00Z")))
        .collect()
}

#[tokio::test]
async fn test_index_checkpoints_every_interval() {
    let catalog = FakeCatalog::new(five_items());
    let store = CheckpointingStore::new().await;
    let options = IndexOptions {
        checkpoint_interval: 2,
        ..options()
    };

    let stats = Indexer::new(catalog, store.clone(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 5);
    // After the 2nd and 4th insert, then once at the end
    assert_eq!(store.checkpoints(), vec![2, 4, 5]);
}

#[tokio::test]
async fn test_failed_page_keeps_checkpointed_records() {
    let catalog = FakeCatalog::new(five_items());
    catalog.fail_pages_from(Some(4));
    let store = CheckpointingStore::new().await;
    let options = IndexOptions {
        checkpoint_interval: 2,
        ..options()
    };

    let result = Indexer::new(catalog.clone(), store.clone(), options.clone())
        .run()
        .await;

    assert!(matches!(result, Err(SyncError::Catalog(_))));
    assert_eq!(store.checkpoints(), vec![2, 4]);
    assert_eq!(store.count().await.unwrap(), 4);
    assert_eq!(store.get_watermark().await.unwrap(), None);

    // A later run picks up the rest without duplicating what was kept
    catalog.fail_pages_from(None);
    let stats = Indexer::new(catalog, store.clone(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.unchanged, 4);
    assert_eq!(store.count().await.unwrap(), 5);
    assert_eq!(stats.watermark, Some(at("2023-01-05T10:00:00Z")));
}
