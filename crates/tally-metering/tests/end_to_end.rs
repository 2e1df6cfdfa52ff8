//! Recording and reporting through a shared store

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tally_common::{HttpVerb, ManualClock, ReportOutcome, UserStamp, WindowCounts, DAY_MS};
use tally_metering::{
    InMemoryStore, JsonFileStore, MeteringService, MetricsStore, RecorderConfig,
};

const T0: i64 = 1_700_000_000_000;

fn service(store: Arc<dyn MetricsStore>, clock: Arc<ManualClock>) -> MeteringService {
    MeteringService::new(store, clock, RecorderConfig::default())
}

#[tokio::test]
async fn test_curl_requests_roll_up() {
    let clock = Arc::new(ManualClock::new(T0));
    let service = service(Arc::new(InMemoryStore::new()), clock.clone());

    service.record(HttpVerb::Get, "curl/7.0", None).await.unwrap();
    clock.set(T0 + 1_000);
    service.record(HttpVerb::Get, "curl/7.0", None).await.unwrap();
    clock.set(T0 + 2_000);

    let report = match service.generate().await.unwrap() {
        ReportOutcome::Report(report) => report,
        ReportOutcome::NotFound => panic!("expected a report"),
    };

    let all = WindowCounts {
        total: 2,
        last_day: 2,
        last_week: 2,
        last_month: 2,
    };
    assert_eq!(report.usage_by_user_agent.get.get("curl/7.0"), Some(&all));
    assert!(report.usage_by_user_agent.post.is_empty());
    assert_eq!(report.unique_users_by_window.get, WindowCounts::default());
    assert_eq!(report.unique_users_by_window.post, WindowCounts::default());
}

#[tokio::test]
async fn test_report_json_matches_wire_shape() {
    let clock = Arc::new(ManualClock::new(T0));
    let service = service(Arc::new(InMemoryStore::new()), clock.clone());

    service.record(HttpVerb::Post, "uploader/2.0", Some("alice")).await.unwrap();
    clock.advance(2 * DAY_MS);

    let report = service.generate().await.unwrap().into_report().unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["usageByUserAgent"]["post"]["uploader/2.0"]["lastDay"], 0);
    assert_eq!(json["usageByUserAgent"]["post"]["uploader/2.0"]["lastWeek"], 1);
    assert_eq!(json["uniqueUsersByWindow"]["post"]["total"], 1);
    assert_eq!(json["uniqueUsersByWindow"]["get"]["total"], 0);
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    let clock = Arc::new(ManualClock::new(T0));

    {
        let service = service(Arc::new(JsonFileStore::new(&path)), clock.clone());
        service.record(HttpVerb::Get, "curl/7.0", Some("alice")).await.unwrap();
    }

    clock.advance(1_000);
    let service = service(Arc::new(JsonFileStore::new(&path)), clock.clone());
    service.record(HttpVerb::Get, "curl/7.0", Some("alice")).await.unwrap();

    let doc = JsonFileStore::new(&path).load().await.unwrap().unwrap();
    assert_eq!(doc.agent(HttpVerb::Get, "curl/7.0").unwrap().timestamps, vec![T0, T0 + 1_000]);
    assert_eq!(doc.stamps(HttpVerb::Get), &[UserStamp::new("alice", T0 + 1_000)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_lose_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let service = Arc::new(service(store.clone(), clock));

    let tasks = (0..200).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let verb = if i % 2 == 0 { HttpVerb::Get } else { HttpVerb::Post };
            let agent = format!("agent-{}", i % 5);
            let user = format!("user-{}", i % 7);
            service.record(verb, &agent, Some(&user)).await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let doc = store.snapshot().unwrap();
    assert_eq!(doc.event_count(), 200);
    assert_eq!(store.save_count(), 200);
    assert_eq!(
        service.recorder().metrics().events_recorded.load(Ordering::Relaxed),
        200
    );
    for verb in HttpVerb::ALL {
        assert_eq!(doc.agents(verb).len(), 5);
        assert_eq!(doc.stamps(verb).len(), 7);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("metrics.json")));
    let clock = Arc::new(ManualClock::new(T0));
    let service = Arc::new(service(store.clone(), clock));

    let tasks = (0..50).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.record(HttpVerb::Get, "curl/7.0", None).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let doc = store.load().await.unwrap().unwrap();
    assert_eq!(doc.agent(HttpVerb::Get, "curl/7.0").unwrap().timestamps.len(), 50);
}
