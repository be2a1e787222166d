use async_trait::async_trait;
use chrono::{Duration, Utc};
use interfaces::{EmittedEvent, EventSink, MemoryEventStore};
use legislator_tracker::{
    DedupMemory, FeedClient, FeedQuery, LegislatorTracker, RawRecord, Result, SubFeedType, TrackerError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned pages keyed by the query's filter parameter, and records
/// every query it was asked for.
#[derive(Default)]
struct MockFeedClient {
    pages: Mutex<HashMap<String, Vec<RawRecord>>>,
    failures: Mutex<HashMap<String, u16>>,
    calls: Mutex<Vec<String>>,
}

impl MockFeedClient {
    fn filter_key(query: &FeedQuery) -> String {
        format!("{}:{}", query.resource, query.filter.0)
    }

    fn serve(&self, resource: &str, filter: &str, records: Vec<Value>) {
        let records = records
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => map,
                other => panic!("expected object, got {other}"),
            })
            .collect();
        self.pages
            .lock()
            .unwrap()
            .insert(format!("{}:{}", resource, filter), records);
    }

    fn fail(&self, resource: &str, filter: &str, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .insert(format!("{}:{}", resource, filter), status);
    }

    fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedClient for MockFeedClient {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawRecord>> {
        let key = Self::filter_key(query);
        self.calls.lock().unwrap().push(key.clone());
        if let Some(status) = self.failures.lock().unwrap().get(&key) {
            return Err(TrackerError::upstream(Some(*status), "injected failure"));
        }
        Ok(self.pages.lock().unwrap().get(&key).cloned().unwrap_or_default())
    }
}

fn legislator() -> Value {
    json!({
        "legislator_bioguide_id": "G000555",
        "name": "Charles Schumer",
        "chamber": "Senate",
        "state_name": "New York",
        "twitter_id": "ChuckSchumer",
        "contact_form": "http://www.schumer.senate.gov/Contact/contact_chuck.cfm",
        "phone_number": "202-224-6542",
        "party": "D"
    })
}

fn vote(roll_id: &str) -> Value {
    json!({
        "chamber": "house",
        "congress": "113",
        "voter_ids": { "wxyz": "yea", "G000555": "yea", "b12345": "nay" },
        "voted_at": "2014-04-07T21:32:00Z",
        "vote_type": "passage",
        "roll_type": "On Passage of the Bill",
        "roll_id": roll_id,
        "question": "On the Motion for Attendance PN1182",
        "bill_id": "hr3979-113",
        "required": "1/2",
        "result": "Bill Passed"
    })
}

fn bill(bill_id: &str, last_action_at: &str) -> Value {
    json!({
        "sponsor": { "first_name": "Amy", "last_name": "Klobuchar", "bioguide_id": "K000367" },
        "bill_id": bill_id,
        "bill_type": "s",
        "chamber": "senate",
        "committee_ids": ["SSHR", "SSFI"],
        "congress": "113",
        "introduced_on": "2014-03-27",
        "last_action_at": last_action_at,
        "short_title": "National STEM Education Tax Incentive for Teachers Act of 2014",
        "cosponsor_ids": ["G000362"]
    })
}

fn scenario_client() -> std::sync::Arc<MockFeedClient> {
    let client = std::sync::Arc::new(MockFeedClient::default());
    client.serve("legislators", "bioguide_id", vec![legislator()]);
    client.serve("votes", "voter_ids.wxyz__exists", vec![vote("s107-2014")]);
    client.serve("bills", "sponsor_id", vec![bill("hr3979-113", "2014-03-27")]);
    client.serve("bills", "cosponsor_ids__in", vec![bill("hr3979-113", "2014-03-27")]);
    client
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

const SUBJECT_FIELDS: [&str; 8] = [
    "legislator_bioguide_id",
    "name",
    "chamber",
    "state_name",
    "twitter_id",
    "contact_form",
    "phone_number",
    "party",
];

#[tokio::test]
async fn first_cycle_emits_one_event_per_record() -> Result<()> {
    init_tracing();
    let mut tracker = LegislatorTracker::new(scenario_client(), "wxyz");
    let mut store = MemoryEventStore::new();

    let emitted = tracker.check(&mut store).await?;
    assert_eq!(emitted, 3);

    let payloads: Vec<&Value> = store.events().iter().map(|event| &event.payload).collect();
    let types: Vec<&str> = payloads.iter().map(|p| p["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["vote", "sponsored_bill", "cosponsored_bill"]);

    let vote_event = payloads[0];
    assert_eq!(vote_event["vote"]["vote"], "yea");
    assert!(vote_event["vote"].get("voter_ids").is_none());
    assert!(vote_event.get("sponsored_bill").is_none());
    assert!(vote_event.get("cosponsored_bill").is_none());

    for payload in &payloads {
        assert_eq!(payload["legislator_bioguide_id"], "wxyz");
        assert_eq!(payload["twitter_id"], "ChuckSchumer");
    }

    let sponsored = &payloads[1]["sponsored_bill"];
    assert_eq!(sponsored["sponsor_name"], "Amy Klobuchar");
    assert_eq!(sponsored["legislator_bioguide_id"], "wxyz");
    assert!(sponsored.get("sponsor").is_none());

    Ok(())
}

#[tokio::test]
async fn events_carry_subject_and_exactly_one_record() -> Result<()> {
    init_tracing();
    let mut tracker = LegislatorTracker::new(scenario_client(), "wxyz");
    let report = tracker.run_cycle().await;
    assert!(report.is_success());

    let subject = report.subject.clone().expect("subject fetched");
    assert_eq!(subject.name.as_deref(), Some("Charles Schumer"));

    for event in &report.events {
        assert_eq!(event.subject, subject);

        let payload = event.to_payload()?;
        let object = payload.as_object().unwrap();
        for field in SUBJECT_FIELDS {
            assert!(object.contains_key(field), "missing {field}");
        }
        let record_fields: Vec<&str> = ["vote", "sponsored_bill", "cosponsored_bill"]
            .into_iter()
            .filter(|field| object.get(*field).map_or(false, |v| !v.is_null()))
            .collect();
        assert_eq!(record_fields, vec![event.kind().as_str()]);
        assert_eq!(payload["type"], event.kind().as_str());
    }
    Ok(())
}

#[tokio::test]
async fn repeated_cycle_emits_nothing() -> Result<()> {
    init_tracing();
    let mut tracker = LegislatorTracker::new(scenario_client(), "wxyz");
    let mut store = MemoryEventStore::new();

    assert_eq!(tracker.check(&mut store).await?, 3);
    assert_eq!(tracker.check(&mut store).await?, 0);
    assert_eq!(store.len(), 3);
    Ok(())
}

#[tokio::test]
async fn cycle_queries_subject_then_feeds_in_order() -> Result<()> {
    let client = scenario_client();
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");

    tracker.run_cycle().await;
    assert_eq!(
        client.calls(),
        vec![
            "legislators:bioguide_id",
            "votes:voter_ids.wxyz__exists",
            "bills:sponsor_id",
            "bills:cosponsor_ids__in",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn only_new_records_are_emitted_later() -> Result<()> {
    let client = scenario_client();
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");
    let mut store = MemoryEventStore::new();
    tracker.check(&mut store).await?;

    // Newest first, as the API orders them.
    client.serve(
        "bills",
        "sponsor_id",
        vec![bill("hr3979-113", "2014-04-02"), bill("hr3979-113", "2014-03-27")],
    );
    let report = tracker.run_cycle().await;

    assert_eq!(report.events.len(), 1);
    assert_eq!(report.new_count(SubFeedType::SponsoredBill), 1);
    assert_eq!(report.events[0].record().get_str("last_action_at"), Some("2014-04-02"));
    Ok(())
}

#[tokio::test]
async fn memory_stays_bounded_across_cycles() -> Result<()> {
    let client = scenario_client();
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");

    for cycle in 0..4 {
        let votes = (0..5).map(|i| vote(&format!("h{}-2014", cycle * 5 + i))).collect();
        client.serve("votes", "voter_ids.wxyz__exists", votes);
        let report = tracker.run_cycle().await;
        assert_eq!(report.new_count(SubFeedType::Vote), 5);
        assert!(tracker.memory().len(SubFeedType::Vote) <= tracker.memory().capacity());
    }
    Ok(())
}

#[tokio::test]
async fn rolling_window_emits_one_new_record_per_cycle() -> Result<()> {
    init_tracing();
    let client = scenario_client();
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");

    // The API returns the five most recent votes, newest first.
    let window = |newest: usize| -> Vec<Value> {
        (newest - 4..=newest).rev().map(|i| vote(&format!("h{i}-2014"))).collect()
    };

    client.serve("votes", "voter_ids.wxyz__exists", window(5));
    assert_eq!(tracker.run_cycle().await.new_count(SubFeedType::Vote), 5);

    for newest in 6..=12 {
        client.serve("votes", "voter_ids.wxyz__exists", window(newest));
        let report = tracker.run_cycle().await;

        assert!(report.is_success());
        assert_eq!(report.new_count(SubFeedType::Vote), 1);
        let expected = format!("h{newest}-2014");
        let votes: Vec<_> = report
            .events
            .iter()
            .filter(|event| event.kind() == SubFeedType::Vote)
            .filter_map(|event| event.record().get_str("roll_id"))
            .collect();
        assert_eq!(votes, vec![expected.as_str()]);
    }
    Ok(())
}

#[tokio::test]
async fn subject_failure_aborts_the_whole_cycle() -> Result<()> {
    let client = scenario_client();
    client.fail("legislators", "bioguide_id", 500);
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");
    let mut store = MemoryEventStore::new();

    let err = tracker.check(&mut store).await.unwrap_err();
    assert!(matches!(err, TrackerError::Upstream { status: Some(500), .. }));
    assert_eq!(client.calls(), vec!["legislators:bioguide_id"]);
    assert!(store.is_empty());
    assert!(tracker.memory().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_legislator_is_upstream_error() -> Result<()> {
    let client = std::sync::Arc::new(MockFeedClient::default());
    let mut tracker = LegislatorTracker::new(client, "nobody");

    let report = tracker.run_cycle().await;
    assert!(matches!(report.failure, Some(TrackerError::Upstream { status: None, .. })));
    assert!(report.subject.is_none());
    Ok(())
}

#[tokio::test]
async fn feed_failure_keeps_what_was_already_found() -> Result<()> {
    let client = scenario_client();
    client.fail("bills", "sponsor_id", 502);
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");
    let mut store = MemoryEventStore::new();

    let err = tracker.check(&mut store).await.unwrap_err();
    assert!(matches!(err, TrackerError::Upstream { status: Some(502), .. }));

    // The vote was recorded as seen before the failure, so it goes out now.
    assert_eq!(store.len(), 1);
    assert_eq!(store.events()[0].payload["type"], "vote");
    assert!(!client.calls().contains(&"bills:cosponsor_ids__in".to_string()));

    client.heal();
    assert_eq!(tracker.check(&mut store).await?, 2);
    Ok(())
}

#[tokio::test]
async fn malformed_record_fails_its_feed_without_recording_it() -> Result<()> {
    let client = scenario_client();
    client.serve(
        "votes",
        "voter_ids.wxyz__exists",
        vec![vote("s107-2014"), json!({ "roll_id": "s108-2014" })],
    );
    let mut tracker = LegislatorTracker::new(client, "wxyz");

    let report = tracker.run_cycle().await;
    assert!(matches!(
        report.failure,
        Some(TrackerError::MalformedRecord { kind: SubFeedType::Vote, .. })
    ));
    assert!(report.events.is_empty());
    assert_eq!(tracker.memory().len(SubFeedType::Vote), 0);
    Ok(())
}

struct FlakySink {
    accepted: Vec<EmittedEvent>,
    calls: usize,
}

impl EventSink for FlakySink {
    fn emit(&mut self, event: EmittedEvent) -> anyhow::Result<()> {
        self.calls += 1;
        if self.calls == 1 {
            anyhow::bail!("sink unavailable");
        }
        self.accepted.push(event);
        Ok(())
    }
}

#[tokio::test]
async fn sink_failure_does_not_fail_the_cycle() -> Result<()> {
    let mut tracker = LegislatorTracker::new(scenario_client(), "wxyz");
    let mut sink = FlakySink { accepted: Vec::new(), calls: 0 };

    assert_eq!(tracker.check(&mut sink).await?, 2);
    assert_eq!(sink.calls, 3);
    assert_eq!(sink.accepted[0].payload["type"], "sponsored_bill");
    Ok(())
}

#[tokio::test]
async fn restored_memory_suppresses_known_records() -> Result<()> {
    let mut first = LegislatorTracker::new(scenario_client(), "wxyz");
    first.run_cycle().await;
    let snapshot: DedupMemory = serde_json::from_str(&serde_json::to_string(first.memory())?)?;

    let mut second = LegislatorTracker::new(scenario_client(), "wxyz").with_memory(snapshot);
    let report = second.run_cycle().await;
    assert!(report.is_success());
    assert!(report.events.is_empty());
    Ok(())
}

#[tokio::test]
async fn health_tracks_recent_events_and_failures() -> Result<()> {
    let client = scenario_client();
    let mut tracker = LegislatorTracker::new(client.clone(), "wxyz");
    let mut store = MemoryEventStore::new();
    let period = Duration::days(2);

    assert!(!tracker.is_working(period, Utc::now()));

    tracker.check(&mut store).await?;
    assert!(tracker.is_working(period, Utc::now()));
    assert!(!tracker.is_working(period, Utc::now() + Duration::days(3)));

    client.fail("votes", "voter_ids.wxyz__exists", 500);
    assert!(tracker.check(&mut store).await.is_err());
    assert!(!tracker.is_working(period, Utc::now()));

    client.heal();
    tracker.check(&mut store).await?;
    assert!(tracker.is_working(period, Utc::now()));
    Ok(())
}
