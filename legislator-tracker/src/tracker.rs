use crate::memory::DedupMemory;
use crate::normalizer::normalize_all;
use crate::sub_feed::{FeedQuery, SubFeedType};
use crate::traits::FeedClient;
use crate::types::{Event, NormalizedRecord, Result, Subject, TrackerError};
use chrono::{DateTime, Duration, Utc};
use interfaces::{EmittedEvent, EventSink, LiveSourceSpec};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one polling cycle.
///
/// `events` holds everything found novel before the cycle ended, even when
/// it ended with `failure`: those records are already in memory and would
/// otherwise never be emitted.
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub subject: Option<Subject>,
    pub new_records: Vec<(SubFeedType, usize)>,
    pub events: Vec<Event>,
    pub failure: Option<TrackerError>,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed_ms: 0,
            subject: None,
            new_records: Vec::new(),
            events: Vec::new(),
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn new_count(&self, kind: SubFeedType) -> usize {
        self.new_records
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, count)| *count)
    }
}

/// Drives polling cycles for one legislator and owns that legislator's dedup
/// memory. Cycles take `&mut self`, so they can never overlap on one memory.
pub struct LegislatorTracker<C: FeedClient> {
    client: C,
    legislator_bioguide_id: String,
    source: LiveSourceSpec,
    memory: DedupMemory,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
}

impl<C: FeedClient> LegislatorTracker<C> {
    pub fn new(client: C, legislator_bioguide_id: impl Into<String>) -> Self {
        let legislator_bioguide_id = legislator_bioguide_id.into();
        let source = LiveSourceSpec {
            uri: format!("tag:sunlightfoundation.com,2014:legislator/{}", legislator_bioguide_id),
        };
        Self {
            client,
            legislator_bioguide_id,
            source,
            memory: DedupMemory::default(),
            last_success_at: None,
            last_failure_at: None,
            last_event_at: None,
        }
    }

    pub fn with_memory(mut self, memory: DedupMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn legislator_bioguide_id(&self) -> &str {
        &self.legislator_bioguide_id
    }

    pub fn memory(&self) -> &DedupMemory {
        &self.memory
    }

    pub async fn fetch_subject(&self) -> Result<Subject> {
        let results = self
            .client
            .fetch(&FeedQuery::legislator(&self.legislator_bioguide_id))
            .await?;
        let raw = results.first().ok_or_else(|| {
            TrackerError::upstream(None, format!("no legislator found for {}", self.legislator_bioguide_id))
        })?;
        Ok(Subject::from_raw(&self.legislator_bioguide_id, raw))
    }

    /// Fetches one sub-feed, normalizes the whole page, and keeps only the
    /// records memory has not seen. Survivors are recorded as seen.
    pub async fn fetch_new_records(&mut self, kind: SubFeedType) -> Result<Vec<NormalizedRecord>> {
        let raws = self
            .client
            .fetch(&kind.query(&self.legislator_bioguide_id))
            .await?;
        let fetched = raws.len();
        let records = normalize_all(kind, raws, &self.legislator_bioguide_id)?;
        let novel = self.memory.retain_novel(kind, records);

        debug!("{}: {} fetched, {} new", kind, fetched, novel.len());
        Ok(novel)
    }

    /// One full cycle: subject, then every sub-feed type in order. Stops at
    /// the first error.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let start_time = Instant::now();
        let mut report = CycleReport::new(Utc::now());

        match self.fetch_subject().await {
            Ok(subject) => {
                for kind in SubFeedType::ALL {
                    match self.fetch_new_records(kind).await {
                        Ok(records) => {
                            report.new_records.push((kind, records.len()));
                            report
                                .events
                                .extend(records.into_iter().map(|record| Event::new(&subject, kind, record)));
                        }
                        Err(e) => {
                            error!("Cycle for {} failed on {}: {}", self.legislator_bioguide_id, kind, e);
                            report.failure = Some(e);
                            break;
                        }
                    }
                }
                report.subject = Some(subject);
            }
            Err(e) => {
                error!("Failed to fetch legislator {}: {}", self.legislator_bioguide_id, e);
                report.failure = Some(e);
            }
        }

        report.elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        if report.is_success() {
            self.last_success_at = Some(report.started_at);
        } else {
            self.last_failure_at = Some(report.started_at);
        }

        info!(
            "Cycle for {} finished in {}ms: {} new events ({} votes, {} sponsored, {} cosponsored)",
            self.legislator_bioguide_id,
            report.elapsed_ms,
            report.events.len(),
            report.new_count(SubFeedType::Vote),
            report.new_count(SubFeedType::SponsoredBill),
            report.new_count(SubFeedType::CosponsoredBill),
        );
        report
    }

    /// Runs a cycle and hands each event to `sink` on its own. A sink
    /// failure is logged and skipped; only fetch outcomes decide the result.
    /// Returns how many events the sink accepted.
    pub async fn check<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<usize> {
        let report = self.run_cycle().await;

        let mut emitted = 0;
        for event in &report.events {
            let payload = match event.to_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Could not serialize {} event: {}", event.kind(), e);
                    continue;
                }
            };
            match sink.emit(EmittedEvent::new(&self.source, payload)) {
                Ok(()) => emitted += 1,
                Err(e) => warn!("Sink rejected {} event: {}", event.kind(), e),
            }
        }
        if emitted > 0 {
            self.last_event_at = Some(Utc::now());
        }

        match report.failure {
            Some(e) => Err(e),
            None => Ok(emitted),
        }
    }

    /// Healthy when an event went out within `expected_update_period` and no
    /// cycle has failed since the last successful one.
    pub fn is_working(&self, expected_update_period: Duration, now: DateTime<Utc>) -> bool {
        let recent_event = self
            .last_event_at
            .map_or(false, |at| now.signed_duration_since(at) <= expected_update_period);
        let failing = match (self.last_failure_at, self.last_success_at) {
            (Some(failure), Some(success)) => failure > success,
            (Some(_), None) => true,
            _ => false,
        };
        recent_event && !failing
    }
}
