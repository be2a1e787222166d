use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sub_feed::SubFeedType;

pub const DEFAULT_API_URL: &str = "https://congress.api.sunlightfoundation.com";

/// Records requested per call. Matches the dedup history capacity, so one
/// page of the freshest records fits the history exactly.
pub const PAGE_SIZE: usize = 5;

/// Untyped record exactly as the upstream `results` array returns it.
pub type RawRecord = Map<String, Value>;

/// Shared context for the tracked legislator, cloned into every event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subject {
    pub legislator_bioguide_id: String,
    pub name: Option<String>,
    pub chamber: Option<String>,
    pub state_name: Option<String>,
    pub twitter_id: Option<String>,
    pub contact_form: Option<String>,
    pub phone_number: Option<String>,
    pub party: Option<String>,
}

impl Subject {
    /// Builds the subject from a raw `legislators` result. The configured
    /// identifier always wins over whatever the record carries.
    pub fn from_raw(legislator_bioguide_id: &str, raw: &RawRecord) -> Self {
        let text = |field: &str| raw.get(field).and_then(Value::as_str).map(str::to_owned);
        Self {
            legislator_bioguide_id: legislator_bioguide_id.to_owned(),
            name: text("name"),
            chamber: text("chamber"),
            state_name: text("state_name"),
            twitter_id: text("twitter_id"),
            contact_form: text("contact_form"),
            phone_number: text("phone_number"),
            party: text("party"),
        }
    }
}

/// A raw record after type-specific reshaping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(Map<String, Value>);

impl NormalizedRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Values of `key_fields`, in order. Absent and null fields become `None`.
    pub fn composite_key(&self, key_fields: &[&str]) -> CompositeKey {
        CompositeKey(
            key_fields
                .iter()
                .map(|field| self.0.get(*field).filter(|value| !value.is_null()).cloned())
                .collect(),
        )
    }
}

/// Ordered identity-key values of one record within its sub-feed type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKey(Vec<Option<Value>>);

impl CompositeKey {
    /// Exact match on every component. A missing component never matches,
    /// not even another missing one.
    pub fn matches(&self, other: &CompositeKey) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(ours, theirs)| matches!((ours, theirs), (Some(a), Some(b)) if a == b))
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }
}

/// The sub-feed record an event carries, tagged with its type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activity {
    Vote { vote: NormalizedRecord },
    SponsoredBill { sponsored_bill: NormalizedRecord },
    CosponsoredBill { cosponsored_bill: NormalizedRecord },
}

impl Activity {
    pub fn new(kind: SubFeedType, record: NormalizedRecord) -> Self {
        match kind {
            SubFeedType::Vote => Activity::Vote { vote: record },
            SubFeedType::SponsoredBill => Activity::SponsoredBill { sponsored_bill: record },
            SubFeedType::CosponsoredBill => Activity::CosponsoredBill { cosponsored_bill: record },
        }
    }

    pub fn kind(&self) -> SubFeedType {
        match self {
            Activity::Vote { .. } => SubFeedType::Vote,
            Activity::SponsoredBill { .. } => SubFeedType::SponsoredBill,
            Activity::CosponsoredBill { .. } => SubFeedType::CosponsoredBill,
        }
    }

    pub fn record(&self) -> &NormalizedRecord {
        match self {
            Activity::Vote { vote } => vote,
            Activity::SponsoredBill { sponsored_bill } => sponsored_bill,
            Activity::CosponsoredBill { cosponsored_bill } => cosponsored_bill,
        }
    }
}

/// One novel record merged with its own copy of the subject.
///
/// Serializes flat: the subject fields, one of `vote`, `sponsored_bill` or
/// `cosponsored_bill`, and a `type` tag naming which.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(flatten)]
    pub subject: Subject,
    #[serde(flatten)]
    pub activity: Activity,
}

impl Event {
    pub fn new(subject: &Subject, kind: SubFeedType, record: NormalizedRecord) -> Self {
        Self {
            subject: subject.clone(),
            activity: Activity::new(kind, record),
        }
    }

    pub fn kind(&self) -> SubFeedType {
        self.activity.kind()
    }

    pub fn record(&self) -> &NormalizedRecord {
        self.activity.record()
    }

    pub fn to_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: "legislator-tracker/0.1".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Upstream error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },

    #[error("Malformed {kind} record: {reason}")]
    MalformedRecord { kind: SubFeedType, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {}", .0.join(" "))]
    Config(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        TrackerError::Upstream { status, message: message.into() }
    }

    pub fn malformed(kind: SubFeedType, reason: impl Into<String>) -> Self {
        TrackerError::MalformedRecord { kind, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
