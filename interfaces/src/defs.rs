use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct LiveSourceSpec {
    pub uri: String,
}

pub struct WatchRest {
    pub wait_at_least_ms: u64,
}

/// A payload accepted by the host, stamped with its own id and creation time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub id: Uuid,
    pub live_source_uri: String,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl EmittedEvent {
    pub fn new(source: &LiveSourceSpec, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            live_source_uri: source.uri.clone(),
            created_at: Utc::now(),
            payload,
        }
    }
}

// Object style note:
// A sink is handed events one at a time. Whether one emit fails says nothing
// about the others, so callers log failures and keep going.
pub trait EventSink {
    fn emit(&mut self, event: EmittedEvent) -> anyhow::Result<()>;
}
