//! Reshapes raw sub-feed records into the form events carry.
//!
//! Votes keep only the tracked legislator's own vote out of the per-voter
//! map. Bills have their nested sponsor object flattened into
//! `sponsor_*` fields. Every record is stamped with the legislator id.

use serde_json::{Map, Value};
use tracing::debug;

use crate::sub_feed::SubFeedType;
use crate::types::{NormalizedRecord, RawRecord, Result, TrackerError};

const VOTER_IDS: &str = "voter_ids";
const SPONSOR: &str = "sponsor";

pub fn normalize(kind: SubFeedType, mut raw: RawRecord, legislator_bioguide_id: &str) -> Result<NormalizedRecord> {
    raw.insert(
        "legislator_bioguide_id".to_string(),
        Value::String(legislator_bioguide_id.to_string()),
    );

    match kind {
        SubFeedType::Vote => extract_own_vote(&mut raw, legislator_bioguide_id)?,
        SubFeedType::SponsoredBill | SubFeedType::CosponsoredBill => flatten_sponsor(&mut raw),
    }

    let record = NormalizedRecord::new(raw);
    for field in kind.key_fields() {
        if record.get(field).map_or(true, Value::is_null) {
            return Err(TrackerError::malformed(kind, format!("missing identity field `{}`", field)));
        }
    }

    Ok(record)
}

pub fn normalize_all(kind: SubFeedType, raws: Vec<RawRecord>, legislator_bioguide_id: &str) -> Result<Vec<NormalizedRecord>> {
    raws.into_iter()
        .map(|raw| normalize(kind, raw, legislator_bioguide_id))
        .collect()
}

fn extract_own_vote(raw: &mut RawRecord, legislator_bioguide_id: &str) -> Result<()> {
    let voter_ids = match raw.remove(VOTER_IDS) {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Object(voter_ids)) => voter_ids,
        Some(other) => {
            return Err(TrackerError::malformed(
                SubFeedType::Vote,
                format!("`{}` is not an object: {}", VOTER_IDS, other),
            ))
        }
    };

    let vote = voter_ids.get(legislator_bioguide_id).cloned().ok_or_else(|| {
        TrackerError::malformed(
            SubFeedType::Vote,
            format!("`{}` has no entry for {}", VOTER_IDS, legislator_bioguide_id),
        )
    })?;

    debug!("Extracted vote {} for {} from {} voters", vote, legislator_bioguide_id, voter_ids.len());
    raw.insert("vote".to_string(), vote);
    Ok(())
}

fn flatten_sponsor(raw: &mut RawRecord) {
    let sponsor = match raw.remove(SPONSOR) {
        Some(Value::Object(sponsor)) => sponsor,
        // Nothing to flatten; keep whatever non-object value was there.
        Some(other) if !other.is_null() => {
            raw.insert(SPONSOR.to_string(), other);
            return;
        }
        _ => return,
    };

    let first_name = text(&sponsor, "first_name");
    let last_name = text(&sponsor, "last_name");
    let full_name = [first_name.as_deref(), last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    raw.insert("sponsor_name".to_string(), Value::String(full_name));
    raw.insert("sponsor_first_name".to_string(), first_name.map_or(Value::Null, Value::String));
    raw.insert("sponsor_last_name".to_string(), last_name.map_or(Value::Null, Value::String));
    raw.insert(
        "sponsor_bioguide_id".to_string(),
        sponsor.get("bioguide_id").cloned().unwrap_or(Value::Null),
    );
}

fn text(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_owned)
}
