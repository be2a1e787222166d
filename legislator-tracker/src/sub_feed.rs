use std::fmt;

use serde::{Deserialize, Serialize};

const LEGISLATOR_FIELDS: &[&str] = &[
    "name",
    "chamber",
    "state_name",
    "twitter_id",
    "contact_form",
    "phone_number",
    "party",
];

const VOTE_FIELDS: &[&str] = &[
    "chamber",
    "congress",
    "voted_at",
    "voter_ids",
    "vote_type",
    "roll_type",
    "roll_id",
    "question",
    "bill_id",
    "nomination_id",
    "required",
    "result",
    "source",
    "url",
];

const BILL_FIELDS: &[&str] = &[
    "sponsor",
    "bill_id",
    "bill_type",
    "chamber",
    "committee_ids",
    "congress",
    "introduced_on",
    "last_action_at",
    "last_vote_at",
    "enacted_as",
    "law_type",
    "number",
    "last_action",
    "history",
    "official_title",
    "popular_title",
    "short_title",
    "urls",
    "keywords",
    "summary",
    "summary_short",
    "cosponsor_ids",
];

/// One category of activity pulled for the tracked legislator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubFeedType {
    Vote,
    SponsoredBill,
    CosponsoredBill,
}

impl SubFeedType {
    /// Processing order within a cycle.
    pub const ALL: [SubFeedType; 3] = [
        SubFeedType::Vote,
        SubFeedType::SponsoredBill,
        SubFeedType::CosponsoredBill,
    ];

    /// Name used for the event `type` tag and the record field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubFeedType::Vote => "vote",
            SubFeedType::SponsoredBill => "sponsored_bill",
            SubFeedType::CosponsoredBill => "cosponsored_bill",
        }
    }

    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            SubFeedType::Vote => &["voted_at", "roll_id"],
            SubFeedType::SponsoredBill | SubFeedType::CosponsoredBill => &["last_action_at", "bill_id"],
        }
    }

    pub fn query(&self, legislator_bioguide_id: &str) -> FeedQuery {
        match self {
            SubFeedType::Vote => FeedQuery {
                resource: "votes",
                filter: (format!("voter_ids.{}__exists", legislator_bioguide_id), "true".to_string()),
                order: Some("voted_at"),
                fields: VOTE_FIELDS,
            },
            SubFeedType::SponsoredBill => FeedQuery {
                resource: "bills",
                filter: ("sponsor_id".to_string(), legislator_bioguide_id.to_string()),
                order: Some("last_action_at"),
                fields: BILL_FIELDS,
            },
            SubFeedType::CosponsoredBill => FeedQuery {
                resource: "bills",
                filter: ("cosponsor_ids__in".to_string(), legislator_bioguide_id.to_string()),
                order: Some("last_action_at"),
                fields: BILL_FIELDS,
            },
        }
    }
}

impl fmt::Display for SubFeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the feed client needs to issue one projected, paginated fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub resource: &'static str,
    pub filter: (String, String),
    pub order: Option<&'static str>,
    pub fields: &'static [&'static str],
}

impl FeedQuery {
    /// The subject lookup: no ordering, only the contact fields.
    pub fn legislator(legislator_bioguide_id: &str) -> Self {
        Self {
            resource: "legislators",
            filter: ("bioguide_id".to_string(), legislator_bioguide_id.to_string()),
            order: None,
            fields: LEGISLATOR_FIELDS,
        }
    }

    pub fn fields_param(&self) -> String {
        self.fields.join(",")
    }
}
