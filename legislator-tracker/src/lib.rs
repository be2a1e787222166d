pub mod types;
pub mod sub_feed;
pub mod traits;
pub mod fetcher;
pub mod normalizer;
pub mod memory;
pub mod config;
pub mod tracker;

pub use types::*;
pub use sub_feed::{FeedQuery, SubFeedType};
pub use traits::FeedClient;
pub use fetcher::Fetcher;
pub use memory::DedupMemory;
pub use config::TrackerConfig;
pub use tracker::{CycleReport, LegislatorTracker};
