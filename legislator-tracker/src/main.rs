use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use chrono::Utc;
use clap::Parser;
use interfaces::StdoutSink;
use legislator_tracker::config::{DEFAULT_EXPECTED_UPDATE_PERIOD_DAYS, DEFAULT_SCHEDULE_MINUTES};
use legislator_tracker::memory::DEFAULT_CAPACITY;
use legislator_tracker::{DedupMemory, FetchConfig, Fetcher, LegislatorTracker, TrackerConfig, DEFAULT_API_URL};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Poll the Sunlight Congress API for a legislator's new votes and bills,
/// writing one JSON event per new record to stdout.
#[derive(Parser, Debug)]
#[command(name = "legislator-tracker", version)]
struct Args {
    /// Sunlight Foundation API key
    #[arg(long, env = "SUNLIGHT_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Bioguide id of the legislator to track
    #[arg(long, env = "LEGISLATOR_BIOGUIDE_ID", default_value = "")]
    legislator_bioguide_id: String,

    /// Days without a new event before the tracker reports itself stale
    #[arg(long, default_value_t = DEFAULT_EXPECTED_UPDATE_PERIOD_DAYS)]
    expected_update_period_in_days: u32,

    #[arg(long, default_value_t = DEFAULT_SCHEDULE_MINUTES)]
    schedule_minutes: u64,

    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Keep the dedup memory in this JSON file between runs
    #[arg(long)]
    memory_file: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn config(&self) -> TrackerConfig {
        TrackerConfig {
            api_key: self.api_key.clone(),
            legislator_bioguide_id: self.legislator_bioguide_id.clone(),
            expected_update_period_in_days: Some(self.expected_update_period_in_days),
            schedule_minutes: self.schedule_minutes,
            fetch: FetchConfig {
                api_url: self.api_url.clone(),
                ..FetchConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    info!("Tracking legislator {} every {} minutes", config.legislator_bioguide_id, config.schedule_minutes);

    let memory = match &args.memory_file {
        Some(path) => DedupMemory::load(path, DEFAULT_CAPACITY).await?,
        None => DedupMemory::default(),
    };
    let fetcher = Fetcher::new(config.fetch.clone(), config.api_key.clone())?;
    let mut tracker = LegislatorTracker::new(fetcher, config.legislator_bioguide_id.clone()).with_memory(memory);
    let mut sink = StdoutSink;

    let rest = config.watch();
    let poll_interval = Duration::from_millis(rest.wait_at_least_ms);
    let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
        current_interval: Duration::from_secs(60),
        initial_interval: Duration::from_secs(60),
        max_interval: poll_interval,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    };
    let started_at = Utc::now();

    loop {
        let outcome = tracker.check(&mut sink).await;

        if let Some(path) = &args.memory_file {
            if let Err(e) = tracker.memory().save(path).await {
                error!("Failed to save memory to {}: {}", path.display(), e);
            }
        }

        let wait = match outcome {
            Ok(count) => {
                backoff.reset();
                info!("Emitted {} events", count);
                poll_interval
            }
            Err(e) => {
                error!("Cycle failed: {}", e);
                if args.once {
                    return Err(e.into());
                }
                backoff.next_backoff().unwrap_or(poll_interval).min(poll_interval)
            }
        };

        let now = Utc::now();
        let period = config.expected_update_period();
        if now.signed_duration_since(started_at) > period && !tracker.is_working(period, now) {
            warn!(
                "No new events for {} in the last {} days",
                tracker.legislator_bioguide_id(),
                period.num_days()
            );
        }

        if args.once {
            return Ok(());
        }
        tokio::time::sleep(wait).await;
    }
}
