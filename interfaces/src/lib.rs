pub mod defs;
pub mod state;

pub use defs::{EmittedEvent, EventSink, LiveSourceSpec, WatchRest};
pub use state::{MemoryEventStore, StdoutSink};
