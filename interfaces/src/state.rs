use std::io::Write;

use anyhow::Result;

use crate::defs::EmittedEvent;
use crate::defs::EventSink;

/// Keeps every emitted event in memory, oldest first.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Vec<EmittedEvent>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EmittedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for MemoryEventStore {
    fn emit(&mut self, event: EmittedEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

/// Writes each event as one JSON line on stdout.
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&mut self, event: EmittedEvent) -> Result<()> {
        let line = serde_json::to_string(&event)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}
