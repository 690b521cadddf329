//! Event recording and replay.
//!
//! A [`Recording`] stores decoded events so they can be saved as JSON and
//! later fed back through a [`StreamReader`], e.g. to reproduce a bug report
//! or to test a consumer without the device at hand.
//!
//! # Example
//!
//! ```no_run
//! use evstream::recorder::Recording;
//! use evstream::{FdSource, ReaderConfig, StreamReader};
//! use std::fs::File;
//! use std::os::fd::AsFd;
//!
//! let file = File::open("/dev/input/event0").unwrap();
//! let mut reader = StreamReader::new(FdSource::new(file.as_fd()));
//!
//! let mut recording = Recording::new().with_description("touchpad swipe");
//! recording.capture(&mut reader).unwrap();
//! recording.save("swipe.json").unwrap();
//!
//! // Replay later
//! let recording = Recording::load("swipe.json").unwrap();
//! let mut replay = recording.replay(ReaderConfig::default());
//! for event in replay.drain() {
//!     println!("{}", event.unwrap());
//! }
//! ```

use crate::error::{Error, Result};
use crate::event::InputEvent;
use crate::reader::{ReaderConfig, StreamReader};
use crate::record::{RawRecord, RecordLayout};
use crate::source::EventSource;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// A sequence of decoded events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Recorded events, in arrival order.
    pub events: Vec<InputEvent>,
    /// When the recording was created.
    pub created_at: SystemTime,
    /// Optional description.
    pub description: Option<String>,
}

impl Recording {
    /// Create a new empty recording.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            created_at: SystemTime::now(),
            description: None,
        }
    }

    /// Set a description for this recording.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Time between the first and the last event.
    pub fn duration(&self) -> Duration {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last
                .time()
                .as_duration()
                .saturating_sub(first.time().as_duration()),
            _ => Duration::ZERO,
        }
    }

    /// Get the number of events in this recording.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Append everything `reader` can deliver without blocking.
    ///
    /// Stops at the first error; events read before it are kept. Returns the
    /// number of events appended.
    pub fn capture<S: EventSource>(&mut self, reader: &mut StreamReader<S>) -> Result<usize> {
        let before = self.events.len();
        for event in reader.drain() {
            self.events.push(event?);
        }
        let added = self.events.len() - before;
        log::debug!("captured {added} events");
        Ok(added)
    }

    /// Encode the events as raw kernel records.
    pub fn to_bytes(&self, layout: RecordLayout) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.events.len() * layout.size());
        for event in &self.events {
            RawRecord::from(event).encode_into(layout, &mut out);
        }
        out
    }

    /// A reader that decodes this recording as if it came from a device.
    pub fn replay(&self, config: ReaderConfig) -> StreamReader<Cursor<Vec<u8>>> {
        StreamReader::with_config(Cursor::new(self.to_bytes(config.layout)), config)
    }

    /// Save the recording to a file (JSON format).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("failed to serialize recording: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a recording from a file (JSON format).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Serialization(format!("failed to deserialize recording: {e}")))
    }
}

impl Default for Recording {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TimeVal;
    use crate::registry::EventCode;

    fn sample() -> Recording {
        let mut recording = Recording::new().with_description("Test");
        recording.events = vec![
            InputEvent::new(EventCode::KEY_A, 1, TimeVal::new(10, 0)),
            InputEvent::sync_report(TimeVal::new(10, 0)),
            InputEvent::new(EventCode::KEY_A, 0, TimeVal::new(10, 250_000)),
            InputEvent::sync_report(TimeVal::new(10, 250_000)),
        ];
        recording
    }

    #[test]
    fn test_recording_new() {
        let recording = Recording::new();
        assert!(recording.events.is_empty());
        assert_eq!(recording.duration(), Duration::ZERO);
        assert_eq!(recording.event_count(), 0);
        assert_eq!(recording.description, None);
    }

    #[test]
    fn test_recording_duration() {
        assert_eq!(sample().duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_replay() {
        let recording = sample();
        assert_eq!(
            recording.to_bytes(RecordLayout::Time32).len(),
            4 * RecordLayout::Time32.size()
        );

        let mut reader = recording.replay(ReaderConfig::default());
        let events: Vec<InputEvent> = reader.drain().collect::<Result<_>>().unwrap();
        assert_eq!(events, recording.events);
        assert_eq!(reader.tracker().value_for(EventCode::KEY_A).unwrap(), 0);
    }

    #[test]
    fn test_capture() {
        let source = sample();
        let mut reader = source.replay(ReaderConfig::default());

        let mut recording = Recording::new();
        assert_eq!(recording.capture(&mut reader).unwrap(), 4);
        assert_eq!(recording.events, source.events);
        assert_eq!(recording.capture(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let recording = sample();

        let temp_path = std::env::temp_dir().join("evstream_test_recording.json");
        recording.save(&temp_path).unwrap();

        let loaded = Recording::load(&temp_path).unwrap();
        assert_eq!(loaded.description, recording.description);
        assert_eq!(loaded.events, recording.events);

        std::fs::remove_file(&temp_path).unwrap();
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp_path = std::env::temp_dir().join("evstream_test_garbage.json");
        std::fs::write(&temp_path, "{ not json").unwrap();
        assert!(matches!(
            Recording::load(&temp_path),
            Err(Error::Serialization(_))
        ));
        std::fs::remove_file(&temp_path).unwrap();

        assert!(matches!(
            Recording::load(std::env::temp_dir().join("evstream_missing.json")),
            Err(Error::Io(_))
        ));
    }
}
