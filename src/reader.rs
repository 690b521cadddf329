//! Pull-based decoding of raw records into [`InputEvent`]s.
//!
//! A [`StreamReader`] owns one byte source and the [`DeviceTracker`] of the
//! device behind it. Each successful read decodes one record, applies it to
//! the tracker, and hands it back. Nothing is buffered or reordered.
//!
//! # State machine
//!
//! ```text
//! Idle --next_event--> Reading --SYN_DROPPED--> Overflowed --resync--> Reading
//! ```
//!
//! While overflowed, reads keep returning events, but the tracker stays
//! [`SyncState::Dropped`] until the caller supplies fresh device state through
//! [`StreamReader::resync`].

use crate::error::{Error, Result};
use crate::event::{InputEvent, TimeVal};
use crate::record::{RawRecord, RecordLayout};
use crate::registry::{code_for_raw, type_for_raw};
use crate::source::EventSource;
use crate::state::{DeviceTracker, Snapshot, SyncState};
use std::io::ErrorKind;
use std::iter::FusedIterator;

/// Lifecycle of a [`StreamReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReaderState {
    /// Nothing has been read yet.
    #[default]
    Idle,
    /// Events are being read.
    Reading,
    /// The kernel dropped events; waiting for a resync.
    Overflowed,
}

/// Result of a single [`StreamReader::next_event`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A decoded event.
    Event(InputEvent),
    /// A non-blocking read found no data.
    NoEventAvailable,
    /// The kernel's buffer overflowed and events were lost.
    Overflow,
}

impl ReadOutcome {
    /// The decoded event, if any.
    pub fn event(self) -> Option<InputEvent> {
        match self {
            ReadOutcome::Event(event) => Some(event),
            _ => None,
        }
    }
}

/// Reader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Fail on records with an unknown type or out-of-range code instead of
    /// skipping them.
    pub strict: bool,
    /// Binary layout of the records delivered by the source.
    pub layout: RecordLayout,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            strict: true,
            layout: RecordLayout::native(),
        }
    }
}

impl ReaderConfig {
    /// Create the default configuration: strict, native layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict decoding.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the record layout.
    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Decodes events from a byte source and tracks the device state they imply.
///
/// The reader never opens or closes the source. Drop the reader, or take the
/// source back with [`into_source`](Self::into_source), then close it.
#[derive(Debug)]
pub struct StreamReader<S> {
    source: S,
    tracker: DeviceTracker,
    config: ReaderConfig,
    state: ReaderState,
    buf: Vec<u8>,
    // Bytes of the next record already read into `buf`.
    filled: usize,
}

impl<S: EventSource> StreamReader<S> {
    /// Create a reader with the default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    /// Create a reader with a custom configuration.
    pub fn with_config(source: S, config: ReaderConfig) -> Self {
        Self::with_tracker(source, DeviceTracker::new(), config)
    }

    /// Create a reader around a pre-configured tracker, e.g. one with
    /// multitouch slots or axis ranges registered.
    pub fn with_tracker(source: S, tracker: DeviceTracker, config: ReaderConfig) -> Self {
        Self {
            source,
            tracker,
            config,
            state: ReaderState::Idle,
            buf: vec![0; config.layout.size()],
            filled: 0,
        }
    }

    /// Read one record.
    ///
    /// With `blocking == false` a source without a complete record yields
    /// [`ReadOutcome::NoEventAvailable`]; bytes of a partially delivered
    /// record are kept for the next call. With `blocking == true` the call
    /// waits until a whole record has arrived.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedRecord`] for a record cut short by end of file, or
    ///   for an unknown type or code in strict mode. In the latter case the
    ///   registry error is kept as the source. The reader stays usable.
    /// - [`Error::Closed`] when a blocking read hits end of file.
    /// - [`Error::Io`] when the source fails.
    pub fn next_event(&mut self, blocking: bool) -> Result<ReadOutcome> {
        match self.read_event(blocking)? {
            Some(event) if event.is_dropped() => Ok(ReadOutcome::Overflow),
            Some(event) => Ok(ReadOutcome::Event(event)),
            None => Ok(ReadOutcome::NoEventAvailable),
        }
    }

    /// Read everything currently available without blocking.
    ///
    /// The iterator ends when the source runs dry, and right after yielding
    /// a `SYN_DROPPED` event so the caller can resync. Calling `drain` again
    /// picks up whatever arrived since.
    pub fn drain(&mut self) -> Drain<'_, S> {
        Drain {
            reader: self,
            done: false,
        }
    }

    /// Replace the tracked state with `snapshot`, leaving the overflowed state.
    ///
    /// Returns the events that take the previously tracked state to the
    /// snapshot, stamped with the current time and closed by a `SYN_REPORT`.
    /// The list is empty when nothing changed.
    pub fn resync(&mut self, snapshot: Snapshot) -> Vec<InputEvent> {
        let time = TimeVal::now();
        let mut events: Vec<InputEvent> = self
            .tracker
            .diff(&snapshot)
            .into_iter()
            .map(|(code, value)| InputEvent::new(code, value, time))
            .collect();
        if !events.is_empty() {
            events.push(InputEvent::sync_report(time));
        }

        self.tracker.resync(snapshot);
        if self.state == ReaderState::Overflowed {
            log::debug!("reader resynced, {} changes", events.len().saturating_sub(1));
            self.state = ReaderState::Reading;
        }
        events
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Synchronization state of the tracked device.
    pub fn sync_state(&self) -> SyncState {
        self.tracker.sync_state()
    }

    /// The device state tracker.
    pub fn tracker(&self) -> &DeviceTracker {
        &self.tracker
    }

    /// The reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The byte source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the byte source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader and return the byte source.
    pub fn into_source(self) -> S {
        self.source
    }

    fn read_event(&mut self, blocking: bool) -> Result<Option<InputEvent>> {
        if self.state == ReaderState::Idle {
            log::debug!("reader started");
            self.state = ReaderState::Reading;
        }

        loop {
            if !self.fill(blocking)? {
                return Ok(None);
            }

            let raw = RawRecord::decode(&self.buf, self.config.layout)?;
            let event = match decode(&raw) {
                Ok(event) => event,
                Err(e) if self.config.strict => return Err(Error::undecodable(e)),
                Err(e) => {
                    log::warn!("skipping record: {e}");
                    continue;
                }
            };

            self.tracker.apply(&event);
            if event.is_dropped() {
                log::warn!("kernel event buffer overflowed, events were lost");
                self.state = ReaderState::Overflowed;
            } else {
                log::trace!("{event}");
            }
            return Ok(Some(event));
        }
    }

    /// Complete the record in `buf`. Returns `false` when the source has no
    /// more bytes for now; the partial record stays buffered.
    fn fill(&mut self, blocking: bool) -> Result<bool> {
        while self.filled < self.buf.len() {
            let n = match self.source.read_bytes(&mut self.buf[self.filled..], blocking) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                let partial = std::mem::take(&mut self.filled);
                if partial > 0 {
                    return Err(Error::malformed(format!(
                        "record cut short at end of file: {partial} of {} bytes",
                        self.buf.len()
                    )));
                }
                if blocking {
                    log::debug!("event source reached end of file");
                    return Err(Error::Closed);
                }
                return Ok(false);
            }
            self.filled += n;
        }
        self.filled = 0;
        Ok(true)
    }
}

fn decode(raw: &RawRecord) -> Result<InputEvent> {
    let ty = type_for_raw(raw.ty)?;
    let code = code_for_raw(ty, raw.code)?;
    Ok(InputEvent::new(code, raw.value, raw.time()))
}

/// Iterator returned by [`StreamReader::drain`].
#[derive(Debug)]
pub struct Drain<'a, S> {
    reader: &'a mut StreamReader<S>,
    done: bool,
}

impl<S: EventSource> Iterator for Drain<'_, S> {
    type Item = Result<InputEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_event(false) {
            Ok(Some(event)) => {
                self.done = event.is_dropped();
                Some(Ok(event))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            // A bad record only spoils itself.
            Err(e @ Error::MalformedRecord { .. }) => Some(Err(e)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: EventSource> FusedIterator for Drain<'_, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EventCode, EventType};
    use std::collections::VecDeque;
    use std::io::{self, Cursor, Read};

    fn record(ty: u16, code: u16, value: i32) -> Vec<u8> {
        RawRecord {
            sec: 100,
            usec: 42,
            ty,
            code,
            value,
        }
        .encode(RecordLayout::native())
    }

    fn stream(records: &[(u16, u16, i32)]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|&(ty, code, value)| record(ty, code, value))
            .collect()
    }

    /// A live device: reports `WouldBlock` when empty and accepts more data.
    #[derive(Default)]
    struct Feed {
        pending: VecDeque<u8>,
    }

    impl Feed {
        fn push(&mut self, records: &[(u16, u16, i32)]) {
            self.pending.extend(stream(records));
        }

        fn push_bytes(&mut self, bytes: &[u8]) {
            self.pending.extend(bytes);
        }
    }

    impl EventSource for Feed {
        fn read_bytes(&mut self, buf: &mut [u8], _blocking: bool) -> io::Result<usize> {
            if self.pending.is_empty() {
                return Err(ErrorKind::WouldBlock.into());
            }
            self.pending.read(buf)
        }
    }

    const KEY: u16 = 0x01;
    const SYN: u16 = 0x00;
    const KEY_A: u16 = 30;
    const KEY_B: u16 = 48;
    const SYN_REPORT: u16 = 0;
    const SYN_DROPPED: u16 = 3;

    #[test]
    fn test_press_and_release() {
        let data = stream(&[(KEY, KEY_A, 1), (SYN, SYN_REPORT, 0), (KEY, KEY_A, 0)]);
        let mut reader = StreamReader::new(Cursor::new(data));
        assert_eq!(reader.state(), ReaderState::Idle);

        let first = reader.next_event(false).unwrap().event().unwrap();
        assert_eq!(reader.state(), ReaderState::Reading);
        assert!(first.matches(EventCode::KEY_A));
        assert_eq!(first.value(), 1);
        assert_eq!(first.time(), TimeVal::new(100, 42));

        let sync = reader.next_event(false).unwrap().event().unwrap();
        assert!(sync.is_sync_report());
        assert_eq!(reader.sync_state(), SyncState::SynReport);

        let release = reader.next_event(false).unwrap().event().unwrap();
        assert_eq!(release.value(), 0);
        assert_eq!(reader.tracker().value_for(EventCode::KEY_A).unwrap(), 0);
        assert_eq!(reader.sync_state(), SyncState::Normal);

        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);
    }

    #[test]
    fn test_overflow_until_resync() {
        let mut feed = Feed::default();
        feed.push(&[
            (KEY, KEY_A, 1),
            (SYN, SYN_DROPPED, 0),
            (KEY, KEY_B, 1),
            (SYN, SYN_REPORT, 0),
        ]);
        let mut reader = StreamReader::new(feed);

        assert!(matches!(reader.next_event(false), Ok(ReadOutcome::Event(_))));
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::Overflow);
        assert_eq!(reader.state(), ReaderState::Overflowed);
        assert_eq!(reader.sync_state(), SyncState::Dropped);

        // Events keep flowing, the dropped state stays.
        let key = reader.next_event(false).unwrap().event().unwrap();
        assert!(key.matches(EventCode::KEY_B));
        assert!(reader.next_event(false).unwrap().event().unwrap().is_sync_report());
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);
        assert_eq!(reader.state(), ReaderState::Overflowed);
        assert_eq!(reader.sync_state(), SyncState::Dropped);

        let snapshot = Snapshot::from([(EventCode::KEY_A, 0), (EventCode::KEY_B, 1)]);
        let events = reader.resync(snapshot.clone());
        assert_eq!(events.len(), 2);
        assert!(events[0].matches(EventCode::KEY_A));
        assert_eq!(events[0].value(), 0);
        assert!(events[1].is_sync_report());

        assert_eq!(reader.state(), ReaderState::Reading);
        assert_eq!(reader.sync_state(), SyncState::Normal);
        for (code, value) in &snapshot {
            assert_eq!(reader.tracker().value_for(*code).unwrap(), *value);
        }
    }

    #[test]
    fn test_resync_without_changes() {
        let mut reader = StreamReader::new(Cursor::new(Vec::new()));
        assert!(reader.resync(Snapshot::new()).is_empty());
        assert_eq!(reader.state(), ReaderState::Idle);
    }

    #[test]
    fn test_resync_with_tracked_state_only_clears_overflow() {
        let data = stream(&[(KEY, KEY_A, 1), (SYN, SYN_DROPPED, 0)]);
        let mut reader = StreamReader::new(Cursor::new(data));
        assert_eq!(reader.drain().count(), 2);
        assert_eq!(reader.state(), ReaderState::Overflowed);

        let snapshot = reader.tracker().snapshot();
        assert!(reader.resync(snapshot).is_empty());
        assert_eq!(reader.state(), ReaderState::Reading);
        assert_eq!(reader.sync_state(), SyncState::Normal);
        assert_eq!(reader.tracker().value_for(EventCode::KEY_A).unwrap(), 1);
    }

    #[test]
    fn test_strict_rejects_unknown_type() {
        let data = stream(&[(0x09, 0, 1), (KEY, 0x300, 1), (KEY, KEY_A, 1)]);
        let mut reader = StreamReader::new(Cursor::new(data));

        assert!(matches!(
            reader.next_event(false),
            Err(Error::MalformedRecord { source: Some(cause), .. })
                if matches!(*cause, Error::UnknownType(0x09))
        ));
        assert!(matches!(
            reader.next_event(false),
            Err(Error::MalformedRecord { source: Some(cause), .. })
                if matches!(*cause, Error::UnknownCode { ty: EventType::Key, code: 0x300 })
        ));
        // The reader survives a bad record.
        let event = reader.next_event(false).unwrap().event().unwrap();
        assert!(event.matches(EventCode::KEY_A));
        assert_eq!(reader.tracker().len(), 1);
    }

    #[test]
    fn test_lenient_skips_unknown() {
        let data = stream(&[(0x09, 0, 1), (KEY, 0x300, 1), (KEY, KEY_A, 1)]);
        let config = ReaderConfig::new().with_strict(false);
        let mut reader = StreamReader::with_config(Cursor::new(data), config);
        assert!(!reader.config().strict);

        let event = reader.next_event(false).unwrap().event().unwrap();
        assert!(event.matches(EventCode::KEY_A));
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);
    }

    #[test]
    fn test_drain_twice() {
        let mut feed = Feed::default();
        feed.push(&[(KEY, KEY_A, 1), (KEY, KEY_B, 1), (SYN, SYN_REPORT, 0)]);
        let mut reader = StreamReader::new(feed);

        let events: Vec<InputEvent> = reader.drain().collect::<Result<_>>().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].matches(EventCode::KEY_A));
        assert!(events[1].matches(EventCode::KEY_B));
        assert!(events[2].is_sync_report());

        assert_eq!(reader.drain().count(), 0);

        reader.source_mut().push(&[(KEY, KEY_A, 0)]);
        let events: Vec<InputEvent> = reader.drain().collect::<Result<_>>().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value(), 0);
    }

    #[test]
    fn test_drain_stops_after_dropped() {
        let data = stream(&[(KEY, KEY_A, 1), (SYN, SYN_DROPPED, 0), (KEY, KEY_B, 1)]);
        let mut reader = StreamReader::new(Cursor::new(data));

        let events: Vec<InputEvent> = reader.drain().collect::<Result<_>>().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_dropped());
        assert_eq!(reader.state(), ReaderState::Overflowed);

        let events: Vec<InputEvent> = reader.drain().collect::<Result<_>>().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].matches(EventCode::KEY_B));
    }

    #[test]
    fn test_drain_yields_bad_records() {
        let data = stream(&[(0x09, 0, 1), (KEY, KEY_A, 1)]);
        let mut reader = StreamReader::new(Cursor::new(data));

        let results: Vec<Result<InputEvent>> = reader.drain().collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(Error::MalformedRecord { .. })));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_blocking_eof_is_closed() {
        let mut reader = StreamReader::new(Cursor::new(Vec::new()));
        assert!(matches!(reader.next_event(true), Err(Error::Closed)));
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);
    }

    #[test]
    fn test_short_record_at_eof() {
        let data = record(KEY, KEY_A, 1);
        let mut reader = StreamReader::new(&data[..10]);
        assert!(matches!(
            reader.next_event(true),
            Err(Error::MalformedRecord { source: None, .. })
        ));
        // The partial record is gone; the source is simply closed now.
        assert!(matches!(reader.next_event(true), Err(Error::Closed)));
    }

    #[test]
    fn test_split_record_is_reassembled() {
        let first = record(KEY, KEY_A, 1);
        let mut reader = StreamReader::new(Feed::default());

        reader.source_mut().push_bytes(&first[..10]);
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);
        assert_eq!(reader.next_event(true).unwrap(), ReadOutcome::NoEventAvailable);
        assert!(reader.tracker().is_empty());

        reader.source_mut().push_bytes(&first[10..]);
        reader.source_mut().push(&[(KEY, KEY_B, 1)]);

        let a = reader.next_event(false).unwrap().event().unwrap();
        assert!(a.matches(EventCode::KEY_A));
        assert_eq!(a.value(), 1);
        assert_eq!(a.time(), TimeVal::new(100, 42));
        let b = reader.next_event(false).unwrap().event().unwrap();
        assert!(b.matches(EventCode::KEY_B));
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);
        assert_eq!(reader.tracker().len(), 2);
    }

    #[test]
    fn test_drain_across_split_deliveries() {
        let data = stream(&[(KEY, KEY_A, 1), (KEY, KEY_B, 1), (SYN, SYN_REPORT, 0)]);
        let mut reader = StreamReader::new(Feed::default());

        let mut seen = Vec::new();
        for chunk in data.chunks(7) {
            reader.source_mut().push_bytes(chunk);
            for event in reader.drain() {
                seen.push(event.unwrap().code());
            }
        }
        assert_eq!(
            seen,
            vec![EventCode::KEY_A, EventCode::KEY_B, EventCode::SYN_REPORT]
        );
    }

    #[test]
    fn test_32_bit_layout() {
        let data = RawRecord {
            sec: 5,
            usec: 6,
            ty: KEY,
            code: KEY_B,
            value: 1,
        }
        .encode(RecordLayout::Time32);
        let config = ReaderConfig::default().with_layout(RecordLayout::Time32);
        let mut reader = StreamReader::with_config(data.as_slice(), config);

        let event = reader.next_event(false).unwrap().event().unwrap();
        assert!(event.matches(EventCode::KEY_B));
        assert_eq!(event.time(), TimeVal::new(5, 6));
    }

    #[test]
    fn test_order_preserved() {
        let records: Vec<(u16, u16, i32)> = (0..20).map(|i| (0x02, 0x00, i)).collect();
        let mut reader = StreamReader::new(Cursor::new(stream(&records)));

        let values: Vec<i32> = reader.drain().map(|event| event.unwrap().value()).collect();
        assert_eq!(values, (0..20).collect::<Vec<_>>());
        assert!(reader
            .tracker()
            .iter()
            .all(|(code, _)| code.event_type() == EventType::Rel));
    }

    #[test]
    fn test_with_tracker() {
        let data = stream(&[(0x03, 0x2f, 1), (0x03, 0x35, 300)]);
        let tracker = DeviceTracker::new().with_slots(2);
        let mut reader =
            StreamReader::with_tracker(Cursor::new(data), tracker, ReaderConfig::default());

        assert_eq!(reader.drain().count(), 2);
        assert_eq!(reader.tracker().current_slot(), Some(1));
        assert_eq!(
            reader
                .tracker()
                .slot_value(1, EventCode::ABS_MT_POSITION_X)
                .unwrap(),
            300
        );
        let consumed = 2 * RecordLayout::native().size() as u64;
        assert_eq!(reader.into_source().position(), consumed);
    }
}
