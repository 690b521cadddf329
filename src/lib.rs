//! # evstream
//!
//! Decoding of the Linux evdev event stream, with per-device state tracking.
//!
//! ## Features
//!
//! - Typed event types and codes with kernel names, lookups both ways
//! - Bit-exact decoding of `struct input_event` records, 64- and 32-bit layouts
//! - Last-value tracking per code, with frame, overflow and multitouch slot state
//! - Pull-based reader: one record per call, blocking or not, no background threads
//! - Reads device nodes through `poll(2)`, and in-memory buffers for tests and replays
//!
//! ## Quick Start
//!
//! ```no_run
//! use evstream::{ReadOutcome, StreamReader};
//! use std::fs::File;
//!
//! let file = File::open("/dev/input/event3").expect("failed to open device");
//! let mut reader = StreamReader::new(file);
//!
//! loop {
//!     match reader.next_event(true).expect("read failed") {
//!         ReadOutcome::Event(event) => println!("{event}"),
//!         ReadOutcome::Overflow => {
//!             // Query the device for its current state, then:
//!             for event in reader.resync(Default::default()) {
//!                 println!("resync: {event}");
//!             }
//!         }
//!         ReadOutcome::NoEventAvailable => {}
//!     }
//! }
//! ```
//!
//! ## Reading from memory
//!
//! Byte slices and cursors are sources too, which is handy for tests and captures:
//!
//! ```
//! use evstream::{EventCode, RawRecord, RecordLayout, StreamReader};
//!
//! let bytes = RawRecord { sec: 1, usec: 0, ty: 1, code: 30, value: 1 }
//!     .encode(RecordLayout::native());
//! let mut reader = StreamReader::new(bytes.as_slice());
//!
//! let event = reader.drain().next().unwrap().unwrap();
//! assert!(event.matches(EventCode::KEY_A));
//! assert_eq!(reader.tracker().value_for(EventCode::KEY_A).unwrap(), 1);
//! ```
//!
//! ## Concurrency
//!
//! A reader and its tracker belong to one thread at a time. Share them across
//! threads behind a mutex, or give each thread its own device.

pub mod error;
pub mod event;
pub mod reader;
pub mod record;
#[cfg(feature = "recorder")]
pub mod recorder;
pub mod registry;
pub mod source;
pub mod state;

mod platform;

// Re-exports
pub use error::{Error, Result};
pub use event::{InputEvent, KeyValue, TimeVal};
pub use reader::{Drain, ReadOutcome, ReaderConfig, ReaderState, StreamReader};
pub use record::{RawRecord, RecordLayout};
#[cfg(feature = "recorder")]
pub use recorder::Recording;
pub use registry::{
    EventCode, EventType, InputProp, code_for_raw, code_from_name, prop_for_raw, raw_for_code,
    type_for_raw, type_from_name, types,
};
pub use source::EventSource;
pub use state::{AbsInfo, DeviceTracker, Snapshot, SyncState};

#[cfg(target_os = "linux")]
pub use platform::FdSource;
