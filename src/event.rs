//! Decoded input events.

use crate::registry::{EventCode, EventType};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(feature = "recorder")]
use serde::{Deserialize, Serialize};

/// Event timestamp as carried by the kernel: seconds plus microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct TimeVal {
    /// Whole seconds.
    pub sec: i64,
    /// Microseconds within the second.
    pub usec: i64,
}

impl TimeVal {
    /// Create a timestamp from seconds and microseconds.
    pub const fn new(sec: i64, usec: i64) -> Self {
        Self { sec, usec }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            sec: since_epoch.as_secs() as i64,
            usec: i64::from(since_epoch.subsec_micros()),
        }
    }

    /// The timestamp as a duration since the clock's origin.
    ///
    /// Negative timestamps saturate to zero.
    pub fn as_duration(&self) -> Duration {
        if self.sec < 0 || self.usec < 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(self.sec as u64) + Duration::from_micros(self.usec as u64)
    }
}

/// Interpretation of the value of an `EV_KEY` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyValue {
    /// The key was released (0).
    Released,
    /// The key was pressed (1).
    Pressed,
    /// The key is held and autorepeating (2).
    Repeat,
}

impl KeyValue {
    /// Interpret a raw key value, `None` for anything outside 0..=2.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyValue::Released),
            1 => Some(KeyValue::Pressed),
            2 => Some(KeyValue::Repeat),
            _ => None,
        }
    }

    /// The raw value.
    pub fn value(self) -> i32 {
        match self {
            KeyValue::Released => 0,
            KeyValue::Pressed => 1,
            KeyValue::Repeat => 2,
        }
    }
}

/// A decoded input event.
///
/// Events are immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct InputEvent {
    code: EventCode,
    value: i32,
    time: TimeVal,
}

impl InputEvent {
    /// Create an event.
    pub const fn new(code: EventCode, value: i32, time: TimeVal) -> Self {
        Self { code, value, time }
    }

    /// Create an event stamped with the current time.
    pub fn now(code: EventCode, value: i32) -> Self {
        Self::new(code, value, TimeVal::now())
    }

    /// A `SYN_REPORT` frame terminator.
    pub fn sync_report(time: TimeVal) -> Self {
        Self::new(EventCode::SYN_REPORT, 0, time)
    }

    /// The event type.
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.code.event_type()
    }

    /// The event code.
    #[inline]
    pub fn code(&self) -> EventCode {
        self.code
    }

    /// The event value.
    #[inline]
    pub fn value(&self) -> i32 {
        self.value
    }

    /// The event timestamp.
    #[inline]
    pub fn time(&self) -> TimeVal {
        self.time
    }

    /// Seconds part of the timestamp.
    pub fn sec(&self) -> i64 {
        self.time.sec
    }

    /// Microseconds part of the timestamp.
    pub fn usec(&self) -> i64 {
        self.time.usec
    }

    /// Check if this event carries the given code.
    pub fn matches(&self, code: EventCode) -> bool {
        self.code == code
    }

    /// Check if this event is of the given type.
    pub fn matches_type(&self, ty: EventType) -> bool {
        self.event_type() == ty
    }

    /// Check if this is a synchronization event of any kind.
    pub fn is_sync(&self) -> bool {
        self.matches_type(EventType::Syn)
    }

    /// Check if this event closes a frame.
    pub fn is_sync_report(&self) -> bool {
        self.matches(EventCode::SYN_REPORT)
    }

    /// Check if this is the kernel's buffer overflow notification.
    pub fn is_dropped(&self) -> bool {
        self.matches(EventCode::SYN_DROPPED)
    }

    /// Interpret the value of a key event. `None` for other types.
    pub fn key_value(&self) -> Option<KeyValue> {
        if self.code.is_key() {
            KeyValue::from_value(self.value)
        } else {
            None
        }
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06} {} {} {}",
            self.time.sec,
            self.time.usec,
            self.event_type(),
            self.code,
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value() {
        let time = TimeVal::new(1, 0);
        let press = InputEvent::new(EventCode::KEY_A, 1, time);
        assert_eq!(press.key_value(), Some(KeyValue::Pressed));
        let repeat = InputEvent::new(EventCode::KEY_A, 2, time);
        assert_eq!(repeat.key_value(), Some(KeyValue::Repeat));
        let odd = InputEvent::new(EventCode::KEY_A, 7, time);
        assert_eq!(odd.key_value(), None);
        let axis = InputEvent::new(EventCode::REL_X, 1, time);
        assert_eq!(axis.key_value(), None);
        assert_eq!(KeyValue::Released.value(), 0);
    }

    #[test]
    fn test_sync_checks() {
        let time = TimeVal::default();
        let report = InputEvent::sync_report(time);
        assert!(report.is_sync());
        assert!(report.is_sync_report());
        assert!(!report.is_dropped());

        let dropped = InputEvent::new(EventCode::SYN_DROPPED, 0, time);
        assert!(dropped.is_sync());
        assert!(dropped.is_dropped());

        let key = InputEvent::new(EventCode::KEY_A, 1, time);
        assert!(!key.is_sync());
        assert!(key.matches_type(EventType::Key));
        assert!(key.matches(EventCode::KEY_A));
        assert!(!key.matches(EventCode::KEY_B));
    }

    #[test]
    fn test_display() {
        let event = InputEvent::new(EventCode::KEY_A, 1, TimeVal::new(12, 345));
        assert_eq!(event.to_string(), "12.000345 EV_KEY KEY_A 1");
    }

    #[test]
    fn test_timeval_duration() {
        let time = TimeVal::new(2, 500_000);
        assert_eq!(time.as_duration(), Duration::from_millis(2500));
        assert_eq!(TimeVal::new(-1, 0).as_duration(), Duration::ZERO);
        assert!(TimeVal::now().sec > 0);
    }
}
