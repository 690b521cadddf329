//! Per-device state tracking.
//!
//! A [`DeviceTracker`] holds the last value seen for every event code of one
//! device, applies events in arrival order, and follows the frame/overflow
//! lifecycle signaled by `EV_SYN` events. One tracker belongs to one device;
//! trackers are never shared.

use crate::error::{Error, Result};
use crate::event::InputEvent;
use crate::registry::{EventCode, EventType};
use std::collections::HashMap;

/// Current values keyed by event code.
pub type Snapshot = HashMap<EventCode, i32>;

/// Synchronization state of a tracked device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncState {
    /// Events are flowing normally; the current frame is still open.
    #[default]
    Normal,
    /// The last event was a `SYN_REPORT`; the current frame is complete.
    SynReport,
    /// The kernel dropped events. Tracked values may be stale until a resync.
    Dropped,
}

/// Range and resolution of an absolute axis (`struct input_absinfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AbsInfo {
    /// Current value of the axis.
    pub value: i32,
    /// Minimum value.
    pub minimum: i32,
    /// Maximum value.
    pub maximum: i32,
    /// Noise filter threshold.
    pub fuzz: i32,
    /// Dead zone around the center.
    pub flat: i32,
    /// Units per millimeter (or per radian for rotational axes).
    pub resolution: i32,
}

impl AbsInfo {
    /// Create axis info with the given range; all other fields zero.
    pub fn with_range(minimum: i32, maximum: i32) -> Self {
        Self {
            minimum,
            maximum,
            ..Default::default()
        }
    }
}

/// Tracks the last-known state of one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceTracker {
    values: Snapshot,
    abs_info: HashMap<EventCode, AbsInfo>,
    slots: Vec<Snapshot>,
    current_slot: usize,
    sync_state: SyncState,
}

impl DeviceTracker {
    /// Create an empty tracker without multitouch slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `count` multitouch slots.
    pub fn with_slots(mut self, count: usize) -> Self {
        self.slots = vec![Snapshot::new(); count];
        self.current_slot = 0;
        self
    }

    /// Apply one event.
    ///
    /// Non-sync events overwrite the stored value of their code. Sync events
    /// store nothing; they move the [`SyncState`] instead.
    pub fn apply(&mut self, event: &InputEvent) {
        let code = event.code();
        let value = event.value();

        if event.is_sync() {
            if event.is_dropped() {
                if self.sync_state != SyncState::Dropped {
                    log::debug!("device state marked dropped");
                }
                self.sync_state = SyncState::Dropped;
            } else if event.is_sync_report() && self.sync_state != SyncState::Dropped {
                self.sync_state = SyncState::SynReport;
            }
            return;
        }

        self.values.insert(code, value);
        if self.sync_state == SyncState::SynReport {
            self.sync_state = SyncState::Normal;
        }

        if code.event_type() == EventType::Abs {
            self.apply_abs(code, value);
        }
    }

    fn apply_abs(&mut self, code: EventCode, value: i32) {
        if let Some(info) = self.abs_info.get_mut(&code) {
            info.value = value;
        }

        if self.slots.is_empty() {
            return;
        }

        if code == EventCode::ABS_MT_SLOT {
            match usize::try_from(value) {
                Ok(slot) if slot < self.slots.len() => self.current_slot = slot,
                _ => log::warn!(
                    "ignoring slot {} outside 0..{}",
                    value,
                    self.slots.len()
                ),
            }
        } else if code.is_multitouch() {
            if let Some(slot) = self.slots.get_mut(self.current_slot) {
                slot.insert(code, value);
            }
        }
    }

    /// The last value reported for `code`.
    ///
    /// Fails with [`Error::NoSuchAxis`] if the device never reported it.
    pub fn value_for(&self, code: EventCode) -> Result<i32> {
        self.values
            .get(&code)
            .copied()
            .ok_or(Error::NoSuchAxis(code))
    }

    /// Same as [`value_for`](Self::value_for), looked up by raw type and code.
    pub fn value(&self, ty: EventType, raw: u16) -> Result<i32> {
        self.value_for(EventCode::new(ty, raw)?)
    }

    /// Replace all tracked values with `snapshot` and clear a dropped state.
    ///
    /// Per-slot values are cleared; the current slot is taken from
    /// `ABS_MT_SLOT` in the snapshot when present.
    pub fn resync(&mut self, snapshot: Snapshot) {
        for (code, info) in self.abs_info.iter_mut() {
            if let Some(value) = snapshot.get(code) {
                info.value = *value;
            }
        }

        for slot in self.slots.iter_mut() {
            slot.clear();
        }
        self.current_slot = snapshot
            .get(&EventCode::ABS_MT_SLOT)
            .and_then(|value| usize::try_from(*value).ok())
            .filter(|slot| *slot < self.slots.len())
            .unwrap_or(0);

        log::debug!("resynced device state with {} values", snapshot.len());
        self.values = snapshot;
        self.sync_state = SyncState::Normal;
    }

    /// Replace the tracked values of one multitouch slot.
    pub fn resync_slot(&mut self, slot: usize, values: Snapshot) -> Result<()> {
        let count = self.slots.len();
        let target = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| Error::InvalidArgument(format!("slot {slot} outside 0..{count}")))?;
        *target = values.into_iter().filter(|(code, _)| code.is_multitouch()).collect();
        Ok(())
    }

    /// Value changes `snapshot` would introduce, ordered by type and code.
    ///
    /// Codes absent from `snapshot` are not listed.
    pub fn diff(&self, snapshot: &Snapshot) -> Vec<(EventCode, i32)> {
        let mut changes: Vec<(EventCode, i32)> = snapshot
            .iter()
            .filter(|(code, value)| self.values.get(*code) != Some(*value))
            .map(|(code, value)| (*code, *value))
            .collect();
        changes.sort_unstable_by_key(|(code, _)| *code);
        changes
    }

    /// An owned copy of all tracked values.
    pub fn snapshot(&self) -> Snapshot {
        self.values.clone()
    }

    /// Iterate over all tracked values.
    pub fn iter(&self) -> impl Iterator<Item = (EventCode, i32)> + '_ {
        self.values.iter().map(|(code, value)| (*code, *value))
    }

    /// Number of codes with a tracked value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no value has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The current synchronization state.
    pub fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// Register range information for an absolute axis.
    pub fn set_abs_info(&mut self, code: EventCode, info: AbsInfo) -> Result<()> {
        if code.event_type() != EventType::Abs {
            return Err(Error::InvalidArgument(format!("{code} is not an absolute axis")));
        }
        self.abs_info.insert(code, info);
        Ok(())
    }

    /// Range information for an absolute axis, if registered.
    pub fn abs_info(&self, code: EventCode) -> Option<&AbsInfo> {
        self.abs_info.get(&code)
    }

    /// Number of multitouch slots, `None` if slots are not tracked.
    pub fn num_slots(&self) -> Option<usize> {
        (!self.slots.is_empty()).then_some(self.slots.len())
    }

    /// The active multitouch slot, `None` if slots are not tracked.
    pub fn current_slot(&self) -> Option<usize> {
        (!self.slots.is_empty()).then_some(self.current_slot)
    }

    /// The last value of a multitouch axis in `slot`.
    pub fn slot_value(&self, slot: usize, code: EventCode) -> Result<i32> {
        if !code.is_multitouch() {
            return Err(Error::InvalidArgument(format!("{code} is not a multitouch axis")));
        }
        let values = self.slots.get(slot).ok_or_else(|| {
            Error::InvalidArgument(format!("slot {slot} outside 0..{}", self.slots.len()))
        })?;
        values.get(&code).copied().ok_or(Error::NoSuchAxis(code))
    }
}
