//! Event type and event code registry.
//!
//! Maps the raw `type`/`code` integers of the kernel's input protocol to
//! typed [`EventType`] and [`EventCode`] values and back. The registry is
//! static data: the code tables are compiled in and the name index is built
//! once, on first use.
//!
//! Every code in `0..=max` of a type is valid, even when the kernel headers
//! define no name for it. Such codes are named after their type and value,
//! e.g. `KEY_2ff` or `ABS_0b`.

mod tables;

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

#[cfg(feature = "recorder")]
use serde::{Deserialize, Serialize};

/// The type namespace of the evdev protocol (`EV_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub enum EventType {
    /// Synchronization markers (`EV_SYN`).
    Syn = 0x00,
    /// Keys and buttons (`EV_KEY`).
    Key = 0x01,
    /// Relative axes (`EV_REL`).
    Rel = 0x02,
    /// Absolute axes (`EV_ABS`).
    Abs = 0x03,
    /// Miscellaneous (`EV_MSC`).
    Misc = 0x04,
    /// Binary switches (`EV_SW`).
    Switch = 0x05,
    /// LEDs (`EV_LED`).
    Led = 0x11,
    /// Sounds (`EV_SND`).
    Sound = 0x12,
    /// Autorepeat settings (`EV_REP`).
    Repeat = 0x14,
    /// Force feedback (`EV_FF`).
    ForceFeedback = 0x15,
    /// Power management (`EV_PWR`).
    Power = 0x16,
    /// Force feedback status (`EV_FF_STATUS`).
    ForceFeedbackStatus = 0x17,
}

impl EventType {
    /// Every event type, in ascending raw order.
    pub const ALL: [EventType; 12] = [
        EventType::Syn,
        EventType::Key,
        EventType::Rel,
        EventType::Abs,
        EventType::Misc,
        EventType::Switch,
        EventType::Led,
        EventType::Sound,
        EventType::Repeat,
        EventType::ForceFeedback,
        EventType::Power,
        EventType::ForceFeedbackStatus,
    ];

    /// The raw protocol value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Look up a type by its raw protocol value.
    pub fn from_raw(raw: u16) -> Result<Self> {
        Ok(match raw {
            0x00 => EventType::Syn,
            0x01 => EventType::Key,
            0x02 => EventType::Rel,
            0x03 => EventType::Abs,
            0x04 => EventType::Misc,
            0x05 => EventType::Switch,
            0x11 => EventType::Led,
            0x12 => EventType::Sound,
            0x14 => EventType::Repeat,
            0x15 => EventType::ForceFeedback,
            0x16 => EventType::Power,
            0x17 => EventType::ForceFeedbackStatus,
            _ => return Err(Error::UnknownType(raw)),
        })
    }

    /// The highest valid code of this type, or `None` if the type has no codes.
    pub const fn max_code(self) -> Option<u16> {
        match self {
            EventType::Syn => Some(0x0f),
            EventType::Key => Some(0x2ff),
            EventType::Rel => Some(0x0f),
            EventType::Abs => Some(0x3f),
            EventType::Misc => Some(0x07),
            EventType::Switch => Some(0x11),
            EventType::Led => Some(0x0f),
            EventType::Sound => Some(0x07),
            EventType::Repeat => Some(0x01),
            EventType::ForceFeedback => Some(0x7f),
            EventType::Power => None,
            EventType::ForceFeedbackStatus => Some(0x01),
        }
    }

    /// The kernel name of this type, e.g. `"EV_KEY"`.
    pub const fn name(self) -> &'static str {
        match self {
            EventType::Syn => "EV_SYN",
            EventType::Key => "EV_KEY",
            EventType::Rel => "EV_REL",
            EventType::Abs => "EV_ABS",
            EventType::Misc => "EV_MSC",
            EventType::Switch => "EV_SW",
            EventType::Led => "EV_LED",
            EventType::Sound => "EV_SND",
            EventType::Repeat => "EV_REP",
            EventType::ForceFeedback => "EV_FF",
            EventType::Power => "EV_PWR",
            EventType::ForceFeedbackStatus => "EV_FF_STATUS",
        }
    }

    /// Look up a type by its kernel name.
    pub fn from_name(name: &str) -> Result<Self> {
        EventType::ALL
            .into_iter()
            .find(|ty| ty.name() == name)
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }

    /// Iterate over every valid code of this type, named or not.
    pub fn codes(self) -> impl Iterator<Item = EventCode> {
        let end = self.max_code().map_or(0, |max| u32::from(max) + 1);
        (0..end).map(move |code| EventCode {
            ty: self,
            code: code as u16,
        })
    }

    // The part of the type name that prefixes code names, "EV_ABS" -> "ABS".
    fn code_prefix(self) -> &'static str {
        &self.name()[3..]
    }

    fn table(self) -> &'static [(u16, &'static str)] {
        match self {
            EventType::Syn => tables::SYN,
            EventType::Key => tables::KEY,
            EventType::Rel => tables::REL,
            EventType::Abs => tables::ABS,
            EventType::Misc => tables::MSC,
            EventType::Switch => tables::SW,
            EventType::Led => tables::LED,
            EventType::Sound => tables::SND,
            EventType::Repeat => tables::REP,
            EventType::ForceFeedback => tables::FF,
            EventType::Power => &[],
            EventType::ForceFeedbackStatus => tables::FF_STATUS,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event code, scoped to exactly one [`EventType`].
///
/// Values can only be obtained through the registry, so every `EventCode`
/// is within the known range of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "recorder",
    derive(Serialize, Deserialize),
    serde(try_from = "(EventType, u16)", into = "(EventType, u16)")
)]
pub struct EventCode {
    ty: EventType,
    code: u16,
}

impl EventCode {
    /// End of a frame of simultaneous changes.
    pub const SYN_REPORT: EventCode = EventCode::known(EventType::Syn, 0x00);
    /// Configuration marker, unused by current kernels.
    pub const SYN_CONFIG: EventCode = EventCode::known(EventType::Syn, 0x01);
    /// End of one contact in the legacy multitouch protocol.
    pub const SYN_MT_REPORT: EventCode = EventCode::known(EventType::Syn, 0x02);
    /// The kernel's event buffer overflowed.
    pub const SYN_DROPPED: EventCode = EventCode::known(EventType::Syn, 0x03);

    /// Escape key.
    pub const KEY_ESC: EventCode = EventCode::known(EventType::Key, 1);
    /// Enter key.
    pub const KEY_ENTER: EventCode = EventCode::known(EventType::Key, 28);
    /// Left control key.
    pub const KEY_LEFTCTRL: EventCode = EventCode::known(EventType::Key, 29);
    /// The `A` key.
    pub const KEY_A: EventCode = EventCode::known(EventType::Key, 30);
    /// The `S` key.
    pub const KEY_S: EventCode = EventCode::known(EventType::Key, 31);
    /// Left shift key.
    pub const KEY_LEFTSHIFT: EventCode = EventCode::known(EventType::Key, 42);
    /// The `B` key.
    pub const KEY_B: EventCode = EventCode::known(EventType::Key, 48);
    /// Left alt key.
    pub const KEY_LEFTALT: EventCode = EventCode::known(EventType::Key, 56);
    /// Space bar.
    pub const KEY_SPACE: EventCode = EventCode::known(EventType::Key, 57);
    /// Caps lock key.
    pub const KEY_CAPSLOCK: EventCode = EventCode::known(EventType::Key, 58);
    /// Left meta (super) key.
    pub const KEY_LEFTMETA: EventCode = EventCode::known(EventType::Key, 125);
    /// Left mouse button.
    pub const BTN_LEFT: EventCode = EventCode::known(EventType::Key, 0x110);
    /// Right mouse button.
    pub const BTN_RIGHT: EventCode = EventCode::known(EventType::Key, 0x111);
    /// Middle mouse button.
    pub const BTN_MIDDLE: EventCode = EventCode::known(EventType::Key, 0x112);
    /// A touch surface is being touched.
    pub const BTN_TOUCH: EventCode = EventCode::known(EventType::Key, 0x14a);
    /// A finger is on a touchpad.
    pub const BTN_TOOL_FINGER: EventCode = EventCode::known(EventType::Key, 0x145);

    /// Horizontal relative motion.
    pub const REL_X: EventCode = EventCode::known(EventType::Rel, 0x00);
    /// Vertical relative motion.
    pub const REL_Y: EventCode = EventCode::known(EventType::Rel, 0x01);
    /// Horizontal scroll wheel.
    pub const REL_HWHEEL: EventCode = EventCode::known(EventType::Rel, 0x06);
    /// Vertical scroll wheel.
    pub const REL_WHEEL: EventCode = EventCode::known(EventType::Rel, 0x08);

    /// Absolute X axis.
    pub const ABS_X: EventCode = EventCode::known(EventType::Abs, 0x00);
    /// Absolute Y axis.
    pub const ABS_Y: EventCode = EventCode::known(EventType::Abs, 0x01);
    /// Contact pressure.
    pub const ABS_PRESSURE: EventCode = EventCode::known(EventType::Abs, 0x18);
    /// Selects the multitouch slot that following `ABS_MT_*` events update.
    pub const ABS_MT_SLOT: EventCode = EventCode::known(EventType::Abs, 0x2f);
    /// X position of the contact in the current slot.
    pub const ABS_MT_POSITION_X: EventCode = EventCode::known(EventType::Abs, 0x35);
    /// Y position of the contact in the current slot.
    pub const ABS_MT_POSITION_Y: EventCode = EventCode::known(EventType::Abs, 0x36);
    /// Contact id of the current slot, `-1` when the contact lifts.
    pub const ABS_MT_TRACKING_ID: EventCode = EventCode::known(EventType::Abs, 0x39);

    /// Raw scancode of the key in the same frame.
    pub const MSC_SCAN: EventCode = EventCode::known(EventType::Misc, 0x04);
    /// Laptop lid closed.
    pub const SW_LID: EventCode = EventCode::known(EventType::Switch, 0x00);
    /// Num lock LED.
    pub const LED_NUML: EventCode = EventCode::known(EventType::Led, 0x00);
    /// Caps lock LED.
    pub const LED_CAPSL: EventCode = EventCode::known(EventType::Led, 0x01);
    /// Autorepeat delay in milliseconds.
    pub const REP_DELAY: EventCode = EventCode::known(EventType::Repeat, 0x00);
    /// Autorepeat period in milliseconds.
    pub const REP_PERIOD: EventCode = EventCode::known(EventType::Repeat, 0x01);

    // Only for the constants above, which are checked against the tables in tests.
    const fn known(ty: EventType, code: u16) -> Self {
        EventCode { ty, code }
    }

    /// Look up a code by type and raw value.
    ///
    /// Fails with [`Error::UnknownCode`] if `raw` is outside the known range
    /// of `ty`.
    pub fn new(ty: EventType, raw: u16) -> Result<Self> {
        match ty.max_code() {
            Some(max) if raw <= max => Ok(EventCode { ty, code: raw }),
            _ => Err(Error::UnknownCode { ty, code: raw }),
        }
    }

    /// The type this code belongs to.
    #[inline]
    pub const fn event_type(self) -> EventType {
        self.ty
    }

    /// The raw protocol value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.code
    }

    /// The kernel-defined name, if the headers define one for this code.
    pub fn symbolic_name(self) -> Option<&'static str> {
        tables::lookup(self.ty.table(), self.code)
    }

    /// The name of this code, falling back to `<TYPE>_<hex>` when unnamed.
    pub fn name(self) -> Cow<'static, str> {
        match self.symbolic_name() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("{}_{:02x}", self.ty.code_prefix(), self.code)),
        }
    }

    /// Look up a code by name.
    ///
    /// Accepts kernel names, their aliases (`BTN_MOUSE` for `BTN_LEFT`) and
    /// the fallback names produced by [`EventCode::name`].
    pub fn from_name(name: &str) -> Result<Self> {
        if let Some(code) = name_index().get(name) {
            return Ok(*code);
        }
        EventType::ALL
            .into_iter()
            .find_map(|ty| parse_fallback_name(ty, name))
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }

    /// Whether this is a key or button code.
    pub fn is_key(self) -> bool {
        self.ty == EventType::Key
    }

    /// Whether this is one of the per-slot multitouch axes
    /// (`ABS_MT_TOUCH_MAJOR` through `ABS_MT_TOOL_Y`).
    pub fn is_multitouch(self) -> bool {
        self.ty == EventType::Abs && (0x30..=0x3d).contains(&self.code)
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl TryFrom<(EventType, u16)> for EventCode {
    type Error = Error;

    fn try_from((ty, raw): (EventType, u16)) -> Result<Self> {
        EventCode::new(ty, raw)
    }
}

impl From<EventCode> for (EventType, u16) {
    fn from(code: EventCode) -> Self {
        (code.ty, code.code)
    }
}

fn parse_fallback_name(ty: EventType, name: &str) -> Option<EventCode> {
    let hex = name.strip_prefix(ty.code_prefix())?.strip_prefix('_')?;
    let raw = u16::from_str_radix(hex, 16).ok()?;
    let code = EventCode::new(ty, raw).ok()?;
    // Only the exact spelling `name()` produces, and never for named codes.
    (code.symbolic_name().is_none() && code.name() == name).then_some(code)
}

static NAME_INDEX: OnceLock<HashMap<&'static str, EventCode>> = OnceLock::new();

fn name_index() -> &'static HashMap<&'static str, EventCode> {
    NAME_INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for ty in EventType::ALL {
            for &(code, name) in ty.table() {
                index.insert(name, EventCode { ty, code });
            }
        }
        for &(name, code) in tables::KEY_ALIASES {
            index.insert(name, EventCode { ty: EventType::Key, code });
        }
        for &(name, code) in tables::SW_ALIASES {
            index.insert(name, EventCode { ty: EventType::Switch, code });
        }
        index
    })
}

/// An input device property (`INPUT_PROP_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct InputProp(u8);

impl InputProp {
    /// The highest valid property value.
    pub const MAX: u16 = 0x1f;

    /// The raw protocol value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0 as u16
    }

    /// The kernel name, falling back to `INPUT_PROP_<hex>` when unnamed.
    pub fn name(self) -> Cow<'static, str> {
        match tables::lookup(tables::INPUT_PROP, self.raw()) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("INPUT_PROP_{:02x}", self.0)),
        }
    }

    /// Look up a property by its kernel name.
    pub fn from_name(name: &str) -> Result<Self> {
        tables::INPUT_PROP
            .iter()
            .find(|&&(_, n)| n == name)
            .map(|&(raw, _)| InputProp(raw as u8))
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }
}

impl fmt::Display for InputProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Look up an event type by raw value.
pub fn type_for_raw(raw: u16) -> Result<EventType> {
    EventType::from_raw(raw)
}

/// Look up an event code by type and raw value.
pub fn code_for_raw(ty: EventType, raw: u16) -> Result<EventCode> {
    EventCode::new(ty, raw)
}

/// The raw value of an event code.
pub fn raw_for_code(code: EventCode) -> u16 {
    code.raw()
}

/// Every event type, in ascending raw order.
pub fn types() -> impl Iterator<Item = EventType> {
    EventType::ALL.into_iter()
}

/// Look up an event type by its `EV_*` name.
pub fn type_from_name(name: &str) -> Result<EventType> {
    EventType::from_name(name)
}

/// Look up an event code by name or alias, e.g. `KEY_A` or `BTN_MOUSE`.
pub fn code_from_name(name: &str) -> Result<EventCode> {
    EventCode::from_name(name)
}

/// Look up an input property by raw value.
pub fn prop_for_raw(raw: u16) -> Result<InputProp> {
    if raw <= InputProp::MAX {
        Ok(InputProp(raw as u8))
    } else {
        Err(Error::InvalidArgument(format!(
            "input property {raw:#x} out of range"
        )))
    }
}
