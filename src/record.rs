//! Binary layout of the kernel's `struct input_event`.
//!
//! ```text
//! struct input_event {
//!     struct timeval time;   // two C longs: seconds, microseconds
//!     __u16 type;
//!     __u16 code;
//!     __s32 value;
//! };
//! ```
//!
//! The record is in native byte order. Its width depends on the size of a C
//! `long`: 24 bytes on 64-bit targets, 16 bytes on 32-bit ones.

use crate::error::{Error, Result};
use crate::event::{InputEvent, TimeVal};

/// Width of the timestamp fields of a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordLayout {
    /// 64-bit `long`: 24-byte records.
    Time64,
    /// 32-bit `long`: 16-byte records.
    Time32,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::native()
    }
}

impl RecordLayout {
    /// The layout used by the kernel on the current target.
    pub const fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            RecordLayout::Time64
        } else {
            RecordLayout::Time32
        }
    }

    /// Size of one record in bytes.
    pub const fn size(self) -> usize {
        match self {
            RecordLayout::Time64 => 24,
            RecordLayout::Time32 => 16,
        }
    }

    const fn time_width(self) -> usize {
        match self {
            RecordLayout::Time64 => 8,
            RecordLayout::Time32 => 4,
        }
    }
}

/// An undecoded record: the integers exactly as the kernel wrote them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    /// Timestamp seconds.
    pub sec: i64,
    /// Timestamp microseconds.
    pub usec: i64,
    /// Raw event type.
    pub ty: u16,
    /// Raw event code.
    pub code: u16,
    /// Event value.
    pub value: i32,
}

impl RawRecord {
    /// Decode one record. `bytes` must be exactly one record long.
    pub fn decode(bytes: &[u8], layout: RecordLayout) -> Result<Self> {
        if bytes.len() != layout.size() {
            return Err(Error::malformed(format!(
                "expected {} bytes, got {}",
                layout.size(),
                bytes.len()
            )));
        }

        let tw = layout.time_width();
        let (sec, usec) = match layout {
            RecordLayout::Time64 => (
                i64::from_ne_bytes(field(bytes, 0)?),
                i64::from_ne_bytes(field(bytes, 8)?),
            ),
            RecordLayout::Time32 => (
                i64::from(i32::from_ne_bytes(field(bytes, 0)?)),
                i64::from(i32::from_ne_bytes(field(bytes, 4)?)),
            ),
        };
        let base = 2 * tw;

        Ok(Self {
            sec,
            usec,
            ty: u16::from_ne_bytes(field(bytes, base)?),
            code: u16::from_ne_bytes(field(bytes, base + 2)?),
            value: i32::from_ne_bytes(field(bytes, base + 4)?),
        })
    }

    /// Append the encoded record to `out`.
    ///
    /// With [`RecordLayout::Time32`] the timestamp is truncated to 32 bits,
    /// as the kernel does.
    pub fn encode_into(&self, layout: RecordLayout, out: &mut Vec<u8>) {
        match layout {
            RecordLayout::Time64 => {
                out.extend_from_slice(&self.sec.to_ne_bytes());
                out.extend_from_slice(&self.usec.to_ne_bytes());
            }
            RecordLayout::Time32 => {
                out.extend_from_slice(&(self.sec as i32).to_ne_bytes());
                out.extend_from_slice(&(self.usec as i32).to_ne_bytes());
            }
        }
        out.extend_from_slice(&self.ty.to_ne_bytes());
        out.extend_from_slice(&self.code.to_ne_bytes());
        out.extend_from_slice(&self.value.to_ne_bytes());
    }

    /// Encode the record into a new buffer.
    pub fn encode(&self, layout: RecordLayout) -> Vec<u8> {
        let mut out = Vec::with_capacity(layout.size());
        self.encode_into(layout, &mut out);
        out
    }

    /// The timestamp of this record.
    pub fn time(&self) -> TimeVal {
        TimeVal::new(self.sec, self.usec)
    }
}

impl From<&InputEvent> for RawRecord {
    fn from(event: &InputEvent) -> Self {
        Self {
            sec: event.sec(),
            usec: event.usec(),
            ty: event.event_type().raw(),
            code: event.code().raw(),
            value: event.value(),
        }
    }
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or_else(|| Error::malformed(format!("truncated field at offset {offset}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EventCode;

    #[test]
    fn test_sizes() {
        assert_eq!(RecordLayout::Time64.size(), 24);
        assert_eq!(RecordLayout::Time32.size(), 16);
        assert_eq!(RecordLayout::default(), RecordLayout::native());
        assert_eq!(
            RecordLayout::native().size(),
            2 * std::mem::size_of::<std::ffi::c_long>() + 8
        );
    }

    #[test]
    fn test_field_offsets_64() {
        let record = RawRecord {
            sec: 7,
            usec: 9,
            ty: 0x01,
            code: 30,
            value: -5,
        };
        let bytes = record.encode(RecordLayout::Time64);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..8], &7i64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &9i64.to_ne_bytes());
        assert_eq!(&bytes[16..18], &1u16.to_ne_bytes());
        assert_eq!(&bytes[18..20], &30u16.to_ne_bytes());
        assert_eq!(&bytes[20..24], &(-5i32).to_ne_bytes());
        assert_eq!(RawRecord::decode(&bytes, RecordLayout::Time64).unwrap(), record);
    }

    #[test]
    fn test_decode_32() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&100i32.to_ne_bytes());
        bytes.extend_from_slice(&250i32.to_ne_bytes());
        bytes.extend_from_slice(&3u16.to_ne_bytes());
        bytes.extend_from_slice(&0x35u16.to_ne_bytes());
        bytes.extend_from_slice(&1024i32.to_ne_bytes());

        let record = RawRecord::decode(&bytes, RecordLayout::Time32).unwrap();
        assert_eq!(record.time(), TimeVal::new(100, 250));
        assert_eq!(record.ty, 3);
        assert_eq!(record.code, 0x35);
        assert_eq!(record.value, 1024);
    }

    #[test]
    fn test_wrong_size() {
        let bytes = [0u8; 20];
        assert!(matches!(
            RawRecord::decode(&bytes, RecordLayout::Time64),
            Err(Error::MalformedRecord { .. })
        ));
        assert!(RawRecord::decode(&bytes[..16], RecordLayout::Time64).is_err());
        assert!(RawRecord::decode(&bytes[..16], RecordLayout::Time32).is_ok());
    }

    #[test]
    fn test_from_event() {
        let event = InputEvent::new(EventCode::ABS_X, 512, TimeVal::new(3, 4));
        let record = RawRecord::from(&event);
        assert_eq!(record.ty, 3);
        assert_eq!(record.code, 0);
        assert_eq!(record.value, 512);
        assert_eq!(record.time(), event.time());
    }
}
