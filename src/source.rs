//! Byte sources that deliver raw event records.
//!
//! A source hands out whatever bytes it has, up to the size of the buffer.
//! The reader assembles whole records from them, so a source may split a
//! record across calls. The reader never opens or closes the underlying
//! handle; that stays with the caller.
//!
//! In-memory buffers (`&[u8]`, `Cursor<T>`) are sources that never block. On
//! Linux, `File`, `OwnedFd` and [`FdSource`](crate::FdSource) read through
//! `poll(2)` and `read(2)`, so non-blocking reads work on descriptors opened
//! in blocking mode and blocking reads wait on `O_NONBLOCK` ones.

use std::io::{self, Cursor, Read};

/// A handle that yields raw event bytes.
pub trait EventSource {
    /// Read up to `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes read, `0` at end of file. With
    /// `blocking == false` a source with nothing pending reports
    /// [`io::ErrorKind::WouldBlock`] instead of waiting. With
    /// `blocking == true` it waits until data or end of file arrives.
    fn read_bytes(&mut self, buf: &mut [u8], blocking: bool) -> io::Result<usize>;
}

impl<S: EventSource + ?Sized> EventSource for &mut S {
    fn read_bytes(&mut self, buf: &mut [u8], blocking: bool) -> io::Result<usize> {
        (**self).read_bytes(buf, blocking)
    }
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn read_bytes(&mut self, buf: &mut [u8], blocking: bool) -> io::Result<usize> {
        (**self).read_bytes(buf, blocking)
    }
}

/// Memory is always ready; `blocking` makes no difference.
impl EventSource for &[u8] {
    fn read_bytes(&mut self, buf: &mut [u8], _blocking: bool) -> io::Result<usize> {
        self.read(buf)
    }
}

/// Memory is always ready; `blocking` makes no difference.
impl<T: AsRef<[u8]>> EventSource for Cursor<T> {
    fn read_bytes(&mut self, buf: &mut [u8], _blocking: bool) -> io::Result<usize> {
        self.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads_in_order() {
        let data: Vec<u8> = (0..48).collect();
        let mut source = Cursor::new(data);
        let mut buf = [0u8; 24];

        assert_eq!(source.read_bytes(&mut buf, false).unwrap(), 24);
        assert_eq!(buf[0], 0);
        assert_eq!(source.read_bytes(&mut buf, false).unwrap(), 24);
        assert_eq!(buf[0], 24);
        assert_eq!(source.read_bytes(&mut buf, true).unwrap(), 0);
    }

    #[test]
    fn test_slice_short_then_eof() {
        let mut source: &[u8] = &[1, 2, 3, 4, 5];
        let mut buf = [0u8; 16];
        assert_eq!(source.read_bytes(&mut buf, true).unwrap(), 5);
        assert_eq!(&buf[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(source.read_bytes(&mut buf, true).unwrap(), 0);
    }

    fn read_once<S: EventSource>(mut source: S, buf: &mut [u8]) -> usize {
        source.read_bytes(buf, false).unwrap()
    }

    #[test]
    fn test_forwarding_impls() {
        let mut cursor = Cursor::new(vec![9u8; 4]);
        let mut buf = [0u8; 2];
        assert_eq!(read_once(&mut cursor, &mut buf), 2);

        let mut boxed: Box<dyn EventSource> = Box::new(cursor);
        assert_eq!(read_once(&mut boxed, &mut buf), 2);
        assert_eq!(read_once(boxed, &mut buf), 0);
    }
}
