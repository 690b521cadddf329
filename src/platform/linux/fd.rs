//! File-descriptor backed event sources.
//!
//! `File`, `OwnedFd` and [`FdSource`] all read through the same path:
//! `poll(2)` first, with a zero timeout for non-blocking reads and no timeout
//! for blocking ones, then `read(2)`. The descriptor's own `O_NONBLOCK` flag
//! does not matter.

use crate::source::EventSource;
use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

/// Reads raw records from a borrowed evdev descriptor.
///
/// The descriptor stays owned by the caller; dropping an `FdSource` does not
/// close it. Closing the descriptor from elsewhere makes the next read fail.
///
/// ```no_run
/// use evstream::{FdSource, ReadOutcome, StreamReader};
/// use std::fs::File;
/// use std::os::fd::AsFd;
///
/// let file = File::open("/dev/input/event0").expect("failed to open device");
/// let mut reader = StreamReader::new(FdSource::new(file.as_fd()));
/// if let Ok(ReadOutcome::Event(event)) = reader.next_event(true) {
///     println!("{event}");
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FdSource<'fd> {
    fd: BorrowedFd<'fd>,
}

impl<'fd> FdSource<'fd> {
    /// Wrap a borrowed descriptor.
    pub fn new(fd: BorrowedFd<'fd>) -> Self {
        Self { fd }
    }

    /// The wrapped descriptor.
    pub fn fd(&self) -> BorrowedFd<'fd> {
        self.fd
    }
}

impl EventSource for FdSource<'_> {
    fn read_bytes(&mut self, buf: &mut [u8], blocking: bool) -> io::Result<usize> {
        read_fd(self.fd, buf, blocking)
    }
}

impl EventSource for File {
    fn read_bytes(&mut self, buf: &mut [u8], blocking: bool) -> io::Result<usize> {
        read_fd(self.as_fd(), buf, blocking)
    }
}

impl EventSource for OwnedFd {
    fn read_bytes(&mut self, buf: &mut [u8], blocking: bool) -> io::Result<usize> {
        read_fd(self.as_fd(), buf, blocking)
    }
}

/// Wait until `fd` is readable. Returns `false` when `blocking` is off and
/// nothing is pending.
fn wait_readable(fd: BorrowedFd<'_>, blocking: bool) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout = if blocking { -1 } else { 0 };

    loop {
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        // POLLHUP/POLLERR also count as ready; the read reports the error.
        return Ok(ret > 0);
    }
}

fn read_fd(fd: BorrowedFd<'_>, buf: &mut [u8], blocking: bool) -> io::Result<usize> {
    loop {
        if !wait_readable(fd, blocking)? {
            return Err(ErrorKind::WouldBlock.into());
        }

        let ret = unsafe {
            libc::read(
                fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            match err.kind() {
                ErrorKind::Interrupted => continue,
                // Another reader drained the node between poll and read.
                ErrorKind::WouldBlock if blocking => continue,
                _ => return Err(err),
            }
        }
        return Ok(ret as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reader::{ReadOutcome, StreamReader};
    use crate::record::{RawRecord, RecordLayout};
    use crate::registry::EventCode;
    use std::io::Write;
    use std::os::fd::FromRawFd;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn pipe() -> (File, File) {
        let mut fds = [0; 2];
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(ret, 0, "pipe failed: {}", io::Error::last_os_error());
        let read = unsafe { OwnedFd::from_raw_fd(fds[0]) };
        let write = unsafe { OwnedFd::from_raw_fd(fds[1]) };
        (File::from(read), File::from(write))
    }

    fn key_record(code: u16, value: i32) -> Vec<u8> {
        RawRecord {
            sec: 1,
            usec: 0,
            ty: 0x01,
            code,
            value,
        }
        .encode(RecordLayout::native())
    }

    #[test]
    fn test_nonblocking_empty_pipe() {
        let (read, _write) = pipe();
        let mut source = FdSource::new(read.as_fd());
        let mut buf = [0u8; 24];
        let err = source.read_bytes(&mut buf, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn test_reads_pending_data() {
        let (read, mut write) = pipe();
        write.write_all(&[7u8; 24]).unwrap();

        let mut source = FdSource::new(read.as_fd());
        let mut buf = [0u8; 24];
        assert_eq!(source.read_bytes(&mut buf, false).unwrap(), 24);
        assert_eq!(buf, [7u8; 24]);
    }

    #[test]
    fn test_closed_writer_reads_eof() {
        let (read, write) = pipe();
        drop(write);

        let mut source = FdSource::new(read.as_fd());
        let mut buf = [0u8; 24];
        assert_eq!(source.read_bytes(&mut buf, true).unwrap(), 0);
    }

    #[test]
    fn test_file_nonblocking_read_returns_at_once() {
        // The pipe is in blocking mode; the call must still return.
        let (read, _write) = pipe();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = StreamReader::new(read);
            let outcome = reader.next_event(false).map_err(|e| e.to_string());
            let drained = reader.drain().count();
            let _ = tx.send((outcome, drained));
        });

        let (outcome, drained) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("non-blocking read did not return");
        assert_eq!(outcome, Ok(ReadOutcome::NoEventAvailable));
        assert_eq!(drained, 0);
    }

    #[test]
    fn test_blocking_read_waits_for_writer() {
        let (read, mut write) = pipe();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            write.write_all(&key_record(30, 1)).unwrap();
            write
        });

        let mut reader = StreamReader::new(FdSource::new(read.as_fd()));
        let event = reader.next_event(true).unwrap().event().unwrap();
        assert!(event.matches(EventCode::KEY_A));
        assert_eq!(reader.tracker().value_for(EventCode::KEY_A).unwrap(), 1);

        let _write = writer.join().unwrap();
    }

    #[test]
    fn test_blocking_read_reports_closed_writer() {
        let (read, mut write) = pipe();
        write.write_all(&key_record(48, 1)).unwrap();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(write);
        });

        let mut reader = StreamReader::new(read);
        let event = reader.next_event(true).unwrap().event().unwrap();
        assert!(event.matches(EventCode::KEY_B));
        assert!(matches!(reader.next_event(true), Err(Error::Closed)));

        writer.join().unwrap();
    }

    #[test]
    fn test_record_split_across_writes() {
        let (read, mut write) = pipe();
        let record = key_record(30, 1);
        write.write_all(&record[..10]).unwrap();

        let mut reader = StreamReader::new(read);
        assert_eq!(reader.next_event(false).unwrap(), ReadOutcome::NoEventAvailable);

        write.write_all(&record[10..]).unwrap();
        let event = reader.next_event(false).unwrap().event().unwrap();
        assert!(event.matches(EventCode::KEY_A));
    }
}
