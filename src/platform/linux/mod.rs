//! Linux evdev sources.
//!
//! Event nodes live under `/dev/input/event*`. Reading them requires root or
//! membership in the `input` group:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

mod fd;

pub use fd::FdSource;
