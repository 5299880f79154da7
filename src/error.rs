// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;

/// Failure to spawn a new task onto a [`Runtime`](crate::runtime::Runtime).
#[derive(Debug)]
pub enum SpawnError {
    /// The runtime has already been shut down; no new tasks are accepted.
    Closed,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Closed => f.write_str("runtime was shut down"),
        }
    }
}

impl std::error::Error for SpawnError {}

impl From<Closed> for SpawnError {
    fn from(_: Closed) -> Self {
        Self::Closed
    }
}

/// A marker returned when an operation targets an already-closed collaborator
/// (a dropped channel half, a shut-down runtime, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Closed(pub(crate) ());

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("closed")
    }
}

impl std::error::Error for Closed {}

/// Failure modes for a reactor-backed I/O operation, surfaced as the
/// `Ready(Err(_))` branch of the operation's pollable output.
#[derive(Debug)]
pub enum IoOpError {
    /// The underlying OS call failed.
    Io(io::Error),
    /// The operation was cancelled: its pollable was dropped before it
    /// completed, which deregisters the underlying reactor registration
    /// through the bridge's `Drop` impl.
    Cancelled,
    /// A [`crate::time::timeout`] wrapping the operation elapsed first.
    TimedOut,
}

impl fmt::Display for IoOpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOpError::Io(e) => write!(f, "I/O error: {e}"),
            IoOpError::Cancelled => f.write_str("operation cancelled"),
            IoOpError::TimedOut => f.write_str("operation timed out"),
        }
    }
}

impl std::error::Error for IoOpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoOpError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for IoOpError {
    fn from(e: io::Error) -> Self {
        IoOpError::Io(e)
    }
}

/// Fatal startup/teardown failures.
#[derive(Debug)]
pub enum RuntimeError {
    /// The reactor backend (`mio::Poll::new`) failed to initialize.
    ReactorInit(io::Error),
    /// A worker OS thread failed to spawn.
    WorkerSpawn(io::Error),
    /// [`crate::Builder::io_backend`] requested a backend `mio` does not
    /// back on the current platform.
    UnsupportedIoBackend(crate::runtime::IoBackend),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::ReactorInit(e) => write!(f, "failed to initialize I/O reactor: {e}"),
            RuntimeError::WorkerSpawn(e) => write!(f, "failed to spawn worker thread: {e}"),
            RuntimeError::UnsupportedIoBackend(backend) => {
                write!(f, "I/O backend {backend:?} is not available on this platform")
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::ReactorInit(e) | RuntimeError::WorkerSpawn(e) => Some(e),
            RuntimeError::UnsupportedIoBackend(_) => None,
        }
    }
}
