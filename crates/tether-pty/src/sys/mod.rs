//! Thin wrappers over the platform calls a PTY session needs.
//!
//! Descriptors and pids cross this boundary as plain integers. Long-lived
//! descriptors are held in an [`OwnedDescriptor`], which closes on drop.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::*;

#[cfg(not(unix))]
mod unsupported;
#[cfg(not(unix))]
pub(crate) use unsupported::*;

/// Raw file descriptor. Negative values mean "no descriptor".
pub(crate) type Fd = i32;

/// A descriptor closed when the last owner drops it.
///
/// Sessions share it behind an `Arc`, so a call that cloned the handle keeps
/// the descriptor number reserved until the call returns.
#[derive(Debug)]
pub(crate) struct OwnedDescriptor(Fd);

impl OwnedDescriptor {
    /// Take ownership of `fd`. Nothing else may close it.
    pub(crate) fn new(fd: Fd) -> Self {
        Self(fd)
    }

    pub(crate) fn raw(&self) -> Fd {
        self.0
    }
}

impl Drop for OwnedDescriptor {
    fn drop(&mut self) {
        close(self.0);
    }
}

/// Raw process id.
pub(crate) type Pid = i32;

/// Why the reader woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// The master has data, or has hung up; the next read tells which.
    Readable,
    /// Something was written to the wake pipe.
    Woken,
}
