//! Stand-ins for hosts without fork, exec or pseudo-terminals. Every call
//! that would need them fails with `ErrorKind::Unsupported`.

use std::ffi::{c_char, CStr};
use std::io;

use super::{Fd, Pid, Readiness};
use crate::winsize::WindowSize;

fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "PTY sessions are not supported on this platform",
    )
}

pub(crate) fn fork_pty(
    _program: &CStr,
    _argv: &[*const c_char],
    _envp: &[*const c_char],
    _size: WindowSize,
) -> io::Result<(Fd, Pid)> {
    Err(unsupported())
}

pub(crate) fn set_cloexec(_fd: Fd) -> io::Result<()> {
    Err(unsupported())
}

pub(crate) fn pipe() -> io::Result<(Fd, Fd)> {
    Err(unsupported())
}

pub(crate) fn close(_fd: Fd) {}

pub(crate) fn read(_fd: Fd, _buf: &mut [u8]) -> io::Result<usize> {
    Err(unsupported())
}

pub(crate) fn write(_fd: Fd, _buf: &[u8]) -> io::Result<usize> {
    Err(unsupported())
}

pub(crate) fn wait_readable(_fd: Fd, _wake: Fd) -> io::Result<Readiness> {
    Err(unsupported())
}

pub(crate) fn wake(_fd: Fd) {}

pub(crate) fn set_window_size(_fd: Fd, _size: WindowSize) -> io::Result<()> {
    Err(unsupported())
}

pub(crate) fn window_size(_fd: Fd) -> io::Result<WindowSize> {
    Err(unsupported())
}

pub(crate) fn kill(_pid: Pid) -> io::Result<()> {
    Err(unsupported())
}

pub(crate) fn wait_for_exit(_pid: Pid) -> io::Result<()> {
    Err(unsupported())
}

pub(crate) fn reap(_pid: Pid) -> io::Result<i32> {
    Err(unsupported())
}
