use std::ffi::{c_char, c_int, CStr};
use std::io;
use std::mem;
use std::ptr;

use super::{Fd, Pid, Readiness};
use crate::exit::EXEC_FAILED_EXIT_CODE;
use crate::winsize::WindowSize;

/// Signals restored to their default disposition in the child before exec.
/// Ignored dispositions survive `execve`, and the Rust runtime ignores
/// `SIGPIPE` in every process it starts.
const RESET_SIGNALS: [c_int; 7] = [
    libc::SIGPIPE,
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTERM,
    libc::SIGCHLD,
    libc::SIGTSTP,
];

/// Allocate a PTY pair of the given size and fork a child attached to it.
///
/// `argv` and `envp` must be null-terminated pointer arrays whose strings
/// outlive this call. The child never returns from here: it either becomes
/// `program` or exits with [`EXEC_FAILED_EXIT_CODE`]. The parent gets the
/// master descriptor and the child's pid.
pub(crate) fn fork_pty(
    program: &CStr,
    argv: &[*const c_char],
    envp: &[*const c_char],
    size: WindowSize,
) -> io::Result<(Fd, Pid)> {
    debug_assert!(argv.last().is_some_and(|p| p.is_null()));
    debug_assert!(envp.last().is_some_and(|p| p.is_null()));

    let mut ws: libc::winsize = size.into();
    let mut master: c_int = -1;

    // Built before fork: the child may only make async-signal-safe calls.
    // SAFETY: sigset_t is plain old data.
    let mut empty_mask: libc::sigset_t = unsafe { mem::zeroed() };
    // SAFETY: `empty_mask` is valid for writes.
    unsafe { libc::sigemptyset(&mut empty_mask) };

    // SAFETY: sigaction is plain old data; all-zero means no flags.
    let mut default_action: libc::sigaction = unsafe { mem::zeroed() };
    default_action.sa_sigaction = libc::SIG_DFL;
    // SAFETY: `sa_mask` is valid for writes.
    unsafe { libc::sigemptyset(&mut default_action.sa_mask) };

    // SAFETY: all pointers are valid for the duration of the call; the name
    // and termios arguments may be null.
    let pid = unsafe {
        libc::forkpty(
            &mut master,
            ptr::null_mut::<c_char>(),
            ptr::null_mut::<libc::termios>(),
            &mut ws,
        )
    };

    if pid < 0 {
        return Err(io::Error::last_os_error());
    }

    if pid == 0 {
        // SAFETY: this is the forked child. Everything it touches was
        // allocated before the fork.
        unsafe { exec_child(program, argv, envp, &default_action, &empty_mask) }
    }

    Ok((master, pid))
}

/// Child side of [`fork_pty`]. Only async-signal-safe calls are allowed here.
unsafe fn exec_child(
    program: &CStr,
    argv: &[*const c_char],
    envp: &[*const c_char],
    default_action: &libc::sigaction,
    mask: &libc::sigset_t,
) -> ! {
    for signal in RESET_SIGNALS {
        libc::sigaction(signal, default_action, ptr::null_mut());
    }
    libc::sigprocmask(libc::SIG_SETMASK, mask, ptr::null_mut());

    libc::execve(program.as_ptr(), argv.as_ptr(), envp.as_ptr());

    // Only reached if execve failed. _exit skips atexit handlers and stdio
    // buffers inherited from the parent.
    libc::_exit(EXEC_FAILED_EXIT_CODE)
}

/// Mark a descriptor close-on-exec.
pub(crate) fn set_cloexec(fd: Fd) -> io::Result<()> {
    // SAFETY: fcntl on an integer descriptor has no memory-safety requirements.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Create a close-on-exec pipe, returning `(read_end, write_end)`.
pub(crate) fn pipe() -> io::Result<(Fd, Fd)> {
    let mut fds: [c_int; 2] = [-1, -1];
    // SAFETY: `fds` has room for the two descriptors pipe writes.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    for fd in fds {
        if let Err(err) = set_cloexec(fd) {
            close(fds[0]);
            close(fds[1]);
            return Err(err);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Close a descriptor. Not retried on `EINTR`: the descriptor is gone either way.
pub(crate) fn close(fd: Fd) {
    if fd >= 0 {
        // SAFETY: the caller owns `fd` and never uses it again.
        unsafe { libc::close(fd) };
    }
}

/// Blocking read, retried on `EINTR`.
pub(crate) fn read(fd: Fd, buf: &mut [u8]) -> io::Result<usize> {
    retry(|| {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) }
    })
}

/// A single `write` call, retried only on `EINTR`.
pub(crate) fn write(fd: Fd, buf: &[u8]) -> io::Result<usize> {
    retry(|| {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) }
    })
}

fn retry(mut call: impl FnMut() -> isize) -> io::Result<usize> {
    loop {
        let n = call();
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Block until `fd` is readable (or hung up) or `wake` has been written to.
/// A pending wake takes priority over pending data.
pub(crate) fn wait_readable(fd: Fd, wake: Fd) -> io::Result<Readiness> {
    let mut fds = [
        libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: wake,
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    loop {
        // SAFETY: `fds` is a valid array of two pollfd entries.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if fds[1].revents != 0 {
            return Ok(Readiness::Woken);
        }
        if fds[0].revents != 0 {
            return Ok(Readiness::Readable);
        }
    }
}

/// Nudge a reader blocked in [`wait_readable`].
pub(crate) fn wake(fd: Fd) {
    if fd >= 0 {
        let _ = write(fd, &[1]);
    }
}

/// Push a new window size to the terminal behind `fd`.
pub(crate) fn set_window_size(fd: Fd, size: WindowSize) -> io::Result<()> {
    let ws: libc::winsize = size.into();
    // SAFETY: TIOCSWINSZ reads one winsize through the pointer.
    if unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws as *const libc::winsize) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Query the window size of the terminal behind `fd`.
pub(crate) fn window_size(fd: Fd) -> io::Result<WindowSize> {
    // SAFETY: winsize is plain old data.
    let mut ws: libc::winsize = unsafe { mem::zeroed() };
    // SAFETY: TIOCGWINSZ writes one winsize through the pointer.
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws as *mut libc::winsize) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ws.into())
}

/// Send `SIGKILL` to `pid`.
pub(crate) fn kill(pid: Pid) -> io::Result<()> {
    // SAFETY: kill has no memory-safety requirements.
    if unsafe { libc::kill(pid, libc::SIGKILL) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Block until `pid` has terminated, leaving it unreaped.
///
/// The pid stays reserved as a zombie until [`reap`] runs, so it cannot be
/// recycled while someone may still signal it.
pub(crate) fn wait_for_exit(pid: Pid) -> io::Result<()> {
    // SAFETY: siginfo_t is plain old data.
    let mut info: libc::siginfo_t = unsafe { mem::zeroed() };
    loop {
        // SAFETY: `info` is valid for writes.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Reap `pid`, returning its raw wait status.
pub(crate) fn reap(pid: Pid) -> io::Result<i32> {
    let mut status: c_int = 0;
    loop {
        // SAFETY: `status` is valid for writes.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == pid {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if rc < 0 && err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(err);
    }
}
