//! Decoding of raw `wait` statuses into the exit codes reported to listeners.

/// Exit code reported when the child was killed by a signal, or when it could
/// not be reaped at all.
pub const EXIT_SIGNALED: i32 = -1;

/// Exit code the child uses when `execve` fails.
///
/// Shells use the same value for "command not found", so a program that
/// legitimately exits with 127 is indistinguishable from a failed exec.
pub const EXEC_FAILED_EXIT_CODE: i32 = 127;

/// Normalize a raw status as filled in by `waitpid`.
///
/// Follows the POSIX `WIFEXITED`/`WEXITSTATUS` layout: a status whose low
/// seven bits are zero is a normal exit carrying its code in bits 8..16.
/// Everything else (signal termination, stop notifications) maps to
/// [`EXIT_SIGNALED`].
pub fn decode_wait_status(status: i32) -> i32 {
    if exited_normally(status) {
        (status >> 8) & 0xff
    } else {
        EXIT_SIGNALED
    }
}

fn exited_normally(status: i32) -> bool {
    status & 0x7f == 0
}
