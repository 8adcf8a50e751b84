//! tether-pty: pseudo-terminal sessions for a single child process.
//!
//! A session allocates a PTY pair, forks and execs a command on the slave
//! side, and streams the master's output to a listener from a dedicated
//! reader thread. Input, resizes and termination go straight to the kernel
//! from whichever thread calls them.
//!
//! # Architecture
//!
//! - [`PtySession`] — Owns the master descriptor, the child pid and the
//!   reader thread; exposes `write`, `resize` and `kill`.
//! - [`PtyCommand`] — What to launch: program, arguments, environment and
//!   initial size.
//! - [`EventListener`] — Receives output chunks and exactly one exit code.
//! - [`decode_wait_status`] — Maps raw wait statuses to exit codes.
//!
//! Only POSIX hosts are supported; elsewhere every launch fails with
//! [`PtyError::Unsupported`].

pub mod event;
pub mod exit;
pub mod pty;
pub mod session;
mod sys;
pub mod winsize;

pub use event::{EventListener, PtyEvent};
pub use exit::{decode_wait_status, EXEC_FAILED_EXIT_CODE, EXIT_SIGNALED};
pub use pty::{default_shell, PtyCommand, PtyError};
pub use session::{PtySession, READ_CHUNK_SIZE};
pub use winsize::WindowSize;
