use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};

use crate::event::EventListener;
use crate::exit::{decode_wait_status, EXIT_SIGNALED};
use crate::pty::{self, PtyCommand, PtyError};
use crate::sys::{self, OwnedDescriptor, Pid, Readiness};
use crate::winsize::WindowSize;

/// Bytes requested from the master per read.
pub const READ_CHUNK_SIZE: usize = 4096;

/// A running command attached to a pseudo-terminal.
///
/// Output is pushed to the [`EventListener`] given at start from a dedicated
/// reader thread. `write`, `resize` and `kill` take `&self` and may be called
/// from any thread, including while the reader is blocked.
///
/// Dropping the session kills the child.
pub struct PtySession {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    reader_id: ThreadId,
}

/// State shared between the session handle and its reader thread.
struct Shared {
    /// Master side of the terminal, `None` once released after the reader
    /// has been joined. Callers clone the handle out of the lock, so the
    /// descriptor only closes when the last in-flight call has returned.
    master: RwLock<Option<Arc<OwnedDescriptor>>>,
    pid: Pid,
    /// `Some` until the reader has seen the child terminate. Signals are only
    /// sent while holding this lock, so a reaped pid is never targeted.
    child: Mutex<Option<Pid>>,
    /// Cleared exactly once, by `kill` or by the reader after the exit
    /// notification, always through compare-and-swap.
    running: AtomicBool,
    wake_rx: OwnedDescriptor,
    wake_tx: OwnedDescriptor,
    exit_code: OnceLock<i32>,
    size: Mutex<WindowSize>,
}

impl PtySession {
    /// Start `command` in a new PTY and begin streaming its output to `listener`.
    ///
    /// On success the reader thread is already running. On failure no process,
    /// thread or descriptor is left behind.
    pub fn start<L: EventListener>(command: &PtyCommand, listener: L) -> Result<Self, PtyError> {
        // Created before the fork so that a failure here leaves nothing to undo.
        let (wake_rx, wake_tx) = sys::pipe()?;
        let wake_rx = OwnedDescriptor::new(wake_rx);
        let wake_tx = OwnedDescriptor::new(wake_tx);

        let process = pty::spawn(command)?;
        let master = Arc::new(OwnedDescriptor::new(process.master));
        let shared = Arc::new(Shared::new(
            Arc::clone(&master),
            process.pid,
            wake_rx,
            wake_tx,
            command.get_size(),
        ));

        let reader_shared = Arc::clone(&shared);
        let reader = thread::Builder::new()
            .name(format!("pty-reader-{}", process.pid))
            .spawn(move || read_loop(reader_shared, master, listener));

        match reader {
            Ok(handle) => Ok(Self {
                shared,
                reader_id: handle.thread().id(),
                reader: Mutex::new(Some(handle)),
            }),
            Err(e) => {
                shared.abandon();
                Err(PtyError::SpawnFailed(format!(
                    "failed to spawn reader thread: {e}"
                )))
            }
        }
    }

    /// Process id of the child.
    pub fn pid(&self) -> i32 {
        self.shared.pid
    }

    /// `false` once the session has been killed or the child's exit has been
    /// reported.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// The exit code delivered to the listener, once it has been delivered.
    pub fn exit_code(&self) -> Option<i32> {
        self.shared.exit_code.get().copied()
    }

    /// The dimensions last applied to the terminal.
    pub fn size(&self) -> WindowSize {
        *lock(&self.shared.size)
    }

    /// The window size the kernel currently reports for this terminal, or
    /// `None` if the session is no longer running.
    pub fn window_size(&self) -> Option<WindowSize> {
        let master = self.shared.live_master()?;
        sys::window_size(master.raw()).ok()
    }

    /// Write bytes to the child's input.
    ///
    /// A no-op returning 0 once the session has stopped. Short writes are
    /// continued until everything is accepted, the session stops, or the
    /// descriptor reports an error; errors end the write silently, since the
    /// reader will report the session's end through the listener.
    /// Returns the number of bytes accepted.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let Some(master) = self.shared.live_master() else {
                break;
            };
            match sys::write(master.raw(), &data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) => {
                    log::debug!("PTY write to pid {} failed: {e}", self.shared.pid);
                    break;
                }
            }
        }
        written
    }

    /// Resize the terminal. Does nothing once the session has stopped.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let Some(master) = self.shared.live_master() else {
            return Ok(());
        };

        let size = WindowSize::new(cols, rows);
        sys::set_window_size(master.raw(), size).map_err(|e| PtyError::ResizeFailed(format!("{e}")))?;
        *lock(&self.shared.size) = size;
        Ok(())
    }

    /// Kill the child and release the session's resources.
    ///
    /// Idempotent and callable from any thread. Only the first call signals
    /// the child. Every call returns only after the reader thread has exited
    /// and the master descriptor is closed, so no listener callback can run
    /// afterwards. The one exception is a call made from inside a listener
    /// callback, which signals but cannot wait for its own thread.
    pub fn kill(&self) {
        if self
            .shared
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            log::debug!("killing PTY child pid {}", self.shared.pid);
            self.shared.signal_child();
            sys::wake(self.shared.wake_tx.raw());
        }

        self.release();
    }

    /// Wait for the child to exit on its own and return its exit code.
    ///
    /// Blocks until the reader thread has delivered the exit notification.
    /// Returns `None` when called from a listener callback.
    pub fn wait(&self) -> Option<i32> {
        self.release();
        self.exit_code()
    }

    /// Join the reader thread, then release the master.
    ///
    /// The reader slot stays locked until the descriptor is closed, so
    /// concurrent callers all return after teardown has finished.
    fn release(&self) {
        if thread::current().id() == self.reader_id {
            // Called from a listener callback; the reader cannot join itself,
            // and another thread may be holding the slot while joining it.
            return;
        }

        let mut reader = lock(&self.reader);
        if let Some(handle) = reader.take() {
            if handle.join().is_err() {
                log::warn!("PTY reader thread for pid {} panicked", self.shared.pid);
            }
        }

        self.shared.close_master();
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.kill();
    }
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("pid", &self.shared.pid)
            .field("running", &self.is_running())
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

impl Shared {
    fn new(
        master: Arc<OwnedDescriptor>,
        pid: Pid,
        wake_rx: OwnedDescriptor,
        wake_tx: OwnedDescriptor,
        size: WindowSize,
    ) -> Self {
        Self {
            master: RwLock::new(Some(master)),
            pid,
            child: Mutex::new(Some(pid)),
            running: AtomicBool::new(true),
            wake_rx,
            wake_tx,
            exit_code: OnceLock::new(),
            size: Mutex::new(size),
        }
    }

    /// A handle on the master, if the session is still running. The lock is
    /// only held for the clone.
    fn live_master(&self) -> Option<Arc<OwnedDescriptor>> {
        if !self.running.load(Ordering::Acquire) {
            return None;
        }
        self.master
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn signal_child(&self) {
        let child = lock(&self.child);
        if let Some(pid) = *child {
            if pid > 0 {
                if let Err(e) = sys::kill(pid) {
                    log::debug!("failed to signal PTY child pid {pid}: {e}");
                }
            }
        }
    }

    /// Take the pid away from `signal_child`.
    fn retire_child(&self) -> Option<Pid> {
        lock(&self.child).take()
    }

    /// Wait for the child and decode how it ended.
    fn reap_child(&self) -> i32 {
        // Wait without reaping first: the pid stays reserved while `kill`
        // may still be about to signal it.
        if let Err(e) = sys::wait_for_exit(self.pid) {
            log::debug!("waitid on PTY child pid {} failed: {e}", self.pid);
        }

        let Some(pid) = self.retire_child() else {
            return EXIT_SIGNALED;
        };

        match sys::reap(pid) {
            Ok(status) => decode_wait_status(status),
            Err(e) => {
                log::warn!("failed to reap PTY child pid {pid}: {e}");
                EXIT_SIGNALED
            }
        }
    }

    /// Drop the session's handle on the master. The descriptor closes once
    /// any call still holding a clone has returned.
    fn close_master(&self) {
        let master = self
            .master
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(master);
    }

    /// Stop a child that never got a reader thread: kill and reap it here.
    fn abandon(&self) {
        let _ = self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire);
        self.signal_child();
        if let Some(pid) = self.retire_child() {
            if let Err(e) = sys::reap(pid) {
                log::warn!("failed to reap PTY child pid {pid}: {e}");
            }
        }
        self.close_master();
    }
}

/// Body of the reader thread.
///
/// Forwards output until end-of-stream, a read error, or a wake from `kill`,
/// then reaps the child and reports its exit code exactly once. A panicking
/// listener kills the child; it is still reaped and `on_exit` still runs.
fn read_loop<L: EventListener>(
    shared: Arc<Shared>,
    handle: Arc<OwnedDescriptor>,
    mut listener: L,
) {
    let master = handle.raw();
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        match sys::wait_readable(master, shared.wake_rx.raw()) {
            Ok(Readiness::Readable) => {}
            Ok(Readiness::Woken) => break,
            Err(e) => {
                log::debug!("poll on PTY master {master} failed: {e}");
                break;
            }
        }

        let n = match sys::read(master, &mut buf) {
            Ok(0) => break, // EOF: slave side closed
            Ok(n) => n,
            Err(_) => break, // EIO once the child has gone away
        };

        let chunk = buf[..n].to_vec();
        if panic::catch_unwind(AssertUnwindSafe(|| listener.on_data(chunk))).is_err() {
            log::error!("PTY listener for pid {} panicked; killing the child", shared.pid);
            shared.signal_child();
            break;
        }
    }

    let exit_code = shared.reap_child();
    let _ = shared.exit_code.set(exit_code);
    if panic::catch_unwind(AssertUnwindSafe(|| listener.on_exit(exit_code))).is_err() {
        log::error!("PTY listener for pid {} panicked on exit", shared.pid);
    }

    // A concurrent kill may already have cleared the flag.
    let _ = shared
        .running
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire);

    log::debug!("PTY child pid {} exited with {exit_code}", shared.pid);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::event::PtyEvent;
    use crate::exit::EXEC_FAILED_EXIT_CODE;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn sh(script: &str) -> PtyCommand {
        let mut cmd = PtyCommand::new("/bin/sh");
        cmd.arg("-c").arg(script).env("PATH", "/usr/bin:/bin");
        cmd
    }

    fn start(cmd: &PtyCommand) -> (PtySession, mpsc::Receiver<PtyEvent>) {
        let (tx, rx) = mpsc::channel();
        let session = PtySession::start(cmd, move |event: PtyEvent| {
            let _ = tx.send(event);
        });
        assert!(session.is_ok(), "Failed to start session: {:?}", session.err());
        (session.unwrap(), rx)
    }

    /// Collect output until the exit event, then check nothing follows it.
    fn collect(rx: &mpsc::Receiver<PtyEvent>) -> (Vec<u8>, i32) {
        let deadline = Instant::now() + TIMEOUT;
        let mut output = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(PtyEvent::Data(data)) => output.extend_from_slice(&data),
                Ok(PtyEvent::Exit(code)) => {
                    // The listener is dropped with the reader thread.
                    assert!(
                        matches!(rx.recv_timeout(TIMEOUT), Err(RecvTimeoutError::Disconnected)),
                        "No event may follow the exit event"
                    );
                    return (output, code);
                }
                Err(e) => panic!(
                    "No exit event ({e}); output so far: {}",
                    String::from_utf8_lossy(&output)
                ),
            }
        }
    }

    /// Collect output until `needle` shows up.
    fn wait_for(rx: &mpsc::Receiver<PtyEvent>, needle: &str) -> Vec<u8> {
        let deadline = Instant::now() + TIMEOUT;
        let mut output = Vec::new();
        while !String::from_utf8_lossy(&output).contains(needle) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(PtyEvent::Data(data)) => output.extend_from_slice(&data),
                other => panic!(
                    "Expected {needle:?}, got {other:?}; output so far: {}",
                    String::from_utf8_lossy(&output)
                ),
            }
        }
        output
    }

    #[test]
    fn test_echo_hello() {
        let mut cmd = PtyCommand::new("/bin/echo");
        cmd.arg("hello");
        let (session, rx) = start(&cmd);

        let (output, code) = collect(&rx);
        // The default line discipline turns "\n" into "\r\n".
        let text = String::from_utf8_lossy(&output).replace("\r\n", "\n");
        assert_eq!(text, "hello\n");
        assert_eq!(code, 0);

        assert_eq!(session.wait(), Some(0));
        assert!(!session.is_running());
    }

    #[test]
    fn test_exit_code_42() {
        let (session, rx) = start(&sh("exit 42"));
        let (_, code) = collect(&rx);
        assert_eq!(code, 42);
        assert_eq!(session.wait(), Some(42));
    }

    #[test]
    fn test_signal_termination() {
        let (_session, rx) = start(&sh("kill -KILL $$"));
        let (_, code) = collect(&rx);
        assert_eq!(code, EXIT_SIGNALED);
    }

    #[test]
    fn test_nonexistent_executable() {
        let cmd = PtyCommand::new("/nonexistent/tether-no-such-binary");
        let (_session, rx) = start(&cmd);
        let (_, code) = collect(&rx);
        assert_eq!(code, EXEC_FAILED_EXIT_CODE);
    }

    #[test]
    fn test_kill_long_running() {
        let (session, rx) = start(&sh("sleep 30"));
        assert!(session.is_running());

        thread::sleep(Duration::from_millis(100));
        let started = Instant::now();
        session.kill();
        assert!(started.elapsed() < TIMEOUT, "kill took too long");

        assert!(!session.is_running());
        assert_eq!(session.exit_code(), Some(EXIT_SIGNALED));

        // Everything was delivered before kill returned.
        let events: Vec<PtyEvent> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&PtyEvent::Exit(EXIT_SIGNALED)));
        let exits = events
            .iter()
            .filter(|e| matches!(e, PtyEvent::Exit(_)))
            .count();
        assert_eq!(exits, 1);
    }

    #[test]
    fn test_kill_survives_background_holder() {
        // The background job keeps the slave open after the shell dies, so
        // the reader never sees EOF and must be woken by kill instead.
        let (session, rx) = start(&sh("sleep 30 & sleep 30"));
        thread::sleep(Duration::from_millis(100));
        session.kill();

        let events: Vec<PtyEvent> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&PtyEvent::Exit(EXIT_SIGNALED)));
    }

    #[test]
    fn test_concurrent_kill() {
        let (session, rx) = start(&sh("sleep 30"));
        let session = Arc::new(session);

        let killers: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    session.kill();
                    // Stopped as soon as any kill call returns.
                    assert!(!session.is_running());
                    assert_eq!(session.exit_code(), Some(EXIT_SIGNALED));
                })
            })
            .collect();

        for killer in killers {
            killer.join().unwrap();
        }

        let exits: Vec<PtyEvent> = rx
            .try_iter()
            .filter(|e| matches!(e, PtyEvent::Exit(_)))
            .collect();
        assert_eq!(exits, vec![PtyEvent::Exit(EXIT_SIGNALED)]);
    }

    #[test]
    fn test_write_after_kill_is_noop() {
        let (session, _rx) = start(&sh("sleep 30"));
        session.kill();

        assert_eq!(session.write(b"echo nope\n"), 0);
        assert!(session.resize(100, 50).is_ok());
        assert_eq!(session.window_size(), None);
        // Size is not updated by a resize on a stopped session.
        assert_eq!(session.size(), WindowSize::new(80, 24));
    }

    #[test]
    fn test_kill_after_natural_exit() {
        let (session, rx) = start(&sh("exit 3"));
        let (_, code) = collect(&rx);
        assert_eq!(code, 3);

        session.kill();
        session.kill();
        assert_eq!(session.exit_code(), Some(3));
        assert!(!session.is_running());
    }

    #[test]
    fn test_write_reaches_child() {
        let (session, rx) = start(&sh("read line; echo got:$line"));

        let data = b"ping\n";
        assert_eq!(session.write(data), data.len());

        let (output, code) = collect(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("got:ping"), "Unexpected output: {text:?}");
        assert_eq!(code, 0);
    }

    #[test]
    fn test_initial_size_applied() {
        let mut cmd = sh("stty size");
        cmd.size(100, 30);
        let (session, rx) = start(&cmd);
        assert_eq!(session.size(), WindowSize::new(100, 30));

        let (output, code) = collect(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("30 100"), "Unexpected stty output: {text:?}");
        assert_eq!(code, 0);
    }

    #[test]
    fn test_resize_reflected() {
        let (session, rx) = start(&sh("read line; stty size"));
        assert_eq!(session.window_size(), Some(WindowSize::new(80, 24)));

        session.resize(132, 43).unwrap();
        assert_eq!(session.window_size(), Some(WindowSize::new(132, 43)));
        assert_eq!(session.size(), WindowSize::new(132, 43));

        session.write(b"\n");
        let (output, code) = collect(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("43 132"), "Unexpected stty output: {text:?}");
        assert_eq!(code, 0);
    }

    #[test]
    fn test_env_is_passed_through() {
        let mut cmd = sh("echo value=$GREETING");
        cmd.env("GREETING", "hi-there");
        let (_session, rx) = start(&cmd);

        let (output, _) = collect(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("value=hi-there"), "Unexpected output: {text:?}");
    }

    #[test]
    fn test_large_output_is_chunked() {
        // 10000 lines of output is far more than one chunk.
        let (_session, rx) = start(&sh("i=0; while [ $i -lt 10000 ]; do echo line$i; i=$((i+1)); done"));

        let deadline = Instant::now() + TIMEOUT;
        let mut chunks = 0;
        let mut output = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining).expect("session should finish") {
                PtyEvent::Data(data) => {
                    assert!(!data.is_empty() && data.len() <= READ_CHUNK_SIZE);
                    chunks += 1;
                    output.extend_from_slice(&data);
                }
                PtyEvent::Exit(code) => {
                    assert_eq!(code, 0);
                    break;
                }
            }
        }

        assert!(chunks > 1);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("line9999"));
    }

    #[test]
    fn test_kill_from_listener() {
        let slot: Arc<Mutex<Option<Arc<PtySession>>>> = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::channel();

        let listener_slot = Arc::clone(&slot);
        let session = PtySession::start(&sh("read line; sleep 30"), move |event: PtyEvent| {
            if matches!(event, PtyEvent::Data(_)) {
                let current = listener_slot.lock().unwrap().clone();
                if let Some(session) = current {
                    session.kill();
                }
            }
            let _ = tx.send(event);
        })
        .unwrap();

        let session = Arc::new(session);
        *slot.lock().unwrap() = Some(Arc::clone(&session));

        // The terminal echoes this back, which triggers the listener.
        session.write(b"\n");

        let (_, code) = collect(&rx);
        assert_eq!(code, EXIT_SIGNALED);

        slot.lock().unwrap().take();
        session.kill();
        assert!(!session.is_running());
    }

    #[test]
    fn test_drop_reaps_child() {
        let (session, _rx) = start(&sh("sleep 30"));
        let pid = session.pid();
        assert!(pid > 0);

        drop(session);

        // The child has been killed and reaped, so it no longer exists.
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "Child {pid} should be gone after drop");
    }

    #[test]
    fn test_debug_format() {
        let (session, _rx) = start(&sh("sleep 30"));
        let text = format!("{session:?}");
        assert!(text.contains("PtySession"));
        assert!(text.contains(&session.pid().to_string()));
    }

    #[test]
    fn test_large_write_is_completed() {
        const LEN: usize = 200_000;
        let (session, rx) = start(&sh(&format!(
            "stty raw -echo; echo ready; head -c {LEN} >/dev/null; echo done"
        )));
        wait_for(&rx, "ready");

        // Far more than the terminal buffers, so the kernel accepts it in pieces.
        let data = vec![b'a'; LEN];
        assert_eq!(session.write(&data), LEN);

        let (output, code) = collect(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("done"), "Unexpected output: {text:?}");
        assert_eq!(code, 0);
    }

    #[test]
    fn test_write_racing_kill_stays_off_reused_descriptors() {
        let dir = std::env::temp_dir();
        for i in 0..50 {
            let (session, rx) = start(&sh("stty raw -echo; echo ready; cat >/dev/null"));
            wait_for(&rx, "ready");
            let session = Arc::new(session);

            let writer = {
                let session = Arc::clone(&session);
                thread::spawn(move || while session.write(b"SECRET") > 0 {})
            };
            thread::sleep(Duration::from_millis(2));
            session.kill();

            // Likely to land on the master's old descriptor number.
            let path = dir.join(format!("tether-reuse-{}-{i}", std::process::id()));
            let file = std::fs::File::create(&path).unwrap();
            writer.join().unwrap();
            drop(file);

            let len = std::fs::metadata(&path).unwrap().len();
            std::fs::remove_file(&path).unwrap();
            assert_eq!(len, 0, "Iteration {i}: session input reached {path:?}");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_descriptors_not_inherited() {
        let (first, _first_rx) = start(&sh("sleep 30"));
        let held = [
            first.shared.live_master().unwrap().raw(),
            first.shared.wake_rx.raw(),
            first.shared.wake_tx.raw(),
        ];

        // `[` is a shell builtin, so /proc/self is the second session's shell.
        let script = held
            .iter()
            .map(|fd| format!("[ -e /proc/self/fd/{fd} ] && echo leaked:{fd};"))
            .collect::<String>()
            + " echo checked";
        let (_second, rx) = start(&sh(&script));

        let (output, code) = collect(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("checked"), "Unexpected output: {text:?}");
        assert!(!text.contains("leaked"), "Descriptors {held:?} leaked: {text:?}");
        assert_eq!(code, 0);
    }

    #[test]
    fn test_abandon_kills_and_reaps_child() {
        let process = pty::spawn(&sh("sleep 30")).unwrap();
        let pid = process.pid;
        let (wake_rx, wake_tx) = sys::pipe().unwrap();
        let shared = Shared::new(
            Arc::new(OwnedDescriptor::new(process.master)),
            pid,
            OwnedDescriptor::new(wake_rx),
            OwnedDescriptor::new(wake_tx),
            WindowSize::default(),
        );

        shared.abandon();

        assert!(!shared.running.load(Ordering::Acquire));
        assert!(lock(&shared.child).is_none());
        assert!(shared.master.read().unwrap().is_none());
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "Child {pid} should be reaped");
    }

    #[test]
    fn test_panicking_listener_still_reaps_child() {
        let (tx, rx) = mpsc::channel();
        let session = PtySession::start(&sh("echo hi; sleep 30"), move |event: PtyEvent| {
            match event {
                PtyEvent::Data(_) => panic!("listener failure"),
                PtyEvent::Exit(code) => {
                    let _ = tx.send(code);
                }
            }
        })
        .unwrap();
        let pid = session.pid();

        assert_eq!(rx.recv_timeout(TIMEOUT), Ok(EXIT_SIGNALED));
        assert_eq!(session.wait(), Some(EXIT_SIGNALED));
        assert!(!session.is_running());

        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "Child {pid} should be reaped");
    }
}
