//! Host state shared between the request loop and the session's reader thread.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tether_pty::PtySession;

use crate::config::AppConfig;
use crate::ipc::Event;

/// Serializes events as JSON lines onto a shared writer.
///
/// Cloned into each session's listener, so output from the reader thread
/// and errors from the request loop never interleave mid-line.
#[derive(Clone)]
pub struct EventSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl EventSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    /// Write one event. Failures are logged; there is nowhere else to report them.
    pub fn emit(&self, event: &Event) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                log::error!("failed to serialize event {event:?}: {e}");
                return;
            }
        };

        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            log::warn!("failed to write event: {e}");
        }
    }
}

/// Everything the request loop owns.
pub struct AppState {
    pub config: AppConfig,
    pub sink: EventSink,
    /// The current session. Replaced by `start`, kept after it exits.
    pub session: Option<PtySession>,
}

impl AppState {
    pub fn new(config: AppConfig, sink: EventSink) -> Self {
        Self {
            config,
            sink,
            session: None,
        }
    }

    /// Kill the current session, if any, and wait for its exit event.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("shutting down session pid {}", session.pid());
            session.kill();
        }
    }
}
