//! Request handlers.
//!
//! Each handler returns `Result<(), String>`; failures become `error` events
//! in [`handle_line`].

use tether_pty::{PtyCommand, PtyEvent, PtySession};

use crate::ipc::{self, Event, OutputDecoder, Request};
use crate::state::AppState;

/// Parse and run one line of input, reporting failures as `error` events.
pub fn handle_line(state: &mut AppState, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let result = ipc::parse_request(line).and_then(|request| dispatch(state, request));
    if let Err(message) = result {
        log::warn!("{message}");
        state.sink.emit(&Event::error(message));
    }
}

pub fn dispatch(state: &mut AppState, request: Request) -> Result<(), String> {
    match request {
        Request::Start {
            sh,
            args,
            env,
            cols,
            rows,
        } => start_session(state, sh, args, env, cols, rows),
        Request::Write { data } => write_input(state, &data),
        Request::Resize { cols, rows } => resize_session(state, cols, rows),
        Request::Kill => kill_session(state),
    }
}

/// Launch a command in a new PTY, killing the previous session first.
///
/// Output and the exit code are streamed to the sink from the session's
/// reader thread.
pub fn start_session(
    state: &mut AppState,
    sh: Option<String>,
    args: Vec<String>,
    env: Vec<(String, String)>,
    cols: Option<u16>,
    rows: Option<u16>,
) -> Result<(), String> {
    state.shutdown();

    let program = sh.unwrap_or_else(|| state.config.shell.clone());
    let mut command = PtyCommand::new(program);
    command.args(args).size(
        cols.unwrap_or(state.config.cols),
        rows.unwrap_or(state.config.rows),
    );
    for (key, value) in &env {
        command.env(key, value);
    }

    let sink = state.sink.clone();
    let mut decoder = OutputDecoder::default();
    let session = PtySession::start(&command, move |event: PtyEvent| match event {
        PtyEvent::Data(chunk) => {
            if let Some(event) = decoder.push(chunk) {
                sink.emit(&event);
            }
        }
        PtyEvent::Exit(code) => {
            if let Some(event) = decoder.finish() {
                sink.emit(&event);
            }
            sink.emit(&Event::PtyExit { code });
        }
    })
    .map_err(|e| format!("Failed to start pty: {e}"))?;

    log::info!(
        "started {} as pid {}",
        command.get_program(),
        session.pid()
    );
    state.session = Some(session);
    Ok(())
}

/// Write UTF-8 input to the current session.
pub fn write_input(state: &mut AppState, data: &str) -> Result<(), String> {
    let session = current(state)?;
    let written = session.write(data.as_bytes());
    if written < data.len() {
        log::debug!("wrote {written} of {} bytes", data.len());
    }
    Ok(())
}

pub fn resize_session(state: &mut AppState, cols: u16, rows: u16) -> Result<(), String> {
    current(state)?
        .resize(cols, rows)
        .map_err(|e| format!("Resize error: {e}"))
}

/// Kill the current session. Its `pty-exit` event is written before this returns.
pub fn kill_session(state: &mut AppState) -> Result<(), String> {
    current(state)?.kill();
    Ok(())
}

fn current(state: &AppState) -> Result<&PtySession, String> {
    state
        .session
        .as_ref()
        .ok_or_else(|| "No session; send a start request first".to_string())
}
