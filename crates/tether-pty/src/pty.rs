use std::ffi::{c_char, CString};
use std::io;

use crate::sys::{self, Fd, Pid};
use crate::winsize::WindowSize;

/// Errors from PTY operations.
#[derive(Debug)]
pub enum PtyError {
    SpawnFailed(String),
    IoError(std::io::Error),
    ResizeFailed(String),
    InvalidArgument(String),
    Unsupported,
}

impl std::fmt::Display for PtyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PtyError::SpawnFailed(msg) => write!(f, "PTY spawn failed: {msg}"),
            PtyError::IoError(err) => write!(f, "PTY I/O error: {err}"),
            PtyError::ResizeFailed(msg) => write!(f, "PTY resize failed: {msg}"),
            PtyError::InvalidArgument(msg) => write!(f, "invalid PTY command: {msg}"),
            PtyError::Unsupported => {
                write!(f, "PTY sessions are not supported on this platform")
            }
        }
    }
}

impl std::error::Error for PtyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PtyError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PtyError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == io::ErrorKind::Unsupported {
            PtyError::Unsupported
        } else {
            PtyError::IoError(err)
        }
    }
}

/// What to run inside a new PTY.
///
/// The program path is used as-is (no `PATH` lookup) and becomes `argv[0]`.
/// The child sees exactly the environment assignments given here and nothing
/// inherited from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyCommand {
    program: String,
    args: Vec<String>,
    env: Vec<String>,
    size: WindowSize,
}

impl PtyCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            size: WindowSize::new(WindowSize::DEFAULT_COLS, WindowSize::DEFAULT_ROWS),
        }
    }

    /// Append one argument.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a `key=value` environment assignment.
    pub fn env(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        self.env
            .push(format!("{}={}", key.as_ref(), value.as_ref()));
        self
    }

    /// Add a preformatted `KEY=VALUE` assignment.
    pub fn env_assignment(&mut self, assignment: impl Into<String>) -> &mut Self {
        self.env.push(assignment.into());
        self
    }

    /// Initial terminal dimensions, applied when the PTY is allocated.
    pub fn size(&mut self, cols: u16, rows: u16) -> &mut Self {
        self.size = WindowSize::new(cols, rows);
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &[String] {
        &self.env
    }

    pub fn get_size(&self) -> WindowSize {
        self.size
    }
}

/// A freshly forked child and the master side of its PTY.
#[derive(Debug)]
pub(crate) struct PtyProcess {
    pub master: Fd,
    pub pid: Pid,
}

/// Allocate a PTY sized per `command` and start the command on its slave side.
///
/// Fails without creating a process if the command cannot be represented as
/// C strings. A failed `execve` is not an error here: the child exits with
/// [`EXEC_FAILED_EXIT_CODE`](crate::exit::EXEC_FAILED_EXIT_CODE).
pub(crate) fn spawn(command: &PtyCommand) -> Result<PtyProcess, PtyError> {
    let image = ExecImage::new(command)?;

    let (master, pid) = sys::fork_pty(
        &image.program,
        &image.argv_ptrs,
        &image.envp_ptrs,
        command.size,
    )
    .map_err(|e| match e.kind() {
        io::ErrorKind::Unsupported => PtyError::Unsupported,
        _ => PtyError::SpawnFailed(format!("forkpty failed: {e}")),
    })?;

    // Keep the master out of children forked by other sessions.
    if let Err(e) = sys::set_cloexec(master) {
        log::warn!("failed to mark PTY master {master} close-on-exec: {e}");
    }

    log::debug!(
        "spawned {} (pid {pid}) on PTY master {master}, {}x{}",
        command.program,
        command.size.cols,
        command.size.rows
    );

    Ok(PtyProcess { master, pid })
}

/// The argv/envp of a command as null-terminated C arrays.
///
/// Built before forking so the child never allocates.
struct ExecImage {
    program: CString,
    argv_ptrs: Vec<*const c_char>,
    envp_ptrs: Vec<*const c_char>,
    // The pointer arrays point into these. CString contents live on the heap,
    // so moving the vectors does not invalidate them.
    _argv: Vec<CString>,
    _envp: Vec<CString>,
}

impl ExecImage {
    fn new(command: &PtyCommand) -> Result<Self, PtyError> {
        if command.program.is_empty() {
            return Err(PtyError::InvalidArgument("empty command path".to_string()));
        }

        let program = c_string("command path", &command.program)?;

        let mut argv = Vec::with_capacity(command.args.len() + 1);
        argv.push(program.clone());
        for arg in &command.args {
            argv.push(c_string("argument", arg)?);
        }

        let mut envp = Vec::with_capacity(command.env.len());
        for assignment in &command.env {
            match assignment.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(PtyError::InvalidArgument(format!(
                        "environment entry is not KEY=VALUE: {assignment:?}"
                    )))
                }
            }
            envp.push(c_string("environment entry", assignment)?);
        }

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        Ok(Self {
            program,
            argv_ptrs,
            envp_ptrs,
            _argv: argv,
            _envp: envp,
        })
    }
}

fn c_string(what: &str, value: &str) -> Result<CString, PtyError> {
    CString::new(value)
        .map_err(|_| PtyError::InvalidArgument(format!("{what} contains a NUL byte: {value:?}")))
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Returns the user's default shell, falling back to `/bin/sh`.
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}
