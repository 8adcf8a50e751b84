/// Something that happened on a PTY session, as seen by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// Raw output from the child, exactly as read from the master.
    Data(Vec<u8>),
    /// The child is gone. Always the last event of a session.
    Exit(i32),
}

/// Receives output and the exit notification of one session.
///
/// Both methods run on the session's reader thread. `on_data` is called zero
/// or more times, then `on_exit` exactly once; nothing follows it.
pub trait EventListener: Send + 'static {
    fn on_data(&mut self, data: Vec<u8>);

    fn on_exit(&mut self, exit_code: i32);
}

impl<F> EventListener for F
where
    F: FnMut(PtyEvent) + Send + 'static,
{
    fn on_data(&mut self, data: Vec<u8>) {
        self(PtyEvent::Data(data))
    }

    fn on_exit(&mut self, exit_code: i32) {
        self(PtyEvent::Exit(exit_code))
    }
}
