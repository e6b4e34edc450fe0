//! Engine session
//!
//! Owns one engine connection for its whole life and turns the engine's
//! asynchronous output into [`SessionEvent`]s.
//!
//! Every command that expects an answer becomes a pending request tagged
//! with a [`RequestTag`]. The tag carries the session epoch, which is bumped
//! on every position change, so output produced for an earlier position can
//! be recognised and dropped by the owner.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use super::protocol::{Completion, EngineCommand, EngineOutput};
use super::transport::EngineTransport;
use crate::error::{Error, Result};

/// Lifecycle of a session. A terminated session never comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    NotStarted,
    Initializing,
    Ready,
    Terminated,
}

/// Static engine options sent once the handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Number of ranked lines (`MultiPV`)
    pub multipv: u32,
    /// Value of the `Use NNUE` option
    pub use_nnue: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            multipv: 5,
            use_nnue: true,
        }
    }
}

impl SessionConfig {
    /// Whether `info` lines must carry a `multipv` rank
    pub fn multi_variation(&self) -> bool {
        self.multipv > 1
    }
}

/// Which deliveries the caller wants for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// One [`SessionEvent::Stream`] per output line while outstanding
    pub streaming: bool,
    /// One [`SessionEvent::Final`] when the command completes
    pub final_response: bool,
}

impl Reply {
    pub const NONE: Reply = Reply {
        streaming: false,
        final_response: false,
    };
    pub const FINAL: Reply = Reply {
        streaming: false,
        final_response: true,
    };
    pub const STREAMING_AND_FINAL: Reply = Reply {
        streaming: true,
        final_response: true,
    };
}

/// Identifies an outstanding command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    pub id: u64,
    /// Session epoch when the command was sent
    pub epoch: u64,
}

/// Something the owner of the session needs to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake complete; options and position can be sent.
    Ready,
    /// A line produced while the tagged command was outstanding
    Stream { tag: RequestTag, output: EngineOutput },
    /// The tagged command completed. `lines` holds what it produced, minus
    /// anything already delivered as a stream.
    Final {
        tag: RequestTag,
        lines: Vec<String>,
        terminal: EngineOutput,
    },
    /// Output while nothing was outstanding
    Unsolicited(EngineOutput),
}

struct Pending {
    tag: RequestTag,
    completion: Completion,
    reply: Reply,
    lines: Vec<String>,
    /// Handshake requests handled by the session itself
    internal: bool,
}

/// One engine connection and its request bookkeeping
pub struct EngineSession<T: EngineTransport> {
    transport: Option<T>,
    state: ReadyState,
    launch_failed: bool,
    config: SessionConfig,
    pending: VecDeque<Pending>,
    next_id: u64,
    epoch: u64,
}

impl<T: EngineTransport> EngineSession<T> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            transport: None,
            state: ReadyState::NotStarted,
            launch_failed: false,
            config,
            pending: VecDeque::new(),
            next_id: 0,
            epoch: 0,
        }
    }

    pub fn state(&self) -> ReadyState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::Ready
    }

    /// Set when the last launch attempt could not start the engine
    pub fn launch_failed(&self) -> bool {
        self.launch_failed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current position generation
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a `go` is waiting for its `bestmove`
    pub fn go_outstanding(&self) -> bool {
        self.pending
            .iter()
            .any(|p| p.completion == Completion::BestMove)
    }

    /// Starts the engine and begins the UCI handshake.
    ///
    /// `spawn` produces the transport. If it fails the session stays
    /// `NotStarted` and nothing is retried.
    pub fn launch<F>(&mut self, spawn: F) -> Result<()>
    where
        F: FnOnce() -> Result<T>,
    {
        if self.state != ReadyState::NotStarted {
            return Err(Error::WorkerUnavailable(format!(
                "session is {:?}, cannot launch",
                self.state
            )));
        }

        match spawn() {
            Ok(transport) => {
                self.transport = Some(transport);
                self.launch_failed = false;
                self.state = ReadyState::Initializing;
                info!("engine launched, starting handshake");
                self.dispatch(EngineCommand::Uci, Reply::NONE, true)?;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to launch engine");
                self.launch_failed = true;
                Err(e)
            }
        }
    }

    /// Sends a command, returning its tag when the command expects an answer.
    pub fn send(&mut self, command: EngineCommand, reply: Reply) -> Result<Option<RequestTag>> {
        match self.state {
            ReadyState::Initializing | ReadyState::Ready => self.dispatch(command, reply, false),
            _ => Err(Error::EngineNotReady),
        }
    }

    /// Replaces the engine's position and starts a new epoch.
    ///
    /// Before the handshake completes only the epoch changes; the owner
    /// pushes its position again on [`SessionEvent::Ready`].
    pub fn set_position(&mut self, fen: &str) -> Result<()> {
        self.epoch += 1;
        if !self.is_ready() {
            debug!(epoch = self.epoch, "engine not ready, position deferred");
            return Ok(());
        }
        self.dispatch(
            EngineCommand::Position {
                fen: fen.to_string(),
            },
            Reply::NONE,
            false,
        )?;
        Ok(())
    }

    /// Feeds one line of engine output through the session.
    pub fn handle_line(&mut self, line: &str) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !matches!(self.state, ReadyState::Initializing | ReadyState::Ready) {
            trace!(line, "output after shutdown dropped");
            return events;
        }

        let output = EngineOutput::classify(line, self.config.multi_variation());

        let completed = output
            .completion()
            .and_then(|c| self.pending.iter().position(|p| p.completion == c))
            .and_then(|idx| self.pending.remove(idx));

        if let Some(request) = completed {
            self.complete(request, line, output, &mut events);
        } else if let Some(front) = self.pending.front_mut() {
            if front.reply.streaming && !front.internal {
                events.push(SessionEvent::Stream {
                    tag: front.tag,
                    output,
                });
            } else {
                front.lines.push(line.to_string());
            }
        } else if output == EngineOutput::Ignored {
            trace!(line, "unrecognized engine output");
        } else {
            events.push(SessionEvent::Unsolicited(output));
        }

        events
    }

    /// Shuts the engine down. Safe to call any number of times.
    pub fn terminate(&mut self) {
        if self.state == ReadyState::Terminated {
            return;
        }

        let go_outstanding = self.go_outstanding();
        self.pending.clear();

        if let Some(mut transport) = self.transport.take() {
            if go_outstanding {
                let _ = transport.send_line(&EngineCommand::Stop.to_string());
            }
            if transport.is_alive() {
                if let Err(e) = transport.send_line(&EngineCommand::Quit.to_string()) {
                    warn!(error = %e, "failed to send quit");
                }
            }
            transport.shutdown();
            info!("engine terminated");
        }

        self.state = ReadyState::Terminated;
    }

    fn complete(
        &mut self,
        mut request: Pending,
        line: &str,
        output: EngineOutput,
        events: &mut Vec<SessionEvent>,
    ) {
        request.lines.push(line.to_string());

        if request.internal {
            match request.completion {
                Completion::UciOk => {
                    // readiness check
                    let _ = self.dispatch(EngineCommand::IsReady, Reply::NONE, true);
                }
                Completion::ReadyOk if self.state == ReadyState::Initializing => {
                    self.state = ReadyState::Ready;
                    info!("engine ready");
                    events.push(SessionEvent::Ready);
                }
                _ => {}
            }
            return;
        }

        if request.reply.streaming {
            events.push(SessionEvent::Stream {
                tag: request.tag,
                output: output.clone(),
            });
        }
        if request.reply.final_response {
            events.push(SessionEvent::Final {
                tag: request.tag,
                lines: request.lines,
                terminal: output,
            });
        }
    }

    fn dispatch(
        &mut self,
        command: EngineCommand,
        reply: Reply,
        internal: bool,
    ) -> Result<Option<RequestTag>> {
        let line = command.to_string();
        let transport = self.transport.as_mut().ok_or(Error::EngineNotReady)?;

        debug!(cmd = %line, "engine <<");
        if let Err(e) = transport.send_line(&line) {
            error!(error = %e, cmd = %line, "engine write failed");
            self.fail();
            return Err(Error::Io(e));
        }

        let Some(completion) = command.completion() else {
            return Ok(None);
        };

        self.next_id += 1;
        let tag = RequestTag {
            id: self.next_id,
            epoch: self.epoch,
        };
        self.pending.push_back(Pending {
            tag,
            completion,
            reply,
            lines: Vec::new(),
            internal,
        });
        Ok(Some(tag))
    }

    /// Fatal I/O: release the engine without further protocol traffic.
    fn fail(&mut self) {
        self.pending.clear();
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown();
        }
        self.state = ReadyState::Terminated;
    }
}

impl<T: EngineTransport> Drop for EngineSession<T> {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::protocol::Score;
    use crate::engine::transport::testing::RecordingTransport;

    fn launched() -> (EngineSession<RecordingTransport>, RecordingTransport) {
        let transport = RecordingTransport::default();
        let mut session = EngineSession::new(SessionConfig::default());
        let handle = transport.clone();
        session.launch(move || Ok(handle)).unwrap();
        (session, transport)
    }

    fn ready() -> (EngineSession<RecordingTransport>, RecordingTransport) {
        let (mut session, transport) = launched();
        session.handle_line("id name Stockfish 17");
        session.handle_line("uciok");
        session.handle_line("readyok");
        transport.clear();
        (session, transport)
    }

    #[test]
    fn test_handshake() {
        let (mut session, transport) = launched();
        assert_eq!(session.state(), ReadyState::Initializing);
        assert_eq!(transport.lines(), vec!["uci"]);

        assert!(session.handle_line("id name Stockfish 17").is_empty());
        assert!(session.handle_line("option name MultiPV type spin default 1 min 1 max 256").is_empty());
        assert!(session.handle_line("uciok").is_empty());
        assert_eq!(transport.lines(), vec!["uci", "isready"]);

        let events = session.handle_line("readyok");
        assert_eq!(events, vec![SessionEvent::Ready]);
        assert!(session.is_ready());
    }

    #[test]
    fn test_launch_failure() {
        let mut session: EngineSession<RecordingTransport> =
            EngineSession::new(SessionConfig::default());
        let result = session.launch(|| Err(Error::WorkerUnavailable("no binary".into())));

        assert!(matches!(result, Err(Error::WorkerUnavailable(_))));
        assert_eq!(session.state(), ReadyState::NotStarted);
        assert!(session.launch_failed());
        assert!(matches!(
            session.send(EngineCommand::IsReady, Reply::FINAL),
            Err(Error::EngineNotReady)
        ));
    }

    #[test]
    fn test_launch_twice_rejected() {
        let (mut session, _) = launched();
        let again = session.launch(|| Ok(RecordingTransport::default()));
        assert!(again.is_err());
        assert_eq!(session.state(), ReadyState::Initializing);
    }

    #[test]
    fn test_go_streams_then_completes() {
        let (mut session, transport) = ready();
        let tag = session
            .send(EngineCommand::GoInfinite, Reply::STREAMING_AND_FINAL)
            .unwrap()
            .unwrap();
        assert_eq!(transport.lines(), vec!["go infinite"]);
        assert!(session.go_outstanding());

        let first = session.handle_line("info depth 1 multipv 1 score cp 20 pv e2e4");
        let second = session.handle_line("info depth 2 multipv 1 score cp 25 pv d2d4");
        assert!(matches!(&first[..], [SessionEvent::Stream { tag: t, output: EngineOutput::Info(_) }] if *t == tag));
        match &second[..] {
            [SessionEvent::Stream {
                output: EngineOutput::Info(info),
                ..
            }] => assert_eq!(info.score, Score::Cp(25)),
            other => panic!("unexpected {:?}", other),
        }

        let done = session.handle_line("bestmove d2d4 ponder d7d5");
        assert_eq!(done.len(), 2);
        assert!(matches!(done[0], SessionEvent::Stream { output: EngineOutput::BestMove { .. }, .. }));
        match &done[1] {
            SessionEvent::Final { tag: t, lines, terminal } => {
                assert_eq!(*t, tag);
                assert_eq!(lines, &vec!["bestmove d2d4 ponder d7d5".to_string()]);
                assert_eq!(
                    *terminal,
                    EngineOutput::BestMove {
                        mv: "d2d4".into(),
                        ponder: Some("d7d5".into())
                    }
                );
            }
            other => panic!("expected Final, got {:?}", other),
        }
        assert!(!session.go_outstanding());
    }

    #[test]
    fn test_streamed_lines_are_not_buffered() {
        let (mut session, _) = ready();
        session
            .send(EngineCommand::GoInfinite, Reply::STREAMING_AND_FINAL)
            .unwrap();

        for depth in 1..=1000 {
            let line = format!("info depth {} multipv 1 score cp 10 pv e2e4", depth);
            assert_eq!(session.handle_line(&line).len(), 1);
        }
        let buffered: usize = session.pending.iter().map(|p| p.lines.len()).sum();
        assert_eq!(buffered, 0);
    }

    #[test]
    fn test_final_only_request_collects_lines() {
        let (mut session, _) = ready();
        let tag = session
            .send(EngineCommand::IsReady, Reply::FINAL)
            .unwrap()
            .unwrap();

        assert!(session.handle_line("info string NNUE evaluation enabled").is_empty());
        match &session.handle_line("readyok")[..] {
            [SessionEvent::Final { tag: t, lines, .. }] => {
                assert_eq!(*t, tag);
                assert_eq!(lines.len(), 2);
            }
            other => panic!("expected Final, got {:?}", other),
        }
    }

    #[test]
    fn test_set_position_bumps_epoch() {
        let (mut session, transport) = ready();
        let before = session.epoch();
        session.set_position("8/8/8/8/8/8/8/K1k5 w - - 0 1").unwrap();

        assert_eq!(session.epoch(), before + 1);
        assert_eq!(transport.lines(), vec!["position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1"]);

        let tag = session
            .send(EngineCommand::GoInfinite, Reply::FINAL)
            .unwrap()
            .unwrap();
        assert_eq!(tag.epoch, session.epoch());
    }

    #[test]
    fn test_set_position_deferred_until_ready() {
        let (mut session, transport) = launched();
        session.set_position("8/8/8/8/8/8/8/K1k5 w - - 0 1").unwrap();
        assert_eq!(session.epoch(), 1);
        assert_eq!(transport.lines(), vec!["uci"]);
    }

    #[test]
    fn test_readyok_completes_ready_check_behind_go() {
        let (mut session, _) = ready();
        let go = session
            .send(EngineCommand::GoInfinite, Reply::STREAMING_AND_FINAL)
            .unwrap()
            .unwrap();
        let ready_check = session
            .send(EngineCommand::IsReady, Reply::FINAL)
            .unwrap()
            .unwrap();

        let events = session.handle_line("readyok");
        assert!(matches!(&events[..], [SessionEvent::Final { tag, .. }] if *tag == ready_check));

        let events = session.handle_line("info depth 3 multipv 1 score cp 5 pv e2e4");
        assert!(matches!(&events[..], [SessionEvent::Stream { tag, .. }] if *tag == go));
    }

    #[test]
    fn test_unsolicited_and_ignored_output() {
        let (mut session, _) = ready();
        assert!(session.handle_line("info string hello").is_empty());
        assert_eq!(
            session.handle_line("bestmove e2e4"),
            vec![SessionEvent::Unsolicited(EngineOutput::BestMove {
                mv: "e2e4".into(),
                ponder: None
            })]
        );
    }

    #[test]
    fn test_stop_opens_no_request() {
        let (mut session, transport) = ready();
        assert_eq!(session.send(EngineCommand::Stop, Reply::FINAL).unwrap(), None);
        assert_eq!(transport.lines(), vec!["stop"]);
    }

    #[test]
    fn test_terminate_mid_analysis() {
        let (mut session, transport) = ready();
        session
            .send(EngineCommand::GoInfinite, Reply::STREAMING_AND_FINAL)
            .unwrap();

        session.terminate();
        assert_eq!(session.state(), ReadyState::Terminated);
        assert_eq!(transport.lines(), vec!["go infinite", "stop", "quit"]);
        assert!(*transport.closed.lock().unwrap());

        session.terminate();
        assert_eq!(transport.lines().len(), 3);
        assert!(session.handle_line("bestmove e2e4").is_empty());
    }

    #[test]
    fn test_terminate_before_launch() {
        let mut session: EngineSession<RecordingTransport> =
            EngineSession::new(SessionConfig::default());
        session.terminate();
        session.terminate();
        assert_eq!(session.state(), ReadyState::Terminated);
        assert!(session.launch(|| Ok(RecordingTransport::default())).is_err());
    }

    #[test]
    fn test_write_failure_terminates() {
        let (mut session, transport) = ready();
        transport.fail();

        let result = session.send(EngineCommand::GoInfinite, Reply::FINAL);
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(session.state(), ReadyState::Terminated);
        assert!(!session.go_outstanding());
    }
}
