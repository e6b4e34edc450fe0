//! Board/engine synchronization
//!
//! [`SyncController`] is the only thing that mutates the game record or
//! talks to the engine. Every user action follows the same order: stop any
//! running analysis, mutate the history, recompute the displayed position
//! and its legal moves, then push that position to the engine.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::engine::{
    AnalysisAggregator, AnalysisLine, EngineCommand, EngineOutput, EngineSession,
    EngineTransport, ReadyState, Reply, RequestTag, SessionConfig, SessionEvent,
};
use crate::error::{Error, Result};
use crate::history::PositionHistory;
use crate::parser::{import_candidates, ImportCandidate};
use crate::rules::{destinations, Dests, MoveRecord, MoveSpec, Position, Rules, StandardRules};

/// Where the analysis state machine is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    /// `go` sent, nothing heard back yet
    Requested,
    /// Output for the current position is arriving
    Active,
}

/// History navigation requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Back,
    Forward,
    ToPly(usize),
}

/// What an import did to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Text was empty or already the displayed position
    Unchanged,
    /// A game was loaded with this many moves
    Game { moves: usize },
    /// A bare position was loaded
    Position,
}

pub struct SyncController<T: EngineTransport, R: Rules = StandardRules> {
    history: PositionHistory<R>,
    cursor: usize,
    displayed: Position,
    dests: Dests,
    session: EngineSession<T>,
    aggregator: AnalysisAggregator,
    analysis: AnalysisState,
    /// The `go` whose output is currently shown
    active_go: Option<RequestTag>,
}

impl<T: EngineTransport> SyncController<T, StandardRules> {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rules(StandardRules, config)
    }
}

impl<T: EngineTransport, R: Rules> SyncController<T, R> {
    pub fn with_rules(rules: R, config: SessionConfig) -> Self {
        let history = PositionHistory::new(rules);
        let displayed = history.latest().clone();
        let mut controller = Self {
            history,
            cursor: 0,
            displayed,
            dests: Dests::new(),
            session: EngineSession::new(config),
            aggregator: AnalysisAggregator::new(config.multipv as usize),
            analysis: AnalysisState::Idle,
            active_go: None,
        };
        controller.refresh_dests();
        controller
    }

    /// Starts the engine. A failure leaves the board fully usable.
    pub fn launch_engine<F>(&mut self, spawn: F) -> Result<()>
    where
        F: FnOnce() -> Result<T>,
    {
        self.session.launch(spawn)
    }

    pub fn position(&self) -> &Position {
        &self.displayed
    }

    pub fn history(&self) -> &PositionHistory<R> {
        &self.history
    }

    /// Ply currently displayed
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_viewing_latest(&self) -> bool {
        self.cursor == self.history.len()
    }

    /// Legal destinations; empty while viewing an earlier ply
    pub fn dests(&self) -> &Dests {
        &self.dests
    }

    pub fn lines(&self) -> Vec<AnalysisLine> {
        self.aggregator.lines()
    }

    pub fn analysis_state(&self) -> AnalysisState {
        self.analysis
    }

    pub fn is_analyzing(&self) -> bool {
        self.analysis != AnalysisState::Idle
    }

    pub fn engine_state(&self) -> ReadyState {
        self.session.state()
    }

    pub fn is_engine_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn engine_launch_failed(&self) -> bool {
        self.session.launch_failed()
    }

    /// Plays a move from the latest position.
    pub fn play_move(&mut self, spec: &MoveSpec) -> Result<MoveRecord> {
        if !self.is_viewing_latest() {
            return Err(Error::ViewingHistory {
                ply: self.cursor,
                len: self.history.len(),
            });
        }

        self.stop_before_mutate();
        let record = self.history.append(self.cursor, spec)?.clone();
        self.cursor = self.history.len();
        debug!(san = %record.san, ply = self.cursor, "move played");

        let latest = self.history.latest().clone();
        self.show(latest);
        Ok(record)
    }

    /// Moves the cursor through the history.
    ///
    /// A corrupted history is reset to the default position; the replay
    /// error is still returned so the caller can tell the user.
    pub fn navigate(&mut self, navigation: Navigation) -> Result<()> {
        let len = self.history.len();
        let target = match navigation {
            Navigation::Back => self.cursor.saturating_sub(1),
            Navigation::Forward => (self.cursor + 1).min(len),
            Navigation::ToPly(ply) if ply > len => {
                return Err(Error::PlyOutOfRange { ply, len });
            }
            Navigation::ToPly(ply) => ply,
        };
        if target == self.cursor {
            return Ok(());
        }

        self.stop_before_mutate();
        match self.history.replay_to(target) {
            Ok(position) => {
                self.cursor = target;
                self.show(position);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "history is inconsistent, resetting board");
                self.history.reset();
                self.cursor = 0;
                let start = self.history.latest().clone();
                self.show(start);
                Err(e)
            }
        }
    }

    /// Loads pasted PGN or FEN text.
    ///
    /// On failure nothing changes and the error carries the FEN the input
    /// should be reverted to.
    pub fn import(&mut self, text: &str) -> Result<ImportOutcome> {
        let text = text.trim();
        if text.is_empty() || text == self.displayed.fen() {
            return Ok(ImportOutcome::Unchanged);
        }

        self.stop_before_mutate();

        for candidate in import_candidates(text) {
            match candidate {
                ImportCandidate::Game(game) => {
                    let start = match &game.fen {
                        Some(fen) => match self.history.rules().load_position(fen) {
                            Ok(position) => position,
                            Err(e) => {
                                debug!(error = %e, "PGN starting position rejected");
                                continue;
                            }
                        },
                        None => self.history.rules().default_position(),
                    };

                    if let Err(e) = self.history.replace_with(start, &game.moves) {
                        debug!(error = %e, "PGN moves rejected");
                        continue;
                    }
                    info!(game = %game.summary(), moves = game.move_count(), "game imported");
                    self.cursor = self.history.len();
                    let latest = self.history.latest().clone();
                    self.show(latest);
                    return Ok(ImportOutcome::Game {
                        moves: self.history.len(),
                    });
                }
                ImportCandidate::Position(fen) => {
                    let start = match self.history.rules().load_position(&fen) {
                        Ok(position) => position,
                        Err(e) => {
                            debug!(error = %e, "FEN rejected");
                            continue;
                        }
                    };

                    self.history.replace_with::<&str>(start, &[])?;
                    info!(fen = %self.history.latest(), "position imported");
                    self.cursor = 0;
                    let latest = self.history.latest().clone();
                    self.show(latest);
                    return Ok(ImportOutcome::Position);
                }
            }
        }

        warn!("import rejected: neither PGN nor FEN");
        Err(Error::ImportInvalid {
            last_valid: self.displayed.fen().to_string(),
        })
    }

    /// Starts infinite analysis of the latest position.
    pub fn start_analysis(&mut self) -> Result<()> {
        if self.analysis != AnalysisState::Idle {
            return Err(Error::AnalysisUnavailable("analysis already running"));
        }
        if !self.is_viewing_latest() {
            return Err(Error::AnalysisUnavailable("viewing history"));
        }
        if !self.session.is_ready() {
            return Err(Error::AnalysisUnavailable("engine not ready"));
        }

        self.aggregator.reset(self.displayed.turn());
        self.session.set_position(self.displayed.fen())?;
        let tag = self
            .session
            .send(EngineCommand::GoInfinite, Reply::STREAMING_AND_FINAL)?;

        self.active_go = tag;
        self.analysis = AnalysisState::Requested;
        info!(fen = %self.displayed, "analysis started");
        Ok(())
    }

    /// Asks the engine to stop. The local state goes idle right away; the
    /// engine's closing `bestmove` is ignored when it arrives.
    pub fn stop_analysis(&mut self) {
        if self.analysis == AnalysisState::Idle {
            return;
        }

        if let Err(e) = self.session.send(EngineCommand::Stop, Reply::NONE) {
            warn!(error = %e, "failed to send stop");
        }
        self.analysis = AnalysisState::Idle;
        self.active_go = None;
        info!("analysis stopped");
    }

    /// Processes one line of engine output.
    pub fn handle_engine_line(&mut self, line: &str) {
        for event in self.session.handle_line(line) {
            match event {
                SessionEvent::Ready => self.configure_engine(),
                SessionEvent::Stream {
                    tag,
                    output: EngineOutput::Info(info),
                } => {
                    if !self.is_current(tag) {
                        debug!(epoch = tag.epoch, "stale analysis output dropped");
                        continue;
                    }
                    if self.aggregator.update(&info) && self.analysis == AnalysisState::Requested {
                        self.analysis = AnalysisState::Active;
                    }
                }
                SessionEvent::Stream { .. } => {}
                SessionEvent::Final { tag, terminal, .. } => {
                    if !self.is_current(tag) {
                        debug!(epoch = tag.epoch, "stale search result dropped");
                        continue;
                    }
                    if let EngineOutput::BestMove { mv, .. } = terminal {
                        info!(bestmove = %mv, "analysis concluded");
                    }
                    self.analysis = AnalysisState::Idle;
                    self.active_go = None;
                }
                SessionEvent::Unsolicited(output) => {
                    debug!(?output, "unsolicited engine output");
                }
            }
        }
    }

    /// Stops the engine for good.
    pub fn shutdown(&mut self) {
        self.analysis = AnalysisState::Idle;
        self.active_go = None;
        self.aggregator.clear();
        self.session.terminate();
    }

    fn is_current(&self, tag: RequestTag) -> bool {
        self.active_go == Some(tag) && tag.epoch == self.session.epoch()
    }

    fn stop_before_mutate(&mut self) {
        if self.analysis != AnalysisState::Idle {
            self.stop_analysis();
        }
    }

    fn configure_engine(&mut self) {
        let config = *self.session.config();
        let options = [
            EngineCommand::set_option("Use NNUE", config.use_nnue),
            EngineCommand::set_option("MultiPV", config.multipv),
        ];
        for option in options {
            if let Err(e) = self.session.send(option, Reply::NONE) {
                warn!(error = %e, "failed to configure engine");
                return;
            }
        }
        self.push_position();
    }

    /// Makes `position` the displayed one and derives everything else from it.
    fn show(&mut self, position: Position) {
        self.displayed = position;
        self.aggregator.reset(self.displayed.turn());
        self.refresh_dests();
        self.push_position();
    }

    fn refresh_dests(&mut self) {
        self.dests = if self.is_viewing_latest() {
            destinations(&self.history.rules().legal_moves(&self.displayed))
        } else {
            Dests::new()
        };
    }

    fn push_position(&mut self) {
        if let Err(e) = self.session.set_position(self.displayed.fen()) {
            warn!(error = %e, "failed to send position to engine");
        }
    }
}
