//! Board actor
//!
//! One task owns the [`SyncController`]. HTTP handlers and the engine's
//! reader thread both talk to it through the same channel, so every state
//! transition happens in arrival order on a single owner.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use analysis_board_core::engine::EngineTransport;
use analysis_board_core::{
    BoardView, Error, MoveSpec, Navigation, SessionConfig, SyncController,
};

use crate::error::ApiError;

type Reply = oneshot::Sender<Result<BoardView, Error>>;

enum BoardCommand {
    Snapshot(oneshot::Sender<BoardView>),
    Move { spec: MoveSpec, reply: Reply },
    Navigate { navigation: Navigation, reply: Reply },
    Import { text: String, reply: Reply },
    StartAnalysis(Reply),
    StopAnalysis(Reply),
    EngineLine(String),
    Shutdown(oneshot::Sender<()>),
}

/// Feeds engine output into the board. Handed to the transport's reader thread.
#[derive(Clone)]
pub struct EngineLines {
    tx: mpsc::UnboundedSender<BoardCommand>,
}

impl EngineLines {
    pub fn push(&self, line: String) {
        // receiver gone means the board already shut down
        let _ = self.tx.send(BoardCommand::EngineLine(line));
    }
}

/// Cheap handle used by the HTTP layer
#[derive(Clone)]
pub struct BoardHandle {
    tx: mpsc::UnboundedSender<BoardCommand>,
}

impl BoardHandle {
    pub async fn snapshot(&self) -> Result<BoardView, ApiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BoardCommand::Snapshot(reply))
            .map_err(|_| ApiError::Unavailable)?;
        rx.await.map_err(|_| ApiError::Unavailable)
    }

    pub async fn play_move(&self, spec: MoveSpec) -> Result<BoardView, ApiError> {
        self.request(|reply| BoardCommand::Move { spec, reply }).await
    }

    pub async fn navigate(&self, navigation: Navigation) -> Result<BoardView, ApiError> {
        self.request(|reply| BoardCommand::Navigate { navigation, reply })
            .await
    }

    pub async fn import(&self, text: String) -> Result<BoardView, ApiError> {
        self.request(|reply| BoardCommand::Import { text, reply }).await
    }

    pub async fn start_analysis(&self) -> Result<BoardView, ApiError> {
        self.request(BoardCommand::StartAnalysis).await
    }

    pub async fn stop_analysis(&self) -> Result<BoardView, ApiError> {
        self.request(BoardCommand::StopAnalysis).await
    }

    /// Terminates the engine and waits for the board to acknowledge.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(BoardCommand::Shutdown(done)).is_ok() {
            let _ = rx.await;
        }
    }

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> BoardCommand,
    ) -> Result<BoardView, ApiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| ApiError::Unavailable)?;
        let result = rx.await.map_err(|_| ApiError::Unavailable)?;
        Ok(result?)
    }
}

/// Starts the board task. `launch` builds the engine transport, wiring its
/// output to the given [`EngineLines`]; if it fails the board runs without
/// an engine.
pub fn spawn<T, F>(config: SessionConfig, launch: F) -> (BoardHandle, JoinHandle<()>)
where
    T: EngineTransport + Send + 'static,
    F: FnOnce(EngineLines) -> analysis_board_core::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let lines = EngineLines { tx: tx.clone() };

    let task = tokio::spawn(async move {
        let mut controller = SyncController::<T>::new(config);
        if let Err(e) = controller.launch_engine(move || launch(lines)) {
            warn!("Engine unavailable, analysis disabled: {e}");
        }
        run(controller, rx).await;
    });

    (BoardHandle { tx }, task)
}

async fn run<T: EngineTransport + Send + 'static>(
    mut controller: SyncController<T>,
    mut rx: mpsc::UnboundedReceiver<BoardCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            BoardCommand::Snapshot(reply) => {
                let _ = reply.send(controller.snapshot());
            }
            BoardCommand::Move { spec, reply } => {
                let result = controller.play_move(&spec).map(|_| ());
                respond(&controller, reply, result);
            }
            BoardCommand::Navigate { navigation, reply } => {
                let result = controller.navigate(navigation);
                respond(&controller, reply, result);
            }
            BoardCommand::Import { text, reply } => {
                let result = controller.import(&text).map(|_| ());
                respond(&controller, reply, result);
            }
            BoardCommand::StartAnalysis(reply) => {
                let result = controller.start_analysis();
                respond(&controller, reply, result);
            }
            BoardCommand::StopAnalysis(reply) => {
                controller.stop_analysis();
                respond(&controller, reply, Ok(()));
            }
            BoardCommand::EngineLine(line) => controller.handle_engine_line(&line),
            BoardCommand::Shutdown(done) => {
                shutdown(controller).await;
                let _ = done.send(());
                return;
            }
        }
    }

    shutdown(controller).await;
}

/// Engine shutdown writes to the pipe and waits on the child process, so it
/// runs on the blocking pool.
async fn shutdown<T: EngineTransport + Send + 'static>(mut controller: SyncController<T>) {
    if let Err(e) = tokio::task::spawn_blocking(move || controller.shutdown()).await {
        warn!("Engine shutdown failed: {e}");
    }
    info!("Board stopped");
}

fn respond<T: EngineTransport>(
    controller: &SyncController<T>,
    reply: Reply,
    result: Result<(), Error>,
) {
    let _ = reply.send(result.map(|_| controller.snapshot()));
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use analysis_board_core::engine::ReadyState;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    struct RecordingEngine {
        lines: EngineLines,
        log: Recorded,
    }

    impl EngineTransport for RecordingEngine {
        fn send_line(&mut self, line: &str) -> io::Result<()> {
            self.log.sent.lock().unwrap().push(line.to_string());
            match line {
                "uci" => self.lines.push("uciok".to_string()),
                "isready" => self.lines.push("readyok".to_string()),
                _ => {}
            }
            Ok(())
        }

        fn is_alive(&mut self) -> bool {
            !*self.log.closed.lock().unwrap()
        }

        fn shutdown(&mut self) {
            *self.log.closed.lock().unwrap() = true;
        }
    }

    fn start() -> (BoardHandle, JoinHandle<()>, Recorded) {
        let log = Recorded::default();
        let engine_log = log.clone();
        let (board, task) = spawn(SessionConfig::default(), move |lines| {
            Ok(RecordingEngine {
                lines,
                log: engine_log,
            })
        });
        (board, task, log)
    }

    #[tokio::test]
    async fn test_shutdown_quits_engine() {
        let (board, task, log) = start();
        board.snapshot().await.unwrap();

        board.shutdown().await;
        task.await.unwrap();

        assert_eq!(log.sent.lock().unwrap().last().map(String::as_str), Some("quit"));
        assert!(*log.closed.lock().unwrap());
        assert!(matches!(board.snapshot().await, Err(ApiError::Unavailable)));
    }

    #[tokio::test]
    async fn test_engine_lines_reach_the_board() {
        let (board, _task, _log) = start();
        let mut state = ReadyState::Initializing;
        for _ in 0..10 {
            state = board.snapshot().await.unwrap().engine;
            if state == ReadyState::Ready {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state, ReadyState::Ready);
    }
}
