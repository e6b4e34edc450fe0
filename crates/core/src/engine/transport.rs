//! Engine process plumbing
//!
//! Spawns a UCI engine as a subprocess. Commands go to its stdin; a reader
//! thread forwards every stdout line to a callback supplied by the owner.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Time the engine gets to exit after `quit` before it is killed
const QUIT_GRACE: Duration = Duration::from_millis(100);

/// Write side of a connection to an engine.
pub trait EngineTransport {
    /// Writes one command line.
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    fn is_alive(&mut self) -> bool;

    /// Releases the engine. Called once, after `quit` has been sent.
    fn shutdown(&mut self);
}

/// An engine running as a child process
pub struct ProcessTransport {
    process: Child,
    stdin: Option<ChildStdin>,
}

impl ProcessTransport {
    /// Spawns the engine binary.
    ///
    /// # Arguments
    /// * `path` - Path to the engine binary (or "stockfish" if in PATH)
    /// * `on_line` - Called from a reader thread for every non-empty stdout line
    pub fn spawn<F>(path: &str, mut on_line: F) -> Result<Self>
    where
        F: FnMut(String) + Send + 'static,
    {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::WorkerUnavailable(format!("{}: {}", path, e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::WorkerUnavailable("failed to open stdin".into()))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::WorkerUnavailable("failed to open stdout".into()))?;

        thread::Builder::new()
            .name("engine-reader".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    match line {
                        Ok(line) => {
                            let trimmed = line.trim();
                            if !trimmed.is_empty() {
                                on_line(trimmed.to_string());
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "engine stdout closed");
                            break;
                        }
                    }
                }
                debug!("engine reader finished");
            })
            .map_err(|e| Error::WorkerUnavailable(e.to_string()))?;

        Ok(ProcessTransport {
            process,
            stdin: Some(stdin),
        })
    }
}

impl EngineTransport for ProcessTransport {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin closed"))?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()
    }

    fn is_alive(&mut self) -> bool {
        self.stdin.is_some() && matches!(self.process.try_wait(), Ok(None))
    }

    fn shutdown(&mut self) {
        // closing stdin is an EOF for engines that ignore quit
        self.stdin = None;
        thread::sleep(QUIT_GRACE);
        if let Ok(None) = self.process.try_wait() {
            let _ = self.process.kill();
        }
        let _ = self.process.wait();
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            self.shutdown();
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_spawn_missing_binary() {
        let result = ProcessTransport::spawn("/nonexistent/engine-binary", |_| {});
        assert!(matches!(result, Err(Error::WorkerUnavailable(_))));
    }

    #[test]
    #[ignore] // requires stockfish installed
    fn test_stockfish_handshake() {
        let (tx, rx) = mpsc::channel();
        let mut transport = ProcessTransport::spawn("stockfish", move |line| {
            let _ = tx.send(line);
        })
        .unwrap();

        transport.send_line("uci").unwrap();
        assert!(rx.iter().any(|line| line == "uciok"));

        transport.send_line("quit").unwrap();
        transport.shutdown();
        assert!(!transport.is_alive());
    }
}
