//! Chess engine integration
//!
//! Talks UCI to an external engine process and aggregates its analysis.

pub mod analysis;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use analysis::{AnalysisAggregator, AnalysisLine, Evaluation};
pub use protocol::{EngineCommand, EngineOutput, InfoLine, Score};
pub use session::{EngineSession, ReadyState, Reply, RequestTag, SessionConfig, SessionEvent};
pub use transport::{EngineTransport, ProcessTransport};
