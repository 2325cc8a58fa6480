//! UCI engine integration
//!
//! Everything needed to run a local chess engine: protocol codec, process
//! supervision, session/handshake management, and analysis aggregation.

pub mod aggregate;
pub mod process;
pub mod protocol;
pub mod session;
pub mod types;

pub use process::{discover, locate};
pub use protocol::{EngineEvent, InfoLine, Score, UciCommand};
pub use session::{discover_and_start, AnalysisHandle, EngineIdentity, Session};
pub use types::{AnalysisOutcome, AnalysisRequest, AnalysisResult, Position, StopCondition};
