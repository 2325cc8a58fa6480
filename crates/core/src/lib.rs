//! GM Guide Core Library
//!
//! The engine-integration core of the GM Guide chess analysis tool. It
//! discovers and supervises a locally installed UCI engine (Stockfish by
//! default), speaks the UCI line protocol with it, and turns the engine's
//! asynchronous output into structured analysis results.
//!
//! The rendering/input layer sits on top of three calls:
//!
//! ```ignore
//! let session = gm_guide_core::discover_and_start(SessionConfig::default(), None).await?;
//! let mut handle = session
//!     .analyze(AnalysisRequest::new(Position::startpos()).move_time(Duration::from_secs(2)))
//!     .await?;
//! while let Some(event) = handle.next_event().await {
//!     // live "thinking" display
//! }
//! let result = handle.wait().await?;
//! ```
//!
//! Board rules and move legality live in the caller; positions and moves
//! pass through this crate as opaque strings.

pub mod config;
pub mod engine;
pub mod error;

pub use config::{BusyPolicy, EngineOptions, SessionConfig};
pub use engine::{
    discover, discover_and_start, AnalysisHandle, AnalysisOutcome, AnalysisRequest,
    AnalysisResult, EngineEvent, EngineIdentity, InfoLine, Position, Score, Session,
    StopCondition,
};
pub use error::{Error, Result};
