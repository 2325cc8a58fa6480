//! Result aggregation
//!
//! Reduces the stream of `info`/`bestmove` events for one analysis request
//! into a single best-current-answer, and seals it into an immutable
//! [`AnalysisResult`] when the request ends.

use tracing::warn;

use crate::engine::protocol::InfoLine;
use crate::engine::types::{AnalysisOutcome, AnalysisResult};

/// Accumulates engine output for one request.
///
/// Created empty when the request starts, updated on each event, sealed
/// exactly once. Events arriving after the seal are logged and dropped;
/// they never reopen the result.
#[derive(Debug, Default)]
pub struct ResultBuilder {
    current: Option<InfoLine>,
    snapshots: Vec<InfoLine>,
    sealed: bool,
}

impl ResultBuilder {
    pub fn new() -> Self {
        ResultBuilder::default()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Depth of the current best snapshot, if any.
    pub fn current_depth(&self) -> Option<u32> {
        self.current.as_ref().and_then(|info| info.depth)
    }

    /// Folds one `info` line into the running answer.
    ///
    /// Lines carrying neither a score nor a PV (e.g. `currmove` progress
    /// chatter) are skipped. A line replaces the current best when its
    /// reported depth is at least the previous one — engines emit several
    /// lines per depth, and the last one at a given depth wins.
    pub fn apply_info(&mut self, info: InfoLine) {
        if self.sealed {
            warn!(?info, "info event after sealed result, ignoring");
            return;
        }
        if info.score.is_none() && info.pv.is_empty() {
            return;
        }

        let new_depth = info.depth.unwrap_or(0);
        let current_depth = self.current_depth().unwrap_or(0);
        if self.current.is_none() || new_depth >= current_depth {
            self.current = Some(info.clone());
        }
        self.snapshots.push(info);
    }

    /// Seals the accumulated state into the terminal result.
    ///
    /// A missing best move seals `best_move: None` rather than failing the
    /// request. Sealing twice is an anomaly; the second call returns the
    /// same content.
    pub fn seal(
        &mut self,
        best_move: Option<String>,
        ponder: Option<String>,
        outcome: AnalysisOutcome,
    ) -> AnalysisResult {
        if self.sealed {
            warn!("seal requested on an already sealed result");
        }
        self.sealed = true;

        let current = self.current.clone().unwrap_or_default();
        AnalysisResult {
            best_move,
            ponder,
            score: current.score,
            pv: current.pv,
            depth: current.depth,
            snapshots: self.snapshots.clone(),
            outcome,
        }
    }

    /// Seals without a `bestmove`, for cancellation that the engine never
    /// acknowledged: whatever the last snapshot said stands, with the PV
    /// head as the best-effort move.
    pub fn seal_interrupted(&mut self) -> AnalysisResult {
        let best_move = self
            .current
            .as_ref()
            .and_then(|info| info.pv.first().cloned());
        self.seal(best_move, None, AnalysisOutcome::Cancelled)
    }
}
