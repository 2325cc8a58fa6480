//! Request and result types for engine analysis

use std::time::Duration;

use crate::engine::protocol::{InfoLine, Score};
use crate::error::{Error, Result};

/// A board position, expressed the way the UCI `position` command wants it.
///
/// Produced by the rules layer and consumed opaquely here: this core never
/// checks legality, it only forwards the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// The standard starting position, plus moves played from it.
    Startpos { moves: Vec<String> },
    /// An arbitrary position given as a FEN string, plus moves played from it.
    Fen { fen: String, moves: Vec<String> },
}

impl Position {
    pub fn startpos() -> Self {
        Position::Startpos { moves: Vec::new() }
    }

    pub fn from_fen(fen: impl Into<String>) -> Self {
        Position::Fen { fen: fen.into(), moves: Vec::new() }
    }

    pub fn with_moves<I, S>(self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let moves = moves.into_iter().map(Into::into).collect();
        match self {
            Position::Startpos { .. } => Position::Startpos { moves },
            Position::Fen { fen, .. } => Position::Fen { fen, moves },
        }
    }

    /// The argument of the `position` command for this position.
    pub fn encode(&self) -> String {
        let (head, moves) = match self {
            Position::Startpos { moves } => ("startpos".to_string(), moves),
            Position::Fen { fen, moves } => (format!("fen {}", fen), moves),
        };
        if moves.is_empty() {
            head
        } else {
            format!("{} moves {}", head, moves.join(" "))
        }
    }
}

/// What ends a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Search to a fixed depth.
    Depth(u32),
    /// Let the engine spend exactly this long on the move.
    MoveTime(Duration),
    /// Search until this wall-clock limit, enforced by the controller via
    /// `stop`.
    TimeLimit(Duration),
    /// Search until explicitly cancelled.
    Infinite,
}

/// One analysis request against a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub position: Position,
    pub depth_limit: Option<u32>,
    pub time_limit: Option<Duration>,
    pub move_time: Option<Duration>,
    pub infinite: bool,
}

impl AnalysisRequest {
    pub fn new(position: Position) -> Self {
        AnalysisRequest {
            position,
            depth_limit: None,
            time_limit: None,
            move_time: None,
            infinite: false,
        }
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth_limit = Some(depth);
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn move_time(mut self, move_time: Duration) -> Self {
        self.move_time = Some(move_time);
        self
    }

    pub fn infinite(mut self) -> Self {
        self.infinite = true;
        self
    }

    /// Resolves the request's stop condition.
    ///
    /// Exactly one of depth/time-limit/move-time/infinite must be set; a
    /// request with none falls back to `default_move_time`, and a request
    /// with several is rejected outright.
    pub fn stop_condition(&self, default_move_time: Option<Duration>) -> Result<StopCondition> {
        let mut conditions = Vec::new();
        if let Some(depth) = self.depth_limit {
            conditions.push(StopCondition::Depth(depth));
        }
        if let Some(limit) = self.time_limit {
            conditions.push(StopCondition::TimeLimit(limit));
        }
        if let Some(t) = self.move_time {
            conditions.push(StopCondition::MoveTime(t));
        }
        if self.infinite {
            conditions.push(StopCondition::Infinite);
        }

        match conditions.len() {
            1 => Ok(conditions[0]),
            0 => default_move_time.map(StopCondition::MoveTime).ok_or_else(|| {
                Error::InvalidRequest(
                    "no stop condition set and no default move time configured".to_string(),
                )
            }),
            _ => Err(Error::InvalidRequest(
                "more than one of depth/time_limit/move_time/infinite set".to_string(),
            )),
        }
    }
}

/// How a request reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The engine produced its `bestmove` on its own terms.
    Completed,
    /// The caller stopped the request; the result holds whatever the engine
    /// reported up to that point (including a post-`stop` bestmove, if one
    /// arrived within the grace period).
    Cancelled,
}

/// The sealed, terminal outcome of one analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Best move in engine notation; `None` if the engine produced none
    /// before the request ended.
    pub best_move: Option<String>,
    /// Suggested reply to precompute on, when the engine offered one.
    pub ponder: Option<String>,
    /// Final evaluation, from the side to move's perspective.
    pub score: Option<Score>,
    /// Final principal variation; index 0 is the immediate best move.
    pub pv: Vec<String>,
    /// Deepest search depth reported.
    pub depth: Option<u32>,
    /// Every info snapshot observed, in arrival order, for replaying the
    /// engine's thinking in a UI.
    pub snapshots: Vec<InfoLine>,
    pub outcome: AnalysisOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_encoding() {
        assert_eq!(Position::startpos().encode(), "startpos");
        assert_eq!(
            Position::startpos().with_moves(["e2e4"]).encode(),
            "startpos moves e2e4"
        );
        assert_eq!(
            Position::from_fen("8/8/8/8/8/8/8/K1k5 w - - 0 1").encode(),
            "fen 8/8/8/8/8/8/8/K1k5 w - - 0 1"
        );
    }

    #[test]
    fn test_stop_condition_exactly_one() {
        let request = AnalysisRequest::new(Position::startpos()).depth(12);
        assert_eq!(request.stop_condition(None).unwrap(), StopCondition::Depth(12));
    }

    #[test]
    fn test_stop_condition_none_uses_default() {
        let request = AnalysisRequest::new(Position::startpos());
        assert_eq!(
            request.stop_condition(Some(Duration::from_secs(2))).unwrap(),
            StopCondition::MoveTime(Duration::from_secs(2))
        );
        assert!(matches!(
            request.stop_condition(None),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_stop_condition_conflicting_rejected() {
        let request = AnalysisRequest::new(Position::startpos())
            .depth(12)
            .move_time(Duration::from_secs(1));
        assert!(matches!(
            request.stop_condition(None),
            Err(Error::InvalidRequest(_))
        ));
    }
}
