//! UCI protocol codec
//!
//! Pure, stateless translation between structured commands/events and the
//! line-oriented UCI text protocol. Parsing never fails: lines that are not
//! recognized decode to [`EngineEvent::Unknown`] so that engine-specific
//! extensions pass through harmlessly.

use std::fmt;

use crate::engine::types::{Position, StopCondition};

/// A command sent to the engine over stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    SetOption { name: String, value: String },
    Position(Position),
    Go(StopCondition),
    Stop,
    Quit,
}

impl UciCommand {
    /// Encodes the command as a single protocol line, without the
    /// terminating newline.
    pub fn encode(&self) -> String {
        match self {
            UciCommand::Uci => "uci".to_string(),
            UciCommand::IsReady => "isready".to_string(),
            UciCommand::NewGame => "ucinewgame".to_string(),
            UciCommand::SetOption { name, value } => {
                format!("setoption name {} value {}", name, value)
            }
            UciCommand::Position(position) => format!("position {}", position.encode()),
            UciCommand::Go(stop) => match stop {
                StopCondition::Depth(depth) => format!("go depth {}", depth),
                StopCondition::MoveTime(t) => format!("go movetime {}", t.as_millis()),
                // A wall-clock limit is enforced by the controller, so the
                // engine itself searches until told to stop.
                StopCondition::TimeLimit(_) | StopCondition::Infinite => "go infinite".to_string(),
            },
            UciCommand::Stop => "stop".to_string(),
            UciCommand::Quit => "quit".to_string(),
        }
    }
}

/// A position evaluation reported by the engine.
///
/// Always from the perspective of the side to move in the analyzed
/// position. The two variants are distinct units and must never be
/// conflated: `Centipawns(300)` is a three-pawn advantage, `MateIn(3)` is a
/// forced mate in three plies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    MateIn(i32),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => {
                let pawns = *cp as f32 / 100.0;
                if pawns >= 0.0 {
                    write!(f, "+{:.2}", pawns)
                } else {
                    write!(f, "{:.2}", pawns)
                }
            }
            Score::MateIn(n) => write!(f, "M{}", n),
        }
    }
}

/// The payload of one `info` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    /// Principal variation, in engine move notation. Index 0 is the
    /// immediate best move; order is preserved exactly as reported.
    pub pv: Vec<String>,
}

/// One decoded line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `id name <engine name>`
    IdName(String),
    /// `id author <author>`
    IdAuthor(String),
    /// An `option name ...` declaration, kept as the raw remainder of the
    /// line. The supported option set is engine-dependent, so no schema is
    /// imposed on it.
    OptionDecl(String),
    UciOk,
    ReadyOk,
    Info(InfoLine),
    /// `bestmove <move> [ponder <move>]`; `best` is `None` for
    /// `bestmove (none)` (no legal move) or a missing token.
    BestMove {
        best: Option<String>,
        ponder: Option<String>,
    },
    /// Anything this codec does not understand.
    Unknown(String),
}

/// Decodes one line of engine output. Infallible by design.
pub fn parse_line(raw: &str) -> EngineEvent {
    let line = raw.trim();
    let mut tokens = line.split_whitespace();

    match tokens.next() {
        Some("uciok") => EngineEvent::UciOk,
        Some("readyok") => EngineEvent::ReadyOk,
        Some("id") => match tokens.next() {
            Some("name") => EngineEvent::IdName(tokens.collect::<Vec<_>>().join(" ")),
            Some("author") => EngineEvent::IdAuthor(tokens.collect::<Vec<_>>().join(" ")),
            _ => EngineEvent::Unknown(line.to_string()),
        },
        Some("option") => EngineEvent::OptionDecl(tokens.collect::<Vec<_>>().join(" ")),
        Some("info") => EngineEvent::Info(parse_info(line)),
        Some("bestmove") => {
            let best = tokens.next().filter(|m| *m != "(none)").map(str::to_string);
            let ponder = match (tokens.next(), tokens.next()) {
                (Some("ponder"), Some(mv)) => Some(mv.to_string()),
                _ => None,
            };
            EngineEvent::BestMove { best, ponder }
        }
        _ => EngineEvent::Unknown(line.to_string()),
    }
}

/// Parses the fields of an `info` line. Unrecognized fields are skipped;
/// malformed numbers leave the field unset rather than failing the line.
fn parse_info(line: &str) -> InfoLine {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut info = InfoLine::default();
    let mut i = 1; // skip "info"

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                info.depth = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "seldepth" => {
                info.seldepth = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "multipv" => {
                info.multipv = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "score" => {
                match (tokens.get(i + 1), tokens.get(i + 2)) {
                    (Some(&"cp"), Some(value)) => {
                        info.score = value.parse().ok().map(Score::Centipawns);
                    }
                    (Some(&"mate"), Some(value)) => {
                        info.score = value.parse().ok().map(Score::MateIn);
                    }
                    _ => {}
                }
                i += 3;
                // "lowerbound"/"upperbound" qualifiers ride along with the score
                if matches!(tokens.get(i), Some(&"lowerbound") | Some(&"upperbound")) {
                    i += 1;
                }
            }
            "nodes" => {
                info.nodes = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "nps" => {
                info.nps = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "time" => {
                info.time_ms = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "pv" => {
                // everything after "pv" is the principal variation
                info.pv = tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            _ => {
                i += 1;
            }
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_encode_handshake_commands() {
        assert_eq!(UciCommand::Uci.encode(), "uci");
        assert_eq!(UciCommand::IsReady.encode(), "isready");
        assert_eq!(UciCommand::NewGame.encode(), "ucinewgame");
        assert_eq!(UciCommand::Stop.encode(), "stop");
        assert_eq!(UciCommand::Quit.encode(), "quit");
    }

    #[test]
    fn test_encode_setoption() {
        let cmd = UciCommand::SetOption {
            name: "Skill Level".to_string(),
            value: "5".to_string(),
        };
        assert_eq!(cmd.encode(), "setoption name Skill Level value 5");
    }

    #[test]
    fn test_encode_position_with_moves() {
        let position = Position::startpos().with_moves(["e2e4", "e7e5"]);
        assert_eq!(
            UciCommand::Position(position).encode(),
            "position startpos moves e2e4 e7e5"
        );
    }

    #[test]
    fn test_encode_go_variants() {
        assert_eq!(UciCommand::Go(StopCondition::Depth(12)).encode(), "go depth 12");
        assert_eq!(
            UciCommand::Go(StopCondition::MoveTime(Duration::from_millis(2000))).encode(),
            "go movetime 2000"
        );
        assert_eq!(UciCommand::Go(StopCondition::Infinite).encode(), "go infinite");
        assert_eq!(
            UciCommand::Go(StopCondition::TimeLimit(Duration::from_secs(5))).encode(),
            "go infinite"
        );
    }

    #[test]
    fn test_parse_handshake_lines() {
        assert_eq!(parse_line("uciok"), EngineEvent::UciOk);
        assert_eq!(parse_line("readyok\r"), EngineEvent::ReadyOk);
        assert_eq!(
            parse_line("id name Stockfish 16"),
            EngineEvent::IdName("Stockfish 16".to_string())
        );
        assert_eq!(
            parse_line("id author the Stockfish developers"),
            EngineEvent::IdAuthor("the Stockfish developers".to_string())
        );
        assert_eq!(
            parse_line("option name Hash type spin default 16 min 1 max 33554432"),
            EngineEvent::OptionDecl("name Hash type spin default 16 min 1 max 33554432".to_string())
        );
    }

    #[test]
    fn test_parse_info_centipawns() {
        let event = parse_line("info depth 1 score cp 20 nodes 34 nps 17000 time 2 pv e2e4");
        let EngineEvent::Info(info) = event else {
            panic!("expected info event");
        };
        assert_eq!(info.depth, Some(1));
        assert_eq!(info.score, Some(Score::Centipawns(20)));
        assert_eq!(info.nodes, Some(34));
        assert_eq!(info.nps, Some(17000));
        assert_eq!(info.time_ms, Some(2));
        assert_eq!(info.pv, vec!["e2e4"]);
    }

    #[test]
    fn test_parse_info_mate_is_not_centipawns() {
        for n in [-7, -1, 1, 3, 20] {
            let line = format!("info depth 10 score mate {} pv h5f7", n);
            let EngineEvent::Info(info) = parse_line(&line) else {
                panic!("expected info event");
            };
            assert_eq!(info.score, Some(Score::MateIn(n)));
        }
        // cp values that look like small mate counts stay centipawns
        let EngineEvent::Info(info) = parse_line("info depth 10 score cp 3") else {
            panic!("expected info event");
        };
        assert_eq!(info.score, Some(Score::Centipawns(3)));
    }

    #[test]
    fn test_parse_info_negative_centipawns() {
        let EngineEvent::Info(info) = parse_line("info depth 8 score cp -154") else {
            panic!("expected info event");
        };
        assert_eq!(info.score, Some(Score::Centipawns(-154)));
    }

    #[test]
    fn test_parse_info_score_bound_qualifier() {
        let EngineEvent::Info(info) =
            parse_line("info depth 14 score cp 35 lowerbound nodes 100000")
        else {
            panic!("expected info event");
        };
        assert_eq!(info.score, Some(Score::Centipawns(35)));
        assert_eq!(info.nodes, Some(100000));
    }

    #[test]
    fn test_parse_info_pv_preserves_order() {
        let EngineEvent::Info(info) =
            parse_line("info depth 3 score cp 12 pv e2e4 e7e5 g1f3")
        else {
            panic!("expected info event");
        };
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_bestmove_with_ponder() {
        assert_eq!(
            parse_line("bestmove e2e4 ponder e7e5"),
            EngineEvent::BestMove {
                best: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_bestmove_none() {
        assert_eq!(
            parse_line("bestmove (none)"),
            EngineEvent::BestMove { best: None, ponder: None }
        );
    }

    #[test]
    fn test_parse_unknown_line_never_fails() {
        assert_eq!(
            parse_line("Stockfish 16 by the Stockfish developers (see AUTHORS file)"),
            EngineEvent::Unknown(
                "Stockfish 16 by the Stockfish developers (see AUTHORS file)".to_string()
            )
        );
        assert_eq!(parse_line(""), EngineEvent::Unknown(String::new()));
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::Centipawns(20).to_string(), "+0.20");
        assert_eq!(Score::Centipawns(-154).to_string(), "-1.54");
        assert_eq!(Score::MateIn(3).to_string(), "M3");
        assert_eq!(Score::MateIn(-2).to_string(), "M-2");
    }
}
