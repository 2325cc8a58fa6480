//! Session and engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default hash table budget forwarded to the engine, in megabytes.
pub const DEFAULT_HASH_MB: u32 = 256;

/// Default per-move thinking time when a request carries no stop condition.
pub const DEFAULT_MOVE_TIME: Duration = Duration::from_secs(2);

/// Bounds applied to any requested move time.
pub const MIN_MOVE_TIME: Duration = Duration::from_millis(500);
pub const MAX_MOVE_TIME: Duration = Duration::from_secs(30);

/// Options negotiated with the engine at session start.
///
/// Each `Some` field is forwarded verbatim as one `setoption` command after
/// `uciok`. Engines silently ignore or reject options they do not support;
/// rejection is never fatal. Options are immutable once sent — changing them
/// requires a fresh session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Hash table size in MB (`setoption name Hash`).
    pub hash_mb: Option<u32>,
    /// Search threads (`setoption name Threads`).
    pub threads: Option<u32>,
    /// Strength cap, if the engine supports it (`setoption name Skill Level`).
    pub skill_level: Option<u8>,
    /// Elo cap (`setoption name UCI_LimitStrength` + `UCI_Elo`).
    pub elo_limit: Option<u32>,
    /// Number of candidate lines to report (`setoption name MultiPV`).
    pub multi_pv: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: Some(DEFAULT_HASH_MB),
            threads: None,
            skill_level: None,
            elo_limit: None,
            multi_pv: None,
        }
    }
}

impl EngineOptions {
    /// Flattens the configured options into `(name, value)` pairs in the
    /// order they will be sent.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(mb) = self.hash_mb {
            pairs.push(("Hash".to_string(), mb.to_string()));
        }
        if let Some(n) = self.threads {
            pairs.push(("Threads".to_string(), n.to_string()));
        }
        if let Some(level) = self.skill_level {
            pairs.push(("Skill Level".to_string(), level.to_string()));
        }
        if let Some(elo) = self.elo_limit {
            pairs.push(("UCI_LimitStrength".to_string(), "true".to_string()));
            pairs.push(("UCI_Elo".to_string(), elo.to_string()));
        }
        if let Some(n) = self.multi_pv {
            pairs.push(("MultiPV".to_string(), n.to_string()));
        }
        pairs
    }
}

/// What to do with an `analyze` call that arrives while another request is
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusyPolicy {
    /// Reject the new request with `Error::Busy`.
    Reject,
    /// Queue it FIFO behind the in-flight request.
    Queue,
}

/// Configuration consumed at session start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub options: EngineOptions,
    /// Bound on the whole `uci`/`uciok` + `isready`/`readyok` exchange.
    pub handshake_timeout: Duration,
    /// How long to wait for `bestmove` after sending `stop`.
    pub stop_grace: Duration,
    /// How long to wait for process exit after sending `quit` before killing.
    pub quit_grace: Duration,
    pub busy_policy: BusyPolicy,
    /// Applied when a request carries no stop condition; `None` means such
    /// requests are rejected as invalid.
    pub default_move_time: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            options: EngineOptions::default(),
            handshake_timeout: Duration::from_secs(5),
            stop_grace: Duration::from_secs(1),
            quit_grace: Duration::from_secs(1),
            busy_policy: BusyPolicy::Reject,
            default_move_time: Some(DEFAULT_MOVE_TIME),
        }
    }
}

/// Clamps a requested move time into the supported window.
pub fn clamp_move_time(requested: Duration) -> Duration {
    requested.clamp(MIN_MOVE_TIME, MAX_MOVE_TIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_send_hash_only() {
        let pairs = EngineOptions::default().to_pairs();
        assert_eq!(pairs, vec![("Hash".to_string(), "256".to_string())]);
    }

    #[test]
    fn test_elo_limit_sends_both_options() {
        let options = EngineOptions {
            hash_mb: None,
            elo_limit: Some(1500),
            ..EngineOptions::default()
        };
        let pairs = options.to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("UCI_LimitStrength".to_string(), "true".to_string()),
                ("UCI_Elo".to_string(), "1500".to_string()),
            ]
        );
    }

    #[test]
    fn test_clamp_move_time() {
        assert_eq!(clamp_move_time(Duration::from_millis(100)), MIN_MOVE_TIME);
        assert_eq!(clamp_move_time(Duration::from_secs(2)), Duration::from_secs(2));
        assert_eq!(clamp_move_time(Duration::from_secs(120)), MAX_MOVE_TIME);
    }
}
