use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::coordinator::Coordinator;

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_TOURNAMENT_SIZE: usize = 8;
pub const DEFAULT_STARTING_POINTS: u64 = 1000;
pub const DEFAULT_PAYOUT_PERCENT: u64 = 200;
pub const DEFAULT_BETTING_WINDOW_SEC: u64 = 20;
pub const DEFAULT_RESULT_TIMEOUT_SEC: u64 = 600;
pub const DEFAULT_WATCHER_POLL_MS: u64 = 500;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:17890";
pub const WATCHER_READ_ATTEMPTS: usize = 3;
pub const WATCHER_RETRY_DELAY_MS: u64 = 100;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedCoordinator = Arc<Mutex<Coordinator>>;

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub tournament_size: usize,
    pub characters: Vec<String>,
    pub stages: Vec<String>,
    pub starting_points: u64,
    pub payout_percent: u64,
    pub betting_window_sec: u64,
    pub watcher_log_path: String,
    pub watcher_poll_ms: u64,
    pub result_timeout_sec: u64,
    pub stats_path: String,
    pub listen_addr: String,
    pub overlay_dir: String,
    pub rng_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tournament_size: DEFAULT_TOURNAMENT_SIZE,
            characters: Vec::new(),
            stages: Vec::new(),
            starting_points: DEFAULT_STARTING_POINTS,
            payout_percent: DEFAULT_PAYOUT_PERCENT,
            betting_window_sec: DEFAULT_BETTING_WINDOW_SEC,
            watcher_log_path: "MugenWatcher.Log".to_string(),
            watcher_poll_ms: DEFAULT_WATCHER_POLL_MS,
            result_timeout_sec: DEFAULT_RESULT_TIMEOUT_SEC,
            stats_path: "battle_stats.json".to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            overlay_dir: String::new(),
            rng_seed: None,
        }
    }
}

// ── Result ingestion ───────────────────────────────────────────────────

/// Outcome reported by the result watcher for a finished fight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Match the watcher was armed for, when known.
    pub match_id: Option<u64>,
    pub winner: String,
    pub loser: String,
    pub duration_ms: Option<u64>,
    pub stage: Option<String>,
    /// Final round score as `"p1-p2"`, when the watcher saw one.
    pub score: Option<String>,
}

/// Queue item consumed by the coordinator's ingest loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Result(MatchResult),
    Unavailable { match_id: Option<u64>, reason: String },
}

/// Immutable record of a decided fight, handed to the statistics store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub participants: [String; 2],
    pub winner: String,
    pub round: u32,
    pub timestamp_ms: u64,
    pub stage: Option<String>,
    pub duration_ms: Option<u64>,
    pub score: Option<String>,
}

impl MatchRecord {
    pub fn loser(&self) -> &str {
        if self.participants[0] == self.winner {
            &self.participants[1]
        } else {
            &self.participants[0]
        }
    }
}

// ── HTTP payloads ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTournamentRequest {
    pub participants: Vec<String>,
    pub count: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResultRequest {
    pub winner: String,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub bettor: String,
    pub participant: String,
    pub amount: u64,
    pub match_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsPayload {
    pub bettor: String,
    pub points: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandHelp {
    pub command: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

pub const CHAT_COMMANDS: [CommandHelp; 4] = [
    CommandHelp {
        command: "!bet",
        usage: "!bet <fighter> <amount>",
        description: "Bet points on a fighter while betting is open.",
    },
    CommandHelp {
        command: "!points",
        usage: "!points",
        description: "Show your current points.",
    },
    CommandHelp {
        command: "!stats",
        usage: "!stats <fighter>",
        description: "Show a fighter's record and tier.",
    },
    CommandHelp {
        command: "!help",
        usage: "!help",
        description: "List the available commands.",
    },
];
