use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::config::normalize_name_key;
use crate::error::{ArenaError, ArenaResult};
use crate::types::MatchRecord;

/// Matches a character needs before it gets a letter tier.
pub const TIER_MIN_MATCHES: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Tier {
  S,
  A,
  B,
  C,
  D,
  Unranked,
}

impl Tier {
  pub fn from_record(wins: u32, losses: u32) -> Self {
    let total = wins + losses;
    if total < TIER_MIN_MATCHES {
      return Tier::Unranked;
    }
    let rate = wins as f64 / total as f64;
    if rate >= 0.7 {
      Tier::S
    } else if rate >= 0.6 {
      Tier::A
    } else if rate >= 0.5 {
      Tier::B
    } else if rate >= 0.4 {
      Tier::C
    } else {
      Tier::D
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Tier::S => "S",
      Tier::A => "A",
      Tier::B => "B",
      Tier::C => "C",
      Tier::D => "D",
      Tier::Unranked => "Unranked",
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterRecord {
  pub wins: u32,
  pub losses: u32,
  pub defeated: BTreeMap<String, u32>,
  pub lost_to: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageRecord {
  pub times_used: u32,
  pub last_used: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryEntry {
  pub timestamp: String,
  pub mode: String,
  pub winner: String,
  pub loser: String,
  pub round: u32,
  pub stage: Option<String>,
  pub duration_ms: Option<u64>,
  pub score: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsFile {
  pub characters: BTreeMap<String, CharacterRecord>,
  pub stages: BTreeMap<String, StageRecord>,
  pub history: Vec<HistoryEntry>,
  pub last_save: Option<String>,
}

/// Answer to a `!stats <fighter>` request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStats {
  pub name: String,
  pub wins: u32,
  pub losses: u32,
  pub total: u32,
  pub win_rate: f64,
  pub tier: Tier,
  pub most_defeated: Option<(String, u32)>,
  pub most_lost_to: Option<(String, u32)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
  pub total_battles: usize,
  pub top_character: Option<(String, u32)>,
  pub top_stage: Option<(String, u32)>,
}

#[derive(Debug)]
pub struct StatsStore {
  path: Option<PathBuf>,
  data: StatsFile,
}

impl StatsStore {
  /// Loads `path`, starting empty when the file is missing or unreadable.
  pub fn load(path: &Path) -> Self {
    let data = if path.is_file() {
      match read_stats_file(path) {
        Ok(data) => {
          info!(
            "Loaded stats for {} characters from {}",
            data.characters.len(),
            path.display()
          );
          data
        }
        Err(err) => {
          warn!("{err}; starting with empty stats");
          StatsFile::default()
        }
      }
    } else {
      StatsFile::default()
    };
    Self {
      path: Some(path.to_path_buf()),
      data,
    }
  }

  pub fn in_memory() -> Self {
    Self {
      path: None,
      data: StatsFile::default(),
    }
  }

  pub fn data(&self) -> &StatsFile {
    &self.data
  }

  pub fn record(&mut self, record: &MatchRecord) -> ArenaResult<()> {
    let winner = record.winner.clone();
    let loser = record.loser().to_string();
    let timestamp = format_timestamp(record.timestamp_ms);

    let entry = self.data.characters.entry(winner.clone()).or_default();
    entry.wins += 1;
    *entry.defeated.entry(loser.clone()).or_insert(0) += 1;

    let entry = self.data.characters.entry(loser.clone()).or_default();
    entry.losses += 1;
    *entry.lost_to.entry(winner.clone()).or_insert(0) += 1;

    if let Some(stage) = record.stage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      let stage = self.data.stages.entry(stage.to_string()).or_default();
      stage.times_used += 1;
      stage.last_used = Some(timestamp.clone());
    }

    self.data.history.push(HistoryEntry {
      timestamp,
      mode: "tournament".to_string(),
      winner,
      loser,
      round: record.round,
      stage: record.stage.clone(),
      duration_ms: record.duration_ms,
      score: record.score.clone(),
    });

    self.save().map_err(ArenaError::Storage)
  }

  pub fn save(&mut self) -> Result<(), String> {
    let Some(path) = self.path.clone() else {
      return Ok(());
    };
    self.data.last_save = Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
      fs::create_dir_all(dir).map_err(|e| format!("create stats dir {}: {e}", dir.display()))?;
    }
    let payload = serde_json::to_string_pretty(&self.data).map_err(|e| e.to_string())?;
    fs::write(&path, payload).map_err(|e| format!("write stats {}: {e}", path.display()))
  }

  pub fn reset(&mut self) -> ArenaResult<()> {
    self.data = StatsFile::default();
    info!("Stats reset");
    self.save().map_err(ArenaError::Storage)
  }

  pub fn record_for(&self, name: &str) -> Option<(&str, &CharacterRecord)> {
    let key = normalize_name_key(name);
    self
      .data
      .characters
      .iter()
      .find(|(stored, _)| normalize_name_key(stored) == key)
      .map(|(stored, record)| (stored.as_str(), record))
  }

  pub fn tier(&self, name: &str) -> Tier {
    self
      .record_for(name)
      .map(|(_, record)| Tier::from_record(record.wins, record.losses))
      .unwrap_or(Tier::Unranked)
  }

  pub fn most_defeated(&self, name: &str) -> Option<(String, u32)> {
    self.record_for(name).and_then(|(_, record)| top_entry(&record.defeated))
  }

  pub fn most_lost_to(&self, name: &str) -> Option<(String, u32)> {
    self.record_for(name).and_then(|(_, record)| top_entry(&record.lost_to))
  }

  pub fn character_stats(&self, name: &str) -> Option<CharacterStats> {
    let (stored, record) = self.record_for(name)?;
    let total = record.wins + record.losses;
    let win_rate = if total == 0 {
      0.0
    } else {
      record.wins as f64 / total as f64
    };
    Some(CharacterStats {
      name: stored.to_string(),
      wins: record.wins,
      losses: record.losses,
      total,
      win_rate,
      tier: Tier::from_record(record.wins, record.losses),
      most_defeated: top_entry(&record.defeated),
      most_lost_to: top_entry(&record.lost_to),
    })
  }

  pub fn summary(&self) -> StatsSummary {
    let top_character = self
      .data
      .characters
      .iter()
      .filter(|(_, record)| record.wins > 0)
      .fold(None::<(&String, u32)>, |best, (name, record)| match best {
        Some((_, wins)) if wins >= record.wins => best,
        _ => Some((name, record.wins)),
      })
      .map(|(name, wins)| (name.clone(), wins));
    let top_stage = self
      .data
      .stages
      .iter()
      .fold(None::<(&String, u32)>, |best, (name, record)| match best {
        Some((_, used)) if used >= record.times_used => best,
        _ => Some((name, record.times_used)),
      })
      .map(|(name, used)| (name.clone(), used));
    StatsSummary {
      total_battles: self.data.history.len(),
      top_character,
      top_stage,
    }
  }

  /// Most recent `limit` battles, newest last.
  pub fn recent_history(&self, limit: usize) -> &[HistoryEntry] {
    let start = self.data.history.len().saturating_sub(limit);
    &self.data.history[start..]
  }
}

fn read_stats_file(path: &Path) -> Result<StatsFile, String> {
  let data = fs::read_to_string(path).map_err(|e| format!("read stats {}: {e}", path.display()))?;
  serde_json::from_str::<StatsFile>(&data).map_err(|e| format!("parse stats {}: {e}", path.display()))
}

/// Highest count, ties going to the alphabetically first name.
fn top_entry(map: &BTreeMap<String, u32>) -> Option<(String, u32)> {
  map
    .iter()
    .fold(None::<(&String, u32)>, |best, (name, count)| match best {
      Some((_, top)) if top >= *count => best,
      _ => Some((name, *count)),
    })
    .map(|(name, count)| (name.clone(), count))
}

fn format_timestamp(ms: u64) -> String {
  Local
    .timestamp_millis_opt(ms as i64)
    .single()
    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_default()
}
