use std::{
  fs,
  io::ErrorKind,
  path::{Path, PathBuf},
  sync::{mpsc::Sender, Arc, Mutex},
  thread::sleep,
  time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{IngestEvent, MatchResult, WATCHER_READ_ATTEMPTS, WATCHER_RETRY_DELAY_MS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatcherError {
  #[error("watcher line is empty")]
  Empty,
  #[error("watcher line has {0} fields, expected at least 4")]
  MissingFields(usize),
  #[error("watcher score {0:?} is not a number")]
  InvalidScore(String),
  #[error("read watcher log: {0}")]
  Io(String),
}

/// Parses `<p1>,<p2>,<p1 score>,<p2 score>` into the two scores.
pub fn parse_watcher_line(line: &str) -> Result<(u32, u32), WatcherError> {
  let line = line.trim();
  if line.is_empty() {
    return Err(WatcherError::Empty);
  }
  let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
  if fields.len() < 4 {
    return Err(WatcherError::MissingFields(fields.len()));
  }
  let score = |raw: &str| {
    raw
      .parse::<u32>()
      .map_err(|_| WatcherError::InvalidScore(raw.to_string()))
  };
  Ok((score(fields[2])?, score(fields[3])?))
}

/// Reads the first line of the watcher log. The helper may hold the file
/// open while writing, so permission failures are retried a few times.
pub fn read_result_file(path: &Path) -> Result<Option<(u32, u32)>, WatcherError> {
  for attempt in 1..=WATCHER_READ_ATTEMPTS {
    match fs::read_to_string(path) {
      Ok(contents) => {
        let first = contents.lines().next().unwrap_or("");
        return match parse_watcher_line(first) {
          Ok(scores) => Ok(Some(scores)),
          Err(WatcherError::Empty) => Ok(None),
          Err(err) => Err(err),
        };
      }
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) if e.kind() == ErrorKind::PermissionDenied && attempt < WATCHER_READ_ATTEMPTS => {
        sleep(Duration::from_millis(WATCHER_RETRY_DELAY_MS));
      }
      Err(e) => return Err(WatcherError::Io(format!("{}: {e}", path.display()))),
    }
  }
  Ok(None)
}

fn remove_result_file(path: &Path) {
  match fs::remove_file(path) {
    Ok(()) => {}
    Err(e) if e.kind() == ErrorKind::NotFound => {}
    Err(e) => warn!("remove watcher log {}: {e}", path.display()),
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
  pub match_id: u64,
  pub p1: String,
  pub p2: String,
  pub stage: Option<String>,
  pub armed_at: Instant,
}

/// Decide what, if anything, the watcher should report for `request`.
pub fn check_armed(path: &Path, request: &WatchRequest, timeout: Duration, now: Instant) -> Option<IngestEvent> {
  let outcome = read_result_file(path);
  let elapsed = now.saturating_duration_since(request.armed_at);

  if let Ok(Some((p1_score, p2_score))) = outcome {
    remove_result_file(path);
    if p1_score == p2_score {
      return Some(IngestEvent::Unavailable {
        match_id: Some(request.match_id),
        reason: format!("fight ended in a {p1_score}-{p2_score} tie"),
      });
    }
    let (winner, loser) = if p1_score > p2_score {
      (&request.p1, &request.p2)
    } else {
      (&request.p2, &request.p1)
    };
    return Some(IngestEvent::Result(MatchResult {
      match_id: Some(request.match_id),
      winner: winner.clone(),
      loser: loser.clone(),
      duration_ms: Some(elapsed.as_millis() as u64),
      stage: request.stage.clone(),
      score: Some(format!("{p1_score}-{p2_score}")),
    }));
  }

  if elapsed < timeout {
    if let Err(err) = &outcome {
      debug!("match {}: {err}", request.match_id);
    }
    return None;
  }

  let reason = match outcome {
    Err(err) => format!("unreadable watcher output: {err}"),
    _ => format!("no result within {timeout:?}"),
  };
  remove_result_file(path);
  Some(IngestEvent::Unavailable {
    match_id: Some(request.match_id),
    reason,
  })
}

/// Background poller for the result helper's log file. Armed for one
/// match at a time; never touches tournament state, only the queue.
#[derive(Debug, Clone)]
pub struct LogWatcher {
  path: PathBuf,
  armed: Arc<Mutex<Option<WatchRequest>>>,
}

impl LogWatcher {
  pub fn spawn(path: PathBuf, poll: Duration, timeout: Duration, sender: Sender<IngestEvent>) -> Self {
    let watcher = LogWatcher {
      path: path.clone(),
      armed: Arc::new(Mutex::new(None)),
    };
    let armed = watcher.armed.clone();
    info!("Result watcher polling {}", path.display());
    std::thread::spawn(move || loop {
      sleep(poll);
      let request = {
        let guard = armed.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
      };
      let Some(request) = request else {
        continue;
      };
      let Some(event) = check_armed(&path, &request, timeout, Instant::now()) else {
        continue;
      };
      {
        let mut guard = armed.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().map(|r| r.match_id) == Some(request.match_id) {
          *guard = None;
        }
      }
      if sender.send(event).is_err() {
        warn!("Ingest queue closed, result watcher stopping");
        break;
      }
    });
    watcher
  }

  /// Start watching for `match_id`. Any leftover log from an earlier
  /// fight is discarded first.
  pub fn arm(&self, match_id: u64, p1: &str, p2: &str, stage: Option<String>) {
    remove_result_file(&self.path);
    let mut guard = self.armed.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(WatchRequest {
      match_id,
      p1: p1.to_string(),
      p2: p2.to_string(),
      stage,
      armed_at: Instant::now(),
    });
    debug!("Watcher armed for match {match_id}: {p1} vs {p2}");
  }

  pub fn disarm(&self, match_id: u64) {
    let mut guard = self.armed.lock().unwrap_or_else(|e| e.into_inner());
    if guard.as_ref().map(|r| r.match_id) == Some(match_id) {
      *guard = None;
    }
  }

  pub fn armed_match(&self) -> Option<u64> {
    let guard = self.armed.lock().unwrap_or_else(|e| e.into_inner());
    guard.as_ref().map(|r| r.match_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::now_ms;
  use std::sync::mpsc;

  fn temp_log(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("arena_watcher_{label}_{}_{}.log", std::process::id(), now_ms()))
  }

  fn request(armed_at: Instant) -> WatchRequest {
    WatchRequest {
      match_id: 4,
      p1: "Ryu".to_string(),
      p2: "Ken".to_string(),
      stage: Some("Dojo".to_string()),
      armed_at,
    }
  }

  #[test]
  fn parse_watcher_line_reads_scores() {
    assert_eq!(parse_watcher_line("Ryu,Ken,2,1"), Ok((2, 1)));
    assert_eq!(parse_watcher_line(" Ryu , Ken , 0 , 2 ,extra"), Ok((0, 2)));
    assert_eq!(parse_watcher_line(""), Err(WatcherError::Empty));
    assert_eq!(parse_watcher_line("Ryu,Ken,2"), Err(WatcherError::MissingFields(3)));
    assert_eq!(
      parse_watcher_line("Ryu,Ken,two,1"),
      Err(WatcherError::InvalidScore("two".to_string()))
    );
  }

  #[test]
  fn higher_score_wins_and_log_is_removed() {
    let path = temp_log("p2wins");
    fs::write(&path, "Ryu,Ken,1,2\n").unwrap();
    let armed_at = Instant::now();
    let event = check_armed(&path, &request(armed_at), Duration::from_secs(60), armed_at + Duration::from_secs(3));
    match event {
      Some(IngestEvent::Result(result)) => {
        assert_eq!(result.match_id, Some(4));
        assert_eq!(result.winner, "Ken");
        assert_eq!(result.loser, "Ryu");
        assert_eq!(result.duration_ms, Some(3000));
        assert_eq!(result.stage.as_deref(), Some("Dojo"));
        assert_eq!(result.score.as_deref(), Some("1-2"));
      }
      other => panic!("unexpected event {other:?}"),
    }
    assert!(!path.exists());
  }

  #[test]
  fn tie_is_reported_unavailable() {
    let path = temp_log("tie");
    fs::write(&path, "Ryu,Ken,1,1").unwrap();
    let armed_at = Instant::now();
    let event = check_armed(&path, &request(armed_at), Duration::from_secs(60), armed_at);
    assert!(matches!(event, Some(IngestEvent::Unavailable { match_id: Some(4), .. })));
    assert!(!path.exists());
  }

  #[test]
  fn waits_until_timeout_then_reports_unavailable() {
    let path = temp_log("timeout");
    let armed_at = Instant::now();
    let timeout = Duration::from_secs(10);
    assert_eq!(check_armed(&path, &request(armed_at), timeout, armed_at + Duration::from_secs(9)), None);

    fs::write(&path, "garbage").unwrap();
    assert_eq!(check_armed(&path, &request(armed_at), timeout, armed_at + Duration::from_secs(9)), None);

    match check_armed(&path, &request(armed_at), timeout, armed_at + timeout) {
      Some(IngestEvent::Unavailable { reason, .. }) => assert!(reason.contains("unreadable")),
      other => panic!("unexpected event {other:?}"),
    }
    let _ = fs::remove_file(&path);
  }

  #[test]
  fn short_timeout_reason_keeps_milliseconds() {
    let path = temp_log("short_timeout");
    let armed_at = Instant::now();
    let timeout = Duration::from_millis(200);
    match check_armed(&path, &request(armed_at), timeout, armed_at + timeout) {
      Some(IngestEvent::Unavailable { match_id, reason }) => {
        assert_eq!(match_id, Some(4));
        assert_eq!(reason, "no result within 200ms");
      }
      other => panic!("unexpected event {other:?}"),
    }
  }

  #[test]
  fn spawned_watcher_sends_result_for_armed_match() {
    let path = temp_log("spawned");
    let (tx, rx) = mpsc::channel();
    let watcher = LogWatcher::spawn(path.clone(), Duration::from_millis(10), Duration::from_secs(30), tx);
    watcher.arm(9, "Ryu", "Ken", None);
    assert_eq!(watcher.armed_match(), Some(9));
    fs::write(&path, "Ryu,Ken,2,0").unwrap();

    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    match event {
      IngestEvent::Result(result) => {
        assert_eq!(result.match_id, Some(9));
        assert_eq!(result.winner, "Ryu");
      }
      other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(watcher.armed_match(), None);
    let _ = fs::remove_file(&path);
  }

  #[test]
  fn disarm_ignores_other_matches() {
    let (tx, _rx) = mpsc::channel();
    let watcher = LogWatcher::spawn(temp_log("disarm"), Duration::from_secs(60), Duration::from_secs(60), tx);
    watcher.arm(1, "A", "B", None);
    watcher.disarm(2);
    assert_eq!(watcher.armed_match(), Some(1));
    watcher.disarm(1);
    assert_eq!(watcher.armed_match(), None);
  }
}
