use serde::Serialize;
use std::{
  collections::HashSet,
  sync::mpsc::Receiver,
  thread::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::bracket::{bracket_size_for, Bracket, BracketEvent, BracketSnapshot, MatchState, MatchView, NextMatch};
use crate::config::{normalize_name_key, now_ms};
use crate::error::{ArenaError, ArenaResult};
use crate::ledger::{BettingView, Ledger, Wager};
use crate::stats::{CharacterStats, HistoryEntry, StatsStore, StatsSummary};
use crate::types::{AppConfig, IngestEvent, SharedCoordinator};
use crate::watcher::LogWatcher;

/// Small xorshift generator; seedable so tournaments can be replayed.
#[derive(Debug, Clone)]
struct ArenaRng {
  state: u64,
}

impl ArenaRng {
  fn new(seed: u64) -> Self {
    let mut state = seed;
    if state == 0 {
      state = 0x9E37_79B9_7F4A_7C15;
    }
    ArenaRng { state }
  }

  fn next_u64(&mut self) -> u64 {
    let mut x = self.state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    self.state = x;
    x
  }

  fn gen_index(&mut self, len: usize) -> usize {
    if len <= 1 {
      return 0;
    }
    (self.next_u64() % len as u64) as usize
  }

  fn shuffle<T>(&mut self, items: &mut [T]) {
    for i in (1..items.len()).rev() {
      let j = self.gen_index(i + 1);
      items.swap(i, j);
    }
  }

  fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
      return None;
    }
    items.get(self.gen_index(items.len()))
  }
}

/// Everything the overlay polls for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaSnapshot {
  pub bracket: Option<BracketSnapshot>,
  pub betting: Option<BettingView>,
  pub stats: StatsSummary,
  pub now_ms: u64,
}

/// Owns the tournament: bracket, betting ledger and statistics. Every
/// mutation is routed through here under the shared lock.
pub struct Coordinator {
  tournament_size: usize,
  characters: Vec<String>,
  stages: Vec<String>,
  betting_window_ms: u64,
  bracket: Option<Bracket>,
  ledger: Ledger,
  stats: StatsStore,
  rng: ArenaRng,
  watcher: Option<LogWatcher>,
}

impl Coordinator {
  pub fn new(config: &AppConfig, stats: StatsStore) -> Self {
    Self {
      tournament_size: config.tournament_size,
      characters: config.characters.clone(),
      stages: config.stages.clone(),
      betting_window_ms: config.betting_window_sec.saturating_mul(1000),
      bracket: None,
      ledger: Ledger::new(config.starting_points, config.payout_percent),
      stats,
      rng: ArenaRng::new(config.rng_seed.unwrap_or_else(now_ms)),
      watcher: None,
    }
  }

  pub fn with_watcher(mut self, watcher: LogWatcher) -> Self {
    self.watcher = Some(watcher);
    self
  }

  pub fn bracket(&self) -> Option<&Bracket> {
    self.bracket.as_ref()
  }

  pub fn ledger(&self) -> &Ledger {
    &self.ledger
  }

  pub fn stats(&self) -> &StatsStore {
    &self.stats
  }

  /// Replace the running tournament. The old bracket's open wagers are
  /// refunded; a rejected roster leaves the old tournament untouched.
  pub fn new_tournament(&mut self, names: &[String], size: Option<usize>, now_ms: u64) -> ArenaResult<BracketSnapshot> {
    let count = names.iter().filter(|name| !name.trim().is_empty()).count();
    let size = size
      .or_else(|| bracket_size_for(count))
      .unwrap_or(self.tournament_size);
    let bracket = Bracket::new(names, size, now_ms)?;

    let refunded = self.ledger.void_all_open();
    self.ledger.clear_pools();
    if let Some(watcher) = &self.watcher {
      for id in self.bracket.iter().flat_map(|b| b.in_progress_ids()) {
        watcher.disarm(id);
      }
    }
    if refunded > 0 {
      info!("Refunded {refunded} points from the previous tournament");
    }
    let snapshot = bracket.snapshot(now_ms);
    self.bracket = Some(bracket);
    Ok(snapshot)
  }

  /// Draw `count` distinct characters from the configured roster.
  pub fn random_tournament(&mut self, count: Option<usize>, now_ms: u64) -> ArenaResult<BracketSnapshot> {
    let needed = count.unwrap_or(self.tournament_size);
    let mut seen = HashSet::new();
    let mut roster = self
      .characters
      .iter()
      .map(|name| name.trim())
      .filter(|name| !name.is_empty() && seen.insert(normalize_name_key(name)))
      .map(|name| name.to_string())
      .collect::<Vec<_>>();
    if roster.len() < needed {
      return Err(ArenaError::NotEnoughCharacters {
        needed,
        available: roster.len(),
      });
    }
    self.rng.shuffle(&mut roster);
    roster.truncate(needed);
    self.new_tournament(&roster, None, now_ms)
  }

  /// Next match to fight. Opens its betting window the first time a
  /// pending match is handed out; a running match never reopens betting.
  pub fn next_match(&mut self, now_ms: u64) -> ArenaResult<NextMatch> {
    let bracket = self.bracket.as_ref().ok_or(ArenaError::NoActiveTournament)?;
    let next = bracket.next_match();
    if let NextMatch::Ready(view) = &next {
      if let Some(entrants) = view.entrants().filter(|_| view.state == MatchState::Pending) {
        if self.ledger.open_betting(view.id, entrants, now_ms, self.betting_window_ms) {
          debug!("Match {} offered for betting", view.id);
        }
      }
    }
    Ok(next)
  }

  /// Hand the match to the runner: betting closes, a stage is drawn and
  /// the result watcher is armed. Only one match runs at a time.
  pub fn start_match(&mut self, match_id: u64, now_ms: u64) -> ArenaResult<MatchView> {
    let bracket = self.bracket.as_mut().ok_or(ArenaError::NoActiveTournament)?;
    if let Some(running) = bracket.in_progress_ids().into_iter().find(|id| *id != match_id) {
      return Err(ArenaError::MatchInProgress(running));
    }
    let stage = self.rng.pick(&self.stages).cloned();
    let view = bracket.start_match(match_id, stage, now_ms)?;
    self.ledger.close_betting(match_id);

    if let Some(watcher) = &self.watcher {
      if watcher.armed_match() != Some(match_id) {
        let names = view
          .slots
          .iter()
          .map(|slot| slot.entrant_name.clone().unwrap_or_default())
          .collect::<Vec<_>>();
        if let [p1, p2] = names.as_slice() {
          watcher.arm(match_id, p1, p2, view.stage.clone());
        }
      }
    }
    info!(
      "Match {match_id} started on {}",
      view.stage.as_deref().unwrap_or("default stage")
    );
    Ok(view)
  }

  /// Decide `match_id`. Betting is closed before the bracket changes;
  /// the resulting events settle wagers and feed the statistics.
  pub fn report_result(
    &mut self,
    match_id: u64,
    winner_id: u32,
    duration_ms: Option<u64>,
    now_ms: u64,
  ) -> ArenaResult<Vec<BracketEvent>> {
    self.decide(match_id, winner_id, duration_ms, None, now_ms)
  }

  fn decide(
    &mut self,
    match_id: u64,
    winner_id: u32,
    duration_ms: Option<u64>,
    score: Option<String>,
    now_ms: u64,
  ) -> ArenaResult<Vec<BracketEvent>> {
    let bracket = self.bracket.as_mut().ok_or(ArenaError::NoActiveTournament)?;
    bracket.validate_report(match_id, winner_id)?;
    self.ledger.close_betting(match_id);
    let mut events = bracket.report_result(match_id, winner_id, now_ms)?;
    for event in events.iter_mut() {
      if let BracketEvent::MatchDecided { record, .. } = event {
        record.duration_ms = duration_ms;
        record.score = score.clone();
      }
    }
    if let Some(watcher) = &self.watcher {
      watcher.disarm(match_id);
    }
    self.apply_events(&events);
    Ok(events)
  }

  /// Report a winner by name, as typed by an operator.
  pub fn report_result_by_name(
    &mut self,
    match_id: u64,
    winner: &str,
    duration_ms: Option<u64>,
    now_ms: u64,
  ) -> ArenaResult<Vec<BracketEvent>> {
    let bracket = self.bracket.as_ref().ok_or(ArenaError::NoActiveTournament)?;
    if bracket.match_view(match_id).is_none() {
      return Err(ArenaError::UnknownMatch(match_id));
    }
    let winner_id = match bracket.entrant_in_match(match_id, winner) {
      Some(id) => id,
      None => {
        let participant = bracket.participant_by_name(winner).map(|p| p.id).unwrap_or(0);
        return Err(ArenaError::InvalidWinner { match_id, participant });
      }
    };
    self.report_result(match_id, winner_id, duration_ms, now_ms)
  }

  /// Apply one item from the result queue.
  pub fn ingest(&mut self, event: IngestEvent, now_ms: u64) -> ArenaResult<Vec<BracketEvent>> {
    match event {
      IngestEvent::Result(result) => {
        let bracket = self.bracket.as_mut().ok_or(ArenaError::NoActiveTournament)?;
        match bracket.match_for_result(&result.winner, &result.loser) {
          Some((match_id, winner_id)) => {
            if result.match_id.is_some_and(|armed| armed != match_id) {
              warn!(
                "Result for {} vs {} arrived for match {:?} but belongs to match {match_id}",
                result.winner, result.loser, result.match_id
              );
            }
            self.decide(match_id, winner_id, result.duration_ms, result.score, now_ms)
          }
          None => {
            let reason = format!("{} vs {} matches no running match", result.winner, result.loser);
            if let Some(match_id) = result.match_id {
              if let Err(err) = bracket.flag_for_review(match_id, &reason) {
                debug!("Could not flag match {match_id}: {err}");
              }
            }
            warn!("{reason}");
            Err(ArenaError::ResultUnavailable {
              match_id: result.match_id,
              reason,
            })
          }
        }
      }
      IngestEvent::Unavailable { match_id, reason } => {
        if let (Some(match_id), Some(bracket)) = (match_id, self.bracket.as_mut()) {
          if let Err(err) = bracket.flag_for_review(match_id, &reason) {
            debug!("Could not flag match {match_id}: {err}");
          }
        }
        warn!(
          "Result unavailable for match {}: {reason}",
          match_id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
        );
        Err(ArenaError::ResultUnavailable { match_id, reason })
      }
    }
  }

  /// Operator replay: put the match back to pending and start it again.
  pub fn replay_match(&mut self, match_id: u64, now_ms: u64) -> ArenaResult<MatchView> {
    let bracket = self.bracket.as_mut().ok_or(ArenaError::NoActiveTournament)?;
    bracket.reset_match(match_id)?;
    if let Some(watcher) = &self.watcher {
      watcher.disarm(match_id);
    }
    info!("Replaying match {match_id}");
    self.start_match(match_id, now_ms)
  }

  pub fn place_bet(
    &mut self,
    bettor: &str,
    match_id: u64,
    participant_id: u32,
    amount: u64,
    now_ms: u64,
  ) -> ArenaResult<Wager> {
    self.ledger.place_bet(bettor, match_id, participant_id, amount, now_ms)
  }

  /// `!bet <fighter> <amount>`: bets on the match currently open for
  /// betting unless a match id is given.
  pub fn place_bet_by_name(
    &mut self,
    bettor: &str,
    participant: &str,
    amount: u64,
    match_id: Option<u64>,
    now_ms: u64,
  ) -> ArenaResult<Wager> {
    let match_id = match match_id {
      Some(id) => id,
      None => match self.next_match(now_ms)? {
        NextMatch::Ready(view) => view.id,
        _ => return Err(ArenaError::NoActiveTournament),
      },
    };
    let bracket = self.bracket.as_ref().ok_or(ArenaError::NoActiveTournament)?;
    let participant_id = bracket
      .entrant_in_match(match_id, participant)
      .ok_or_else(|| ArenaError::InvalidSelection {
        match_id,
        participant: participant.trim().to_string(),
      })?;
    self.place_bet(bettor, match_id, participant_id, amount, now_ms)
  }

  pub fn points(&mut self, bettor: &str) -> u64 {
    self.ledger.balance(bettor)
  }

  pub fn stats_for(&self, name: &str) -> Option<CharacterStats> {
    self.stats.character_stats(name)
  }

  pub fn reset_stats(&mut self) -> ArenaResult<()> {
    self.stats.reset()
  }

  /// Latest battles, newest last.
  pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
    self.stats.recent_history(limit).to_vec()
  }

  pub fn bracket_text(&self) -> ArenaResult<String> {
    self
      .bracket
      .as_ref()
      .map(|b| b.render_text())
      .ok_or(ArenaError::NoActiveTournament)
  }

  pub fn snapshot(&self, now_ms: u64) -> ArenaSnapshot {
    let betting = self.bracket.as_ref().and_then(|bracket| match bracket.next_match() {
      NextMatch::Ready(view) => self.ledger.betting_view(view.id, now_ms),
      _ => None,
    });
    ArenaSnapshot {
      bracket: self.bracket.as_ref().map(|b| b.snapshot(now_ms)),
      betting,
      stats: self.stats.summary(),
      now_ms,
    }
  }

  fn apply_events(&mut self, events: &[BracketEvent]) {
    for event in events {
      match event {
        BracketEvent::MatchDecided {
          match_id,
          winner_id,
          record,
          ..
        } => {
          self.ledger.settle(*match_id, *winner_id);
          if let Err(err) = self.stats.record(record) {
            warn!("Failed to record match {match_id}: {err}");
          }
        }
        BracketEvent::RoundAdvanced { round } => info!("Round {round} is ready"),
        BracketEvent::TournamentComplete { champion_name, .. } => {
          info!("{champion_name} wins the tournament")
        }
      }
    }
  }
}

/// Single consumer of the result queue. Events are applied one at a time,
/// in arrival order, under the coordinator lock.
pub fn spawn_ingest_loop(shared: SharedCoordinator, receiver: Receiver<IngestEvent>) -> JoinHandle<()> {
  std::thread::spawn(move || {
    for event in receiver {
      let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
      match guard.ingest(event, now_ms()) {
        Ok(events) => debug!("Ingested result, {} bracket event(s)", events.len()),
        Err(err) => warn!("Ingest: {err}"),
      }
    }
    info!("Ingest queue closed");
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bracket::TournamentStatus;
  use crate::types::MatchResult;
  use std::sync::{mpsc, Arc, Mutex};

  fn test_config() -> AppConfig {
    AppConfig {
      characters: ["Ryu", "Ken", "Guile", "Chun-Li", "Blanka", "Zangief"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
      stages: vec!["Dojo".to_string()],
      rng_seed: Some(7),
      ..AppConfig::default()
    }
  }

  fn make_coordinator() -> Coordinator {
    Coordinator::new(&test_config(), StatsStore::in_memory())
  }

  fn abcd() -> Vec<String> {
    ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect()
  }

  fn result(winner: &str, loser: &str, match_id: Option<u64>) -> IngestEvent {
    IngestEvent::Result(MatchResult {
      match_id,
      winner: winner.to_string(),
      loser: loser.to_string(),
      duration_ms: Some(30_000),
      stage: None,
      score: Some("2-0".to_string()),
    })
  }

  #[test]
  fn losing_bettor_pays_stake_once() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();

    let NextMatch::Ready(view) = coord.next_match(0).unwrap() else {
      panic!("expected a match");
    };
    coord.place_bet_by_name("viewer", "A", 100, None, 1).unwrap();
    assert_eq!(coord.points("viewer"), 900);

    let started = coord.start_match(view.id, 2).unwrap();
    assert_eq!(started.stage.as_deref(), Some("Dojo"));
    assert_eq!(
      coord.place_bet_by_name("viewer", "B", 10, Some(view.id), 3),
      Err(ArenaError::BettingClosed(view.id))
    );

    let b = coord.bracket().unwrap().participant_by_name("B").unwrap().id;
    coord.report_result(view.id, b, Some(5_000), 4).unwrap();
    assert_eq!(coord.points("viewer"), 900);
    assert_eq!(coord.ledger().escrowed_total(), 0);

    let stats = coord.stats_for("B").unwrap();
    assert_eq!((stats.wins, stats.losses), (1, 0));
    assert_eq!(coord.stats().data().history[0].duration_ms, Some(5_000));
  }

  #[test]
  fn ingest_maps_results_by_name_and_completes() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), Some(4), 0).unwrap();

    coord.start_match(2, 0).unwrap();
    coord.ingest(result("D", "C", Some(2)), 10).unwrap();
    coord.start_match(1, 15).unwrap();
    coord.ingest(result("A", "B", Some(1)), 20).unwrap();

    let NextMatch::Ready(final_match) = coord.next_match(30).unwrap() else {
      panic!("expected the final");
    };
    assert_eq!(final_match.round, 2);
    coord.start_match(final_match.id, 30).unwrap();
    let events = coord.ingest(result("D", "A", None), 40).unwrap();
    assert!(events
      .iter()
      .any(|e| matches!(e, BracketEvent::TournamentComplete { champion_name, .. } if champion_name == "D")));
    assert_eq!(
      coord.bracket().unwrap().state().status,
      TournamentStatus::Complete
    );
    assert_eq!(coord.stats().summary().total_battles, 3);
    let history = coord.history(2);
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].winner, "D");
    assert_eq!(history[1].score.as_deref(), Some("2-0"));
  }

  #[test]
  fn second_match_waits_for_the_running_one() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), Some(4), 0).unwrap();
    coord.start_match(1, 0).unwrap();
    assert_eq!(coord.start_match(2, 1).unwrap_err(), ArenaError::MatchInProgress(1));
    assert_eq!(coord.start_match(1, 2).unwrap().id, 1);

    coord.ingest(result("B", "A", Some(1)), 3).unwrap();
    assert_eq!(coord.start_match(2, 4).unwrap().state, MatchState::InProgress);
  }

  #[test]
  fn started_match_never_reopens_betting() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    coord.start_match(1, 0).unwrap();

    let NextMatch::Ready(view) = coord.next_match(1).unwrap() else {
      panic!("expected the running match");
    };
    assert_eq!(view.state, MatchState::InProgress);
    assert_eq!(
      coord.place_bet_by_name("viewer", "A", 100, Some(1), 2),
      Err(ArenaError::BettingClosed(1))
    );
    assert_eq!(coord.points("viewer"), 1000);
    assert!(coord.snapshot(3).betting.is_none());
  }

  #[test]
  fn rejected_report_leaves_betting_open() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    coord.next_match(0).unwrap();
    let c = coord.bracket().unwrap().participant_by_name("C").unwrap().id;

    assert_eq!(
      coord.report_result(1, c, None, 1),
      Err(ArenaError::InvalidWinner { match_id: 1, participant: c })
    );
    assert_eq!(
      coord.report_result_by_name(1, "Nobody", None, 1),
      Err(ArenaError::InvalidWinner { match_id: 1, participant: 0 })
    );
    assert_eq!(coord.place_bet_by_name("viewer", "A", 100, Some(1), 2).unwrap().amount, 100);
    assert_eq!(coord.bracket().unwrap().match_view(1).unwrap().state, MatchState::Pending);
  }

  #[test]
  fn bet_without_a_playable_match_reports_no_tournament() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), Some(4), 0).unwrap();
    for (id, winner) in [(1, "A"), (2, "C"), (3, "A")] {
      coord.report_result_by_name(id, winner, None, id).unwrap();
    }
    assert_eq!(
      coord.place_bet_by_name("viewer", "A", 10, None, 10),
      Err(ArenaError::NoActiveTournament)
    );
  }

  #[test]
  fn unmatched_result_flags_review_and_replay_restarts() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    coord.start_match(1, 0).unwrap();

    let err = coord.ingest(result("C", "A", Some(1)), 5).unwrap_err();
    assert!(matches!(err, ArenaError::ResultUnavailable { match_id: Some(1), .. }));
    let view = coord.bracket().unwrap().match_view(1).unwrap();
    assert!(view.review_reason.is_some());

    let err = coord
      .ingest(
        IngestEvent::Unavailable {
          match_id: Some(1),
          reason: "no result within 600s".to_string(),
        },
        6,
      )
      .unwrap_err();
    assert_eq!(err.kind(), "resultUnavailable");

    let replayed = coord.replay_match(1, 7).unwrap();
    assert_eq!(replayed.review_reason, None);
    assert_eq!(replayed.started_at_ms, Some(7));
    coord.ingest(result("B", "A", Some(1)), 8).unwrap();
    assert!(coord.bracket().unwrap().match_view(1).unwrap().winner_id.is_some());
  }

  #[test]
  fn new_tournament_refunds_open_wagers() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    coord.next_match(0).unwrap();
    coord.place_bet_by_name("viewer", "B", 250, None, 1).unwrap();
    assert_eq!(coord.points("viewer"), 750);

    let names = ["E", "F", "G"].iter().map(|s| s.to_string()).collect::<Vec<_>>();
    coord.new_tournament(&names, None, 2).unwrap();
    assert_eq!(coord.points("viewer"), 1000);
    assert_eq!(coord.bracket().unwrap().participants().len(), 3);
  }

  #[test]
  fn rejected_roster_keeps_current_tournament() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    let dupes = ["A", "a"].iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert!(coord.new_tournament(&dupes, None, 1).is_err());
    assert_eq!(coord.bracket().unwrap().participants().len(), 4);
  }

  #[test]
  fn random_tournament_samples_distinct_characters() {
    let mut coord = make_coordinator();
    let snapshot = coord.random_tournament(Some(4), 0).unwrap();
    assert_eq!(snapshot.size, 4);
    let names = snapshot.participants.iter().map(|p| p.name.clone()).collect::<HashSet<_>>();
    assert_eq!(names.len(), 4);

    assert_eq!(
      coord.random_tournament(Some(8), 0).unwrap_err(),
      ArenaError::NotEnoughCharacters { needed: 8, available: 6 }
    );

    let mut again = make_coordinator();
    let repeat = again.random_tournament(Some(4), 0).unwrap();
    assert_eq!(repeat.participants, snapshot.participants);
  }

  #[test]
  fn operations_without_tournament_fail() {
    let mut coord = make_coordinator();
    assert_eq!(coord.next_match(0).unwrap_err(), ArenaError::NoActiveTournament);
    assert_eq!(coord.bracket_text().unwrap_err(), ArenaError::NoActiveTournament);
    assert!(coord.snapshot(0).bracket.is_none());
  }

  #[test]
  fn concurrent_reports_decide_a_match_once() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    let bracket = coord.bracket().unwrap();
    let a = bracket.participant_by_name("A").unwrap().id;
    let b = bracket.participant_by_name("B").unwrap().id;
    let shared: SharedCoordinator = Arc::new(Mutex::new(coord));

    let handles = [a, b]
      .into_iter()
      .map(|winner| {
        let shared = shared.clone();
        std::thread::spawn(move || {
          let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
          guard.report_result(1, winner, None, 5).is_ok()
        })
      })
      .collect::<Vec<_>>();
    let successes = handles
      .into_iter()
      .map(|h| h.join().unwrap())
      .filter(|ok| *ok)
      .count();
    assert_eq!(successes, 1);

    let guard = shared.lock().unwrap();
    assert_eq!(guard.stats().summary().total_battles, 1);
  }

  #[test]
  fn ingest_loop_applies_queue_in_order() {
    let mut coord = make_coordinator();
    coord.new_tournament(&abcd(), None, 0).unwrap();
    coord.start_match(1, 0).unwrap();
    let shared: SharedCoordinator = Arc::new(Mutex::new(coord));

    let (tx, rx) = mpsc::channel();
    let handle = spawn_ingest_loop(shared.clone(), rx);
    tx.send(result("A", "B", Some(1))).unwrap();
    // Second report for the same fight is rejected, not double counted.
    tx.send(result("A", "B", Some(1))).unwrap();
    drop(tx);
    handle.join().unwrap();

    let guard = shared.lock().unwrap();
    let view = guard.bracket().unwrap().match_view(1).unwrap();
    assert_eq!(view.winner_id, Some(1));
    assert_eq!(guard.stats().summary().total_battles, 1);
  }
}
