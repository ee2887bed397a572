use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::normalize_name_key;
use crate::error::{ArenaError, ArenaResult};
use crate::types::MatchRecord;

pub const SUPPORTED_SIZES: [usize; 4] = [4, 8, 16, 32];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantStatus {
  Active,
  Eliminated,
  Champion,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
  pub id: u32,
  pub name: String,
  pub seed: u32,
  pub status: ParticipantStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchState {
  Pending,
  InProgress,
  Decided,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TournamentStatus {
  Setup,
  InProgress,
  Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentState {
  pub current_round: u32,
  pub total_rounds: u32,
  pub status: TournamentStatus,
  pub champion: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
  pub entrant_id: Option<u32>,
  pub entrant_name: Option<String>,
  pub seed: Option<u32>,
  pub bye: bool,
  pub result: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
  pub id: u64,
  pub round: u32,
  pub round_label: String,
  pub slot_index: usize,
  pub state: MatchState,
  pub winner_id: Option<u32>,
  pub bye: bool,
  pub stage: Option<String>,
  pub review_reason: Option<String>,
  pub started_at_ms: Option<u64>,
  pub decided_at_ms: Option<u64>,
  pub slots: Vec<SlotView>,
}

impl MatchView {
  /// Entrant ids of both sides, once both are known.
  pub fn entrants(&self) -> Option<[u32; 2]> {
    let a = self.slots.first()?.entrant_id?;
    let b = self.slots.get(1)?.entrant_id?;
    Some([a, b])
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
  pub round: u32,
  pub label: String,
  pub matches: Vec<MatchView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSnapshot {
  pub size: usize,
  pub participants: Vec<Participant>,
  pub rounds: Vec<RoundView>,
  pub state: TournamentState,
  pub started_at_ms: u64,
  pub now_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextMatch {
  Ready(MatchView),
  /// Every match of the current round is decided but the next round has
  /// not been built. Only observable if advancement was interrupted.
  RoundExhausted,
  Complete { champion: Participant },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BracketEvent {
  MatchDecided {
    match_id: u64,
    winner_id: u32,
    loser_id: u32,
    record: MatchRecord,
  },
  RoundAdvanced {
    round: u32,
  },
  TournamentComplete {
    champion_id: u32,
    champion_name: String,
  },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotSource {
  Entrant(u32),
  Winner(u64),
  Bye,
}

#[derive(Clone, Copy, Debug)]
enum SlotResolution {
  Ready(u32),
  Pending,
  Empty,
}

#[derive(Clone, Debug)]
struct MatchSlot {
  source: SlotSource,
  entrant_id: Option<u32>,
}

#[derive(Clone, Debug)]
struct BracketMatch {
  id: u64,
  round: u32,
  slot_index: usize,
  slots: [MatchSlot; 2],
  state: MatchState,
  winner_slot: Option<usize>,
  bye: bool,
  stage: Option<String>,
  review_reason: Option<String>,
  started_at_ms: Option<u64>,
  decided_at_ms: Option<u64>,
}

/// Single-elimination bracket. The only writer of match state.
#[derive(Clone, Debug)]
pub struct Bracket {
  size: usize,
  participants: Vec<Participant>,
  participants_by_id: HashMap<u32, usize>,
  matches: Vec<BracketMatch>,
  match_index: HashMap<u64, usize>,
  rounds: Vec<Vec<u64>>,
  current_round: usize,
  status: TournamentStatus,
  champion: Option<u32>,
  started_at_ms: u64,
}

impl Bracket {
  pub fn new(names: &[String], size: usize, now_ms: u64) -> ArenaResult<Self> {
    let participants = normalize_participants(names)?;
    validate_size(size, participants.len())?;
    let participants_by_id = participants
      .iter()
      .enumerate()
      .map(|(idx, p)| (p.id, idx))
      .collect::<HashMap<_, _>>();

    let (matches, match_index, rounds) = build_single_elim_matches(&participants, size);

    let mut bracket = Bracket {
      size,
      participants,
      participants_by_id,
      matches,
      match_index,
      rounds,
      current_round: 0,
      status: TournamentStatus::Setup,
      champion: None,
      started_at_ms: now_ms,
    };
    bracket.resolve_round(0, now_ms);
    bracket.status = TournamentStatus::InProgress;
    // A half-full bracket resolves round one entirely with byes.
    bracket.advance(now_ms);

    info!(
      "Bracket created: {} participants, {} slots, {} matches",
      bracket.participants.len(),
      size,
      bracket.matches.len()
    );
    Ok(bracket)
  }

  pub fn total_matches(&self) -> usize {
    self.matches.len()
  }

  pub fn participants(&self) -> &[Participant] {
    &self.participants
  }

  pub fn participant(&self, id: u32) -> Option<&Participant> {
    self.participants_by_id.get(&id).and_then(|idx| self.participants.get(*idx))
  }

  pub fn participant_by_name(&self, name: &str) -> Option<&Participant> {
    let key = normalize_name_key(name);
    if key.is_empty() {
      return None;
    }
    self.participants.iter().find(|p| normalize_name_key(&p.name) == key)
  }

  pub fn champion(&self) -> Option<&Participant> {
    self.champion.and_then(|id| self.participant(id))
  }

  pub fn state(&self) -> TournamentState {
    TournamentState {
      current_round: self.current_round as u32 + 1,
      total_rounds: self.rounds.len() as u32,
      status: self.status,
      champion: self.champion,
    }
  }

  pub fn match_view(&self, match_id: u64) -> Option<MatchView> {
    self.get_match(match_id).map(|m| self.view(m))
  }

  pub fn in_progress_ids(&self) -> Vec<u64> {
    self
      .matches
      .iter()
      .filter(|m| m.state == MatchState::InProgress)
      .map(|m| m.id)
      .collect()
  }

  /// Next undecided match of the current round, lowest slot first.
  pub fn next_match(&self) -> NextMatch {
    if self.status == TournamentStatus::Complete {
      if let Some(champion) = self.champion().cloned() {
        return NextMatch::Complete { champion };
      }
    }
    let Some(round) = self.rounds.get(self.current_round) else {
      return NextMatch::RoundExhausted;
    };
    for id in round {
      if let Some(m) = self.get_match(*id) {
        if m.state != MatchState::Decided {
          return NextMatch::Ready(self.view(m));
        }
      }
    }
    NextMatch::RoundExhausted
  }

  pub fn start_match(&mut self, match_id: u64, stage: Option<String>, now_ms: u64) -> ArenaResult<MatchView> {
    let index = self.index_of_undecided(match_id)?;
    let m = &mut self.matches[index];
    if m.state == MatchState::InProgress {
      return Ok(self.view(&self.matches[index]));
    }
    if m.slots.iter().any(|slot| slot.entrant_id.is_none()) {
      return Err(ArenaError::MatchNotReady(match_id));
    }
    m.state = MatchState::InProgress;
    m.stage = stage;
    m.started_at_ms = Some(now_ms);
    m.review_reason = None;
    debug!("Match {match_id} started");
    Ok(self.view(&self.matches[index]))
  }

  /// Record `winner_id` as the winner of `match_id`. Finishing the last
  /// match of a round builds the next round inside the same call.
  pub fn report_result(&mut self, match_id: u64, winner_id: u32, now_ms: u64) -> ArenaResult<Vec<BracketEvent>> {
    let (index, winner_slot, loser_id) = self.locate_report(match_id, winner_id)?;

    let record = {
      let m = &mut self.matches[index];
      m.state = MatchState::Decided;
      m.winner_slot = Some(winner_slot);
      m.started_at_ms = Some(m.started_at_ms.unwrap_or(now_ms));
      m.decided_at_ms = Some(now_ms);
      m.review_reason = None;
      let (round, stage) = (m.round, m.stage.clone());
      let slot_names = [
        self.entrant_name(self.matches[index].slots[0].entrant_id),
        self.entrant_name(self.matches[index].slots[1].entrant_id),
      ];
      MatchRecord {
        participants: slot_names,
        winner: self.entrant_name(Some(winner_id)),
        round,
        timestamp_ms: now_ms,
        stage,
        duration_ms: None,
        score: None,
      }
    };
    self.set_status(loser_id, ParticipantStatus::Eliminated);
    info!("Match {match_id}: {} def. {}", record.winner, record.loser());

    let mut events = vec![BracketEvent::MatchDecided {
      match_id,
      winner_id,
      loser_id,
      record,
    }];
    events.extend(self.advance(now_ms));
    Ok(events)
  }

  /// Checks that `report_result(match_id, winner_id)` would be accepted,
  /// without changing anything.
  pub fn validate_report(&self, match_id: u64, winner_id: u32) -> ArenaResult<()> {
    self.locate_report(match_id, winner_id).map(|_| ())
  }

  fn locate_report(&self, match_id: u64, winner_id: u32) -> ArenaResult<(usize, usize, u32)> {
    let index = self.index_of_undecided(match_id)?;
    let m = &self.matches[index];
    let winner_slot = m
      .slots
      .iter()
      .position(|slot| slot.entrant_id == Some(winner_id))
      .ok_or(ArenaError::InvalidWinner {
        match_id,
        participant: winner_id,
      })?;
    let loser_id = m.slots[1 - winner_slot]
      .entrant_id
      .ok_or(ArenaError::MatchNotReady(match_id))?;
    Ok((index, winner_slot, loser_id))
  }

  /// Put an in-progress match back to pending so it can be fought again.
  pub fn reset_match(&mut self, match_id: u64) -> ArenaResult<MatchView> {
    let index = self.index_of_undecided(match_id)?;
    let m = &mut self.matches[index];
    m.state = MatchState::Pending;
    m.started_at_ms = None;
    m.stage = None;
    m.review_reason = None;
    Ok(self.view(&self.matches[index]))
  }

  pub fn flag_for_review(&mut self, match_id: u64, reason: &str) -> ArenaResult<()> {
    let index = self.index_of_undecided(match_id)?;
    self.matches[index].review_reason = Some(reason.to_string());
    Ok(())
  }

  /// Entrant id of `name` inside `match_id`, when that match has them.
  pub fn entrant_in_match(&self, match_id: u64, name: &str) -> Option<u32> {
    let key = normalize_name_key(name);
    let m = self.get_match(match_id)?;
    m.slots.iter().filter_map(|slot| slot.entrant_id).find(|id| {
      self
        .participant(*id)
        .map(|p| normalize_name_key(&p.name) == key)
        .unwrap_or(false)
    })
  }

  /// Find the running match fought between `winner` and `loser`, in
  /// either slot order. Returns the match id and the winner's id.
  pub fn match_for_result(&self, winner: &str, loser: &str) -> Option<(u64, u32)> {
    for m in &self.matches {
      if m.state != MatchState::InProgress {
        continue;
      }
      let Some(winner_id) = self.entrant_in_match(m.id, winner) else {
        continue;
      };
      let Some(loser_id) = self.entrant_in_match(m.id, loser) else {
        continue;
      };
      if winner_id != loser_id {
        return Some((m.id, winner_id));
      }
    }
    None
  }

  pub fn snapshot(&self, now_ms: u64) -> BracketSnapshot {
    let rounds = self
      .rounds
      .iter()
      .enumerate()
      .map(|(idx, ids)| {
        let round = idx as u32 + 1;
        RoundView {
          round,
          label: round_label(round, self.rounds.len() as u32),
          matches: ids
            .iter()
            .filter_map(|id| self.get_match(*id))
            .map(|m| self.view(m))
            .collect(),
        }
      })
      .collect();
    BracketSnapshot {
      size: self.size,
      participants: self.participants.clone(),
      rounds,
      state: self.state(),
      started_at_ms: self.started_at_ms,
      now_ms,
    }
  }

  pub fn render_text(&self) -> String {
    let mut lines = vec![
      format!("Single Elimination ({} slots)", self.size),
      "-".repeat(40),
    ];
    for (idx, ids) in self.rounds.iter().enumerate() {
      let round = idx as u32 + 1;
      lines.push(String::new());
      let label = round_label(round, self.rounds.len() as u32);
      if label.starts_with("Round") {
        lines.push(format!("{label}:"));
      } else {
        lines.push(format!("Round {round} ({label}):"));
      }
      lines.push("-".repeat(20));
      for (match_num, id) in ids.iter().enumerate() {
        let Some(m) = self.get_match(*id) else {
          continue;
        };
        let names = [self.slot_text(&m.slots[0]), self.slot_text(&m.slots[1])];
        lines.push(format!("Match {}: {} vs {}", match_num + 1, names[0], names[1]));
        if let Some(winner) = m.winner_slot.and_then(|slot| m.slots[slot].entrant_id) {
          lines.push(format!("Winner: {}", self.entrant_name(Some(winner))));
        }
      }
    }
    if let Some(champion) = self.champion() {
      lines.push(String::new());
      lines.push(format!("Champion: {}", champion.name));
    }
    lines.join("\n")
  }

  fn advance(&mut self, now_ms: u64) -> Vec<BracketEvent> {
    let mut events = Vec::new();
    while self.status == TournamentStatus::InProgress && self.round_complete(self.current_round) {
      if self.current_round + 1 >= self.rounds.len() {
        let champion_id = self.rounds[self.current_round]
          .first()
          .and_then(|id| self.get_match(*id))
          .and_then(match_winner_id);
        self.status = TournamentStatus::Complete;
        self.champion = champion_id;
        if let Some(champion_id) = champion_id {
          self.set_status(champion_id, ParticipantStatus::Champion);
          let champion_name = self.entrant_name(Some(champion_id));
          info!("Tournament complete, champion: {champion_name}");
          events.push(BracketEvent::TournamentComplete {
            champion_id,
            champion_name,
          });
        }
        break;
      }
      self.current_round += 1;
      self.resolve_round(self.current_round, now_ms);
      let round = self.current_round as u32 + 1;
      debug!("Advanced to round {round}");
      events.push(BracketEvent::RoundAdvanced { round });
    }
    events
  }

  fn round_complete(&self, round_idx: usize) -> bool {
    self
      .rounds
      .get(round_idx)
      .map(|ids| {
        ids
          .iter()
          .filter_map(|id| self.get_match(*id))
          .all(|m| m.state == MatchState::Decided)
      })
      .unwrap_or(false)
  }

  fn resolve_round(&mut self, round_idx: usize, now_ms: u64) {
    let ids = self.rounds.get(round_idx).cloned().unwrap_or_default();
    for id in ids {
      let Some(index) = self.match_index.get(&id).copied() else {
        continue;
      };
      let (res_a, res_b) = {
        let m = &self.matches[index];
        (self.resolve_slot(m.slots[0].source), self.resolve_slot(m.slots[1].source))
      };
      let m = &mut self.matches[index];
      apply_slot_resolution(&mut m.slots[0], res_a);
      apply_slot_resolution(&mut m.slots[1], res_b);
      match (res_a, res_b) {
        (SlotResolution::Ready(_), SlotResolution::Empty) => finalize_bye_match(m, 0, now_ms),
        (SlotResolution::Empty, SlotResolution::Ready(_)) => finalize_bye_match(m, 1, now_ms),
        _ => {}
      }
    }
  }

  fn resolve_slot(&self, source: SlotSource) -> SlotResolution {
    match source {
      SlotSource::Bye => SlotResolution::Empty,
      SlotSource::Entrant(id) => SlotResolution::Ready(id),
      SlotSource::Winner(match_id) => {
        let Some(m) = self.get_match(match_id) else {
          return SlotResolution::Empty;
        };
        if m.state != MatchState::Decided {
          return SlotResolution::Pending;
        }
        match match_winner_id(m) {
          Some(winner) => SlotResolution::Ready(winner),
          None => SlotResolution::Empty,
        }
      }
    }
  }

  fn index_of_undecided(&self, match_id: u64) -> ArenaResult<usize> {
    let index = self
      .match_index
      .get(&match_id)
      .copied()
      .ok_or(ArenaError::UnknownMatch(match_id))?;
    if self.matches[index].state == MatchState::Decided {
      return Err(ArenaError::UnknownMatch(match_id));
    }
    Ok(index)
  }

  fn get_match(&self, match_id: u64) -> Option<&BracketMatch> {
    self.match_index.get(&match_id).and_then(|idx| self.matches.get(*idx))
  }

  fn set_status(&mut self, id: u32, status: ParticipantStatus) {
    if let Some(idx) = self.participants_by_id.get(&id).copied() {
      self.participants[idx].status = status;
    }
  }

  fn entrant_name(&self, id: Option<u32>) -> String {
    id.and_then(|id| self.participant(id))
      .map(|p| p.name.clone())
      .unwrap_or_default()
  }

  fn slot_text(&self, slot: &MatchSlot) -> String {
    match (slot.source, slot.entrant_id) {
      (_, Some(id)) => self.entrant_name(Some(id)),
      (SlotSource::Bye, None) => "BYE".to_string(),
      _ => "?".to_string(),
    }
  }

  fn view(&self, m: &BracketMatch) -> MatchView {
    let winner_id = match_winner_id(m);
    let slots = m
      .slots
      .iter()
      .map(|slot| {
        let entrant = slot.entrant_id.and_then(|id| self.participant(id));
        let result = match (winner_id, slot.entrant_id) {
          (Some(winner), Some(id)) if winner == id => Some("win".to_string()),
          (Some(_), Some(_)) => Some("loss".to_string()),
          _ => None,
        };
        SlotView {
          entrant_id: slot.entrant_id,
          entrant_name: entrant.map(|p| p.name.clone()),
          seed: entrant.map(|p| p.seed),
          bye: slot.source == SlotSource::Bye,
          result,
        }
      })
      .collect();
    MatchView {
      id: m.id,
      round: m.round,
      round_label: round_label(m.round, self.rounds.len() as u32),
      slot_index: m.slot_index,
      state: m.state,
      winner_id,
      bye: m.bye,
      stage: m.stage.clone(),
      review_reason: m.review_reason.clone(),
      started_at_ms: m.started_at_ms,
      decided_at_ms: m.decided_at_ms,
      slots,
    }
  }
}

/// Smallest supported bracket that fits `count` participants.
pub fn bracket_size_for(count: usize) -> Option<usize> {
  if count < 2 {
    return None;
  }
  SUPPORTED_SIZES.iter().copied().find(|size| count <= *size)
}

pub fn round_label(round: u32, total_rounds: u32) -> String {
  match total_rounds.saturating_sub(round) {
    0 => "Final".to_string(),
    1 => "Semifinals".to_string(),
    2 => "Quarterfinals".to_string(),
    _ => format!("Round {round}"),
  }
}

fn validate_size(size: usize, count: usize) -> ArenaResult<()> {
  let fits = SUPPORTED_SIZES.contains(&size) && count >= 2 && count <= size && count * 2 >= size;
  if fits {
    Ok(())
  } else {
    Err(ArenaError::InvalidSize {
      size,
      participants: count,
    })
  }
}

fn normalize_participants(names: &[String]) -> ArenaResult<Vec<Participant>> {
  let mut seen = HashSet::new();
  let mut out = Vec::with_capacity(names.len());
  for raw in names {
    let name = raw.trim();
    if name.is_empty() {
      continue;
    }
    if !seen.insert(normalize_name_key(name)) {
      return Err(ArenaError::DuplicateParticipant(name.to_string()));
    }
    let id = out.len() as u32 + 1;
    out.push(Participant {
      id,
      name: name.to_string(),
      seed: id,
      status: ParticipantStatus::Active,
    });
  }
  Ok(out)
}

fn build_single_elim_matches(
  participants: &[Participant],
  size: usize,
) -> (Vec<BracketMatch>, HashMap<u64, usize>, Vec<Vec<u64>>) {
  let pairs = size / 2;
  let byes = size.saturating_sub(participants.len());
  let spread = seed_positions(pairs as u32);

  let mut matches = Vec::with_capacity(size - 1);
  let mut index = HashMap::new();
  let mut next_id = 1u64;
  let mut rounds: Vec<Vec<u64>> = Vec::new();

  let mut seeded = participants.iter();
  let mut first_round = Vec::with_capacity(pairs);
  for slot_index in 0..pairs {
    let slot_a = seeded
      .next()
      .map(|p| SlotSource::Entrant(p.id))
      .unwrap_or(SlotSource::Bye);
    let slot_b = if spread[slot_index] as usize <= byes {
      SlotSource::Bye
    } else {
      seeded
        .next()
        .map(|p| SlotSource::Entrant(p.id))
        .unwrap_or(SlotSource::Bye)
    };
    let id = push_match(&mut matches, &mut index, &mut next_id, 1, slot_index, slot_a, slot_b);
    first_round.push(id);
  }
  rounds.push(first_round);

  let mut round = 2u32;
  while rounds.last().map(|ids| ids.len()).unwrap_or(0) > 1 {
    let prev = rounds[rounds.len() - 1].clone();
    let mut ids = Vec::with_capacity(prev.len() / 2);
    for (slot_index, pair) in prev.chunks(2).enumerate() {
      let id = push_match(
        &mut matches,
        &mut index,
        &mut next_id,
        round,
        slot_index,
        SlotSource::Winner(pair[0]),
        SlotSource::Winner(pair[1]),
      );
      ids.push(id);
    }
    rounds.push(ids);
    round += 1;
  }

  (matches, index, rounds)
}

fn push_match(
  matches: &mut Vec<BracketMatch>,
  index: &mut HashMap<u64, usize>,
  next_id: &mut u64,
  round: u32,
  slot_index: usize,
  slot_a: SlotSource,
  slot_b: SlotSource,
) -> u64 {
  let id = *next_id;
  *next_id += 1;
  matches.push(BracketMatch {
    id,
    round,
    slot_index,
    slots: [
      MatchSlot {
        source: slot_a,
        entrant_id: None,
      },
      MatchSlot {
        source: slot_b,
        entrant_id: None,
      },
    ],
    state: MatchState::Pending,
    winner_slot: None,
    bye: false,
    stage: None,
    review_reason: None,
    started_at_ms: None,
    decided_at_ms: None,
  });
  index.insert(id, matches.len() - 1);
  id
}

fn apply_slot_resolution(slot: &mut MatchSlot, resolution: SlotResolution) {
  match resolution {
    SlotResolution::Ready(id) => slot.entrant_id = Some(id),
    SlotResolution::Empty => slot.entrant_id = None,
    SlotResolution::Pending => {}
  }
}

fn finalize_bye_match(m: &mut BracketMatch, winner_slot: usize, now_ms: u64) {
  m.state = MatchState::Decided;
  m.bye = true;
  m.winner_slot = Some(winner_slot);
  m.started_at_ms = Some(now_ms);
  m.decided_at_ms = Some(now_ms);
}

fn match_winner_id(m: &BracketMatch) -> Option<u32> {
  let winner_slot = m.winner_slot?;
  m.slots.get(winner_slot)?.entrant_id
}

/// Standard bracket order of `size` seeds: 1 v size, then the halves
/// mirrored so the top two seeds can only meet in the final.
fn seed_positions(size: u32) -> Vec<u32> {
  let mut seeds = vec![1u32];
  while seeds.len() < size as usize {
    let n = seeds.len() as u32;
    let mut next = Vec::with_capacity(seeds.len() * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  fn roster(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Fighter{i}")).collect()
  }

  fn id_of(bracket: &Bracket, name: &str) -> u32 {
    bracket.participant_by_name(name).unwrap().id
  }

  fn play_out(bracket: &mut Bracket) -> usize {
    let mut played = 0;
    loop {
      match bracket.next_match() {
        NextMatch::Ready(view) => {
          let [a, _] = view.entrants().expect("ready match has both entrants");
          bracket.report_result(view.id, a, 1_000).unwrap();
          played += 1;
        }
        NextMatch::Complete { .. } => return played,
        NextMatch::RoundExhausted => panic!("round exhausted without advancing"),
      }
    }
  }

  #[test]
  fn every_supported_size_has_size_minus_one_matches() {
    for size in SUPPORTED_SIZES {
      for count in [size / 2, size / 2 + 1, size - 1, size] {
        let bracket = Bracket::new(&roster(count), size, 0).unwrap();
        assert_eq!(bracket.total_matches(), size - 1, "size {size} count {count}");
      }
    }
  }

  #[test]
  fn four_player_scenario() {
    let mut bracket = Bracket::new(&names(&["A", "B", "C", "D"]), 4, 0).unwrap();
    let (a, b, c, d) = (
      id_of(&bracket, "A"),
      id_of(&bracket, "B"),
      id_of(&bracket, "C"),
      id_of(&bracket, "D"),
    );

    let NextMatch::Ready(first) = bracket.next_match() else {
      panic!("expected a match");
    };
    assert_eq!(first.entrants(), Some([a, b]));
    let events = bracket.report_result(first.id, a, 10).unwrap();
    assert_eq!(events.len(), 1);

    let NextMatch::Ready(second) = bracket.next_match() else {
      panic!("expected a match");
    };
    assert_eq!(second.entrants(), Some([c, d]));
    let events = bracket.report_result(second.id, c, 20).unwrap();
    assert!(events.contains(&BracketEvent::RoundAdvanced { round: 2 }));

    let NextMatch::Ready(final_match) = bracket.next_match() else {
      panic!("expected the final");
    };
    assert_eq!(final_match.entrants(), Some([a, c]));
    assert_eq!(final_match.round_label, "Final");
    let events = bracket.report_result(final_match.id, a, 30).unwrap();
    assert!(events.iter().any(|e| matches!(
      e,
      BracketEvent::TournamentComplete { champion_id, .. } if *champion_id == a
    )));

    assert_eq!(bracket.state().status, TournamentStatus::Complete);
    assert_eq!(bracket.champion().map(|p| p.name.as_str()), Some("A"));
    assert_eq!(bracket.participant(a).unwrap().status, ParticipantStatus::Champion);
    assert_eq!(bracket.participant(d).unwrap().status, ParticipantStatus::Eliminated);
    assert_eq!(bracket.total_matches(), 3);
    assert!(matches!(bracket.next_match(), NextMatch::Complete { champion } if champion.id == a));
  }

  #[test]
  fn reporting_a_decided_match_is_rejected_without_mutation() {
    let mut bracket = Bracket::new(&names(&["A", "B", "C", "D"]), 4, 0).unwrap();
    let a = id_of(&bracket, "A");
    let b = id_of(&bracket, "B");
    bracket.report_result(1, a, 5).unwrap();
    let before = bracket.snapshot(5);

    assert_eq!(bracket.report_result(1, b, 6), Err(ArenaError::UnknownMatch(1)));
    assert_eq!(bracket.report_result(1, a, 6), Err(ArenaError::UnknownMatch(1)));
    assert_eq!(bracket.report_result(99, a, 6), Err(ArenaError::UnknownMatch(99)));
    assert_eq!(bracket.snapshot(5), before);
  }

  #[test]
  fn winner_must_be_in_the_match() {
    let mut bracket = Bracket::new(&names(&["A", "B", "C", "D"]), 4, 0).unwrap();
    let c = id_of(&bracket, "C");
    assert_eq!(
      bracket.report_result(1, c, 5),
      Err(ArenaError::InvalidWinner {
        match_id: 1,
        participant: c
      })
    );
    // The final has no entrants yet.
    assert!(matches!(
      bracket.report_result(3, c, 5),
      Err(ArenaError::InvalidWinner { .. })
    ));
    assert_eq!(bracket.start_match(3, None, 5), Err(ArenaError::MatchNotReady(3)));
  }

  #[test]
  fn validate_report_matches_report_result_without_changes() {
    let bracket = Bracket::new(&names(&["A", "B", "C", "D"]), 4, 0).unwrap();
    let (a, c) = (id_of(&bracket, "A"), id_of(&bracket, "C"));
    let before = bracket.snapshot(5);

    assert_eq!(bracket.validate_report(1, a), Ok(()));
    assert_eq!(
      bracket.validate_report(1, c),
      Err(ArenaError::InvalidWinner {
        match_id: 1,
        participant: c
      })
    );
    assert_eq!(bracket.validate_report(42, a), Err(ArenaError::UnknownMatch(42)));
    assert_eq!(bracket.snapshot(5), before);
  }

  #[test]
  fn unsupported_sizes_are_rejected() {
    assert!(matches!(Bracket::new(&roster(6), 6, 0), Err(ArenaError::InvalidSize { .. })));
    assert!(matches!(Bracket::new(&roster(9), 8, 0), Err(ArenaError::InvalidSize { .. })));
    assert!(matches!(Bracket::new(&roster(3), 8, 0), Err(ArenaError::InvalidSize { .. })));
    assert!(matches!(Bracket::new(&roster(1), 4, 0), Err(ArenaError::InvalidSize { .. })));
    assert!(matches!(Bracket::new(&roster(40), 64, 0), Err(ArenaError::InvalidSize { .. })));
  }

  #[test]
  fn duplicate_names_are_rejected() {
    let err = Bracket::new(&names(&["Kung Fu Man", "Ryu", "kung fu man", "Ken"]), 4, 0).unwrap_err();
    assert_eq!(err, ArenaError::DuplicateParticipant("kung fu man".to_string()));
  }

  #[test]
  fn byes_resolve_without_reports_and_never_pair_together() {
    let bracket = Bracket::new(&roster(5), 8, 0).unwrap();
    let snapshot = bracket.snapshot(0);
    let first_round = &snapshot.rounds[0].matches;
    let bye_matches = first_round.iter().filter(|m| m.bye).collect::<Vec<_>>();
    assert_eq!(bye_matches.len(), 3);
    for m in first_round {
      assert!(!(m.slots[0].bye && m.slots[1].bye));
    }
    for m in &bye_matches {
      assert_eq!(m.state, MatchState::Decided);
      assert!(m.winner_id.is_some());
    }
    // Byes are split across both halves of the bracket.
    assert!(first_round[..2].iter().any(|m| m.bye));
    assert!(first_round[2..].iter().any(|m| m.bye));
    // Top seed gets a bye.
    assert_eq!(first_round[0].slots[0].seed, Some(1));
    assert!(first_round[0].bye);
  }

  #[test]
  fn half_full_bracket_skips_straight_to_round_two() {
    let mut bracket = Bracket::new(&names(&["A", "B"]), 4, 0).unwrap();
    assert_eq!(bracket.state().current_round, 2);
    let NextMatch::Ready(final_match) = bracket.next_match() else {
      panic!("expected the final");
    };
    assert_eq!(final_match.round, 2);
    let b = id_of(&bracket, "B");
    bracket.report_result(final_match.id, b, 1).unwrap();
    assert_eq!(bracket.champion().map(|p| p.id), Some(b));
  }

  #[test]
  fn later_rounds_only_pair_winners_of_the_previous_round() {
    let mut bracket = Bracket::new(&roster(11), 16, 0).unwrap();
    let mut winners_by_round: HashMap<u32, HashSet<u32>> = HashMap::new();
    for view in bracket.snapshot(0).rounds[0].matches.iter().filter(|m| m.bye) {
      winners_by_round.entry(1).or_default().insert(view.winner_id.unwrap());
    }

    loop {
      let snapshot = bracket.snapshot(0);
      let mut busy = HashSet::new();
      for round in &snapshot.rounds {
        for m in &round.matches {
          if m.state == MatchState::Decided {
            continue;
          }
          for slot in &m.slots {
            if let Some(id) = slot.entrant_id {
              assert!(busy.insert(id), "entrant {id} is in two undecided matches");
            }
          }
        }
      }

      let NextMatch::Ready(view) = bracket.next_match() else {
        break;
      };
      if view.round > 1 {
        let previous = &winners_by_round[&(view.round - 1)];
        for id in view.entrants().unwrap() {
          assert!(previous.contains(&id));
        }
      }
      let [_, b] = view.entrants().unwrap();
      bracket.report_result(view.id, b, 0).unwrap();
      winners_by_round.entry(view.round).or_default().insert(b);
    }
    assert_eq!(bracket.state().status, TournamentStatus::Complete);
  }

  #[test]
  fn full_brackets_play_to_completion() {
    for size in SUPPORTED_SIZES {
      let mut bracket = Bracket::new(&roster(size), size, 0).unwrap();
      assert_eq!(play_out(&mut bracket), size - 1);
      assert!(bracket.champion().is_some());
    }
  }

  #[test]
  fn reset_match_returns_it_to_pending() {
    let mut bracket = Bracket::new(&names(&["A", "B", "C", "D"]), 4, 0).unwrap();
    bracket.start_match(1, Some("Training Room".to_string()), 10).unwrap();
    bracket.flag_for_review(1, "watcher timed out").unwrap();
    assert_eq!(bracket.in_progress_ids(), vec![1]);
    assert_eq!(
      bracket.match_view(1).unwrap().review_reason.as_deref(),
      Some("watcher timed out")
    );

    let view = bracket.reset_match(1).unwrap();
    assert_eq!(view.state, MatchState::Pending);
    assert_eq!(view.stage, None);
    assert_eq!(view.review_reason, None);
    assert!(bracket.in_progress_ids().is_empty());
  }

  #[test]
  fn results_are_matched_by_name_in_either_order() {
    let mut bracket = Bracket::new(&names(&["A", "B", "C", "D"]), 4, 0).unwrap();
    assert_eq!(bracket.match_for_result("B", "A"), None);
    bracket.start_match(1, None, 0).unwrap();
    let b = id_of(&bracket, "B");
    assert_eq!(bracket.match_for_result(" b ", "a"), Some((1, b)));
    assert_eq!(bracket.match_for_result("C", "A"), None);
  }

  #[test]
  fn render_text_lists_byes_and_winners() {
    let bracket = Bracket::new(&names(&["A", "B", "C"]), 4, 0).unwrap();
    let text = bracket.render_text();
    assert!(text.contains("Match 1: A vs BYE"));
    assert!(text.contains("Winner: A"));
    assert!(text.contains("Round 1 (Semifinals):"));
    // The final stays unknown until every semifinal is decided.
    assert!(text.contains("Match 1: ? vs ?"));
  }

  #[test]
  fn bracket_size_for_picks_smallest_fit() {
    assert_eq!(bracket_size_for(1), None);
    assert_eq!(bracket_size_for(2), Some(4));
    assert_eq!(bracket_size_for(5), Some(8));
    assert_eq!(bracket_size_for(32), Some(32));
    assert_eq!(bracket_size_for(33), None);
  }

  #[test]
  fn seed_positions_mirror_halves() {
    assert_eq!(seed_positions(4), vec![1, 4, 2, 3]);
    assert_eq!(seed_positions(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
  }
}
