use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::normalize_name_key;
use crate::error::{ArenaError, ArenaResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WagerStatus {
  Escrowed,
  Won,
  Lost,
  Refunded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wager {
  pub bettor: String,
  pub match_id: u64,
  pub participant_id: u32,
  pub amount: u64,
  pub status: WagerStatus,
  pub payout: Option<u64>,
  pub placed_at_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
  pub bettor: String,
  pub amount: u64,
  pub payout: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
  pub match_id: u64,
  pub winner_id: u32,
  pub total_wagered: u64,
  pub total_paid: u64,
  pub winners: Vec<Payout>,
  pub losing_wagers: usize,
  /// True when this call changed nothing because the pool was already
  /// settled or voided.
  pub already_settled: bool,
}

/// Public view of one match's betting pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingView {
  pub match_id: u64,
  pub open: bool,
  pub closes_at_ms: u64,
  pub entrants: [u32; 2],
  pub total_on: [u64; 2],
  pub wager_count: usize,
  pub wagers: Vec<Wager>,
}

#[derive(Clone, Debug)]
struct Pool {
  entrants: [u32; 2],
  /// False for a pool created by `close_betting` on a match that was never
  /// offered; it only blocks a later `open_betting`.
  opened: bool,
  closes_at_ms: u64,
  closed: bool,
  settled_winner: Option<u32>,
  voided: bool,
  wagers: Vec<Wager>,
}

impl Pool {
  fn accepting(&self, now_ms: u64) -> bool {
    !self.closed && !self.voided && self.settled_winner.is_none() && now_ms < self.closes_at_ms
  }
}

#[derive(Clone, Debug)]
pub struct Ledger {
  starting_points: u64,
  payout_percent: u64,
  balances: HashMap<String, u64>,
  pools: HashMap<u64, Pool>,
}

impl Ledger {
  pub fn new(starting_points: u64, payout_percent: u64) -> Self {
    Self {
      starting_points,
      payout_percent,
      balances: HashMap::new(),
      pools: HashMap::new(),
    }
  }

  /// Current balance, opening an account at the starting balance for a
  /// first-time bettor.
  pub fn balance(&mut self, bettor: &str) -> u64 {
    *self
      .balances
      .entry(normalize_name_key(bettor))
      .or_insert(self.starting_points)
  }

  /// Opens a window for `match_id`. Returns false if the match already has
  /// a pool, open or not.
  pub fn open_betting(&mut self, match_id: u64, entrants: [u32; 2], now_ms: u64, window_ms: u64) -> bool {
    if self.pools.contains_key(&match_id) {
      return false;
    }
    self.pools.insert(
      match_id,
      Pool {
        entrants,
        opened: true,
        closes_at_ms: now_ms.saturating_add(window_ms),
        closed: false,
        settled_winner: None,
        voided: false,
        wagers: Vec::new(),
      },
    );
    info!("Betting open for match {match_id} ({}s)", window_ms / 1000);
    true
  }

  /// Closes betting on `match_id` for good, even if it was never opened.
  pub fn close_betting(&mut self, match_id: u64) {
    let pool = self.pools.entry(match_id).or_insert_with(|| Pool {
      entrants: [0, 0],
      opened: false,
      closes_at_ms: 0,
      closed: true,
      settled_winner: None,
      voided: false,
      wagers: Vec::new(),
    });
    if !pool.closed {
      pool.closed = true;
      debug!("Betting closed for match {match_id}");
    }
  }

  pub fn place_bet(
    &mut self,
    bettor: &str,
    match_id: u64,
    participant_id: u32,
    amount: u64,
    now_ms: u64,
  ) -> ArenaResult<Wager> {
    if amount == 0 {
      return Err(ArenaError::InvalidAmount);
    }
    let bettor = bettor.trim();
    let key = normalize_name_key(bettor);
    let pool = self
      .pools
      .get(&match_id)
      .filter(|pool| pool.accepting(now_ms))
      .ok_or(ArenaError::BettingClosed(match_id))?;
    if !pool.entrants.contains(&participant_id) {
      return Err(ArenaError::InvalidSelection {
        match_id,
        participant: participant_id.to_string(),
      });
    }

    let balance = self.balances.entry(key).or_insert(self.starting_points);
    if *balance < amount {
      return Err(ArenaError::InsufficientPoints {
        bettor: bettor.to_string(),
        balance: *balance,
        needed: amount,
      });
    }
    *balance -= amount;

    let wager = Wager {
      bettor: bettor.to_string(),
      match_id,
      participant_id,
      amount,
      status: WagerStatus::Escrowed,
      payout: None,
      placed_at_ms: now_ms,
    };
    if let Some(pool) = self.pools.get_mut(&match_id) {
      pool.wagers.push(wager.clone());
    }
    info!("{} bet {amount} on participant {participant_id} in match {match_id}", wager.bettor);
    Ok(wager)
  }

  /// Pays out the pool of `match_id`. Calling it again, or after `void`,
  /// changes nothing.
  pub fn settle(&mut self, match_id: u64, winner_id: u32) -> Settlement {
    let payout_percent = self.payout_percent;
    let mut settlement = Settlement {
      match_id,
      winner_id,
      total_wagered: 0,
      total_paid: 0,
      winners: Vec::new(),
      losing_wagers: 0,
      already_settled: false,
    };
    let Some(pool) = self.pools.get_mut(&match_id) else {
      return settlement;
    };
    if pool.voided || pool.settled_winner.is_some() {
      settlement.already_settled = true;
      return settlement;
    }
    pool.closed = true;
    pool.settled_winner = Some(winner_id);

    for wager in pool.wagers.iter_mut().filter(|w| w.status == WagerStatus::Escrowed) {
      settlement.total_wagered += wager.amount;
      if wager.participant_id == winner_id {
        let payout = wager.amount * payout_percent / 100;
        wager.status = WagerStatus::Won;
        wager.payout = Some(payout);
        *self
          .balances
          .entry(normalize_name_key(&wager.bettor))
          .or_insert(0) += payout;
        settlement.total_paid += payout;
        settlement.winners.push(Payout {
          bettor: wager.bettor.clone(),
          amount: wager.amount,
          payout,
        });
      } else {
        wager.status = WagerStatus::Lost;
        wager.payout = Some(0);
        settlement.losing_wagers += 1;
      }
    }
    info!(
      "Settled match {match_id}: {} wagered, {} paid to {} winner(s)",
      settlement.total_wagered,
      settlement.total_paid,
      settlement.winners.len()
    );
    settlement
  }

  /// Refunds every unsettled wager on `match_id`. Returns the refunded total.
  pub fn void(&mut self, match_id: u64) -> u64 {
    let Some(pool) = self.pools.get_mut(&match_id) else {
      return 0;
    };
    if pool.voided || pool.settled_winner.is_some() {
      return 0;
    }
    pool.voided = true;
    pool.closed = true;
    let mut refunded = 0;
    for wager in pool.wagers.iter_mut().filter(|w| w.status == WagerStatus::Escrowed) {
      wager.status = WagerStatus::Refunded;
      wager.payout = Some(wager.amount);
      *self
        .balances
        .entry(normalize_name_key(&wager.bettor))
        .or_insert(0) += wager.amount;
      refunded += wager.amount;
    }
    if refunded > 0 {
      info!("Voided match {match_id}, refunded {refunded}");
    }
    refunded
  }

  /// Voids every pool that has not been settled yet.
  pub fn void_all_open(&mut self) -> u64 {
    let open = self
      .pools
      .iter()
      .filter(|(_, pool)| !pool.voided && pool.settled_winner.is_none())
      .map(|(id, _)| *id)
      .collect::<Vec<_>>();
    open.into_iter().map(|id| self.void(id)).sum()
  }

  /// Forget all pools; balances carry over between tournaments.
  pub fn clear_pools(&mut self) {
    self.void_all_open();
    self.pools.clear();
  }

  pub fn escrowed_total(&self) -> u64 {
    self
      .pools
      .values()
      .flat_map(|pool| pool.wagers.iter())
      .filter(|w| w.status == WagerStatus::Escrowed)
      .map(|w| w.amount)
      .sum()
  }

  pub fn total_balances(&self) -> u64 {
    self.balances.values().sum()
  }

  pub fn betting_view(&self, match_id: u64, now_ms: u64) -> Option<BettingView> {
    let pool = self.pools.get(&match_id).filter(|pool| pool.opened)?;
    let mut total_on = [0u64; 2];
    for wager in &pool.wagers {
      if let Some(side) = pool.entrants.iter().position(|id| *id == wager.participant_id) {
        total_on[side] += wager.amount;
      }
    }
    Some(BettingView {
      match_id,
      open: pool.accepting(now_ms),
      closes_at_ms: pool.closes_at_ms,
      entrants: pool.entrants,
      total_on,
      wager_count: pool.wagers.len(),
      wagers: pool.wagers.clone(),
    })
  }
}
