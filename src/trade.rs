//! Trade negotiator: player offer slots and the server-minted deals they
//! turn into.
//!
//! An offer goes through a three-phase handshake spread over several ticks:
//! the owner confirms, the server mints a deal and flags the slot processed,
//! the owner observes that on a later tick and drops its confirm, and finally
//! the server sees the dropped confirm and clears processed so the slot can be
//! reused. A full cycle therefore spans at least three ticks.
//!
//! Deals nobody answers expire, either after a timeout or as soon as the
//! target loses its controller, so the offering side always sees an outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authority::Actor;
use crate::error::{GameError, GameResult};
use crate::ledger::{NationLedger, TradeEffect};
use crate::session::PlayerId;
use crate::territory::{NationId, UNOWNED};

pub type DealId = u64;

/// Economic content shared by an offer and the deal minted from it. Amounts
/// are from the receiver's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeTerms {
    #[serde(default)]
    pub one_time_money: f64,
    #[serde(default)]
    pub per_round_money: f64,
    #[serde(default)]
    pub per_round_food: f64,
    #[serde(default)]
    pub per_round_energy: f64,
    #[serde(default)]
    pub rounds: u32,
}

impl TradeTerms {
    fn effect(&self) -> TradeEffect {
        TradeEffect {
            gold: self.per_round_money,
            food: self.per_round_food,
            energy: self.per_round_energy,
            rounds_remaining: self.rounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "deal", rename_all = "snake_case")]
pub enum OfferOutcome {
    Delivered(DealId),
    TargetUnavailable,
}

/// A player's reusable proposal slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOffer {
    pub offering: NationId,
    pub target: NationId,
    pub terms: TradeTerms,
    pub confirm: bool,
    pub processed: bool,
    /// Tick on which the server raised `processed`.
    pub processed_at: Option<u64>,
    pub last_outcome: Option<OfferOutcome>,
}

impl TradeOffer {
    fn idle() -> Self {
        Self {
            offering: UNOWNED,
            target: UNOWNED,
            terms: TradeTerms::default(),
            confirm: false,
            processed: false,
            processed_at: None,
            last_outcome: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    Pending,
    Accepted,
    Declined,
    /// Never answered: timed out or the target lost its controller.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeDeal {
    pub id: DealId,
    pub offering: NationId,
    pub target: NationId,
    pub terms: TradeTerms,
    pub state: DealState,
    pub shown: bool,
    pub processed_local: bool,
    pub minted_at_tick: u64,
    accept_writer: Actor,
    processed_at_tick: Option<u64>,
}

impl TradeDeal {
    pub fn accept_writer(&self) -> Actor {
        self.accept_writer
    }
}

/// Server-side outcome of scanning one confirmed offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Minted {
        player: PlayerId,
        deal: DealId,
        offering: NationId,
        target: NationId,
    },
    Undeliverable {
        player: PlayerId,
        offering: NationId,
        target: NationId,
    },
}

#[derive(Debug, Default)]
pub struct TradeNegotiator {
    offers: BTreeMap<PlayerId, TradeOffer>,
    deals: BTreeMap<DealId, TradeDeal>,
    next_deal: DealId,
    now: u64,
}

impl TradeNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_slot(&mut self, player: PlayerId) {
        self.offers.entry(player).or_insert_with(TradeOffer::idle);
    }

    pub fn close_slot(&mut self, player: PlayerId) {
        self.offers.remove(&player);
    }

    pub fn offer(&self, player: PlayerId) -> Option<&TradeOffer> {
        self.offers.get(&player)
    }

    pub fn deal(&self, deal: DealId) -> Option<&TradeDeal> {
        self.deals.get(&deal)
    }

    pub fn deals(&self) -> impl Iterator<Item = &TradeDeal> {
        self.deals.values()
    }

    /// Fills the player's slot and raises its confirm flag. Rejected while
    /// the previous cycle has not been fully reset.
    pub fn submit(
        &mut self,
        player: PlayerId,
        offering: NationId,
        target: NationId,
        terms: TradeTerms,
    ) -> GameResult<()> {
        if offering == UNOWNED {
            return Err(GameError::UnknownNation(offering));
        }
        if offering == target {
            return Err(GameError::SelfTrade(offering));
        }
        let slot = self
            .offers
            .get_mut(&player)
            .ok_or(GameError::UnknownPlayer(player))?;
        if slot.confirm || slot.processed {
            return Err(GameError::DuplicateSubmission(player));
        }
        *slot = TradeOffer {
            offering,
            target,
            terms,
            confirm: true,
            processed: false,
            processed_at: None,
            last_outcome: None,
        };
        debug!(player, offering, target, "trade.offer_submitted");
        Ok(())
    }

    /// Server scan over every slot. Confirmed, unprocessed offers become
    /// deals owned by the target's controller when `is_connected` says it
    /// has one; otherwise they are dropped and the outcome is recorded on
    /// the slot. Slots whose confirm was dropped get their processed flag
    /// cleared.
    pub fn promote(
        &mut self,
        actor: Actor,
        tick: u64,
        is_connected: impl Fn(NationId) -> bool,
    ) -> GameResult<Vec<Promotion>> {
        if !actor.is_server() {
            return Err(GameError::NotController {
                actor,
                nation: UNOWNED,
            });
        }
        self.now = tick;
        let mut promotions = Vec::new();
        for (&player, slot) in &mut self.offers {
            if slot.confirm && !slot.processed {
                if is_connected(slot.target) {
                    let id = self.next_deal;
                    self.next_deal += 1;
                    self.deals.insert(
                        id,
                        TradeDeal {
                            id,
                            offering: slot.offering,
                            target: slot.target,
                            terms: slot.terms,
                            state: DealState::Pending,
                            shown: false,
                            processed_local: false,
                            minted_at_tick: tick,
                            accept_writer: Actor::Nation(slot.target),
                            processed_at_tick: None,
                        },
                    );
                    slot.last_outcome = Some(OfferOutcome::Delivered(id));
                    info!(deal = id, offering = slot.offering, target = slot.target, "trade.deal_minted");
                    promotions.push(Promotion::Minted {
                        player,
                        deal: id,
                        offering: slot.offering,
                        target: slot.target,
                    });
                } else {
                    slot.last_outcome = Some(OfferOutcome::TargetUnavailable);
                    warn!(
                        player,
                        offering = slot.offering,
                        target = slot.target,
                        "trade.deal_discarded_target_unavailable"
                    );
                    promotions.push(Promotion::Undeliverable {
                        player,
                        offering: slot.offering,
                        target: slot.target,
                    });
                }
                slot.processed = true;
                slot.processed_at = Some(tick);
            } else if !slot.confirm && slot.processed {
                slot.processed = false;
                slot.processed_at = None;
            }
        }
        Ok(promotions)
    }

    /// Owner-side reaction to its slot being processed: drops confirm. The
    /// owner only sees a processed flag raised on an earlier tick. Returns
    /// whether anything changed.
    pub fn observe_processed(&mut self, player: PlayerId, tick: u64) -> bool {
        match self.offers.get_mut(&player) {
            Some(slot)
                if slot.processed
                    && slot.confirm
                    && slot.processed_at.is_some_and(|at| at < tick) =>
            {
                slot.confirm = false;
                true
            }
            _ => false,
        }
    }

    /// Marks every not-yet-shown pending deal aimed at `nation` as shown and
    /// returns their ids. Each deal is presented exactly once.
    pub fn present(&mut self, nation: NationId) -> Vec<DealId> {
        self.deals
            .values_mut()
            .filter(|deal| deal.target == nation && deal.state == DealState::Pending && !deal.shown)
            .map(|deal| {
                deal.shown = true;
                deal.id
            })
            .collect()
    }

    /// Moves pending deals to `Expired` once they have waited `timeout`
    /// ticks or their target has no connected controller. The offering side
    /// then processes them like a decline.
    pub fn expire_pending(
        &mut self,
        tick: u64,
        timeout: u64,
        is_connected: impl Fn(NationId) -> bool,
    ) -> Vec<DealId> {
        let mut expired = Vec::new();
        for deal in self.deals.values_mut() {
            if deal.state != DealState::Pending {
                continue;
            }
            let timed_out = tick.saturating_sub(deal.minted_at_tick) >= timeout;
            if timed_out || !is_connected(deal.target) {
                deal.state = DealState::Expired;
                warn!(deal = deal.id, target = deal.target, timed_out, "trade.deal_expired");
                expired.push(deal.id);
            }
        }
        expired
    }

    /// Receiver's decision. Accepting credits the one-time money and
    /// installs the recurring effect on the receiver. A deal that is already
    /// resolved is left alone.
    pub fn accept(
        &mut self,
        actor: Actor,
        deal: DealId,
        accept: bool,
        ledger: &mut NationLedger,
    ) -> GameResult<DealState> {
        let entry = self.deals.get_mut(&deal).ok_or(GameError::UnknownDeal(deal))?;
        if actor != entry.accept_writer || ledger.nation() != entry.target {
            return Err(GameError::NotController {
                actor,
                nation: entry.target,
            });
        }
        if entry.state != DealState::Pending {
            return Ok(entry.state);
        }
        if accept {
            entry.state = DealState::Accepted;
            ledger.adjust_gold(entry.terms.one_time_money);
            ledger.add_effect(entry.terms.effect());
        } else {
            entry.state = DealState::Declined;
        }
        info!(deal, target = entry.target, state = ?entry.state, "trade.deal_resolved");
        Ok(entry.state)
    }

    /// Resolved deals offered by `nation` that it has not processed yet.
    pub fn awaiting_processing(&self, nation: NationId) -> Vec<DealId> {
        self.deals
            .values()
            .filter(|deal| {
                deal.offering == nation && deal.state != DealState::Pending && !deal.processed_local
            })
            .map(|deal| deal.id)
            .collect()
    }

    /// Offering side's half of a resolved deal. Runs at most once per deal;
    /// returns whether it ran on this call.
    pub fn process(&mut self, actor: Actor, deal: DealId, ledger: &mut NationLedger) -> GameResult<bool> {
        let entry = self.deals.get_mut(&deal).ok_or(GameError::UnknownDeal(deal))?;
        if actor != Actor::Nation(entry.offering) || ledger.nation() != entry.offering {
            return Err(GameError::NotController {
                actor,
                nation: entry.offering,
            });
        }
        if entry.state == DealState::Pending || entry.processed_local {
            return Ok(false);
        }
        if entry.state == DealState::Accepted {
            ledger.adjust_gold(-entry.terms.one_time_money);
            ledger.add_effect(entry.terms.effect().negated());
        }
        entry.processed_local = true;
        entry.processed_at_tick = Some(self.now);
        debug!(deal, offering = entry.offering, "trade.deal_processed");
        Ok(true)
    }

    /// Drops deals the offering side processed at least `retention` ticks
    /// ago.
    pub fn collect_garbage(&mut self, tick: u64, retention: u64) -> Vec<DealId> {
        let expired: Vec<DealId> = self
            .deals
            .values()
            .filter(|deal| {
                deal.processed_at_tick
                    .is_some_and(|at| tick.saturating_sub(at) >= retention)
            })
            .map(|deal| deal.id)
            .collect();
        for id in &expired {
            self.deals.remove(id);
            debug!(deal = id, "trade.deal_collected");
        }
        expired
    }
}
