//! Session context: owns every registry of one game and is the single entry
//! point for player actions and the per-tick phases.

use std::collections::BTreeMap;
use std::mem;
use std::sync::mpsc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::authority::Actor;
use crate::catalog::Improvement;
use crate::clock::{self, ClockStatus, FloodReport, WorldClock};
use crate::error::{GameError, GameResult};
use crate::ledger::{NationLedger, RoundDelta};
use crate::map_file;
use crate::placement::{self, BuildRequest};
use crate::research::{self, ResearchItem};
use crate::scenario::Rules;
use crate::territory::{NationId, MAX_NATIONS, UNOWNED};
use crate::tiles::{TileChange, TileField, TileId, TileRegistry, TileState};
use crate::trade::{DealId, DealState, Promotion, TradeDeal, TradeNegotiator, TradeOffer, TradeTerms};

pub type PlayerId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// `0` while observing.
    pub nation: NationId,
}

impl Player {
    pub fn actor(&self) -> Actor {
        Actor::Nation(self.nation)
    }
}

/// Everything observers are told about, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    TileChanged {
        change: TileChange,
    },
    PlayerJoined {
        player: PlayerId,
        name: String,
    },
    NationGranted {
        player: PlayerId,
        nation: NationId,
    },
    PlayerLeft {
        player: PlayerId,
        nation: NationId,
    },
    RoundApplied {
        nation: NationId,
        round: u64,
        delta: RoundDelta,
    },
    SeaLevelChanged {
        sea_level: u8,
    },
    DealMinted {
        deal: DealId,
        offering: NationId,
        target: NationId,
    },
    DealPresented {
        deal: DealId,
        target: NationId,
    },
    DealResolved {
        deal: DealId,
        state: DealState,
    },
    DealProcessed {
        deal: DealId,
        offering: NationId,
    },
    TradeUndeliverable {
        player: PlayerId,
        offering: NationId,
        target: NationId,
    },
    ResearchUnlocked {
        nation: NationId,
        item: ResearchItem,
    },
    MapLoaded {
        tiles: usize,
    },
}

/// Serializable view of a whole session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub name: String,
    pub tick: u64,
    pub width: u32,
    pub height: u32,
    pub clock: ClockStatus,
    pub players: Vec<Player>,
    pub ledgers: Vec<NationLedger>,
    pub offers: BTreeMap<PlayerId, TradeOffer>,
    pub deals: Vec<TradeDeal>,
    pub tiles: Vec<TileState>,
}

#[derive(Debug)]
pub struct Session {
    name: String,
    tiles: TileRegistry,
    players: BTreeMap<PlayerId, Player>,
    next_player: PlayerId,
    ledgers: BTreeMap<NationId, NationLedger>,
    trade: TradeNegotiator,
    clock: WorldClock,
    rules: Rules,
    grants: BTreeMap<NationId, Vec<ResearchItem>>,
    round_source: Option<NationId>,
    changes: mpsc::Receiver<TileChange>,
    events: Vec<SessionEvent>,
    tick: u64,
}

impl Session {
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        states: Vec<TileState>,
        rules: Rules,
        grants: BTreeMap<NationId, Vec<ResearchItem>>,
    ) -> Self {
        let mut tiles = TileRegistry::new(width, height, states);
        let (tx, changes) = mpsc::channel();
        tiles.subscribe(move |change| {
            let _ = tx.send(change.clone());
        });
        let clock = WorldClock::new(rules.co2_thresholds.clone(), rules.difficulty_divisor);
        Self {
            name: name.to_string(),
            tiles,
            players: BTreeMap::new(),
            next_player: 1,
            ledgers: BTreeMap::new(),
            trade: TradeNegotiator::new(),
            clock,
            rules,
            grants,
            round_source: None,
            changes,
            events: Vec::new(),
            tick: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn tiles(&self) -> &TileRegistry {
        &self.tiles
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    pub fn trade(&self) -> &TradeNegotiator {
        &self.trade
    }

    pub fn ledger(&self, nation: NationId) -> Option<&NationLedger> {
        self.ledgers.get(&nation)
    }

    pub fn player(&self, player: PlayerId) -> GameResult<&Player> {
        self.players.get(&player).ok_or(GameError::UnknownPlayer(player))
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn round_source(&self) -> Option<NationId> {
        self.round_source
    }

    /// Whether some connected player currently controls `nation`.
    pub fn is_connected(&self, nation: NationId) -> bool {
        nation != UNOWNED && self.players.values().any(|p| p.nation == nation)
    }

    // Player lifecycle.

    pub fn join(&mut self, name: &str) -> PlayerId {
        let id = self.next_player;
        self.next_player += 1;
        self.players.insert(
            id,
            Player {
                id,
                name: name.to_string(),
                nation: UNOWNED,
            },
        );
        self.trade.open_slot(id);
        info!(player = id, name, "session.player_joined");
        self.emit(SessionEvent::PlayerJoined {
            player: id,
            name: name.to_string(),
        });
        id
    }

    /// Grants `nation` to `player` if nobody else holds it. `0` turns the
    /// player into an observer. A grant hands the nation's tiles to the
    /// player and creates or reattaches the nation's ledger.
    pub fn select_nation(&mut self, player: PlayerId, nation: NationId) -> GameResult<NationId> {
        let current = self.player(player)?.nation;
        if nation > MAX_NATIONS {
            return Err(GameError::UnknownNation(nation));
        }
        if nation == current {
            return Ok(nation);
        }
        if nation != UNOWNED && self.is_connected(nation) {
            warn!(player, nation, "session.nation_taken");
            return Err(GameError::NationTaken(nation));
        }

        if current != UNOWNED {
            self.release(current)?;
        }
        if let Some(entry) = self.players.get_mut(&player) {
            entry.nation = nation;
        }
        if nation == UNOWNED {
            return Ok(nation);
        }

        self.tiles.set_controlled(nation, true, Actor::Server)?;
        let rules = &self.rules;
        let grants = &self.grants;
        self.ledgers.entry(nation).or_insert_with(|| {
            let mut ledger = NationLedger::new(nation, rules.starting_gold, rules.round_seconds);
            for item in grants.get(&nation).into_iter().flatten() {
                ledger.research_mut().grant(*item);
            }
            ledger
        });
        self.round_source.get_or_insert(nation);
        info!(
            player,
            nation,
            tiles = self.tiles.territory().count(nation),
            "session.nation_granted"
        );
        self.emit(SessionEvent::NationGranted { player, nation });
        Ok(nation)
    }

    /// Removes the player. Its nation's tiles fall back to server authority;
    /// the ledger stays for whoever selects the nation next.
    pub fn disconnect(&mut self, player: PlayerId) -> GameResult<()> {
        let removed = self
            .players
            .remove(&player)
            .ok_or(GameError::UnknownPlayer(player))?;
        self.trade.close_slot(player);
        if removed.nation != UNOWNED {
            self.release(removed.nation)?;
        }
        info!(player, nation = removed.nation, "session.player_left");
        self.emit(SessionEvent::PlayerLeft {
            player,
            nation: removed.nation,
        });
        Ok(())
    }

    fn release(&mut self, nation: NationId) -> GameResult<()> {
        self.tiles.set_controlled(nation, false, Actor::Server)?;
        if self.round_source == Some(nation) {
            self.round_source = self
                .players
                .values()
                .map(|p| p.nation)
                .find(|&n| n != UNOWNED && n != nation && self.tiles.is_controlled(n));
        }
        Ok(())
    }

    // Actions.

    /// Resolves the actor a player writes as.
    pub fn actor_of(&self, player: PlayerId) -> GameResult<Actor> {
        self.player(player).map(Player::actor)
    }

    /// Direct field write. Nations change tile content only through
    /// [`Session::build`], and may raise a tile's water but never lower it.
    pub fn set_tile_field(
        &mut self,
        actor: Actor,
        tile: TileId,
        field: TileField,
        value: u8,
    ) -> GameResult<bool> {
        if let Actor::Nation(_) = actor {
            match field {
                TileField::Urban | TileField::Plant | TileField::Special => {
                    return Err(GameError::BuildRequired { tile, field });
                }
                TileField::WaterLevel => {
                    let current = self.tiles.get(tile)?.water_level;
                    if value < current {
                        return Err(GameError::WaterRecession {
                            tile,
                            current,
                            requested: value,
                        });
                    }
                }
                TileField::Terrain | TileField::Elevation => {}
            }
        }
        self.tiles.set_field(tile, field, value, actor)
    }

    pub fn transfer_tile(&mut self, actor: Actor, tile: TileId, to: NationId) -> GameResult<()> {
        self.tiles.transfer_ownership(tile, to, actor)
    }

    /// Places an improvement. Nations go through the build gate; the server
    /// may only edit tiles directly in open mode.
    pub fn build(&mut self, actor: Actor, request: BuildRequest) -> GameResult<Improvement> {
        match actor {
            Actor::Server if self.rules.open_mode => placement::edit(&mut self.tiles, request),
            Actor::Server => Err(GameError::NotAuthorized {
                actor,
                tile: request.tile,
                field: TileField::Special,
            }),
            Actor::Nation(nation) => {
                let ledger = self
                    .ledgers
                    .get_mut(&nation)
                    .filter(|_| self.tiles.is_controlled(nation))
                    .ok_or(GameError::NotController { actor, nation })?;
                placement::build(&mut self.tiles, ledger, request)
            }
        }
    }

    pub fn unlock_research(&mut self, actor: Actor, item: ResearchItem) -> GameResult<()> {
        let nation = actor.nation().unwrap_or(UNOWNED);
        let ledger = self
            .ledgers
            .get_mut(&nation)
            .filter(|_| self.tiles.is_controlled(nation))
            .ok_or(GameError::NotController { actor, nation })?;
        if ledger.research().has(item) {
            return Ok(());
        }
        if !ledger.research().prerequisites_met(item) {
            return Err(GameError::ResearchLocked(item));
        }
        let cost = research::definition(item).cost;
        if ledger.gold() < cost {
            return Err(GameError::InsufficientGold(item, cost));
        }
        ledger.adjust_gold(-cost);
        ledger.research_mut().grant(item);
        info!(nation, item = ?item, cost, "session.research_unlocked");
        self.emit(SessionEvent::ResearchUnlocked { nation, item });
        Ok(())
    }

    /// Fills the player's offer slot. A target nobody controls right now is
    /// refused up front; one that leaves before the server scan is reported
    /// through the slot's outcome instead.
    pub fn submit_offer(&mut self, player: PlayerId, target: NationId, terms: TradeTerms) -> GameResult<()> {
        let offering = self.player(player)?.nation;
        if offering != UNOWNED && offering != target && !self.is_connected(target) {
            return Err(GameError::TargetUnavailable(target));
        }
        self.trade.submit(player, offering, target, terms)
    }

    pub fn respond_to_deal(&mut self, actor: Actor, deal: DealId, accept: bool) -> GameResult<DealState> {
        let nation = actor.nation().unwrap_or(UNOWNED);
        let ledger = self
            .ledgers
            .get_mut(&nation)
            .ok_or(GameError::NotController { actor, nation })?;
        let before = self.trade.deal(deal).map(|d| d.state);
        let state = self.trade.accept(actor, deal, accept, ledger)?;
        if before == Some(DealState::Pending) {
            self.emit(SessionEvent::DealResolved { deal, state });
        }
        Ok(state)
    }

    pub fn save_map(&self) -> Vec<u8> {
        map_file::save(&self.tiles)
    }

    /// Map import from a peer-facing surface. Only the server may replace
    /// the map mid-session, and only in open mode.
    pub fn import_map(&mut self, actor: Actor, data: &[u8]) -> GameResult<usize> {
        if !actor.is_server() || !self.rules.open_mode {
            warn!(%actor, "session.map_import_refused");
            return Err(GameError::OpenModeRequired(actor));
        }
        self.load_map(data)
    }

    /// Replaces every tile from a map file. The file is fully decoded first,
    /// so a rejected file leaves the session as it was.
    pub fn load_map(&mut self, data: &[u8]) -> GameResult<usize> {
        let states = match map_file::load(data, self.tiles.len()) {
            Ok(states) => states,
            Err(err) => {
                warn!(error = %err, "session.map_rejected");
                return Err(err);
            }
        };
        self.tiles.restore(states, Actor::Server)?;
        let tiles = self.tiles.len();
        info!(tiles, "session.map_loaded");
        self.emit(SessionEvent::MapLoaded { tiles });
        Ok(tiles)
    }

    // Tick phases, called by the engine's systems in order.

    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Lets every controlled nation advance its own ledger by `dt` seconds,
    /// then mirrors the round source's counter into the world clock.
    pub fn advance_rounds(&mut self, dt: f64) -> GameResult<Vec<(NationId, RoundDelta)>> {
        let mut applied = Vec::new();
        for (&nation, ledger) in &mut self.ledgers {
            if !self.tiles.is_controlled(nation) {
                continue;
            }
            for delta in ledger.advance(Actor::Nation(nation), dt, &self.tiles)? {
                applied.push((nation, ledger.round(), delta));
            }
        }
        if let Some(round) = self
            .round_source
            .and_then(|nation| self.ledgers.get(&nation))
            .map(NationLedger::round)
        {
            self.clock.sync_round(round);
        }
        let mut deltas = Vec::with_capacity(applied.len());
        for (nation, round, delta) in applied {
            self.emit(SessionEvent::RoundApplied {
                nation,
                round,
                delta,
            });
            deltas.push((nation, delta));
        }
        Ok(deltas)
    }

    pub fn total_co2(&self) -> f64 {
        self.ledgers.values().map(NationLedger::cumulative_co2).sum()
    }

    /// Checks the CO2 total against the clock and floods when the sea rises.
    pub fn update_climate(&mut self) -> GameResult<Option<FloodReport>> {
        let total = self.total_co2();
        let Some(sea_level) = self.clock.check(total) else {
            return Ok(None);
        };
        self.emit(SessionEvent::SeaLevelChanged { sea_level });
        let report = clock::flood_to(&mut self.tiles, sea_level)?;
        self.flush_changes();
        Ok(Some(report))
    }

    /// Server scan over the offer slots.
    pub fn promote_offers(&mut self) -> GameResult<Vec<Promotion>> {
        let players = &self.players;
        let connected = |nation: NationId| nation != UNOWNED && players.values().any(|p| p.nation == nation);
        let promotions = self.trade.promote(Actor::Server, self.tick, connected)?;
        for promotion in &promotions {
            let event = match *promotion {
                Promotion::Minted {
                    deal,
                    offering,
                    target,
                    ..
                } => SessionEvent::DealMinted {
                    deal,
                    offering,
                    target,
                },
                Promotion::Undeliverable {
                    player,
                    offering,
                    target,
                } => SessionEvent::TradeUndeliverable {
                    player,
                    offering,
                    target,
                },
            };
            self.emit(event);
        }
        Ok(promotions)
    }

    /// Expires unanswered deals, then runs the peer-side deal handling on
    /// behalf of every connected player: drop confirm on slots processed on
    /// an earlier tick, present incoming deals once, process resolved
    /// outgoing deals. Finally collects deals past retention.
    pub fn resolve_deals(&mut self) -> GameResult<()> {
        let players = &self.players;
        let connected = |nation: NationId| nation != UNOWNED && players.values().any(|p| p.nation == nation);
        let expired = self
            .trade
            .expire_pending(self.tick, self.rules.deal_timeout_ticks, connected);
        for deal in expired {
            self.emit(SessionEvent::DealResolved {
                deal,
                state: DealState::Expired,
            });
        }

        let players: Vec<(PlayerId, NationId)> =
            self.players.values().map(|p| (p.id, p.nation)).collect();
        for (player, nation) in players {
            if self.trade.observe_processed(player, self.tick) {
                debug!(player, "session.offer_confirm_reset");
            }
            if nation == UNOWNED {
                continue;
            }
            for deal in self.trade.present(nation) {
                self.emit(SessionEvent::DealPresented { deal, target: nation });
            }
            for deal in self.trade.awaiting_processing(nation) {
                let Some(ledger) = self.ledgers.get_mut(&nation) else {
                    continue;
                };
                if self.trade.process(Actor::Nation(nation), deal, ledger)? {
                    self.emit(SessionEvent::DealProcessed {
                        deal,
                        offering: nation,
                    });
                }
            }
        }
        self.trade
            .collect_garbage(self.tick, self.rules.deal_retention_ticks);
        Ok(())
    }

    // Events and views.

    fn flush_changes(&mut self) {
        for change in self.changes.try_iter() {
            self.events.push(SessionEvent::TileChanged { change });
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        self.flush_changes();
        self.events.push(event);
    }

    /// Takes every event recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.flush_changes();
        mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            name: self.name.clone(),
            tick: self.tick,
            width: self.tiles.width(),
            height: self.tiles.height(),
            clock: self.clock.status(),
            players: self.players.values().cloned().collect(),
            ledgers: self.ledgers.values().cloned().collect(),
            offers: self
                .players
                .keys()
                .filter_map(|id| self.trade.offer(*id).map(|offer| (*id, offer.clone())))
                .collect(),
            deals: self.trade.deals().cloned().collect(),
            tiles: self.tiles.states().collect(),
        }
    }
}
