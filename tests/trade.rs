use std::collections::BTreeMap;

use tempfile::tempdir;
use tideline::{
    authority::Actor,
    engine::{Engine, EngineBuilder, EngineSettings},
    hex::TerrainType,
    scenario::Rules,
    session::{PlayerId, Session},
    tiles::TileState,
    trade::{DealState, OfferOutcome, TradeTerms},
    GameError, SessionEvent,
};

const START: f64 = 500.0;

fn rules() -> Rules {
    Rules {
        starting_gold: START,
        co2_thresholds: Vec::new(),
        ..Rules::default()
    }
}

fn session() -> (Session, PlayerId, PlayerId) {
    session_with(rules())
}

/// Two nations on empty grassland, so rounds produce nothing but trade
/// effects.
fn session_with(rules: Rules) -> (Session, PlayerId, PlayerId) {
    let states = (0..4)
        .map(|index| TileState {
            nation: if index < 2 { 1 } else { 2 },
            ..TileState::land(TerrainType::Grassland, 3)
        })
        .collect();
    let mut session = Session::new("trade", 4, 1, states, rules, BTreeMap::new());
    let a = session.join("a");
    let b = session.join("b");
    session.select_nation(a, 1).unwrap();
    session.select_nation(b, 2).unwrap();
    (session, a, b)
}

fn engine(dir: &std::path::Path) -> Engine {
    EngineBuilder::new(EngineSettings {
        scenario_name: "trade".into(),
        tick_seconds: 5.0,
        snapshot_interval_ticks: 0,
        snapshot_dir: dir.to_path_buf(),
    })
    .with_standard_systems()
    .build()
}

fn terms() -> TradeTerms {
    TradeTerms {
        one_time_money: 100.0,
        per_round_money: 10.0,
        rounds: 3,
        ..TradeTerms::default()
    }
}

#[test]
fn handshake_round_trip() {
    let (mut session, a, _b) = session();
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());

    session.submit_offer(a, 2, terms()).unwrap();
    let report = engine.tick(&mut session).unwrap();
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, SessionEvent::DealPresented { deal: 0, target: 2 })));
    let offer = session.trade().offer(a).unwrap();
    assert!(offer.processed && offer.confirm);
    assert_eq!(offer.last_outcome, Some(OfferOutcome::Delivered(0)));

    assert_eq!(
        session.respond_to_deal(Actor::Nation(2), 0, true).unwrap(),
        DealState::Accepted
    );
    assert_eq!(session.ledger(2).unwrap().gold(), START + 100.0);
    assert_eq!(session.ledger(2).unwrap().effects()[0].gold, 10.0);
    assert_eq!(session.ledger(1).unwrap().gold(), START);

    // Tick 2: B earns its first round, A drops confirm and processes the deal.
    engine.tick(&mut session).unwrap();
    assert!(!session.trade().offer(a).unwrap().confirm);
    assert_eq!(session.ledger(1).unwrap().gold(), START - 100.0);
    assert_eq!(session.ledger(1).unwrap().effects()[0].gold, -10.0);
    assert_eq!(session.ledger(1).unwrap().effects()[0].rounds_remaining, 3);
    assert_eq!(session.ledger(2).unwrap().effects()[0].rounds_remaining, 2);

    engine.tick(&mut session).unwrap();
    engine.tick(&mut session).unwrap();
    assert!(session.ledger(2).unwrap().effects().is_empty());
    assert_eq!(session.ledger(2).unwrap().gold(), START + 130.0);
    assert!(session.trade().deal(0).is_some());

    engine.tick(&mut session).unwrap();
    assert!(session.ledger(1).unwrap().effects().is_empty());
    assert_eq!(session.ledger(1).unwrap().gold(), START - 130.0);
    assert!(session.trade().deal(0).is_none());
}

#[test]
fn slot_is_blocked_until_the_cycle_resets() {
    let (mut session, a, _b) = session();
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());

    session.submit_offer(a, 2, terms()).unwrap();
    assert_eq!(
        session.submit_offer(a, 2, terms()),
        Err(GameError::DuplicateSubmission(a))
    );
    for _ in 0..2 {
        engine.tick(&mut session).unwrap();
        assert_eq!(
            session.submit_offer(a, 2, terms()),
            Err(GameError::DuplicateSubmission(a))
        );
    }
    engine.tick(&mut session).unwrap();
    session.submit_offer(a, 2, terms()).unwrap();
}

#[test]
fn self_trade_is_rejected() {
    let (mut session, a, _b) = session();
    assert_eq!(
        session.submit_offer(a, 1, terms()),
        Err(GameError::SelfTrade(1))
    );
}

#[test]
fn disconnected_target_is_reported_to_the_offerer() {
    let (mut session, a, b) = session();
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());

    session.submit_offer(a, 2, terms()).unwrap();
    session.disconnect(b).unwrap();
    assert_eq!(
        session.submit_offer(a, 2, terms()),
        Err(GameError::TargetUnavailable(2))
    );
    let report = engine.tick(&mut session).unwrap();
    assert!(report.events.iter().any(|e| matches!(
        e,
        SessionEvent::TradeUndeliverable {
            offering: 1,
            target: 2,
            ..
        }
    )));
    assert_eq!(session.trade().deals().count(), 0);
    assert_eq!(
        session.trade().offer(a).unwrap().last_outcome,
        Some(OfferOutcome::TargetUnavailable)
    );
    assert_eq!(session.ledger(1).unwrap().gold(), START);
}

#[test]
fn declined_deal_moves_no_gold() {
    let (mut session, a, _b) = session();
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());

    session.submit_offer(a, 2, terms()).unwrap();
    engine.tick(&mut session).unwrap();
    session.respond_to_deal(Actor::Nation(2), 0, false).unwrap();
    engine.tick(&mut session).unwrap();

    assert!(session.trade().deal(0).unwrap().processed_local);
    assert_eq!(session.ledger(1).unwrap().gold(), START);
    assert_eq!(session.ledger(2).unwrap().gold(), START);
}

#[test]
fn only_the_target_may_answer() {
    let (mut session, a, _b) = session();
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());
    session.submit_offer(a, 2, terms()).unwrap();
    engine.tick(&mut session).unwrap();

    assert!(matches!(
        session.respond_to_deal(Actor::Nation(1), 0, true),
        Err(GameError::NotController { .. })
    ));
    assert_eq!(session.trade().deal(0).unwrap().state, DealState::Pending);
}

#[test]
fn deal_expires_when_its_target_leaves() {
    let (mut session, a, b) = session();
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());

    session.submit_offer(a, 2, terms()).unwrap();
    engine.tick(&mut session).unwrap();
    session.disconnect(b).unwrap();

    let report = engine.tick(&mut session).unwrap();
    assert!(report.events.iter().any(|e| matches!(
        e,
        SessionEvent::DealResolved {
            deal: 0,
            state: DealState::Expired
        }
    )));
    let deal = session.trade().deal(0).unwrap();
    assert_eq!(deal.state, DealState::Expired);
    assert!(deal.processed_local);
    assert_eq!(session.ledger(1).unwrap().gold(), START);
    assert_eq!(session.ledger(2).unwrap().gold(), START);

    for _ in 0..3 {
        engine.tick(&mut session).unwrap();
    }
    assert_eq!(session.trade().deals().count(), 0);
}

#[test]
fn unanswered_deal_times_out() {
    let (mut session, a, _b) = session_with(Rules {
        deal_timeout_ticks: 2,
        ..rules()
    });
    let temp = tempdir().unwrap();
    let mut engine = engine(temp.path());

    session.submit_offer(a, 2, terms()).unwrap();
    engine.tick(&mut session).unwrap();
    engine.tick(&mut session).unwrap();
    assert_eq!(session.trade().deal(0).unwrap().state, DealState::Pending);

    engine.tick(&mut session).unwrap();
    assert_eq!(session.trade().deal(0).unwrap().state, DealState::Expired);
    assert_eq!(
        session.respond_to_deal(Actor::Nation(2), 0, true),
        Ok(DealState::Expired)
    );
    assert_eq!(session.ledger(2).unwrap().gold(), START);

    for _ in 0..3 {
        engine.tick(&mut session).unwrap();
    }
    assert!(session.trade().deal(0).is_none());
}
