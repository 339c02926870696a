use tideline::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    SessionEvent,
};
use tempfile::tempdir;

#[test]
fn engine_runs_hook_each_tick() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader
        .load("scenarios/delta_coast.yaml")
        .expect("scenario should load");
    let mut session = scenario.build_session();
    let alice = session.join("alice");
    let bob = session.join("bob");
    session.select_nation(alice, 1).expect("nation 1 is free");
    session.select_nation(bob, 2).expect("nation 2 is free");

    let temp = tempdir().expect("tempdir");
    let mut engine = EngineBuilder::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        tick_seconds: scenario.rules.round_seconds,
        snapshot_interval_ticks: 0,
        snapshot_dir: temp.path().to_path_buf(),
    })
    .with_standard_systems()
    .build();

    let mut ticks = Vec::new();
    let mut rounds = 0;
    engine
        .run_with_hook(&mut session, 6, |report| {
            ticks.push(report.tick);
            rounds += report
                .events
                .iter()
                .filter(|e| matches!(e, SessionEvent::RoundApplied { .. }))
                .count();
        })
        .expect("run succeeds");

    assert_eq!(ticks, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(rounds, 12);
    assert_eq!(session.ledger(1).unwrap().round(), 6);
    assert!(session.ledger(3).is_none());
    assert_eq!(session.clock().global_round(), 6);
}

#[test]
fn same_seed_builds_the_same_map() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/delta_coast.yaml").unwrap();
    let first = scenario.build_session().save_map();
    let second = scenario.build_session().save_map();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4 + 12 * 8 * 10);
}

#[test]
fn snapshots_are_written_on_interval() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/delta_coast.yaml").unwrap();
    let mut session = scenario.build_session();
    let temp = tempdir().unwrap();
    let mut engine = EngineBuilder::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        tick_seconds: 1.0,
        snapshot_interval_ticks: 2,
        snapshot_dir: temp.path().to_path_buf(),
    })
    .with_standard_systems()
    .build();

    let mut written = Vec::new();
    engine
        .run_with_hook(&mut session, 4, |report| {
            written.extend(report.snapshot_path);
        })
        .unwrap();

    assert_eq!(written.len(), 2);
    let expected = temp.path().join("delta_coast").join("tick_000004.json");
    assert_eq!(written[1], expected);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&expected).unwrap()).unwrap();
    assert_eq!(json["tick"], 4);
    assert_eq!(json["state"]["tiles"].as_array().unwrap().len(), 96);
}
