use super::*;
use crate::config::AiConfig;
use crate::content::load_content;
use crate::ids::Pos;
use crate::state::BuildRequest;
use crate::testing::{SandboxWorld, SAMPLE_CONTENT, SANDBOX_CPS};

fn skirmish(seed: u64) -> (AiEngine, SandboxWorld) {
    let content = load_content(SAMPLE_CONTENT).unwrap();
    let world = SandboxWorld::skirmish(content.catalog.clone());
    let mut engine = AiEngine::new(content, AiConfig::default(), seed).unwrap();
    engine.init_computers(&world).unwrap();
    (engine, world)
}

fn run(engine: &mut AiEngine, world: &mut SandboxWorld, seconds: u64) {
    for _ in 0..seconds * SANDBOX_CPS {
        for inputs in engine.step(&*world) {
            world.apply(&inputs);
        }
        for event in world.advance() {
            if let Some(inputs) = engine.notify(&*world, &event) {
                world.apply(&inputs);
            }
        }
    }
}

#[test]
fn test_save_round_trip() {
    let (mut played, mut world) = skirmish(11);
    run(&mut played, &mut world, 45);
    let text = played.save().unwrap();
    assert!(text.contains("sync_rng"));
    assert!(text.contains("land-attack"));

    let (mut fresh, _) = skirmish(99);
    fresh.load(&text).unwrap();
    assert_eq!(fresh.save_block(), played.save_block());
    assert_eq!(fresh.save().unwrap(), text);
}

#[test]
fn test_restored_stream_continues_where_it_left_off() {
    let (mut a, _) = skirmish(5);
    for _ in 0..17 {
        a.rng.below(1000);
    }
    let (mut b, _) = skirmish(6);
    b.restore(a.save_block()).unwrap();

    let left: Vec<usize> = (0..8).map(|_| a.rng.below(1000)).collect();
    let right: Vec<usize> = (0..8).map(|_| b.rng.below(1000)).collect();
    assert_eq!(left, right);
}

#[test]
fn test_unknown_ai_type_is_rejected() {
    let (mut engine, _) = skirmish(1);
    let before = engine.save_block();
    let mut block = before.clone();
    block.players[0].ai_type = "berserk".to_string();

    let err = engine.restore(block).unwrap_err();
    assert!(matches!(err, SaveError::UnknownAiType(ref name) if name == "berserk"));
    assert_eq!(engine.save_block(), before);
}

#[test]
fn test_unknown_unit_type_is_rejected() {
    let (mut engine, _) = skirmish(1);
    let before = engine.save_block();

    let mut queued = before.clone();
    queued.players[1].build_queue.push(BuildRequest::new(999, 1));
    assert!(matches!(
        engine.restore(queued),
        Err(SaveError::UnknownUnitType(999))
    ));

    let mut wished = before.clone();
    wished.players[0].forces.ensure(3).wishes = vec![(998, 2)];
    assert!(matches!(
        engine.restore(wished),
        Err(SaveError::UnknownUnitType(998))
    ));

    let mut upgraded = before.clone();
    upgraded.players[0].upgrade_to_requests.push(997);
    assert!(matches!(
        engine.restore(upgraded),
        Err(SaveError::UnknownUnitType(997))
    ));
    assert_eq!(engine.save_block(), before);
}

#[test]
fn test_unknown_upgrade_is_rejected() {
    let (mut engine, _) = skirmish(1);
    let mut block = engine.save_block();
    block.players[0].research_requests.push(500);
    assert!(matches!(
        engine.restore(block),
        Err(SaveError::UnknownUpgrade(500))
    ));
}

#[test]
fn test_malformed_text_leaves_engine_untouched() {
    let (mut engine, _) = skirmish(1);
    engine
        .player_mut(1)
        .unwrap()
        .build_queue
        .push(BuildRequest::new(0, 2));
    let before = engine.save_block();

    assert!(matches!(
        engine.load("sync_rng = { seed = \"7\" word_pos = \"x\" }"),
        Err(SaveError::BadRng(_))
    ));
    assert!(engine.load("players = {").is_err());
    assert_eq!(engine.save_block(), before);
}

#[test]
fn test_positions_and_options_survive() {
    let (mut engine, _) = skirmish(1);
    let mut block = engine.save_block();
    let mut r = BuildRequest::new(0, 1);
    r.pos = Some(Pos::new(22, 5));
    r.settlement = Some(2);
    block.players[0].build_queue.push(r.clone());
    block.players[0].last_exploration_cycle = 4500;

    let text = rtstxt::to_string(&block).unwrap();
    engine.load(&text).unwrap();
    let state = engine.player(1).unwrap();
    assert_eq!(state.build_queue.last(), Some(&r));
    assert_eq!(state.last_exploration_cycle, 4500);
    assert_eq!(state.last_repair_unit, None);
}
