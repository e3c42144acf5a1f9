use super::*;
use crate::ai_type::ForceRole;
use crate::force::ForceState;
use crate::ids::Pos;
use crate::resources::{ResourceKind, Resources};
use crate::testing::{sample_catalog, Sandbox, SandboxBuilder};
use std::collections::BTreeMap;

fn land_attack() -> Sandbox {
    let builder = SandboxBuilder::new(24, 8).computer(1).computer(2).war(1, 2);
    Sandbox::with_world(sample_catalog(), builder)
}

#[test]
fn test_runs_until_first_block() {
    let mut sb = land_attack();
    let hall = sb.unit_type("town-hall");
    let worker = sb.unit_type("worker");
    let farm = sb.unit_type("farm");
    let barracks = sb.unit_type("barracks");

    sb.tick(run_script);
    // Stuck on "wait barracks".
    assert_eq!(sb.state.script_pos, 4);
    assert_eq!(sb.state.wish(hall), Some(1));
    assert_eq!(sb.state.wish(worker), Some(6));
    assert_eq!(sb.state.wish(farm), Some(1));
    assert_eq!(sb.state.wish(barracks), Some(1));

    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 4);
}

#[test]
fn test_forces_and_research_after_barracks() {
    let mut sb = land_attack();
    let footman = sb.unit_type("footman");
    let barracks = sb.unit_type("barracks");
    let swords = sb.catalog.upgrade_by_ident("iron-swords").unwrap();
    sb.world.spawn(1, barracks, Pos::new(3, 3));
    sb.state.script_pos = 4;

    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 8);
    let attack = sb.state.forces.get(0).unwrap();
    assert_eq!(attack.role, ForceRole::Attack);
    assert_eq!(attack.wishes, vec![(footman, 4)]);
    let defend = sb.state.forces.get(1).unwrap();
    assert_eq!(defend.role, ForceRole::Defend);
    assert_eq!(defend.wishes, vec![(footman, 2)]);
    assert_eq!(sb.state.research_requests, vec![swords]);
}

#[test]
fn test_redefining_a_force_reopens_it() {
    let mut sb = land_attack();
    let footman = sb.unit_type("footman");
    let f = sb.state.forces.ensure(0);
    f.wishes = vec![(footman, 4)];
    f.completed = true;
    let same = ScriptStep::Force {
        force: 0,
        role: ForceRole::Attack,
        units: vec![(ProducibleGoal::Type(footman), 4)],
    };
    let more = ScriptStep::Force {
        force: 0,
        role: ForceRole::Attack,
        units: vec![(ProducibleGoal::Type(footman), 6)],
    };
    sb.ai_type.script = vec![same, more];

    sb.tick(run_script);
    let f = sb.state.forces.get(0).unwrap();
    assert!(!f.completed);
    assert_eq!(f.wishes, vec![(footman, 6)]);
}

#[test]
fn test_attack_then_sleep_then_loop() {
    let mut sb = land_attack();
    let footman = sb.unit_type("footman");
    let a = sb.world.spawn(1, footman, Pos::new(2, 2));
    sb.world.spawn(2, footman, Pos::new(20, 5));
    sb.state.forces.ensure(0);
    sb.state.forces.insert(0, a);
    sb.state.forces.get_mut(0).unwrap().completed = true;
    sb.state.script_pos = 8;

    sb.tick(run_script);
    assert!(matches!(
        sb.state.forces.get(0).unwrap().state,
        ForceState::Moving { .. }
    ));
    assert_eq!(sb.state.script_pos, 11);
    assert_eq!(sb.state.sleep_cycles, 900);

    // Still asleep.
    sb.world.set_cycle(899);
    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 11);

    // Goto, the force is busy, sleep again.
    sb.world.set_cycle(900);
    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 11);
    assert_eq!(sb.state.sleep_cycles, 1800);
}

#[test]
fn test_wait_counts_equivalent_types() {
    let mut sb = land_attack();
    let knight = sb.unit_type("knight");
    let paladin = sb.unit_type("paladin");
    sb.ai_type.script = vec![
        ScriptStep::Need(ProducibleGoal::Type(knight)),
        ScriptStep::Wait(ProducibleGoal::Type(knight)),
    ];
    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 1);

    sb.world.spawn(1, paladin, Pos::new(4, 4));
    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 2);
}

#[test]
fn test_classes_resolve_through_faction() {
    let mut sb = land_attack();
    let footman = sb.unit_type("footman");
    let northmen = sb.catalog.faction_by_ident("northmen");
    if let Some(p) = sb.world.player_mut(1) {
        p.faction = northmen;
    }
    sb.ai_type.script = vec![ScriptStep::Set(ProducibleGoal::Class("infantry".to_string()), 3)];
    sb.tick(run_script);
    assert_eq!(sb.state.wish(footman), Some(3));
}

#[test]
fn test_economy_steps() {
    let mut sb = land_attack();
    let reserve = Resources::new().with(0, 100);
    let collect: BTreeMap<ResourceKind, i32> = [(0, 70), (1, 30)].into_iter().collect();
    sb.ai_type.script = vec![
        ScriptStep::SetReserve(reserve.clone()),
        ScriptStep::SetCollect(collect.clone()),
    ];
    sb.tick(run_script);
    assert_eq!(sb.state.reserve, reserve);
    assert_eq!(sb.state.collect, collect);
    assert_eq!(sb.state.script_pos, 2);

    // Past the end nothing runs.
    sb.tick(run_script);
    assert_eq!(sb.state.script_pos, 2);
}

#[test]
fn test_endless_loop_is_cut_by_step_budget() {
    let mut sb = land_attack();
    let worker = sb.unit_type("worker");
    sb.ai_type.script = vec![
        ScriptStep::Set(ProducibleGoal::Type(worker), 2),
        ScriptStep::Goto(0),
    ];
    sb.tick(run_script);
    assert_eq!(sb.state.wish(worker), Some(2));
    assert_eq!(sb.state.script_pos, 0);
}
