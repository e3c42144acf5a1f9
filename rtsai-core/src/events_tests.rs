use super::*;
use crate::ai_type::ForceRole;
use crate::config::AiConfig;
use crate::content::load_content;
use crate::force::ForceState;
use crate::ids::Pos;
use crate::state::BuildRequest;
use crate::testing::{SandboxBuilder, SandboxWorld, SAMPLE_CONTENT};
use crate::world::TileMap;

fn engine_on(builder: SandboxBuilder) -> (AiEngine, SandboxWorld) {
    let content = load_content(SAMPLE_CONTENT).unwrap();
    let world = builder.build(content.catalog.clone());
    let mut engine = AiEngine::new(content, AiConfig::default(), 7).unwrap();
    engine.init_computers(&world).unwrap();
    (engine, world)
}

fn field() -> (AiEngine, SandboxWorld) {
    engine_on(SandboxBuilder::new(20, 8).computer(1).computer(2).war(1, 2))
}

fn kind(world: &SandboxWorld, ident: &str) -> UnitTypeId {
    world.catalog().unit_type_by_ident(ident).unwrap()
}

fn attackers(inputs: &PlayerInputs) -> Vec<(UnitRef, Option<UnitRef>)> {
    inputs
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::Attack { unit, target, .. } => Some((*unit, *target)),
            _ => None,
        })
        .collect()
}

fn queue_entry(engine: &mut AiEngine, unit_type: UnitTypeId, wanted: u32, made: u32) {
    let mut r = BuildRequest::new(unit_type, wanted);
    r.made = made;
    engine.player_mut(1).unwrap().build_queue.push(r);
}

#[test]
fn test_nearby_idle_units_answer_an_attack() {
    let (mut engine, mut world) = field();
    let (worker, footman) = (kind(&world, "worker"), kind(&world, "footman"));
    let victim = world.spawn(1, worker, Pos::new(5, 4));
    let guard = world.spawn(1, footman, Pos::new(7, 4));
    // Other workers keep working; far units do not hear it.
    world.spawn(1, worker, Pos::new(6, 5));
    world.spawn(1, footman, Pos::new(19, 0));
    let raider = world.spawn(2, footman, Pos::new(4, 4));

    let inputs = engine
        .notify(
            &world,
            &AiEvent::UnitAttacked {
                attacker: raider,
                defender: victim,
            },
        )
        .unwrap();
    assert_eq!(inputs.player, 1);
    assert_eq!(
        attackers(&inputs),
        vec![(victim, Some(raider)), (guard, Some(raider))]
    );
}

#[test]
fn test_own_fire_is_ignored() {
    let (mut engine, mut world) = field();
    let footman = kind(&world, "footman");
    let a = world.spawn(1, footman, Pos::new(5, 4));
    let b = world.spawn(1, footman, Pos::new(6, 4));
    let event = AiEvent::UnitAttacked {
        attacker: a,
        defender: b,
    };
    assert_eq!(engine.notify(&world, &event), None);
}

#[test]
fn test_land_units_do_not_chase_ships() {
    let builder = SandboxBuilder::new(20, 8)
        .computer(1)
        .computer(2)
        .war(1, 2)
        .water(Pos::new(0, 0), Pos::new(2, 7));
    let (mut engine, mut world) = engine_on(builder);
    let (footman, transport) = (kind(&world, "footman"), kind(&world, "transport"));
    let shore = world.spawn(1, footman, Pos::new(3, 4));
    world.spawn(1, footman, Pos::new(6, 4));
    let ship = world.spawn(2, transport, Pos::new(2, 4));

    let inputs = engine
        .notify(
            &world,
            &AiEvent::UnitAttacked {
                attacker: ship,
                defender: shore,
            },
        )
        .unwrap();
    // Only the footman standing next to the ship can hit it.
    assert_eq!(attackers(&inputs), vec![(shore, Some(ship))]);
}

#[test]
fn test_defend_force_is_mobilized() {
    let (mut engine, mut world) = field();
    let (hall, footman) = (kind(&world, "town-hall"), kind(&world, "footman"));
    let site = world.spawn(1, hall, Pos::new(3, 3));
    let defender = world.spawn(1, footman, Pos::new(19, 7));
    let raider = world.spawn(2, footman, Pos::new(4, 4));
    {
        let state = engine.player_mut(1).unwrap();
        state.forces.ensure(0).role = ForceRole::Defend;
        state.forces.insert(0, defender);
    }

    let inputs = engine
        .notify(
            &world,
            &AiEvent::UnitAttacked {
                attacker: raider,
                defender: site,
            },
        )
        .unwrap();
    assert_eq!(attackers(&inputs), vec![(defender, None)]);
    let f = engine.player(1).unwrap().forces.get(0).unwrap();
    assert!(f.defending);
    assert_eq!(
        f.state,
        ForceState::Moving {
            goal: Pos::new(4, 4),
            layer: 0
        }
    );
}

#[test]
fn test_helpers_across_water_wait_for_a_ferry() {
    let builder = SandboxBuilder::new(20, 8)
        .computer(1)
        .computer(2)
        .war(1, 2)
        .water(Pos::new(9, 0), Pos::new(10, 7));
    let (mut engine, mut world) = engine_on(builder);
    let (hall, footman) = (kind(&world, "town-hall"), kind(&world, "footman"));
    let site = world.spawn(1, hall, Pos::new(14, 4));
    let helper = world.spawn(1, footman, Pos::new(7, 4));
    let raider = world.spawn(2, footman, Pos::new(15, 4));

    let event = AiEvent::UnitAttacked {
        attacker: raider,
        defender: site,
    };
    assert_eq!(engine.notify(&world, &event), None);
    engine.notify(&world, &event);
    let sites = &engine.player(1).unwrap().site_transport_units;
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].site, site);
    assert_eq!(sites[0].units, vec![helper]);
}

#[test]
fn test_killed_member_leaves_its_force() {
    let (mut engine, mut world) = field();
    let footman = kind(&world, "footman");
    let a = world.spawn(1, footman, Pos::new(5, 4));
    {
        let state = engine.player_mut(1).unwrap();
        state.forces.ensure(0).state = ForceState::Waiting;
        state.forces.insert(0, a);
        state.scouts.push(a);
    }
    for event in world.kill(a) {
        engine.notify(&world, &event);
    }
    let state = engine.player(1).unwrap();
    let f = state.forces.get(0).unwrap();
    assert!(f.is_empty());
    assert_eq!(f.state, ForceState::Mustering);
    assert!(state.scouts.is_empty());
}

#[test]
fn test_build_complete_books_once() {
    let (mut engine, mut world) = field();
    let farm = kind(&world, "farm");
    queue_entry(&mut engine, farm, 2, 1);
    let first = world.spawn(1, farm, Pos::new(3, 3));
    let event = AiEvent::BuildComplete {
        builder: None,
        unit: first,
    };
    engine.notify(&world, &event);
    let r = &engine.player(1).unwrap().build_queue[0];
    assert_eq!((r.wanted, r.made), (1, 0));

    // Nothing issued is left to match.
    engine.notify(&world, &event);
    let r = &engine.player(1).unwrap().build_queue[0];
    assert_eq!((r.wanted, r.made), (1, 0));
}

#[test]
fn test_failed_build_keeps_its_want() {
    let (mut engine, world) = field();
    let farm = kind(&world, "farm");
    queue_entry(&mut engine, farm, 1, 1);
    engine.notify(
        &world,
        &AiEvent::CannotBuild {
            player: 1,
            unit_type: farm,
            landmass: None,
            settlement: None,
        },
    );
    let r = &engine.player(1).unwrap().build_queue[0];
    assert_eq!((r.wanted, r.made), (1, 0));
}

#[test]
fn test_blocker_is_nudged_once_per_window() {
    let (mut engine, mut world) = field();
    let footman = kind(&world, "footman");
    let stuck = world.spawn(1, footman, Pos::new(5, 4));
    let blocker = world.spawn(1, footman, Pos::new(6, 4));
    world.set_cycle(100);

    let event = AiEvent::CannotMove { unit: stuck };
    let inputs = engine.notify(&world, &event).unwrap();
    assert_eq!(
        inputs.commands,
        vec![Command::Move {
            unit: blocker,
            goal: Pos::new(6, 3),
            layer: 0
        }]
    );

    world.set_cycle(105);
    assert_eq!(engine.notify(&world, &event), None);
    world.set_cycle(110);
    assert!(engine.notify(&world, &event).is_some());
}

#[test]
fn test_supply_and_research_flags() {
    let (mut engine, world) = field();
    let swords = world.catalog().upgrade_by_ident("iron-swords").unwrap();
    engine.player_mut(1).unwrap().research_requests.push(swords);

    engine.notify(&world, &AiEvent::NeedMoreSupply { player: 1 });
    engine.notify(
        &world,
        &AiEvent::ResearchComplete {
            player: 1,
            upgrade: swords,
        },
    );
    // Unknown players are ignored.
    engine.notify(&world, &AiEvent::NeedMoreSupply { player: 9 });

    let state = engine.player(1).unwrap();
    assert!(state.need_supply);
    assert!(state.research_requests.is_empty());
    assert_eq!(engine.metrics().callbacks, 3);
}

#[test]
fn test_trainee_joins_wanting_force() {
    let (mut engine, mut world) = field();
    let (barracks, footman) = (kind(&world, "barracks"), kind(&world, "footman"));
    let trainer = world.spawn(1, barracks, Pos::new(3, 3));
    let veteran = world.spawn(1, footman, Pos::new(6, 6));
    {
        let state = engine.player_mut(1).unwrap();
        state.forces.ensure(0).wishes = vec![(footman, 2)];
        state.forces.insert(0, veteran);
    }
    queue_entry(&mut engine, footman, 1, 1);
    let recruit = world.spawn(1, footman, Pos::new(4, 3));

    engine.notify(
        &world,
        &AiEvent::TrainingComplete {
            trainer,
            unit: recruit,
        },
    );
    let state = engine.player(1).unwrap();
    assert_eq!(state.forces.get_units(0), vec![veteran, recruit]);
    assert!(state.build_queue.is_empty());

    // The force is full now.
    let spare = world.spawn(1, footman, Pos::new(4, 4));
    engine.notify(&world, &AiEvent::TrainingComplete { trainer, unit: spare });
    assert_eq!(engine.player(1).unwrap().forces.force_of(spare), None);
}

#[test]
fn test_trained_transport_joins_the_pool() {
    let builder = SandboxBuilder::new(12, 6)
        .computer(1)
        .water(Pos::new(6, 0), Pos::new(11, 5));
    let (mut engine, mut world) = engine_on(builder);
    let (dock, transport) = (kind(&world, "dock"), kind(&world, "transport"));
    let trainer = world.spawn(1, dock, Pos::new(5, 2));
    let ship = world.spawn(1, transport, Pos::new(6, 2));
    let sea = world.landmass(Pos::new(6, 2), 0);

    engine.notify(&world, &AiEvent::TrainingComplete { trainer, unit: ship });
    assert_eq!(
        engine.player(1).unwrap().transporters.get(&sea),
        Some(&vec![ship])
    );
}

#[test]
fn test_upgrade_completion_books_the_target_type() {
    let (mut engine, mut world) = field();
    let paladin = kind(&world, "paladin");
    queue_entry(&mut engine, paladin, 1, 1);
    let unit = world.spawn(1, paladin, Pos::new(5, 5));
    engine.notify(&world, &AiEvent::UpgradeToComplete { unit });
    assert!(engine.player(1).unwrap().build_queue.is_empty());
}
