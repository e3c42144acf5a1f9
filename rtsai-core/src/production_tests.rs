use super::*;
use crate::testing::{sample_catalog, Sandbox, SandboxBuilder, JOB_CYCLES};
use crate::world::{TileMap, WorldView};
use proptest::prelude::*;

fn walled_in() -> Sandbox {
    // A worker on the only open tile of a 3x3 map.
    let mut builder = SandboxBuilder::new(3, 3).computer(1).computer(2);
    for p in Pos::new(1, 1).around() {
        builder = builder.wall(p);
    }
    Sandbox::with_world(sample_catalog(), builder)
}

fn set_stock(sb: &mut Sandbox, copper: i64, timber: i64) {
    sb.world.player_mut(1).unwrap().resources = Resources::new().with(0, copper).with(1, timber);
}

#[test]
fn test_placement_failure_backs_off() {
    let mut sb = walled_in();
    let worker = sb.unit_type("worker");
    let farm = sb.unit_type("farm");
    sb.world.spawn(1, worker, Pos::new(1, 1));
    add_unit_type_request(&mut sb.state, farm, 1, RequestTarget::default());

    sb.world.set_cycle(300);
    let inputs = sb.tick(process_build_queue);
    assert!(inputs.is_empty());
    let r = &sb.state.build_queue[0];
    assert_eq!((r.failed_placements, r.retry_at), (1, 450));

    // Still waiting.
    sb.world.set_cycle(449);
    sb.tick(process_build_queue);
    assert_eq!(sb.state.build_queue[0].failed_placements, 1);

    sb.world.set_cycle(450);
    sb.tick(process_build_queue);
    let r = &sb.state.build_queue[0];
    assert_eq!((r.failed_placements, r.retry_at), (2, 900));
    assert_eq!((r.wanted, r.made), (1, 0));
}

#[test]
fn test_unaffordable_entry_does_not_block_cheaper_one() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let worker = sb.unit_type("worker");
    let barracks = sb.unit_type("barracks");
    let farm = sb.unit_type("farm");
    let w = sb.world.spawn(1, worker, Pos::new(5, 5));
    set_stock(&mut sb, 100, 100);
    add_unit_type_request(&mut sb.state, barracks, 1, RequestTarget::default());
    add_unit_type_request(&mut sb.state, farm, 1, RequestTarget::default());

    let inputs = sb.tick(process_build_queue);
    assert!(matches!(
        inputs.commands.as_slice(),
        [Command::Build { builder, unit_type, .. }] if *builder == w && *unit_type == farm
    ));
    assert_eq!(sb.state.build_queue[0].made, 0);
    assert_eq!(sb.state.build_queue[1].made, 1);
    assert!(sb.state.needed_mask.contains(0));
    assert!(!sb.state.needed_mask.contains(1));
    assert_eq!(sb.state.needed.get(0), 60);
    assert_eq!(sb.state.used.get(0), 50);
}

#[test]
fn test_reserve_counts_as_spendable() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let worker = sb.unit_type("worker");
    let farm = sb.unit_type("farm");
    sb.world.spawn(1, worker, Pos::new(5, 5));
    set_stock(&mut sb, 20, 100);
    add_unit_type_request(&mut sb.state, farm, 1, RequestTarget::default());
    assert!(sb.tick(process_build_queue).is_empty());

    sb.state.reserve = Resources::new().with(0, 30);
    assert_eq!(sb.tick(process_build_queue).commands.len(), 1);
}

#[test]
fn test_training_waits_for_supply() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let barracks = sb.unit_type("barracks");
    let footman = sb.unit_type("footman");
    sb.world.spawn(1, barracks, Pos::new(5, 5));
    add_unit_type_request(&mut sb.state, footman, 2, RequestTarget::default());

    let inputs = sb.tick(process_build_queue);
    assert!(inputs.is_empty());
    assert!(sb.state.need_supply);
    assert_eq!(sb.state.build_queue[0].made, 0);
}

#[test]
fn test_training_stops_when_supply_runs_out() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let hall = sb.unit_type("town-hall");
    let barracks = sb.unit_type("barracks");
    let knight = sb.unit_type("knight");
    sb.world.spawn(1, hall, Pos::new(2, 2));
    sb.world.spawn(1, barracks, Pos::new(8, 8));
    sb.world.spawn(1, barracks, Pos::new(8, 2));
    // Four supply, knights take two each.
    add_unit_type_request(&mut sb.state, knight, 3, RequestTarget::default());
    for _ in 0..2 {
        let inputs = sb.tick(process_build_queue);
        assert_eq!(inputs.commands.len(), 1);
        sb.world.apply(&inputs);
    }
    for _ in 0..JOB_CYCLES {
        sb.world.advance();
    }
    assert_eq!(sb.world.player(1).unwrap().demand, 4);

    assert!(sb.tick(process_build_queue).is_empty());
    assert_eq!(sb.state.build_queue[0].made, 2);
    assert!(sb.state.need_supply);
}

#[test]
fn test_upgrade_path_used_when_nobody_trains() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let hall = sb.unit_type("town-hall");
    let knight = sb.unit_type("knight");
    let paladin = sb.unit_type("paladin");
    sb.world.spawn(1, hall, Pos::new(8, 8));
    let k = sb.world.spawn(1, knight, Pos::new(3, 3));
    add_unit_type_request(&mut sb.state, paladin, 1, RequestTarget::default());
    let inputs = sb.tick(process_build_queue);
    assert_eq!(
        inputs.commands,
        vec![Command::UpgradeTo {
            unit: k,
            unit_type: paladin
        }]
    );
}

#[test]
fn test_completion_is_booked_once() {
    let catalog = sample_catalog();
    let helpers = AiHelpers::build(&catalog);
    let worker = catalog.unit_type_by_ident("worker").unwrap();
    let mut state = AiPlayerState::new(1, "land-attack");
    let mut req = BuildRequest::new(worker, 1);
    req.made = 1;
    state.build_queue.push(req);

    assert!(remove_from_built(&mut state, &helpers, &catalog, false, worker, None, None));
    assert!(state.build_queue.is_empty());
    assert!(!remove_from_built(&mut state, &helpers, &catalog, false, worker, None, None));
    assert!(state.build_queue.is_empty());
}

#[test]
fn test_equivalent_completion_books_against_request() {
    let catalog = sample_catalog();
    let helpers = AiHelpers::build(&catalog);
    let knight = catalog.unit_type_by_ident("knight").unwrap();
    let paladin = catalog.unit_type_by_ident("paladin").unwrap();
    let mut state = AiPlayerState::new(1, "land-attack");
    let mut req = BuildRequest::new(knight, 2);
    req.made = 1;
    state.build_queue.push(req);

    assert!(remove_from_built(&mut state, &helpers, &catalog, false, paladin, None, None));
    let r = &state.build_queue[0];
    assert_eq!((r.unit_type, r.wanted, r.made), (knight, 1, 0));
}

#[test]
fn test_failed_build_keeps_want() {
    let catalog = sample_catalog();
    let helpers = AiHelpers::build(&catalog);
    let farm = catalog.unit_type_by_ident("farm").unwrap();
    let mut state = AiPlayerState::new(1, "land-attack");
    let mut req = BuildRequest::new(farm, 2);
    req.made = 2;
    req.landmass = Some(1);
    state.build_queue.push(req);

    // Wrong landmass: no match.
    assert!(!reduce_made_in_built(&mut state, &helpers, &catalog, true, farm, Some(2), None));
    assert!(reduce_made_in_built(&mut state, &helpers, &catalog, false, farm, Some(1), None));
    let r = &state.build_queue[0];
    assert_eq!((r.wanted, r.made), (2, 1));
}

#[test]
fn test_wishes_become_requests_once() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let worker = sb.unit_type("worker");
    sb.world.spawn(1, worker, Pos::new(3, 3));
    sb.state.set_wish(worker, 3);

    sb.tick(check_units);
    assert_eq!(sb.state.queued(worker), 2);
    sb.tick(check_units);
    assert_eq!(sb.state.queued(worker), 2);
    assert_eq!(sb.state.build_queue.len(), 1);
}

#[test]
fn test_supply_request_goes_first() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let hall = sb.unit_type("town-hall");
    let worker = sb.unit_type("worker");
    let farm = sb.unit_type("farm");
    let footman = sb.unit_type("footman");
    sb.world.spawn(1, hall, Pos::new(2, 2));
    sb.world.spawn(1, worker, Pos::new(4, 4));
    add_unit_type_request(&mut sb.state, footman, 1, RequestTarget::default());

    let mut asked = false;
    sb.tick(|ctx, state| asked = request_supply(ctx, state));
    assert!(asked);
    let first = &sb.state.build_queue[0];
    assert_eq!(first.unit_type, farm);
    assert_eq!(first.landmass, Some(sb.world.landmass(Pos::new(2, 2), 0)));

    sb.tick(|ctx, state| asked = request_supply(ctx, state));
    assert!(asked);
    assert_eq!(sb.state.build_queue.len(), 2);
}

#[test]
fn test_supply_request_reports_missing_resources() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let worker = sb.unit_type("worker");
    sb.world.spawn(1, worker, Pos::new(4, 4));
    set_stock(&mut sb, 0, 0);
    let mut asked = true;
    sb.tick(|ctx, state| asked = request_supply(ctx, state));
    assert!(!asked);
    assert!(sb.state.needed_mask.contains(0));
    assert!(sb.state.build_queue.is_empty());
}

#[test]
fn test_research_needs_its_building() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 12);
    let barracks = sb.unit_type("barracks");
    let swords = sb.catalog.upgrade_by_ident("iron-swords").unwrap();
    sb.state.research_requests.push(swords);
    assert!(sb.tick(process_upgrade_requests).is_empty());
    assert_eq!(sb.state.research_requests, vec![swords]);

    let b = sb.world.spawn(1, barracks, Pos::new(5, 5));
    let inputs = sb.tick(process_upgrade_requests);
    assert_eq!(
        inputs.commands,
        vec![Command::Research {
            researcher: b,
            upgrade: swords
        }]
    );
    assert!(sb.state.research_requests.is_empty());
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Issue,
    Complete,
    Fail,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Issue), Just(Step::Complete), Just(Step::Fail)]
}

proptest! {
    #[test]
    fn prop_queue_counts_stay_consistent(
        wanted in 1u32..6,
        steps in proptest::collection::vec(step(), 1..40)
    ) {
        let catalog = sample_catalog();
        let helpers = AiHelpers::build(&catalog);
        let footman = catalog.unit_type_by_ident("footman").unwrap();
        let mut state = AiPlayerState::new(1, "land-attack");
        state.build_queue.push(BuildRequest::new(footman, wanted));
        let mut completed = 0;

        for s in steps {
            let before = state.build_queue.first().map(|r| (r.wanted, r.made));
            match s {
                Step::Issue => {
                    if let Some(r) = state.build_queue.first_mut() {
                        if r.pending() > 0 {
                            r.made += 1;
                        }
                    }
                }
                Step::Complete => {
                    let booked = remove_from_built(&mut state, &helpers, &catalog, true, footman, None, None);
                    prop_assert_eq!(booked, before.is_some_and(|(_, m)| m > 0));
                    if booked {
                        completed += 1;
                    }
                }
                Step::Fail => {
                    let booked = reduce_made_in_built(&mut state, &helpers, &catalog, true, footman, None, None);
                    prop_assert_eq!(booked, before.is_some_and(|(_, m)| m > 0));
                }
            }
            let remaining = state.build_queue.first().map_or(0, |r| r.wanted);
            prop_assert_eq!(remaining + completed, wanted);
            if let Some(r) = state.build_queue.first() {
                prop_assert!(r.made <= r.wanted);
                prop_assert!(r.wanted > 0);
            }
        }
    }
}
