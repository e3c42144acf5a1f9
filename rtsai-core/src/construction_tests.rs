use super::*;
use crate::testing::{sample_catalog, Sandbox, SandboxBuilder};
use crate::world::WorldView;

/// A hall at Ravnborg with one worker, and a free site at Hvitby.
fn homestead() -> Sandbox {
    let builder = SandboxBuilder::new(30, 10)
        .computer(1)
        .computer(2)
        .settlement("Ravnborg", Pos::new(5, 5))
        .settlement("Hvitby", Pos::new(22, 5));
    let mut sb = Sandbox::with_world(sample_catalog(), builder);
    let hall = sb.unit_type("town-hall");
    let worker = sb.unit_type("worker");
    sb.world.spawn(1, hall, Pos::new(5, 5));
    sb.world.spawn(1, worker, Pos::new(3, 8));
    sb
}

#[test]
fn test_free_settlement_gets_a_town_hall() {
    let mut sb = homestead();
    let hall = sb.unit_type("town-hall");
    sb.tick(check_settlements);
    assert_eq!(sb.state.build_queue.len(), 1);
    let r = &sb.state.build_queue[0];
    assert_eq!(r.unit_type, hall);
    assert_eq!(r.settlement, Some(2));
    assert_eq!(r.pos, Some(Pos::new(22, 5)));

    // One at a time.
    sb.tick(check_settlements);
    assert_eq!(sb.state.build_queue.len(), 1);
}

#[test]
fn test_no_settling_without_builders() {
    let builder = SandboxBuilder::new(30, 10)
        .computer(1)
        .settlement("Hvitby", Pos::new(22, 5));
    let mut sb = Sandbox::with_world(sample_catalog(), builder);
    let footman = sb.unit_type("footman");
    sb.world.spawn(1, footman, Pos::new(2, 2));
    sb.tick(check_settlements);
    assert!(sb.state.build_queue.is_empty());
}

#[test]
fn test_dock_only_on_the_coast_and_when_crossing() {
    let builder = SandboxBuilder::new(16, 8)
        .computer(1)
        .water(Pos::new(10, 0), Pos::new(15, 7));
    let mut sb = Sandbox::with_world(sample_catalog(), builder);
    let hall = sb.unit_type("town-hall");
    let worker = sb.unit_type("worker");
    let transport = sb.unit_type("transport");
    let dock = sb.unit_type("dock");
    sb.world.spawn(1, hall, Pos::new(3, 3));
    sb.world.spawn(1, worker, Pos::new(1, 1));

    sb.tick(check_docks);
    assert!(sb.state.build_queue.is_empty());

    add_unit_type_request(&mut sb.state, transport, 1, RequestTarget::default());
    sb.tick(check_docks);
    assert_eq!(sb.state.queued(dock), 1);
    sb.tick(check_docks);
    assert_eq!(sb.state.queued(dock), 1);
}

#[test]
fn test_inland_player_builds_no_dock() {
    let mut sb = homestead();
    let transport = sb.unit_type("transport");
    let dock = sb.unit_type("dock");
    add_unit_type_request(&mut sb.state, transport, 1, RequestTarget::default());
    sb.tick(check_docks);
    assert_eq!(sb.state.queued(dock), 0);
}

#[test]
fn test_building_templates_one_per_pass() {
    let mut sb = homestead();
    let farm = sb.unit_type("farm");
    let mill = sb.unit_type("lumber-mill");

    sb.tick(check_building_templates);
    assert_eq!(sb.state.queued(farm), 1);
    assert_eq!(sb.state.queued(mill), 0);

    sb.tick(check_building_templates);
    let r = sb.state.build_queue.iter().find(|r| r.unit_type == mill).unwrap();
    assert_eq!(r.settlement, Some(1));

    sb.tick(check_building_templates);
    assert_eq!(sb.state.build_queue.len(), 2);
}

#[test]
fn test_per_settlement_building_already_present() {
    let mut sb = homestead();
    let farm = sb.unit_type("farm");
    let mill = sb.unit_type("lumber-mill");
    sb.world.spawn(1, farm, Pos::new(7, 7));
    sb.world.spawn(1, mill, Pos::new(8, 4));
    sb.tick(check_building_templates);
    assert!(sb.state.build_queue.is_empty());
}

#[test]
fn test_workers_per_town_hall() {
    let mut sb = homestead();
    let worker = sb.unit_type("worker");
    sb.tick(check_workers);
    assert_eq!(sb.state.queued(worker), 7);
    sb.tick(check_workers);
    assert_eq!(sb.state.queued(worker), 7);
    assert_eq!(sb.state.build_queue.len(), 1);
}

#[test]
fn test_research_needs_its_building() {
    let mut sb = homestead();
    let mill = sb.unit_type("lumber-mill");
    let axes = sb.catalog.upgrade_by_ident("sharp-axes").unwrap();
    sb.tick(check_upgrades);
    assert!(sb.state.research_requests.is_empty());

    sb.world.spawn(1, mill, Pos::new(8, 4));
    sb.tick(check_upgrades);
    sb.tick(check_upgrades);
    assert_eq!(sb.state.research_requests, vec![axes]);
}

#[test]
fn test_remote_extractor_wants_minecart() {
    let mut sb = homestead();
    let mine = sb.unit_type("mine");
    let cart = sb.unit_type("minecart");
    sb.world.spawn(1, mine, Pos::new(9, 6));
    sb.tick(check_minecarts);
    assert_eq!(sb.state.queued(cart), 0);

    sb.world.spawn(1, mine, Pos::new(27, 2));
    sb.tick(check_minecarts);
    sb.tick(check_minecarts);
    assert_eq!(sb.state.queued(cart), 1);
}

#[test]
fn test_roads_next_to_unconnected_buildings() {
    let mut sb = homestead();
    let farm = sb.unit_type("farm");
    let road = sb.unit_type("road");
    sb.world.spawn(1, farm, Pos::new(12, 5));

    sb.tick(check_pathways);
    assert_eq!(sb.state.build_queue.len(), 1);
    assert_eq!(sb.state.build_queue[0].unit_type, road);
    assert_eq!(sb.state.build_queue[0].pos, Some(Pos::new(5, 4)));

    // Nothing while a road is pending.
    sb.tick(check_pathways);
    assert_eq!(sb.state.build_queue.len(), 1);

    // The cursor moves on to the farm.
    sb.state.build_queue.clear();
    sb.tick(check_pathways);
    assert_eq!(sb.state.build_queue[0].pos, Some(Pos::new(12, 4)));
}

#[test]
fn test_connected_building_needs_no_road() {
    let mut sb = homestead();
    let road = sb.unit_type("road");
    sb.world.spawn(1, road, Pos::new(6, 5));
    sb.tick(check_pathways);
    assert!(sb.state.build_queue.is_empty());
}

#[test]
fn test_one_repairer_per_damaged_building() {
    let mut sb = homestead();
    let hall_pos = Pos::new(5, 5);
    let hall = sb.world.units_at(hall_pos, 0)[0];
    if let Some(u) = sb.world.unit_mut(hall) {
        u.hp -= 100;
    }
    let worker = sb.world.units_of(1)[1];

    let inputs = sb.tick(check_repair);
    assert_eq!(
        inputs.commands,
        vec![Command::Repair {
            unit: worker,
            target: hall
        }]
    );
    assert_eq!(sb.state.last_repair_unit, Some(hall));

    sb.world.apply(&inputs);
    let inputs = sb.tick(check_repair);
    assert!(inputs.is_empty());
    assert_eq!(sb.state.last_repair_unit, None);
}

#[test]
fn test_force_members_do_not_repair() {
    let mut sb = homestead();
    let hall = sb.world.units_of(1)[0];
    let worker = sb.world.units_of(1)[1];
    if let Some(u) = sb.world.unit_mut(hall) {
        u.hp -= 100;
    }
    sb.state.forces.ensure(0);
    sb.state.forces.insert(0, worker);
    assert!(sb.tick(check_repair).is_empty());
}
