use super::*;
use crate::state::SiteTransport;
use crate::testing::{sample_catalog, Sandbox, SandboxBuilder};
use crate::world::{TileMap, WorldView};

// West shore x 0..=4, sea x 5..=6, east shore x 7..=11.
fn strait() -> Sandbox {
    let builder = SandboxBuilder::new(12, 6)
        .computer(1)
        .computer(2)
        .water(Pos::new(5, 0), Pos::new(6, 5));
    Sandbox::with_world(sample_catalog(), builder)
}

#[test]
fn test_missing_capacity_is_requested_once() {
    let mut sb = strait();
    let footman = sb.unit_type("footman");
    let transport = sb.unit_type("transport");
    let units: Vec<UnitRef> = (0..3)
        .map(|i| sb.world.spawn(1, footman, Pos::new(1, i)))
        .collect();
    let goal = Pos::new(9, 2);
    let sea = sb.world.landmass(Pos::new(5, 0), 0);

    let mut done = true;
    sb.tick(|ctx, state| done = check_unit_transport(ctx, state, &units, None, goal, 0));
    assert!(!done);
    let on_order = |sb: &Sandbox| -> u32 {
        sb.state
            .build_queue
            .iter()
            .filter(|r| r.unit_type == transport && r.landmass == Some(sea))
            .map(|r| r.wanted * 4)
            .sum()
    };
    assert!(on_order(&sb) >= 3);
    let requests = sb.state.build_queue.len();

    sb.tick(|ctx, state| done = check_unit_transport(ctx, state, &units, None, goal, 0));
    assert!(!done);
    assert_eq!(sb.state.build_queue.len(), requests);
}

#[test]
fn test_units_already_there_need_nothing() {
    let mut sb = strait();
    let footman = sb.unit_type("footman");
    let a = sb.world.spawn(1, footman, Pos::new(8, 1));
    let mut done = false;
    let inputs = sb.tick(|ctx, state| done = check_unit_transport(ctx, state, &[a], None, Pos::new(10, 4), 0));
    assert!(done);
    assert!(inputs.is_empty());
    assert!(sb.state.build_queue.is_empty());
}

#[test]
fn test_boarding_is_staggered_and_full_ship_unloads() {
    let mut sb = strait();
    let footman = sb.unit_type("footman");
    let transport = sb.unit_type("transport");
    let ship = sb.world.spawn(1, transport, Pos::new(5, 2));
    let units: Vec<UnitRef> = (0..4)
        .map(|i| sb.world.spawn(1, footman, Pos::new(4, i)))
        .collect();
    sb.tick(|ctx, state| rebuild_transporters(ctx, state));
    let sea = sb.world.landmass(Pos::new(5, 2), 0);
    assert_eq!(sb.state.transporters.get(&sea), Some(&vec![ship]));

    let goal = Pos::new(8, 2);
    let inputs = sb.tick(|ctx, state| {
        check_unit_transport(ctx, state, &units, None, goal, 0);
    });
    let delays: Vec<u32> = inputs
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::Board { transporter, delay, .. } if *transporter == ship => Some(*delay),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![0, 5, 10, 15]);

    sb.world.apply(&inputs);
    assert_eq!(sb.world.unit(ship).unwrap().passengers.len(), 4);
    let inputs = sb.tick(|ctx, state| {
        check_unit_transport(ctx, state, &units, None, goal, 0);
    });
    assert_eq!(
        inputs.commands,
        vec![Command::Unload {
            transporter: ship,
            goal,
            layer: 0
        }]
    );

    sb.world.apply(&inputs);
    let mut done = false;
    sb.tick(|ctx, state| done = check_unit_transport(ctx, state, &units, None, goal, 0));
    assert!(done);
}

#[test]
fn test_transporters_keyed_by_their_water() {
    let mut sb = strait();
    let transport = sb.unit_type("transport");
    let ship = sb.world.spawn(1, transport, Pos::new(6, 4));
    sb.tick(|ctx, state| {
        register_transporter(ctx, state, ship);
        register_transporter(ctx, state, ship);
    });
    assert!(sb.state.is_transporter(ship));
    assert_eq!(sb.state.transporters.values().flatten().count(), 1);

    sb.world.kill(ship);
    sb.tick(|ctx, state| rebuild_transporters(ctx, state));
    assert!(sb.state.transporters.is_empty());
}

#[test]
fn test_site_entries_drop_when_units_arrive_or_die() {
    let mut sb = strait();
    let hall = sb.unit_type("town-hall");
    let footman = sb.unit_type("footman");
    let site = sb.world.spawn(1, hall, Pos::new(9, 2));
    let near = sb.world.spawn(1, footman, Pos::new(8, 3));
    let far = sb.world.spawn(1, footman, Pos::new(1, 1));
    sb.state.site_transport_units.push(SiteTransport {
        site,
        units: vec![near, far],
    });

    sb.tick(update_site_transport);
    assert_eq!(sb.state.site_transport_units.len(), 1);
    assert_eq!(sb.state.site_transport_units[0].units, vec![far]);

    sb.world.kill(far);
    sb.tick(update_site_transport);
    assert!(sb.state.site_transport_units.is_empty());
}
