use super::*;
use crate::ids::Pos;
use crate::testing::{sample_catalog, Sandbox};
use proptest::prelude::*;

const COPPER: ResourceKind = 0;
const TIMBER: ResourceKind = 1;
const STONE: ResourceKind = 2;

fn ratios(pairs: &[(ResourceKind, i32)]) -> BTreeMap<ResourceKind, i32> {
    pairs.iter().copied().collect()
}

#[test]
fn test_wanted_workers_follow_ratio() {
    let collect = ratios(&[(COPPER, 50), (TIMBER, 30), (STONE, 20)]);
    let wanted = wanted_workers(&collect, ResourceMask::default(), 10, 5);
    assert_eq!(wanted[&COPPER], 5);
    assert_eq!(wanted[&TIMBER], 3);
    assert_eq!(wanted[&STONE], 2);
}

#[test]
fn test_blocking_kind_counts_double() {
    let collect = ratios(&[(COPPER, 50), (TIMBER, 30), (STONE, 20)]);
    let mut needed = ResourceMask::default();
    needed.insert(STONE);
    // Two workers still plan on a basis of five.
    let wanted = wanted_workers(&collect, needed, 2, 5);
    assert_eq!(wanted[&COPPER], 2);
    assert_eq!(wanted[&TIMBER], 1);
    assert_eq!(wanted[&STONE], 2);
}

#[test]
fn test_zero_ratios_want_nobody() {
    let collect = ratios(&[(COPPER, 0)]);
    assert!(wanted_workers(&collect, ResourceMask::default(), 8, 5).is_empty());
}

#[test]
fn test_allocation_counts() {
    let mut alloc = Allocation::default();
    alloc.wanted.insert(COPPER, 3);
    alloc.assigned.insert(COPPER, vec![UnitRef(1, 0)]);
    alloc.returning.insert(COPPER, 1);
    alloc.idle.push(UnitRef(2, 0));
    assert_eq!(alloc.priority_needed(COPPER), 1);
    assert_eq!(alloc.priority_needed(TIMBER), 0);
    assert_eq!(alloc.total_harvesters(), 3);
}

/// Six idle workers next to every kind of source.
fn quarry() -> (Sandbox, Vec<UnitRef>) {
    let mut sb = Sandbox::new(sample_catalog(), 16, 8);
    let worker = sb.unit_type("worker");
    let forest = sb.unit_type("forest");
    let rock = sb.unit_type("rock");
    let vein = sb.unit_type("copper-vein");
    let mine = sb.unit_type("mine");
    sb.world.spawn(0, forest, Pos::new(10, 1));
    sb.world.spawn(0, rock, Pos::new(10, 6));
    sb.world.spawn(0, vein, Pos::new(12, 4));
    sb.world.spawn(1, mine, Pos::new(12, 4));
    let workers = (0..6)
        .map(|i| sb.world.spawn(1, worker, Pos::new(2, i + 1)))
        .collect();
    (sb, workers)
}

fn working_on(sb: &Sandbox, workers: &[UnitRef], kind: ResourceKind) -> usize {
    use crate::world::WorldView;
    workers
        .iter()
        .filter_map(|&u| sb.world.unit(u))
        .filter(|u| u.order == Order::Harvest { resource: kind })
        .count()
}

#[test]
fn test_collection_converges_on_ratio() {
    let (mut sb, workers) = quarry();
    for _ in 0..4 {
        let inputs = sb.tick(collect_resources);
        sb.world.apply(&inputs);
    }
    assert_eq!(working_on(&sb, &workers, COPPER), 3);
    assert_eq!(working_on(&sb, &workers, TIMBER), 2);
    assert_eq!(working_on(&sb, &workers, STONE), 1);
    assert!(sb.state.scouts.is_empty());
}

#[test]
fn test_one_worker_per_kind_per_pass() {
    let (mut sb, workers) = quarry();
    let inputs = sb.tick(collect_resources);
    let harvests = inputs
        .commands
        .iter()
        .filter(|c| matches!(c, Command::Harvest { .. }))
        .count();
    assert_eq!(harvests, 3);
    sb.world.apply(&inputs);
    for kind in [COPPER, TIMBER, STONE] {
        assert_eq!(working_on(&sb, &workers, kind), 1);
    }
}

#[test]
fn test_raw_deposit_asks_for_extractor() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 4);
    let worker = sb.unit_type("worker");
    let vein = sb.unit_type("copper-vein");
    let mine = sb.unit_type("mine");
    sb.world.spawn(0, vein, Pos::new(8, 1));
    sb.world.spawn(1, worker, Pos::new(1, 1));
    sb.state.collect = ratios(&[(COPPER, 100)]);

    let inputs = sb.tick(collect_resources);
    assert!(!inputs.commands.iter().any(|c| matches!(c, Command::Harvest { .. })));
    let request = sb.state.build_queue.iter().find(|r| r.unit_type == mine).unwrap();
    assert_eq!(request.pos, Some(Pos::new(8, 1)));

    // A queued extractor is not asked for twice.
    sb.tick(collect_resources);
    assert_eq!(sb.state.build_queue.iter().filter(|r| r.unit_type == mine).count(), 1);
}

#[test]
fn test_unusable_worker_goes_scouting() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 4);
    let worker = sb.unit_type("worker");
    let w = sb.world.spawn(1, worker, Pos::new(1, 1));
    let inputs = sb.tick(collect_resources);
    assert!(inputs.commands.contains(&Command::Explore { unit: w }));
    assert_eq!(sb.state.scouts, vec![w]);

    // Scouts are not sent again.
    let inputs = sb.tick(collect_resources);
    assert!(!inputs.commands.iter().any(|c| matches!(c, Command::Explore { .. })));
}

#[test]
fn test_loaded_idle_worker_returns_goods() {
    let mut sb = Sandbox::new(sample_catalog(), 8, 4);
    let worker = sb.unit_type("worker");
    let w = sb.world.spawn(1, worker, Pos::new(1, 1));
    if let Some(u) = sb.world.unit_mut(w) {
        u.cargo = Some((TIMBER, 10));
    }
    let inputs = sb.tick(collect_resources);
    assert!(inputs
        .commands
        .contains(&Command::ReturnGoods { unit: w, depot: None }));
}

#[test]
fn test_market_buys_missing_kind() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 4);
    let market = sb.unit_type("market");
    let m = sb.world.spawn(1, market, Pos::new(5, 1));
    sb.state.collect = ratios(&[(COPPER, 50), (STONE, 50)]);
    let inputs = sb.tick(collect_resources);
    assert!(inputs.commands.contains(&Command::Buy {
        market: m,
        resource: STONE
    }));
}

#[test]
fn test_market_sells_surplus_when_short_of_currency() {
    let mut sb = Sandbox::new(sample_catalog(), 12, 4);
    let market = sb.unit_type("market");
    let m = sb.world.spawn(1, market, Pos::new(5, 1));
    sb.state.collect = ratios(&[(COPPER, 100)]);
    if let Some(p) = sb.world.player_mut(1) {
        p.resources.set(COPPER, 100);
        p.resources.set(STONE, 3000);
    }
    let inputs = sb.tick(collect_resources);
    assert_eq!(
        inputs.commands,
        vec![Command::Sell {
            market: m,
            resource: STONE
        }]
    );
}

#[test]
fn test_cross_resource_reassignment() {
    let (mut sb, workers) = quarry();
    let forest = sb.unit_type("forest");
    sb.world.spawn(0, forest, Pos::new(11, 1));
    sb.state.collect = ratios(&[(TIMBER, 100)]);
    for _ in 0..6 {
        let inputs = sb.tick(collect_resources);
        sb.world.apply(&inputs);
    }
    assert_eq!(working_on(&sb, &workers, TIMBER), 6);

    // Ratios swing to stone; without reassignment nobody moves.
    sb.state.collect = ratios(&[(TIMBER, 50), (STONE, 50)]);
    let inputs = sb.tick(collect_resources);
    sb.world.apply(&inputs);
    assert_eq!(working_on(&sb, &workers, STONE), 0);

    sb.config.cross_resource_reassignment = true;
    let inputs = sb.tick(collect_resources);
    sb.world.apply(&inputs);
    assert_eq!(working_on(&sb, &workers, STONE), 1);
    assert_eq!(working_on(&sb, &workers, TIMBER), 5);

    // One per pass until stone is as well served as timber, then it stops.
    for _ in 0..4 {
        let inputs = sb.tick(collect_resources);
        sb.world.apply(&inputs);
    }
    assert_eq!(working_on(&sb, &workers, STONE), 3);
    assert_eq!(working_on(&sb, &workers, TIMBER), 3);
}

#[test]
fn test_dual_building_follows_blocking_kind() {
    let mut sb = Sandbox::new(sample_catalog(), 8, 4);
    let mill = sb.unit_type("lumber-mill");
    let m = sb.world.spawn(1, mill, Pos::new(3, 1));

    let inputs = sb.tick(|ctx, state| toggle_production(ctx, state));
    assert_eq!(
        inputs.commands,
        vec![Command::ProduceResource {
            building: m,
            resource: Some(TIMBER)
        }]
    );
    sb.world.apply(&inputs);
    assert!(sb.tick(|ctx, state| toggle_production(ctx, state)).is_empty());

    sb.state.needed_mask.insert(STONE);
    let inputs = sb.tick(|ctx, state| toggle_production(ctx, state));
    assert_eq!(
        inputs.commands,
        vec![Command::ProduceResource {
            building: m,
            resource: Some(STONE)
        }]
    );
}

proptest! {
    #[test]
    fn prop_wanted_workers_cover_the_basis(
        harvesters in 0i64..60,
        weights in proptest::collection::vec(1i32..100, 1..4),
    ) {
        let collect: BTreeMap<ResourceKind, i32> = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| (i as ResourceKind, w))
            .collect();
        let wanted = wanted_workers(&collect, ResourceMask::default(), harvesters, 5);
        let basis = harvesters.max(5);
        let sum: i64 = wanted.values().sum();
        // Rounding loses or gains at most half a worker per kind.
        prop_assert!((sum - basis).abs() <= collect.len() as i64);
        prop_assert!(wanted.values().all(|&n| n >= 0 && n <= basis));
    }
}
