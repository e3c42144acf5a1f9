//! Lookup tables derived from the catalog once at load time.

use crate::catalog::{Catalog, MoveDomain};
use crate::ids::{FactionId, UnitTypeId, UpgradeId};
use crate::resources::ResourceKind;
use serde::{Deserialize, Serialize};

/// A production target that may depend on the player's faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducibleGoal {
    Type(UnitTypeId),
    /// A unit class such as `town-hall`, resolved through the faction.
    Class(String),
}

impl ProducibleGoal {
    /// Picks the concrete unit type for `faction`. Classes fall back to the
    /// first unit type of that class when the faction has no override.
    pub fn resolve(&self, catalog: &Catalog, faction: Option<FactionId>) -> Option<UnitTypeId> {
        match self {
            ProducibleGoal::Type(id) => catalog.unit_type(*id).map(|t| t.id),
            ProducibleGoal::Class(class) => faction
                .and_then(|f| catalog.faction(f))
                .and_then(|f| f.class_units.get(class).copied())
                .or_else(|| {
                    catalog
                        .unit_types
                        .iter()
                        .find(|t| t.class.as_deref() == Some(class.as_str()))
                        .map(|t| t.id)
                }),
        }
    }
}

/// Who can make what, which types substitute for each other, and which types
/// serve each economic role.
#[derive(Debug, Clone, Default)]
pub struct AiHelpers {
    trainers: Vec<Vec<UnitTypeId>>,
    builders: Vec<Vec<UnitTypeId>>,
    upgraders: Vec<Vec<UnitTypeId>>,
    researchers: Vec<Vec<UnitTypeId>>,
    equivalents: Vec<Vec<UnitTypeId>>,
    depots: Vec<Vec<UnitTypeId>>,
    extractors: Vec<Vec<UnitTypeId>>,
    harvesters: Vec<Vec<UnitTypeId>>,
    pub markets: Vec<UnitTypeId>,
    pub supply_providers: Vec<UnitTypeId>,
    pub transports: Vec<UnitTypeId>,
    pub docks: Vec<UnitTypeId>,
    pub pathways: Vec<UnitTypeId>,
    pub town_halls: Vec<UnitTypeId>,
    pub minecarts: Vec<UnitTypeId>,
}

fn push_unique(list: &mut Vec<UnitTypeId>, id: UnitTypeId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}

impl AiHelpers {
    pub fn build(catalog: &Catalog) -> Self {
        let n = catalog.unit_types.len();
        let r = catalog.resources.len();
        let mut h = AiHelpers {
            trainers: vec![Vec::new(); n],
            builders: vec![Vec::new(); n],
            upgraders: vec![Vec::new(); n],
            researchers: vec![Vec::new(); catalog.upgrades.len()],
            equivalents: vec![Vec::new(); n],
            depots: vec![Vec::new(); r],
            extractors: vec![Vec::new(); r],
            harvesters: vec![Vec::new(); r],
            ..Default::default()
        };

        let mut parent: Vec<usize> = (0..n).collect();

        for t in &catalog.unit_types {
            for &target in &t.trains {
                if let Some(list) = h.trainers.get_mut(target as usize) {
                    push_unique(list, t.id);
                }
            }
            for &target in &t.builds {
                if let Some(list) = h.builders.get_mut(target as usize) {
                    push_unique(list, t.id);
                }
            }
            for &target in &t.upgrades_to {
                if let Some(list) = h.upgraders.get_mut(target as usize) {
                    push_unique(list, t.id);
                }
                if (target as usize) < n {
                    union(&mut parent, t.id as usize, target as usize);
                }
            }
            for &up in &t.researches {
                if let Some(list) = h.researchers.get_mut(up as usize) {
                    push_unique(list, t.id);
                }
            }
            for &kind in &t.stores {
                if let Some(list) = h.depots.get_mut(kind as usize) {
                    push_unique(list, t.id);
                }
            }
            if let Some(kind) = t.extractor_for {
                if let Some(list) = h.extractors.get_mut(kind as usize) {
                    push_unique(list, t.id);
                }
            }
            for &kind in &t.harvests {
                if let Some(list) = h.harvesters.get_mut(kind as usize) {
                    push_unique(list, t.id);
                }
            }
            if t.market {
                h.markets.push(t.id);
            }
            if t.supply > 0 {
                h.supply_providers.push(t.id);
            }
            if t.transport_capacity > 0 && t.domain == MoveDomain::Naval {
                h.transports.push(t.id);
            }
            if t.dock {
                h.docks.push(t.id);
            }
            if t.pathway {
                h.pathways.push(t.id);
            }
            if t.town_hall {
                h.town_halls.push(t.id);
            }
            if t.minecart {
                h.minecarts.push(t.id);
            }
        }

        for group in &catalog.equivalence_groups {
            for pair in group.windows(2) {
                if (pair[0] as usize) < n && (pair[1] as usize) < n {
                    union(&mut parent, pair[0] as usize, pair[1] as usize);
                }
            }
        }

        for i in 0..n {
            let root = find(&mut parent, i);
            let mut others: Vec<UnitTypeId> = (0..n)
                .filter(|&j| j != i && find(&mut parent, j) == root)
                .map(|j| j as UnitTypeId)
                .collect();
            // Best first, ties by id.
            others.sort_by_key(|&j| {
                (
                    std::cmp::Reverse(catalog.unit_types[j as usize].ai_priority),
                    j,
                )
            });
            h.equivalents[i] = others;
        }

        // Supply providers ordered by supply per unit of total cost.
        h.supply_providers.sort_by_key(|&id| {
            let t = &catalog.unit_types[id as usize];
            let cost: i64 = t.costs.iter().map(|(_, v)| v).sum::<i64>().max(1);
            (std::cmp::Reverse(t.supply as i64 * 1000 / cost), id)
        });

        h
    }

    fn lookup(table: &[Vec<UnitTypeId>], idx: usize) -> &[UnitTypeId] {
        table.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn trainers(&self, t: UnitTypeId) -> &[UnitTypeId] {
        Self::lookup(&self.trainers, t as usize)
    }

    pub fn builders(&self, t: UnitTypeId) -> &[UnitTypeId] {
        Self::lookup(&self.builders, t as usize)
    }

    pub fn upgraders(&self, t: UnitTypeId) -> &[UnitTypeId] {
        Self::lookup(&self.upgraders, t as usize)
    }

    pub fn researchers(&self, u: UpgradeId) -> &[UnitTypeId] {
        Self::lookup(&self.researchers, u as usize)
    }

    /// Interchangeable types, best AI priority first. Excludes `t` itself.
    pub fn equivalents(&self, t: UnitTypeId) -> &[UnitTypeId] {
        Self::lookup(&self.equivalents, t as usize)
    }

    pub fn are_equivalent(&self, a: UnitTypeId, b: UnitTypeId) -> bool {
        a == b || self.equivalents(a).contains(&b)
    }

    pub fn depots(&self, kind: ResourceKind) -> &[UnitTypeId] {
        Self::lookup(&self.depots, kind as usize)
    }

    pub fn extractors(&self, kind: ResourceKind) -> &[UnitTypeId] {
        Self::lookup(&self.extractors, kind as usize)
    }

    pub fn harvesters(&self, kind: ResourceKind) -> &[UnitTypeId] {
        Self::lookup(&self.harvesters, kind as usize)
    }

    /// Every type able to produce `t` by training, building or upgrading.
    pub fn producers(&self, t: UnitTypeId) -> impl Iterator<Item = UnitTypeId> + '_ {
        self.trainers(t)
            .iter()
            .chain(self.builders(t))
            .chain(self.upgraders(t))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_catalog;

    #[test]
    fn test_upgrade_chains_are_equivalent() {
        let catalog = sample_catalog();
        let h = AiHelpers::build(&catalog);
        let footman = catalog.unit_type_by_ident("footman").unwrap();
        let knight = catalog.unit_type_by_ident("knight").unwrap();
        let paladin = catalog.unit_type_by_ident("paladin").unwrap();
        assert!(h.are_equivalent(knight, paladin));
        assert!(!h.are_equivalent(footman, knight));
        // Paladin has the higher priority so it is offered first.
        assert_eq!(h.equivalents(footman).first(), None);
        assert_eq!(h.equivalents(knight), &[paladin]);
    }

    #[test]
    fn test_producers() {
        let catalog = sample_catalog();
        let h = AiHelpers::build(&catalog);
        let worker = catalog.unit_type_by_ident("worker").unwrap();
        let hall = catalog.unit_type_by_ident("town-hall").unwrap();
        let farm = catalog.unit_type_by_ident("farm").unwrap();
        assert_eq!(h.trainers(worker), &[hall]);
        assert_eq!(h.builders(farm), &[worker]);
        assert!(h.supply_providers.contains(&farm));
        assert_eq!(h.town_halls, vec![hall]);
    }

    #[test]
    fn test_class_goal_resolves_through_faction() {
        let catalog = sample_catalog();
        let hall = catalog.unit_type_by_ident("town-hall").unwrap();
        let goal = ProducibleGoal::Class("town-hall".to_string());
        assert_eq!(goal.resolve(&catalog, None), Some(hall));
        let faction = catalog.faction_by_ident("northmen");
        assert_eq!(goal.resolve(&catalog, faction), Some(hall));
        assert_eq!(
            ProducibleGoal::Class("nope".to_string()).resolve(&catalog, None),
            None
        );
    }
}
