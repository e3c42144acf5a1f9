//! Loads catalog and AI personalities from `rtstxt` text.
//!
//! The text is read into plain DTOs first; every identifier is then resolved
//! against the catalog so that later code works with ids only. Any dangling
//! name is a [`ContentError`] raised before the simulation starts.

use crate::ai_type::{AiType, BuildingTemplate, ForceRole, ForceTemplate, ScriptStep};
use crate::catalog::{
    Catalog, DynastyDef, FactionDef, MoveDomain, ResourceDef, SpellDef, SpellTarget, UnitTypeDef,
    UpgradeDef,
};
use crate::error::ContentError;
use crate::helpers::ProducibleGoal;
use crate::ids::{FactionId, SpellId, UnitTypeId, UpgradeId};
use crate::resources::{ResourceKind, Resources, MAX_RESOURCE_KINDS};
use rtstxt::{DefaultRtsTxt, RtsTxt};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Everything the engine needs that is authored outside the game.
#[derive(Debug, Clone)]
pub struct Content {
    pub catalog: Catalog,
    pub ai_types: Vec<AiType>,
}

#[derive(Debug, Deserialize)]
struct ContentDto {
    currency: String,
    resources: Vec<ResourceDto>,
    #[serde(default)]
    unit_types: Vec<UnitTypeDto>,
    #[serde(default)]
    upgrades: Vec<UpgradeDto>,
    #[serde(default)]
    spells: Vec<SpellDto>,
    #[serde(default)]
    factions: Vec<FactionDto>,
    #[serde(default)]
    dynasties: Vec<DynastyDto>,
    #[serde(default)]
    equivalences: Vec<Vec<String>>,
    #[serde(default)]
    ai_types: Vec<AiTypeDto>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ResourceDto {
    ident: String,
    name: Option<String>,
    base_price: i64,
    tradeable: Option<bool>,
    luxury: bool,
    final_resource: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct UnitTypeDto {
    ident: String,
    name: Option<String>,
    class: Option<String>,
    civilization: Option<String>,
    costs: BTreeMap<String, i64>,
    supply: i32,
    demand: i32,
    domain: MoveDomain,
    building: bool,
    town_hall: bool,
    dock: bool,
    market: bool,
    pathway: bool,
    wall: bool,
    minecart: bool,
    harvests: Vec<String>,
    stores: Vec<String>,
    extractor_for: Option<String>,
    gives_resource: Option<String>,
    directly_harvestable: bool,
    produces: Vec<String>,
    transport_capacity: u32,
    board_size: u32,
    trains: Vec<String>,
    builds: Vec<String>,
    upgrades_to: Vec<String>,
    researches: Vec<String>,
    requires: Vec<String>,
    requires_upgrades: Vec<String>,
    spells: Vec<String>,
    can_repair: bool,
    can_attack: bool,
    coward: bool,
    max_per_player: Option<u32>,
    hit_points: i32,
    mana: i32,
    sight: i32,
    attack_range: i32,
    ai_priority: i32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct UpgradeDto {
    ident: String,
    name: Option<String>,
    costs: BTreeMap<String, i64>,
    requires: Vec<String>,
    requires_upgrades: Vec<String>,
    ai_priority: i32,
}

#[derive(Debug, Deserialize)]
struct SpellDto {
    ident: String,
    target: SpellTarget,
    range: i32,
    mana_cost: i32,
    #[serde(default = "yes")]
    autocast: bool,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FactionDto {
    ident: String,
    civilization: String,
    playable: Option<bool>,
    class_units: BTreeMap<String, String>,
    develops_to: Vec<String>,
    requires_upgrades: Vec<String>,
    costs: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DynastyDto {
    ident: String,
    factions: Vec<String>,
    requires_upgrades: Vec<String>,
    costs: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct ForceTemplateDto {
    role: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    weight: i32,
    units: Vec<(String, u32)>,
}

#[derive(Debug, Deserialize)]
struct BuildingTemplateDto {
    goal: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    per_settlement: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ScriptStepDto {
    Need(String),
    Set((String, u32)),
    Wait(String),
    Research(String),
    UpgradeTo(String),
    Force {
        force: usize,
        role: String,
        units: Vec<(String, u32)>,
    },
    WaitForce(usize),
    AttackWithForce(usize),
    Sleep(u32),
    SetCollect(BTreeMap<String, i32>),
    SetReserve(BTreeMap<String, i64>),
    Goto(usize),
}

#[derive(Debug, Deserialize)]
struct AiTypeDto {
    ident: String,
    name: Option<String>,
    race: Option<String>,
    #[serde(default)]
    class: String,
    #[serde(default)]
    passive: bool,
    #[serde(default)]
    collect: BTreeMap<String, i32>,
    #[serde(default)]
    reserve: BTreeMap<String, i64>,
    #[serde(default)]
    script: Vec<ScriptStepDto>,
    #[serde(default)]
    forces: Vec<ForceTemplateDto>,
    #[serde(default)]
    buildings: Vec<BuildingTemplateDto>,
    #[serde(default)]
    research: Vec<String>,
}

/// Name tables used while resolving identifiers.
struct Names {
    resources: BTreeMap<String, ResourceKind>,
    units: BTreeMap<String, UnitTypeId>,
    classes: BTreeSet<String>,
    upgrades: BTreeMap<String, UpgradeId>,
    spells: BTreeMap<String, SpellId>,
    factions: BTreeMap<String, FactionId>,
}

fn index<T, I>(kind: &'static str, idents: I) -> Result<BTreeMap<String, T>, ContentError>
where
    I: IntoIterator<Item = String>,
    T: TryFrom<usize>,
{
    let mut map = BTreeMap::new();
    for (i, ident) in idents.into_iter().enumerate() {
        let id = T::try_from(i).map_err(|_| ContentError::DuplicateIdent {
            kind,
            ident: ident.clone(),
        })?;
        if map.insert(ident.clone(), id).is_some() {
            return Err(ContentError::DuplicateIdent { kind, ident });
        }
    }
    Ok(map)
}

fn lookup<T: Copy>(
    map: &BTreeMap<String, T>,
    kind: &'static str,
    ident: &str,
) -> Result<T, ContentError> {
    map.get(ident)
        .copied()
        .ok_or_else(|| ContentError::UnknownIdent {
            kind,
            ident: ident.to_string(),
        })
}

impl Names {
    fn resource(&self, s: &str) -> Result<ResourceKind, ContentError> {
        lookup(&self.resources, "resource", s)
    }

    fn unit(&self, s: &str) -> Result<UnitTypeId, ContentError> {
        lookup(&self.units, "unit type", s)
    }

    fn upgrade(&self, s: &str) -> Result<UpgradeId, ContentError> {
        lookup(&self.upgrades, "upgrade", s)
    }

    fn units(&self, list: &[String]) -> Result<Vec<UnitTypeId>, ContentError> {
        list.iter().map(|s| self.unit(s)).collect()
    }

    fn upgrade_list(&self, list: &[String]) -> Result<Vec<UpgradeId>, ContentError> {
        list.iter().map(|s| self.upgrade(s)).collect()
    }

    fn resource_list(&self, list: &[String]) -> Result<Vec<ResourceKind>, ContentError> {
        list.iter().map(|s| self.resource(s)).collect()
    }

    fn costs(&self, map: &BTreeMap<String, i64>) -> Result<Resources, ContentError> {
        let mut r = Resources::new();
        for (ident, amount) in map {
            r.add(self.resource(ident)?, *amount);
        }
        Ok(r)
    }

    fn goal(&self, s: &str) -> Result<ProducibleGoal, ContentError> {
        if let Some(&id) = self.units.get(s) {
            return Ok(ProducibleGoal::Type(id));
        }
        if self.classes.contains(s) {
            return Ok(ProducibleGoal::Class(s.to_string()));
        }
        Err(ContentError::UnknownIdent {
            kind: "unit type or class",
            ident: s.to_string(),
        })
    }

    fn wishes(&self, list: &[(String, u32)]) -> Result<Vec<(ProducibleGoal, u32)>, ContentError> {
        list.iter()
            .map(|(g, n)| Ok((self.goal(g)?, *n)))
            .collect()
    }
}

fn role(s: &str) -> Result<ForceRole, ContentError> {
    s.parse()
        .map_err(|bad: String| ContentError::UnknownForceRole(bad))
}

/// Parses and resolves content text.
pub fn load_content(text: &str) -> Result<Content, ContentError> {
    let dto: ContentDto = rtstxt::from_str(text)?;
    resolve(dto)
}

pub fn load_content_file(path: &Path) -> Result<Content, ContentError> {
    let tokens = DefaultRtsTxt::open_txt(path)?;
    let ast = DefaultRtsTxt::parse(tokens).map_err(rtstxt::Error::from)?;
    let dto: ContentDto = rtstxt::from_node(&ast)?;
    resolve(dto)
}

fn resolve(dto: ContentDto) -> Result<Content, ContentError> {
    if dto.resources.len() > MAX_RESOURCE_KINDS {
        return Err(ContentError::TooManyResources(dto.resources.len()));
    }

    let names = Names {
        resources: index("resource", dto.resources.iter().map(|r| r.ident.clone()))?,
        units: index("unit type", dto.unit_types.iter().map(|u| u.ident.clone()))?,
        classes: dto
            .unit_types
            .iter()
            .filter_map(|u| u.class.clone())
            .collect(),
        upgrades: index("upgrade", dto.upgrades.iter().map(|u| u.ident.clone()))?,
        spells: index("spell", dto.spells.iter().map(|s| s.ident.clone()))?,
        factions: index("faction", dto.factions.iter().map(|f| f.ident.clone()))?,
    };
    index::<u16, _>("dynasty", dto.dynasties.iter().map(|d| d.ident.clone()))?;
    index::<usize, _>("AI type", dto.ai_types.iter().map(|a| a.ident.clone()))?;

    let mut catalog = Catalog {
        currency: names.resource(&dto.currency)?,
        ..Default::default()
    };

    for (i, r) in dto.resources.iter().enumerate() {
        catalog.resources.push(ResourceDef {
            kind: i as ResourceKind,
            ident: r.ident.clone(),
            name: r.name.clone().unwrap_or_else(|| r.ident.clone()),
            base_price: r.base_price,
            tradeable: r.tradeable.unwrap_or(true),
            luxury: r.luxury,
            final_resource: r
                .final_resource
                .as_deref()
                .map(|s| names.resource(s))
                .transpose()?,
        });
    }

    for (i, u) in dto.unit_types.iter().enumerate() {
        let opt_resource = |s: &Option<String>| s.as_deref().map(|s| names.resource(s)).transpose();
        catalog.unit_types.push(UnitTypeDef {
            id: i as UnitTypeId,
            ident: u.ident.clone(),
            name: u.name.clone().unwrap_or_else(|| u.ident.clone()),
            class: u.class.clone(),
            civilization: u.civilization.clone(),
            costs: names.costs(&u.costs)?,
            supply: u.supply,
            demand: u.demand,
            domain: u.domain,
            building: u.building || u.town_hall || u.dock || u.market,
            town_hall: u.town_hall,
            dock: u.dock,
            market: u.market,
            pathway: u.pathway,
            wall: u.wall,
            minecart: u.minecart,
            harvests: names.resource_list(&u.harvests)?,
            stores: names.resource_list(&u.stores)?,
            extractor_for: opt_resource(&u.extractor_for)?,
            gives_resource: opt_resource(&u.gives_resource)?,
            directly_harvestable: u.directly_harvestable,
            produces: names.resource_list(&u.produces)?,
            transport_capacity: u.transport_capacity,
            board_size: u.board_size,
            trains: names.units(&u.trains)?,
            builds: names.units(&u.builds)?,
            upgrades_to: names.units(&u.upgrades_to)?,
            researches: names.upgrade_list(&u.researches)?,
            requires_types: names.units(&u.requires)?,
            requires_upgrades: names.upgrade_list(&u.requires_upgrades)?,
            spells: u
                .spells
                .iter()
                .map(|s| lookup(&names.spells, "spell", s))
                .collect::<Result<_, _>>()?,
            can_repair: u.can_repair,
            can_attack: u.can_attack,
            coward: u.coward,
            max_per_player: u.max_per_player,
            hit_points: u.hit_points.max(1),
            mana: u.mana,
            sight: u.sight,
            attack_range: u.attack_range.max(1),
            ai_priority: u.ai_priority,
        });
    }

    for (i, u) in dto.upgrades.iter().enumerate() {
        catalog.upgrades.push(UpgradeDef {
            id: i as UpgradeId,
            ident: u.ident.clone(),
            name: u.name.clone().unwrap_or_else(|| u.ident.clone()),
            costs: names.costs(&u.costs)?,
            requires_types: names.units(&u.requires)?,
            requires_upgrades: names.upgrade_list(&u.requires_upgrades)?,
            ai_priority: u.ai_priority,
        });
    }

    for (i, s) in dto.spells.iter().enumerate() {
        catalog.spells.push(SpellDef {
            id: i as SpellId,
            ident: s.ident.clone(),
            target: s.target,
            range: s.range,
            mana_cost: s.mana_cost,
            autocast: s.autocast,
        });
    }

    for (i, f) in dto.factions.iter().enumerate() {
        let mut class_units = BTreeMap::new();
        for (class, unit) in &f.class_units {
            class_units.insert(class.clone(), names.unit(unit)?);
        }
        catalog.factions.push(FactionDef {
            id: i as FactionId,
            ident: f.ident.clone(),
            civilization: f.civilization.clone(),
            playable: f.playable.unwrap_or(true),
            class_units,
            develops_to: f
                .develops_to
                .iter()
                .map(|s| lookup(&names.factions, "faction", s))
                .collect::<Result<_, _>>()?,
            requires_upgrades: names.upgrade_list(&f.requires_upgrades)?,
            costs: names.costs(&f.costs)?,
        });
    }

    for (i, d) in dto.dynasties.iter().enumerate() {
        catalog.dynasties.push(DynastyDef {
            id: i as u16,
            ident: d.ident.clone(),
            factions: d
                .factions
                .iter()
                .map(|s| lookup(&names.factions, "faction", s))
                .collect::<Result<_, _>>()?,
            requires_upgrades: names.upgrade_list(&d.requires_upgrades)?,
            costs: names.costs(&d.costs)?,
        });
    }

    for group in &dto.equivalences {
        catalog.equivalence_groups.push(names.units(group)?);
    }

    let ai_types = dto
        .ai_types
        .iter()
        .map(|a| resolve_ai_type(&names, a))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Content { catalog, ai_types })
}

fn resolve_ai_type(names: &Names, a: &AiTypeDto) -> Result<AiType, ContentError> {
    let mut collect = BTreeMap::new();
    for (ident, pct) in &a.collect {
        collect.insert(names.resource(ident)?, *pct);
    }

    let script = a
        .script
        .iter()
        .map(|step| {
            Ok(match step {
                ScriptStepDto::Need(g) => ScriptStep::Need(names.goal(g)?),
                ScriptStepDto::Set((g, n)) => ScriptStep::Set(names.goal(g)?, *n),
                ScriptStepDto::Wait(g) => ScriptStep::Wait(names.goal(g)?),
                ScriptStepDto::Research(u) => ScriptStep::Research(names.upgrade(u)?),
                ScriptStepDto::UpgradeTo(u) => ScriptStep::UpgradeTo(names.unit(u)?),
                ScriptStepDto::Force {
                    force,
                    role: r,
                    units,
                } => ScriptStep::Force {
                    force: *force,
                    role: role(r)?,
                    units: names.wishes(units)?,
                },
                ScriptStepDto::WaitForce(f) => ScriptStep::WaitForce(*f),
                ScriptStepDto::AttackWithForce(f) => ScriptStep::AttackWithForce(*f),
                ScriptStepDto::Sleep(s) => ScriptStep::Sleep(*s),
                ScriptStepDto::SetCollect(map) => {
                    let mut c = BTreeMap::new();
                    for (ident, pct) in map {
                        c.insert(names.resource(ident)?, *pct);
                    }
                    ScriptStep::SetCollect(c)
                }
                ScriptStepDto::SetReserve(map) => ScriptStep::SetReserve(names.costs(map)?),
                ScriptStepDto::Goto(i) => ScriptStep::Goto(*i),
            })
        })
        .collect::<Result<Vec<_>, ContentError>>()?;

    let force_templates = a
        .forces
        .iter()
        .map(|f| {
            Ok(ForceTemplate {
                role: role(&f.role)?,
                priority: f.priority,
                weight: f.weight,
                units: names.wishes(&f.units)?,
            })
        })
        .collect::<Result<Vec<_>, ContentError>>()?;

    let mut building_templates = a
        .buildings
        .iter()
        .map(|b| {
            Ok(BuildingTemplate {
                goal: names.goal(&b.goal)?,
                priority: b.priority,
                per_settlement: b.per_settlement,
            })
        })
        .collect::<Result<Vec<_>, ContentError>>()?;
    building_templates.sort_by_key(|b| std::cmp::Reverse(b.priority));

    Ok(AiType {
        ident: a.ident.clone(),
        name: a.name.clone().unwrap_or_else(|| a.ident.clone()),
        race: a.race.clone(),
        class: a.class.clone(),
        passive: a.passive,
        collect,
        reserve: names.costs(&a.reserve)?,
        script,
        force_templates,
        building_templates,
        research: names.upgrade_list(&a.research)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SAMPLE_CONTENT;

    #[test]
    fn test_sample_content_loads() {
        let content = load_content(SAMPLE_CONTENT).expect("sample content");
        let c = &content.catalog;
        assert_eq!(c.resource(c.currency).map(|r| r.ident.as_str()), Some("copper"));
        let hall = c.unit_type_by_ident("town-hall").unwrap();
        assert!(c.unit_type(hall).unwrap().town_hall);
        assert!(c.unit_type(hall).unwrap().building);
        assert!(!content.ai_types.is_empty());
        assert!(content.ai_types[0]
            .script
            .iter()
            .any(|s| matches!(s, ScriptStep::Force { .. })));
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let text = r#"
            currency = copper
            resources = { { ident = copper } }
            unit_types = { { ident = worker trains = { ghost } } }
        "#;
        match load_content(text) {
            Err(ContentError::UnknownIdent { kind, ident }) => {
                assert_eq!(kind, "unit type");
                assert_eq!(ident, "ghost");
            }
            other => panic!("expected unknown ident, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_force_role_is_rejected() {
        let text = r#"
            currency = copper
            resources = { { ident = copper } }
            unit_types = { { ident = footman can_attack = yes } }
            ai_types = {
                { ident = bad forces = { { role = ambush units = { { footman 2 } } } } }
            }
        "#;
        assert!(matches!(
            load_content(text),
            Err(ContentError::UnknownForceRole(r)) if r == "ambush"
        ));
    }

    #[test]
    fn test_duplicate_ident_is_rejected() {
        let text = r#"
            currency = copper
            resources = { { ident = copper } { ident = copper } }
        "#;
        assert!(matches!(
            load_content(text),
            Err(ContentError::DuplicateIdent { .. })
        ));
    }
}
