//! AI personalities: scripts, force templates and building templates.

use crate::helpers::ProducibleGoal;
use crate::ids::{UnitTypeId, UpgradeId};
use crate::resources::{ResourceKind, Resources};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForceRole {
    Attack,
    Defend,
}

impl std::str::FromStr for ForceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attack" => Ok(ForceRole::Attack),
            "defend" => Ok(ForceRole::Defend),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceTemplate {
    pub role: ForceRole,
    pub priority: i32,
    pub weight: i32,
    pub units: Vec<(ProducibleGoal, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingTemplate {
    pub goal: ProducibleGoal,
    pub priority: i32,
    pub per_settlement: bool,
}

/// One instruction of an AI script. Blocking steps stop the interpreter
/// until their condition holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Want at least one unit of this kind.
    Need(ProducibleGoal),
    /// Want exactly this many units.
    Set(ProducibleGoal, u32),
    /// Block until the wanted number of units exists.
    Wait(ProducibleGoal),
    Research(UpgradeId),
    UpgradeTo(UnitTypeId),
    /// Define force `force` with a role and wish-list.
    Force {
        force: usize,
        role: ForceRole,
        units: Vec<(ProducibleGoal, u32)>,
    },
    /// Block until the force is complete.
    WaitForce(usize),
    AttackWithForce(usize),
    /// Block for this many seconds.
    Sleep(u32),
    SetCollect(BTreeMap<ResourceKind, i32>),
    SetReserve(Resources),
    Goto(usize),
}

impl ScriptStep {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptStep::Need(_) => "need",
            ScriptStep::Set(..) => "set",
            ScriptStep::Wait(_) => "wait",
            ScriptStep::Research(_) => "research",
            ScriptStep::UpgradeTo(_) => "upgrade-to",
            ScriptStep::Force { .. } => "force",
            ScriptStep::WaitForce(_) => "wait-force",
            ScriptStep::AttackWithForce(_) => "attack-with-force",
            ScriptStep::Sleep(_) => "sleep",
            ScriptStep::SetCollect(_) => "set-collect",
            ScriptStep::SetReserve(_) => "set-reserve",
            ScriptStep::Goto(_) => "goto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AiType {
    pub ident: String,
    pub name: String,
    /// Civilization this personality plays; `None` fits any.
    pub race: Option<String>,
    pub class: String,
    pub passive: bool,
    pub collect: BTreeMap<ResourceKind, i32>,
    pub reserve: Resources,
    pub script: Vec<ScriptStep>,
    pub force_templates: Vec<ForceTemplate>,
    pub building_templates: Vec<BuildingTemplate>,
    pub research: Vec<UpgradeId>,
}

impl AiType {
    pub fn fits(&self, civilization: Option<&str>) -> bool {
        match (&self.race, civilization) {
            (None, _) => true,
            (Some(race), Some(civ)) => race == civ,
            (Some(_), None) => false,
        }
    }
}
