use crate::ids::{
    DynastyId, FactionId, MapLayer, PlayerId, Pos, SpellId, UnitRef, UnitTypeId, UpgradeId,
};
use crate::resources::ResourceKind;
use crate::world::Stance;
use serde::{Deserialize, Serialize};

/// Commands issued by one AI player during one hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInputs {
    pub player: PlayerId,
    pub commands: Vec<Command>,
}

impl PlayerInputs {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvestTarget {
    Unit(UnitRef),
    Tile { pos: Pos, layer: MapLayer },
}

/// Everything the AI can ask the game to do. These go through the same
/// pipeline as human input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    // Movement and combat
    Move {
        unit: UnitRef,
        goal: Pos,
        layer: MapLayer,
    },
    Attack {
        unit: UnitRef,
        target: Option<UnitRef>,
        goal: Pos,
        layer: MapLayer,
    },
    Follow {
        unit: UnitRef,
        target: UnitRef,
    },
    Explore {
        unit: UnitRef,
    },
    CastSpell {
        caster: UnitRef,
        spell: SpellId,
        target: Option<UnitRef>,
        goal: Pos,
        layer: MapLayer,
    },

    // Production
    Build {
        builder: UnitRef,
        unit_type: UnitTypeId,
        pos: Pos,
        layer: MapLayer,
    },
    Train {
        trainer: UnitRef,
        unit_type: UnitTypeId,
    },
    UpgradeTo {
        unit: UnitRef,
        unit_type: UnitTypeId,
    },
    Research {
        researcher: UnitRef,
        upgrade: UpgradeId,
    },
    Repair {
        unit: UnitRef,
        target: UnitRef,
    },

    // Economy
    Harvest {
        unit: UnitRef,
        target: HarvestTarget,
    },
    ReturnGoods {
        unit: UnitRef,
        depot: Option<UnitRef>,
    },
    Buy {
        market: UnitRef,
        resource: ResourceKind,
    },
    Sell {
        market: UnitRef,
        resource: ResourceKind,
    },
    ProduceResource {
        building: UnitRef,
        resource: Option<ResourceKind>,
    },

    // Transport
    Board {
        unit: UnitRef,
        transporter: UnitRef,
        /// Cycles to wait before moving, to spread out pathing.
        delay: u32,
    },
    Unload {
        transporter: UnitRef,
        goal: Pos,
        layer: MapLayer,
    },

    // Diplomacy and faction
    SetDiplomacy {
        target: PlayerId,
        stance: Stance,
    },
    SetFaction {
        faction: FactionId,
    },
    FoundFaction {
        faction: FactionId,
    },
    ChooseDynasty {
        dynasty: DynastyId,
    },
}

impl Command {
    /// The unit this command puts to work, if any.
    pub fn actor(&self) -> Option<UnitRef> {
        match *self {
            Command::Move { unit, .. }
            | Command::Attack { unit, .. }
            | Command::Follow { unit, .. }
            | Command::Explore { unit }
            | Command::UpgradeTo { unit, .. }
            | Command::Repair { unit, .. }
            | Command::Harvest { unit, .. }
            | Command::ReturnGoods { unit, .. }
            | Command::Board { unit, .. } => Some(unit),
            Command::CastSpell { caster, .. } => Some(caster),
            Command::Build { builder, .. } => Some(builder),
            Command::Train { trainer, .. } => Some(trainer),
            Command::Research { researcher, .. } => Some(researcher),
            Command::Unload { transporter, .. } => Some(transporter),
            Command::Buy { .. }
            | Command::Sell { .. }
            | Command::ProduceResource { .. }
            | Command::SetDiplomacy { .. }
            | Command::SetFaction { .. }
            | Command::FoundFaction { .. }
            | Command::ChooseDynasty { .. } => None,
        }
    }

    /// Short name for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::Attack { .. } => "attack",
            Command::Follow { .. } => "follow",
            Command::Explore { .. } => "explore",
            Command::CastSpell { .. } => "cast-spell",
            Command::Build { .. } => "build",
            Command::Train { .. } => "train",
            Command::UpgradeTo { .. } => "upgrade-to",
            Command::Research { .. } => "research",
            Command::Repair { .. } => "repair",
            Command::Harvest { .. } => "harvest",
            Command::ReturnGoods { .. } => "return-goods",
            Command::Buy { .. } => "buy",
            Command::Sell { .. } => "sell",
            Command::ProduceResource { .. } => "produce-resource",
            Command::Board { .. } => "board",
            Command::Unload { .. } => "unload",
            Command::SetDiplomacy { .. } => "set-diplomacy",
            Command::SetFaction { .. } => "set-faction",
            Command::FoundFaction { .. } => "found-faction",
            Command::ChooseDynasty { .. } => "choose-dynasty",
        }
    }
}
