//! The AI block of a saved game.
//!
//! One `rtstxt` document holds the shared random stream and one record per AI
//! player. Loading checks every identifier against the loaded content before
//! replacing the engine's state, so a bad block leaves the engine untouched.

use crate::error::SaveError;
use crate::ids::UnitTypeId;
use crate::rng::{RngState, SyncRng};
use crate::scheduler::AiEngine;
use crate::state::AiPlayerState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBlock {
    pub sync_rng: RngState,
    #[serde(default)]
    pub players: Vec<AiPlayerState>,
}

impl AiEngine {
    pub fn save_block(&self) -> SaveBlock {
        SaveBlock {
            sync_rng: self.rng.state(),
            players: self.players.values().cloned().collect(),
        }
    }

    pub fn save(&self) -> Result<String, rtstxt::Error> {
        rtstxt::to_string(&self.save_block())
    }

    pub fn load(&mut self, text: &str) -> Result<(), SaveError> {
        let block: SaveBlock = rtstxt::from_str(text)?;
        self.restore(block)
    }

    /// Replaces every player's state and the random stream with `block`.
    pub fn restore(&mut self, block: SaveBlock) -> Result<(), SaveError> {
        let rng = SyncRng::from_state(&block.sync_rng)?;
        let mut players = BTreeMap::new();
        for state in block.players {
            self.validate(&state)?;
            players.insert(state.player, state);
        }
        log::info!("restored AI state for {} players", players.len());
        self.rng = rng;
        self.players = players;
        Ok(())
    }

    fn validate(&self, state: &AiPlayerState) -> Result<(), SaveError> {
        if !self.ai_types.iter().any(|t| t.ident == state.ai_type) {
            return Err(SaveError::UnknownAiType(state.ai_type.clone()));
        }
        let unit = |t: UnitTypeId| {
            if self.catalog.unit_type(t).is_some() {
                Ok(())
            } else {
                Err(SaveError::UnknownUnitType(t))
            }
        };
        for r in &state.build_queue {
            unit(r.unit_type)?;
        }
        for w in &state.unit_type_requests {
            unit(w.unit_type)?;
        }
        for &t in &state.upgrade_to_requests {
            unit(t)?;
        }
        for force in state.forces.iter() {
            for &(t, _) in &force.wishes {
                unit(t)?;
            }
        }
        for &up in &state.research_requests {
            if self.catalog.upgrade(up).is_none() {
                return Err(SaveError::UnknownUpgrade(up));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "save_tests.rs"]
mod tests;
